//! CLI end-to-end tests
//!
//! Tests for the soundforged command-line interface. None of these need
//! ffmpeg; `PATH` is emptied where tool discovery would otherwise change the
//! output.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the soundforged binary
#[allow(deprecated)]
fn soundforged_cmd() -> Command {
    Command::cargo_bin("soundforged").unwrap()
}

fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("soundforged.toml");
    fs::write(&path, "").unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = soundforged_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = soundforged_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("soundforged"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = soundforged_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("soundforged "));
}

#[test]
fn test_cli_convert_help() {
    let mut cmd = soundforged_cmd();
    cmd.args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--recursive"));
}

#[test]
fn test_cli_formats_lists_every_format() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let mut cmd = soundforged_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("vorbis"))
        .stdout(predicate::str::contains("audio/mpeg"))
        .stdout(predicate::str::contains("mp3 vbr V3"))
        .stdout(predicate::str::contains("m4a"));
}

#[test]
fn test_cli_validate_empty_config() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let mut cmd = soundforged_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("{original_basename}.{target_extension}"));
}

#[test]
fn test_cli_validate_rejects_bad_pattern() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[naming]\npattern = \"{nope}.mp3\"\n").unwrap();
    let mut cmd = soundforged_cmd();
    cmd.arg("validate").arg(&config).assert().failure();
}

#[test]
fn test_cli_convert_missing_input() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let mut cmd = soundforged_cmd();
    cmd.arg("-c")
        .arg(&config)
        .args(["convert", "/nonexistent/file.flac", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_convert_folder_needs_recursive() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let music = dir.path().join("music");
    fs::create_dir(&music).unwrap();
    let mut cmd = soundforged_cmd();
    cmd.arg("-c")
        .arg(&config)
        .arg("convert")
        .arg(&music)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--recursive"));
}

#[test]
fn test_cli_dry_run_plans_unique_destinations() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let out = dir.path().join("out");
    let a_flac = dir.path().join("a.flac");
    let a_wav = dir.path().join("a.wav");
    fs::write(&a_flac, b"not really audio").unwrap();
    fs::write(&a_wav, b"not really audio").unwrap();

    let mut cmd = soundforged_cmd();
    cmd.env("PATH", dir.path())
        .arg("-c")
        .arg(&config)
        .arg("convert")
        .arg(&a_flac)
        .arg(&a_wav)
        .arg("-o")
        .arg(&out)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("a.flac -> "))
        .stdout(predicate::str::contains(
            out.join("a.mp3").display().to_string(),
        ))
        .stdout(predicate::str::contains(
            out.join("a_2.mp3").display().to_string(),
        ))
        .stdout(predicate::str::contains("Would convert 2 file(s)"));

    assert!(!out.exists());
}

#[test]
fn test_cli_dry_run_format_and_pattern_flags() {
    let dir = tempdir().unwrap();
    let config = empty_config(dir.path());
    let out = dir.path().join("out");
    let song = dir.path().join("song.wav");
    fs::write(&song, b"x").unwrap();

    let mut cmd = soundforged_cmd();
    cmd.env("PATH", dir.path())
        .arg("-c")
        .arg(&config)
        .arg("convert")
        .arg(&song)
        .args(["-f", "flac", "-p", "{artist}/{original_basename}.{target_extension}"])
        .arg("-o")
        .arg(&out)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            out.join("Unknown Artist").join("song.flac").display().to_string(),
        ));
}

#[test]
fn test_cli_convert_rejects_unknown_format() {
    let mut cmd = soundforged_cmd();
    cmd.args(["convert", "a.flac", "-f", "wma", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported target format"));
}
