use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use soundforged_av::ToolsConfig;
use soundforged_core::{EncodingParams, Mp3Mode, Quality, TargetFormat};
use soundforged_naming::{NamingOptions, OutputRoot};
use soundforged_scheduler::SchedulerConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConversionConfig {
    #[serde(default = "default_format")]
    pub format: TargetFormat,

    /// Parallel conversions. 0 uses one per CPU.
    #[serde(default)]
    pub concurrency: usize,

    /// Ogg Vorbis quality, 0.0 to 1.0.
    #[serde(default = "default_vorbis_quality")]
    pub vorbis_quality: f32,

    /// Write Vorbis files as `.oga`.
    #[serde(default)]
    pub vorbis_oga_extension: bool,

    #[serde(default = "default_flac_compression")]
    pub flac_compression: u8,

    /// 8, 16, 24 or 32 bits per sample.
    #[serde(default = "default_wav_sample_width")]
    pub wav_sample_width: u8,

    #[serde(default = "default_mp3_mode")]
    pub mp3_mode: Mp3Mode,

    /// kbps, used by the cbr and abr modes.
    #[serde(default = "default_mp3_bitrate")]
    pub mp3_bitrate: u32,

    /// LAME VBR level, 0 (best) to 9.
    #[serde(default = "default_mp3_vbr_quality")]
    pub mp3_vbr_quality: u32,

    #[serde(default = "default_aac_bitrate")]
    pub aac_bitrate: u32,

    #[serde(default = "default_opus_bitrate")]
    pub opus_bitrate: u32,

    /// Resample to this rate in Hz.
    #[serde(default)]
    pub resample_rate: Option<u32>,

    #[serde(default)]
    pub force_mono: bool,
}

fn default_format() -> TargetFormat {
    TargetFormat::Mp3
}
fn default_vorbis_quality() -> f32 {
    0.6
}
fn default_flac_compression() -> u8 {
    8
}
fn default_wav_sample_width() -> u8 {
    16
}
fn default_mp3_mode() -> Mp3Mode {
    Mp3Mode::Vbr
}
fn default_mp3_bitrate() -> u32 {
    192
}
fn default_mp3_vbr_quality() -> u32 {
    3
}
fn default_aac_bitrate() -> u32 {
    192
}
fn default_opus_bitrate() -> u32 {
    96
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            concurrency: 0,
            vorbis_quality: default_vorbis_quality(),
            vorbis_oga_extension: false,
            flac_compression: default_flac_compression(),
            wav_sample_width: default_wav_sample_width(),
            mp3_mode: default_mp3_mode(),
            mp3_bitrate: default_mp3_bitrate(),
            mp3_vbr_quality: default_mp3_vbr_quality(),
            aac_bitrate: default_aac_bitrate(),
            opus_bitrate: default_opus_bitrate(),
            resample_rate: None,
            force_mono: false,
        }
    }
}

impl ConversionConfig {
    /// The configured quality setting for `format`.
    pub fn quality_for(&self, format: TargetFormat) -> Quality {
        match format {
            TargetFormat::Vorbis => Quality::Vorbis {
                quality: self.vorbis_quality,
            },
            TargetFormat::Flac => Quality::Flac {
                compression: self.flac_compression,
            },
            TargetFormat::Wav => Quality::Wav {
                sample_width: self.wav_sample_width,
            },
            TargetFormat::Mp3 => Quality::Mp3 {
                mode: self.mp3_mode,
                value: match self.mp3_mode {
                    Mp3Mode::Vbr => self.mp3_vbr_quality,
                    Mp3Mode::Cbr | Mp3Mode::Abr => self.mp3_bitrate,
                },
            },
            TargetFormat::Aac => Quality::Aac {
                bitrate_kbps: self.aac_bitrate,
            },
            TargetFormat::Opus => Quality::Opus {
                bitrate_kbps: self.opus_bitrate,
            },
        }
    }

    pub fn encoding_params(&self, format: TargetFormat) -> EncodingParams {
        EncodingParams {
            quality: self.quality_for(format),
            resample_rate: self.resample_rate,
            force_mono: self.force_mono,
            oga_extension: self.vorbis_oga_extension,
        }
    }

    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get().max(1)
        } else {
            self.concurrency
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NamingConfig {
    /// Destination pattern relative to the output folder.
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Folder pattern prepended to `pattern`, e.g. `{album_artist}/{album}`.
    #[serde(default)]
    pub subfolder_pattern: Option<String>,

    /// Output folder. Unset writes next to each input.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Transliterate or drop everything outside `[A-Za-z0-9._-]`.
    #[serde(default)]
    pub replace_messy_chars: bool,

    /// Stand-in for missing text tags.
    #[serde(default = "default_unknown_token")]
    pub unknown_token: String,

    /// Treat files already on disk as taken.
    #[serde(default = "default_true")]
    pub avoid_existing_files: bool,
}

fn default_pattern() -> String {
    "{original_basename}.{target_extension}".to_string()
}
fn default_unknown_token() -> String {
    "Unknown".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            subfolder_pattern: None,
            output_dir: None,
            replace_messy_chars: false,
            unknown_token: default_unknown_token(),
            avoid_existing_files: true,
        }
    }
}

impl NamingConfig {
    /// `pattern`, prefixed with the subfolder pattern when one is set.
    pub fn effective_pattern(&self) -> String {
        match self.subfolder_pattern.as_deref().map(str::trim) {
            Some(sub) if !sub.is_empty() => {
                format!("{}/{}", sub.trim_end_matches('/'), self.pattern)
            }
            _ => self.pattern.clone(),
        }
    }

    pub fn options(&self, target_extension: &str) -> NamingOptions {
        let output = match &self.output_dir {
            Some(dir) => {
                let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
                OutputRoot::Folder(PathBuf::from(expanded))
            }
            None => OutputRoot::SameAsSource,
        };
        NamingOptions {
            output,
            unknown_token: self.unknown_token.clone(),
            replace_messy_chars: self.replace_messy_chars,
            target_extension: target_extension.to_string(),
            avoid_existing_files: self.avoid_existing_files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Check destinations before handing a job to ffmpeg.
    #[serde(default = "default_true")]
    pub preflight: bool,

    /// Pre-flight reports a full disk below this much free space.
    #[serde(default = "default_min_free_mib")]
    pub min_free_mib: u64,

    /// Minimum spacing of progress-only queue updates.
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
}

fn default_min_free_mib() -> u64 {
    16
}
fn default_publish_interval_ms() -> u64 {
    100
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            preflight: true,
            min_free_mib: default_min_free_mib(),
            publish_interval_ms: default_publish_interval_ms(),
        }
    }
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            preflight: self.preflight,
            min_free_bytes: self.min_free_mib.saturating_mul(1024 * 1024),
            publish_interval: Duration::from_millis(self.publish_interval_ms),
        }
    }
}
