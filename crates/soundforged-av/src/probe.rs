//! Source metadata from `ffprobe`.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the JSON into [`ProbedAudio`]. Tag keys are matched
//! case-insensitively; container tags win over stream tags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use soundforged_core::{parse_number_pair, AudioTags, Error, Result, SourceFile};

use crate::command::ToolCommand;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// What ffprobe learned about one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbedAudio {
    pub format_name: Option<String>,
    /// Codec of the first audio stream.
    pub codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub has_audio: bool,
    pub tags: AudioTags,
}

impl ProbedAudio {
    /// Copy tags, duration and size onto `source`.
    pub fn apply_to(&self, source: SourceFile) -> SourceFile {
        let mut source = source
            .with_tags(self.tags.clone())
            .with_duration(self.duration_secs);
        source.size_bytes = self.size_bytes;
        source
    }
}

#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// A prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbedAudio> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(PROBE_TIMEOUT);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => {
                Error::Probe(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        parse_ffprobe_json(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Parse ffprobe's JSON output.
pub fn parse_ffprobe_json(json: &str) -> Result<ProbedAudio> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let audio = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    // Lower-cased keys; stream tags first so container tags overwrite them.
    let mut tags: HashMap<String, String> = HashMap::new();
    if let Some(stream) = audio {
        tags.extend(lowercase_keys(&stream.tags));
    }
    if let Some(format) = &ff.format {
        tags.extend(lowercase_keys(&format.tags));
    }

    let format_duration = ff
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);
    let stream_duration = audio
        .and_then(|s| s.duration.as_deref())
        .and_then(parse_seconds);

    Ok(ProbedAudio {
        format_name: ff.format.as_ref().and_then(|f| f.format_name.clone()),
        codec: audio.and_then(|s| s.codec_name.clone()),
        sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
        channels: audio.and_then(|s| s.channels),
        duration_secs: format_duration.or(stream_duration),
        size_bytes: ff
            .format
            .as_ref()
            .and_then(|f| f.size.as_deref())
            .and_then(|s| s.parse().ok()),
        has_audio: audio.is_some(),
        tags: map_tags(&tags),
    })
}

fn lowercase_keys(tags: &HashMap<String, String>) -> impl Iterator<Item = (String, String)> + '_ {
    tags.iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
}

fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

fn first<'a>(tags: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| tags.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn map_tags(tags: &HashMap<String, String>) -> AudioTags {
    let text = |keys: &[&str]| first(tags, keys).map(str::to_string);

    let (track_number, track_in_pair) = first(tags, &["track", "tracknumber"])
        .map(parse_number_pair)
        .unwrap_or((None, None));
    let (disc_number, disc_in_pair) = first(tags, &["disc", "discnumber"])
        .map(parse_number_pair)
        .unwrap_or((None, None));
    let count = |keys: &[&str]| first(tags, keys).and_then(|v| v.parse::<u32>().ok());

    AudioTags {
        artist: text(&["artist"]),
        album_artist: text(&["album_artist", "albumartist", "album artist"]),
        album: text(&["album"]),
        title: text(&["title"]),
        genre: text(&["genre"]),
        year: first(tags, &["date", "year", "originaldate"]).map(year_of),
        track_number,
        track_count: track_in_pair.or_else(|| count(&["tracktotal", "totaltracks"])),
        disc_number,
        disc_count: disc_in_pair.or_else(|| count(&["disctotal", "totaldiscs"])),
    }
}

/// `2003-05-01` → `2003`; anything else is kept as tagged.
fn year_of(date: &str) -> String {
    let digits: String = date.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() == 4 {
        digits
    } else {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAC_JSON: &str = r#"{
        "streams": [{
            "index": 0,
            "codec_name": "flac",
            "codec_type": "audio",
            "sample_rate": "44100",
            "channels": 2,
            "duration": "215.400000"
        }],
        "format": {
            "filename": "/music/01.flac",
            "format_name": "flac",
            "duration": "215.400000",
            "size": "24117248",
            "tags": {
                "ARTIST": "Nina Simone",
                "ALBUM": "Pastel Blues",
                "TITLE": "Sinnerman",
                "DATE": "1965-10-01",
                "track": "10/10",
                "DISC": "1",
                "DISCTOTAL": "1",
                "GENRE": "Jazz"
            }
        }
    }"#;

    #[test]
    fn parses_format_tags_case_insensitively() {
        let probed = parse_ffprobe_json(FLAC_JSON).unwrap();
        assert!(probed.has_audio);
        assert_eq!(probed.codec.as_deref(), Some("flac"));
        assert_eq!(probed.sample_rate, Some(44100));
        assert_eq!(probed.channels, Some(2));
        assert_eq!(probed.duration_secs, Some(215.4));
        assert_eq!(probed.size_bytes, Some(24_117_248));

        let tags = &probed.tags;
        assert_eq!(tags.artist.as_deref(), Some("Nina Simone"));
        assert_eq!(tags.album.as_deref(), Some("Pastel Blues"));
        assert_eq!(tags.title.as_deref(), Some("Sinnerman"));
        assert_eq!(tags.genre.as_deref(), Some("Jazz"));
        assert_eq!(tags.year.as_deref(), Some("1965"));
        assert_eq!(tags.track_number, Some(10));
        assert_eq!(tags.track_count, Some(10));
        assert_eq!(tags.disc_number, Some(1));
        assert_eq!(tags.disc_count, Some(1));
        assert_eq!(tags.album_artist, None);
    }

    #[test]
    fn ogg_stream_tags_are_used() {
        let json = r#"{
            "streams": [{
                "codec_name": "vorbis",
                "codec_type": "audio",
                "duration": "12.5",
                "tags": { "artist": "Low", "title": "Words", "TRACKNUMBER": "3", "TRACKTOTAL": "12" }
            }],
            "format": { "format_name": "ogg", "tags": {} }
        }"#;
        let probed = parse_ffprobe_json(json).unwrap();
        assert_eq!(probed.duration_secs, Some(12.5));
        assert_eq!(probed.tags.artist.as_deref(), Some("Low"));
        assert_eq!(probed.tags.track_number, Some(3));
        assert_eq!(probed.tags.track_count, Some(12));
    }

    #[test]
    fn container_tags_win() {
        let json = r#"{
            "streams": [{ "codec_type": "audio", "tags": { "artist": "Stream" } }],
            "format": { "tags": { "Artist": "Container" } }
        }"#;
        let probed = parse_ffprobe_json(json).unwrap();
        assert_eq!(probed.tags.artist.as_deref(), Some("Container"));
    }

    #[test]
    fn file_without_audio_stream() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "codec_name": "mjpeg" }],
            "format": { "format_name": "image2" }
        }"#;
        let probed = parse_ffprobe_json(json).unwrap();
        assert!(!probed.has_audio);
        assert!(probed.tags.is_empty());
        assert_eq!(probed.duration_secs, None);
    }

    #[test]
    fn blank_tags_are_ignored() {
        let json = r#"{ "streams": [], "format": { "tags": { "album": "  ", "year": "1999" } } }"#;
        let probed = parse_ffprobe_json(json).unwrap();
        assert_eq!(probed.tags.album, None);
        assert_eq!(probed.tags.year.as_deref(), Some("1999"));
    }

    #[test]
    fn invalid_json_is_a_probe_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[test]
    fn apply_copies_metadata() {
        let probed = parse_ffprobe_json(FLAC_JSON).unwrap();
        let source = probed.apply_to(SourceFile::new("/music/01.flac"));
        assert_eq!(source.duration_secs, Some(215.4));
        assert_eq!(source.size_bytes, Some(24_117_248));
        assert_eq!(source.tags.title.as_deref(), Some("Sinnerman"));
    }

    #[tokio::test]
    async fn probing_a_missing_file_fails() {
        let Some(prober) = FfprobeProber::from_path() else {
            return;
        };
        let err = prober
            .probe(Path::new("/nonexistent/file_xyz.flac"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }
}
