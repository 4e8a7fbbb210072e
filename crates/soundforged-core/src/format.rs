//! Target formats and the encoding parameters attached to every job.
//!
//! The format of a job is implied by its [`Quality`] variant, so a job can
//! never carry an MP3 bitrate for a FLAC target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// TargetFormat
// ---------------------------------------------------------------------------

/// Output formats the converter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[serde(alias = "ogg")]
    Vorbis,
    Flac,
    Wav,
    Mp3,
    #[serde(alias = "m4a")]
    Aac,
    Opus,
}

impl TargetFormat {
    /// Every supported format, in display order.
    pub const ALL: [TargetFormat; 6] = [
        TargetFormat::Vorbis,
        TargetFormat::Flac,
        TargetFormat::Wav,
        TargetFormat::Mp3,
        TargetFormat::Aac,
        TargetFormat::Opus,
    ];

    /// Default file extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Vorbis => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::Opus => "opus",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Vorbis => "audio/x-vorbis",
            Self::Flac => "audio/x-flac",
            Self::Wav => "audio/x-wav",
            Self::Mp3 => "audio/mpeg",
            Self::Aac => "audio/x-m4a",
            Self::Opus => "audio/ogg; codecs=opus",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vorbis => "Ogg Vorbis",
            Self::Flac => "FLAC",
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
            Self::Aac => "AAC (M4A)",
            Self::Opus => "Opus",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vorbis => write!(f, "vorbis"),
            Self::Flac => write!(f, "flac"),
            Self::Wav => write!(f, "wav"),
            Self::Mp3 => write!(f, "mp3"),
            Self::Aac => write!(f, "aac"),
            Self::Opus => write!(f, "opus"),
        }
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    /// Accepts short names, file extensions and MIME types.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match normalized.as_str() {
            "vorbis" | "ogg" | "oga" | "audio/x-vorbis" => Self::Vorbis,
            "flac" | "audio/x-flac" | "audio/flac" => Self::Flac,
            "wav" | "wave" | "audio/x-wav" | "audio/wav" => Self::Wav,
            "mp3" | "audio/mpeg" => Self::Mp3,
            "aac" | "m4a" | "audio/x-m4a" | "audio/mp4" => Self::Aac,
            "opus" | "audio/ogg; codecs=opus" | "audio/opus" => Self::Opus,
            _ => {
                return Err(Error::Validation(format!(
                    "unsupported target format: {s}"
                )))
            }
        };
        Ok(format)
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Bitrate control for MP3 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mp3Mode {
    Cbr,
    Abr,
    Vbr,
}

impl fmt::Display for Mp3Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbr => write!(f, "cbr"),
            Self::Abr => write!(f, "abr"),
            Self::Vbr => write!(f, "vbr"),
        }
    }
}

/// Per-format quality settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum Quality {
    /// 0.0 (smallest) to 1.0 (best).
    Vorbis { quality: f32 },
    /// Compression level 0 (fastest) to 8 (smallest).
    Flac { compression: u8 },
    /// Bits per sample: 8, 16, 24 or 32.
    Wav { sample_width: u8 },
    /// `value` is kbps for CBR/ABR and the LAME VBR level 0 (best) to 9 otherwise.
    Mp3 { mode: Mp3Mode, value: u32 },
    Aac { bitrate_kbps: u32 },
    Opus { bitrate_kbps: u32 },
}

impl Quality {
    /// Defaults used when nothing is configured.
    pub fn default_for(format: TargetFormat) -> Self {
        match format {
            TargetFormat::Vorbis => Quality::Vorbis { quality: 0.6 },
            TargetFormat::Flac => Quality::Flac { compression: 8 },
            TargetFormat::Wav => Quality::Wav { sample_width: 16 },
            TargetFormat::Mp3 => Quality::Mp3 {
                mode: Mp3Mode::Vbr,
                value: 3,
            },
            TargetFormat::Aac => Quality::Aac { bitrate_kbps: 192 },
            TargetFormat::Opus => Quality::Opus { bitrate_kbps: 96 },
        }
    }

    /// The format this quality setting encodes to.
    pub fn format(&self) -> TargetFormat {
        match self {
            Quality::Vorbis { .. } => TargetFormat::Vorbis,
            Quality::Flac { .. } => TargetFormat::Flac,
            Quality::Wav { .. } => TargetFormat::Wav,
            Quality::Mp3 { .. } => TargetFormat::Mp3,
            Quality::Aac { .. } => TargetFormat::Aac,
            Quality::Opus { .. } => TargetFormat::Opus,
        }
    }

    /// Reject values the encoders cannot honour.
    pub fn validate(&self) -> Result<()> {
        let problem = match *self {
            Quality::Vorbis { quality } if !(0.0..=1.0).contains(&quality) => {
                Some(format!("vorbis quality {quality} outside 0.0..=1.0"))
            }
            Quality::Flac { compression } if compression > 8 => {
                Some(format!("flac compression {compression} outside 0..=8"))
            }
            Quality::Wav { sample_width } if ![8, 16, 24, 32].contains(&sample_width) => {
                Some(format!("wav sample width {sample_width} not one of 8/16/24/32"))
            }
            Quality::Mp3 {
                mode: Mp3Mode::Vbr,
                value,
            } if value > 9 => Some(format!("mp3 vbr level {value} outside 0..=9")),
            Quality::Mp3 { mode, value } if mode != Mp3Mode::Vbr && !(32..=320).contains(&value) => {
                Some(format!("mp3 {mode} bitrate {value} kbps outside 32..=320"))
            }
            Quality::Aac { bitrate_kbps } | Quality::Opus { bitrate_kbps }
                if !(6..=512).contains(&bitrate_kbps) =>
            {
                Some(format!("bitrate {bitrate_kbps} kbps outside 6..=512"))
            }
            _ => None,
        };
        match problem {
            Some(message) => Err(Error::Validation(message)),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Vorbis { quality } => write!(f, "vorbis q{quality:.1}"),
            Quality::Flac { compression } => write!(f, "flac level {compression}"),
            Quality::Wav { sample_width } => write!(f, "wav {sample_width}-bit"),
            Quality::Mp3 {
                mode: Mp3Mode::Vbr,
                value,
            } => write!(f, "mp3 vbr V{value}"),
            Quality::Mp3 { mode, value } => write!(f, "mp3 {mode} {value} kbps"),
            Quality::Aac { bitrate_kbps } => write!(f, "aac {bitrate_kbps} kbps"),
            Quality::Opus { bitrate_kbps } => write!(f, "opus {bitrate_kbps} kbps"),
        }
    }
}

// ---------------------------------------------------------------------------
// EncodingParams
// ---------------------------------------------------------------------------

/// Everything the transcoder needs to know about the output of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingParams {
    pub quality: Quality,
    /// Resample to this rate in Hz; `None` keeps the source rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resample_rate: Option<u32>,
    /// Downmix to a single channel.
    #[serde(default)]
    pub force_mono: bool,
    /// Write Vorbis files as `.oga` instead of `.ogg`.
    #[serde(default)]
    pub oga_extension: bool,
}

impl EncodingParams {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            resample_rate: None,
            force_mono: false,
            oga_extension: false,
        }
    }

    pub fn format(&self) -> TargetFormat {
        self.quality.format()
    }

    /// File extension of the produced file, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self.format() {
            TargetFormat::Vorbis if self.oga_extension => "oga",
            other => other.extension(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.quality.validate()?;
        if let Some(rate) = self.resample_rate {
            if !(8_000..=192_000).contains(&rate) {
                return Err(Error::Validation(format!(
                    "resample rate {rate} Hz outside 8000..=192000"
                )));
            }
        }
        Ok(())
    }
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self::new(Quality::default_for(TargetFormat::Mp3))
    }
}

impl fmt::Display for EncodingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quality)?;
        if let Some(rate) = self.resample_rate {
            write!(f, ", {rate} Hz")?;
        }
        if self.force_mono {
            write!(f, ", mono")?;
        }
        Ok(())
    }
}
