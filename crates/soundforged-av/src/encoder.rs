//! ffmpeg arguments for one conversion.

use std::path::Path;

use soundforged_core::{EncodingParams, Mp3Mode, Quality, TargetFormat};

/// Output muxer for a target format. Passed explicitly because the temporary
/// output file's extension is not always one ffmpeg recognises.
pub fn muxer(format: TargetFormat) -> &'static str {
    match format {
        TargetFormat::Vorbis => "ogg",
        TargetFormat::Flac => "flac",
        TargetFormat::Wav => "wav",
        TargetFormat::Mp3 => "mp3",
        TargetFormat::Aac => "ipod",
        TargetFormat::Opus => "opus",
    }
}

/// Codec selection and quality flags.
pub fn codec_args(quality: &Quality) -> Vec<String> {
    let args: Vec<String> = match *quality {
        Quality::Vorbis { quality } => vec![
            "-c:a".into(),
            "libvorbis".into(),
            "-q:a".into(),
            format!("{:.1}", quality * 10.0),
        ],
        Quality::Flac { compression } => vec![
            "-c:a".into(),
            "flac".into(),
            "-compression_level".into(),
            compression.to_string(),
        ],
        Quality::Wav { sample_width } => {
            let codec = match sample_width {
                8 => "pcm_u8",
                24 => "pcm_s24le",
                32 => "pcm_s32le",
                _ => "pcm_s16le",
            };
            vec!["-c:a".into(), codec.into()]
        }
        Quality::Mp3 { mode, value } => {
            let mut args = vec!["-c:a".to_string(), "libmp3lame".to_string()];
            match mode {
                Mp3Mode::Cbr => args.extend(["-b:a".to_string(), format!("{value}k")]),
                Mp3Mode::Abr => args.extend([
                    "-b:a".to_string(),
                    format!("{value}k"),
                    "-abr".to_string(),
                    "1".to_string(),
                ]),
                Mp3Mode::Vbr => args.extend(["-q:a".to_string(), value.to_string()]),
            }
            args
        }
        Quality::Aac { bitrate_kbps } => vec![
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{bitrate_kbps}k"),
        ],
        Quality::Opus { bitrate_kbps } => vec![
            "-c:a".into(),
            "libopus".into(),
            "-b:a".into(),
            format!("{bitrate_kbps}k"),
            "-vbr".into(),
            "on".into(),
        ],
    };
    args
}

/// The full ffmpeg argument list converting `input` into `output`.
///
/// Progress goes to stdout in `-progress` key=value form; stderr carries
/// errors only.
pub fn ffmpeg_args(input: &Path, output: &Path, params: &EncodingParams) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        "-y",
        "-progress",
        "pipe:1",
        "-nostats",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(input.to_string_lossy().into_owned());

    args.extend(["-vn", "-map", "0:a:0", "-map_metadata", "0"].map(String::from));
    if let Some(rate) = params.resample_rate {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }
    if params.force_mono {
        args.extend(["-ac".to_string(), "1".to_string()]);
    }
    args.extend(codec_args(&params.quality));
    args.extend(["-f".to_string(), muxer(params.format()).to_string()]);
    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(quality: Quality) -> String {
        codec_args(&quality).join(" ")
    }

    #[test]
    fn codec_flags_per_format() {
        assert_eq!(joined(Quality::Vorbis { quality: 0.6 }), "-c:a libvorbis -q:a 6.0");
        assert_eq!(
            joined(Quality::Flac { compression: 5 }),
            "-c:a flac -compression_level 5"
        );
        assert_eq!(joined(Quality::Wav { sample_width: 8 }), "-c:a pcm_u8");
        assert_eq!(joined(Quality::Wav { sample_width: 24 }), "-c:a pcm_s24le");
        assert_eq!(
            joined(Quality::Aac { bitrate_kbps: 192 }),
            "-c:a aac -b:a 192k"
        );
        assert_eq!(
            joined(Quality::Opus { bitrate_kbps: 96 }),
            "-c:a libopus -b:a 96k -vbr on"
        );
    }

    #[test]
    fn mp3_modes() {
        let cbr = Quality::Mp3 {
            mode: Mp3Mode::Cbr,
            value: 320,
        };
        let abr = Quality::Mp3 {
            mode: Mp3Mode::Abr,
            value: 192,
        };
        let vbr = Quality::Mp3 {
            mode: Mp3Mode::Vbr,
            value: 2,
        };
        assert_eq!(joined(cbr), "-c:a libmp3lame -b:a 320k");
        assert_eq!(joined(abr), "-c:a libmp3lame -b:a 192k -abr 1");
        assert_eq!(joined(vbr), "-c:a libmp3lame -q:a 2");
    }

    #[test]
    fn full_command_line() {
        let mut params = EncodingParams::new(Quality::Flac { compression: 8 });
        params.resample_rate = Some(48_000);
        params.force_mono = true;

        let args = ffmpeg_args(
            Path::new("/in/a.wav"),
            Path::new("/out/.soundforged-x.flac"),
            &params,
        );
        let line = args.join(" ");
        assert!(line.starts_with("-hide_banner -nostdin"));
        assert!(line.contains("-progress pipe:1"));
        assert!(line.contains("-i /in/a.wav -vn -map 0:a:0"));
        assert!(line.contains("-ar 48000 -ac 1"));
        assert!(line.contains("-f flac"));
        assert_eq!(args.last().unwrap(), "/out/.soundforged-x.flac");
    }

    #[test]
    fn default_params_keep_rate_and_channels() {
        let args = ffmpeg_args(Path::new("a.flac"), Path::new("a.mp3"), &EncodingParams::default());
        assert!(!args.iter().any(|a| a == "-ar" || a == "-ac"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "mp3"));
    }
}
