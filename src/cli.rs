use clap::{Parser, Subcommand};
use soundforged_core::TargetFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "soundforged")]
#[command(author, version, about = "Batch audio converter")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

fn parse_format(s: &str) -> Result<TargetFormat, String> {
    s.parse::<TargetFormat>().map_err(|e| e.to_string())
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert audio files and folders
    Convert {
        /// Files or folders to convert
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Folder to write converted files to (default: next to each source)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Target format (vorbis, flac, wav, mp3, aac, opus)
        #[arg(short, long, value_parser = parse_format)]
        format: Option<TargetFormat>,

        /// Filename pattern, e.g. "{album_artist}/{album}/{track_number} - {title}.{target_extension}"
        #[arg(short, long)]
        pattern: Option<String>,

        /// Number of parallel conversions (default: one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Descend into folders
        #[arg(short, long)]
        recursive: bool,

        /// Print the planned destinations without converting
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe an audio file and display its tags
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// List supported target formats
    Formats,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
