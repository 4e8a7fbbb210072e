//! # soundforged-av
//!
//! ffmpeg and ffprobe integration for soundforged.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the paths to
//!   `ffmpeg` and `ffprobe`, honouring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Probing** ([`FfprobeProber`]) -- tags, duration and stream facts read
//!   from ffprobe's JSON output.
//! - **Encoding** ([`encoder`]) -- ffmpeg arguments for each target format.
//! - **Conversion** ([`FfmpegAdapter`]) -- the [`soundforged_scheduler::PipelineAdapter`]
//!   that runs one ffmpeg process per job.

pub mod adapter;
pub mod command;
pub mod encoder;
pub mod probe;
pub mod tools;

pub use adapter::{classify_failure, FfmpegAdapter, ProgressParser};
pub use command::{ToolCommand, ToolOutput};
pub use probe::{parse_ffprobe_json, FfprobeProber, ProbedAudio};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};
