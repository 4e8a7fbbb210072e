//! The ffmpeg-backed [`PipelineAdapter`].
//!
//! Each submission spawns one ffmpeg process writing into a hidden temporary
//! file next to the destination. On success the file is renamed into place
//! without clobbering; on failure or cancellation it is deleted.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

use soundforged_core::{Error, Result};
use soundforged_scheduler::{
    AdapterOutcome, FailureKind, FailureReason, JobDescriptor, PipelineAdapter, Submission,
    SubmissionSink,
};

use crate::command::ToolCommand;
use crate::encoder::ffmpeg_args;
use crate::tools::ToolRegistry;

/// Prefix of the temporary output files.
pub const TEMP_PREFIX: &str = ".soundforged-";

/// Stderr kept for failure messages.
const STDERR_LIMIT: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct FfmpegAdapter {
    ffmpeg: PathBuf,
}

impl FfmpegAdapter {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn from_registry(tools: &ToolRegistry) -> Result<Self> {
        Ok(Self::new(tools.ffmpeg()?))
    }

    fn temp_output(&self, destination: &Path, extension: &str) -> Result<TempPath> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::unwritable(destination, format!("cannot create {}: {e}", parent.display()))
        })?;
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&format!(".{extension}"))
            .tempfile_in(parent)
            .map_err(|e| {
                Error::unwritable(destination, format!("cannot create temporary file: {e}"))
            })?;
        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl PipelineAdapter for FfmpegAdapter {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn submit(&self, job: Arc<JobDescriptor>) -> Result<Submission> {
        let temp = self.temp_output(&job.destination, job.params.extension())?;

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(ffmpeg_args(&job.source.path, &temp, &job.params));
        let child = cmd.spawn()?;

        debug!(
            job_id = %job.id,
            temp = %temp.display(),
            args = ?cmd.get_args(),
            "ffmpeg started"
        );

        let (sink, submission) = Submission::channel();
        tokio::spawn(supervise(child, sink, temp, job));
        Ok(submission)
    }
}

/// Watch one ffmpeg process until it exits or the scheduler cancels it.
async fn supervise(mut child: Child, sink: SubmissionSink, temp: TempPath, job: Arc<JobDescriptor>) {
    let stderr = child.stderr.take().map(|err| tokio::spawn(read_limited(err)));
    let mut progress = ProgressParser::new(job.expected_work());

    let status = match child.stdout.take() {
        Some(stdout) => {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = sink.cancelled() => {
                        if let Err(e) = child.kill().await {
                            warn!(job_id = %job.id, error = %e, "failed to kill ffmpeg");
                        }
                        info!(job_id = %job.id, "ffmpeg stopped on request");
                        drop(temp);
                        sink.finish(AdapterOutcome::Cancelled).await;
                        return;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(fraction) = progress.feed(&line) {
                                sink.progress(fraction, progress.duration());
                            }
                        }
                        Ok(None) | Err(_) => break,
                    },
                }
            }
            child.wait().await
        }
        None => child.wait().await,
    };

    let stderr = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    if sink.is_cancelled() {
        drop(temp);
        sink.finish(AdapterOutcome::Cancelled).await;
        return;
    }

    let outcome = match status {
        Ok(status) if status.success() => finalize(temp, &job.destination),
        Ok(status) => {
            drop(temp);
            AdapterOutcome::Failure(classify_failure(status, &stderr))
        }
        Err(e) => {
            drop(temp);
            AdapterOutcome::Failure(FailureReason::new(
                FailureKind::Internal,
                format!("failed to wait for ffmpeg: {e}"),
            ))
        }
    };
    sink.finish(outcome).await;
}

/// Move the finished temporary file to its destination.
fn finalize(temp: TempPath, destination: &Path) -> AdapterOutcome {
    match temp.persist_noclobber(destination) {
        Ok(()) => AdapterOutcome::Success,
        // The returned path is dropped here, deleting the temporary file.
        Err(err) => AdapterOutcome::Failure(FailureReason::new(
            FailureKind::DestinationUnwritable,
            format!("cannot move output to {}: {}", destination.display(), err.error),
        )),
    }
}

/// Keep the head of a stream and discard the rest so the writer never blocks.
async fn read_limited<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buf = Vec::new();
    let _ = (&mut reader)
        .take(STDERR_LIMIT as u64)
        .read_to_end(&mut buf)
        .await;
    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&buf).into_owned()
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Turns ffmpeg `-progress` key=value lines into fractions.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration: Option<f64>,
    out_time_us: Option<i64>,
}

impl ProgressParser {
    /// `duration` is the expected length of the output in seconds.
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration: duration.filter(|d| d.is_finite() && *d > 0.0),
            out_time_us: None,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Feed one line. Returns a fraction at the end of each progress block.
    pub fn feed(&mut self, line: &str) -> Option<f32> {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("out_time_us=") {
            self.out_time_us = val.parse::<i64>().ok();
            return None;
        }
        let state = line.strip_prefix("progress=")?;
        if state == "end" {
            return Some(1.0);
        }
        let done = self.out_time_us? as f64 / 1_000_000.0;
        let total = self.duration?;
        Some((done / total).clamp(0.0, 1.0) as f32)
    }
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// Map ffmpeg's exit status and stderr to a failure reason.
pub fn classify_failure(status: ExitStatus, stderr: &str) -> FailureReason {
    let lower = stderr.to_ascii_lowercase();
    let kind = if lower.contains("no space left on device") || lower.contains("disk quota exceeded")
    {
        FailureKind::DiskFull
    } else if lower.contains("permission denied")
        || lower.contains("no such file or directory")
        || lower.contains("input/output error")
    {
        FailureKind::Io
    } else if lower.contains("invalid data found when processing input")
        || lower.contains("does not contain any stream")
        || lower.contains("output file #0 does not contain any stream")
        || lower.contains("unknown format")
    {
        FailureKind::UnsupportedFormat
    } else {
        FailureKind::Codec
    };

    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("ffmpeg exited with {status}"));
    FailureReason::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn progress_needs_duration() {
        let mut parser = ProgressParser::new(None);
        assert_eq!(parser.feed("out_time_us=1000000"), None);
        assert_eq!(parser.feed("progress=continue"), None);
        assert_eq!(parser.feed("progress=end"), Some(1.0));
    }

    #[test]
    fn progress_fraction_of_duration() {
        let mut parser = ProgressParser::new(Some(4.0));
        assert_eq!(parser.feed("bitrate=128.0kbits/s"), None);
        assert_eq!(parser.feed("out_time_us=1000000"), None);
        assert_eq!(parser.feed("progress=continue"), Some(0.25));
        parser.feed("out_time_us=9000000");
        assert_eq!(parser.feed("progress=continue"), Some(1.0));
    }

    #[test]
    fn progress_ignores_na() {
        let mut parser = ProgressParser::new(Some(10.0));
        parser.feed("out_time_us=N/A");
        assert_eq!(parser.feed("progress=continue"), None);
    }

    #[cfg(unix)]
    #[test]
    fn classifies_stderr() {
        let status = exit(1);
        let cases = [
            ("av_interleaved_write_frame(): No space left on device", FailureKind::DiskFull),
            ("/music/a.flac: Permission denied", FailureKind::Io),
            ("/music/a.flac: Invalid data found when processing input", FailureKind::UnsupportedFormat),
            ("Output file #0 does not contain any stream", FailureKind::UnsupportedFormat),
            ("Unknown encoder 'libfdk_aac'", FailureKind::Codec),
        ];
        for (stderr, kind) in cases {
            let reason = classify_failure(status, stderr);
            assert_eq!(reason.kind, kind, "{stderr}");
            assert_eq!(reason.message, stderr);
        }
    }

    #[cfg(unix)]
    #[test]
    fn empty_stderr_reports_status() {
        let reason = classify_failure(exit(69), "");
        assert_eq!(reason.kind, FailureKind::Codec);
        assert!(reason.message.contains("69"), "{}", reason.message);
    }

    #[test]
    fn finalize_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.mp3");
        std::fs::write(&dest, b"original").unwrap();

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir.path())
            .unwrap()
            .into_temp_path();
        let temp_path = temp.to_path_buf();

        let outcome = finalize(temp, &dest);
        assert!(matches!(
            outcome,
            AdapterOutcome::Failure(ref r) if r.kind == FailureKind::DestinationUnwritable
        ));
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
        assert!(!temp_path.exists());
    }
}
