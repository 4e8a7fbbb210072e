//! Job descriptors, job states, and failure reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use soundforged_core::{EncodingParams, Error, JobId, SourceFile};

/// Classes of per-job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedFormat,
    Io,
    Codec,
    DiskFull,
    DestinationUnwritable,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnsupportedFormat => "unsupported format",
            Self::Io => "I/O error",
            Self::Codec => "codec error",
            Self::DiskFull => "disk full",
            Self::DestinationUnwritable => "destination unwritable",
            Self::Internal => "internal error",
        };
        f.write_str(text)
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify an error raised before or during submission.
    pub fn from_error(err: &Error) -> Self {
        let kind = match err {
            Error::DestinationUnwritable { reason, .. } if reason.starts_with("disk full") => {
                FailureKind::DiskFull
            }
            Error::DestinationUnwritable { .. } | Error::DuplicateDestination { .. } => {
                FailureKind::DestinationUnwritable
            }
            Error::Io { .. } => FailureKind::Io,
            Error::Probe(_) => FailureKind::UnsupportedFormat,
            _ => FailureKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Lifecycle of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed { reason: FailureReason },
    Skipped,
    Cancelled,
}

impl JobState {
    pub fn failed(reason: FailureReason) -> Self {
        JobState::Failed { reason }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed { .. } | JobState::Skipped | JobState::Cancelled
        )
    }

    /// States that own their destination path.
    pub fn holds_destination(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Running | JobState::Succeeded)
    }

    /// Allowed moves. Only a failed job may go back to pending.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Skipped)
                | (Pending, Cancelled)
                | (Running, Succeeded)
                | (Running, Failed { .. })
                | (Running, Cancelled)
                | (Failed { .. }, Pending)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::Skipped => "skipped",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// A conversion request before the scheduler has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source: SourceFile,
    pub destination: PathBuf,
    pub params: EncodingParams,
}

impl NewJob {
    pub fn new(source: SourceFile, destination: impl Into<PathBuf>, params: EncodingParams) -> Self {
        Self {
            source,
            destination: destination.into(),
            params,
        }
    }
}

/// Immutable description of one conversion unit. State lives with the
/// scheduler, not here.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub source: SourceFile,
    pub destination: PathBuf,
    pub params: EncodingParams,
    pub enqueued_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub(crate) fn from_request(id: JobId, request: NewJob) -> Self {
        Self {
            id,
            source: request.source,
            destination: request.destination,
            params: request.params,
            enqueued_at: Utc::now(),
        }
    }

    /// Expected amount of work in seconds of audio, when known.
    pub fn expected_work(&self) -> Option<f64> {
        self.source.duration_secs.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Short name for logs.
    pub fn display_name(&self) -> String {
        self.source
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.path.display().to_string())
    }
}

/// A read-only copy of one job as it appears in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub params: EncodingParams,
    pub state: JobState,
    /// 0.0 to 1.0 for the current attempt.
    pub progress: f32,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn reason() -> FailureReason {
        FailureReason::new(FailureKind::Codec, "boom")
    }

    #[test]
    fn forward_transitions() {
        assert!(JobState::Pending.can_transition_to(&JobState::Running));
        assert!(JobState::Pending.can_transition_to(&JobState::Cancelled));
        assert!(JobState::Pending.can_transition_to(&JobState::Skipped));
        assert!(JobState::Running.can_transition_to(&JobState::Succeeded));
        assert!(JobState::Running.can_transition_to(&JobState::failed(reason())));
        assert!(JobState::Running.can_transition_to(&JobState::Cancelled));
    }

    #[test]
    fn only_failed_jobs_reenter_pending() {
        assert!(JobState::failed(reason()).can_transition_to(&JobState::Pending));
        assert!(!JobState::Succeeded.can_transition_to(&JobState::Pending));
        assert!(!JobState::Cancelled.can_transition_to(&JobState::Pending));
        assert!(!JobState::Skipped.can_transition_to(&JobState::Pending));
        assert!(!JobState::Running.can_transition_to(&JobState::Pending));
    }

    #[test]
    fn no_backward_or_sideways_moves() {
        assert!(!JobState::Succeeded.can_transition_to(&JobState::Running));
        assert!(!JobState::Cancelled.can_transition_to(&JobState::Succeeded));
        assert!(!JobState::Pending.can_transition_to(&JobState::Succeeded));
        assert!(!JobState::failed(reason()).can_transition_to(&JobState::Succeeded));
    }

    #[test]
    fn destination_holders() {
        assert!(JobState::Pending.holds_destination());
        assert!(JobState::Running.holds_destination());
        assert!(JobState::Succeeded.holds_destination());
        assert!(!JobState::failed(reason()).holds_destination());
        assert!(!JobState::Cancelled.holds_destination());
        assert!(!JobState::Skipped.holds_destination());
    }

    #[test]
    fn failure_classification() {
        let full = Error::unwritable(Path::new("/o/a.mp3"), "disk full: 10 bytes free");
        assert_eq!(FailureReason::from_error(&full).kind, FailureKind::DiskFull);

        let ro = Error::unwritable(Path::new("/o/a.mp3"), "permission denied");
        assert_eq!(
            FailureReason::from_error(&ro).kind,
            FailureKind::DestinationUnwritable
        );

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(FailureReason::from_error(&io).kind, FailureKind::Io);

        let tool = Error::tool("ffmpeg", "not found");
        assert_eq!(FailureReason::from_error(&tool).kind, FailureKind::Internal);
    }

    #[test]
    fn display() {
        assert_eq!(JobState::Pending.to_string(), "pending");
        assert_eq!(
            JobState::failed(reason()).to_string(),
            "failed (codec error: boom)"
        );
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_string(&JobState::failed(reason())).unwrap();
        assert_eq!(
            json,
            r#"{"state":"failed","reason":{"kind":"codec","message":"boom"}}"#
        );
    }

    #[test]
    fn expected_work_ignores_nonsense() {
        let mut desc = JobDescriptor::from_request(
            JobId::from_raw(1),
            NewJob::new(
                SourceFile::new("/in/a.flac"),
                "/out/a.mp3",
                EncodingParams::default(),
            ),
        );
        assert_eq!(desc.expected_work(), None);
        desc.source.duration_secs = Some(0.0);
        assert_eq!(desc.expected_work(), None);
        desc.source.duration_secs = Some(12.5);
        assert_eq!(desc.expected_work(), Some(12.5));
        assert_eq!(desc.display_name(), "a.flac");
    }
}
