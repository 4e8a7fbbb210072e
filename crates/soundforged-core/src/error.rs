//! Unified error type for soundforged.
//!
//! Library crates funnel their failures into [`Error`]. A conversion that
//! fails inside a running job is not an `Error`: it is recorded on the job as
//! a failure reason and never escapes the scheduler.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::ids::JobId;

/// Unified error type covering all failure modes in soundforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A naming template is malformed or references an unknown field.
    #[error("Invalid template {template:?}: {reason}")]
    InvalidTemplate {
        /// The template text as supplied.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The destination is already owned by another live job.
    #[error("Duplicate destination {}: already claimed by job {owner}", path.display())]
    DuplicateDestination {
        /// The contested destination path.
        path: PathBuf,
        /// The job currently holding the claim.
        owner: JobId,
    },

    /// Pre-flight found the destination cannot be written.
    #[error("Destination unwritable {}: {reason}", path.display())]
    DestinationUnwritable {
        /// The destination path that was checked.
        path: PathBuf,
        /// Human-readable cause (disk full, permission denied, ...).
        reason: String,
    },

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "job").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation is not allowed in the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Reading source metadata failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The scheduler task has shut down and no longer accepts commands.
    #[error("Scheduler is no longer running")]
    SchedulerClosed,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidTemplate`].
    pub fn invalid_template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidTemplate {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::DestinationUnwritable`].
    pub fn unwritable(path: &Path, reason: impl Into<String>) -> Self {
        Error::DestinationUnwritable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_template_display() {
        let err = Error::invalid_template("{artst}.mp3", "unknown field `artst`");
        assert_eq!(
            err.to_string(),
            "Invalid template \"{artst}.mp3\": unknown field `artst`"
        );
    }

    #[test]
    fn duplicate_destination_display() {
        let err = Error::DuplicateDestination {
            path: PathBuf::from("/out/a.mp3"),
            owner: JobId::from_raw(4),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate destination /out/a.mp3: already claimed by job 4"
        );
    }

    #[test]
    fn unwritable_display() {
        let err = Error::unwritable(Path::new("/ro/x.ogg"), "permission denied");
        assert_eq!(
            err.to_string(),
            "Destination unwritable /ro/x.ogg: permission denied"
        );
    }

    #[test]
    fn not_found_display() {
        let err = Error::not_found("job", JobId::from_raw(9));
        assert_eq!(err.to_string(), "job not found: 9");
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn scheduler_closed_display() {
        assert_eq!(
            Error::SchedulerClosed.to_string(),
            "Scheduler is no longer running"
        );
    }
}
