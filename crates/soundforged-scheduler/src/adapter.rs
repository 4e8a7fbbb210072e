//! The boundary to the external transcoding engine.
//!
//! An adapter turns one [`JobDescriptor`] into a [`Submission`]: a stream of
//! [`AdapterEvent`]s ending in exactly one terminal outcome, plus a
//! cancellation handle. Adapters report through a [`SubmissionSink`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use soundforged_core::Result;

use crate::job::{FailureReason, JobDescriptor};

/// Buffered events per submission. Progress beyond this is dropped, the
/// terminal event never is.
const EVENT_BUFFER: usize = 32;

/// A progress report for a running submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTick {
    /// Fraction done, 0.0 to 1.0.
    pub fraction: f32,
    /// Total work in seconds of audio, if the engine learned it.
    pub work_total: Option<f64>,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterOutcome {
    Success,
    Failure(FailureReason),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Progress(ProgressTick),
    Finished(AdapterOutcome),
}

/// Narrow interface to the transcoding engine.
///
/// `submit` must return promptly: the work itself runs in the background and
/// reports through the returned [`Submission`]. Implementations must cope with
/// as many outstanding submissions as the scheduler's concurrency limit.
#[async_trait]
pub trait PipelineAdapter: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Start converting `job`.
    async fn submit(&self, job: Arc<JobDescriptor>) -> Result<Submission>;
}

/// The scheduler's end of one submission.
#[derive(Debug)]
pub struct Submission {
    events: mpsc::Receiver<AdapterEvent>,
    cancel: CancellationToken,
}

impl Submission {
    /// Create a connected sink/submission pair.
    pub fn channel() -> (SubmissionSink, Submission) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        (
            SubmissionSink {
                tx,
                cancel: cancel.clone(),
            },
            Submission { events: rx, cancel },
        )
    }

    /// Next event, or `None` once every sink is gone.
    pub async fn next_event(&mut self) -> Option<AdapterEvent> {
        self.events.recv().await
    }

    /// Ask the engine to stop. Best effort; the engine acknowledges with a
    /// terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The adapter's end of one submission.
#[derive(Debug, Clone)]
pub struct SubmissionSink {
    tx: mpsc::Sender<AdapterEvent>,
    cancel: CancellationToken,
}

impl SubmissionSink {
    /// Report progress. Dropped silently when the scheduler is behind.
    pub fn progress(&self, fraction: f32, work_total: Option<f64>) {
        let tick = ProgressTick {
            fraction: fraction.clamp(0.0, 1.0),
            work_total,
        };
        let _ = self.tx.try_send(AdapterEvent::Progress(tick));
    }

    /// Report the terminal outcome.
    pub async fn finish(&self, outcome: AdapterOutcome) {
        let _ = self.tx.send(AdapterEvent::Finished(outcome)).await;
    }

    /// Resolves when the scheduler asks for cancellation.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token that fires on cancellation, for handing to helpers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
