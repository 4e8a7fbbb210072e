//! One task per running job: pre-flight, submission, event relay.
//!
//! Workers never touch scheduler state. Everything they learn is sent back to
//! the scheduler task as a [`WorkerEvent`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use soundforged_core::JobId;

use crate::adapter::{AdapterEvent, AdapterOutcome, PipelineAdapter, ProgressTick};
use crate::job::{FailureKind, FailureReason, JobDescriptor};
use crate::preflight::check_destination;

/// What a worker reports back to the scheduler task.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Progress {
        id: JobId,
        attempt: u32,
        tick: ProgressTick,
    },
    Finished {
        id: JobId,
        attempt: u32,
        outcome: AdapterOutcome,
    },
}

pub(crate) struct WorkerContext {
    pub adapter: Arc<dyn PipelineAdapter>,
    pub job: Arc<JobDescriptor>,
    pub attempt: u32,
    pub cancel: CancellationToken,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
    /// `Some(min_free_bytes)` when pre-flight is enabled.
    pub preflight: Option<u64>,
}

pub(crate) async fn drive_job(ctx: WorkerContext) {
    let id = ctx.job.id;
    let attempt = ctx.attempt;
    let events = ctx.events.clone();
    let outcome = run_submission(ctx).await;
    let _ = events.send(WorkerEvent::Finished {
        id,
        attempt,
        outcome,
    });
}

async fn run_submission(ctx: WorkerContext) -> AdapterOutcome {
    let WorkerContext {
        adapter,
        job,
        attempt,
        cancel,
        events,
        preflight,
    } = ctx;

    if let Some(min_free_bytes) = preflight {
        let destination = job.destination.clone();
        let checked =
            tokio::task::spawn_blocking(move || check_destination(&destination, min_free_bytes))
                .await;
        match checked {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(job_id = %job.id, error = %err, "pre-flight rejected destination");
                return AdapterOutcome::Failure(FailureReason::from_error(&err));
            }
            Err(join) => {
                return AdapterOutcome::Failure(FailureReason::new(
                    FailureKind::Internal,
                    format!("pre-flight task failed: {join}"),
                ));
            }
        }
    }

    if cancel.is_cancelled() {
        return AdapterOutcome::Cancelled;
    }

    let mut submission = match adapter.submit(Arc::clone(&job)).await {
        Ok(submission) => submission,
        Err(err) => {
            warn!(job_id = %job.id, adapter = adapter.name(), error = %err, "submission rejected");
            return AdapterOutcome::Failure(FailureReason::from_error(&err));
        }
    };

    let mut cancel_sent = false;
    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !cancel_sent => {
                debug!(job_id = %job.id, "forwarding cancellation to adapter");
                submission.cancel();
                cancel_sent = true;
            }
            event = submission.next_event() => match event {
                Some(AdapterEvent::Progress(tick)) => {
                    if !cancel_sent {
                        let _ = events.send(WorkerEvent::Progress { id: job.id, attempt, tick });
                    }
                }
                // Whatever the engine says after a cancel request, the job
                // ends cancelled.
                Some(AdapterEvent::Finished(_)) if cancel_sent => return AdapterOutcome::Cancelled,
                Some(AdapterEvent::Finished(outcome)) => return outcome,
                None if cancel_sent => return AdapterOutcome::Cancelled,
                None => {
                    return AdapterOutcome::Failure(FailureReason::new(
                        FailureKind::Internal,
                        format!("{} closed the event stream without a result", adapter.name()),
                    ));
                }
            },
        }
    }
}
