//! Observable queue state for presentation layers.
//!
//! The scheduler task publishes immutable [`QueueSnapshot`]s into a `watch`
//! channel. Readers never see scheduler internals, and a slow reader simply
//! skips intermediate snapshots: notifications coalesce.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::watch;

use soundforged_core::JobId;

use crate::job::{FailureReason, JobState, JobView};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Where the current (or last) run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run has started yet.
    Idle,
    Running,
    /// Admission stopped; running jobs continue.
    Paused,
    /// Cancel-all requested; waiting for running jobs to acknowledge.
    Cancelling,
    /// Drained without cancellation.
    Finished,
    /// Ended by cancel-all.
    Cancelled,
}

impl RunStatus {
    /// True while the run still owns slots or may admit jobs.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused | RunStatus::Cancelling)
    }
}

/// Per-run tallies, counted over jobs that took part in the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunCounters {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    /// Seconds of audio converted successfully.
    pub processed_secs: f64,
}

impl RunCounters {
    pub fn finished(&self) -> usize {
        self.completed + self.failed + self.cancelled + self.skipped
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub concurrency: usize,
    pub counters: RunCounters,
    /// Jobs that took part in the run in any state.
    pub participants: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn idle() -> Self {
        Self {
            status: RunStatus::Idle,
            concurrency: 0,
            counters: RunCounters::default(),
            participants: 0,
            started_at: None,
            finished_at: None,
            elapsed_secs: 0.0,
        }
    }

    /// The whole-run failure indicator: every job of a finished run failed.
    pub fn all_failed(&self) -> bool {
        !self.status.is_active()
            && self.counters.failed > 0
            && self.counters.failed == self.participants
    }
}

/// One entry of the error list.
#[derive(Debug, Clone, Serialize)]
pub struct JobErrorRecord {
    pub job_id: JobId,
    pub source: PathBuf,
    pub reason: FailureReason,
    pub at: DateTime<Utc>,
}

/// An immutable view of the whole queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    /// Increases with every publication.
    pub revision: u64,
    /// Jobs in queue order.
    pub jobs: Vec<JobView>,
    pub run: RunSummary,
    /// Weighted overall progress, 0.0 to 1.0.
    pub progress: f32,
    pub errors: Vec<JobErrorRecord>,
}

impl QueueSnapshot {
    pub fn empty() -> Self {
        Self {
            revision: 0,
            jobs: Vec::new(),
            run: RunSummary::idle(),
            progress: 0.0,
            errors: Vec::new(),
        }
    }

    pub fn job(&self, id: JobId) -> Option<&JobView> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn count(&self, pred: impl Fn(&JobState) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.state)).count()
    }

    pub fn running(&self) -> usize {
        self.count(|s| *s == JobState::Running)
    }

    pub fn pending(&self) -> usize {
        self.count(|s| *s == JobState::Pending)
    }

    pub fn states(&self) -> Vec<JobState> {
        self.jobs.iter().map(|j| j.state.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Writer side, owned by the scheduler task.
#[derive(Debug)]
pub(crate) struct StorePublisher {
    tx: watch::Sender<Arc<QueueSnapshot>>,
}

impl StorePublisher {
    pub(crate) fn new() -> (Self, QueueStateStore) {
        let (tx, rx) = watch::channel(Arc::new(QueueSnapshot::empty()));
        (Self { tx }, QueueStateStore { rx })
    }

    pub(crate) fn publish(&self, snapshot: QueueSnapshot) {
        self.tx.send_replace(Arc::new(snapshot));
    }
}

/// Read side of the queue state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct QueueStateStore {
    rx: watch::Receiver<Arc<QueueSnapshot>>,
}

impl QueueStateStore {
    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<QueueSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// A subscription that wakes on changes. Bursts of changes between two
    /// wake-ups are delivered as one.
    pub fn subscribe(&self) -> StoreSubscription {
        let mut rx = self.rx.clone();
        drop(rx.borrow_and_update());
        StoreSubscription { rx }
    }
}

/// Change notifications for a [`QueueStateStore`].
#[derive(Debug)]
pub struct StoreSubscription {
    rx: watch::Receiver<Arc<QueueSnapshot>>,
}

impl StoreSubscription {
    pub fn current(&self) -> Arc<QueueSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait for the next publication. `None` once the scheduler is gone.
    pub async fn changed(&mut self) -> Option<Arc<QueueSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// Wait until a snapshot satisfies `pred`, checking the current one
    /// first. `None` if the scheduler goes away before that.
    pub async fn wait_until(
        &mut self,
        pred: impl Fn(&QueueSnapshot) -> bool,
    ) -> Option<Arc<QueueSnapshot>> {
        loop {
            let current = Arc::clone(&self.rx.borrow_and_update());
            if pred(&current) {
                return Some(current);
            }
            self.rx.changed().await.ok()?;
        }
    }
}
