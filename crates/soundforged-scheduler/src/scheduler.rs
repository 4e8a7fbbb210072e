//! The conversion scheduler.
//!
//! A single tokio task owns the queue, job states, destination table and run
//! counters. Callers talk to it through a cloneable [`SchedulerHandle`]; job
//! workers report back through an internal channel. Nothing else mutates
//! scheduler state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use soundforged_core::{Error, JobId, JobIdAllocator, Result};

use crate::adapter::{AdapterOutcome, PipelineAdapter, ProgressTick};
use crate::job::{JobDescriptor, JobState, JobView, NewJob};
use crate::progress;
use crate::store::{
    JobErrorRecord, QueueSnapshot, QueueStateStore, RunCounters, RunStatus, RunSummary,
    StorePublisher, StoreSubscription,
};
use crate::worker::{drive_job, WorkerContext, WorkerEvent};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Scheduler settings, fixed for the lifetime of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Run destination checks before handing a job to the adapter.
    pub preflight: bool,
    /// Pre-flight fails with "disk full" below this many free bytes.
    pub min_free_bytes: u64,
    /// Minimum spacing between progress-only snapshot publications.
    pub publish_interval: Duration,
}

/// `tokio::time::interval` rejects a zero period.
const MIN_PUBLISH_INTERVAL: Duration = Duration::from_millis(1);

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            preflight: true,
            min_free_bytes: 16 * 1024 * 1024,
            publish_interval: Duration::from_millis(100),
        }
    }
}

/// Which jobs a cancel request applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelTarget {
    Job(JobId),
    /// Every pending and running job; also stops admission for the run.
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelSummary {
    /// Pending jobs moved straight to cancelled.
    pub cancelled_pending: usize,
    /// Running jobs asked to stop; they turn cancelled on acknowledgement.
    pub signalled_running: usize,
}

/// A job refused by [`SchedulerHandle::enqueue`].
#[derive(Debug)]
pub struct RejectedJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct EnqueueReport {
    /// Ids of accepted jobs, in submission order.
    pub accepted: Vec<JobId>,
    pub rejected: Vec<RejectedJob>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    Enqueue(Vec<NewJob>, oneshot::Sender<EnqueueReport>),
    Start(usize, oneshot::Sender<Result<()>>),
    Pause(oneshot::Sender<Result<()>>),
    Resume(oneshot::Sender<Result<()>>),
    Cancel(CancelTarget, oneshot::Sender<Result<CancelSummary>>),
    Retry(JobId, oneshot::Sender<Result<()>>),
    Skip(JobId, oneshot::Sender<Result<()>>),
    Remove(JobId, oneshot::Sender<Result<()>>),
    ClearFinished(oneshot::Sender<usize>),
}

/// Cloneable front door to the scheduler task.
///
/// The task runs until every handle is dropped; at that point running jobs
/// are cancelled and the task exits once they have acknowledged.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    store: QueueStateStore,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Enqueue(..) => "Enqueue",
            Command::Start(..) => "Start",
            Command::Pause(..) => "Pause",
            Command::Resume(..) => "Resume",
            Command::Cancel(..) => "Cancel",
            Command::Retry(..) => "Retry",
            Command::Skip(..) => "Skip",
            Command::Remove(..) => "Remove",
            Command::ClearFinished(..) => "ClearFinished",
        };
        f.write_str(name)
    }
}

impl SchedulerHandle {
    /// Spawn the scheduler task on the current tokio runtime.
    pub fn spawn(adapter: Arc<dyn PipelineAdapter>, config: SchedulerConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (publisher, store) = StorePublisher::new();

        let config = SchedulerConfig {
            publish_interval: config.publish_interval.max(MIN_PUBLISH_INTERVAL),
            ..config
        };
        let core = SchedulerCore::new(adapter, config, events_tx, publisher);
        tokio::spawn(core.run(commands_rx, events_rx));

        Self {
            commands: commands_tx,
            store,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| Error::SchedulerClosed)?;
        rx.await.map_err(|_| Error::SchedulerClosed)
    }

    /// Append jobs in order. Jobs whose destination is already owned by a
    /// pending, running or succeeded job are rejected; the rest proceed.
    pub async fn enqueue(&self, jobs: Vec<NewJob>) -> Result<EnqueueReport> {
        if jobs.is_empty() {
            return Ok(EnqueueReport::default());
        }
        self.request(|tx| Command::Enqueue(jobs, tx)).await
    }

    /// Start a run admitting up to `concurrency` jobs at once.
    pub async fn start(&self, concurrency: usize) -> Result<()> {
        self.request(|tx| Command::Start(concurrency, tx)).await?
    }

    /// Stop admitting new jobs. Running jobs continue.
    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await?
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await?
    }

    pub async fn cancel(&self, target: CancelTarget) -> Result<CancelSummary> {
        self.request(|tx| Command::Cancel(target, tx)).await?
    }

    pub async fn cancel_job(&self, id: JobId) -> Result<CancelSummary> {
        self.cancel(CancelTarget::Job(id)).await
    }

    pub async fn cancel_all(&self) -> Result<CancelSummary> {
        self.cancel(CancelTarget::All).await
    }

    /// Put a failed job back in line behind the currently pending ones.
    ///
    /// A finished run is resumed at its last concurrency, so the job is
    /// admitted without another `start`.
    pub async fn retry(&self, id: JobId) -> Result<()> {
        self.request(|tx| Command::Retry(id, tx)).await?
    }

    /// Mark a pending job as skipped.
    pub async fn skip(&self, id: JobId) -> Result<()> {
        self.request(|tx| Command::Skip(id, tx)).await?
    }

    /// Drop a job that is not running from the queue.
    pub async fn remove(&self, id: JobId) -> Result<()> {
        self.request(|tx| Command::Remove(id, tx)).await?
    }

    /// Drop every finished job. Returns how many were removed.
    pub async fn clear_finished(&self) -> Result<usize> {
        self.request(Command::ClearFinished).await
    }

    /// The latest published queue state.
    pub fn snapshot(&self) -> Arc<QueueSnapshot> {
        self.store.snapshot()
    }

    pub fn store(&self) -> QueueStateStore {
        self.store.clone()
    }

    pub fn subscribe(&self) -> StoreSubscription {
        self.store.subscribe()
    }

    /// Wait until no run is active and return the final snapshot.
    pub async fn wait_for_run(&self) -> Result<Arc<QueueSnapshot>> {
        self.subscribe()
            .wait_until(|s| !s.run.status.is_active())
            .await
            .ok_or(Error::SchedulerClosed)
    }
}

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

struct JobEntry {
    descriptor: Arc<JobDescriptor>,
    state: JobState,
    progress: f32,
    /// Work reported by the adapter, overriding the probed duration.
    work_total: Option<f64>,
    attempts: u32,
    cancel: Option<CancellationToken>,
    cancel_requested: bool,
    /// Generation of the last run this job took part in.
    run_generation: Option<u64>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn new(descriptor: Arc<JobDescriptor>) -> Self {
        Self {
            descriptor,
            state: JobState::Pending,
            progress: 0.0,
            work_total: None,
            attempts: 0,
            cancel: None,
            cancel_requested: false,
            run_generation: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn set_state(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
            self.cancel = None;
        }
        self.state = next;
    }

    fn weight(&self) -> Option<f64> {
        self.work_total.or_else(|| self.descriptor.expected_work())
    }

    fn fraction(&self) -> f32 {
        match self.state {
            JobState::Pending => 0.0,
            JobState::Running => self.progress,
            _ => 1.0,
        }
    }

    fn view(&self) -> JobView {
        JobView {
            id: self.descriptor.id,
            source: self.descriptor.source.path.clone(),
            destination: self.descriptor.destination.clone(),
            params: self.descriptor.params.clone(),
            state: self.state.clone(),
            progress: self.progress,
            attempts: self.attempts,
            enqueued_at: self.descriptor.enqueued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

struct RunState {
    generation: u64,
    active: bool,
    concurrency: usize,
    running: HashSet<JobId>,
    paused: bool,
    cancelled: bool,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    finished_at: Option<DateTime<Utc>>,
    elapsed: Duration,
}

impl RunState {
    fn idle() -> Self {
        Self {
            generation: 0,
            active: false,
            concurrency: 0,
            running: HashSet::new(),
            paused: false,
            cancelled: false,
            started_at: None,
            started: None,
            finished_at: None,
            elapsed: Duration::ZERO,
        }
    }

    fn status(&self) -> RunStatus {
        match (self.active, self.generation) {
            (false, 0) => RunStatus::Idle,
            (false, _) if self.cancelled => RunStatus::Cancelled,
            (false, _) => RunStatus::Finished,
            (true, _) if self.cancelled => RunStatus::Cancelling,
            (true, _) if self.paused => RunStatus::Paused,
            (true, _) => RunStatus::Running,
        }
    }

    fn elapsed(&self) -> Duration {
        match (self.active, self.started) {
            (true, Some(started)) => started.elapsed(),
            _ => self.elapsed,
        }
    }
}

struct SchedulerCore {
    adapter: Arc<dyn PipelineAdapter>,
    config: SchedulerConfig,
    ids: JobIdAllocator,
    jobs: HashMap<JobId, JobEntry>,
    /// Display order.
    order: Vec<JobId>,
    /// Admission order of pending jobs.
    pending: VecDeque<JobId>,
    /// Destination path table.
    destinations: HashMap<PathBuf, JobId>,
    run: RunState,
    errors: Vec<JobErrorRecord>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    publisher: StorePublisher,
    revision: u64,
    dirty: bool,
}

impl SchedulerCore {
    fn new(
        adapter: Arc<dyn PipelineAdapter>,
        config: SchedulerConfig,
        events_tx: mpsc::UnboundedSender<WorkerEvent>,
        publisher: StorePublisher,
    ) -> Self {
        Self {
            adapter,
            config,
            ids: JobIdAllocator::new(),
            jobs: HashMap::new(),
            order: Vec::new(),
            pending: VecDeque::new(),
            destinations: HashMap::new(),
            run: RunState::idle(),
            errors: Vec::new(),
            events_tx,
            publisher,
            revision: 0,
            dirty: false,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        info!(adapter = self.adapter.name(), "scheduler started");
        let mut ticker = tokio::time::interval(self.config.publish_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut accepting = true;

        loop {
            tokio::select! {
                command = commands.recv(), if accepting => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        accepting = false;
                        self.shutdown();
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = ticker.tick() => {
                    if self.dirty {
                        self.publish();
                    }
                }
            }

            if !accepting && self.run.running.is_empty() {
                break;
            }
        }

        self.publish();
        info!("scheduler stopped");
    }

    // ---- commands -------------------------------------------------------

    fn handle_command(&mut self, command: Command) {
        debug!(?command, "scheduler command");
        // Replies go out only once the resulting state is published.
        match command {
            Command::Enqueue(jobs, reply) => {
                let report = self.enqueue(jobs);
                self.settle();
                let _ = reply.send(report);
            }
            Command::Start(concurrency, reply) => {
                let result = self.start(concurrency);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = self.set_paused(true);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Resume(reply) => {
                let result = self.set_paused(false);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Cancel(target, reply) => {
                let result = self.cancel(target);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Retry(id, reply) => {
                let result = self.retry(id);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Skip(id, reply) => {
                let result = self.skip(id);
                self.settle();
                let _ = reply.send(result);
            }
            Command::Remove(id, reply) => {
                let result = self.remove(id);
                self.settle();
                let _ = reply.send(result);
            }
            Command::ClearFinished(reply) => {
                let removed = self.clear_finished();
                self.settle();
                let _ = reply.send(removed);
            }
        }
    }

    /// Fill free slots, close the run if it drained, publish.
    fn settle(&mut self) {
        self.admit();
        self.publish();
    }

    fn enqueue(&mut self, jobs: Vec<NewJob>) -> EnqueueReport {
        let mut report = EnqueueReport::default();
        for request in jobs {
            if let Some(&owner) = self.destinations.get(&request.destination) {
                warn!(
                    source = %request.source.path.display(),
                    destination = %request.destination.display(),
                    owner = %owner,
                    "rejecting job with duplicate destination"
                );
                report.rejected.push(RejectedJob {
                    source: request.source.path.clone(),
                    destination: request.destination.clone(),
                    error: Error::DuplicateDestination {
                        path: request.destination,
                        owner,
                    },
                });
                continue;
            }

            let id = self.ids.allocate();
            let descriptor = Arc::new(JobDescriptor::from_request(id, request));
            debug!(
                job_id = %id,
                source = %descriptor.source.path.display(),
                destination = %descriptor.destination.display(),
                params = %descriptor.params,
                "job enqueued"
            );
            self.destinations.insert(descriptor.destination.clone(), id);
            self.jobs.insert(id, JobEntry::new(descriptor));
            self.order.push(id);
            self.pending.push_back(id);
            report.accepted.push(id);
        }
        report
    }

    fn start(&mut self, concurrency: usize) -> Result<()> {
        if concurrency == 0 {
            return Err(Error::Validation("concurrency must be at least 1".into()));
        }
        if self.run.active {
            return Err(Error::InvalidState("a run is already in progress".into()));
        }

        let generation = self.run.generation + 1;
        self.run = RunState {
            generation,
            active: true,
            concurrency,
            started_at: Some(Utc::now()),
            started: Some(Instant::now()),
            ..RunState::idle()
        };
        self.errors.clear();
        info!(
            run = generation,
            concurrency,
            pending = self.pending.len(),
            "run started"
        );
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) -> Result<()> {
        if !self.run.active {
            return Err(Error::InvalidState("no run in progress".into()));
        }
        if self.run.paused != paused {
            self.run.paused = paused;
            if paused {
                info!(run = self.run.generation, "admission paused");
            } else {
                info!(run = self.run.generation, "admission resumed");
            }
        }
        Ok(())
    }

    fn cancel(&mut self, target: CancelTarget) -> Result<CancelSummary> {
        let mut summary = CancelSummary::default();
        match target {
            CancelTarget::Job(id) => {
                let state = self
                    .jobs
                    .get(&id)
                    .map(|e| (e.state.clone(), e.cancel_requested))
                    .ok_or_else(|| Error::not_found("job", id))?;
                match state {
                    (JobState::Pending, _) => {
                        self.cancel_pending(id);
                        summary.cancelled_pending = 1;
                    }
                    (JobState::Running, false) => {
                        self.signal_running(id);
                        summary.signalled_running = 1;
                    }
                    (JobState::Running, true) | (JobState::Cancelled, _) => {}
                    (other, _) => {
                        return Err(Error::InvalidState(format!("job {id} is already {}", other.label())));
                    }
                }
            }
            CancelTarget::All => {
                if self.run.active {
                    self.run.cancelled = true;
                }
                let pending: Vec<JobId> = self.pending.iter().copied().collect();
                for id in pending {
                    self.cancel_pending(id);
                    summary.cancelled_pending += 1;
                }
                let running: Vec<JobId> = self.run.running.iter().copied().collect();
                for id in running {
                    if self.jobs.get(&id).is_some_and(|e| !e.cancel_requested) {
                        self.signal_running(id);
                        summary.signalled_running += 1;
                    }
                }
                info!(
                    run = self.run.generation,
                    cancelled_pending = summary.cancelled_pending,
                    signalled_running = summary.signalled_running,
                    "cancel all requested"
                );
            }
        }
        Ok(summary)
    }

    fn cancel_pending(&mut self, id: JobId) {
        self.pending.retain(|p| *p != id);
        let generation = self.run.active.then_some(self.run.generation);
        if let Some(entry) = self.jobs.get_mut(&id) {
            entry.set_state(JobState::Cancelled);
            if generation.is_some() {
                entry.run_generation = generation;
            }
            let destination = entry.descriptor.destination.clone();
            self.release_destination(&destination, id);
            info!(job_id = %id, "pending job cancelled");
        }
    }

    fn signal_running(&mut self, id: JobId) {
        if let Some(entry) = self.jobs.get_mut(&id) {
            entry.cancel_requested = true;
            if let Some(token) = &entry.cancel {
                token.cancel();
            }
            info!(job_id = %id, "cancellation sent to running job");
        }
    }

    fn retry(&mut self, id: JobId) -> Result<()> {
        let entry = self.jobs.get(&id).ok_or_else(|| Error::not_found("job", id))?;
        if !matches!(entry.state, JobState::Failed { .. }) {
            return Err(Error::InvalidState(format!(
                "only failed jobs can be retried; job {id} is {}",
                entry.state.label()
            )));
        }
        let destination = entry.descriptor.destination.clone();
        if let Some(&owner) = self.destinations.get(&destination) {
            if owner != id {
                return Err(Error::DuplicateDestination {
                    path: destination,
                    owner,
                });
            }
        }

        if let Some(entry) = self.jobs.get_mut(&id) {
            entry.set_state(JobState::Pending);
            entry.progress = 0.0;
            entry.work_total = None;
            entry.cancel_requested = false;
            entry.started_at = None;
            entry.finished_at = None;
        }
        self.destinations.insert(destination, id);
        self.errors.retain(|e| e.job_id != id);
        self.order.retain(|o| *o != id);
        self.order.push(id);
        self.pending.push_back(id);
        info!(job_id = %id, "failed job queued for retry");
        if !self.run.active && self.run.generation > 0 {
            self.reopen_run();
        }
        Ok(())
    }

    /// Resume admission for a finished run at its last concurrency. The run
    /// keeps its generation, counters and elapsed time.
    fn reopen_run(&mut self) {
        let elapsed = self.run.elapsed;
        self.run.active = true;
        self.run.paused = false;
        self.run.cancelled = false;
        self.run.finished_at = None;
        let now = Instant::now();
        self.run.started = Some(now.checked_sub(elapsed).unwrap_or(now));
        info!(
            run = self.run.generation,
            concurrency = self.run.concurrency,
            "run reopened for retry"
        );
    }

    fn skip(&mut self, id: JobId) -> Result<()> {
        let generation = self.run.active.then_some(self.run.generation);
        let entry = self.jobs.get_mut(&id).ok_or_else(|| Error::not_found("job", id))?;
        if entry.state != JobState::Pending {
            return Err(Error::InvalidState(format!(
                "only pending jobs can be skipped; job {id} is {}",
                entry.state.label()
            )));
        }
        entry.set_state(JobState::Skipped);
        if generation.is_some() {
            entry.run_generation = generation;
        }
        let destination = entry.descriptor.destination.clone();
        self.pending.retain(|p| *p != id);
        self.release_destination(&destination, id);
        info!(job_id = %id, "job skipped");
        Ok(())
    }

    fn remove(&mut self, id: JobId) -> Result<()> {
        let entry = self.jobs.get(&id).ok_or_else(|| Error::not_found("job", id))?;
        if entry.state == JobState::Running {
            return Err(Error::InvalidState(format!(
                "job {id} is running; cancel it first"
            )));
        }
        let destination = entry.descriptor.destination.clone();
        self.drop_job(id, &destination);
        Ok(())
    }

    fn clear_finished(&mut self) -> usize {
        let finished: Vec<(JobId, PathBuf)> = self
            .order
            .iter()
            .filter_map(|id| self.jobs.get(id).map(|e| (*id, e)))
            .filter(|(_, e)| e.state.is_terminal())
            .map(|(id, e)| (id, e.descriptor.destination.clone()))
            .collect();
        for (id, destination) in &finished {
            self.drop_job(*id, destination);
        }
        finished.len()
    }

    fn drop_job(&mut self, id: JobId, destination: &Path) {
        self.jobs.remove(&id);
        self.order.retain(|o| *o != id);
        self.pending.retain(|p| *p != id);
        self.errors.retain(|e| e.job_id != id);
        self.release_destination(destination, id);
        debug!(job_id = %id, "job removed from queue");
    }

    fn release_destination(&mut self, destination: &Path, id: JobId) {
        if self.destinations.get(destination) == Some(&id) {
            self.destinations.remove(destination);
        }
    }

    fn shutdown(&mut self) {
        let running: Vec<JobId> = self.run.running.iter().copied().collect();
        if !running.is_empty() {
            info!(running = running.len(), "all handles dropped; cancelling running jobs");
        }
        self.run.cancelled = true;
        for id in running {
            self.signal_running(id);
        }
    }

    // ---- admission ------------------------------------------------------

    fn admit(&mut self) {
        if self.run.active && !self.run.paused && !self.run.cancelled {
            while self.run.running.len() < self.run.concurrency {
                let Some(id) = self.pending.pop_front() else {
                    break;
                };
                self.launch(id);
            }
        }
        self.maybe_finish_run();
    }

    fn launch(&mut self, id: JobId) {
        let generation = self.run.generation;
        let Some(entry) = self.jobs.get_mut(&id) else {
            return;
        };
        if entry.state != JobState::Pending {
            return;
        }

        let token = CancellationToken::new();
        entry.set_state(JobState::Running);
        entry.attempts += 1;
        entry.progress = 0.0;
        entry.cancel = Some(token.clone());
        entry.cancel_requested = false;
        entry.run_generation = Some(generation);
        entry.started_at = Some(Utc::now());
        entry.finished_at = None;
        self.run.running.insert(id);

        info!(
            job_id = %id,
            attempt = entry.attempts,
            source = %entry.descriptor.source.path.display(),
            destination = %entry.descriptor.destination.display(),
            "job admitted"
        );

        let ctx = WorkerContext {
            adapter: Arc::clone(&self.adapter),
            job: Arc::clone(&entry.descriptor),
            attempt: entry.attempts,
            cancel: token,
            events: self.events_tx.clone(),
            preflight: self.config.preflight.then_some(self.config.min_free_bytes),
        };
        tokio::spawn(drive_job(ctx));
    }

    fn maybe_finish_run(&mut self) {
        if !self.run.active || !self.run.running.is_empty() {
            return;
        }
        let drained = self.pending.is_empty();
        if !(drained || self.run.cancelled) {
            return;
        }

        self.run.active = false;
        self.run.finished_at = Some(Utc::now());
        self.run.elapsed = self.run.started.map(|s| s.elapsed()).unwrap_or_default();
        let counters = self.counters();
        info!(
            run = self.run.generation,
            status = ?self.run.status(),
            completed = counters.completed,
            failed = counters.failed,
            cancelled = counters.cancelled,
            elapsed_secs = self.run.elapsed.as_secs_f64(),
            "run finished"
        );
    }

    // ---- worker events --------------------------------------------------

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Progress { id, attempt, tick } => self.on_progress(id, attempt, tick),
            WorkerEvent::Finished {
                id,
                attempt,
                outcome,
            } => {
                self.on_finished(id, attempt, outcome);
                self.settle();
            }
        }
    }

    fn on_progress(&mut self, id: JobId, attempt: u32, tick: ProgressTick) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            return;
        };
        if entry.attempts != attempt || entry.state != JobState::Running || entry.cancel_requested {
            return;
        }
        entry.progress = tick.fraction;
        if tick.work_total.is_some() {
            entry.work_total = tick.work_total;
        }
        self.dirty = true;
    }

    fn on_finished(&mut self, id: JobId, attempt: u32, outcome: AdapterOutcome) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            self.run.running.remove(&id);
            return;
        };
        if entry.attempts != attempt || entry.state != JobState::Running {
            return;
        }
        self.run.running.remove(&id);

        let next = if entry.cancel_requested {
            JobState::Cancelled
        } else {
            match outcome {
                AdapterOutcome::Success => JobState::Succeeded,
                AdapterOutcome::Failure(reason) => JobState::failed(reason),
                AdapterOutcome::Cancelled => JobState::Cancelled,
            }
        };
        if next == JobState::Succeeded {
            entry.progress = 1.0;
        }
        entry.set_state(next.clone());
        let descriptor = Arc::clone(&entry.descriptor);

        match &next {
            JobState::Succeeded => info!(
                job_id = %id,
                destination = %descriptor.destination.display(),
                "job succeeded"
            ),
            JobState::Failed { reason } => {
                warn!(
                    job_id = %id,
                    source = %descriptor.source.path.display(),
                    kind = %reason.kind,
                    error = %reason.message,
                    "job failed"
                );
                self.errors.push(JobErrorRecord {
                    job_id: id,
                    source: descriptor.source.path.clone(),
                    reason: reason.clone(),
                    at: Utc::now(),
                });
            }
            _ => info!(job_id = %id, "job cancelled"),
        }

        if !next.holds_destination() {
            self.release_destination(&descriptor.destination, id);
        }
    }

    // ---- publication ----------------------------------------------------

    fn counters(&self) -> RunCounters {
        let mut counters = RunCounters::default();
        if self.run.generation == 0 {
            return counters;
        }
        for entry in self.jobs.values() {
            if entry.run_generation != Some(self.run.generation) {
                continue;
            }
            match entry.state {
                JobState::Succeeded => {
                    counters.completed += 1;
                    counters.processed_secs += entry.weight().unwrap_or(0.0);
                }
                JobState::Failed { .. } => counters.failed += 1,
                JobState::Cancelled => counters.cancelled += 1,
                JobState::Skipped => counters.skipped += 1,
                JobState::Pending | JobState::Running => {}
            }
        }
        counters
    }

    fn participants(&self) -> usize {
        if self.run.generation == 0 {
            return 0;
        }
        self.jobs
            .values()
            .filter(|e| e.run_generation == Some(self.run.generation))
            .count()
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.dirty = false;

        let jobs: Vec<JobView> = self
            .order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .map(JobEntry::view)
            .collect();
        let progress = progress::aggregate(
            self.order
                .iter()
                .filter_map(|id| self.jobs.get(id))
                .map(|e| (e.weight(), e.fraction())),
        );
        let run = RunSummary {
            status: self.run.status(),
            concurrency: self.run.concurrency,
            counters: self.counters(),
            participants: self.participants(),
            started_at: self.run.started_at,
            finished_at: self.run.finished_at,
            elapsed_secs: self.run.elapsed().as_secs_f64(),
        };

        self.publisher.publish(QueueSnapshot {
            revision: self.revision,
            jobs,
            run,
            progress,
            errors: self.errors.clone(),
        });
    }
}
