//! # soundforged-scheduler
//!
//! Runs conversion jobs against an external engine with bounded parallelism.
//!
//! - **Jobs** ([`job`]) -- descriptors, the job state machine and failure
//!   reasons.
//! - **Adapter** ([`PipelineAdapter`]) -- the narrow interface to the engine
//!   that actually converts a file.
//! - **Scheduler** ([`SchedulerHandle`]) -- a single task that owns the queue,
//!   admits up to N jobs at a time and applies every state transition.
//! - **Store** ([`QueueStateStore`]) -- immutable snapshots of the queue for
//!   presentation layers, published through a `watch` channel.

pub mod adapter;
pub mod job;
pub mod preflight;
pub mod progress;
pub mod scheduler;
pub mod store;

mod worker;

pub use adapter::{
    AdapterEvent, AdapterOutcome, PipelineAdapter, ProgressTick, Submission, SubmissionSink,
};
pub use job::{FailureKind, FailureReason, JobDescriptor, JobState, JobView, NewJob};
pub use scheduler::{
    CancelSummary, CancelTarget, EnqueueReport, RejectedJob, SchedulerConfig, SchedulerHandle,
};
pub use store::{
    JobErrorRecord, QueueSnapshot, QueueStateStore, RunCounters, RunStatus, RunSummary,
    StoreSubscription,
};
