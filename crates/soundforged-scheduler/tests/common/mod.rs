//! Shared harness for scheduler integration tests.
//!
//! [`ScriptedAdapter`] stands in for the transcoding engine. Each source file
//! can be given a queue of [`Script`]s that decide how its next submission
//! behaves; held submissions are finished by the test itself.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use soundforged_core::{EncodingParams, JobId, Result, SourceFile};
use soundforged_scheduler::{
    AdapterOutcome, FailureKind, FailureReason, JobDescriptor, NewJob, PipelineAdapter,
    QueueSnapshot, SchedulerConfig, SchedulerHandle, Submission, SubmissionSink,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// How one submission behaves.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Fail(FailureKind, &'static str),
    /// Stay running until the test finishes it or the scheduler cancels it.
    Hold,
    /// Like `Hold`, but report success when asked to cancel.
    HoldIgnoringCancel,
    /// Drop the sink without a terminal event.
    CloseWithoutResult,
    /// Refuse the submission outright.
    Reject(&'static str),
}

#[derive(Default)]
struct Inner {
    scripts: HashMap<PathBuf, VecDeque<Script>>,
    submissions: Vec<JobId>,
    held: HashMap<JobId, SubmissionSink>,
}

pub struct ScriptedAdapter {
    default: Script,
    inner: Mutex<Inner>,
}

impl ScriptedAdapter {
    pub fn new(default: Script) -> Arc<Self> {
        Arc::new(Self {
            default,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Queue scripts for the next submissions of `source`.
    pub fn script(&self, source: impl Into<PathBuf>, scripts: impl IntoIterator<Item = Script>) {
        self.inner
            .lock()
            .scripts
            .entry(source.into())
            .or_default()
            .extend(scripts);
    }

    /// Job ids in submission order, one entry per attempt.
    pub fn submissions(&self) -> Vec<JobId> {
        self.inner.lock().submissions.clone()
    }

    pub fn held(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.inner.lock().held.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn progress(&self, id: JobId, fraction: f32, work_total: Option<f64>) {
        if let Some(sink) = self.inner.lock().held.get(&id) {
            sink.progress(fraction, work_total);
        }
    }

    /// Finish a held submission.
    pub async fn finish(&self, id: JobId, outcome: AdapterOutcome) {
        let sink = self
            .inner
            .lock()
            .held
            .remove(&id)
            .unwrap_or_else(|| panic!("job {id} is not held"));
        sink.finish(outcome).await;
    }

    pub async fn wait_for_submissions(&self, count: usize) -> Vec<JobId> {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                let seen = self.submissions();
                if seen.len() >= count {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} submissions, got {:?}", self.submissions()))
    }

    fn next_script(&self, source: &Path) -> Script {
        self.inner
            .lock()
            .scripts
            .get_mut(source)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl PipelineAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, job: Arc<JobDescriptor>) -> Result<Submission> {
        let script = self.next_script(&job.source.path);
        if let Script::Reject(message) = script {
            self.inner.lock().submissions.push(job.id);
            return Err(soundforged_core::Error::tool("scripted", message));
        }

        let (sink, submission) = Submission::channel();
        match script {
            Script::Succeed => {
                tokio::spawn(async move {
                    sink.progress(0.5, None);
                    sink.finish(AdapterOutcome::Success).await;
                });
            }
            Script::Fail(kind, message) => {
                tokio::spawn(async move {
                    sink.finish(AdapterOutcome::Failure(FailureReason::new(kind, message)))
                        .await;
                });
            }
            Script::Hold | Script::HoldIgnoringCancel => {
                let ignore = matches!(script, Script::HoldIgnoringCancel);
                self.inner.lock().held.insert(job.id, sink.clone());
                tokio::spawn(async move {
                    sink.cancelled().await;
                    let outcome = if ignore {
                        AdapterOutcome::Success
                    } else {
                        AdapterOutcome::Cancelled
                    };
                    sink.finish(outcome).await;
                });
            }
            Script::CloseWithoutResult => drop(sink),
            Script::Reject(_) => unreachable!(),
        }
        self.inner.lock().submissions.push(job.id);
        Ok(submission)
    }
}

pub fn config() -> SchedulerConfig {
    SchedulerConfig {
        preflight: true,
        min_free_bytes: 0,
        publish_interval: Duration::from_millis(10),
    }
}

pub fn spawn(adapter: Arc<ScriptedAdapter>) -> SchedulerHandle {
    SchedulerHandle::spawn(adapter, config())
}

pub fn source(name: &str) -> PathBuf {
    PathBuf::from(format!("/music/{name}.flac"))
}

/// A job converting `/music/<name>.flac` to `<dir>/<name>.mp3`.
pub fn job(dir: &Path, name: &str) -> NewJob {
    NewJob::new(
        SourceFile::new(source(name)),
        dir.join(format!("{name}.mp3")),
        EncodingParams::default(),
    )
}

pub fn job_with_duration(dir: &Path, name: &str, secs: f64) -> NewJob {
    NewJob::new(
        SourceFile::new(source(name)).with_duration(Some(secs)),
        dir.join(format!("{name}.mp3")),
        EncodingParams::default(),
    )
}

/// Wait until a published snapshot satisfies `pred`.
pub async fn wait_for(
    handle: &SchedulerHandle,
    pred: impl Fn(&QueueSnapshot) -> bool,
) -> Arc<QueueSnapshot> {
    let mut sub = handle.subscribe();
    tokio::time::timeout(TIMEOUT, sub.wait_until(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("scheduler stopped")
}

pub async fn wait_for_run(handle: &SchedulerHandle) -> Arc<QueueSnapshot> {
    tokio::time::timeout(TIMEOUT, handle.wait_for_run())
        .await
        .expect("timed out waiting for run")
        .expect("scheduler stopped")
}
