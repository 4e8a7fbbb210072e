//! Console rendering of queue snapshots.

use std::collections::HashMap;

use soundforged_core::JobId;
use soundforged_scheduler::{JobState, JobView, QueueSnapshot, RunStatus};

/// Format a duration the way the final summary line shows it, e.g.
/// `1 h 2 m 3 s`. Zero units are left out, except a bare `0 s`.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };
    if total == 0 {
        return "0 s".to_string();
    }

    let units = [
        (total / 86_400, "d"),
        ((total % 86_400) / 3600, "h"),
        ((total % 3600) / 60, "m"),
        (total % 60, "s"),
    ];
    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value} {unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn file_name(job: &JobView) -> String {
    job.source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| job.source.display().to_string())
}

/// Turns a stream of snapshots into console lines. Only changes are
/// printed: job state transitions, and overall progress in 10% steps.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    seen: HashMap<JobId, JobState>,
    last_step: Option<u32>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &QueueSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        let percent = (snapshot.progress * 100.0).round() as u32;

        for job in &snapshot.jobs {
            if self.seen.get(&job.id) == Some(&job.state) {
                continue;
            }
            let line = match &job.state {
                JobState::Pending => None,
                JobState::Running => Some(format!(
                    "[{percent:>3}%] converting {} -> {}",
                    file_name(job),
                    job.destination.display()
                )),
                JobState::Succeeded => Some(format!("[{percent:>3}%] done {}", file_name(job))),
                JobState::Failed { reason } => {
                    Some(format!("[{percent:>3}%] failed {}: {reason}", file_name(job)))
                }
                JobState::Skipped => Some(format!("[{percent:>3}%] skipped {}", file_name(job))),
                JobState::Cancelled => {
                    Some(format!("[{percent:>3}%] cancelled {}", file_name(job)))
                }
            };
            lines.extend(line);
            self.seen.insert(job.id, job.state.clone());
        }

        let step = percent / 10;
        if lines.is_empty()
            && snapshot.run.status == RunStatus::Running
            && self.last_step.is_some_and(|last| step > last)
        {
            lines.push(format!("[{percent:>3}%] {} running", snapshot.running()));
        }
        self.last_step = Some(step);
        lines
    }
}

/// The error list followed by the closing line.
pub fn summary_lines(snapshot: &QueueSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    if !snapshot.errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for error in &snapshot.errors {
            lines.push(format!("  {}: {}", error.source.display(), error.reason));
        }
        lines.push(String::new());
    }

    let run = &snapshot.run;
    let verb = if run.status == RunStatus::Cancelled {
        "Conversion cancelled after"
    } else {
        "Conversion done in"
    };
    let mut last = format!("{verb} {}", format_duration(run.elapsed_secs));
    if run.counters.failed > 0 {
        last.push_str(&format!(", {} error(s)", run.counters.failed));
    }
    lines.push(last);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use soundforged_scheduler::{FailureKind, FailureReason, JobErrorRecord, RunSummary};
    use std::path::PathBuf;

    fn view(id: u64, state: JobState) -> JobView {
        let now = chrono::Utc::now();
        JobView {
            id: JobId::from_raw(id),
            source: PathBuf::from(format!("/music/{id}.flac")),
            destination: PathBuf::from(format!("/out/{id}.mp3")),
            params: Default::default(),
            state,
            progress: 0.0,
            attempts: 0,
            enqueued_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    fn snapshot(jobs: Vec<JobView>, progress: f32) -> QueueSnapshot {
        let mut run = RunSummary::idle();
        run.status = RunStatus::Running;
        QueueSnapshot {
            jobs,
            progress,
            run,
            ..QueueSnapshot::empty()
        }
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0.0), "0 s");
        assert_eq!(format_duration(59.4), "59 s");
        assert_eq!(format_duration(62.0), "1 m 2 s");
        assert_eq!(format_duration(3723.0), "1 h 2 m 3 s");
        assert_eq!(format_duration(3600.0), "1 h");
        assert_eq!(format_duration(3603.0), "1 h 3 s");
        assert_eq!(format_duration(120.0), "2 m");
        assert_eq!(format_duration(86_400.0), "1 d");
        assert_eq!(format_duration(90_061.0), "1 d 1 h 1 m 1 s");
        assert_eq!(format_duration(f64::NAN), "0 s");
    }

    #[test]
    fn prints_state_changes_once() {
        let mut reporter = ConsoleReporter::new();
        let first = snapshot(vec![view(1, JobState::Running), view(2, JobState::Pending)], 0.0);
        assert_eq!(
            reporter.render(&first),
            vec!["[  0%] converting 1.flac -> /out/1.mp3"]
        );
        assert!(reporter.render(&first).is_empty());

        let failed = JobState::failed(FailureReason::new(FailureKind::Codec, "boom"));
        let second = snapshot(vec![view(1, JobState::Succeeded), view(2, failed)], 1.0);
        assert_eq!(
            reporter.render(&second),
            vec![
                "[100%] done 1.flac",
                "[100%] failed 2.flac: codec error: boom",
            ]
        );
    }

    #[test]
    fn progress_only_changes_print_in_steps() {
        let mut reporter = ConsoleReporter::new();
        let jobs = vec![view(1, JobState::Running)];
        reporter.render(&snapshot(jobs.clone(), 0.0));
        assert!(reporter.render(&snapshot(jobs.clone(), 0.05)).is_empty());
        assert_eq!(
            reporter.render(&snapshot(jobs.clone(), 0.21)),
            vec!["[ 21%] 1 running"]
        );
        assert!(reporter.render(&snapshot(jobs, 0.22)).is_empty());
    }

    #[test]
    fn summary_with_errors() {
        let mut snap = snapshot(Vec::new(), 1.0);
        snap.run.status = RunStatus::Finished;
        snap.run.elapsed_secs = 62.0;
        snap.run.counters.failed = 1;
        snap.errors.push(JobErrorRecord {
            job_id: JobId::from_raw(1),
            source: PathBuf::from("/music/a.flac"),
            reason: FailureReason::new(FailureKind::Io, "read error"),
            at: chrono::Utc::now(),
        });

        let lines = summary_lines(&snap);
        assert!(lines.contains(&"  /music/a.flac: I/O error: read error".to_string()));
        assert_eq!(lines.last().unwrap(), "Conversion done in 1 m 2 s, 1 error(s)");
    }

    #[test]
    fn summary_without_errors() {
        let mut snap = snapshot(Vec::new(), 1.0);
        snap.run.status = RunStatus::Finished;
        snap.run.elapsed_secs = 5.0;
        assert_eq!(summary_lines(&snap), vec!["Conversion done in 5 s"]);
    }
}
