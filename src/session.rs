//! One `convert` invocation: plan, run, report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use soundforged_av::{FfmpegAdapter, FfprobeProber, ProbedAudio, ToolRegistry};
use soundforged_core::SourceFile;
use soundforged_naming::{DestinationClaims, Resolver};
use soundforged_scheduler::{NewJob, PipelineAdapter, QueueSnapshot, SchedulerHandle};

use crate::config::Config;
use crate::inputs::{collect_sources, display_source};
use crate::report::{summary_lines, ConsoleReporter};

/// What the user asked `convert` to do, after config and flags are merged.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub inputs: Vec<PathBuf>,
    pub recursive: bool,
    pub dry_run: bool,
}

/// An input left out of the plan.
#[derive(Debug, Clone)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub jobs: Vec<NewJob>,
    pub skipped: Vec<SkippedInput>,
}

/// Probe every source, then resolve destinations in input order.
///
/// Probing runs in parallel; resolution is sequential so the collision
/// suffixes only depend on input order.
pub async fn plan_jobs(
    config: &Config,
    sources: Vec<SourceFile>,
    prober: Option<FfprobeProber>,
) -> Result<Plan> {
    let format = config.conversion.format;
    let params = config.conversion.encoding_params(format);
    params.validate()?;

    let resolver = Resolver::parse(
        &config.naming.effective_pattern(),
        config.naming.options(params.extension()),
    )?;
    let claims = DestinationClaims::new();

    let probed = match prober {
        Some(prober) => {
            probe_all(prober, &sources, config.conversion.effective_concurrency()).await
        }
        None => sources.iter().map(|_| None).collect(),
    };

    let mut plan = Plan::default();
    for (source, probe) in sources.into_iter().zip(probed) {
        let source = match probe {
            Some(Ok(info)) if !info.has_audio => {
                tracing::warn!("Skipping {}: no audio stream", source.path.display());
                plan.skipped.push(SkippedInput {
                    path: source.path,
                    reason: "no audio stream".to_string(),
                });
                continue;
            }
            Some(Ok(info)) => info.apply_to(source),
            Some(Err(e)) => {
                tracing::warn!(
                    "Could not read tags from {}: {}",
                    source.path.display(),
                    e
                );
                source
            }
            None => source,
        };

        let destination = claims.claim(&resolver, &source);
        plan.jobs.push(NewJob::new(source, destination, params.clone()));
    }

    Ok(plan)
}

type ProbeResult = soundforged_core::Result<ProbedAudio>;

async fn probe_all(
    prober: FfprobeProber,
    sources: &[SourceFile],
    parallelism: usize,
) -> Vec<Option<ProbeResult>> {
    let prober = Arc::new(prober);
    let permits = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set = JoinSet::new();

    for (index, source) in sources.iter().enumerate() {
        let prober = Arc::clone(&prober);
        let permits = Arc::clone(&permits);
        let path = source.path.clone();
        set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            (index, prober.probe(&path).await)
        });
    }

    let mut results: Vec<Option<ProbeResult>> = (0..sources.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => tracing::warn!("Probe task failed: {}", e),
        }
    }
    results
}

/// Enqueue `jobs`, run them `concurrency` at a time and print progress until
/// the run ends. Ctrl-C cancels everything.
pub async fn run_jobs(
    config: &Config,
    jobs: Vec<NewJob>,
    adapter: Arc<dyn PipelineAdapter>,
    concurrency: usize,
) -> Result<Arc<QueueSnapshot>> {
    let handle = SchedulerHandle::spawn(adapter, config.scheduler.to_scheduler_config());

    let report = handle.enqueue(jobs).await?;
    for rejected in &report.rejected {
        tracing::warn!(
            "Not converting {}: {}",
            rejected.source.display(),
            rejected.error
        );
    }

    let mut subscription = handle.subscribe();
    handle.start(concurrency).await?;

    let mut reporter = ConsoleReporter::new();
    let mut snapshot = subscription.current();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        for line in reporter.render(&snapshot) {
            println!("{}", line);
        }
        if !snapshot.run.status.is_active() {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                eprintln!("Cancelling, waiting for running conversions to stop...");
                handle.cancel_all().await?;
            }
            changed = subscription.changed() => {
                snapshot = changed.context("Scheduler stopped unexpectedly")?;
            }
        }
    }

    Ok(snapshot)
}

/// The whole `convert` command.
pub async fn convert(config: &Config, request: &ConvertRequest) -> Result<()> {
    let sources = collect_sources(&request.inputs, request.recursive)?;
    if sources.is_empty() {
        println!("Nothing to convert");
        return Ok(());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = match tools.ffprobe() {
        Ok(path) => Some(FfprobeProber::new(path.to_path_buf())),
        Err(_) => {
            tracing::warn!("ffprobe not found; converting without tags");
            None
        }
    };

    let plan = plan_jobs(config, sources, prober).await?;
    for skipped in &plan.skipped {
        println!("Skipping {}: {}", skipped.path.display(), skipped.reason);
    }

    if request.dry_run {
        for job in &plan.jobs {
            println!(
                "{} -> {}",
                display_source(&job.source),
                job.destination.display()
            );
        }
        println!(
            "\n[DRY RUN] Would convert {} file(s) to {}",
            plan.jobs.len(),
            config.conversion.encoding_params(config.conversion.format)
        );
        return Ok(());
    }

    if plan.jobs.is_empty() {
        println!("Nothing to convert");
        return Ok(());
    }

    let adapter: Arc<dyn PipelineAdapter> = Arc::new(FfmpegAdapter::from_registry(&tools)?);
    let concurrency = config.conversion.effective_concurrency();
    tracing::info!(
        "Converting {} file(s) with {} parallel job(s)",
        plan.jobs.len(),
        concurrency
    );

    let snapshot = run_jobs(config, plan.jobs, adapter, concurrency).await?;
    for line in summary_lines(&snapshot) {
        println!("{}", line);
    }

    let counters = &snapshot.run.counters;
    if snapshot.run.status == soundforged_scheduler::RunStatus::Cancelled {
        anyhow::bail!("Conversion cancelled");
    }
    if counters.failed > 0 {
        anyhow::bail!(
            "{} of {} conversion(s) failed",
            counters.failed,
            snapshot.run.participants
        );
    }
    Ok(())
}
