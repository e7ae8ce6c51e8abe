//! Interval scheduler with single-flight jobs, a lifetime deadline and
//! cooperative shutdown.
//!
//! This is the only place with a background execution context. Each trigger
//! runs the job synchronously on tokio's blocking pool; a trigger that
//! arrives while the same job is still running is dropped.

pub mod cancel;

pub use cancel::CancellationToken;

use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;

const MIN_INTERVAL: Duration = Duration::from_millis(10);
/// Upper bound for intervals and lifetimes, roughly a century.
pub const MAX_SPAN: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Convert a configured number of hours into a [`Duration`].
///
/// Rejects negative and non-finite values and anything above [`MAX_SPAN`].
pub fn hours_to_duration(hours: f64) -> anyhow::Result<Duration> {
    if !hours.is_finite() || hours < 0.0 {
        anyhow::bail!("invalid number of hours: {hours}");
    }
    let span = Duration::try_from_secs_f64(hours * 3600.0)
        .map_err(|e| anyhow::anyhow!("invalid number of hours {hours}: {e}"))?;
    if span > MAX_SPAN {
        anyhow::bail!("{hours} hours exceeds the maximum of {} hours", MAX_SPAN.as_secs() / 3600);
    }
    Ok(span)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    DailyReflection,
    WeeklyCompression,
    WeeklyResearch,
    DailyAutomationLoop,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::DailyReflection,
        JobKind::WeeklyCompression,
        JobKind::WeeklyResearch,
        JobKind::DailyAutomationLoop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::DailyReflection => "daily-reflection",
            JobKind::WeeklyCompression => "weekly-compression",
            JobKind::WeeklyResearch => "weekly-research",
            JobKind::DailyAutomationLoop => "daily-automation-loop",
        }
    }

    /// Configured interval for this job.
    pub fn interval(self, config: &SchedulerConfig) -> anyhow::Result<Duration> {
        let (key, hours) = match self {
            JobKind::DailyReflection => ("daily_reflection_hours", config.daily_reflection_hours),
            JobKind::WeeklyCompression => ("weekly_compression_hours", config.weekly_compression_hours),
            JobKind::WeeklyResearch => ("weekly_research_hours", config.weekly_research_hours),
            JobKind::DailyAutomationLoop => ("daily_automation_loop_hours", config.daily_automation_loop_hours),
        };
        hours_to_duration(hours).with_context(|| format!("scheduler.{key} is not a usable interval"))
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<_> = JobKind::ALL.iter().map(|j| j.as_str()).collect();
                format!("unknown job '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Executes one triggered job. Called on the blocking pool.
pub trait JobRunner: Send + Sync + 'static {
    fn run_job(&self, job: JobKind, cancel: &CancellationToken) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Deadline,
    Stopped,
}

#[derive(Debug, Default, Serialize)]
pub struct SchedulerReport {
    pub fired: usize,
    pub completed: usize,
    pub failed: usize,
    /// Triggers dropped because the same job was still running.
    pub dropped: usize,
    /// Runs still in flight when the grace period ran out.
    pub abandoned: usize,
    pub stop_reason: Option<StopReason>,
}

/// Cloneable handle that stops a running [`Scheduler`] from anywhere.
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
}

impl StopHandle {
    /// Idempotent.
    pub fn stop(&self) {
        if self.cancel.cancel() {
            info!("scheduler stop requested");
        }
    }
}

struct Registration {
    job: JobKind,
    interval: Duration,
    run_at_start: bool,
}

type JobOutcome = (JobKind, Result<(), String>, Duration);

pub struct Scheduler {
    runner: Arc<dyn JobRunner>,
    jobs: Vec<Registration>,
    grace: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn JobRunner>, grace: Duration) -> Self {
        Self {
            runner,
            jobs: Vec::new(),
            grace,
            cancel: CancellationToken::new(),
        }
    }

    /// Register `job` to fire every `interval`, first after one interval.
    pub fn schedule(&mut self, job: JobKind, interval: Duration) -> &mut Self {
        self.schedule_with(job, interval, false)
    }

    /// Register `job`; with `run_at_start` the first trigger fires immediately.
    pub fn schedule_with(&mut self, job: JobKind, interval: Duration, run_at_start: bool) -> &mut Self {
        let interval = if interval < MIN_INTERVAL {
            warn!(job = %job, ?interval, "interval too short, using minimum");
            MIN_INTERVAL
        } else if interval > MAX_SPAN {
            warn!(job = %job, ?interval, "interval too long, using maximum");
            MAX_SPAN
        } else {
            interval
        };
        info!(job = %job, ?interval, run_at_start, "job scheduled");
        self.jobs.push(Registration {
            job,
            interval,
            run_at_start,
        });
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Dispatch triggers until `deadline` elapses or [`stop`](Self::stop) is called.
    ///
    /// Then in-flight runs are asked to cancel and given the grace period to
    /// finish; runs still going after that are abandoned and counted.
    pub async fn run(&self, deadline: Option<Duration>) -> SchedulerReport {
        let start = Instant::now();
        let deadline_at = deadline.map(|d| start + d.min(MAX_SPAN));
        info!(jobs = self.jobs.len(), ?deadline, "scheduler started");

        let mut locks: HashMap<JobKind, Arc<Mutex<()>>> = HashMap::new();
        for reg in &self.jobs {
            locks.entry(reg.job).or_default();
        }
        let mut next_fire: Vec<Instant> = self
            .jobs
            .iter()
            .map(|r| if r.run_at_start { start } else { start + r.interval })
            .collect();

        let mut report = SchedulerReport::default();
        let mut inflight: JoinSet<JobOutcome> = JoinSet::new();

        let reason = loop {
            let due = next_fire
                .iter()
                .enumerate()
                .min_by_key(|(_, at)| **at)
                .map(|(idx, at)| (idx, *at));

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break StopReason::Stopped,

                _ = sleep_until_opt(deadline_at) => break StopReason::Deadline,

                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    record(&mut report, joined);
                }

                _ = sleep_until_opt(due.map(|(_, at)| at)) => {
                    let Some((idx, at)) = due else { continue };
                    // A trigger landing exactly on the deadline is not issued.
                    if deadline_at.is_some_and(|d| at >= d) {
                        break StopReason::Deadline;
                    }
                    let reg = &self.jobs[idx];
                    self.fire(reg.job, &locks, &mut inflight, &mut report);

                    let now = Instant::now();
                    let mut next = at + reg.interval;
                    while next <= now {
                        debug!(job = %reg.job, "missed trigger skipped");
                        next += reg.interval;
                    }
                    next_fire[idx] = next;
                }
            }
        };

        report.stop_reason = Some(reason);
        info!(reason = ?reason, in_flight = inflight.len(), "scheduler no longer issuing triggers");

        // Ask running jobs to wind down at their next checkpoint.
        self.cancel.cancel();
        let drained = tokio::time::timeout(self.grace, drain(&mut inflight, &mut report)).await;
        if drained.is_err() {
            report.abandoned = inflight.len();
            warn!(
                abandoned = report.abandoned,
                grace = ?self.grace,
                "grace period elapsed, abandoning in-flight runs"
            );
            inflight.detach_all();
        }

        info!(
            fired = report.fired,
            completed = report.completed,
            failed = report.failed,
            dropped = report.dropped,
            abandoned = report.abandoned,
            "scheduler stopped"
        );
        report
    }

    fn fire(
        &self,
        job: JobKind,
        locks: &HashMap<JobKind, Arc<Mutex<()>>>,
        inflight: &mut JoinSet<JobOutcome>,
        report: &mut SchedulerReport,
    ) {
        let Some(lock) = locks.get(&job) else { return };
        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(job = %job, "job still running, trigger dropped");
                report.dropped += 1;
                return;
            }
        };

        report.fired += 1;
        info!(job = %job, "job triggered");
        let runner = self.runner.clone();
        let cancel = self.cancel.clone();
        inflight.spawn_blocking(move || {
            let _single_flight = guard;
            let started = std::time::Instant::now();
            let result = runner.run_job(job, &cancel).map_err(|e| format!("{e:#}"));
            (job, result, started.elapsed())
        });
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn drain(inflight: &mut JoinSet<JobOutcome>, report: &mut SchedulerReport) {
    while let Some(joined) = inflight.join_next().await {
        record(report, joined);
    }
}

fn record(report: &mut SchedulerReport, joined: Result<JobOutcome, tokio::task::JoinError>) {
    match joined {
        Ok((job, Ok(()), elapsed)) => {
            report.completed += 1;
            info!(job = %job, ?elapsed, "job completed");
        }
        Ok((job, Err(e), elapsed)) => {
            report.failed += 1;
            error!(job = %job, ?elapsed, error = %e, "job failed");
        }
        Err(e) => {
            report.failed += 1;
            error!(error = %e, "job panicked");
        }
    }
}
