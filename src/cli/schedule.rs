//! `schedule` command: run jobs on their intervals until timeout or Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::brain::Brain;
use crate::config::PonderConfig;
use crate::scheduler::{hours_to_duration, JobKind};

pub struct ScheduleArgs {
    pub jobs: Vec<JobKind>,
    /// Overrides every job's configured interval.
    pub interval_hours: Option<f64>,
    pub timeout_hours: Option<f64>,
    pub run_now: bool,
}

pub fn schedule(config: PonderConfig, args: ScheduleArgs) -> Result<()> {
    let jobs = if args.jobs.is_empty() {
        vec![JobKind::DailyReflection]
    } else {
        args.jobs
    };

    // The brain owns a blocking HTTP client, so it is built and finally
    // dropped outside the async runtime.
    let brain = Arc::new(Brain::open(config)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut scheduler = brain.scheduler();
    for job in &jobs {
        let interval = match args.interval_hours {
            Some(h) => hours_to_duration(h).context("--interval-hours")?,
            None => job.interval(&brain.config().scheduler)?,
        };
        scheduler.schedule_with(*job, interval, args.run_now);
    }
    let deadline = args
        .timeout_hours
        .map(|h| hours_to_duration(h).context("--timeout-hours"))
        .transpose()?;

    let names: Vec<_> = jobs.iter().map(|j| j.as_str()).collect();
    println!("Scheduler running: {}", names.join(", "));
    match deadline {
        Some(d) => println!("Stops after {:.2} hour(s) or Ctrl-C.", d.as_secs_f64() / 3600.0),
        None => println!("Press Ctrl-C to stop."),
    }

    let report = runtime.block_on(async {
        let handle = scheduler.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.stop();
            }
        });
        scheduler.run(deadline).await
    });

    println!(
        "Scheduler stopped ({}): {} fired, {} completed, {} failed, {} dropped",
        match report.stop_reason {
            Some(crate::scheduler::StopReason::Deadline) => "timeout",
            _ => "stopped",
        },
        report.fired,
        report.completed,
        report.failed,
        report.dropped
    );

    if report.abandoned > 0 {
        println!("{} run(s) did not finish within the grace period and were abandoned.", report.abandoned);
        // Do not wait for the abandoned blocking runs.
        runtime.shutdown_background();
    } else {
        drop(runtime);
    }
    drop(scheduler);
    Ok(())
}
