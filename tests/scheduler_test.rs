mod helpers;

use helpers::{test_brain, ScriptedCognition};
use ponder::scheduler::{CancellationToken, JobKind, JobRunner, Scheduler, StopReason};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);

#[derive(Default)]
struct Counting {
    runs: AtomicUsize,
}

impl JobRunner for Counting {
    fn run_job(&self, _job: JobKind, _cancel: &CancellationToken) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Blocks for `work`, tracking how many runs overlap.
struct Slow {
    work: Duration,
    running: AtomicUsize,
    max_running: AtomicUsize,
    runs: AtomicUsize,
}

impl Slow {
    fn new(work: Duration) -> Self {
        Self {
            work,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }
}

impl JobRunner for Slow {
    fn run_job(&self, _job: JobKind, _cancel: &CancellationToken) -> anyhow::Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.work);
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn one_hour_lifetime_with_daily_job_fires_once() {
    let runner = Arc::new(Counting::default());
    let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(5));
    scheduler.schedule_with(JobKind::DailyReflection, 24 * HOUR, true);

    let report = scheduler.run(Some(HOUR)).await;

    assert_eq!(report.stop_reason, Some(StopReason::Deadline));
    assert_eq!(report.fired, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.abandoned, 0);
    assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn jobs_fire_on_their_own_intervals() {
    let runner = Arc::new(Counting::default());
    let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(5));
    scheduler
        .schedule(JobKind::DailyReflection, HOUR)
        .schedule(JobKind::WeeklyResearch, 3 * HOUR);

    // Reflection at 1..=9h, research at 3h, 6h, 9h; 10h is the deadline.
    let report = scheduler.run(Some(10 * HOUR)).await;

    assert_eq!(report.fired, 12);
    assert_eq!(report.completed, 12);
    assert_eq!(report.failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_trigger_is_dropped() {
    let runner = Arc::new(Slow::new(Duration::from_millis(180)));
    let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(2));
    scheduler.schedule_with(JobKind::WeeklyResearch, Duration::from_millis(50), true);

    let report = scheduler.run(Some(Duration::from_millis(400))).await;

    assert_eq!(report.stop_reason, Some(StopReason::Deadline));
    assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);
    assert!(report.dropped >= 1, "expected dropped triggers, got {report:?}");
    assert!(report.fired >= 1);
    assert_eq!(report.fired, runner.runs.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_abandons_runs_after_grace_period() {
    let runner = Arc::new(Slow::new(Duration::from_millis(1500)));
    let mut scheduler = Scheduler::new(runner.clone(), Duration::from_millis(100));
    scheduler.schedule_with(JobKind::DailyAutomationLoop, HOUR, true);

    let handle = scheduler.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });

    let started = Instant::now();
    let report = scheduler.run(None).await;

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert_eq!(report.stop_reason, Some(StopReason::Stopped));
    assert_eq!(report.fired, 1);
    assert_eq!(report.completed, 0);
    assert_eq!(report.abandoned, 1);
}

#[tokio::test(start_paused = true)]
async fn brain_runs_scheduled_reflection() {
    let tb = test_brain(ScriptedCognition::new());
    let data_dir = tb.tmp.path().to_path_buf();
    let brain = Arc::new(tb.brain);

    let mut scheduler = brain.scheduler();
    scheduler.schedule_with(JobKind::DailyReflection, 24 * HOUR, true);
    let report = scheduler.run(Some(HOUR)).await;

    assert_eq!(report.fired, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(brain.reflections().active().unwrap().len(), 1);
    assert!(data_dir.join("reflections").is_dir());
}

#[tokio::test(start_paused = true)]
async fn failing_job_is_counted_and_scheduler_keeps_going() {
    let tb = test_brain(ScriptedCognition::new().fail_on("Summarize what I've learned"));
    let brain = Arc::new(tb.brain);

    let mut scheduler = brain.scheduler();
    scheduler.schedule(JobKind::DailyReflection, HOUR);
    let report = scheduler.run(Some(Duration::from_secs(3 * 3600 + 60))).await;

    assert_eq!(report.fired, 3);
    assert_eq!(report.failed, 3);
    assert_eq!(report.stop_reason, Some(StopReason::Deadline));
}
