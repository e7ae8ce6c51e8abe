mod helpers;

use chrono::Local;
use helpers::{test_brain, test_config, ScriptedCognition};
use ponder::brain::Brain;
use ponder::scheduler::{CancellationToken, JobKind, JobRunner};
use std::io::Write;
use tempfile::TempDir;

#[test]
fn ingested_notes_feed_the_prompt_context() {
    let tb = test_brain(ScriptedCognition::new());
    let notes = TempDir::new().unwrap();
    std::fs::create_dir_all(notes.path().join("journal")).unwrap();
    std::fs::write(notes.path().join("borrowing.md"), "The borrow checker rejects aliasing mutation.").unwrap();
    std::fs::write(notes.path().join("journal/day1.txt"), "Walked the dog, thought about lifetimes.").unwrap();
    std::fs::write(notes.path().join("empty.md"), "   \n").unwrap();
    std::fs::write(notes.path().join("image.png"), "not a note").unwrap();

    assert_eq!(tb.brain.ingest_notes(notes.path()).unwrap(), 2);

    let context = tb.brain.context().memory.query("borrow checker", 3).unwrap();
    assert!(context[0].contains("borrow checker"));
}

#[test]
fn ask_answers_with_the_model() {
    let tb = test_brain(ScriptedCognition::new().on("What did I learn", "You learned about Pin."));
    assert_eq!(tb.brain.ask("What did I learn this week?").unwrap(), "You learned about Pin.");
}

#[test]
fn evaluate_cycle_scores_and_summarizes() {
    let tb = test_brain(ScriptedCognition::new().on("Evaluate this reflection", "8,9,7,2,rust,more examples"));
    tb.brain.reflect_cycle().unwrap();

    let report = tb.brain.evaluate_cycle(7).unwrap();
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.malformed, 0);

    let summary = tb.brain.score_summary(None).unwrap().unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.quality, 8.25);

    let record = &tb.brain.scores().records().unwrap()[0];
    assert_eq!(
        record.reflection_ref,
        format!("reflection_{}", Local::now().date_naive().format("%Y-%m-%d"))
    );
}

#[test]
fn cancelled_automation_job_is_not_a_failure() {
    let tb = test_brain(ScriptedCognition::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    tb.brain.run_job(JobKind::DailyAutomationLoop, &cancel).unwrap();
    assert!(tb.brain.reflections().list().unwrap().is_empty());
}

#[test]
fn failing_job_reports_the_error() {
    let tb = test_brain(ScriptedCognition::new().fail_on("Summarize what I've learned"));
    let err = tb
        .brain
        .run_job(JobKind::DailyAutomationLoop, &CancellationToken::new())
        .unwrap_err();
    assert!(format!("{err:#}").contains("reflect stage failed"));

    // Compression with nothing aged succeeds without a model call.
    tb.brain
        .run_job(JobKind::WeeklyCompression, &CancellationToken::new())
        .unwrap();
}

#[test]
fn offline_brain_creates_its_stores_on_disk() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let brain = Brain::open_offline(config).unwrap();

    assert!(tmp.path().join("insights.db").exists());
    assert!(tmp.path().join("reflections").is_dir());
    assert!(brain.questions().load_open().unwrap().is_empty());
    assert!(brain.score_summary(None).unwrap().is_none());
    assert!(brain.ask("anything?").is_err());
}

#[test]
fn focus_asks_from_the_score_log() {
    let tb = test_brain(
        ScriptedCognition::new()
            .on("Evaluate this reflection", "8,9,7,2,rust,more examples")
            .on("suggest 3 learning areas", "1. Pin\n2. Waker\n3. Executors"),
    );
    assert!(tb.brain.focus().is_err());
    assert!(tb.cognition.prompts().is_empty());

    tb.brain.reflect_cycle().unwrap();
    tb.brain.evaluate_cycle(7).unwrap();

    assert_eq!(tb.brain.focus().unwrap(), "1. Pin\n2. Waker\n3. Executors");
    let prompt = tb.cognition.prompts().pop().unwrap();
    assert!(prompt.contains(",8,9,7,2,rust,more examples"));
}

#[test]
fn log_reflect_summarizes_the_latest_daily_files() {
    let tb = test_brain(ScriptedCognition::new().on("Summarize key activities", "Quiet week."));
    assert!(tb.brain.log_reflect(1).is_err());

    let activity = tb.brain.activity();
    writeln!(activity.open_for(helpers::date("2026-10-16")).unwrap(), "old line").unwrap();
    writeln!(activity.open_for(helpers::date("2026-10-17")).unwrap(), "reflection written").unwrap();

    assert_eq!(tb.brain.log_reflect(1).unwrap(), "Quiet week.");
    let prompt = tb.cognition.prompts().pop().unwrap();
    assert!(prompt.contains("ponder_20261017.log\nreflection written"));
    assert!(!prompt.contains("old line"));
}
