mod helpers;

use chrono::{Duration, NaiveDate};
use helpers::{date, seed_reflection, test_brain, test_brain_with, test_config, ScriptedCognition, TestBrain};
use ponder::artifacts::ArchiveState;
use ponder::cognition::{self, Cognition};
use ponder::db;
use ponder::memory::local::LocalMemory;
use ponder::brain::Brain;
use ponder::scheduler::CancellationToken;
use ponder::stages::CompressOutcome;
use ponder::workflow::{Route, RunStatus, Stage, WorkflowEngine, WorkflowError, WorkflowOptions};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TODAY: &str = "2026-10-18";

fn engine(tb: &TestBrain) -> WorkflowEngine {
    let config = tb.brain.config();
    WorkflowEngine::new(
        tb.brain.context().clone(),
        WorkflowOptions::from_config(&config.workflow, config.memory.top_k),
    )
    .with_journal(tb.brain.journal().clone())
}

fn run(tb: &TestBrain, today: NaiveDate) -> Result<ponder::workflow::WorkflowReport, WorkflowError> {
    engine(tb).run_on(today, &CancellationToken::new())
}

#[test]
fn low_quality_routes_through_research() {
    let tb = test_brain(
        ScriptedCognition::new()
            .on("Evaluate this reflection", "3,3,3,8,rust,go deeper")
            .on("new thoughtful questions", "1. What is Pin?\n2. What is Unpin?")
            .on("Research this question", "Pinning fixes an address.\nFollow-up: Why is Unpin auto-implemented?"),
    );

    let report = run(&tb, date(TODAY)).unwrap();

    assert_eq!(
        report.stages,
        vec![Stage::Reflect, Stage::DecideNext, Stage::Research, Stage::Compress]
    );
    assert_eq!(report.route, Some(Route::Research));
    assert_eq!(report.score, Some(3.0));
    assert_eq!(report.average, Some(3.0));

    let research = report.research.unwrap();
    assert_eq!(research.answered, vec!["What is Pin?", "What is Unpin?"]);
    assert!(matches!(report.compression, Some(CompressOutcome::NoOp)));

    assert_eq!(
        tb.brain.questions().load_open().unwrap(),
        vec!["Why is Unpin auto-implemented?"]
    );
    assert_eq!(tb.brain.insights().query_by_topic("research").unwrap().len(), 2);

    let runs = tb.brain.journal().recent(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].last_stage, Some(Stage::Compress));
    assert_eq!(runs[0].route.as_deref(), Some("research"));
}

#[test]
fn good_quality_skips_research_and_compresses() {
    let tb = test_brain(
        ScriptedCognition::new()
            .on("Summarize the following", "Old themes.")
            .on("Evaluate this reflection", "9,9,9,1,rust,none"),
    );
    let today = date(TODAY);
    seed_reflection(&tb.brain, today - Duration::days(20), "long ago");
    tb.brain.questions().append(["Left alone?"]).unwrap();

    let report = run(&tb, today).unwrap();

    assert_eq!(report.stages, vec![Stage::Reflect, Stage::DecideNext, Stage::Compress]);
    assert_eq!(report.route, Some(Route::Compress));
    assert_eq!(report.average, Some(9.25));
    assert!(report.research.is_none());
    assert!(matches!(report.compression, Some(CompressOutcome::Compressed { .. })));
    assert!(tb
        .cognition
        .prompts()
        .iter()
        .all(|p| !p.starts_with("Research this question")));

    let states: Vec<_> = tb
        .brain
        .reflections()
        .list()
        .unwrap()
        .into_iter()
        .map(|r| (r.date, r.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (today - Duration::days(20), ArchiveState::Archived),
            (today, ArchiveState::Active)
        ]
    );
}

#[test]
fn unparseable_evaluation_counts_as_no_history() {
    let tb = test_brain(ScriptedCognition::new().on("Evaluate this reflection", "Looks great to me!"));

    let report = run(&tb, date(TODAY)).unwrap();

    assert_eq!(report.score, None);
    assert_eq!(report.average, None);
    assert_eq!(report.route, Some(Route::Research));
    assert!(tb.brain.scores().records().unwrap().is_empty());
}

#[test]
fn compress_failure_reports_last_completed_stage() {
    let tb = test_brain(
        ScriptedCognition::new()
            .fail_on("Summarize the following")
            .on("Evaluate this reflection", "8,8,8,2,t,s"),
    );
    let today = date(TODAY);
    seed_reflection(&tb.brain, today - Duration::days(30), "aged");

    let err = run(&tb, today).unwrap_err();
    match &err {
        WorkflowError::Stage {
            stage,
            last_completed,
            ..
        } => {
            assert_eq!(*stage, Stage::Compress);
            assert_eq!(*last_completed, Some(Stage::DecideNext));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("compress stage failed after decide_next"));

    // Completed stages stay durable; the aged reflection is untouched.
    assert!(tb.brain.reflections().find(today).unwrap().is_some());
    assert_eq!(tb.brain.reflections().active().unwrap().len(), 2);
    assert_eq!(tb.brain.scores().records().unwrap().len(), 1);

    let run = &tb.brain.journal().recent(1).unwrap()[0];
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.last_stage, Some(Stage::DecideNext));
    assert!(run.error.as_deref().unwrap().contains("connection refused"));
}

#[test]
fn next_run_restarts_from_reflect() {
    let tb = test_brain(
        ScriptedCognition::new()
            .fail_on("Summarize what I've learned")
            .on("Evaluate this reflection", "8,8,8,2,t,s"),
    );
    let today = date(TODAY);

    let err = run(&tb, today).unwrap_err();
    assert_eq!(err.last_completed(), None);
    assert!(tb.brain.reflections().list().unwrap().is_empty());

    // Same data directory, healthy backend.
    let config = tb.brain.config().clone();
    let db = tb.brain.db().clone();
    let healthy = Brain::assemble(
        config,
        db.clone(),
        Arc::new(ScriptedCognition::new().on("Evaluate this reflection", "8,8,8,2,t,s")),
        Arc::new(LocalMemory::new(db)),
    )
    .unwrap();
    let retry = WorkflowEngine::new(
        healthy.context().clone(),
        WorkflowOptions::from_config(&healthy.config().workflow, 3),
    )
    .with_journal(healthy.journal().clone());

    let report = retry.run_on(today, &CancellationToken::new()).unwrap();
    assert_eq!(report.stages[0], Stage::Reflect);
    assert_eq!(report.route, Some(Route::Compress));

    let statuses: Vec<_> = healthy.journal().recent(5).unwrap().iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RunStatus::Completed, RunStatus::Failed]);
}

#[test]
fn cancelled_before_start_writes_nothing() {
    let tb = test_brain(ScriptedCognition::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine(&tb).run_on(date(TODAY), &cancel).unwrap_err();
    assert!(matches!(err, WorkflowError::Cancelled { last_completed: None }));
    assert!(tb.cognition.prompts().is_empty());
    assert!(tb.brain.reflections().list().unwrap().is_empty());
    assert_eq!(tb.brain.journal().recent(1).unwrap()[0].status, RunStatus::Cancelled);
}

/// Answers everything, and requests cancellation the first time it is asked
/// to research.
struct CancelDuringResearch {
    cancel: CancellationToken,
}

impl Cognition for CancelDuringResearch {
    fn ask(&self, prompt: &str, _context: &[String]) -> cognition::Result<String> {
        if prompt.starts_with("Evaluate this reflection") {
            return Ok("2,2,2,9,t,s".into());
        }
        if prompt.starts_with("Research this question") {
            self.cancel.cancel();
        }
        Ok("answer".into())
    }
}

#[test]
fn cancellation_during_research_stops_between_questions() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let cancel = CancellationToken::new();
    let db = Arc::new(Mutex::new(db::open_memory_database().unwrap()));
    let brain = Brain::assemble(
        config,
        db.clone(),
        Arc::new(CancelDuringResearch { cancel: cancel.clone() }),
        Arc::new(LocalMemory::new(db)),
    )
    .unwrap();
    brain.questions().append(["first?", "second?"]).unwrap();

    let err = WorkflowEngine::new(
        brain.context().clone(),
        WorkflowOptions::from_config(&brain.config().workflow, 3),
    )
    .with_journal(brain.journal().clone())
    .run_on(date(TODAY), &cancel)
    .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Cancelled {
            last_completed: Some(Stage::DecideNext)
        }
    ));
    // Reflect revisited one seeded question and proposed "answer"; research
    // finished the other seeded question and stopped before "answer".
    assert_eq!(brain.questions().load_open().unwrap(), vec!["answer"]);
    assert_eq!(brain.insights().query_by_topic("research").unwrap().len(), 1);
    assert_eq!(brain.journal().recent(1).unwrap()[0].status, RunStatus::Cancelled);
}

#[test]
fn queue_duplicates_are_ignored_across_runs() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let tb = test_brain_with(
        ScriptedCognition::new()
            .on("Evaluate this reflection", "9,9,9,1,t,s")
            .on("new thoughtful questions", "- What is Pin?\n- what is  pin?\n- Why async?"),
        config,
        tmp,
    );

    let first = run(&tb, date("2026-10-17")).unwrap();
    assert_eq!(first.reflection.unwrap().questions_added, 2);

    // The second run revisits one question and re-proposes both.
    let second = run(&tb, date(TODAY)).unwrap();
    let reflection = second.reflection.unwrap();
    let revisited = reflection.revisited_question.unwrap();
    assert_eq!(reflection.questions_added, 0);

    let open = tb.brain.questions().load_open().unwrap();
    assert_eq!(open.len(), 1);
    assert!(!open.contains(&revisited));
}
