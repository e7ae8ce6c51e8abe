//! Wiring: one [`Brain`] per process owns the database, the collaborators and
//! every artifact store, and exposes the trigger entry points.

use anyhow::{ensure, Context, Result};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::artifacts::{CompressedStore, QuestionQueue, ReflectionArchive, ScoreLog, ScoreRecord, ScoreSummary};
use crate::cognition::{self, Cognition};
use crate::config::PonderConfig;
use crate::db;
use crate::insights::InsightStore;
use crate::logs::ActivityLog;
use crate::memory::{self, Memory};
use crate::scheduler::{CancellationToken, JobKind, JobRunner, Scheduler};
use crate::stages::{
    CompressOutcome, EvaluationReport, MemoryCompressor, ReflectOutcome, ReflectionEngine,
    ReflectionScorer, ResearchAgent, ResearchReport, StageContext,
};
use crate::workflow::{RunJournal, WorkflowEngine, WorkflowError, WorkflowOptions, WorkflowReport};

const NOTE_EXTENSIONS: [&str; 2] = ["md", "txt"];
/// Log text sent to the model by `log_reflect` is cut to its last this many characters.
const LOG_REFLECT_MAX_CHARS: usize = 24_000;

pub struct Brain {
    config: PonderConfig,
    db: Arc<Mutex<Connection>>,
    ctx: StageContext,
    journal: RunJournal,
    activity: ActivityLog,
    reflect: ReflectionEngine,
    scorer: ReflectionScorer,
    research: ResearchAgent,
    compressor: MemoryCompressor,
    workflow: WorkflowEngine,
}

impl Brain {
    /// Build the configured collaborators and open every store.
    ///
    /// The cognition backend is checked first, so an absent backend fails
    /// before any file or database is created.
    pub fn open(config: PonderConfig) -> Result<Self> {
        let cognition: Arc<dyn Cognition> = Arc::from(
            cognition::create_cognition(&config.cognition)
                .context("cognition backend is not usable")?,
        );
        info!(model = %config.cognition.model, "cognition backend ready");

        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        info!(db = %db_path.display(), "database ready");
        let db = Arc::new(Mutex::new(conn));

        let memory: Arc<dyn Memory> = Arc::from(memory::create_memory(&config.memory, db.clone())?);
        Self::assemble(config, db, cognition, memory)
    }

    /// Open only the stores, without a cognition backend check.
    ///
    /// Commands that never call the model (listing, metrics, doctor) use this
    /// with a backend that refuses every request.
    pub fn open_offline(config: PonderConfig) -> Result<Self> {
        let db = Arc::new(Mutex::new(db::open_database(config.resolved_db_path())?));
        let memory: Arc<dyn Memory> = Arc::from(memory::create_memory(&config.memory, db.clone())?);
        Self::assemble(config, db, Arc::new(Offline), memory)
    }

    /// Wire explicit collaborators onto an open database.
    pub fn assemble(
        config: PonderConfig,
        db: Arc<Mutex<Connection>>,
        cognition: Arc<dyn Cognition>,
        memory: Arc<dyn Memory>,
    ) -> Result<Self> {
        let ctx = StageContext {
            cognition,
            memory,
            insights: InsightStore::new(db.clone()),
            reflections: Arc::new(ReflectionArchive::new(config.reflections_dir())?),
            questions: Arc::new(QuestionQueue::new(config.questions_path())),
            scores: Arc::new(ScoreLog::new(config.scores_path())),
            compressed: Arc::new(CompressedStore::new(config.compressed_dir())?),
        };

        let top_k = config.memory.top_k;
        let options = WorkflowOptions::from_config(&config.workflow, top_k);
        let journal = RunJournal::new(db.clone());

        Ok(Self {
            reflect: ReflectionEngine::new(ctx.clone(), top_k, options.new_questions),
            scorer: ReflectionScorer::new(ctx.clone()),
            research: ResearchAgent::new(ctx.clone(), top_k),
            compressor: MemoryCompressor::new(ctx.clone()),
            workflow: WorkflowEngine::new(ctx.clone(), options).with_journal(journal.clone()),
            journal,
            activity: ActivityLog::new(config.logs_dir()),
            ctx,
            db,
            config,
        })
    }

    pub fn config(&self) -> &PonderConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    pub fn insights(&self) -> &InsightStore {
        &self.ctx.insights
    }

    pub fn questions(&self) -> &QuestionQueue {
        &self.ctx.questions
    }

    pub fn reflections(&self) -> &ReflectionArchive {
        &self.ctx.reflections
    }

    pub fn scores(&self) -> &ScoreLog {
        &self.ctx.scores
    }

    pub fn journal(&self) -> &RunJournal {
        &self.journal
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    // ── Trigger entry points ───────────────────────────────────────────────

    pub fn reflect_cycle(&self) -> Result<ReflectOutcome> {
        self.reflect.reflect()
    }

    pub fn evaluate_cycle(&self, days: usize) -> Result<EvaluationReport> {
        self.scorer.evaluate_recent(days)
    }

    pub fn research_cycle(&self, max_questions: usize, cancel: &CancellationToken) -> Result<ResearchReport> {
        self.research.run(max_questions, cancel)
    }

    pub fn compress_cycle(&self, days: u32) -> Result<CompressOutcome> {
        self.compressor.compress_older_than(days)
    }

    pub fn automation_cycle(&self, cancel: &CancellationToken) -> Result<WorkflowReport, WorkflowError> {
        self.workflow.run(cancel)
    }

    /// Means over the last `window` scores, or over all of them.
    pub fn score_summary(&self, window: Option<usize>) -> Result<Option<ScoreSummary>> {
        let records = match window {
            Some(n) => self.ctx.scores.recent(n)?,
            None => self.ctx.scores.effective()?,
        };
        Ok(ScoreSummary::from_records(&records))
    }

    /// Ask directly, with memory context.
    pub fn ask(&self, query: &str) -> Result<String> {
        let context = self.ctx.memory.query(query, self.config.memory.top_k)?;
        Ok(self.ctx.cognition.ask(query, &context)?)
    }

    /// Ask the model for three learning areas to focus on, from the score log.
    pub fn focus(&self) -> Result<String> {
        let records = self.ctx.scores.effective()?;
        ensure!(
            !records.is_empty(),
            "no self-evaluation scores yet, run `ponder evaluate` first"
        );
        let rows: Vec<String> = records.iter().map(ScoreRecord::to_row).collect();
        let prompt = format!(
            "Based on these self-evaluation logs, suggest 3 learning areas I should focus on next:\n{}",
            rows.join("\n")
        );
        Ok(self.ctx.cognition.ask(&prompt, &[])?)
    }

    /// Ask the model to summarize the latest `days` daily log files.
    pub fn log_reflect(&self, days: usize) -> Result<String> {
        let text = self.activity.read_recent(days)?;
        ensure!(
            !text.trim().is_empty(),
            "no log files in {}",
            self.activity.dir().display()
        );
        let prompt = format!(
            "Summarize key activities, successes, and issues in these logs:\n{}",
            tail_chars(&text, LOG_REFLECT_MAX_CHARS)
        );
        Ok(self.ctx.cognition.ask(&prompt, &[])?)
    }

    /// Index `.md` / `.txt` files under `dir` into memory. Returns the number indexed.
    pub fn ingest_notes(&self, dir: &Path) -> Result<usize> {
        let mut files = Vec::new();
        collect_notes(dir, &mut files)?;
        files.sort();

        let mut indexed = 0;
        for path in &files {
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable note");
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }
            let rel = path.strip_prefix(dir).unwrap_or(path).to_string_lossy().into_owned();
            self.ctx.memory.add(
                &content,
                &json!({ "source": "local_file", "path": path.display().to_string() }),
                &format!("note:{rel}"),
            )?;
            indexed += 1;
        }

        info!(dir = %dir.display(), indexed, "notes ingested");
        Ok(indexed)
    }

    /// A scheduler that runs jobs against this brain.
    pub fn scheduler(self: &Arc<Self>) -> Scheduler {
        Scheduler::new(self.clone(), self.config.scheduler.grace_period())
    }
}

impl JobRunner for Brain {
    fn run_job(&self, job: JobKind, cancel: &CancellationToken) -> Result<()> {
        match job {
            JobKind::DailyReflection => self.reflect_cycle().map(|_| ()),
            JobKind::WeeklyCompression => self
                .compress_cycle(self.config.workflow.compress_after_days)
                .map(|_| ()),
            JobKind::WeeklyResearch => self
                .research_cycle(self.config.workflow.research_max_questions, cancel)
                .map(|_| ()),
            JobKind::DailyAutomationLoop => match self.automation_cycle(cancel) {
                Ok(_) => Ok(()),
                Err(WorkflowError::Cancelled { last_completed }) => {
                    info!(?last_completed, "automation run cancelled");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

fn collect_notes(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_notes(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| NOTE_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((at, _)) => &text[at..],
        None => text,
    }
}

/// Stand-in backend for commands that must not reach the model.
struct Offline;

impl Cognition for Offline {
    fn ask(&self, _prompt: &str, _context: &[String]) -> cognition::Result<String> {
        Err(cognition::CognitionError::Unavailable(
            "this command runs without a cognition backend".into(),
        ))
    }
}
