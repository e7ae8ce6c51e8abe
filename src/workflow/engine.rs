use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{error, info, warn};

use super::journal::{RunJournal, RunStatus};
use super::{decide, describe, next_stage, Route, Stage, WorkflowError};
use crate::artifacts::{ScoreRecord, ScoreSummary};
use crate::config::WorkflowConfig;
use crate::scheduler::CancellationToken;
use crate::stages::{
    CompressOutcome, MemoryCompressor, ReflectOutcome, ReflectionEngine, ReflectionScorer,
    ResearchAgent, ResearchReport, StageContext,
};

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub quality_threshold: f64,
    pub score_window: usize,
    pub research_max_questions: usize,
    pub compress_after_days: u32,
    pub top_k: usize,
    pub new_questions: usize,
}

impl WorkflowOptions {
    pub fn from_config(workflow: &WorkflowConfig, top_k: usize) -> Self {
        Self {
            quality_threshold: workflow.quality_threshold,
            score_window: workflow.score_window,
            research_max_questions: workflow.research_max_questions,
            compress_after_days: workflow.compress_after_days,
            top_k,
            new_questions: workflow.new_questions,
        }
    }
}

/// What one completed run did.
#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub run_id: Option<String>,
    pub stages: Vec<Stage>,
    pub reflection: Option<ReflectOutcome>,
    pub score: Option<f64>,
    pub average: Option<f64>,
    pub route: Option<Route>,
    pub research: Option<ResearchReport>,
    pub compression: Option<CompressOutcome>,
}

pub struct WorkflowEngine {
    ctx: StageContext,
    options: WorkflowOptions,
    reflect: ReflectionEngine,
    scorer: ReflectionScorer,
    research: ResearchAgent,
    compressor: MemoryCompressor,
    journal: Option<RunJournal>,
}

impl WorkflowEngine {
    pub fn new(ctx: StageContext, options: WorkflowOptions) -> Self {
        Self {
            reflect: ReflectionEngine::new(ctx.clone(), options.top_k, options.new_questions),
            scorer: ReflectionScorer::new(ctx.clone()),
            research: ResearchAgent::new(ctx.clone(), options.top_k),
            compressor: MemoryCompressor::new(ctx.clone()),
            ctx,
            options,
            journal: None,
        }
    }

    /// Record every run in `journal`.
    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn run(&self, cancel: &CancellationToken) -> Result<WorkflowReport, WorkflowError> {
        self.run_on(Local::now().date_naive(), cancel)
    }

    /// One pass from `Reflect` to `Done`.
    ///
    /// Cancellation is checked before each stage. On failure the run stops
    /// and the error names the last stage that completed; the next run starts
    /// again from `Reflect`.
    pub fn run_on(
        &self,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<WorkflowReport, WorkflowError> {
        let run_id = self.journal_start();
        info!(run = run_id.as_deref().unwrap_or("-"), %today, "workflow run started");

        let mut report = WorkflowReport {
            run_id: run_id.clone(),
            stages: Vec::new(),
            reflection: None,
            score: None,
            average: None,
            route: None,
            research: None,
            compression: None,
        };
        let mut stage = Stage::Reflect;
        let mut last_completed: Option<Stage> = None;

        while stage != Stage::Done {
            if cancel.is_cancelled() {
                info!(last_completed = describe(&last_completed), "workflow cancelled between stages");
                self.journal_finish(&run_id, RunStatus::Cancelled, None);
                return Err(WorkflowError::Cancelled { last_completed });
            }

            info!(stage = %stage, "stage started");
            let outcome = self.execute(stage, today, cancel, &mut report);

            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    info!(stage = %stage, "stage interrupted by cancellation");
                    self.journal_finish(&run_id, RunStatus::Cancelled, None);
                    return Err(WorkflowError::Cancelled { last_completed });
                }
                Err(e) => {
                    error!(stage = %stage, last_completed = describe(&last_completed), error = %format!("{e:#}"), "stage failed");
                    self.journal_finish(&run_id, RunStatus::Failed, Some(&format!("{e:#}")));
                    return Err(WorkflowError::Stage {
                        stage,
                        last_completed,
                        source: e.into(),
                    });
                }
            }

            last_completed = Some(stage);
            report.stages.push(stage);
            self.journal_stage(&run_id, stage, report.route);
            info!(stage = %stage, "stage completed");

            let Some(next) = next_stage(stage, report.route) else {
                let e = anyhow::anyhow!("no transition out of {stage}");
                self.journal_finish(&run_id, RunStatus::Failed, Some(&e.to_string()));
                return Err(WorkflowError::Stage {
                    stage,
                    last_completed,
                    source: e.into(),
                });
            };
            stage = next;
        }

        self.journal_finish(&run_id, RunStatus::Completed, None);
        info!(
            stages = report.stages.len(),
            route = report.route.map(Route::as_str).unwrap_or("-"),
            "workflow run completed"
        );
        Ok(report)
    }

    /// Run one stage. `Ok(false)` means it stopped early on cancellation.
    fn execute(
        &self,
        stage: Stage,
        today: NaiveDate,
        cancel: &CancellationToken,
        report: &mut WorkflowReport,
    ) -> anyhow::Result<bool> {
        match stage {
            Stage::Reflect => {
                report.reflection = Some(self.reflect.reflect_on(today)?);
            }
            Stage::DecideNext => {
                let scored = self.score_today(today)?;
                let average = self.scorer.recent_average(self.options.score_window)?;
                let route = decide(average.map(|s| s.quality), self.options.quality_threshold);
                info!(
                    average = ?average.map(|s: ScoreSummary| s.quality),
                    threshold = self.options.quality_threshold,
                    route = route.as_str(),
                    "next stage decided"
                );
                report.score = scored.map(|r| r.quality());
                report.average = average.map(|s| s.quality);
                report.route = Some(route);
            }
            Stage::Research => {
                let research =
                    self.research
                        .run_on(today, self.options.research_max_questions, cancel)?;
                let cancelled = research.cancelled;
                report.research = Some(research);
                if cancelled {
                    return Ok(false);
                }
            }
            Stage::Compress => {
                report.compression = Some(
                    self.compressor
                        .compress_at(self.options.compress_after_days, today)?,
                );
            }
            Stage::Done => {}
        }
        Ok(true)
    }

    fn score_today(&self, today: NaiveDate) -> anyhow::Result<Option<ScoreRecord>> {
        match self.ctx.reflections.find(today)? {
            Some(stored) => self.scorer.evaluate(&stored),
            None => {
                warn!(%today, "no reflection for today to evaluate");
                Ok(None)
            }
        }
    }

    // Journal writes are best effort: a run is never failed by its own bookkeeping.

    fn journal_start(&self) -> Option<String> {
        let journal = self.journal.as_ref()?;
        journal
            .start()
            .map_err(|e| warn!(error = %e, "failed to open run journal entry"))
            .ok()
    }

    fn journal_stage(&self, run_id: &Option<String>, stage: Stage, route: Option<Route>) {
        if let (Some(journal), Some(id)) = (&self.journal, run_id) {
            if let Err(e) = journal.record_stage(id, stage, route) {
                warn!(error = %e, "failed to record stage in run journal");
            }
        }
    }

    fn journal_finish(&self, run_id: &Option<String>, status: RunStatus, error: Option<&str>) {
        if let (Some(journal), Some(id)) = (&self.journal, run_id) {
            if let Err(e) = journal.finish(id, status, error) {
                warn!(error = %e, "failed to close run journal entry");
            }
        }
    }
}
