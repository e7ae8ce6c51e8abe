//! ReflectionScorer: self-evaluation of reflections and the rolling quality metric.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::StageContext;
use crate::artifacts::{parse_evaluation, ScoreRecord, ScoreSummary, StoredReflection};

#[derive(Debug, Default, Serialize)]
pub struct EvaluationReport {
    pub evaluated: usize,
    /// Responses that could not be parsed into scores.
    pub malformed: usize,
}

pub struct ReflectionScorer {
    ctx: StageContext,
}

impl ReflectionScorer {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    /// Score one reflection and append the row to the score log.
    ///
    /// A malformed response is logged and yields `Ok(None)`; nothing is
    /// appended. Collaborator and IO failures are returned as errors.
    pub fn evaluate(&self, reflection: &StoredReflection) -> Result<Option<ScoreRecord>> {
        let text = self.ctx.reflections.read(reflection)?;
        let response = self.ctx.cognition.ask(&evaluation_prompt(&text), &[])?;

        match parse_evaluation(&response) {
            Ok(evaluation) => {
                let record = ScoreRecord::new(reflection.id.clone(), evaluation);
                self.ctx.scores.append(&record)?;
                info!(
                    reflection = %reflection.id,
                    quality = record.quality(),
                    "reflection scored"
                );
                Ok(Some(record))
            }
            Err(e) => {
                warn!(reflection = %reflection.id, error = %e, "malformed evaluation response, not recorded");
                Ok(None)
            }
        }
    }

    /// Score the latest `days` active reflections, oldest first.
    pub fn evaluate_recent(&self, days: usize) -> Result<EvaluationReport> {
        let active = self.ctx.reflections.active()?;
        let skip = active.len().saturating_sub(days);
        let latest = &active[skip..];
        info!(count = latest.len(), "evaluation started");

        let mut report = EvaluationReport::default();
        for reflection in latest {
            match self.evaluate(reflection)? {
                Some(_) => report.evaluated += 1,
                None => report.malformed += 1,
            }
        }

        info!(
            evaluated = report.evaluated,
            malformed = report.malformed,
            "evaluation completed"
        );
        Ok(report)
    }

    /// Means over the last `n` valid score records, or `None` without history.
    pub fn recent_average(&self, n: usize) -> Result<Option<ScoreSummary>> {
        let recent = self.ctx.scores.recent(n)?;
        Ok(ScoreSummary::from_records(&recent))
    }
}

fn evaluation_prompt(reflection: &str) -> String {
    format!(
        "Evaluate this reflection on:\n\
         1. Clarity (1-10)\n\
         2. Novelty (1-10)\n\
         3. Actionability (1-10)\n\
         4. Redundancy (1-10, lower is better)\n\
         5. Main topics and improvement suggestions.\n\n\
         Respond with a single CSV line: clarity,novelty,actionability,redundancy,topics,suggestions\n\n\
         Reflection:\n{reflection}"
    )
}
