//! Research stage: answer pending questions, record findings, queue follow-ups.
//!
//! A failed contextual answer falls back to a reasoning-only ask. If that
//! fails too the question stays pending and the loop moves on; only store
//! failures abort the stage. Cancellation is checked before every question.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{source_tag, StageContext};
use crate::insights::Insight;
use crate::scheduler::CancellationToken;

const FOLLOW_UP_PREFIX: &str = "follow-up:";

#[derive(Debug, Default, Serialize)]
pub struct ResearchReport {
    pub answered: Vec<String>,
    /// Questions left pending because no answer could be obtained.
    pub skipped: Vec<String>,
    pub follow_ups_added: usize,
    pub cancelled: bool,
}

pub struct ResearchAgent {
    ctx: StageContext,
    top_k: usize,
}

impl ResearchAgent {
    pub fn new(ctx: StageContext, top_k: usize) -> Self {
        Self { ctx, top_k }
    }

    pub fn run(&self, max_questions: usize, cancel: &CancellationToken) -> Result<ResearchReport> {
        self.run_on(Local::now().date_naive(), max_questions, cancel)
    }

    /// Research up to `max_questions` pending questions in queue order.
    pub fn run_on(
        &self,
        date: NaiveDate,
        max_questions: usize,
        cancel: &CancellationToken,
    ) -> Result<ResearchReport> {
        let pending: Vec<String> = self
            .ctx
            .questions
            .load_open()?
            .into_iter()
            .take(max_questions)
            .collect();
        info!(count = pending.len(), "research started");

        let source = source_tag("research", date);
        let mut report = ResearchReport::default();

        for question in pending {
            if cancel.is_cancelled() {
                info!(done = report.answered.len(), "research cancelled between questions");
                report.cancelled = true;
                break;
            }

            let Some(answer) = self.answer(&question) else {
                report.skipped.push(question);
                continue;
            };

            let insight = Insight::new(&source, "research", &question, answer.trim(), ["research", "auto"]);
            self.ctx.insights.add_idempotent(&insight)?;
            self.ctx.memory.add(
                &insight.answer,
                &json!({ "source": "auto_research", "question": question }),
                &insight.id,
            )?;

            let follow_ups = parse_follow_ups(&answer);
            report.follow_ups_added += self.ctx.questions.append(&follow_ups)?;
            self.ctx.questions.remove(&question)?;

            debug!(question = %question, follow_ups = follow_ups.len(), "question researched");
            report.answered.push(question);
        }

        info!(
            answered = report.answered.len(),
            skipped = report.skipped.len(),
            follow_ups = report.follow_ups_added,
            "research completed"
        );
        Ok(report)
    }

    /// Contextual answer, else reasoning-only, else `None`.
    fn answer(&self, question: &str) -> Option<String> {
        let context = self.ctx.memory.query(question, self.top_k).unwrap_or_else(|e| {
            warn!(error = %e, "memory query failed, researching without context");
            Vec::new()
        });

        let prompt = format!(
            "Research this question and summarize the key facts and insights concisely. \
             If it raises new questions, end with lines of the form `Follow-up: <question>`.\n\n\
             Question: {question}"
        );
        match self.ctx.cognition.ask(&prompt, &context) {
            Ok(answer) => return Some(answer),
            Err(e) => warn!(error = %e, "contextual research failed, falling back to reasoning only"),
        }

        let fallback = format!("Explain the key concepts behind: {question}");
        match self.ctx.cognition.ask(&fallback, &[]) {
            Ok(answer) => Some(answer),
            Err(e) => {
                warn!(question = %question, error = %e, "research failed, question left pending");
                None
            }
        }
    }
}

/// Questions from `Follow-up: ...` lines, in order.
fn parse_follow_ups(answer: &str) -> Vec<String> {
    answer
        .lines()
        .map(|l| super::strip_list_marker(l).trim_matches('*').trim())
        .filter_map(|l| {
            let head = l.get(..FOLLOW_UP_PREFIX.len())?;
            head.eq_ignore_ascii_case(FOLLOW_UP_PREFIX)
                .then(|| l[FOLLOW_UP_PREFIX.len()..].trim().to_string())
        })
        .filter(|q| !q.is_empty())
        .collect()
}
