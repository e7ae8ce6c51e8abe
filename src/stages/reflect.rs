//! Reflect stage: revisit one open question, write the daily reflection,
//! propose follow-up questions.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};

use super::{first_line_or, parse_question_list, source_tag, StageContext};
use crate::artifacts::ReflectionRecord;
use crate::insights::Insight;

const SUMMARY_QUERY: &str = "recent learning, notes, commits and recurring themes";

#[derive(Debug, Serialize)]
pub struct ReflectOutcome {
    pub date: NaiveDate,
    pub reflection_id: String,
    pub path: PathBuf,
    pub revisited_question: Option<String>,
    pub new_questions: Vec<String>,
    /// New questions that were not already pending.
    pub questions_added: usize,
}

pub struct ReflectionEngine {
    ctx: StageContext,
    top_k: usize,
    new_questions: usize,
}

impl ReflectionEngine {
    pub fn new(ctx: StageContext, top_k: usize, new_questions: usize) -> Self {
        Self {
            ctx,
            top_k,
            new_questions,
        }
    }

    pub fn reflect(&self) -> Result<ReflectOutcome> {
        self.reflect_on(Local::now().date_naive())
    }

    /// Produce the reflection for `date`, overwriting any earlier one that day.
    ///
    /// The revisited question is removed from the queue only after the
    /// reflection has been written, so a failed run leaves it pending.
    pub fn reflect_on(&self, date: NaiveDate) -> Result<ReflectOutcome> {
        info!(%date, "reflection started");
        let source = source_tag("reflection", date);

        let revisited = match self.ctx.questions.select_one()? {
            Some(question) => {
                info!(question = %question, "revisiting open question");
                let answer = self.answer_and_record(&question, &source)?;
                Some((question, answer))
            }
            None => {
                debug!("no open questions to revisit");
                None
            }
        };

        let context = self.ctx.memory.query(SUMMARY_QUERY, self.top_k)?;
        let summary = self.ctx.cognition.ask(
            "Summarize what I've learned recently and identify recurring themes \
             and possible next improvements. Avoid repeating earlier reflections.",
            &context,
        )?;

        let listing = self.ctx.cognition.ask(
            &format!(
                "Based on this reflection, list {} new thoughtful questions to explore next, \
                 one per line.\n\nReflection:\n{summary}",
                self.new_questions
            ),
            &[],
        )?;
        let new_questions = parse_question_list(&listing, self.new_questions);
        let questions_added = self.ctx.questions.append(&new_questions)?;

        let (revisited_question, revisited_answer) = match &revisited {
            Some((q, a)) => (Some(q.clone()), Some(a.clone())),
            None => (None, None),
        };
        let record = ReflectionRecord {
            date,
            revisited_question,
            revisited_answer,
            summary,
            new_questions,
        };
        let path = self.ctx.reflections.write(&record)?;

        self.ctx.memory.add(
            &record.to_markdown(),
            &json!({ "source": source, "kind": "reflection" }),
            &record.id(),
        )?;

        if let Some((question, _)) = &revisited {
            self.ctx.questions.remove(question)?;
        }

        info!(
            file = %path.display(),
            revisited = revisited.is_some(),
            new_questions = record.new_questions.len(),
            questions_added,
            "reflection completed"
        );

        Ok(ReflectOutcome {
            date,
            reflection_id: record.id(),
            path,
            revisited_question: record.revisited_question,
            new_questions: record.new_questions,
            questions_added,
        })
    }

    /// Answer `question` with memory context and record the result as an insight.
    fn answer_and_record(&self, question: &str, source: &str) -> Result<String> {
        let context = self.ctx.memory.query(question, self.top_k)?;
        let answer = self.ctx.cognition.ask(
            &format!("Answer this question based on my knowledge: {question}"),
            &context,
        )?;

        let topic = self.ctx.cognition.ask(
            &format!("Categorize this question into 1-2 topic keywords. Reply with the keywords only: {question}"),
            &[],
        )?;
        let tags = self.ctx.cognition.ask(
            &format!("Suggest 3 short comma-separated tags for this content: {question} {answer}"),
            &[],
        )?;

        let insight = Insight::new(
            source,
            first_line_or(&topic, "general"),
            question,
            answer.trim(),
            first_line_or(&tags, "").split(',').map(|t| t.trim().trim_start_matches('#')),
        );
        self.ctx.insights.add_idempotent(&insight)?;
        self.ctx.memory.add(
            &format!("Q: {question}\nA: {}", insight.answer),
            &json!({ "source": source, "kind": "insight", "topic": insight.topic }),
            &insight.id,
        )?;
        debug!(id = %insight.id, topic = %insight.topic, "revisited question recorded");

        Ok(insight.answer)
    }
}
