//! MemoryCompressor: fold aged reflections into one long-term summary.

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use super::{source_tag, StageContext};
use crate::artifacts::CompressedSummary;
use crate::insights::types::LONG_TERM_SUMMARY_TOPIC;
use crate::insights::Insight;

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompressOutcome {
    /// Nothing was old enough.
    NoOp,
    Compressed {
        summary: CompressedSummaryInfo,
        path: PathBuf,
        insight_id: String,
    },
}

/// Serializable view of a written summary.
#[derive(Debug, Serialize)]
pub struct CompressedSummaryInfo {
    pub date: NaiveDate,
    pub source_refs: Vec<String>,
    pub summary_text: String,
}

impl From<&CompressedSummary> for CompressedSummaryInfo {
    fn from(s: &CompressedSummary) -> Self {
        Self {
            date: s.date,
            source_refs: s.source_refs.iter().cloned().collect(),
            summary_text: s.summary_text.clone(),
        }
    }
}

pub struct MemoryCompressor {
    ctx: StageContext,
}

impl MemoryCompressor {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub fn compress_older_than(&self, days: u32) -> Result<CompressOutcome> {
        self.compress_at(days, Local::now().date_naive())
    }

    /// Compress every active reflection dated before `today - days`.
    ///
    /// The summary file and the archive renames happen as one unit under the
    /// archive lock; the insight and memory entry are recorded afterwards.
    pub fn compress_at(&self, days: u32, today: NaiveDate) -> Result<CompressOutcome> {
        let cutoff = today - Duration::days(i64::from(days));
        let aged = self.ctx.reflections.active_before(cutoff)?;
        if aged.is_empty() {
            info!(days, %cutoff, "no reflections to compress");
            return Ok(CompressOutcome::NoOp);
        }
        info!(count = aged.len(), %cutoff, "compression started");

        let mut content = String::new();
        for reflection in &aged {
            content.push_str(&self.ctx.reflections.read(reflection)?);
            content.push('\n');
        }

        // Collaborator call happens outside the archive lock.
        let summary_text = self.ctx.cognition.ask(
            &format!(
                "Summarize the following {} reflections into key insights, themes, and lessons:\n{content}",
                aged.len()
            ),
            &[],
        )?;

        let summary = CompressedSummary {
            date: today,
            source_refs: aged.iter().map(|r| r.id.clone()).collect(),
            summary_text: summary_text.trim().to_string(),
        };

        let written = self
            .ctx
            .reflections
            .archive_with(&aged, || self.ctx.compressed.write(&summary))?;
        let Some(path) = written else {
            info!("reflections changed during compression, nothing archived");
            return Ok(CompressOutcome::NoOp);
        };

        let (first, last) = (&aged[0], &aged[aged.len() - 1]);
        let insight = Insight::new(
            source_tag("compression", today),
            LONG_TERM_SUMMARY_TOPIC,
            format!(
                "Summary of {} reflections from {} to {}",
                aged.len(),
                first.date,
                last.date
            ),
            summary.summary_text.clone(),
            ["compressed", "summary"],
        );
        self.ctx.insights.add_idempotent(&insight)?;

        let memory_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| insight.id.clone());
        self.ctx.memory.add(
            &summary.summary_text,
            &json!({ "source": insight.source, "kind": "compressed", "sources": summary.source_refs }),
            &memory_id,
        )?;

        info!(
            archived = aged.len(),
            file = %path.display(),
            "compression completed"
        );
        Ok(CompressOutcome::Compressed {
            summary: CompressedSummaryInfo::from(&summary),
            path,
            insight_id: insight.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArchiveState, ReflectionRecord};
    use crate::stages::testing::{fixture, FakeCognition};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn reflection(ctx: &StageContext, days_ago: i64) {
        ctx.reflections
            .write(&ReflectionRecord {
                date: today() - Duration::days(days_ago),
                revisited_question: None,
                revisited_answer: None,
                summary: format!("{days_ago} days ago"),
                new_questions: vec![],
            })
            .unwrap();
    }

    #[test]
    fn test_nothing_aged_is_noop() {
        let fx = fixture(FakeCognition::new());
        reflection(&fx.ctx, 3);
        let compressor = MemoryCompressor::new(fx.ctx.clone());

        assert!(matches!(compressor.compress_at(14, today()).unwrap(), CompressOutcome::NoOp));
        assert!(fx.cognition.calls().is_empty());
    }

    #[test]
    fn test_boundary_day_is_not_aged() {
        let fx = fixture(FakeCognition::new());
        reflection(&fx.ctx, 14);
        let compressor = MemoryCompressor::new(fx.ctx.clone());
        assert!(matches!(compressor.compress_at(14, today()).unwrap(), CompressOutcome::NoOp));

        reflection(&fx.ctx, 15);
        assert!(matches!(
            compressor.compress_at(14, today()).unwrap(),
            CompressOutcome::Compressed { .. }
        ));
    }

    #[test]
    fn test_compresses_in_chronological_order() {
        let fx = fixture(FakeCognition::new().on("Summarize the following", "Long-term themes."));
        reflection(&fx.ctx, 30);
        reflection(&fx.ctx, 20);
        let compressor = MemoryCompressor::new(fx.ctx.clone());

        let CompressOutcome::Compressed { summary, insight_id, .. } = compressor.compress_at(14, today()).unwrap() else {
            panic!("expected compression");
        };
        assert_eq!(summary.source_refs, vec!["reflection_2026-09-18", "reflection_2026-09-28"]);

        let prompt = &fx.cognition.calls()[0].0;
        let older = prompt.find("30 days ago").unwrap();
        let newer = prompt.find("20 days ago").unwrap();
        assert!(older < newer);

        let insight = fx.ctx.insights.get(&insight_id).unwrap().unwrap();
        assert_eq!(insight.topic, LONG_TERM_SUMMARY_TOPIC);
        assert_eq!(insight.tags, vec!["compressed", "summary"]);
        assert_eq!(insight.answer, "Long-term themes.");
    }

    #[test]
    fn test_summary_failure_archives_nothing() {
        let fx = fixture(FakeCognition::new().fail_on("Summarize the following"));
        reflection(&fx.ctx, 20);
        let compressor = MemoryCompressor::new(fx.ctx.clone());

        assert!(compressor.compress_at(14, today()).is_err());
        let states: Vec<_> = fx.ctx.reflections.list().unwrap().iter().map(|r| r.state).collect();
        assert_eq!(states, vec![ArchiveState::Active]);
        assert!(fx.ctx.compressed.list().unwrap().is_empty());
    }
}
