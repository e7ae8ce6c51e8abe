//! The cognition stages: reflect, evaluate, research, compress.
//!
//! Each stage is synchronous and blocking; it talks to the Cognition and
//! Memory collaborators and writes durable output before returning. Stages
//! share one [`StageContext`] so that every job in the process serializes on
//! the same artifact locks.

pub mod compress;
pub mod evaluate;
pub mod reflect;
pub mod research;
#[cfg(test)]
pub(crate) mod testing;

pub use compress::{CompressOutcome, MemoryCompressor};
pub use evaluate::{EvaluationReport, ReflectionScorer};
pub use reflect::{ReflectOutcome, ReflectionEngine};
pub use research::{ResearchAgent, ResearchReport};

use chrono::NaiveDate;
use std::sync::Arc;

use crate::artifacts::{CompressedStore, QuestionQueue, ReflectionArchive, ScoreLog};
use crate::cognition::Cognition;
use crate::insights::InsightStore;
use crate::memory::Memory;

/// Handles to every collaborator and artifact a stage may touch.
#[derive(Clone)]
pub struct StageContext {
    pub cognition: Arc<dyn Cognition>,
    pub memory: Arc<dyn Memory>,
    pub insights: InsightStore,
    pub reflections: Arc<ReflectionArchive>,
    pub questions: Arc<QuestionQueue>,
    pub scores: Arc<ScoreLog>,
    pub compressed: Arc<CompressedStore>,
}

/// Producer tag stored with each insight, e.g. `research:2026-10-18`.
pub fn source_tag(stage: &str, date: NaiveDate) -> String {
    format!("{stage}:{}", date.format("%Y-%m-%d"))
}

/// Strip list markers (`-`, `*`, `1.`, `2)`) from a model-produced line.
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest.trim();
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

/// Questions from a free-form list response, at most `limit`.
///
/// Intro lines ending in `:` and blank lines are dropped.
pub(crate) fn parse_question_list(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .map(|l| l.trim_matches('*').trim())
        .filter(|l| !l.is_empty() && !l.ends_with(':'))
        .map(str::to_string)
        .take(limit)
        .collect()
}

/// First non-empty line of a short classification answer, or `fallback`.
pub(crate) fn first_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .map(|l| strip_list_marker(l).trim_matches(|c: char| c == '"' || c == '*' || c == '.').trim())
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}
