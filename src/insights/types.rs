//! Insight record and its deterministic identity.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Topic used for compressed long-term summaries.
pub const LONG_TERM_SUMMARY_TOPIC: &str = "long_term_summary";

/// A timestamped question/answer/topic record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Hex SHA-256 of `(source, normalized question)`.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub question: String,
    pub answer: String,
    /// Unique tags in first-seen order.
    pub tags: Vec<String>,
    /// Producer tag, e.g. `reflection:2026-10-18` or `research:2026-10-18`.
    pub source: String,
}

impl Insight {
    pub fn new(
        source: impl Into<String>,
        topic: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        tags: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let source = source.into();
        let question = question.into();
        Self {
            id: insight_id(&source, &question),
            timestamp: Utc::now(),
            topic: topic.into().trim().to_string(),
            question,
            answer: answer.into(),
            tags: normalize_tags(tags),
            source,
        }
    }

    /// Override the timestamp (used when replaying or backfilling).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Fixed-width RFC 3339 so lexical order equals chronological order.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn tags_joined(&self) -> String {
        self.tags.join(",")
    }
}

/// Deterministic, collision-resistant id for `(source, content)`.
///
/// Content is whitespace-collapsed and lowercased before hashing so cosmetic
/// differences do not defeat de-duplication. A unit separator keeps
/// `("ab", "c")` distinct from `("a", "bc")`.
pub fn insight_id(source: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize_text(content).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Collapse runs of whitespace to one space, trim, and lowercase.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim, drop empties and commas (the storage delimiter), and de-duplicate
/// case-insensitively while keeping first-seen order.
pub fn normalize_tags(tags: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let clean = tag.as_ref().replace(',', " ");
        let clean = clean.trim();
        if clean.is_empty() {
            continue;
        }
        if seen.insert(clean.to_lowercase()) {
            out.push(clean.to_string());
        }
    }
    out
}

/// Split a comma-joined tag column back into tags.
pub fn split_tags(joined: &str) -> Vec<String> {
    normalize_tags(joined.split(','))
}
