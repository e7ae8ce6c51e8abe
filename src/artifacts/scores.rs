//! Self-evaluation score log.
//!
//! One comma-delimited row per evaluated reflection:
//!
//! ```text
//! timestamp,reflection_ref,clarity,novelty,actionability,redundancy,topics,suggestions
//! ```
//!
//! `topics` never contains a comma (they are rewritten to `;`) so the row
//! splits into at most eight fields and `suggestions` keeps any commas it has.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SCORE_FIELDS: [&str; 4] = ["clarity", "novelty", "actionability", "redundancy"];

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub timestamp: NaiveDateTime,
    pub reflection_ref: String,
    pub clarity: f64,
    pub novelty: f64,
    pub actionability: f64,
    /// Lower is better.
    pub redundancy: f64,
    pub topics: String,
    pub suggestions: String,
}

/// Why an evaluation response or a log row was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedScore {
    #[error("expected at least {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("{field} is not a score between 1 and 10: {value:?}")]
    BadScore { field: &'static str, value: String },

    #[error("bad timestamp {0:?}")]
    BadTimestamp(String),
}

/// The six fields a scoring response carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub clarity: f64,
    pub novelty: f64,
    pub actionability: f64,
    pub redundancy: f64,
    pub topics: String,
    pub suggestions: String,
}

impl ScoreRecord {
    pub fn new(reflection_ref: impl Into<String>, evaluation: Evaluation) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            reflection_ref: reflection_ref.into(),
            clarity: evaluation.clarity,
            novelty: evaluation.novelty,
            actionability: evaluation.actionability,
            redundancy: evaluation.redundancy,
            topics: evaluation.topics,
            suggestions: evaluation.suggestions,
        }
    }

    /// Composite on the 1-10 scale with redundancy inverted.
    pub fn quality(&self) -> f64 {
        (self.clarity + self.novelty + self.actionability + (11.0 - self.redundancy)) / 4.0
    }

    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            single_line(&self.reflection_ref).replace(',', ";"),
            self.clarity,
            self.novelty,
            self.actionability,
            self.redundancy,
            single_line(&self.topics).replace(',', ";"),
            single_line(&self.suggestions),
        )
    }

    pub fn parse_row(line: &str) -> std::result::Result<Self, MalformedScore> {
        let fields: Vec<&str> = line.trim().splitn(8, ',').collect();
        if fields.len() < 6 {
            return Err(MalformedScore::FieldCount {
                expected: 6,
                found: fields.len(),
            });
        }
        let timestamp = NaiveDateTime::parse_from_str(fields[0].trim(), TIMESTAMP_FORMAT)
            .map_err(|_| MalformedScore::BadTimestamp(fields[0].to_string()))?;
        let [clarity, novelty, actionability, redundancy] = parse_scores(&fields[2..6])?;

        Ok(Self {
            timestamp,
            reflection_ref: fields[1].trim().to_string(),
            clarity,
            novelty,
            actionability,
            redundancy,
            topics: fields.get(6).map(|s| s.trim().to_string()).unwrap_or_default(),
            suggestions: fields.get(7).map(|s| s.trim().to_string()).unwrap_or_default(),
        })
    }
}

/// Find the `clarity,novelty,actionability,redundancy,topics,suggestions`
/// line in a model response.
///
/// Lines with fewer than six fields and a column-name header are skipped.
/// The first line that parses wins; if none does, the first bad score is
/// reported, else the field count.
pub fn parse_evaluation(response: &str) -> std::result::Result<Evaluation, MalformedScore> {
    let mut widest = 0;
    let mut first_bad = None;

    for line in response.lines() {
        let line = line.trim().trim_matches('`').trim_start_matches("- ").trim();
        let fields: Vec<&str> = line.splitn(6, ',').map(str::trim).collect();
        widest = widest.max(fields.len());
        if fields.len() < 6 {
            continue;
        }
        if fields[0].eq_ignore_ascii_case("clarity") {
            continue;
        }

        let [clarity, novelty, actionability, redundancy] = match parse_scores(&fields[..4]) {
            Ok(scores) => scores,
            Err(e) => {
                first_bad.get_or_insert(e);
                continue;
            }
        };
        return Ok(Evaluation {
            clarity,
            novelty,
            actionability,
            redundancy,
            topics: fields[4].to_string(),
            suggestions: fields[5].to_string(),
        });
    }

    Err(first_bad.unwrap_or(MalformedScore::FieldCount {
        expected: 6,
        found: widest,
    }))
}

fn parse_scores(fields: &[&str]) -> std::result::Result<[f64; 4], MalformedScore> {
    let mut out = [0.0; 4];
    for (i, (raw, name)) in fields.iter().zip(SCORE_FIELDS).enumerate() {
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| (1.0..=10.0).contains(v))
            .ok_or_else(|| MalformedScore::BadScore {
                field: name,
                value: raw.trim().to_string(),
            })?;
        out[i] = value;
    }
    Ok(out)
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Per-metric means over a set of score records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub count: usize,
    pub clarity: f64,
    pub novelty: f64,
    pub actionability: f64,
    pub redundancy: f64,
    /// Same composite as [`ScoreRecord::quality`], over the means.
    pub quality: f64,
}

impl ScoreSummary {
    /// `None` when there is nothing to average.
    pub fn from_records(records: &[ScoreRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        let n = records.len() as f64;
        let mean = |f: fn(&ScoreRecord) -> f64| records.iter().map(f).sum::<f64>() / n;

        let clarity = mean(|r| r.clarity);
        let novelty = mean(|r| r.novelty);
        let actionability = mean(|r| r.actionability);
        let redundancy = mean(|r| r.redundancy);
        Some(Self {
            count: records.len(),
            clarity,
            novelty,
            actionability,
            redundancy,
            quality: (clarity + novelty + actionability + (11.0 - redundancy)) / 4.0,
        })
    }
}

/// The append-only score log file.
pub struct ScoreLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScoreLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| anyhow::anyhow!("score log lock poisoned: {e}"))
    }

    fn read_raw(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Append one row. The whole log is rewritten through a temp file.
    pub fn append(&self, record: &ScoreRecord) -> Result<()> {
        let _guard = self.guard()?;
        let mut contents = self.read_raw()?;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(&record.to_row());
        contents.push('\n');
        super::atomic::write_atomic(&self.path, &contents)?;
        tracing::debug!(reflection = %record.reflection_ref, quality = record.quality(), "score appended");
        Ok(())
    }

    /// Every valid row in file order. Malformed rows are logged and skipped.
    pub fn records(&self) -> Result<Vec<ScoreRecord>> {
        let contents = {
            let _guard = self.guard()?;
            self.read_raw()?
        };

        let mut out = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match ScoreRecord::parse_row(line) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(line = idx + 1, error = %e, "skipping malformed score row"),
            }
        }
        Ok(out)
    }

    /// Valid rows with only the latest row kept per reflection, in file order.
    pub fn effective(&self) -> Result<Vec<ScoreRecord>> {
        let mut seen = HashSet::new();
        let mut latest: Vec<ScoreRecord> = self
            .records()?
            .into_iter()
            .rev()
            .filter(|r| seen.insert(r.reflection_ref.clone()))
            .collect();
        latest.reverse();
        Ok(latest)
    }

    /// The last `n` effective records.
    pub fn recent(&self, n: usize) -> Result<Vec<ScoreRecord>> {
        let all = self.effective()?;
        let skip = all.len().saturating_sub(n);
        Ok(all.into_iter().skip(skip).collect())
    }
}
