//! The open-question queue: one `- question` bullet per line.
//!
//! Identity is the normalized text (whitespace-collapsed, lowercased), so
//! `"Why X?"` and `"why  x?"` are the same question. Every mutation reloads,
//! edits and atomically rewrites the whole file under the queue lock.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::insights::types::normalize_text;

pub struct QuestionQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl QuestionQueue {
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
            .map_err(|e| anyhow::anyhow!("question queue lock poisoned: {e}"))
    }

    /// Pending questions in insertion order.
    pub fn load_open(&self) -> Result<Vec<String>> {
        let _guard = self.guard()?;
        self.read_unlocked()
    }

    /// A uniformly random pending question, without removing it.
    pub fn select_one(&self) -> Result<Option<String>> {
        self.select_one_with(&mut rand::thread_rng())
    }

    pub fn select_one_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<String>> {
        let open = self.load_open()?;
        Ok(open.choose(rng).cloned())
    }

    /// Remove the question matching `text` (normalized). Returns whether one was removed.
    pub fn remove(&self, text: &str) -> Result<bool> {
        let _guard = self.guard()?;
        let key = normalize_text(text);
        let mut open = self.read_unlocked()?;
        let before = open.len();
        open.retain(|q| normalize_text(q) != key);

        if open.len() == before {
            return Ok(false);
        }
        self.write_unlocked(&open)?;
        tracing::debug!(remaining = open.len(), "open question removed");
        Ok(true)
    }

    /// Append questions not already pending. Returns how many were added.
    pub fn append<I, S>(&self, questions: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.guard()?;
        let mut open = self.read_unlocked()?;
        let mut seen: HashSet<String> = open.iter().map(|q| normalize_text(q)).collect();

        let mut added = 0;
        for q in questions {
            let q = clean_question(q.as_ref());
            if q.is_empty() {
                continue;
            }
            if seen.insert(normalize_text(&q)) {
                open.push(q);
                added += 1;
            }
        }

        if added > 0 {
            self.write_unlocked(&open)?;
        }
        tracing::debug!(added, total = open.len(), "open questions appended");
        Ok(added)
    }

    fn read_unlocked(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        // Collapse any duplicates left by older writers.
        let mut seen = HashSet::new();
        Ok(contents
            .lines()
            .map(clean_question)
            .filter(|q| !q.is_empty())
            .filter(|q| seen.insert(normalize_text(q)))
            .collect())
    }

    fn write_unlocked(&self, questions: &[String]) -> Result<()> {
        let body: String = questions.iter().map(|q| format!("- {q}\n")).collect();
        super::atomic::write_atomic(&self.path, &body)
    }
}

/// Strip bullet markers and surrounding whitespace; newlines become spaces.
fn clean_question(line: &str) -> String {
    let trimmed = line.trim();
    let trimmed = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
