//! Daily reflection artifacts.
//!
//! One markdown file per calendar day, `reflection_YYYY-MM-DD.md`, with the
//! sections `Revisited Question`, `Summary` and `New Questions`. Archiving
//! renames the file to `archived_reflection_YYYY-MM-DD.md`; files are never
//! deleted and never renamed back.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const PREFIX: &str = "reflection_";
const ARCHIVED_PREFIX: &str = "archived_";
const EXTENSION: &str = ".md";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionRecord {
    pub date: NaiveDate,
    pub revisited_question: Option<String>,
    pub revisited_answer: Option<String>,
    pub summary: String,
    pub new_questions: Vec<String>,
}

/// Identifier shared by the active and archived file of one day.
pub fn reflection_id(date: NaiveDate) -> String {
    format!("{PREFIX}{}", date.format(DATE_FORMAT))
}

impl ReflectionRecord {
    pub fn id(&self) -> String {
        reflection_id(self.date)
    }

    pub fn to_markdown(&self) -> String {
        let date = self.date.format(DATE_FORMAT);
        let mut out = format!("# Reflection — {date}\n\n");
        if let (Some(q), Some(a)) = (&self.revisited_question, &self.revisited_answer) {
            out.push_str("## Revisited Question\n");
            out.push_str(&format!("**{q}**\n\n{a}\n\n"));
        }
        out.push_str("## Summary\n");
        out.push_str(self.summary.trim());
        out.push_str("\n\n## New Questions\n");
        for q in &self.new_questions {
            out.push_str(&format!("- {q}\n"));
        }
        out
    }

    /// Parse a reflection file body. Unknown sections are ignored.
    pub fn parse(date: NaiveDate, text: &str) -> Self {
        let mut section = "";
        let mut revisited = Vec::new();
        let mut summary = Vec::new();
        let mut questions = Vec::new();

        for line in text.lines() {
            if let Some(heading) = line.strip_prefix("## ") {
                section = match heading.trim() {
                    "Revisited Question" => "revisited",
                    "Summary" => "summary",
                    "New Questions" => "questions",
                    _ => "",
                };
                continue;
            }
            match section {
                "revisited" => revisited.push(line),
                "summary" => summary.push(line),
                "questions" => {
                    if let Some(q) = line.trim().strip_prefix("- ") {
                        if !q.trim().is_empty() {
                            questions.push(q.trim().to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        let (revisited_question, revisited_answer) = split_revisited(&revisited);

        Self {
            date,
            revisited_question,
            revisited_answer,
            summary: summary.join("\n").trim().to_string(),
            new_questions: questions,
        }
    }
}

/// `**question**` on the first non-empty line, the answer after it.
fn split_revisited(lines: &[&str]) -> (Option<String>, Option<String>) {
    let mut iter = lines.iter().skip_while(|l| l.trim().is_empty());
    let question = match iter.next() {
        Some(first) => first
            .trim()
            .trim_start_matches("**")
            .trim_end_matches("**")
            .trim()
            .to_string(),
        None => return (None, None),
    };
    let answer = iter.copied().collect::<Vec<_>>().join("\n").trim().to_string();
    if question.is_empty() {
        return (None, None);
    }
    (Some(question), (!answer.is_empty()).then_some(answer))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Active,
    Archived,
}

/// A reflection file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReflection {
    pub id: String,
    pub date: NaiveDate,
    pub state: ArchiveState,
    pub path: PathBuf,
}

/// Parse `reflection_YYYY-MM-DD.md` / `archived_reflection_YYYY-MM-DD.md`.
fn parse_file_name(name: &str) -> Option<(NaiveDate, ArchiveState)> {
    let (rest, state) = match name.strip_prefix(ARCHIVED_PREFIX) {
        Some(rest) => (rest, ArchiveState::Archived),
        None => (name, ArchiveState::Active),
    };
    let date_str = rest.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    NaiveDate::parse_from_str(date_str, DATE_FORMAT)
        .ok()
        .map(|d| (d, state))
}

/// The reflections directory. All mutations hold an internal lock so that
/// the reflect and compress stages of different jobs never interleave.
pub struct ReflectionArchive {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ReflectionArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| anyhow::anyhow!("reflection archive lock poisoned: {e}"))
    }

    fn active_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}{EXTENSION}", reflection_id(date)))
    }

    fn archived_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{ARCHIVED_PREFIX}{}{EXTENSION}", reflection_id(date)))
    }

    /// Write (or overwrite) the active reflection for `record.date`.
    ///
    /// Refuses if that day is already archived: archival is one-way.
    pub fn write(&self, record: &ReflectionRecord) -> Result<PathBuf> {
        let _guard = self.guard()?;
        if self.archived_path(record.date).exists() {
            bail!(
                "reflection for {} is already archived",
                record.date.format(DATE_FORMAT)
            );
        }
        let path = self.active_path(record.date);
        super::atomic::write_atomic(&path, &record.to_markdown())?;
        Ok(path)
    }

    /// All reflection files, oldest first. Files with unparseable names are skipped.
    pub fn list(&self) -> Result<Vec<StoredReflection>> {
        let mut found = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(EXTENSION) || !name.contains(PREFIX) {
                continue;
            }
            match parse_file_name(&name) {
                Some((date, state)) => found.push(StoredReflection {
                    id: reflection_id(date),
                    date,
                    state,
                    path: entry.path(),
                }),
                None => tracing::warn!(file = %name, "skipping reflection with unparseable date"),
            }
        }

        found.sort_by(|a, b| a.date.cmp(&b.date).then(a.path.cmp(&b.path)));
        Ok(found)
    }

    pub fn active(&self) -> Result<Vec<StoredReflection>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.state == ArchiveState::Active)
            .collect())
    }

    /// Active reflections dated strictly before `cutoff`, oldest first.
    pub fn active_before(&self, cutoff: NaiveDate) -> Result<Vec<StoredReflection>> {
        Ok(self
            .active()?
            .into_iter()
            .filter(|r| r.date < cutoff)
            .collect())
    }

    pub fn find(&self, date: NaiveDate) -> Result<Option<StoredReflection>> {
        Ok(self.list()?.into_iter().find(|r| r.date == date))
    }

    pub fn read(&self, stored: &StoredReflection) -> Result<String> {
        std::fs::read_to_string(&stored.path)
            .with_context(|| format!("failed to read {}", stored.path.display()))
    }

    pub fn load(&self, stored: &StoredReflection) -> Result<ReflectionRecord> {
        Ok(ReflectionRecord::parse(stored.date, &self.read(stored)?))
    }

    /// Archive `sources` as one unit with the output written by `write_summary`.
    ///
    /// Under the archive lock: every source must still be active (otherwise
    /// `Ok(None)` and nothing happens), then `write_summary` runs, then each
    /// source is renamed. If the summary write fails nothing is archived; if a
    /// rename fails the renames already done are reverted and the summary is
    /// removed before the error is returned.
    pub fn archive_with<F>(&self, sources: &[StoredReflection], write_summary: F) -> Result<Option<PathBuf>>
    where
        F: FnOnce() -> Result<PathBuf>,
    {
        let _guard = self.guard()?;

        if let Some(gone) = sources.iter().find(|s| !s.path.exists()) {
            tracing::info!(reflection = %gone.id, "source no longer active, skipping archive");
            return Ok(None);
        }

        let summary_path = write_summary().context("summary write failed, nothing archived")?;

        let mut renamed: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(sources.len());
        for source in sources {
            let target = self.archived_path(source.date);
            if let Err(e) = std::fs::rename(&source.path, &target) {
                for (from, to) in renamed.iter().rev() {
                    if let Err(revert) = std::fs::rename(to, from) {
                        tracing::error!(file = %to.display(), error = %revert, "failed to revert archive rename");
                    }
                }
                if let Err(rm) = std::fs::remove_file(&summary_path) {
                    tracing::error!(file = %summary_path.display(), error = %rm, "failed to remove orphaned summary");
                }
                return Err(e).with_context(|| format!("failed to archive {}", source.path.display()));
            }
            renamed.push((source.path.clone(), target));
        }

        Ok(Some(summary_path))
    }
}
