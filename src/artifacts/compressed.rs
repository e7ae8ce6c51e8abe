//! Long-term summaries produced by memory compression.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const PREFIX: &str = "compressed_";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedSummary {
    pub date: NaiveDate,
    /// Ids of the reflections this summary replaced.
    pub source_refs: BTreeSet<String>,
    pub summary_text: String,
}

impl CompressedSummary {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Compressed Summary — {}\n\n## Sources\n", self.date.format(DATE_FORMAT));
        for id in &self.source_refs {
            out.push_str(&format!("- {id}\n"));
        }
        out.push_str("\n## Summary\n");
        out.push_str(self.summary_text.trim());
        out.push('\n');
        out
    }

    pub fn parse(date: NaiveDate, text: &str) -> Self {
        let mut section = "";
        let mut source_refs = BTreeSet::new();
        let mut summary = Vec::new();

        for line in text.lines() {
            match line.strip_prefix("## ").map(str::trim) {
                Some("Sources") => section = "sources",
                Some("Summary") => section = "summary",
                Some(_) => section = "",
                None => match section {
                    "sources" => {
                        if let Some(id) = line.trim().strip_prefix("- ") {
                            source_refs.insert(id.trim().to_string());
                        }
                    }
                    "summary" => summary.push(line),
                    _ => {}
                },
            }
        }

        Self {
            date,
            source_refs,
            summary_text: summary.join("\n").trim().to_string(),
        }
    }
}

/// `compressed_YYYY-MM-DD.md`, or `compressed_YYYY-MM-DD-N.md` for later
/// summaries on the same day.
fn parse_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(".md")?;
    let date_part = stem.get(..10)?;
    let rest = &stem[10..];
    if !rest.is_empty() && !(rest.starts_with('-') && rest[1..].parse::<u32>().is_ok()) {
        return None;
    }
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

pub struct CompressedStore {
    dir: PathBuf,
}

impl CompressedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free file name for `date`; earlier summaries are never overwritten.
    fn unique_path(&self, date: NaiveDate) -> PathBuf {
        let base = format!("{PREFIX}{}", date.format(DATE_FORMAT));
        let first = self.dir.join(format!("{base}.md"));
        if !first.exists() {
            return first;
        }
        (2..)
            .map(|n| self.dir.join(format!("{base}-{n}.md")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }

    pub fn write(&self, summary: &CompressedSummary) -> Result<PathBuf> {
        let path = self.unique_path(summary.date);
        super::atomic::write_atomic(&path, &summary.to_markdown())?;
        tracing::debug!(file = %path.display(), sources = summary.source_refs.len(), "compressed summary written");
        Ok(path)
    }

    /// All summaries, oldest first.
    pub fn list(&self) -> Result<Vec<(PathBuf, CompressedSummary)>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(PREFIX) {
                continue;
            }
            let Some(date) = parse_file_name(&name) else {
                tracing::warn!(file = %name, "skipping compressed summary with unparseable name");
                continue;
            };
            let text = std::fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            out.push((entry.path(), CompressedSummary::parse(date, &text)));
        }
        out.sort_by(|a, b| a.1.date.cmp(&b.1.date).then(a.0.cmp(&b.0)));
        Ok(out)
    }
}
