//! SQLite-backed [`InsightStore`].
//!
//! Each call takes the shared connection lock, runs one statement and
//! returns only after SQLite has committed it. There is no cache.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use super::types::{split_tags, Insight};
use super::InsightError;

type Result<T> = std::result::Result<T, InsightError>;

#[derive(Clone)]
pub struct InsightStore {
    db: Arc<Mutex<Connection>>,
}

impl InsightStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Insert a new insight. Fails with [`InsightError::Duplicate`] if the id exists.
    pub fn add(&self, insight: &Insight) -> Result<()> {
        let conn = self.db.lock().map_err(|_| InsightError::Poisoned)?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO insights (id, date, topic, question, answer, tags, source) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                insight.id,
                insight.timestamp_string(),
                insight.topic,
                insight.question,
                insight.answer,
                insight.tags_joined(),
                insight.source,
            ],
        )?;

        if inserted == 0 {
            return Err(InsightError::Duplicate(insight.id.clone()));
        }

        tracing::debug!(id = %insight.id, topic = %insight.topic, "insight recorded");
        Ok(())
    }

    /// Insert, treating an already-recorded id as success. Returns whether a row was written.
    pub fn add_idempotent(&self, insight: &Insight) -> Result<bool> {
        match self.add(insight) {
            Ok(()) => Ok(true),
            Err(InsightError::Duplicate(id)) => {
                tracing::debug!(id = %id, "insight already recorded, skipping");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Insight>> {
        let conn = self.db.lock().map_err(|_| InsightError::Poisoned)?;
        let insight = conn
            .query_row(
                "SELECT id, date, topic, question, answer, tags, source FROM insights WHERE id = ?1",
                params![id],
                row_to_insight,
            )
            .optional()?;
        Ok(insight)
    }

    /// Insights whose topic contains `substring` (case-insensitive), most recent first.
    ///
    /// Folding happens in Rust: SQLite's `lower()` only folds ASCII.
    pub fn query_by_topic(&self, substring: &str) -> Result<Vec<Insight>> {
        let needle = substring.to_lowercase();
        let conn = self.db.lock().map_err(|_| InsightError::Poisoned)?;

        let mut stmt = conn.prepare(
            "SELECT id, date, topic, question, answer, tags, source FROM insights \
             ORDER BY date DESC, rowid DESC",
        )?;
        let mut found = Vec::new();
        for row in stmt.query_map([], row_to_insight)? {
            let insight = row?;
            if insight.topic.to_lowercase().contains(&needle) {
                found.push(insight);
            }
        }
        Ok(found)
    }

    /// Distinct topic values.
    pub fn list_topics(&self) -> Result<BTreeSet<String>> {
        let conn = self.db.lock().map_err(|_| InsightError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT DISTINCT topic FROM insights")?;
        let topics = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;
        Ok(topics)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.db.lock().map_err(|_| InsightError::Poisoned)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM insights", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn row_to_insight(row: &rusqlite::Row<'_>) -> rusqlite::Result<Insight> {
    let date: String = row.get(1)?;
    let timestamp = DateTime::parse_from_rfc3339(&date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let tags: String = row.get(5)?;
    Ok(Insight {
        id: row.get(0)?,
        timestamp,
        topic: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        tags: split_tags(&tags),
        source: row.get(6)?,
    })
}
