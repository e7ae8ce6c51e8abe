//! SQLite-backed [`Memory`] using an FTS5 BM25 keyword index.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use super::Memory;

pub struct LocalMemory {
    db: Arc<Mutex<Connection>>,
}

impl LocalMemory {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl Memory for LocalMemory {
    fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        let conn = self
            .db
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))?;

        let escaped = escape_fts_query(text);
        let mut found = if escaped.is_empty() {
            Vec::new()
        } else {
            fts_search(&conn, &escaped, top_k)?
        };

        // Nothing matched: fall back to the most recent documents so the
        // prompt still gets some grounding.
        if found.is_empty() {
            found = recent_documents(&conn, top_k)?;
        }

        tracing::debug!(query_chars = text.len(), results = found.len(), "memory query");
        Ok(found)
    }

    fn add(&self, document: &str, metadata: &serde_json::Value, id: &str) -> Result<()> {
        let mut conn = self
            .db
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT rowid FROM memory_documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM memory_fts WHERE id = ?1", params![id])?;
            tx.execute("DELETE FROM memory_documents WHERE id = ?1", params![id])?;
        }

        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        tx.execute(
            "INSERT INTO memory_documents (id, document, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, document, metadata.to_string(), now],
        )?;
        tx.execute(
            "INSERT INTO memory_fts (document, id) VALUES (?1, ?2)",
            params![document, id],
        )?;

        tx.commit()?;
        tracing::debug!(id, replaced = existing.is_some(), "memory document indexed");
        Ok(())
    }
}

fn fts_search(conn: &Connection, escaped: &str, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT d.document FROM \
         (SELECT id, rank FROM memory_fts WHERE memory_fts MATCH ?1 ORDER BY rank LIMIT ?2) AS m \
         JOIN memory_documents d ON d.id = m.id \
         ORDER BY m.rank",
    )?;
    let results = stmt
        .query_map(params![escaped, limit as i64], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

fn recent_documents(conn: &Connection, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT document FROM memory_documents ORDER BY created_at DESC, rowid DESC LIMIT ?1",
    )?;
    let results = stmt
        .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

/// Escape free text for FTS5 MATCH syntax.
///
/// Each word is quoted so punctuation and operators (`OR`, `NEAR`, `-`) are
/// treated as literals, and words are OR-ed so partial overlap still ranks.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{word}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_memory() -> LocalMemory {
        let conn = crate::db::open_memory_database().unwrap();
        LocalMemory::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_query_ranks_matching_documents() {
        let memory = test_memory();
        let meta = serde_json::json!({"source": "test"});
        memory.add("Borrow checker rules in Rust", &meta, "a").unwrap();
        memory.add("Sourdough starter feeding schedule", &meta, "b").unwrap();

        let results = memory.query("rust borrow", 3).unwrap();
        assert_eq!(results, vec!["Borrow checker rules in Rust".to_string()]);
    }

    #[test]
    fn test_add_same_id_replaces() {
        let memory = test_memory();
        let meta = serde_json::json!({});
        memory.add("first draft about tokio", &meta, "doc").unwrap();
        memory.add("second draft about tokio", &meta, "doc").unwrap();

        let results = memory.query("tokio", 5).unwrap();
        assert_eq!(results, vec!["second draft about tokio".to_string()]);
    }

    #[test]
    fn test_no_match_falls_back_to_recent() {
        let memory = test_memory();
        let meta = serde_json::json!({});
        memory.add("alpha", &meta, "1").unwrap();
        memory.add("beta", &meta, "2").unwrap();

        let results = memory.query("zeta", 1).unwrap();
        assert_eq!(results, vec!["beta".to_string()]);
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let memory = test_memory();
        assert!(memory.query("anything", 3).unwrap().is_empty());
    }

    #[test]
    fn test_escape_fts_query() {
        assert_eq!(escape_fts_query("hello world"), "\"hello\" OR \"world\"");
        assert_eq!(escape_fts_query("say \"hi\""), "\"say\" OR \"hi\"");
        assert_eq!(escape_fts_query("  "), "");
    }
}
