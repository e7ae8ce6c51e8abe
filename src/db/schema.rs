//! SQL DDL for all ponder tables.
//!
//! Defines the `insights` log, the `memory_documents` store with its
//! `memory_fts` (FTS5) index, and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Durable insight log (append-only; id is content-addressed)
CREATE TABLE IF NOT EXISTS insights (
    id TEXT PRIMARY KEY,
    date TEXT NOT NULL,
    topic TEXT NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_insights_date ON insights(date);
CREATE INDEX IF NOT EXISTS idx_insights_topic ON insights(topic);

-- Local retrieval store backing the Memory collaborator
CREATE TABLE IF NOT EXISTS memory_documents (
    id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL
);

-- Full-text search (BM25) over memory documents
CREATE VIRTUAL TABLE IF NOT EXISTS memory_fts USING fts5(
    document,
    id UNINDEXED
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"insights".to_string()));
        assert!(tables.contains(&"memory_documents".to_string()));
        assert!(tables.contains(&"memory_fts".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }
}
