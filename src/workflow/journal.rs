//! `workflow_runs` table: one row per automation run.

use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use super::{Route, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> RunStatus {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            _ => RunStatus::Running,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub last_stage: Option<Stage>,
    pub route: Option<String>,
    pub error: Option<String>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone)]
pub struct RunJournal {
    db: Arc<Mutex<Connection>>,
}

impl RunJournal {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|e| anyhow!("db lock poisoned: {e}"))
    }

    /// Open a new run and return its id (UUIDv7, so ids sort by start time).
    pub fn start(&self) -> Result<String> {
        let id = uuid::Uuid::now_v7().to_string();
        self.conn()?.execute(
            "INSERT INTO workflow_runs (id, started_at, status) VALUES (?1, ?2, 'running')",
            params![id, now()],
        )?;
        Ok(id)
    }

    pub fn record_stage(&self, id: &str, stage: Stage, route: Option<Route>) -> Result<()> {
        self.conn()?.execute(
            "UPDATE workflow_runs SET last_stage = ?2, route = COALESCE(?3, route) WHERE id = ?1",
            params![id, stage.as_str(), route.map(Route::as_str)],
        )?;
        Ok(())
    }

    pub fn finish(&self, id: &str, status: RunStatus, error: Option<&str>) -> Result<()> {
        self.conn()?.execute(
            "UPDATE workflow_runs SET status = ?2, finished_at = ?3, error = ?4 WHERE id = ?1",
            params![id, status.as_str(), now(), error],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, status, last_stage, route, error \
             FROM workflow_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let status: String = row.get(3)?;
                let last_stage: Option<String> = row.get(4)?;
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    status: RunStatus::parse(&status),
                    last_stage: last_stage.as_deref().and_then(Stage::parse),
                    route: row.get(5)?,
                    error: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
