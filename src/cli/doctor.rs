//! CLI `doctor` command: database diagnostics and artifact counts.

use anyhow::{Context, Result};

use crate::artifacts::ArchiveState;
use crate::brain::Brain;
use crate::config::PonderConfig;
use crate::db;

pub fn doctor(config: PonderConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `ponder reflect` or `ponder ingest <dir>` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let brain = Brain::open_offline(config).context("failed to open database (may be corrupt)")?;
    let conn = brain
        .db()
        .lock()
        .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;
    drop(conn);

    let reflections = brain.reflections().list()?;
    let archived = reflections
        .iter()
        .filter(|r| r.state == ArchiveState::Archived)
        .count();

    println!("Ponder Health Report");
    println!("====================");
    println!();
    println!("Data directory:    {}", brain.config().data_dir().display());
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Cognition:         {} ({})", brain.config().cognition.model, brain.config().cognition.base_url);
    println!();
    println!("Row counts:");
    println!("  Insights:        {}", report.insight_count);
    println!("  Memory docs:     {}", report.document_count);
    println!("  Workflow runs:   {}", report.run_count);
    println!();
    println!("Artifacts:");
    println!("  Reflections:     {} active, {archived} archived", reflections.len() - archived);
    println!("  Open questions:  {}", brain.questions().load_open()?.len());
    println!("  Score rows:      {}", brain.scores().records()?.len());
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery: restore {} from a backup.", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
