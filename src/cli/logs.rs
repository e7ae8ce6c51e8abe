//! `logs` and `log-reflect`: read back the daily log files.

use anyhow::Result;

use super::spinner;
use crate::brain::Brain;
use crate::config::PonderConfig;
use crate::logs::ActivityLog;

/// Print the latest `days` log files.
pub fn logs(config: PonderConfig, days: usize) -> Result<()> {
    let log = ActivityLog::new(config.logs_dir());
    let files = log.recent(days)?;
    if files.is_empty() {
        println!("No log files found in {}.", log.dir().display());
        return Ok(());
    }
    for file in files {
        println!("== {} ==", file.path.display());
        print!("{}", std::fs::read_to_string(&file.path)?);
    }
    Ok(())
}

/// Have the model summarize the latest `days` log files.
pub fn log_reflect(config: PonderConfig, days: usize) -> Result<()> {
    let brain = Brain::open(config)?;
    let pb = spinner("Reading logs");
    let summary = brain.log_reflect(days);
    pb.finish_and_clear();
    println!("{}", summary?.trim());
    Ok(())
}
