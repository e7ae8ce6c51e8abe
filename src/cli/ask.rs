use anyhow::{ensure, Result};
use std::path::Path;

use super::spinner;
use crate::brain::Brain;
use crate::config::PonderConfig;

/// Ask the second brain a question, with memory context.
pub fn ask(config: PonderConfig, query: &str) -> Result<()> {
    let brain = Brain::open(config)?;
    println!("You: {query}");
    let pb = spinner("Thinking");
    let answer = brain.ask(query);
    pb.finish_and_clear();
    println!("Ponder: {}", answer?.trim());
    Ok(())
}

/// Suggest three learning areas from the self-evaluation log.
pub fn focus(config: PonderConfig) -> Result<()> {
    let brain = Brain::open(config)?;
    let pb = spinner("Thinking");
    let suggestion = brain.focus();
    pb.finish_and_clear();
    println!("{}", suggestion?.trim());
    Ok(())
}

/// Index notes from a directory into memory.
pub fn ingest(config: PonderConfig, dir: &Path) -> Result<()> {
    ensure!(dir.is_dir(), "{} is not a directory", dir.display());
    let brain = Brain::open_offline(config)?;
    let indexed = brain.ingest_notes(dir)?;
    println!("Ingested {indexed} note(s) from {}.", dir.display());
    Ok(())
}
