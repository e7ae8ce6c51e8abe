//! Memory collaborator: semantic retrieval and indexing of produced text.
//!
//! The core only needs two operations: [`Memory::query`] to assemble context
//! for a prompt and [`Memory::add`] to index new insights for later recall.
//! [`local::LocalMemory`] is the built-in SQLite FTS5 implementation.

pub mod local;

use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::config::MemoryConfig;

pub trait Memory: Send + Sync {
    /// Up to `top_k` stored documents relevant to `text`, best match first.
    fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>>;

    /// Index `document` under `id`. Re-adding an id replaces the document.
    fn add(&self, document: &str, metadata: &serde_json::Value, id: &str) -> Result<()>;
}

/// Create the configured memory backend on top of the shared database.
pub fn create_memory(
    config: &MemoryConfig,
    db: Arc<Mutex<rusqlite::Connection>>,
) -> Result<Box<dyn Memory>> {
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalMemory::new(db))),
        other => anyhow::bail!("unknown memory provider: {other}. Supported: local"),
    }
}
