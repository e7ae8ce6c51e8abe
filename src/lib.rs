//! Ponder, an autonomous personal "second brain".
//!
//! On a schedule, Ponder reflects on what it knows, scores its own
//! reflections, researches open questions when quality drops, and folds old
//! reflections into long-term summaries. Everything it produces is kept as
//! plain files and a local SQLite database under `~/.ponder/`.
//!
//! # Cognition loop
//!
//! | Stage | Does | Writes |
//! |-------|------|--------|
//! | **Reflect** | revisits one open question, summarizes recent learning, proposes new questions | `reflections/reflection_YYYY-MM-DD.md`, insight, queue |
//! | **DecideNext** | scores today's reflection, averages the recent scores | `metrics/self_scores.csv` |
//! | **Research** | answers queued questions (when quality is below threshold) | insights, follow-up questions |
//! | **Compress** | summarizes reflections older than N days and archives them | `compressed/compressed_YYYY-MM-DD.md`, insight |
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and environment overrides
//! - [`db`]: SQLite initialization, schema, migrations, health checks
//! - [`cognition`]: language-model collaborator (Ollama) with retry
//! - [`memory`]: retrieval collaborator (SQLite FTS5)
//! - [`insights`]: content-addressed insight log
//! - [`artifacts`]: reflection, question, score and summary files
//! - [`stages`]: reflect, evaluate, research, compress
//! - [`workflow`]: the stage state machine and run journal
//! - [`scheduler`]: interval jobs with single-flight and cancellation
//! - [`brain`]: wiring and trigger entry points
//! - [`logs`]: daily log files

pub mod artifacts;
pub mod brain;
pub mod cli;
pub mod cognition;
pub mod config;
pub mod db;
pub mod insights;
pub mod logs;
pub mod memory;
pub mod scheduler;
pub mod stages;
pub mod workflow;
