//! File-backed artifacts: reflections, compressed summaries, the open-question
//! queue, and the self-evaluation score log.
//!
//! Formats are plain markdown / delimited text so they stay readable and
//! editable by hand. Every rewrite goes through [`atomic::write_atomic`].

pub mod atomic;
pub mod compressed;
pub mod questions;
pub mod reflection;
pub mod scores;

pub use compressed::{CompressedStore, CompressedSummary};
pub use questions::QuestionQueue;
pub use reflection::{ArchiveState, ReflectionArchive, ReflectionRecord, StoredReflection};
pub use scores::{parse_evaluation, Evaluation, MalformedScore, ScoreLog, ScoreRecord, ScoreSummary};
