//! Durable, append-only log of produced insights.
//!
//! Every insight has a content-addressed id (see [`types::insight_id`]) so
//! re-ingesting the same logical content is rejected with
//! [`InsightError::Duplicate`] instead of creating a second row.

pub mod store;
pub mod types;

pub use store::InsightStore;
pub use types::Insight;

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("insight {0} already recorded")]
    Duplicate(String),

    #[error("insight store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}
