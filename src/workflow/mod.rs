//! The cognition state machine.
//!
//! ```text
//! Reflect ──► DecideNext ──(quality < threshold or no history)──► Research ──► Compress ──► Done
//!                  └─────────────────(otherwise)──────────────────────────────────┘
//! ```
//!
//! Every edge is listed once in [`TRANSITIONS`]; the engine never invents one.

pub mod engine;
pub mod journal;

pub use engine::{WorkflowEngine, WorkflowOptions, WorkflowReport};
pub use journal::{RunJournal, RunRecord, RunStatus};

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reflect,
    DecideNext,
    Research,
    Compress,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Reflect => "reflect",
            Stage::DecideNext => "decide_next",
            Stage::Research => "research",
            Stage::Compress => "compress",
            Stage::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        [
            Stage::Reflect,
            Stage::DecideNext,
            Stage::Research,
            Stage::Compress,
            Stage::Done,
        ]
        .into_iter()
        .find(|stage| stage.as_str() == s)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Branch taken at [`Stage::DecideNext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Research,
    Compress,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Research => "research",
            Route::Compress => "compress",
        }
    }
}

/// `(from, required route, to)`. A `None` route is an unconditional edge.
pub const TRANSITIONS: &[(Stage, Option<Route>, Stage)] = &[
    (Stage::Reflect, None, Stage::DecideNext),
    (Stage::DecideNext, Some(Route::Research), Stage::Research),
    (Stage::DecideNext, Some(Route::Compress), Stage::Compress),
    (Stage::Research, None, Stage::Compress),
    (Stage::Compress, None, Stage::Done),
];

/// The stage after `from`. `route` is only consulted on conditional edges.
pub fn next_stage(from: Stage, route: Option<Route>) -> Option<Stage> {
    TRANSITIONS
        .iter()
        .find(|(stage, required, _)| *stage == from && (required.is_none() || *required == route))
        .map(|(_, _, to)| *to)
}

/// Route on the rolling quality average. No history means research first.
pub fn decide(average: Option<f64>, threshold: f64) -> Route {
    match average {
        Some(quality) if quality >= threshold => Route::Compress,
        _ => Route::Research,
    }
}

pub(crate) fn describe(stage: &Option<Stage>) -> &'static str {
    stage.map(Stage::as_str).unwrap_or("nothing")
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A collaborator or store call failed; durable state stops at `last_completed`.
    #[error("{stage} stage failed after {}: {source}", describe(.last_completed))]
    Stage {
        stage: Stage,
        last_completed: Option<Stage>,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("workflow cancelled after {}", describe(.last_completed))]
    Cancelled { last_completed: Option<Stage> },
}

impl WorkflowError {
    pub fn last_completed(&self) -> Option<Stage> {
        match self {
            WorkflowError::Stage { last_completed, .. } | WorkflowError::Cancelled { last_completed } => {
                *last_completed
            }
        }
    }
}
