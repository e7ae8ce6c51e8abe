//! Terminal commands. Each one opens what it needs, runs synchronously and
//! prints a human-readable report to stdout (logs go to stderr).

pub mod ask;
pub mod browse;
pub mod cycles;
pub mod doctor;
pub mod logs;
pub mod schedule;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner on stderr for calls that wait on the model.
pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// First `max` characters of `text` on one line, with an ellipsis if cut.
pub(crate) fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{cut}...")
}
