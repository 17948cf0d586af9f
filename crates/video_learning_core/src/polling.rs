//! crates/video_learning_core/src/polling.rs
//!
//! Decides what a single processing-status poll tick should do.

use crate::domain::{ProcessingStatus, StatusReport};

/// Fixed delay between status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDecision {
    /// Re-fetch the flashcard list on this tick.
    pub refresh_flashcards: bool,
    /// The status is terminal; no further ticks are needed.
    pub stop: bool,
}

impl PollDecision {
    /// Compares the freshly fetched report against the previously known status.
    pub fn evaluate(previous: Option<&ProcessingStatus>, report: &StatusReport) -> Self {
        let just_completed = report.status == ProcessingStatus::Completed
            && previous.map_or(true, |p| *p != ProcessingStatus::Completed);

        Self {
            refresh_flashcards: report.is_batch_active() || just_completed,
            stop: report.status.is_terminal(),
        }
    }
}
