//! Lifecycle of one processing run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an [`ImageProcessor`](super::ImageProcessor) is in its run.
///
/// ```text
/// Idle -> Hashing -> Filtering -> Filtered -> Updating -> Done
///                                    |
///                                    +-> AwaitingReview -> Reviewed -> Updating -> Done
/// any phase -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessState {
    #[default]
    Idle,
    Hashing,
    Filtering,
    /// Hashes reconciled; ready for the direct update
    Filtered,
    /// Duplicates sit in the review folder waiting on the user
    AwaitingReview,
    /// Keepers restored; only renames remain
    Reviewed,
    Updating,
    Done,
    Failed,
}

impl ProcessState {
    /// States from which the update phase may start
    pub fn can_update(self) -> bool {
        matches!(self, ProcessState::Filtered | ProcessState::Reviewed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Idle => "idle",
            ProcessState::Hashing => "hashing",
            ProcessState::Filtering => "filtering",
            ProcessState::Filtered => "filtered",
            ProcessState::AwaitingReview => "awaiting review",
            ProcessState::Reviewed => "reviewed",
            ProcessState::Updating => "updating",
            ProcessState::Done => "done",
            ProcessState::Failed => "failed",
        };
        f.write_str(name)
    }
}
