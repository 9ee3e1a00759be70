//! Shared status model for job instances and work chunks.

use serde::{Deserialize, Serialize};

/// Lifecycle status.
///
/// Instances move `Queued → InProgress → {Completed | Cancelled}`; chunks move
/// `Queued → InProgress → {Completed | Errored | Failed}`. `Errored` chunks are
/// recoverable for bookkeeping purposes; `Failed` means the worker violated its
/// execution contract and is never retried automatically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Queued,
    InProgress,
    Completed,
    Errored,
    Failed,
    Cancelled,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Errored | Status::Failed | Status::Cancelled
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Status::Cancelled)
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Status::Queued => "QUEUED",
            Status::InProgress => "IN_PROGRESS",
            Status::Completed => "COMPLETED",
            Status::Errored => "ERRORED",
            Status::Failed => "FAILED",
            Status::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}
