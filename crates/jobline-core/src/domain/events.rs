//! Events - キューの中のジョブに起きたこと
//!
//! 1 回の通知につきイベントは 1 つだけ。通知には、その操作で影響を受けた
//! ジョブだけが入る（まとめたり、余分なジョブを含めたりしない）。

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle event carried by every observer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobQueueEvent {
    /// Jobs were appended by `add`.
    Added,

    /// A pending job was cancelled by id.
    Cancelled,

    /// Jobs left the pending list via `remove`, `drain`, or dequeue for processing.
    Removed,

    /// The processor reported success.
    Processed,

    /// The processor reported failure.
    FailedToProcess,
}

impl JobQueueEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            JobQueueEvent::Added => "added",
            JobQueueEvent::Cancelled => "cancelled",
            JobQueueEvent::Removed => "removed",
            JobQueueEvent::Processed => "processed",
            JobQueueEvent::FailedToProcess => "failed_to_process",
        }
    }
}

impl fmt::Display for JobQueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
