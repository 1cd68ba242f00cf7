//! Queue state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a `JobQueue`.
///
/// State transitions:
/// - Starting -> Listening | Stopping | Stopped
/// - Listening -> Processing | Stopping | Stopped
/// - Processing -> Processing (next job) | Listening | Stopping
/// - Stopping -> Stopped
/// - Stopped -> Starting (via `start()`)
///
/// `Stopped` is resumable; no state is terminal while the queue is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Getting ready to process jobs.
    Starting,

    /// Started, waiting for jobs (or for a processor).
    Listening,

    /// A job is in flight to the processor.
    Processing,

    /// Will stop at the next loop boundary, after the in-flight job completes.
    Stopping,

    /// Not processing jobs.
    Stopped,
}

impl QueueState {
    /// Can `add` kick the processing loop from this state?
    pub fn is_processable(self) -> bool {
        matches!(self, QueueState::Starting | QueueState::Listening)
    }

    /// Target of `start()`, or `None` when it has no effect.
    pub fn after_start(self) -> Option<QueueState> {
        match self {
            QueueState::Stopping | QueueState::Stopped => Some(QueueState::Starting),
            _ => None,
        }
    }

    /// Target of `stop()`, or `None` when it has no effect.
    ///
    /// With nothing in flight `Listening` halts at once; `Starting` and
    /// `Processing` halt at the next loop boundary.
    pub fn after_stop(self) -> Option<QueueState> {
        match self {
            QueueState::Listening => Some(QueueState::Stopped),
            QueueState::Starting | QueueState::Processing => Some(QueueState::Stopping),
            QueueState::Stopping | QueueState::Stopped => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueState::Starting => "starting",
            QueueState::Listening => "listening",
            QueueState::Processing => "processing",
            QueueState::Stopping => "stopping",
            QueueState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
