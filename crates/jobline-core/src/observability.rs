use serde::{Deserialize, Serialize};

use crate::queue::QueueState;

/// Point-in-time view of a queue, for logs and status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub name: String,
    pub state: QueueState,
    /// Pending jobs; the one in flight is not counted.
    pub pending: usize,
    /// Observers whose token is still alive.
    pub observers: usize,
}
