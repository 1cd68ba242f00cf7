use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::QueueJob;
use crate::ports::RetryStrategy;
use crate::queue::JobQueue;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Attempts per job id.
///
/// A job nobody has seen fail yet is on attempt 1.
#[derive(Debug, Default)]
struct AttemptLedger {
    attempts: HashMap<String, u32>,
}

impl AttemptLedger {
    fn attempts(&self, id: &str) -> u32 {
        self.attempts.get(id).copied().unwrap_or(1)
    }

    /// Record a failure. Returns the next attempt number, or `None` when the
    /// job has used up `max_attempts`.
    fn record_failure(&mut self, id: &str, max_attempts: u32) -> Option<u32> {
        let attempts = self.attempts(id);
        if attempts >= max_attempts {
            return None;
        }
        let next = attempts + 1;
        self.attempts.insert(id.to_string(), next);
        Some(next)
    }
}

/// Retry a failed job immediately, at the front of the queue, until it has
/// failed `max_attempts` times in total. Then it is dropped.
///
/// The queue keeps running. Attempts are tracked per job id for as long as
/// this strategy lives.
#[derive(Debug)]
pub struct MaxAttemptsRetry {
    max_attempts: u32,
    ledger: Mutex<AttemptLedger>,
}

impl MaxAttemptsRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ledger: Mutex::new(AttemptLedger::default()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Current attempt number for `id` (1 if it never failed).
    pub fn attempts_for(&self, id: &str) -> u32 {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).attempts(id)
    }
}

impl Default for MaxAttemptsRetry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[async_trait]
impl<J: QueueJob> RetryStrategy<J> for MaxAttemptsRetry {
    async fn on_failure(&self, job: J, queue: &JobQueue<J>) {
        let next = self
            .ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_failure(job.id(), self.max_attempts);

        match next {
            Some(attempt) => {
                debug!(queue = %queue.name(), job_id = %job.id(), attempt, "retrying job");
                queue.retry(job).await;
            }
            None => {
                info!(
                    queue = %queue.name(),
                    job_id = %job.id(),
                    max_attempts = self.max_attempts,
                    "job exhausted its attempts; dropped"
                );
            }
        }
    }
}
