use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::info;

use crate::domain::QueueJob;
use crate::ports::RetryStrategy;
use crate::queue::JobQueue;

pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_UNIT: Duration = Duration::from_secs(1);

/// Exponential delay bookkeeping.
///
/// Consecutive failures of the same job id double the delay
/// (`unit * 2^shift`, capped at `max_backoff`); a different id starts over.
#[derive(Debug)]
struct BackoffSchedule {
    unit: Duration,
    max_backoff: Duration,
    last_job_id: Option<String>,
    duration_shift: u32,
}

impl BackoffSchedule {
    fn new(unit: Duration, max_backoff: Duration) -> Self {
        Self {
            unit,
            max_backoff,
            last_job_id: None,
            duration_shift: 0,
        }
    }

    /// Delay before restarting after `id` failed.
    fn next_delay(&mut self, id: &str) -> Duration {
        if self.last_job_id.as_deref() != Some(id) {
            self.duration_shift = 0;
            self.last_job_id = Some(id.to_string());
        }

        let delay = 2u32
            .checked_pow(self.duration_shift)
            .and_then(|factor| self.unit.checked_mul(factor))
            .map_or(self.max_backoff, |d| d.min(self.max_backoff));

        if delay < self.max_backoff {
            self.duration_shift += 1;
        }
        delay
    }
}

struct BackoffState {
    schedule: BackoffSchedule,
    ignition: Option<JoinHandle<()>>,
}

/// Stop the queue on failure, keep the job at the front and restart the queue
/// after an exponentially growing delay.
///
/// Only one restart is pending at a time: a newer failure replaces the
/// previous timer. Dropping the strategy cancels a pending restart.
pub struct BackoffRetry {
    state: Mutex<BackoffState>,
}

impl BackoffRetry {
    pub fn new(max_backoff: Duration) -> Self {
        Self::with_unit(DEFAULT_UNIT, max_backoff)
    }

    /// `unit` is the delay after the first failure of a job.
    pub fn with_unit(unit: Duration, max_backoff: Duration) -> Self {
        Self {
            state: Mutex::new(BackoffState {
                schedule: BackoffSchedule::new(unit, max_backoff),
                ignition: None,
            }),
        }
    }

    /// Exponent the next failure of the same job will use.
    pub fn duration_shift(&self) -> u32 {
        self.lock().schedule.duration_shift
    }

    pub fn max_backoff(&self) -> Duration {
        self.lock().schedule.max_backoff
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BackoffRetry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKOFF)
    }
}

impl Drop for BackoffRetry {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ignition) = state.ignition.take() {
            ignition.abort();
        }
    }
}

#[async_trait]
impl<J: QueueJob> RetryStrategy<J> for BackoffRetry {
    async fn on_failure(&self, job: J, queue: &JobQueue<J>) {
        queue.stop();
        let id = job.id().to_string();
        queue.retry(job).await;

        let mut state = self.lock();
        let delay = state.schedule.next_delay(&id);

        if let Some(previous) = state.ignition.take() {
            previous.abort();
        }

        let weak = queue.downgrade();
        state.ignition = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(queue) = weak.upgrade() {
                info!(queue = %queue.name(), "backoff elapsed; restarting queue");
                queue.start();
            }
        }));

        info!(
            queue = %queue.name(),
            job_id = %id,
            delay_ms = delay.as_millis() as u64,
            duration_shift = state.schedule.duration_shift,
            "queue stopped; restart scheduled"
        );
    }
}
