use async_trait::async_trait;
use tracing::info;

use crate::domain::QueueJob;
use crate::ports::RetryStrategy;
use crate::queue::JobQueue;

/// Stop the queue on the first failure and put the job back at the front.
///
/// Nothing is processed again until someone calls `start()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltRetry;

#[async_trait]
impl<J: QueueJob> RetryStrategy<J> for HaltRetry {
    async fn on_failure(&self, job: J, queue: &JobQueue<J>) {
        info!(queue = %queue.name(), job_id = %job.id(), "halting queue after failure");
        queue.stop();
        queue.retry(job).await;
    }
}
