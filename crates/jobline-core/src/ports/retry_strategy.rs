//! RetryStrategy port - 失敗したジョブの扱い
//!
//! 処理ループの失敗分岐から await されます。副作用はキューの公開操作
//! （`stop`, `retry`, 遅延した `start`）だけで起こします。

use async_trait::async_trait;

use crate::domain::QueueJob;
use crate::queue::JobQueue;

/// Decides whether, when and how a failed job re-enters the queue.
///
/// The failed job has already left the pending list; doing nothing purges it.
/// Implementations must not block indefinitely: the queue's processing loop
/// waits for `on_failure` before taking the next job.
#[async_trait]
pub trait RetryStrategy<J: QueueJob>: Send + Sync {
    async fn on_failure(&self, job: J, queue: &JobQueue<J>);
}
