//! JobPersister port - ジョブの永続化
//!
//! 永続化は best-effort のミラーです。メモリ上のリストが正本で、
//! add/remove/cancel/drain 中の失敗はログに出すだけで操作は中断しません。
//! 例外は構築時の `load()` だけで、失敗するとキューは作られません。

use async_trait::async_trait;

use crate::domain::QueueJob;
use crate::error::PersistenceError;

/// Permanent store for a queue's pending jobs.
///
/// Calls from one queue never overlap: the queue issues them while holding its
/// pending-list write lock. A persister shared by several queues must cope
/// with concurrent calls from different queues.
#[async_trait]
pub trait JobPersister<J: QueueJob>: Send + Sync {
    /// Save the jobs. Persisting a job that is already stored should replace it.
    async fn persist(&self, jobs: &[J]) -> Result<(), PersistenceError>;

    /// Delete one job's persisted data.
    async fn delete(&self, job: &J) -> Result<(), PersistenceError>;

    /// Load every stored job, oldest `created_at` first.
    async fn load(&self) -> Result<Vec<J>, PersistenceError>;

    /// Delete all stored jobs. Completion of the future is the completion signal.
    async fn clear(&self) -> Result<(), PersistenceError>;
}
