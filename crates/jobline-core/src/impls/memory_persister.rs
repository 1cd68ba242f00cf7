use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::QueueJob;
use crate::error::PersistenceError;
use crate::ports::JobPersister;

/// In-memory JobPersister
///
/// # 用途
/// - I/O なしで永続化のセマンティクスだけ欲しいとき
/// - テスト（キューが persister をどう呼ぶかの確認）
#[derive(Debug)]
pub struct MemoryJobPersister<J: QueueJob> {
    jobs: Mutex<Vec<J>>,
}

impl<J: QueueJob> MemoryJobPersister<J> {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Stored jobs in insertion order.
    pub async fn jobs(&self) -> Vec<J> {
        self.jobs.lock().await.clone()
    }
}

impl<J: QueueJob> Default for MemoryJobPersister<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<J: QueueJob> JobPersister<J> for MemoryJobPersister<J> {
    async fn persist(&self, jobs: &[J]) -> Result<(), PersistenceError> {
        let mut stored = self.jobs.lock().await;
        for job in jobs {
            match stored.iter_mut().find(|s| s.id() == job.id()) {
                Some(existing) => *existing = job.clone(),
                None => stored.push(job.clone()),
            }
        }
        Ok(())
    }

    async fn delete(&self, job: &J) -> Result<(), PersistenceError> {
        let mut stored = self.jobs.lock().await;
        if let Some(index) = stored.iter().position(|s| s.id() == job.id()) {
            stored.remove(index);
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<J>, PersistenceError> {
        let mut jobs = self.jobs.lock().await.clone();
        jobs.sort_by_key(|job| job.created_at());
        Ok(jobs)
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.jobs.lock().await.clear();
        Ok(())
    }
}
