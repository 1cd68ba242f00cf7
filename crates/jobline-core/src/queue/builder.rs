//! QueueBuilder - キューの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 設定ファイル（`QueueConfig`）からの構築
//! - persister の load 失敗は build() のエラーとして返す（Fail-fast）

use std::sync::Arc;

use crate::config::{PersistenceConfig, QueueConfig};
use crate::domain::{Job, QueueJob};
use crate::error::QueueError;
use crate::impls::{FileJobPersister, MemoryJobPersister};
use crate::ports::{JobPersister, JobProcessor, RetryStrategy};

use super::JobQueue;

/// QueueBuilder はキューを構築
///
/// # 使用例
/// ```ignore
/// let queue = JobQueue::<Job>::builder("uploads")
///     .persister(Arc::new(FileJobPersister::new("uploads")?))
///     .processor(Arc::new(UploadProcessor))
///     .retry_strategy(Arc::new(MaxAttemptsRetry::new(3)))
///     .autostart(true)
///     .build()
///     .await?;
/// ```
pub struct QueueBuilder<J: QueueJob = Job> {
    name: String,
    persister: Option<Arc<dyn JobPersister<J>>>,
    processor: Option<Arc<dyn JobProcessor<J>>>,
    retry_strategy: Option<Arc<dyn RetryStrategy<J>>>,
    autostart: bool,
}

impl<J: QueueJob> QueueBuilder<J> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persister: None,
            processor: None,
            retry_strategy: None,
            autostart: false,
        }
    }

    /// 設定から builder を作る
    ///
    /// processor はコードでしか渡せない。呼び出し側で `.processor(..)` する。
    pub fn from_config(config: &QueueConfig) -> Result<Self, QueueError> {
        let persister: Option<Arc<dyn JobPersister<J>>> = match &config.persistence {
            PersistenceConfig::None => None,
            PersistenceConfig::Memory => Some(Arc::new(MemoryJobPersister::<J>::new())),
            PersistenceConfig::File { root: Some(root) } => {
                Some(Arc::new(FileJobPersister::with_root(root, &config.name)))
            }
            PersistenceConfig::File { root: None } => {
                Some(Arc::new(FileJobPersister::new(&config.name)?))
            }
        };

        Ok(Self {
            name: config.name.clone(),
            persister,
            processor: None,
            retry_strategy: config.retry.build(),
            autostart: config.autostart,
        })
    }

    pub fn persister(mut self, persister: Arc<dyn JobPersister<J>>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn JobProcessor<J>>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy<J>>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// build() の直後に start() する
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// キューを構築する
    ///
    /// # エラー
    /// - persister の load 失敗 → `QueueError::Load`
    pub async fn build(self) -> Result<JobQueue<J>, QueueError> {
        let queue = JobQueue::new(self.name, self.persister).await?;
        queue.set_processor(self.processor);
        queue.set_retry_strategy(self.retry_strategy);
        if self.autostart {
            queue.start();
        }
        Ok(queue)
    }
}
