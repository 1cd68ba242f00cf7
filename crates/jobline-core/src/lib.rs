//! jobline-core
//!
//! In-process job queue with optional persistence, pluggable retry strategies
//! and weakly-held observers.
//!
//! # モジュール構成
//! - **domain**: `QueueJob` trait, 標準の `Job`, `JobQueueEvent`
//! - **ports**: 抽象化レイヤー（JobPersister, JobProcessor, RetryStrategy）
//! - **queue**: `JobQueue` 本体（状態機械・処理ループ・builder）
//! - **retry**: Halt / MaxAttempts / Backoff の各 RetryStrategy
//! - **notify**: observer の登録（weak 参照）と通知の配送
//! - **impls**: 同梱の persister 実装（File, Memory）
//! - config / error / observability: 設定・エラー型・スナップショット

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod notify;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PersistenceConfig, QueueConfig};
pub use domain::{Job, JobQueueEvent, QueueJob};
pub use error::{ConfigError, PersistenceError, ProcessingError, QueueError};
pub use impls::{FileJobPersister, MemoryJobPersister};
pub use notify::{NotificationToken, ObserverId};
pub use observability::QueueSnapshot;
pub use ports::{JobPersister, JobProcessor, RetryStrategy};
pub use queue::{JobQueue, QueueBuilder, QueueState, WeakJobQueue};
pub use retry::{BackoffRetry, HaltRetry, MaxAttemptsRetry, RetryConfig};
