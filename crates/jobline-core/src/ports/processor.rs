//! JobProcessor port - ジョブの実処理
//!
//! # 完了シグナル
//! `process()` が返す future が 1 回きりの完了シグナルです。
//! - 成功なら `Ok(())`、失敗なら `Err(ProcessingError)`
//! - 処理ループはこの future を await し、その間は次のジョブに進まない
//! - 別スレッド・別タスクに仕事を投げて後から完了させてもよい
//!
//! 完了しない processor はそのキューを止めたままにします（タイムアウトはない）。

use async_trait::async_trait;

use crate::domain::QueueJob;
use crate::error::ProcessingError;

/// Performs the work for one job at a time.
///
/// # 使用例
/// ```ignore
/// struct Uploader { client: HttpClient }
///
/// #[async_trait]
/// impl JobProcessor<Job> for Uploader {
///     async fn process(&self, job: &Job) -> Result<(), ProcessingError> {
///         self.client
///             .post(job.action(), job.data())
///             .await
///             .map_err(|e| ProcessingError::with_source("upload failed", e))
///     }
/// }
/// ```
#[async_trait]
pub trait JobProcessor<J: QueueJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), ProcessingError>;
}
