//! Processing loop.
//!
//! 1 つのキューにつき 1 本の tokio タスク。`Notify` で起こされ、処理できる
//! ジョブがなくなるまで 1 件ずつ取り出して processor に渡す。
//!
//! # 学習ポイント
//! - タスクは `WeakJobQueue` しか持たない。キューが破棄されると upgrade に
//!   失敗してループを抜ける
//! - 状態の確認・pop・状態の書き込みは、list の write lock を持ったまま
//!   watch channel の critical section の中で行う（`add` / `stop` との競合防止）

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::{JobQueue, QueueState, WeakJobQueue};
use crate::domain::{JobQueueEvent, QueueJob};
use crate::error::ProcessingError;
use crate::ports::JobProcessor;

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// A job went through the processor; look for the next one.
    Continue,
    /// Nothing to do until the next kick.
    Idle,
}

pub(super) fn spawn<J: QueueJob>(queue: WeakJobQueue<J>, wake: Arc<Notify>) {
    tokio::spawn(async move {
        loop {
            wake.notified().await;

            loop {
                let Some(strong) = queue.upgrade() else {
                    debug!("job queue dropped; processing loop exits");
                    return;
                };
                let step = process_next(&strong).await;
                drop(strong);

                if step == Step::Idle {
                    break;
                }
                tokio::task::yield_now().await;
            }
        }
    });
}

async fn process_next<J: QueueJob>(queue: &JobQueue<J>) -> Step {
    let Some((job, processor)) = next_for_processing(queue).await else {
        return Step::Idle;
    };

    let name = queue.name();
    debug!(queue = %name, job_id = %job.id(), action = %job.action(), "processing job");

    match run_processor(name, &processor, &job).await {
        Ok(()) => {
            debug!(queue = %name, job_id = %job.id(), "job processed");
            queue.notify(JobQueueEvent::Processed, vec![job]);
        }
        Err(error) => {
            warn!(queue = %name, job_id = %job.id(), %error, "job failed to process");
            queue.notify(JobQueueEvent::FailedToProcess, vec![job.clone()]);

            match queue.retry_strategy() {
                Some(strategy) => strategy.on_failure(job, queue).await,
                None => {
                    info!(queue = %name, job_id = %job.id(), "no retry strategy; failed job purged")
                }
            }
        }
    }

    Step::Continue
}

/// Run the processor on its own task so a panic surfaces as a `JoinError`
/// instead of unwinding through the processing loop.
async fn run_processor<J: QueueJob>(
    name: &str,
    processor: &Arc<dyn JobProcessor<J>>,
    job: &J,
) -> Result<(), ProcessingError> {
    let processor = Arc::clone(processor);
    let owned = job.clone();
    let handle = tokio::spawn(async move { processor.process(&owned).await });

    handle.await.unwrap_or_else(|e: JoinError| {
        if e.is_panic() {
            error!(queue = %name, job_id = %job.id(), "processor panicked");
            Err(ProcessingError::new("processor panicked"))
        } else {
            Err(ProcessingError::with_source("processor task cancelled", e))
        }
    })
}

/// Decide the next state and, when processing can go on, dequeue a job.
///
/// The dequeued job is deleted from persistence and announced as `Removed`
/// before the list lock is released.
async fn next_for_processing<J: QueueJob>(
    queue: &JobQueue<J>,
) -> Option<(J, Arc<dyn JobProcessor<J>>)> {
    let processor = queue.processor();
    let mut pending = queue.inner.jobs.write().await;

    let mut next = None;
    let mut moved = None;
    queue.inner.state.send_if_modified(|state| {
        let from = *state;
        let to = match from {
            QueueState::Stopping => QueueState::Stopped,
            QueueState::Stopped => return false,
            QueueState::Starting | QueueState::Listening | QueueState::Processing => {
                match processor.as_ref().and_then(|_| pending.pop_front()) {
                    Some(job) => {
                        next = Some(job);
                        QueueState::Processing
                    }
                    None => QueueState::Listening,
                }
            }
        };
        if from == to {
            return false;
        }
        moved = Some((from, to));
        *state = to;
        true
    });

    if let Some((from, to)) = moved {
        debug!(queue = %queue.name(), %from, %to, "state transition");
    }

    let job = next?;
    let processor = processor?;

    queue.forget_persisted(&job).await;
    queue.notify(JobQueueEvent::Removed, vec![job.clone()]);
    drop(pending);

    Some((job, processor))
}
