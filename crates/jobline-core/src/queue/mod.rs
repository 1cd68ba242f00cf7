//! Queue module: `JobQueue`, its state machine, processing loop and builder.

mod builder;
mod state;
mod worker;

pub use builder::QueueBuilder;
pub use state::QueueState;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tokio::sync::{Notify, RwLock as AsyncRwLock, mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::{Job, JobQueueEvent, QueueJob};
use crate::error::QueueError;
use crate::notify::{self, Notification, NotificationToken, ObserverRegistry};
use crate::observability::QueueSnapshot;
use crate::ports::{JobPersister, JobProcessor, RetryStrategy};

/// Shared queue state.
///
/// Locks:
/// - `jobs`: pending list. Every mutation (and every persister call) happens
///   under its write lock, so persister calls from one queue never overlap.
/// - `state`: its own lock (the watch channel), separate from `jobs`.
/// - config slots: short std locks, never held across an await.
struct Inner<J: QueueJob> {
    name: String,
    jobs: AsyncRwLock<VecDeque<J>>,
    state: watch::Sender<QueueState>,
    persister: RwLock<Option<Arc<dyn JobPersister<J>>>>,
    processor: RwLock<Option<Arc<dyn JobProcessor<J>>>>,
    retry_strategy: RwLock<Option<Arc<dyn RetryStrategy<J>>>>,
    observers: ObserverRegistry<J>,
    notifications: mpsc::UnboundedSender<Notification<J>>,
    wake: Arc<Notify>,
}

impl<J: QueueJob> Drop for Inner<J> {
    fn drop(&mut self) {
        // 待機中の処理タスクを起こし、upgrade 失敗で終了させる
        self.wake.notify_one();
    }
}

/// In-memory (optionally persisted) ordered job queue, processed one job at
/// a time by a pluggable processor.
///
/// `JobQueue` is a cheap handle; clones share the same queue. The queue runs
/// two background tasks (processing loop, notification dispatcher) that hold
/// only weak references and exit once the last handle is dropped.
pub struct JobQueue<J: QueueJob = Job> {
    inner: Arc<Inner<J>>,
}

impl<J: QueueJob> Clone for JobQueue<J> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J: QueueJob> fmt::Debug for JobQueue<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a `JobQueue`.
pub struct WeakJobQueue<J: QueueJob = Job> {
    inner: Weak<Inner<J>>,
}

impl<J: QueueJob> WeakJobQueue<J> {
    pub fn upgrade(&self) -> Option<JobQueue<J>> {
        self.inner.upgrade().map(|inner| JobQueue { inner })
    }
}

impl<J: QueueJob> Clone for WeakJobQueue<J> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

fn read_slot<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write_slot<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl<J: QueueJob> JobQueue<J> {
    /// Create a queue, seeding it from `persister` when one is given.
    ///
    /// Loaded jobs are ordered by `created_at` (stable) regardless of the
    /// order the persister returns. A failed load fails construction.
    ///
    /// Must be called inside a Tokio runtime: it spawns the queue's
    /// processing and notification tasks.
    pub async fn new(
        name: impl Into<String>,
        persister: Option<Arc<dyn JobPersister<J>>>,
    ) -> Result<Self, QueueError> {
        let name = name.into();

        let mut seed = Vec::new();
        if let Some(persister) = &persister {
            seed = persister.load().await.map_err(|source| QueueError::Load {
                queue: name.clone(),
                source,
            })?;
            seed.sort_by_key(|job| job.created_at());
        }
        let loaded = seed.len();

        let (state, _) = watch::channel(QueueState::Stopped);
        let (notifications, notifications_rx) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(Inner {
                name,
                jobs: AsyncRwLock::new(seed.into()),
                state,
                persister: RwLock::new(persister),
                processor: RwLock::new(None),
                retry_strategy: RwLock::new(None),
                observers: ObserverRegistry::new(),
                notifications,
                wake: Arc::new(Notify::new()),
            }),
        };

        notify::spawn_dispatcher(queue.downgrade(), notifications_rx);
        worker::spawn(queue.downgrade(), Arc::clone(&queue.inner.wake));

        info!(queue = %queue.inner.name, loaded, "job queue created");
        Ok(queue)
    }

    pub fn builder(name: impl Into<String>) -> QueueBuilder<J> {
        QueueBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn downgrade(&self) -> WeakJobQueue<J> {
        WeakJobQueue {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------
    // Configuration slots (read at the moment each decision is made)
    // ------------------------------------------------------------------

    pub fn processor(&self) -> Option<Arc<dyn JobProcessor<J>>> {
        read_slot(&self.inner.processor)
    }

    /// Without a processor the queue only stores jobs; `start()` leaves it
    /// `Listening` and jobs must be taken with `remove()`.
    pub fn set_processor(&self, processor: Option<Arc<dyn JobProcessor<J>>>) {
        write_slot(&self.inner.processor, processor);
    }

    pub fn retry_strategy(&self) -> Option<Arc<dyn RetryStrategy<J>>> {
        read_slot(&self.inner.retry_strategy)
    }

    /// Without a retry strategy a failed job is purged after one attempt.
    pub fn set_retry_strategy(&self, strategy: Option<Arc<dyn RetryStrategy<J>>>) {
        write_slot(&self.inner.retry_strategy, strategy);
    }

    pub fn persister(&self) -> Option<Arc<dyn JobPersister<J>>> {
        read_slot(&self.inner.persister)
    }

    /// Without a persister the queue is in-memory only.
    pub fn set_persister(&self, persister: Option<Arc<dyn JobPersister<J>>>) {
        write_slot(&self.inner.persister, persister);
    }

    // ------------------------------------------------------------------
    // Pending list
    // ------------------------------------------------------------------

    /// Number of jobs awaiting processing. A job in flight is not counted.
    pub async fn count(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    /// Snapshot of the pending jobs in processing order.
    pub async fn pending_jobs(&self) -> Vec<J> {
        self.inner.jobs.read().await.iter().cloned().collect()
    }

    /// Append `jobs` in order.
    ///
    /// Persistence failure is logged and the jobs are queued anyway. Emits one
    /// `Added` with exactly these jobs and kicks the processing loop when the
    /// queue is `Starting` or `Listening`. Empty input is a no-op.
    pub async fn add(&self, jobs: impl IntoIterator<Item = J>) {
        let jobs: Vec<J> = jobs.into_iter().collect();
        if jobs.is_empty() {
            return;
        }

        let mut pending = self.inner.jobs.write().await;
        if let Some(persister) = self.persister()
            && let Err(error) = persister.persist(&jobs).await
        {
            warn!(
                queue = %self.inner.name,
                count = jobs.len(),
                %error,
                "failed to persist jobs; they stay queued in memory"
            );
        }

        pending.extend(jobs.iter().cloned());
        debug!(queue = %self.inner.name, added = jobs.len(), pending = pending.len(), "jobs added");
        self.notify(JobQueueEvent::Added, jobs);

        // 状態の確認は list lock の中で行う（処理ループのアイドル遷移と競合させない）
        if self.state().is_processable() {
            self.kick();
        }
    }

    /// Put `job` at the very front, ahead of everything pending.
    ///
    /// Used by retry strategies. Persists the job again (failure is logged),
    /// emits no notification and does not kick the processing loop.
    pub async fn retry(&self, job: J) {
        let mut pending = self.inner.jobs.write().await;
        if let Some(persister) = self.persister()
            && let Err(error) = persister.persist(std::slice::from_ref(&job)).await
        {
            warn!(
                queue = %self.inner.name,
                job_id = %job.id(),
                %error,
                "failed to persist retried job; it stays queued in memory"
            );
        }
        debug!(queue = %self.inner.name, job_id = %job.id(), "job queued for retry at front");
        pending.push_front(job);
    }

    /// The next job, without removing it.
    pub async fn peek(&self) -> Option<J> {
        self.inner.jobs.read().await.front().cloned()
    }

    /// Pop the next job, delete it from persistence and emit `Removed`.
    pub async fn remove(&self) -> Option<J> {
        let mut pending = self.inner.jobs.write().await;
        let job = pending.pop_front()?;
        self.forget_persisted(&job).await;
        self.notify(JobQueueEvent::Removed, vec![job.clone()]);
        Some(job)
    }

    /// Remove the first pending job with `id`, wherever it sits, and emit
    /// `Cancelled`.
    ///
    /// A job already handed to the processor is no longer pending and cannot
    /// be cancelled; unknown ids are a no-op.
    pub async fn cancel(&self, id: &str) {
        let mut pending = self.inner.jobs.write().await;
        let Some(index) = pending.iter().position(|job| job.id() == id) else {
            debug!(queue = %self.inner.name, job_id = %id, "cancel: no pending job with this id");
            return;
        };
        let Some(job) = pending.remove(index) else {
            return;
        };
        self.forget_persisted(&job).await;
        self.notify(JobQueueEvent::Cancelled, vec![job]);
    }

    /// Remove every pending job at once and clear persistence.
    ///
    /// Emits a single `Removed` carrying all drained jobs, or nothing when the
    /// queue was already empty.
    pub async fn drain(&self) {
        let mut pending = self.inner.jobs.write().await;
        let drained: Vec<J> = std::mem::take(&mut *pending).into();

        if let Some(persister) = self.persister()
            && let Err(error) = persister.clear().await
        {
            warn!(queue = %self.inner.name, %error, "failed to clear persisted jobs");
        }

        if !drained.is_empty() {
            debug!(queue = %self.inner.name, drained = drained.len(), "queue drained");
            self.notify(JobQueueEvent::Removed, drained);
        }
    }

    // ------------------------------------------------------------------
    // Flow control
    // ------------------------------------------------------------------

    pub fn state(&self) -> QueueState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<QueueState> {
        self.inner.state.subscribe()
    }

    /// Start processing. Only has an effect from `Stopping` or `Stopped`.
    pub fn start(&self) {
        if self.transition(QueueState::after_start).is_some() {
            self.kick();
        }
    }

    /// Stop processing.
    ///
    /// Cooperative: a job in flight runs to completion and the queue halts at
    /// the next loop boundary.
    pub fn stop(&self) {
        self.transition(QueueState::after_stop);
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Subscribe to queue events.
    ///
    /// The queue holds the returned token weakly: keep it alive for as long as
    /// notifications are wanted. Once it is dropped the callback is never
    /// called again.
    ///
    /// Callbacks run on the queue's dispatcher task, one at a time, in the
    /// order the operations were committed.
    pub fn observe<F>(&self, callback: F) -> NotificationToken<J>
    where
        F: Fn(&JobQueue<J>, &[J], JobQueueEvent) + Send + Sync + 'static,
    {
        let token = self.inner.observers.register(callback);
        debug!(queue = %self.inner.name, observer = %token.id(), "observer registered");
        token
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            name: self.inner.name.clone(),
            state: self.state(),
            pending: self.count().await,
            observers: self.inner.observers.live_count(),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn observers(&self) -> &ObserverRegistry<J> {
        &self.inner.observers
    }

    /// Apply `rule` to the current state under the state lock.
    fn transition(
        &self,
        rule: impl FnOnce(QueueState) -> Option<QueueState>,
    ) -> Option<(QueueState, QueueState)> {
        let mut changed = None;
        self.inner.state.send_if_modified(|state| match rule(*state) {
            Some(to) if to != *state => {
                changed = Some((*state, to));
                *state = to;
                true
            }
            _ => false,
        });
        if let Some((from, to)) = changed {
            debug!(queue = %self.inner.name, %from, %to, "state transition");
        }
        changed
    }

    /// Wake the processing loop.
    fn kick(&self) {
        self.inner.wake.notify_one();
    }

    /// Queue a notification for the dispatcher.
    ///
    /// Called while the producing mutation still holds the list lock, so
    /// delivery order matches commit order.
    fn notify(&self, event: JobQueueEvent, jobs: Vec<J>) {
        // 送信に失敗するのは dispatcher がもういない（キュー破棄中）ときだけ
        let _ = self.inner.notifications.send(Notification::new(event, jobs));
    }

    async fn forget_persisted(&self, job: &J) {
        if let Some(persister) = self.persister()
            && let Err(error) = persister.delete(job).await
        {
            warn!(
                queue = %self.inner.name,
                job_id = %job.id(),
                %error,
                "job left the queue but its persisted copy could not be deleted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryJobPersister;
    use crate::retry::{HaltRetry, MaxAttemptsRetry};
    use crate::testing::{
        EventLog, FailingPersister, FailingProcessor, eventually, ids, make_jobs, wait_for_state,
    };

    async fn queue() -> JobQueue<Job> {
        JobQueue::new("test-queue", None).await.unwrap()
    }

    #[tokio::test]
    async fn is_stopped_by_default() {
        let q = queue().await;
        assert_eq!(q.state(), QueueState::Stopped);
        assert_eq!(q.count().await, 0);
    }

    #[tokio::test]
    async fn storage_only_queue_add_peek_remove() {
        let q = queue().await;
        let jobs = make_jobs(3);

        q.add(jobs.clone()).await;
        assert_eq!(q.count().await, 3);
        assert_eq!(q.peek().await.unwrap().id(), jobs[0].id());

        let removed = q.remove().await.unwrap();
        assert_eq!(removed.id(), jobs[0].id());
        assert_eq!(q.count().await, 2);
        assert_eq!(q.peek().await.unwrap().id(), jobs[1].id());
    }

    #[tokio::test]
    async fn batches_keep_call_order() {
        let q = queue().await;
        let first = make_jobs(2);
        let second = make_jobs(3);

        q.add(first.clone()).await;
        q.add(Vec::new()).await;
        q.add(second.clone()).await;

        let expected: Vec<String> =
            first.iter().chain(second.iter()).map(|j| j.id().to_string()).collect();
        assert_eq!(ids(&q.pending_jobs().await), expected);
        assert_eq!(q.peek().await.unwrap().id(), first[0].id());
    }

    #[tokio::test]
    async fn adding_nothing_changes_nothing() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);

        q.add(Vec::new()).await;
        q.add(make_jobs(1)).await;

        eventually(|| async { log.len() == 1 }).await;
        assert_eq!(log.events(), vec![JobQueueEvent::Added]);
        assert_eq!(q.count().await, 1);
    }

    #[tokio::test]
    async fn remove_on_empty_returns_none_and_emits_nothing() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);

        assert!(q.remove().await.is_none());
        assert!(q.peek().await.is_none());

        // 後続の操作の通知が先頭に来る = 空の remove は何も送っていない
        q.add(make_jobs(1)).await;
        eventually(|| async { log.len() == 1 }).await;
        assert_eq!(log.events(), vec![JobQueueEvent::Added]);
    }

    #[tokio::test]
    async fn cancel_removes_exactly_the_matching_job() {
        let q = queue().await;
        let jobs = make_jobs(3);
        q.add(jobs.clone()).await;

        q.cancel(jobs[1].id()).await;
        assert_eq!(ids(&q.pending_jobs().await), ids(&[jobs[0].clone(), jobs[2].clone()]));

        q.cancel(jobs[2].id()).await;
        assert_eq!(ids(&q.pending_jobs().await), ids(&jobs[..1]));
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_a_no_op() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);
        q.add(make_jobs(2)).await;

        q.cancel("does-not-exist").await;
        q.drain().await;

        eventually(|| async { log.len() == 2 }).await;
        assert_eq!(log.events(), vec![JobQueueEvent::Added, JobQueueEvent::Removed]);
    }

    #[tokio::test]
    async fn cancel_takes_only_the_first_duplicate() {
        let q = queue().await;
        let a = Job::new("test").with_id("dup");
        let b = Job::new("other").with_id("dup");
        q.add(vec![a, b]).await;

        q.cancel("dup").await;

        let left = q.pending_jobs().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].action(), "other");
    }

    #[tokio::test]
    async fn retry_puts_the_job_in_front_silently() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);
        let jobs = make_jobs(2);
        q.add(jobs.clone()).await;

        let again = Job::new("test").with_id("again");
        q.retry(again.clone()).await;

        assert_eq!(q.peek().await.unwrap().id(), "again");
        assert_eq!(q.count().await, 3);
        assert_eq!(q.state(), QueueState::Stopped);

        q.drain().await;
        eventually(|| async { log.len() == 2 }).await;
        assert_eq!(log.events(), vec![JobQueueEvent::Added, JobQueueEvent::Removed]);
    }

    #[tokio::test]
    async fn drain_empties_in_one_event() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);
        let jobs = make_jobs(3);
        q.add(jobs.clone()).await;

        q.drain().await;
        assert_eq!(q.count().await, 0);

        q.drain().await; // 空の drain は通知しない
        q.add(make_jobs(1)).await;

        eventually(|| async { log.len() == 3 }).await;
        let entries = log.entries();
        assert_eq!(entries[1].0, JobQueueEvent::Removed);
        assert_eq!(entries[1].1, ids(&jobs));
        assert_eq!(entries[2].0, JobQueueEvent::Added);
    }

    #[tokio::test]
    async fn notifications_carry_exactly_the_affected_jobs() {
        let q = queue().await;
        let (_token, log) = EventLog::observe(&q);
        let jobs = make_jobs(3);

        q.add(jobs.clone()).await;
        let removed = q.remove().await.unwrap();
        q.cancel(jobs[2].id()).await;

        eventually(|| async { log.len() == 3 }).await;
        let entries = log.entries();
        assert_eq!(entries[0], (JobQueueEvent::Added, ids(&jobs)));
        assert_eq!(entries[1], (JobQueueEvent::Removed, vec![removed.id().to_string()]));
        assert_eq!(entries[2], (JobQueueEvent::Cancelled, vec![jobs[2].id().to_string()]));
    }

    #[tokio::test]
    async fn observer_receives_the_queue_it_watches() {
        let q = queue().await;
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let _token = q.observe(move |queue: &JobQueue<Job>, _jobs: &[Job], _event| {
            *sink.lock().unwrap() = Some(queue.name().to_string());
        });

        q.add(make_jobs(1)).await;
        eventually(|| async { seen.lock().unwrap().is_some() }).await;
        assert_eq!(seen.lock().unwrap().as_deref(), Some("test-queue"));
    }

    #[tokio::test]
    async fn dropped_token_stops_receiving() {
        let q = queue().await;
        let (token, log) = EventLog::observe(&q);
        let (_witness, witness_log) = EventLog::observe(&q);

        q.add(make_jobs(3)).await;
        eventually(|| async { log.len() == 1 }).await;

        drop(token);
        q.add(make_jobs(3)).await;

        // witness が 2 件目を受け取った時点で、同じ配送パスは終わっている
        eventually(|| async { witness_log.len() == 2 }).await;
        assert_eq!(q.count().await, 6);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn stale_observer_slots_are_compacted() {
        let q = queue().await;
        let (token, _log) = EventLog::observe(&q);
        assert_eq!(q.observers().slot_count(), 1);

        drop(token);
        q.add(make_jobs(1)).await;

        eventually(|| async { q.observers().slot_count() == 0 }).await;
        assert_eq!(q.snapshot().await.observers, 0);
    }

    #[tokio::test]
    async fn mutations_mirror_into_the_persister() {
        let persister = Arc::new(MemoryJobPersister::<Job>::new());
        let q: JobQueue<Job> = JobQueue::new("persisted", Some(persister.clone())).await.unwrap();
        let jobs = make_jobs(3);

        q.add(jobs.clone()).await;
        assert_eq!(persister.len().await, 3);

        q.peek().await;
        assert_eq!(persister.len().await, 3);

        q.remove().await;
        assert_eq!(persister.len().await, 2);

        q.cancel(jobs[2].id()).await;
        assert_eq!(persister.len().await, 1);

        q.drain().await;
        assert_eq!(persister.len().await, 0);
    }

    #[tokio::test]
    async fn retry_stores_the_job_once_and_puts_it_in_front() {
        let persister = Arc::new(MemoryJobPersister::<Job>::new());
        let q: JobQueue<Job> = JobQueue::new("retried", Some(persister.clone())).await.unwrap();
        let jobs = make_jobs(3);
        q.add(jobs.clone()).await;

        let taken = q.remove().await.unwrap();
        assert_eq!(persister.len().await, 2);

        q.retry(taken.clone()).await;
        assert_eq!(persister.len().await, 3);
        assert_eq!(ids(&q.pending_jobs().await), ids(&jobs));

        // 同じ id をもう一度 retry しても保存先は上書きになる
        q.retry(taken.clone()).await;
        assert_eq!(persister.len().await, 3);
        let stored = persister.jobs().await;
        assert_eq!(stored.iter().filter(|job| job.id() == taken.id()).count(), 1);
        assert_eq!(q.peek().await.unwrap().id(), taken.id());
        assert_eq!(q.count().await, 4);
    }

    #[tokio::test]
    async fn retry_strategy_is_read_at_each_failure() {
        let q = queue().await;
        let processor = Arc::new(FailingProcessor::default());
        q.set_processor(Some(processor.clone()));
        q.set_retry_strategy(Some(Arc::new(HaltRetry)));
        let jobs = make_jobs(1);

        q.add(jobs.clone()).await;
        q.start();
        wait_for_state(&q, QueueState::Stopped).await;
        assert_eq!(processor.failures_for(jobs[0].id()), 1);
        assert_eq!(q.count().await, 1);

        let limited = Arc::new(MaxAttemptsRetry::new(2));
        q.set_retry_strategy(Some(limited.clone()));
        q.start();

        // halt のままなら 2 回目の失敗で止まるはず
        eventually(|| async { q.state() == QueueState::Listening && q.count().await == 0 }).await;
        assert_eq!(processor.failures_for(jobs[0].id()), 3);
        assert_eq!(limited.attempts_for(jobs[0].id()), 2);
    }

    #[tokio::test]
    async fn loads_persisted_jobs_oldest_first() {
        let persister = Arc::new(MemoryJobPersister::<Job>::new());
        let jobs = make_jobs(3);
        // わざと逆順で保存しておく
        let reversed: Vec<Job> = jobs.iter().rev().cloned().collect();
        persister.persist(&reversed).await.unwrap();

        let q: JobQueue<Job> = JobQueue::new("reloaded", Some(persister)).await.unwrap();

        assert_eq!(q.count().await, 3);
        assert_eq!(ids(&q.pending_jobs().await), ids(&jobs));
    }

    #[tokio::test]
    async fn failing_load_fails_construction() {
        let result: Result<JobQueue<Job>, _> =
            JobQueue::new("broken", Some(Arc::new(FailingPersister))).await;

        assert!(matches!(result, Err(QueueError::Load { queue, .. }) if queue == "broken"));
    }

    #[tokio::test]
    async fn failing_persister_never_blocks_mutations() {
        let q = queue().await;
        q.set_persister(Some(Arc::new(FailingPersister)));
        let jobs = make_jobs(3);

        q.add(jobs.clone()).await;
        assert_eq!(q.count().await, 3);

        q.remove().await;
        assert_eq!(q.count().await, 2);

        q.cancel(jobs[2].id()).await;
        assert_eq!(q.count().await, 1);

        q.retry(jobs[0].clone()).await;
        assert_eq!(q.count().await, 2);

        q.drain().await;
        assert_eq!(q.count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adders_keep_each_batch_in_order() {
        let q = queue().await;

        let mut handles = Vec::new();
        for worker in 0..8 {
            let q = q.clone();
            handles.push(tokio::spawn(async move {
                for batch in 0..5 {
                    let jobs: Vec<Job> = (0..5)
                        .map(|n| Job::new("test").with_id(format!("w{worker}-b{batch}-{n}")))
                        .collect();
                    q.add(jobs).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let pending = ids(&q.pending_jobs().await);
        assert_eq!(pending.len(), 8 * 5 * 5);
        for worker in 0..8 {
            let mine: Vec<&String> = pending
                .iter()
                .filter(|id| id.starts_with(&format!("w{worker}-")))
                .collect();
            let mut sorted = mine.clone();
            sorted.sort_by_key(|id| {
                let parts: Vec<u32> = id
                    .split('-')
                    .skip(1)
                    .map(|p| p.trim_start_matches('b').parse().unwrap())
                    .collect();
                (parts[0], parts[1])
            });
            assert_eq!(mine, sorted);
        }
    }

    #[tokio::test]
    async fn background_tasks_do_not_keep_the_queue_alive() {
        let q = queue().await;
        let weak = q.downgrade();
        let _token = q.observe(|_, _, _| {});
        q.add(make_jobs(1)).await;
        q.start();

        drop(q);
        eventually(|| async { weak.upgrade().is_none() }).await;
    }

    #[tokio::test]
    async fn snapshot_reports_queue_shape() {
        let q = queue().await;
        let _token = q.observe(|_, _, _| {});
        q.add(make_jobs(2)).await;

        let snapshot = q.snapshot().await;
        assert_eq!(snapshot.name, "test-queue");
        assert_eq!(snapshot.state, QueueState::Stopped);
        assert_eq!(snapshot.pending, 2);
        assert_eq!(snapshot.observers, 1);
    }
}
