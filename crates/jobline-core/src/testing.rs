//! Test doubles and helpers shared by the in-module tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::domain::{Job, JobQueueEvent, QueueJob};
use crate::error::{PersistenceError, ProcessingError};
use crate::notify::NotificationToken;
use crate::ports::{JobPersister, JobProcessor};
use crate::queue::{JobQueue, QueueState};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// `n` fresh jobs with strictly increasing `created_at`.
pub fn make_jobs(n: usize) -> Vec<Job> {
    let base = Utc::now();
    (0..n)
        .map(|i| Job::new("test").with_created_at(base + chrono::Duration::milliseconds(i as i64)))
        .collect()
}

pub fn ids<J: QueueJob>(jobs: &[J]) -> Vec<String> {
    jobs.iter().map(|job| job.id().to_string()).collect()
}

/// Poll `check` until it returns true; panics after a generous timeout.
///
/// Uses real time; tests on a paused clock should drive time explicitly.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    if tokio::time::timeout(SETTLE_TIMEOUT, poll).await.is_err() {
        panic!("condition not met within {SETTLE_TIMEOUT:?}");
    }
}

pub async fn wait_for_state<J: QueueJob>(queue: &JobQueue<J>, state: QueueState) {
    let mut rx = queue.subscribe_state();
    let waited = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|s| *s == state)).await;
    match waited {
        Ok(Ok(_)) => {}
        _ => panic!("queue never reached {state} (now {})", queue.state()),
    }
}

// ----------------------------------------------------------------------
// Observer
// ----------------------------------------------------------------------

type Entry = (JobQueueEvent, Vec<String>);

/// Records every notification as `(event, job ids)`.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl EventLog {
    /// Subscribe a fresh log. Keep the token alive for as long as events matter.
    pub fn observe<J: QueueJob>(queue: &JobQueue<J>) -> (NotificationToken<J>, EventLog) {
        let log = EventLog::default();
        let sink = Arc::clone(&log.entries);
        let token = queue.observe(move |_queue, jobs, event| {
            sink.lock().unwrap().push((event, ids(jobs)));
        });
        (token, log)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<JobQueueEvent> {
        self.entries().into_iter().map(|(event, _)| event).collect()
    }
}

// ----------------------------------------------------------------------
// Processors
// ----------------------------------------------------------------------

/// Always succeeds and records what it processed.
#[derive(Default)]
pub struct TestProcessor {
    processed: Mutex<Vec<String>>,
}

impl TestProcessor {
    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl<J: QueueJob> JobProcessor<J> for TestProcessor {
    async fn process(&self, job: &J) -> Result<(), ProcessingError> {
        self.processed.lock().unwrap().push(job.id().to_string());
        Ok(())
    }
}

/// Always fails and counts failures per job id.
#[derive(Default)]
pub struct FailingProcessor {
    failures: Mutex<HashMap<String, u32>>,
}

impl FailingProcessor {
    pub fn failures_for(&self, id: &str) -> u32 {
        self.failures.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> u32 {
        self.failures.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl<J: QueueJob> JobProcessor<J> for FailingProcessor {
    async fn process(&self, job: &J) -> Result<(), ProcessingError> {
        *self.failures.lock().unwrap().entry(job.id().to_string()).or_default() += 1;
        Err(ProcessingError::new(format!("job {} always fails", job.id())))
    }
}

/// Panics on every job, after counting the attempt.
#[derive(Default)]
pub struct PanickingProcessor {
    calls: AtomicUsize,
}

impl PanickingProcessor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<J: QueueJob> JobProcessor<J> for PanickingProcessor {
    async fn process(&self, job: &J) -> Result<(), ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("processor blew up on {}", job.id());
    }
}

/// Succeeds after sleeping for `delay`.
pub struct SlowProcessor {
    delay: Duration,
    processed: Mutex<Vec<String>>,
}

impl SlowProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            processed: Mutex::new(Vec::new()),
        }
    }

    pub fn processed(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl<J: QueueJob> JobProcessor<J> for SlowProcessor {
    async fn process(&self, job: &J) -> Result<(), ProcessingError> {
        tokio::time::sleep(self.delay).await;
        self.processed.lock().unwrap().push(job.id().to_string());
        Ok(())
    }
}

/// Blocks every job until the test calls `release()` once for it.
pub struct GateProcessor {
    entered: AtomicUsize,
    gate: Semaphore,
    finished: Mutex<Vec<String>>,
}

impl Default for GateProcessor {
    fn default() -> Self {
        Self {
            entered: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            finished: Mutex::new(Vec::new()),
        }
    }
}

impl GateProcessor {
    pub async fn wait_until_entered(&self) {
        eventually(|| async { self.entered.load(Ordering::SeqCst) > 0 }).await;
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl<J: QueueJob> JobProcessor<J> for GateProcessor {
    async fn process(&self, job: &J) -> Result<(), ProcessingError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ProcessingError::with_source("gate closed", e))?;
        permit.forget();
        self.finished.lock().unwrap().push(job.id().to_string());
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Persister
// ----------------------------------------------------------------------

/// Every call fails.
pub struct FailingPersister;

fn backend_down() -> PersistenceError {
    PersistenceError::Backend("storage unavailable".to_string())
}

#[async_trait]
impl<J: QueueJob> JobPersister<J> for FailingPersister {
    async fn persist(&self, _jobs: &[J]) -> Result<(), PersistenceError> {
        Err(backend_down())
    }

    async fn delete(&self, _job: &J) -> Result<(), PersistenceError> {
        Err(backend_down())
    }

    async fn load(&self) -> Result<Vec<J>, PersistenceError> {
        Err(backend_down())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        Err(backend_down())
    }
}
