use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jobline_core::{
    Job, JobProcessor, JobQueue, PersistenceConfig, ProcessingError, QueueBuilder, QueueConfig,
    QueueJob, QueueState, RetryConfig,
};

#[derive(Debug, Deserialize)]
struct HelloPayload {
    name: String,
}

/// 最初の `n` 回はわざと失敗する processor
struct FlakyProcessor {
    remaining_failures: AtomicU32,
}

impl FlakyProcessor {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl JobProcessor<Job> for FlakyProcessor {
    async fn process(&self, job: &Job) -> Result<(), ProcessingError> {
        let payload = job.data().unwrap_or_default();
        let p: HelloPayload = serde_json::from_slice(payload)
            .map_err(|e| ProcessingError::with_source("json decode", e))?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ProcessingError::new(format!("intentional failure (left={left})")));
        }

        println!("Hello, {}! (job {})", p.name, job.id());
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// 引数に設定ファイルがあればそれを、なければデモ用の設定を使う
fn load_config() -> Result<QueueConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(QueueConfig::from_path(path)?),
        None => Ok(QueueConfig {
            name: "hello".to_string(),
            persistence: PersistenceConfig::Memory,
            retry: RetryConfig::MaxAttempts { max_attempts: 3 },
            autostart: true,
        }),
    }
}

async fn build_queue(config: &QueueConfig) -> Result<JobQueue<Job>, Box<dyn std::error::Error>> {
    let queue = QueueBuilder::<Job>::from_config(config)?
        .processor(Arc::new(FlakyProcessor::new(2)))
        .build()
        .await?;
    Ok(queue)
}

fn demo_jobs() -> Result<Vec<Job>, serde_json::Error> {
    ["weaver", "jobline", "tokio"]
        .into_iter()
        .map(|name| {
            let payload = serde_json::to_vec(&serde_json::json!({ "name": name }))?;
            Ok(Job::new("hello").with_data(payload))
        })
        .collect()
}

/// 全部はけて Listening になるか、retry strategy が止めたら戻る
///
/// halt / backoff は失敗したジョブを残したまま Stopped にするので、
/// それも落ち着いた状態として扱う。
async fn wait_until_settled(queue: &JobQueue<Job>) {
    loop {
        match queue.state() {
            QueueState::Listening if queue.count().await == 0 => return,
            QueueState::Stopped => {
                warn!(queue = %queue.name(), pending = queue.count().await, "queue stopped");
                return;
            }
            _ => {}
        }
        sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // (A) 設定からキューを組み立てる
    let config = load_config()?;
    let queue = build_queue(&config).await?;

    // (B) イベントをログに流す（token を持っている間だけ購読）
    let _token = queue.observe(|queue, jobs, event| {
        let ids: Vec<&str> = jobs.iter().map(|job| job.id()).collect();
        info!(queue = %queue.name(), %event, ?ids, "queue event");
    });

    if !config.autostart {
        queue.start();
    }

    // (C) ジョブ投入（action + JSON payload）
    queue.add(demo_jobs()?).await;

    // (D) はけるか止まるまでポーリングで待つ
    wait_until_settled(&queue).await;

    // (E) スナップショットを出して止める
    println!("{}", serde_json::to_string_pretty(&queue.snapshot().await)?);
    queue.stop();
    Ok(())
}
