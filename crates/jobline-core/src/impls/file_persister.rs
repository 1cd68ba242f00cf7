//! File-based JobPersister
//!
//! 1 ジョブ = 1 JSON ファイル。ファイル名は `{created_at のマイクロ秒}-{id}.json`
//! なので、ファイル名だけでジョブを特定できる（delete のために読む必要がない）。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::QueueJob;
use crate::error::PersistenceError;
use crate::ports::JobPersister;

use super::sanitize::sanitize;

const APP_DIR: &str = "jobline";
const QUEUES_DIR: &str = "queues";

/// Persists each job as a JSON file under `<root>/<queue name>/`.
///
/// The directory is created on the first write; a queue that never persisted
/// anything loads as empty.
#[derive(Debug, Clone)]
pub struct FileJobPersister {
    location: PathBuf,
}

impl FileJobPersister {
    /// Store under the platform data directory:
    /// `<data dir>/jobline/queues/<queue name>`.
    pub fn new(queue_name: &str) -> Result<Self, PersistenceError> {
        let data_dir = dirs::data_dir().ok_or(PersistenceError::NoDataDir)?;
        Ok(Self::with_root(data_dir.join(APP_DIR).join(QUEUES_DIR), queue_name))
    }

    /// Store under `<root>/<queue name>`.
    pub fn with_root(root: impl AsRef<Path>, queue_name: &str) -> Self {
        Self {
            location: root.as_ref().join(sanitize(queue_name)),
        }
    }

    /// Directory the job files live in.
    pub fn location(&self) -> &Path {
        &self.location
    }

    fn file_name<J: QueueJob>(job: &J) -> String {
        format!(
            "{}-{}.json",
            job.created_at().timestamp_micros(),
            sanitize(job.id())
        )
    }

    fn path_for<J: QueueJob>(&self, job: &J) -> PathBuf {
        self.location.join(Self::file_name(job))
    }

    /// Job files currently on disk. A missing directory has none.
    async fn job_files(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut entries = match fs::read_dir(&self.location).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
            {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl<J: QueueJob> JobPersister<J> for FileJobPersister {
    async fn persist(&self, jobs: &[J]) -> Result<(), PersistenceError> {
        if jobs.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.location).await?;

        for job in jobs {
            let bytes = serde_json::to_vec(job)?;
            fs::write(self.path_for(job), bytes).await?;
        }
        debug!(location = %self.location.display(), count = jobs.len(), "jobs written");
        Ok(())
    }

    async fn delete(&self, job: &J) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(job)).await {
            Ok(()) => Ok(()),
            // 一度も書けなかったジョブ（persist 失敗）も削除済み扱い
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> Result<Vec<J>, PersistenceError> {
        let mut jobs = Vec::new();
        for path in self.job_files().await? {
            let bytes = fs::read(&path).await?;
            jobs.push(serde_json::from_slice::<J>(&bytes)?);
        }
        jobs.sort_by_key(|job| job.created_at());
        Ok(jobs)
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let mut first_error = None;
        for path in self.job_files().await? {
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "failed to remove job file");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
