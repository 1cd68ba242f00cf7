//! Job entity and the `QueueJob` binding a queue is generic over.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A unit of queued work.
///
/// # Trait Bounds
/// - `Serialize + DeserializeOwned`: persisters store jobs as documents
/// - `Clone`: observers and retry strategies get their own copy of a job
/// - `Send + Sync + 'static`: jobs cross into the processing and dispatch tasks
///
/// Two jobs with the same `id` are the same logical job for cancellation and
/// attempt counting. The queue itself does not enforce unique ids.
pub trait QueueJob: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> &str;

    /// Creation time. Persisted jobs are reloaded in ascending order of this.
    fn created_at(&self) -> DateTime<Utc>;

    /// Tag interpreted only by the processor.
    fn action(&self) -> &str;

    fn data(&self) -> Option<&[u8]> {
        None
    }
}

/// The stock job type: id, optional opaque payload, creation time, action tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
    action: String,
}

impl Job {
    /// New job created now, with a ULID id whose timestamp matches `created_at`.
    pub fn new(action: impl Into<String>) -> Self {
        let created_at = Utc::now();
        let ulid = Ulid::from_parts(created_at.timestamp_millis() as u64, rand::random());
        Self {
            id: ulid.to_string(),
            data: None,
            created_at,
            action: action.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    pub fn set_data(&mut self, data: Option<Vec<u8>>) {
        self.data = data;
    }
}

impl QueueJob for Job {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn action(&self) -> &str {
        &self.action
    }

    fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}
