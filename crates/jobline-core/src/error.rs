use thiserror::Error;

/// Failure of a persistence backend (load / persist / delete / clear).
///
/// The queue treats these as non-fatal during mutations: they are logged and
/// the in-memory list stays the source of truth.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence io: {0}")]
    Io(#[from] std::io::Error),

    #[error("job (de)serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no platform data directory available for persisted jobs")]
    NoDataDir,

    #[error("{0}")]
    Backend(String),
}

/// Error reported by a processor for one job.
///
/// Opaque to the queue: it is logged and handed to the retry strategy's
/// decision through the `FailedToProcess` path, nothing more.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// The initial load from the persister failed; the queue was not created.
    #[error("failed to load persisted jobs for queue={queue}: {source}")]
    Load {
        queue: String,
        #[source]
        source: PersistenceError,
    },

    #[error("failed to set up persistence: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
