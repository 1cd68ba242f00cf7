//! Queue configuration loaded from JSON.
//!
//! ```json
//! {
//!   "name": "uploads",
//!   "persistence": { "kind": "file", "root": "/var/lib/uploads" },
//!   "retry": { "strategy": "max_attempts", "max_attempts": 3 },
//!   "autostart": true
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Start processing right after the queue is built.
    #[serde(default)]
    pub autostart: bool,
}

/// Where a queue mirrors its pending jobs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistenceConfig {
    /// In-memory only.
    #[default]
    None,

    /// `MemoryJobPersister`.
    Memory,

    /// `FileJobPersister`; the platform data directory when `root` is absent.
    File {
        #[serde(default)]
        root: Option<PathBuf>,
    },
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persistence: PersistenceConfig::default(),
            retry: RetryConfig::default(),
            autostart: false,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
