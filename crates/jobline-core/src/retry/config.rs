use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::QueueJob;
use crate::ports::RetryStrategy;

use super::backoff::{DEFAULT_MAX_BACKOFF, DEFAULT_UNIT};
use super::max_attempts::DEFAULT_MAX_ATTEMPTS;
use super::{BackoffRetry, HaltRetry, MaxAttemptsRetry};

/// Retry strategy selection as it appears in a queue config file.
///
/// ```json
/// { "strategy": "backoff", "max_backoff_secs": 600, "unit_millis": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryConfig {
    /// Failed jobs are purged after one attempt.
    #[default]
    None,
    Halt,
    MaxAttempts {
        #[serde(default = "default_max_attempts")]
        max_attempts: u32,
    },
    Backoff {
        #[serde(default = "default_max_backoff_secs")]
        max_backoff_secs: u64,
        #[serde(default = "default_unit_millis")]
        unit_millis: u64,
    },
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_max_backoff_secs() -> u64 {
    DEFAULT_MAX_BACKOFF.as_secs()
}

fn default_unit_millis() -> u64 {
    DEFAULT_UNIT.as_millis() as u64
}

impl RetryConfig {
    pub fn build<J: QueueJob>(&self) -> Option<Arc<dyn RetryStrategy<J>>> {
        match *self {
            RetryConfig::None => None,
            RetryConfig::Halt => Some(Arc::new(HaltRetry)),
            RetryConfig::MaxAttempts { max_attempts } => {
                Some(Arc::new(MaxAttemptsRetry::new(max_attempts)))
            }
            RetryConfig::Backoff {
                max_backoff_secs,
                unit_millis,
            } => Some(Arc::new(BackoffRetry::with_unit(
                Duration::from_millis(unit_millis),
                Duration::from_secs(max_backoff_secs),
            ))),
        }
    }
}
