//! Bundled retry strategies.
//!
//! - `HaltRetry`: stop the queue, keep the job at the front, wait for a manual `start()`
//! - `MaxAttemptsRetry`: retry immediately, up to N attempts per job id
//! - `BackoffRetry`: stop, then restart after an exponentially growing delay

mod backoff;
mod config;
mod halt;
mod max_attempts;

pub use backoff::BackoffRetry;
pub use config::RetryConfig;
pub use halt::HaltRetry;
pub use max_attempts::MaxAttemptsRetry;
