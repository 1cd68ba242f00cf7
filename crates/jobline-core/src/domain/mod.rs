//! Domain model: the job entity and the events a queue emits about jobs.

pub mod events;
pub mod job;

pub use self::events::JobQueueEvent;
pub use self::job::{Job, QueueJob};
