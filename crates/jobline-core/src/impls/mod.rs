//! Bundled JobPersister implementations.

mod file_persister;
mod memory_persister;
mod sanitize;

pub use file_persister::FileJobPersister;
pub use memory_persister::MemoryJobPersister;
pub use sanitize::sanitize;
