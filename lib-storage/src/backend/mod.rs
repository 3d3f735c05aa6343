//! Storage backend implementations
//!
//! - `MemoryBackend`: in-memory ordered map, for tests and single-process use
//! - `SledBackend` / `SledTree`: persistent sled database, for production
//!
//! Both honor the same atomicity contract: batches and guarded batches are
//! all-or-nothing as observed by any other reader.

pub mod traits;
pub mod memory;
pub mod sled_backend;

pub use traits::{
    BatchOp, Guard, Result, StorageBackend, StorageError, MAX_BATCH_OPS, MAX_KEY_SIZE,
    MAX_VALUE_SIZE,
};
pub use memory::MemoryBackend;
pub use sled_backend::{SledBackend, SledTree};
