//! Storage backend trait, batch operations and guards.
//!
//! ## Example
//! ```rust,ignore
//! use lib_storage::backend::{BatchOp, Guard, StorageBackend};
//!
//! async fn move_counter<B: StorageBackend>(backend: &B, seen: Vec<u8>) -> lib_storage::Result<()> {
//!     backend.write_batch_guarded(
//!         &[Guard::equals(b"counter".to_vec(), seen)],
//!         &[BatchOp::put(b"counter".to_vec(), b"2".to_vec())],
//!     ).await
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database failed to open
    #[error("Database open failed: {0}")]
    OpenFailed(String),

    /// Write operation failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Read operation failed
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// Delete operation failed
    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// Batch operation failed
    #[error("Batch operation failed: {0}")]
    BatchFailed(String),

    /// Scan operation failed
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// Flush operation failed
    #[error("Flush failed: {0}")]
    FlushFailed(String),

    /// Tree operation failed
    #[error("Tree operation failed: {0}")]
    TreeFailed(String),

    /// A compare-and-swap or batch guard did not hold
    #[error("Compare-and-swap conflict: value was modified")]
    CasConflict,

    /// Key exceeds maximum allowed size
    #[error("Key exceeds maximum size of {max} bytes (got {actual})")]
    KeyTooLarge { max: usize, actual: usize },

    /// Value exceeds maximum allowed size
    #[error("Value exceeds maximum size of {max} bytes (got {actual})")]
    ValueTooLarge { max: usize, actual: usize },

    /// Empty key not allowed
    #[error("Empty keys are not allowed")]
    EmptyKey,

    /// Invalid tree name
    #[error("Invalid tree name: {0}")]
    InvalidTreeName(String),

    /// Batch exceeds limits
    #[error("Batch exceeds limits: {0}")]
    BatchTooLarge(String),

    /// Task execution failed
    #[error("Task execution failed: {0}")]
    TaskFailed(String),
}

impl StorageError {
    /// Whether the failure is an optimistic-concurrency conflict that a
    /// caller may resolve by re-reading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::CasConflict)
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Constants
// ============================================================================

/// Maximum key size (256 bytes)
pub const MAX_KEY_SIZE: usize = 256;

/// Maximum value size (10 MB)
pub const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum operations (guards + writes) per batch
pub const MAX_BATCH_OPS: usize = 10_000;

/// Maximum total batch size in bytes
pub const MAX_BATCH_SIZE: usize = 100 * 1024 * 1024; // 100 MB

// ============================================================================
// Batch Operations
// ============================================================================

/// Batch operation for atomic writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or update a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put { key: key.into(), value: value.into() }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOp::Delete { key: key.into() }
    }

    /// Get the size of this operation in bytes
    pub(crate) fn size(&self) -> usize {
        match self {
            BatchOp::Put { key, value } => key.len() + value.len(),
            BatchOp::Delete { key } => key.len(),
        }
    }
}

/// Precondition evaluated atomically together with a guarded batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The key must not exist
    Absent { key: Vec<u8> },
    /// The key must exist and hold exactly this value
    Equals { key: Vec<u8>, value: Vec<u8> },
}

impl Guard {
    pub fn absent(key: impl Into<Vec<u8>>) -> Self {
        Guard::Absent { key: key.into() }
    }

    pub fn equals(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Guard::Equals { key: key.into(), value: value.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Guard::Absent { key } | Guard::Equals { key, .. } => key,
        }
    }

    /// Check the guard against the current stored value
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        match (self, current) {
            (Guard::Absent { .. }, None) => true,
            (Guard::Equals { value, .. }, Some(current)) => value.as_slice() == current,
            _ => false,
        }
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            Guard::Absent { key } => key.len(),
            Guard::Equals { key, value } => key.len() + value.len(),
        }
    }
}

// ============================================================================
// Storage Backend Trait
// ============================================================================

/// Core storage backend trait
///
/// Defines the interface for key-value storage operations.
/// All implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or update a key-value pair
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Get a value by key, `None` if absent
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Delete a key (no error if absent)
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Check if a key exists
    async fn contains(&self, key: &[u8]) -> Result<bool>;

    /// Scan keys with a given prefix in lexicographic order
    ///
    /// `limit` of `None` returns every match.
    async fn scan_prefix(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Count keys with a given prefix without materializing values
    async fn count_prefix(&self, prefix: &[u8]) -> Result<usize>;

    /// Execute a batch of operations atomically
    async fn write_batch(&self, ops: &[BatchOp]) -> Result<()>;

    /// Atomically compare and swap a single value
    ///
    /// `expected` of `None` means the key must be absent, `new` of `None`
    /// deletes the key. Returns `StorageError::CasConflict` on mismatch.
    async fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<()>;

    /// Execute a batch only if every guard holds
    ///
    /// Guards and writes are evaluated as one atomic unit: either all guards
    /// hold and every op is applied, or `StorageError::CasConflict` is returned
    /// and nothing is written.
    async fn write_batch_guarded(&self, guards: &[Guard], ops: &[BatchOp]) -> Result<()>;

    /// Flush pending writes to durable storage
    async fn flush(&self) -> Result<()>;

    /// Short backend name for logs ("memory", "sled")
    fn backend_type(&self) -> &'static str;
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a key
pub(crate) fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(StorageError::KeyTooLarge {
            max: MAX_KEY_SIZE,
            actual: key.len(),
        });
    }
    Ok(())
}

/// Validate a value
pub(crate) fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge {
            max: MAX_VALUE_SIZE,
            actual: value.len(),
        });
    }
    Ok(())
}

/// Validate guards and batch operations together
pub(crate) fn validate_batch(guards: &[Guard], ops: &[BatchOp]) -> Result<()> {
    let count = guards.len() + ops.len();
    if count > MAX_BATCH_OPS {
        return Err(StorageError::BatchTooLarge(format!(
            "Batch has {} operations, max is {}",
            count, MAX_BATCH_OPS
        )));
    }

    let total_size: usize = ops.iter().map(BatchOp::size).sum::<usize>()
        + guards.iter().map(Guard::size).sum::<usize>();
    if total_size > MAX_BATCH_SIZE {
        return Err(StorageError::BatchTooLarge(format!(
            "Batch size {} bytes exceeds max {} bytes",
            total_size, MAX_BATCH_SIZE
        )));
    }

    for guard in guards {
        validate_key(guard.key())?;
        if let Guard::Equals { value, .. } = guard {
            validate_value(value)?;
        }
    }

    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                validate_key(key)?;
                validate_value(value)?;
            }
            BatchOp::Delete { key } => {
                validate_key(key)?;
            }
        }
    }

    Ok(())
}
