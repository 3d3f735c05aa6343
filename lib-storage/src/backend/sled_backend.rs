//! Sled storage backend
//!
//! A persistent backend over an embedded sled database. Each [`SledTree`]
//! is an independent keyspace; the referral engine keeps all of its keys
//! in one tree so that guarded batches can span accounts, indexes and
//! ledger markers.
//!
//! Sled is synchronous, so every call runs on the blocking pool. Guarded
//! batches run as sled transactions: guards are read inside the
//! transaction and a failed guard aborts it without writing.

use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;
use tracing::{debug, info};

use super::traits::{
    validate_batch, validate_key, validate_value, BatchOp, Guard, Result, StorageBackend,
    StorageError,
};

/// Longest accepted tree name
pub const MAX_TREE_NAME_LENGTH: usize = 64;

/// Page cache size used by [`SledBackend::open`]
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

fn validate_tree_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty".to_string()
    } else if name.len() > MAX_TREE_NAME_LENGTH {
        format!("longer than {} characters", MAX_TREE_NAME_LENGTH)
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        "only ASCII letters, digits, '_' and '-' are allowed".to_string()
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidTreeName(format!("{:?}: {}", name, reason)))
}

/// Transaction abort marker for a guard that did not hold
#[derive(Debug)]
struct GuardFailed;

/// Handle to an open sled database
///
/// ```ignore
/// let backend = SledBackend::open("./data")?;
/// let referral = backend.open_tree("referral")?;
/// referral.put(b"acct/..", &bytes).await?;
/// ```
#[derive(Clone, Debug)]
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_cache(path, DEFAULT_CACHE_CAPACITY)
    }

    pub fn open_with_cache<P: AsRef<Path>>(path: P, cache_capacity: u64) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::Config::default()
            .path(path)
            .cache_capacity(cache_capacity)
            .open()
            .map_err(|e| StorageError::OpenFailed(format!("{}: {}", path.display(), e)))?;

        info!("Opened sled store at {}", path.display());
        Ok(Self { db })
    }

    /// In-memory database discarded on drop
    pub fn temporary() -> Result<Self> {
        sled::Config::default()
            .temporary(true)
            .open()
            .map(|db| Self { db })
            .map_err(|e| StorageError::OpenFailed(e.to_string()))
    }

    pub fn open_tree(&self, name: &str) -> Result<SledTree> {
        validate_tree_name(name)?;
        let tree = self
            .db
            .open_tree(name)
            .map_err(|e| StorageError::TreeFailed(e.to_string()))?;

        debug!("Opened sled tree {}", name);
        Ok(SledTree { tree })
    }
}

/// One keyspace of a [`SledBackend`]
#[derive(Clone, Debug)]
pub struct SledTree {
    tree: sled::Tree,
}

impl SledTree {
    /// Run `f` against the tree on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(sled::Tree) -> Result<T> + Send + 'static,
    {
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || f(tree))
            .await
            .map_err(|e| StorageError::TaskFailed(e.to_string()))?
    }
}

fn read_err(e: sled::Error) -> StorageError {
    StorageError::ReadFailed(e.to_string())
}

fn write_err(e: sled::Error) -> StorageError {
    StorageError::WriteFailed(e.to_string())
}

#[async_trait]
impl StorageBackend for SledTree {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        let (key, value) = (key.to_vec(), value.to_vec());

        self.blocking(move |tree| tree.insert(key, value).map(drop).map_err(write_err))
            .await
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let key = key.to_vec();

        self.blocking(move |tree| {
            Ok(tree.get(key).map_err(read_err)?.map(|v| v.to_vec()))
        })
        .await
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        let key = key.to_vec();

        self.blocking(move |tree| {
            tree.remove(key)
                .map(drop)
                .map_err(|e| StorageError::DeleteFailed(e.to_string()))
        })
        .await
    }

    async fn contains(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;
        let key = key.to_vec();

        self.blocking(move |tree| tree.contains_key(key).map_err(read_err)).await
    }

    async fn scan_prefix(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.to_vec();

        self.blocking(move |tree| {
            tree.scan_prefix(prefix)
                .take(limit.unwrap_or(usize::MAX))
                .map(|item| {
                    item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                        .map_err(|e| StorageError::ScanFailed(e.to_string()))
                })
                .collect()
        })
        .await
    }

    async fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let prefix = prefix.to_vec();

        self.blocking(move |tree| {
            tree.scan_prefix(prefix).keys().try_fold(0usize, |count, key| {
                key.map(|_| count + 1)
                    .map_err(|e| StorageError::ScanFailed(e.to_string()))
            })
        })
        .await
    }

    async fn write_batch(&self, ops: &[BatchOp]) -> Result<()> {
        validate_batch(&[], ops)?;
        let ops = ops.to_vec();

        self.blocking(move |tree| {
            let batch = ops.into_iter().fold(sled::Batch::default(), |mut batch, op| {
                match op {
                    BatchOp::Put { key, value } => batch.insert(key, value),
                    BatchOp::Delete { key } => batch.remove(key),
                }
                batch
            });
            tree.apply_batch(batch)
                .map_err(|e| StorageError::BatchFailed(e.to_string()))
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<()> {
        validate_key(key)?;
        if let Some(value) = new {
            validate_value(value)?;
        }
        let key = key.to_vec();
        let expected = expected.map(<[u8]>::to_vec);
        let new = new.map(<[u8]>::to_vec);

        self.blocking(move |tree| {
            tree.compare_and_swap(key, expected, new)
                .map_err(write_err)?
                .map_err(|_| StorageError::CasConflict)
        })
        .await
    }

    async fn write_batch_guarded(&self, guards: &[Guard], ops: &[BatchOp]) -> Result<()> {
        validate_batch(guards, ops)?;
        let guards = guards.to_vec();
        let ops = ops.to_vec();

        self.blocking(move |tree| {
            let outcome = tree.transaction(|tx| {
                for guard in &guards {
                    if !guard.holds(tx.get(guard.key())?.as_deref()) {
                        return Err(ConflictableTransactionError::Abort(GuardFailed));
                    }
                }
                for op in &ops {
                    match op {
                        BatchOp::Put { key, value } => {
                            tx.insert(key.as_slice(), value.as_slice())?;
                        }
                        BatchOp::Delete { key } => {
                            tx.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

            outcome.map_err(|e| match e {
                TransactionError::Abort(GuardFailed) => StorageError::CasConflict,
                TransactionError::Storage(e) => StorageError::BatchFailed(e.to_string()),
            })
        })
        .await
    }

    async fn flush(&self) -> Result<()> {
        self.blocking(|tree| {
            tree.flush()
                .map(drop)
                .map_err(|e| StorageError::FlushFailed(e.to_string()))
        })
        .await
    }

    fn backend_type(&self) -> &'static str {
        "sled"
    }
}
