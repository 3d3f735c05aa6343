//! In-memory backend for tests, development and single-process deployments
//!
//! All data is lost on process termination.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::traits::{
    validate_batch, validate_key, validate_value, BatchOp, Guard, Result, StorageBackend,
    StorageError,
};

/// In-memory ordered map backend
///
/// Thread-safe `BTreeMap` wrapped in `Arc<RwLock>`; clones share the same data.
/// Guarded batches are evaluated and applied under one write lock.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    storage: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.read().is_empty()
    }
}

fn apply_ops(storage: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: &[BatchOp]) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                storage.insert(key.clone(), value.clone());
            }
            BatchOp::Delete { key } => {
                storage.remove(key);
            }
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.storage.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.storage.read().get(key).cloned())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.storage.write().remove(key);
        Ok(())
    }

    async fn contains(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;
        Ok(self.storage.read().contains_key(key))
    }

    async fn scan_prefix(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let storage = self.storage.read();
        let max = limit.unwrap_or(usize::MAX);
        Ok(storage
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(max)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let storage = self.storage.read();
        Ok(storage
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .count())
    }

    async fn write_batch(&self, ops: &[BatchOp]) -> Result<()> {
        validate_batch(&[], ops)?;
        let mut storage = self.storage.write();
        apply_ops(&mut storage, ops);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<()> {
        validate_key(key)?;
        if let Some(v) = new {
            validate_value(v)?;
        }

        let mut storage = self.storage.write();
        if storage.get(key).map(Vec::as_slice) != expected {
            return Err(StorageError::CasConflict);
        }
        match new {
            Some(v) => {
                storage.insert(key.to_vec(), v.to_vec());
            }
            None => {
                storage.remove(key);
            }
        }
        Ok(())
    }

    async fn write_batch_guarded(&self, guards: &[Guard], ops: &[BatchOp]) -> Result<()> {
        validate_batch(guards, ops)?;

        let mut storage = self.storage.write();
        for guard in guards {
            if !guard.holds(storage.get(guard.key()).map(Vec::as_slice)) {
                return Err(StorageError::CasConflict);
            }
        }
        apply_ops(&mut storage, ops);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // No-op for in-memory storage
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = MemoryBackend::new();
        backend.put(b"key1", b"value1").await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), Some(b"value1".to_vec()));

        backend.delete(b"key1").await.unwrap();
        assert_eq!(backend.get(b"key1").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_scan_prefix_is_ordered_and_bounded() {
        let backend = MemoryBackend::new();
        backend.put(b"user:2", b"b").await.unwrap();
        backend.put(b"user:1", b"a").await.unwrap();
        backend.put(b"user:3", b"c").await.unwrap();
        backend.put(b"userx", b"not-a-match").await.unwrap();
        backend.put(b"peer:1", b"p").await.unwrap();

        let users = backend.scan_prefix(b"user:", None).await.unwrap();
        let keys: Vec<&[u8]> = users.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"user:1".as_slice(), b"user:2".as_slice(), b"user:3".as_slice()]);

        assert_eq!(backend.scan_prefix(b"user:", Some(2)).await.unwrap().len(), 2);
        assert_eq!(backend.count_prefix(b"user:").await.unwrap(), 3);
        assert_eq!(backend.count_prefix(b"none:").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let backend = MemoryBackend::new();

        backend.compare_and_swap(b"cas", None, Some(b"1")).await.unwrap();
        assert!(matches!(
            backend.compare_and_swap(b"cas", None, Some(b"2")).await,
            Err(StorageError::CasConflict)
        ));
        backend.compare_and_swap(b"cas", Some(b"1"), Some(b"2")).await.unwrap();
        assert_eq!(backend.get(b"cas").await.unwrap(), Some(b"2".to_vec()));

        backend.compare_and_swap(b"cas", Some(b"2"), None).await.unwrap();
        assert!(!backend.contains(b"cas").await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_batch_applies_nothing_on_conflict() {
        let backend = MemoryBackend::new();
        backend.put(b"a", b"1").await.unwrap();
        backend.put(b"b", b"1").await.unwrap();

        let result = backend
            .write_batch_guarded(
                &[Guard::equals(b"a".to_vec(), b"1".to_vec()), Guard::equals(b"b".to_vec(), b"stale".to_vec())],
                &[BatchOp::put(b"a".to_vec(), b"2".to_vec()), BatchOp::put(b"b".to_vec(), b"2".to_vec())],
            )
            .await;

        assert!(matches!(result, Err(StorageError::CasConflict)));
        assert_eq!(backend.get(b"a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get(b"b").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        clone.put(b"shared", b"yes").await.unwrap();
        assert_eq!(backend.get(b"shared").await.unwrap(), Some(b"yes".to_vec()));
        assert_eq!(backend.len(), 1);
    }
}
