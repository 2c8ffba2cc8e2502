//! In-process blob service and bucket.
//!
//! Handles are cheap to clone and share one underlying store, so several
//! sessions can be pointed at the same instance the way they would share a
//! remote account.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::container::BlobService;
use crate::error::{Result, StorageError};
use crate::prefix::Bucket;

type Container = BTreeMap<String, Vec<u8>>;

/// In-memory stand-in for a blob service account.
#[derive(Clone, Default)]
pub struct MemoryBlobService {
    containers: Arc<RwLock<BTreeMap<String, Container>>>,
}

impl MemoryBlobService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live containers.
    pub fn container_count(&self) -> usize {
        self.containers.read().len()
    }

    /// Number of blobs in `container`, `None` if it does not exist.
    pub fn blob_count(&self, container: &str) -> Option<usize> {
        self.containers.read().get(container).map(|c| c.len())
    }
}

impl BlobService for MemoryBlobService {
    fn create_container(&self, container: &str) -> Result<()> {
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return Err(StorageError::NamespaceExists {
                namespace: container.to_string(),
            });
        }
        containers.insert(container.to_string(), Container::new());
        Ok(())
    }

    fn put_blob(&self, container: &str, name: &str, data: &[u8]) -> Result<()> {
        let mut containers = self.containers.write();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::not_found(container, name))?;
        blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        self.containers
            .read()
            .get(container)
            .and_then(|blobs| blobs.get(name))
            .cloned()
            .ok_or_else(|| StorageError::not_found(container, name))
    }

    fn delete_container(&self, container: &str) -> Result<()> {
        self.containers
            .write()
            .remove(container)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(container, ""))
    }
}

/// In-memory stand-in for a shared bucket.
#[derive(Clone)]
pub struct MemoryBucket {
    name: String,
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBucket {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// All keys in the bucket, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

impl Bucket for MemoryBucket {
    fn bucket_name(&self) -> &str {
        &self.name
    }

    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        self.objects.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(&self.name, key))
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_twice_reports_exists() {
        let service = MemoryBlobService::new();
        service.create_container("c").unwrap();
        let err = service.create_container("c").unwrap_err();
        assert!(matches!(err, StorageError::NamespaceExists { .. }));
    }

    #[test]
    fn test_put_into_missing_container_fails() {
        let service = MemoryBlobService::new();
        assert!(service.put_blob("nope", "k", b"v").unwrap_err().is_not_found());
    }

    #[test]
    fn test_clones_share_state() {
        let service = MemoryBlobService::new();
        let other = service.clone();
        service.create_container("c").unwrap();
        other.put_blob("c", "k", b"v").unwrap();
        assert_eq!(service.get_blob("c", "k").unwrap(), b"v");
    }

    #[test]
    fn test_list_keys_by_prefix() {
        let bucket = MemoryBucket::new("b");
        bucket.put_object("user-a/x", b"1").unwrap();
        bucket.put_object("user-a/y", b"2").unwrap();
        bucket.put_object("user-b/x", b"3").unwrap();

        assert_eq!(
            bucket.list_keys("user-a/").unwrap(),
            vec!["user-a/x".to_string(), "user-a/y".to_string()]
        );
        assert!(bucket.list_keys("user-c/").unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_object_is_ok() {
        let bucket = MemoryBucket::new("b");
        bucket.delete_object("ghost").unwrap();
    }
}
