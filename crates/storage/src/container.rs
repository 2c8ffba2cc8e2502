//! Container-per-session backend.
//!
//! Each session owns a whole blob container; tearing the session down
//! deletes the container and everything in it.

use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::ObjectStoreBackend;
use crate::error::{Result, StorageError};

/// Raw blob-service operations the container backend is built on.
///
/// `create_container` reports an existing container as `NamespaceExists`;
/// reads and deletes of missing containers or blobs report `NotFound`.
pub trait BlobService: Send + Sync {
    fn create_container(&self, container: &str) -> Result<()>;
    fn put_blob(&self, container: &str, name: &str, data: &[u8]) -> Result<()>;
    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>>;
    fn delete_container(&self, container: &str) -> Result<()>;
}

/// Backend whose namespace is a container in a shared blob service.
pub struct ContainerBackend {
    service: Arc<dyn BlobService>,
    container: String,
}

impl ContainerBackend {
    pub fn new(service: Arc<dyn BlobService>, container: impl Into<String>) -> Self {
        Self {
            service,
            container: container.into(),
        }
    }
}

impl ObjectStoreBackend for ContainerBackend {
    fn namespace(&self) -> &str {
        &self.container
    }

    fn create_namespace(&self) -> Result<()> {
        match self.service.create_container(&self.container) {
            Ok(()) => {
                info!(container = %self.container, "created session container");
                Ok(())
            }
            Err(StorageError::NamespaceExists { .. }) => {
                debug!(container = %self.container, "container already exists, reusing it");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn put(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.service.put_blob(&self.container, key, payload)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.service
            .get_blob(&self.container, key)
            .map_err(|err| match err {
                StorageError::NotFound { .. } => StorageError::not_found(&self.container, key),
                other => other,
            })
    }

    fn delete_namespace(&self) -> Result<()> {
        match self.service.delete_container(&self.container) {
            Ok(()) => {
                info!(container = %self.container, "deleted session container");
                Ok(())
            }
            Err(StorageError::NotFound { .. }) => {
                debug!(container = %self.container, "container was never created");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobService;

    fn backend(service: &MemoryBlobService, name: &str) -> ContainerBackend {
        ContainerBackend::new(Arc::new(service.clone()), name)
    }

    #[test]
    fn test_create_is_idempotent() {
        let service = MemoryBlobService::new();
        let backend = backend(&service, "user-a-container");

        backend.create_namespace().unwrap();
        backend.put("k", b"payload").unwrap();
        backend.create_namespace().unwrap();

        assert_eq!(backend.get("k").unwrap(), b"payload");
        assert_eq!(service.container_count(), 1);
        assert_eq!(service.blob_count("user-a-container"), Some(1));
    }

    #[test]
    fn test_get_missing_container_is_not_found() {
        let service = MemoryBlobService::new();
        let backend = backend(&service, "user-missing-container");

        let err = backend.get("k").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_removes_everything() {
        let service = MemoryBlobService::new();
        let backend = backend(&service, "user-a-container");

        backend.create_namespace().unwrap();
        backend.put("one", b"1").unwrap();
        backend.put("two", b"2").unwrap();
        backend.delete_namespace().unwrap();

        assert_eq!(service.container_count(), 0);
        assert!(backend.get("one").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_without_create_is_noop() {
        let service = MemoryBlobService::new();
        let backend = backend(&service, "user-a-container");
        backend.delete_namespace().unwrap();
    }
}
