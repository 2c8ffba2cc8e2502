//! Prefix-per-session backend.
//!
//! All sessions share one bucket; a session owns every key that starts with
//! its prefix. The prefix always ends with `/` so that no session prefix is a
//! prefix of another.

use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::ObjectStoreBackend;
use crate::error::{Result, StorageError};

/// Raw bucket operations the prefix backend is built on.
///
/// `get_object` reports a missing key as `NotFound`. `delete_object` on a
/// missing key succeeds.
pub trait Bucket: Send + Sync {
    fn bucket_name(&self) -> &str;
    fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
    fn delete_object(&self, key: &str) -> Result<()>;
}

/// Backend whose namespace is a key prefix inside a shared bucket.
pub struct PrefixBackend {
    bucket: Arc<dyn Bucket>,
    prefix: String,
}

impl PrefixBackend {
    pub fn new(bucket: Arc<dyn Bucket>, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { bucket, prefix }
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl ObjectStoreBackend for PrefixBackend {
    fn namespace(&self) -> &str {
        &self.prefix
    }

    fn create_namespace(&self) -> Result<()> {
        // Prefixes exist implicitly once an object is written under them.
        debug!(
            bucket = self.bucket.bucket_name(),
            prefix = %self.prefix,
            "prefix namespace ready"
        );
        Ok(())
    }

    fn put(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.bucket.put_object(&self.object_key(key), payload)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.bucket
            .get_object(&self.object_key(key))
            .map_err(|err| match err {
                StorageError::NotFound { .. } => StorageError::not_found(&self.prefix, key),
                other => other,
            })
    }

    fn delete_namespace(&self) -> Result<()> {
        let keys = self.bucket.list_keys(&self.prefix)?;
        let count = keys.len();
        for key in keys {
            self.bucket.delete_object(&key)?;
        }
        info!(
            bucket = self.bucket.bucket_name(),
            prefix = %self.prefix,
            objects = count,
            "deleted session prefix"
        );
        Ok(())
    }
}
