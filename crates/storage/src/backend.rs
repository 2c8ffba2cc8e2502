//! Namespaced object-store capability shared by every backend variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Opaque per-session token. Generated once and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random session identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Container name owned by a session on the container backend.
pub fn container_namespace(session_id: &SessionId) -> String {
    format!("user-{session_id}-container")
}

/// Key prefix owned by a session inside the shared bucket.
pub fn prefix_namespace(session_id: &SessionId) -> String {
    format!("user-{session_id}/")
}

/// Key of the session's current data file.
pub fn data_file_key(session_id: &SessionId) -> String {
    format!("{session_id}_data_file")
}

/// Uniform capability over one session namespace.
///
/// Implementations are bound to a single namespace at construction. Every
/// call is a blocking round trip to the store; nothing is cached.
pub trait ObjectStoreBackend: Send + Sync {
    /// Name of the namespace this backend is bound to.
    fn namespace(&self) -> &str;

    /// Materialise the namespace. Succeeds when it already exists.
    fn create_namespace(&self) -> Result<()>;

    /// Write `payload` under `key`, replacing any previous object.
    fn put(&self, key: &str, payload: &[u8]) -> Result<()>;

    /// Read the object under `key`. Missing objects yield `NotFound`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove every object in the namespace and the namespace itself.
    fn delete_namespace(&self) -> Result<()>;
}
