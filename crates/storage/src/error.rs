//! Error types for session storage.

use std::fmt::Display;
use thiserror::Error;

/// Errors returned by the object-store backends and the storage session.
///
/// Messages name the namespace, key and operation involved but never carry
/// credentials or signed URLs.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The namespace was already materialised. Backends absorb this inside
    /// `create_namespace`; it only escapes from the raw client traits.
    #[error("namespace {namespace} already exists")]
    NamespaceExists { namespace: String },

    /// No object under `key` in `namespace`.
    #[error("object {key} not found in namespace {namespace}")]
    NotFound { namespace: String, key: String },

    /// Network or authorisation failure reported by the object store.
    #[error("{operation} failed for namespace {namespace}: {message}")]
    Transport {
        operation: &'static str,
        namespace: String,
        message: String,
    },

    /// Missing or malformed connection settings.
    #[error("storage configuration error: {0}")]
    Config(String),

    /// A parse was requested before anything was uploaded.
    #[error("no data has been uploaded in this session")]
    NothingUploaded,
}

impl StorageError {
    pub fn transport(operation: &'static str, namespace: &str, message: impl Display) -> Self {
        Self::Transport {
            operation,
            namespace: namespace.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found(namespace: &str, key: &str) -> Self {
        Self::NotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<config::ConfigError> for StorageError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
