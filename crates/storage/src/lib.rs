//! Session-isolated object storage.
//!
//! Each user session owns one namespace in an external object store: a
//! whole blob container, or a key prefix inside a shared bucket. Both
//! variants sit behind [`ObjectStoreBackend`] so callers never know which
//! one is active. A [`StorageSession`] uploads the session's data file,
//! retrieves it, and erases the namespace on teardown.

pub mod azure;
pub mod backend;
pub mod config;
pub mod container;
pub mod error;
pub mod memory;
pub mod prefix;
pub mod s3;
pub mod session;
mod signing;
pub mod state;

pub use backend::{
    container_namespace, data_file_key, prefix_namespace, ObjectStoreBackend, SessionId,
};
pub use config::{BackendKind, StoreConfig};
pub use container::{BlobService, ContainerBackend};
pub use error::{Result, StorageError};
pub use memory::{MemoryBlobService, MemoryBucket};
pub use prefix::{Bucket, PrefixBackend};
pub use session::{StorageSession, StoreConnector};
pub use state::SessionState;
