//! Per-session storage and the process-wide connector that opens sessions.

use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::azure::{AzureBlobService, AzureConnection};
use crate::backend::{
    container_namespace, data_file_key, prefix_namespace, ObjectStoreBackend, SessionId,
};
use crate::config::{required, BackendKind, StoreConfig};
use crate::container::{BlobService, ContainerBackend};
use crate::error::{Result, StorageError};
use crate::memory::MemoryBlobService;
use crate::prefix::{Bucket, PrefixBackend};
use crate::s3::{S3Bucket, S3Credentials};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One user's isolated slice of the object store.
///
/// The session owns its backend exclusively; the namespace is derived from
/// the session id and never changes.
pub struct StorageSession {
    session_id: SessionId,
    backend: Box<dyn ObjectStoreBackend>,
}

impl StorageSession {
    pub fn new(session_id: SessionId, backend: Box<dyn ObjectStoreBackend>) -> Self {
        Self {
            session_id,
            backend,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn namespace(&self) -> &str {
        self.backend.namespace()
    }

    /// Key the data file is uploaded under.
    pub fn data_file_key(&self) -> String {
        data_file_key(&self.session_id)
    }

    /// Store `payload` as the session's data file and return its key.
    ///
    /// Creates the namespace on first use; a previous upload is replaced.
    pub fn upload(&self, payload: &[u8]) -> Result<String> {
        self.backend.create_namespace()?;
        let key = self.data_file_key();
        self.backend.put(&key, payload)?;
        info!(
            session = %self.session_id,
            namespace = self.namespace(),
            key = %key,
            bytes = payload.len(),
            "uploaded data file"
        );
        Ok(key)
    }

    /// Fetch an object previously uploaded in this session.
    pub fn retrieve(&self, key: &str) -> Result<Vec<u8>> {
        self.backend.get(key)
    }

    /// Remove every object in the namespace and the namespace itself.
    pub fn teardown(&self) -> Result<()> {
        self.backend.delete_namespace()?;
        info!(session = %self.session_id, namespace = self.namespace(), "session torn down");
        Ok(())
    }
}

#[derive(Clone)]
enum Transport {
    Container(Arc<dyn BlobService>),
    Prefix(Arc<dyn Bucket>),
}

/// Shared, read-only handle to the store that sessions are opened on.
///
/// Clone it freely; all clones share one HTTP client and credential set.
#[derive(Clone)]
pub struct StoreConnector {
    transport: Transport,
}

impl StoreConnector {
    /// Build the transport described by `config`.
    ///
    /// Missing credentials for the selected backend are reported here.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => Ok(Self::container(Arc::new(MemoryBlobService::new()))),
            BackendKind::Container => {
                let conn = required(
                    &config.azure_connection_string,
                    "azure_connection_string (or AZURE_BLOB_CONNECTION_STRING)",
                )?;
                let connection = AzureConnection::parse(conn)?;
                let client = http_client(config)?;
                Ok(Self::container(Arc::new(AzureBlobService::new(
                    client, connection,
                ))))
            }
            BackendKind::Prefix => {
                let bucket = required(&config.s3_bucket, "s3_bucket")?;
                let credentials = S3Credentials {
                    access_key_id: required(
                        &config.s3_access_key_id,
                        "s3_access_key_id (or AWS_ACCESS_KEY_ID)",
                    )?
                    .to_string(),
                    secret_access_key: required(
                        &config.s3_secret_access_key,
                        "s3_secret_access_key (or AWS_SECRET_ACCESS_KEY)",
                    )?
                    .to_string(),
                    session_token: config.s3_session_token.clone(),
                    region: required(&config.s3_region, "s3_region (or AWS_REGION)")?.to_string(),
                };
                let client = http_client(config)?;
                let bucket = S3Bucket::new(
                    client,
                    config.s3_endpoint.as_deref(),
                    bucket,
                    credentials,
                )?;
                Ok(Self::prefix(Arc::new(bucket)))
            }
        }
    }

    /// Connector opening container-backed sessions on `service`.
    pub fn container(service: Arc<dyn BlobService>) -> Self {
        Self {
            transport: Transport::Container(service),
        }
    }

    /// Connector opening prefix-backed sessions in `bucket`.
    pub fn prefix(bucket: Arc<dyn Bucket>) -> Self {
        Self {
            transport: Transport::Prefix(bucket),
        }
    }

    /// Open a session under a freshly generated id.
    pub fn open_session(&self) -> StorageSession {
        self.open_session_with_id(SessionId::generate())
    }

    /// Open a session under an existing id, e.g. to resume one.
    pub fn open_session_with_id(&self, session_id: SessionId) -> StorageSession {
        let backend: Box<dyn ObjectStoreBackend> = match &self.transport {
            Transport::Container(service) => Box::new(ContainerBackend::new(
                Arc::clone(service),
                container_namespace(&session_id),
            )),
            Transport::Prefix(bucket) => Box::new(PrefixBackend::new(
                Arc::clone(bucket),
                prefix_namespace(&session_id),
            )),
        };
        StorageSession::new(session_id, backend)
    }
}

fn http_client(config: &StoreConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout.unwrap_or(DEFAULT_TIMEOUT))
        .build()
        .map_err(|err| StorageError::Config(format!("failed to build HTTP client: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBucket;

    #[test]
    fn test_upload_then_retrieve() {
        let connector = StoreConnector::container(Arc::new(MemoryBlobService::new()));
        let session = connector.open_session();

        let key = session.upload(b"a,b\n1,2\n").unwrap();
        assert_eq!(key, format!("{}_data_file", session.session_id()));
        assert_eq!(session.retrieve(&key).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_upload_overwrites() {
        let connector = StoreConnector::prefix(Arc::new(MemoryBucket::new("shared")));
        let session = connector.open_session();

        let first = session.upload(b"first").unwrap();
        let second = session.upload(b"second").unwrap();
        assert_eq!(first, second);
        assert_eq!(session.retrieve(&second).unwrap(), b"second");
    }

    #[test]
    fn test_namespace_follows_backend() {
        let id = SessionId::generate();
        let container = StoreConnector::container(Arc::new(MemoryBlobService::new()))
            .open_session_with_id(id);
        let prefix =
            StoreConnector::prefix(Arc::new(MemoryBucket::new("b"))).open_session_with_id(id);

        assert_eq!(container.namespace(), format!("user-{id}-container"));
        assert_eq!(prefix.namespace(), format!("user-{id}/"));
    }

    #[test]
    fn test_missing_credentials_fail_at_construction() {
        let config = StoreConfig::default();
        assert!(matches!(
            StoreConnector::from_config(&config),
            Err(StorageError::Config(_))
        ));

        let config = StoreConfig {
            backend: BackendKind::Prefix,
            s3_bucket: Some("b".to_string()),
            s3_region: Some("eu-west-1".to_string()),
            ..StoreConfig::default()
        };
        match StoreConnector::from_config(&config) {
            Err(StorageError::Config(msg)) => assert!(msg.contains("s3_access_key_id")),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected configuration error"),
        }
    }

    #[test]
    fn test_memory_backend_needs_no_credentials() {
        let connector = StoreConnector::from_config(&StoreConfig::memory()).unwrap();
        let session = connector.open_session();
        let key = session.upload(b"x").unwrap();
        assert_eq!(session.retrieve(&key).unwrap(), b"x");
    }
}
