//! Integration tests for session storage on both backend variants.
//! Covers namespace isolation, idempotent creation, teardown and
//! propagation of transport failures.

use dtsim_storage::{
    BlobService, Bucket, MemoryBlobService, MemoryBucket, ObjectStoreBackend, SessionId,
    StorageError, StoreConnector,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Both connector flavours over fresh in-memory stores.
fn connectors() -> Vec<(&'static str, StoreConnector)> {
    vec![
        (
            "container",
            StoreConnector::container(Arc::new(MemoryBlobService::new())),
        ),
        (
            "prefix",
            StoreConnector::prefix(Arc::new(MemoryBucket::new("shared-uploads"))),
        ),
    ]
}

#[test]
fn test_sessions_cannot_read_each_other() {
    for (name, connector) in connectors() {
        let a = connector.open_session();
        let b = connector.open_session();

        let key_a = a.upload(b"session a data").unwrap();
        let key_b = b.upload(b"session b data").unwrap();

        assert_ne!(a.namespace(), b.namespace(), "{name}");
        assert!(
            b.retrieve(&key_a).unwrap_err().is_not_found(),
            "{name}: B must not see A's key"
        );
        assert!(
            a.retrieve(&key_b).unwrap_err().is_not_found(),
            "{name}: A must not see B's key"
        );
        assert_eq!(a.retrieve(&key_a).unwrap(), b"session a data", "{name}");
        assert_eq!(b.retrieve(&key_b).unwrap(), b"session b data", "{name}");
    }
}

#[test]
fn test_retrieve_after_teardown_is_not_found() {
    for (name, connector) in connectors() {
        let session = connector.open_session();
        let key = session.upload(b"rows").unwrap();

        session.teardown().unwrap();

        match session.retrieve(&key) {
            Err(StorageError::NotFound { namespace, key: missing }) => {
                assert_eq!(namespace, session.namespace(), "{name}");
                assert_eq!(missing, key, "{name}");
            }
            other => panic!("{name}: expected NotFound, got {other:?}"),
        }
    }
}

#[test]
fn test_retrieve_before_upload_is_not_found() {
    for (name, connector) in connectors() {
        let session = connector.open_session();
        let err = session.retrieve(&session.data_file_key()).unwrap_err();
        assert!(err.is_not_found(), "{name}");
    }
}

#[test]
fn test_teardown_only_touches_own_namespace() {
    for (name, connector) in connectors() {
        let a = connector.open_session();
        let b = connector.open_session();
        a.upload(b"a").unwrap();
        let key_b = b.upload(b"b").unwrap();

        a.teardown().unwrap();

        assert_eq!(b.retrieve(&key_b).unwrap(), b"b", "{name}");
    }
}

#[test]
fn test_upload_after_teardown_recreates_namespace() {
    for (name, connector) in connectors() {
        let session = connector.open_session();
        session.upload(b"old").unwrap();
        session.teardown().unwrap();

        let key = session.upload(b"new").unwrap();
        assert_eq!(session.retrieve(&key).unwrap(), b"new", "{name}");
    }
}

#[test]
fn test_double_create_keeps_data() {
    let service = MemoryBlobService::new();
    let connector = StoreConnector::container(Arc::new(service.clone()));
    let session = connector.open_session();

    let key = session.upload(b"payload").unwrap();
    // A second upload goes through create_namespace again.
    session.upload(b"payload").unwrap();

    assert_eq!(service.container_count(), 1);
    assert_eq!(service.blob_count(session.namespace()), Some(1));
    assert_eq!(session.retrieve(&key).unwrap(), b"payload");
}

#[test]
fn test_resumed_session_sees_same_data() {
    let connector = StoreConnector::prefix(Arc::new(MemoryBucket::new("shared")));
    let id = SessionId::generate();

    let key = connector.open_session_with_id(id).upload(b"kept").unwrap();
    let resumed = connector.open_session_with_id(id);

    assert_eq!(resumed.retrieve(&key).unwrap(), b"kept");
}

/// Blob service whose every call fails like an unreachable endpoint.
struct UnreachableBlobService;

impl BlobService for UnreachableBlobService {
    fn create_container(&self, container: &str) -> dtsim_storage::Result<()> {
        Err(StorageError::transport("create container", container, "connection refused"))
    }
    fn put_blob(&self, container: &str, _: &str, _: &[u8]) -> dtsim_storage::Result<()> {
        Err(StorageError::transport("upload blob", container, "connection refused"))
    }
    fn get_blob(&self, container: &str, _: &str) -> dtsim_storage::Result<Vec<u8>> {
        Err(StorageError::transport("download blob", container, "connection refused"))
    }
    fn delete_container(&self, container: &str) -> dtsim_storage::Result<()> {
        Err(StorageError::transport("delete container", container, "connection refused"))
    }
}

/// Bucket whose every call fails with an authorisation error.
struct ForbiddenBucket;

impl Bucket for ForbiddenBucket {
    fn bucket_name(&self) -> &str {
        "forbidden"
    }
    fn put_object(&self, _: &str, _: &[u8]) -> dtsim_storage::Result<()> {
        Err(StorageError::transport("put object", "forbidden", "HTTP 403"))
    }
    fn get_object(&self, _: &str) -> dtsim_storage::Result<Vec<u8>> {
        Err(StorageError::transport("get object", "forbidden", "HTTP 403"))
    }
    fn list_keys(&self, _: &str) -> dtsim_storage::Result<Vec<String>> {
        Err(StorageError::transport("list objects", "forbidden", "HTTP 403"))
    }
    fn delete_object(&self, _: &str) -> dtsim_storage::Result<()> {
        Err(StorageError::transport("delete object", "forbidden", "HTTP 403"))
    }
}

#[test]
fn test_transport_errors_propagate_on_both_backends() {
    let connectors = [
        StoreConnector::container(Arc::new(UnreachableBlobService)),
        StoreConnector::prefix(Arc::new(ForbiddenBucket)),
    ];

    for connector in connectors {
        let session = connector.open_session();
        let key = session.data_file_key();

        assert!(matches!(
            session.upload(b"x"),
            Err(StorageError::Transport { .. })
        ));
        assert!(matches!(
            session.retrieve(&key),
            Err(StorageError::Transport { .. })
        ));
        assert!(matches!(
            session.teardown(),
            Err(StorageError::Transport { .. })
        ));
    }
}

#[test]
fn test_backends_are_interchangeable_behind_trait() {
    let id = SessionId::generate();
    let backends: Vec<Box<dyn ObjectStoreBackend>> = vec![
        Box::new(dtsim_storage::ContainerBackend::new(
            Arc::new(MemoryBlobService::new()),
            dtsim_storage::container_namespace(&id),
        )),
        Box::new(dtsim_storage::PrefixBackend::new(
            Arc::new(MemoryBucket::new("b")),
            dtsim_storage::prefix_namespace(&id),
        )),
    ];

    for backend in backends {
        backend.create_namespace().unwrap();
        backend.create_namespace().unwrap();
        backend.put("k", b"v1").unwrap();
        backend.put("k", b"v2").unwrap();
        assert_eq!(backend.get("k").unwrap(), b"v2");
        backend.delete_namespace().unwrap();
        assert!(backend.get("k").unwrap_err().is_not_found());
    }
}

proptest! {
    #[test]
    fn prop_keys_never_cross_sessions(
        payload_a in prop::collection::vec(any::<u8>(), 0..64),
        payload_b in prop::collection::vec(any::<u8>(), 0..64),
        use_prefix in any::<bool>(),
    ) {
        let connector = if use_prefix {
            StoreConnector::prefix(Arc::new(MemoryBucket::new("shared")))
        } else {
            StoreConnector::container(Arc::new(MemoryBlobService::new()))
        };
        let a = connector.open_session();
        let b = connector.open_session();

        let key_a = a.upload(&payload_a).unwrap();
        let key_b = b.upload(&payload_b).unwrap();

        prop_assert!(b.retrieve(&key_a).unwrap_err().is_not_found());
        prop_assert!(a.retrieve(&key_b).unwrap_err().is_not_found());
        prop_assert_eq!(a.retrieve(&key_a).unwrap(), payload_a);
        prop_assert_eq!(b.retrieve(&key_b).unwrap(), payload_b);
    }
}
