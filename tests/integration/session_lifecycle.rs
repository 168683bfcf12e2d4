//! Session side-car lifecycle: creation, persistence, and locking

use crate::support::{content, fast_config, write_source, FakeUploadServer, TransferFault, SESSION_URL};
use media_uploader::session::SessionError;
use media_uploader::{Privacy, Session, SessionStore, UploadCoordinator, UploadError, VideoMetadata};
use std::sync::Arc;
use tempfile::TempDir;

fn metadata() -> VideoMetadata {
    VideoMetadata::new("clip", Privacy::Public)
}

#[tokio::test]
async fn test_session_is_persisted_before_transfer_fails() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let server = FakeUploadServer::new();
    server.push_transfer_fault(TransferFault::Status(400, "badRequest"));

    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    assert!(coordinator.upload(&metadata(), &source).await.is_err());

    let raw = std::fs::read_to_string(SessionStore::session_path(&source)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["url"], SESSION_URL);
    assert_eq!(json["size"], 1000);
}

#[tokio::test]
async fn test_failed_run_leaves_side_car_byte_identical() {
    let dir = TempDir::new().unwrap();
    let data = content(1000);
    let source = write_source(dir.path(), "clip.mp4", &data);
    let store = SessionStore::for_source(&source);
    store.save(&Session::new(SESSION_URL, 1000).unwrap()).unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let server = FakeUploadServer::with_partial(&data, 100);
    server.push_transfer_fault(TransferFault::Status(403, "forbidden"));

    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    assert!(coordinator.upload(&metadata(), &source).await.is_err());

    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn test_rejected_session_creation_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let server = FakeUploadServer::new();
    server.fail_create(401, "invalid credentials");

    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    let err = coordinator.upload(&metadata(), &source).await.unwrap_err();

    match err {
        UploadError::Protocol {
            operation,
            status,
            body,
        } => {
            assert_eq!(operation, "create session");
            assert_eq!(status, 401);
            assert_eq!(body, "invalid credentials");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(!SessionStore::session_path(&source).exists());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_missing_location_header() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let server = FakeUploadServer::new();
    server.omit_location();

    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    let err = coordinator.upload(&metadata(), &source).await.unwrap_err();

    assert!(matches!(err, UploadError::MissingLocation));
    assert!(!SessionStore::session_path(&source).exists());
}

#[tokio::test]
async fn test_malformed_side_car_starts_a_new_session() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));
    std::fs::write(SessionStore::session_path(&source), "{ not json").unwrap();

    let server = FakeUploadServer::new();
    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    coordinator.upload(&metadata(), &source).await.unwrap();

    assert_eq!(server.requests()[0].method, reqwest::Method::POST);
    assert!(!SessionStore::session_path(&source).exists());
}

#[tokio::test]
async fn test_missing_and_empty_sources_are_rejected() {
    let dir = TempDir::new().unwrap();
    let server = FakeUploadServer::new();
    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());

    let missing = dir.path().join("missing.mp4");
    let err = coordinator.upload(&metadata(), &missing).await.unwrap_err();
    assert!(matches!(err, UploadError::Source(_)));

    let empty = write_source(dir.path(), "empty.mp4", b"");
    let err = coordinator.upload(&metadata(), &empty).await.unwrap_err();
    assert!(matches!(err, UploadError::Source(_)));

    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_upload_url_is_rejected_before_any_request() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(10));
    let server = FakeUploadServer::new();

    let config = fast_config().with_upload_url("ftp://upload.test/videos");
    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), config);
    let err = coordinator.upload(&metadata(), &source).await.unwrap_err();

    assert!(matches!(err, UploadError::Configuration(_)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_concurrent_upload_of_same_source_is_refused() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let store = SessionStore::for_source(&source);
    let _held = store.lock().unwrap();

    let server = FakeUploadServer::new();
    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    let err = coordinator.upload(&metadata(), &source).await.unwrap_err();

    assert!(matches!(err, UploadError::Session(SessionError::Lock(_))));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_lock_is_released_after_a_run() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(100));

    let server = FakeUploadServer::new();
    let coordinator = UploadCoordinator::new(Arc::new(server.clone()), fast_config());
    coordinator.upload(&metadata(), &source).await.unwrap();

    assert!(SessionStore::for_source(&source).lock().is_ok());
}
