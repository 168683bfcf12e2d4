//! Logging and tracing setup

use crate::support::{content, fast_config, write_source, FakeUploadServer, TransferFault};
use media_uploader::{Privacy, UploadCoordinator, VideoMetadata};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

#[test]
fn test_tracing_subscriber_initialization() {
    // Another test may already have installed a global subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("media_uploader=debug"))
        .with_test_writer()
        .try_init();
}

#[test]
fn test_env_filter_directives_parse() {
    for directive in ["info", "media_uploader=debug", "warn,media_uploader=trace"] {
        assert!(
            directive.parse::<EnvFilter>().is_ok(),
            "{directive} should parse"
        );
    }
}

#[tokio::test]
async fn test_upload_with_retries_logs_under_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("media_uploader=trace"))
        .with_test_writer()
        .try_init();

    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(500));

    // Exercises the retry, progress, and success log paths end to end
    let server = FakeUploadServer::new();
    server.push_transfer_fault(TransferFault::Reset { accept: 100 });

    let coordinator = UploadCoordinator::new(Arc::new(server), fast_config());
    coordinator
        .upload(&VideoMetadata::new("clip", Privacy::Public), &source)
        .await
        .unwrap();
}
