//! Progress reporting while a transfer is in flight

use crate::support::{content, fast_config, write_source, FakeUploadServer};
use media_uploader::upload::{ProgressTracker, ProgressUpdate, RetryPolicy};
use media_uploader::{Privacy, UploadCoordinator, VideoMetadata};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn polling_config(interval: Duration) -> media_uploader::upload::UploadConfig {
    fast_config().with_retry(RetryPolicy {
        poll_interval: interval,
        retry_delay: Duration::from_millis(10),
        max_retries: None,
    })
}

#[tokio::test]
async fn test_poller_reports_partial_progress_during_transfer() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    // The server holds half the bytes for 300ms mid-transfer
    let server = FakeUploadServer::new().with_transfer_pause(Duration::from_millis(300));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = UploadCoordinator::new(
        Arc::new(server.clone()),
        polling_config(Duration::from_millis(40)),
    )
    .with_progress(tx);

    coordinator
        .upload(&VideoMetadata::new("clip", Privacy::Public), &source)
        .await
        .unwrap();
    drop(coordinator);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        updates.push(update);
    }

    assert!(
        updates.contains(&ProgressUpdate::new(500, 1000)),
        "expected a mid-transfer update, got {updates:?}"
    );
    assert_eq!(updates.last(), Some(&ProgressUpdate::complete(1000)));
    assert!(
        updates
            .windows(2)
            .all(|w| w[0].bytes_confirmed <= w[1].bytes_confirmed),
        "progress went backwards: {updates:?}"
    );
    assert!(!server.probes().is_empty());
}

#[tokio::test]
async fn test_polling_stops_when_the_attempt_resolves() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let server = FakeUploadServer::new().with_transfer_pause(Duration::from_millis(100));
    let coordinator = UploadCoordinator::new(
        Arc::new(server.clone()),
        polling_config(Duration::from_millis(20)),
    );

    coordinator
        .upload(&VideoMetadata::new("clip", Privacy::Public), &source)
        .await
        .unwrap();

    let probes_at_completion = server.probes().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.probes().len(), probes_at_completion);
}

#[tokio::test]
async fn test_progress_receiver_may_be_dropped() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), "clip.mp4", &content(1000));

    let server = FakeUploadServer::new();
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let coordinator =
        UploadCoordinator::new(Arc::new(server.clone()), fast_config()).with_progress(tx);
    assert!(coordinator
        .upload(&VideoMetadata::new("clip", Privacy::Public), &source)
        .await
        .is_ok());
}

#[test]
fn test_tracker_reports_percentage_and_clamps() {
    let mut tracker = ProgressTracker::new(2048);
    tracker.record(ProgressUpdate::new(1024, 2048));
    let line = tracker.format_progress();

    assert!(line.starts_with("[PROGRESS] Uploaded 1.0 KiB of 2.0 KiB - 50.0% complete"));

    tracker.record(ProgressUpdate::new(4096, 2048));
    assert_eq!(tracker.bytes_confirmed(), 2048);
    assert!(tracker.estimate_remaining().is_none());
}

