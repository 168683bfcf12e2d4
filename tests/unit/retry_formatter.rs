use std::time::Duration;

use media_uploader::transport::TransportError;
use media_uploader::upload::retry::{RetryContext, RetryErrorType};
use media_uploader::UploadError;

fn sample_context(err: &UploadError, max_retries: Option<u32>) -> RetryContext {
    RetryContext::new(
        2,
        max_retries,
        err,
        Duration::from_secs(60),
        "/videos/holiday.mp4",
        "https://upload.test/upload/session/abc",
    )
}

#[test]
fn format_retry_captures_attempt_and_wait() {
    let err = UploadError::Transport(TransportError::ConnectionReset("reset by peer".into()));
    let message = sample_context(&err, Some(5)).format_retry();

    assert!(message.contains("attempt 2/5"));
    assert!(message.contains("connection reset"));
    assert!(message.contains("60.0 seconds"));
    assert!(message.contains("holiday.mp4"));
}

#[test]
fn format_retry_without_cap_shows_bare_count() {
    let err = UploadError::Transport(TransportError::Timeout("timed out".into()));
    let message = sample_context(&err, None).format_retry();

    assert!(message.contains("attempt 2)"));
    assert!(message.contains("network timeout"));
}

#[test]
fn format_success_counts_retries() {
    let one = RetryContext::succeeded(1, None, "clip.mp4", "https://upload.test/s");
    assert!(one.format_success().contains("after 1 retry ("));

    let three = RetryContext::succeeded(3, Some(5), "clip.mp4", "https://upload.test/s");
    assert!(three.format_success().contains("after 3 retries"));
}

#[test]
fn format_failure_lists_context_and_suggestions() {
    let err = UploadError::RetriesExhausted(
        5,
        TransportError::Timeout("operation timed out".into()),
    );
    let ctx = RetryContext::new(
        5,
        Some(5),
        &err,
        Duration::from_secs(60),
        "/videos/holiday.mp4",
        "https://upload.test/upload/session/abc",
    );
    let output = ctx.format_failure();

    assert!(output.starts_with("[FAILED] Upload failed after 5 retries"));
    assert!(output.contains("operation timed out"));
    assert!(output.contains("Source: /videos/holiday.mp4"));
    assert!(output.contains("Session: https://upload.test/upload/session/abc"));
    assert!(output.contains("Check your network connection"));
    assert!(output.contains("--max-retries (current: 5)"));
    assert!(output.contains("rerun the same command to resume"));
}

#[test]
fn format_failure_without_retries_skips_cap_hint() {
    let err = UploadError::Protocol {
        operation: "transfer",
        status: 403,
        body: "quotaExceeded".into(),
    };
    let ctx = RetryContext::new(
        0,
        Some(5),
        &err,
        Duration::from_secs(60),
        "clip.mp4",
        "https://upload.test/s",
    );
    let output = ctx.format_failure();

    assert!(output.starts_with("[FAILED] Upload failed\n"));
    assert!(output.contains("quotaExceeded"));
    assert!(output.contains("Refresh the access token"));
    assert!(!output.contains("--max-retries"));
}

#[test]
fn error_classification() {
    let classify = |err: UploadError| RetryErrorType::from_upload_error(&err);

    assert_eq!(
        classify(UploadError::Transport(TransportError::Timeout("t".into()))),
        RetryErrorType::Timeout
    );
    assert_eq!(
        classify(UploadError::Transport(TransportError::Connect("c".into()))),
        RetryErrorType::ConnectFailed
    );
    assert_eq!(
        classify(UploadError::Protocol {
            operation: "status probe",
            status: 404,
            body: String::new()
        }),
        RetryErrorType::SessionExpired(404)
    );
    assert_eq!(
        classify(UploadError::MalformedRange("bytes=x".into())),
        RetryErrorType::MalformedResponse
    );
    assert_eq!(
        classify(UploadError::SourceChanged {
            expected: 10,
            actual: 9
        }),
        RetryErrorType::SourceProblem
    );
}
