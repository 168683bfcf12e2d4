//! Upload configuration

use super::UploadError;
use std::time::Duration;

/// Default resumable-upload endpoint
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status,contentDetails";

/// Default interval between progress probes while a transfer runs.
/// Large uploads run for hours; ten seconds is frequent enough for a progress
/// bar without adding noticeable request load.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default delay before re-probing after a transient failure
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Default timeout for control requests (session creation, probes)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default media type declared for the upload
pub const DEFAULT_CONTENT_TYPE: &str = "video/*";

/// Retry and polling schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Interval between progress probes during a transfer
    pub poll_interval: Duration,
    /// Fixed delay before re-probing after a transient failure
    pub retry_delay: Duration,
    /// Retry cap; `None` retries qualifying failures indefinitely
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// Whether another retry is allowed after `retries` have been used
    pub fn allows_retry(&self, retries: u32) -> bool {
        self.max_retries.map_or(true, |max| retries < max)
    }
}

/// Engine configuration, passed by value into the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Session-initiation URL
    pub upload_url: String,
    /// Retry and polling schedule
    pub retry: RetryPolicy,
    /// Media type declared on session creation and transfer
    pub content_type: String,
    /// Timeout for session creation and probes (transfers are unbounded)
    pub request_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            retry: RetryPolicy::default(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl UploadConfig {
    /// Override the session-initiation URL
    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the declared content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<(), UploadError> {
        let url = reqwest::Url::parse(&self.upload_url).map_err(|e| {
            UploadError::Configuration(format!("invalid upload URL {:?}: {e}", self.upload_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UploadError::Configuration(format!(
                "upload URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.retry.poll_interval.is_zero() {
            return Err(UploadError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.content_type.trim().is_empty() {
            return Err(UploadError::Configuration(
                "content type cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
