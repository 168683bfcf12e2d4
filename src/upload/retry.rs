//! Retry classification and log message formatting
//!
//! The coordinator logs a retry line before every re-probe and a failure
//! summary with remediation hints when a run ends. Both are built here so the
//! wording stays consistent between the library logs and the CLI.

use super::UploadError;
use crate::transport::TransportError;
use std::time::Duration;

/// Classification of upload errors for user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request or connection timed out
    Timeout,
    /// Connection reset, aborted, or broken pipe
    ConnectionReset,
    /// Connection could not be established
    ConnectFailed,
    /// HTTP 401/403
    AuthFailed(u16),
    /// HTTP 404/410: the session no longer exists
    SessionExpired(u16),
    /// Other 4xx
    ClientError(u16),
    /// 5xx
    ServerError(u16),
    /// Source file missing or changed
    SourceProblem,
    /// Unparseable server reply
    MalformedResponse,
    /// Anything else
    Generic,
}

impl RetryErrorType {
    /// Classify an engine error
    pub fn from_upload_error(err: &UploadError) -> Self {
        match err {
            UploadError::Transport(e) | UploadError::RetriesExhausted(_, e) => {
                Self::from_transport_error(e)
            }
            UploadError::Protocol { status, .. } => match *status {
                401 | 403 => Self::AuthFailed(*status),
                404 | 410 => Self::SessionExpired(*status),
                s if s >= 500 => Self::ServerError(s),
                s => Self::ClientError(s),
            },
            UploadError::Source(_) | UploadError::SourceChanged { .. } => Self::SourceProblem,
            UploadError::MalformedRange(_)
            | UploadError::MissingLocation
            | UploadError::MalformedResponse(_) => Self::MalformedResponse,
            UploadError::Configuration(_) | UploadError::Session(_) | UploadError::Task(_) => {
                Self::Generic
            }
        }
    }

    /// Classify a transport error
    pub fn from_transport_error(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => Self::Timeout,
            TransportError::ConnectionReset(_) => Self::ConnectionReset,
            TransportError::Connect(_) => Self::ConnectFailed,
            TransportError::Body(_) | TransportError::Other(_) => Self::Generic,
        }
    }

    /// Short description used inside log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "network timeout",
            Self::ConnectionReset => "connection reset",
            Self::ConnectFailed => "connection failed",
            Self::AuthFailed(401) => "authentication failed (401)",
            Self::AuthFailed(403) => "permission denied (403)",
            Self::AuthFailed(_) => "authentication failed",
            Self::SessionExpired(_) => "upload session not found",
            Self::ClientError(_) => "request rejected",
            Self::ServerError(503) => "service unavailable",
            Self::ServerError(_) => "server error",
            Self::SourceProblem => "source file problem",
            Self::MalformedResponse => "malformed server response",
            Self::Generic => "upload error",
        }
    }

    /// Suggested remediation
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Timeout | Self::ConnectionReset => {
                "Check your network connection; the upload resumes where the server left off"
            }
            Self::ConnectFailed => "Verify internet connectivity, DNS resolution, and proxy settings",
            Self::AuthFailed(_) => "Refresh the access token and check the account's upload quota",
            Self::SessionExpired(_) => {
                "The session has expired; run `discard` on the file and upload again"
            }
            Self::ClientError(_) => "Review the upload metadata and file format",
            Self::ServerError(_) => "The service may be experiencing issues, try again later",
            Self::SourceProblem => {
                "Make sure the source file exists and has not changed since the upload started"
            }
            Self::MalformedResponse => "Try again later; if it persists, discard the session",
            Self::Generic => "Check the log output for details and try again",
        }
    }

    /// Whether the coordinator retries this class of error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionReset)
    }
}

/// Context for formatting retry messages
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Retry number (1-based)
    pub retry: u32,
    /// Retry cap, if any
    pub max_retries: Option<u32>,
    /// Type of error that triggered the retry
    pub error_type: RetryErrorType,
    /// Delay before the next probe
    pub delay: Duration,
    /// Source file being uploaded
    pub source: String,
    /// Original error message
    pub error_message: String,
    /// Session endpoint
    pub endpoint: String,
}

impl RetryContext {
    /// Build a context from the error that ended an attempt
    pub fn new(
        retry: u32,
        max_retries: Option<u32>,
        err: &UploadError,
        delay: Duration,
        source: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            retry,
            max_retries,
            error_type: RetryErrorType::from_upload_error(err),
            delay,
            source: source.into(),
            error_message: err.to_string(),
            endpoint: endpoint.into(),
        }
    }

    /// Context for a run that finished after `retry` retries
    pub fn succeeded(
        retry: u32,
        max_retries: Option<u32>,
        source: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            retry,
            max_retries,
            error_type: RetryErrorType::Generic,
            delay: Duration::ZERO,
            source: source.into(),
            error_message: String::new(),
            endpoint: endpoint.into(),
        }
    }

    fn attempts_display(&self) -> String {
        match self.max_retries {
            Some(max) => format!("{}/{}", self.retry, max),
            None => self.retry.to_string(),
        }
    }

    /// Retry line logged before waiting out the delay
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}) after {} - waiting {:.1} seconds...",
            self.attempts_display(),
            self.error_type.description(),
            self.delay.as_secs_f64()
        );
        if !self.source.is_empty() {
            message.push_str(&format!(" ({})", self.source));
        }
        message
    }

    /// Line logged when a retried upload finally succeeds
    pub fn format_success(&self) -> String {
        let mut message = format!(
            "Upload succeeded after {} {}",
            self.retry,
            if self.retry == 1 { "retry" } else { "retries" }
        );
        if !self.source.is_empty() {
            message.push_str(&format!(" ({})", self.source));
        }
        message
    }

    /// Final failure summary with suggestions
    pub fn format_failure(&self) -> String {
        let mut lines = Vec::new();
        if self.retry == 0 {
            lines.push("[FAILED] Upload failed".to_string());
        } else {
            lines.push(format!(
                "[FAILED] Upload failed after {} {}",
                self.retry,
                if self.retry == 1 { "retry" } else { "retries" }
            ));
        }
        lines.push(format!("  Last error: {}", self.error_message));

        let source = if self.source.is_empty() {
            "unknown"
        } else {
            &self.source
        };
        lines.push(format!("  Source: {source}"));
        lines.push(format!("  Session: {}", self.endpoint));
        lines.push("  Suggestions:".to_string());
        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }
        lines.join("\n")
    }

    /// Suggestions tailored to the error
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if let Some(max) = self.max_retries {
            if self.error_type.is_retryable() {
                suggestions.push(format!("Try increasing --max-retries (current: {max})"));
            }
        }
        suggestions.push("The session file is kept; rerun the same command to resume".to_string());
        suggestions
    }
}
