//! HTTP transport seam
//!
//! The upload engine never talks to an HTTP client directly. Every request goes
//! through a [`Transport`], which lets callers inject authentication, proxies,
//! or an in-memory fake for tests. Network-level failures are reported as a
//! closed [`TransportError`] taxonomy so retry decisions never inspect opaque
//! client error types.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Method, StatusCode};
use std::time::Duration;

pub mod http;

pub use http::HttpTransport;

/// Network-level transport errors (no HTTP status was received)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request or connection timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection was reset, aborted, or the pipe broke mid-request
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request body could not be produced
    #[error("request body error: {0}")]
    Body(String),

    /// Any other client failure
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this error belongs to the set that is retried after re-probing
    ///
    /// Only timeouts and connection resets qualify. Connect failures, body
    /// errors, and anything unclassified surface to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout(_) | TransportError::ConnectionReset(_)
        )
    }

    /// Classify an OS-level I/O error
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = err.to_string();
        match err.kind() {
            ErrorKind::TimedOut => TransportError::Timeout(message),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                TransportError::ConnectionReset(message)
            }
            ErrorKind::ConnectionRefused
            | ErrorKind::NotConnected
            | ErrorKind::AddrNotAvailable => TransportError::Connect(message),
            _ => TransportError::Other(message),
        }
    }
}

/// Body of an outbound request
#[derive(Debug, Default)]
pub enum RequestBody {
    /// No body (zero-length)
    #[default]
    Empty,
    /// In-memory JSON document
    Json(Vec<u8>),
    /// File contents streamed from the current position, `length` bytes
    File {
        /// Open file positioned at the first byte to send
        file: tokio::fs::File,
        /// Number of bytes to send
        length: u64,
    },
}

impl RequestBody {
    /// Declared length of the body in bytes
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Json(bytes) => bytes.len() as u64,
            RequestBody::File { length, .. } => *length,
        }
    }

    /// Whether the body is zero-length
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Request handed to a [`Transport`]
#[derive(Debug)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Request headers in insertion order
    pub headers: Vec<(HeaderName, String)>,
    /// Request body
    pub body: RequestBody,
    /// Per-request timeout (None: no limit beyond the client's own)
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Create a request with no headers and an empty body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    /// Append a header
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set a per-request timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up the first header value with the given name
    pub fn header_value(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Response returned by a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Fully buffered response body
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with no headers
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as (lossy) UTF-8 text, used for diagnostics
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes authenticated HTTP requests on behalf of the upload engine
///
/// Implementations must be safe for concurrent use: the transfer worker and
/// the progress poller share one transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and buffer the response
    ///
    /// Returns `Err` only when no HTTP response was received. Any status code,
    /// including 4xx/5xx, is an `Ok` response.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
