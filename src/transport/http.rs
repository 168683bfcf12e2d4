//! reqwest-backed transport
//!
//! Redirects are disabled: the resumable protocol answers an incomplete
//! upload with `308 Resume Incomplete`, which reqwest would otherwise treat as
//! a permanent redirect and follow.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Body, Client};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{RequestBody, Transport, TransportError, TransportRequest, TransportResponse};

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport with redirects disabled and the default connect timeout
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(concat!("media-uploader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(Arc::new(client)))
    }

    /// Wrap an existing client
    ///
    /// The client must not follow redirects, or 308 status replies never reach
    /// the engine.
    pub fn with_client(client: Arc<Client>) -> Self {
        Self {
            client,
            bearer_token: None,
        }
    }

    /// Attach an OAuth bearer token to every request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        debug!("{} {} ({} byte body)", method, url, body.len());

        let mut builder = self.client.request(method, &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder = match body {
            RequestBody::Empty => builder.body(Body::from(Vec::new())),
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::File { file, length } => {
                let stream = ReaderStream::new(file.take(length));
                builder.body(Body::wrap_stream(stream))
            }
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        debug!("{} -> {}", url, status);

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest error onto the closed transport taxonomy
///
/// Timeouts are recognised directly. Otherwise the source chain is searched
/// for an `io::Error`, which distinguishes resets from refused connections
/// even when hyper wraps them.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(err.to_string());
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return TransportError::from_io(io);
        }
        source = cause.source();
    }

    if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_body() || err.is_builder() {
        TransportError::Body(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
