//! Resumable upload engine
//!
//! - [`probe`] asks the server how many bytes it has confirmed
//! - [`transfer`] streams the remainder of the file in one PUT
//! - [`coordinator`] drives both, retrying qualifying transport failures

use crate::session::SessionError;
use crate::transport::TransportError;
use crate::RemoteResource;

pub mod config;
pub mod coordinator;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod transfer;

pub use config::{RetryPolicy, UploadConfig};
pub use coordinator::UploadCoordinator;
pub use probe::{parse_range_header, probe, ProbeStatus};
pub use progress::{ProgressTracker, ProgressUpdate};
pub use transfer::transfer;

/// Upload engine errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Invalid configuration (bad upload URL, unserializable metadata)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Source file missing, unreadable, or empty
    #[error("source file error: {0}")]
    Source(String),

    /// Source size differs from the size declared to the server
    #[error("source file changed: session declares {expected} bytes, file has {actual}")]
    SourceChanged {
        /// Size recorded in the session
        expected: u64,
        /// Current size on disk
        actual: u64,
    },

    /// Server rejected a request
    #[error("{operation} rejected with HTTP {status}: {body}")]
    Protocol {
        /// Request that failed
        operation: &'static str,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Unparseable or missing `Range` header on a resume-incomplete reply
    #[error("malformed Range header: {0}")]
    MalformedRange(String),

    /// Session-initiation reply carried no `Location` header
    #[error("session-initiation response has no Location header")]
    MissingLocation,

    /// Success reply whose body could not be decoded
    #[error("malformed response body: {0}")]
    MalformedResponse(String),

    /// Network-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session persistence failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Retry cap reached
    #[error("giving up after {0} retries: {1}")]
    RetriesExhausted(u32, TransportError),

    /// A spawned task panicked or was cancelled
    #[error("upload task failed: {0}")]
    Task(String),
}

impl UploadError {
    /// Whether the coordinator retries after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, UploadError::Transport(e) if e.is_transient())
    }
}

/// Result of one transfer attempt
#[derive(Debug)]
pub enum TransferOutcome {
    /// Upload finalized; the server returned the resource
    Success(RemoteResource),
    /// Network-level failure; the coordinator decides whether it qualifies
    TransientFailure(TransportError),
    /// Rejected or unusable; never retried
    FatalFailure(UploadError),
}

/// Terminal result of an upload run
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The transfer finished in this run
    Uploaded(RemoteResource),
    /// The server reported the upload as already finalized
    AlreadyComplete,
}

impl UploadOutcome {
    /// Resource returned by the server, if this run finalized the upload
    pub fn resource(&self) -> Option<&RemoteResource> {
        match self {
            UploadOutcome::Uploaded(resource) => Some(resource),
            UploadOutcome::AlreadyComplete => None,
        }
    }
}

/// Coordinator state, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Not started
    Idle,
    /// Asking the server for the confirmed offset
    Probing,
    /// PUT in flight
    Transferring,
    /// Waiting out the retry delay
    Retrying,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadState::Idle => "idle",
            UploadState::Probing => "probing",
            UploadState::Transferring => "transferring",
            UploadState::Retrying => "retrying",
            UploadState::Succeeded => "succeeded",
            UploadState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}
