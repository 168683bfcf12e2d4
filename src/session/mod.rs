//! Session side-car persistence
//!
//! A [`Session`] names one resumable upload: the server-assigned endpoint and
//! the declared byte length of the source. It is persisted next to the source
//! file so a later run can resume instead of starting over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod lock;
pub mod store;

pub use lock::UploadLock;
pub use store::{source_size, SessionStore, MAX_SESSION_FILE_SIZE, SESSION_EXTENSION};

/// One in-progress (or completable) resumable upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "url")]
    endpoint: String,
    #[serde(rename = "size")]
    total_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session, enforcing a non-empty endpoint and a non-zero size
    pub fn new(endpoint: impl Into<String>, total_size: u64) -> Result<Self, SessionError> {
        let session = Self {
            endpoint: endpoint.into(),
            total_size,
            created_at: Some(Utc::now()),
        };
        session.validate()?;
        Ok(session)
    }

    /// Server-assigned resumable upload URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Declared byte length of the source
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// When the session was opened, if recorded
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Check the persisted-form invariants
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.endpoint.trim().is_empty() {
            return Err(SessionError::Invalid("endpoint is empty".to_string()));
        }
        if self.total_size == 0 {
            return Err(SessionError::Invalid("total size is zero".to_string()));
        }
        Ok(())
    }
}

/// How a session was obtained for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Loaded from an existing side-car; the server must be probed first
    Resumed,
    /// Freshly created; the transfer starts at byte 0
    Created,
}

/// Errors related to session persistence
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session violates its invariants
    #[error("invalid session: {0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}
