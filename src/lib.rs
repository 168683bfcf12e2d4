//! # Media Uploader Library
//!
//! Uploads large media files with the HTTP resumable-upload protocol. A session
//! is opened against a fixed upload endpoint, the file is streamed with a single
//! PUT per attempt, and the session is persisted next to the source file so an
//! interrupted upload can continue after a restart or a dropped connection.
//!
//! ## Features
//!
//! - **Session persistence**: a JSON side-car (`<file>.session`) written atomically
//! - **Authoritative resume**: the server's confirmed byte range decides where to continue
//! - **Retry loop**: timeouts and connection resets are retried after a fixed delay
//! - **Live progress**: a periodic status probe reports confirmed bytes while the PUT runs
//! - **Pluggable transport**: any [`transport::Transport`] can carry the requests
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use media_uploader::transport::HttpTransport;
//! use media_uploader::upload::{UploadConfig, UploadCoordinator};
//! use media_uploader::{Privacy, VideoMetadata};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new()?.with_bearer_token("ya29.token"));
//! let metadata = VideoMetadata::new("Holiday", Privacy::Unlisted);
//!
//! let coordinator = UploadCoordinator::new(transport, UploadConfig::default());
//! let outcome = coordinator
//!     .upload(&metadata, Path::new("./holiday.mp4"))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - the HTTP execution seam and its reqwest implementation
//! - [`session`] - session side-car persistence and the per-file upload lock
//! - [`upload`] - status probe, transfer executor, and the retrying coordinator
//! - [`metrics`] - counters and gauges for attempts, retries, and probes
//! - [`cli`] - command-line front end

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Upload metrics
pub mod metrics;

/// Session side-car persistence
pub mod session;

/// HTTP transport seam
pub mod transport;

/// Resumable upload engine
pub mod upload;

pub use session::{Session, SessionStore};
pub use upload::{UploadCoordinator, UploadError, UploadOutcome};

/// Privacy setting of an uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Visible to everyone
    #[default]
    Public,
    /// Reachable by link only
    Unlisted,
    /// Visible to the owner only
    Private,
}

impl std::fmt::Display for Privacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Privacy::Public),
            "unlisted" => Ok(Privacy::Unlisted),
            "private" => Ok(Privacy::Private),
            _ => Err(format!(
                "Invalid privacy setting: {s}. Valid options: public, unlisted, private"
            )),
        }
    }
}

/// Descriptive part of the upload metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    /// Video title
    pub title: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Search tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Numeric category identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u32>,
}

/// Visibility and licensing part of the upload metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Privacy setting
    pub privacy_status: Privacy,
    /// Whether the video may be embedded elsewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddable: Option<bool>,
    /// License identifier (e.g. "youtube", "creativeCommon")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// Metadata sent with the session-initiation request
///
/// The engine treats this as an opaque serializable payload; any other
/// `Serialize` value can be passed in its place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Descriptive fields
    pub snippet: Snippet,
    /// Visibility fields
    pub status: Status,
}

impl VideoMetadata {
    /// Create metadata with a title and privacy setting
    pub fn new(title: impl Into<String>, privacy: Privacy) -> Self {
        Self {
            snippet: Snippet {
                title: title.into(),
                ..Snippet::default()
            },
            status: Status {
                privacy_status: privacy,
                ..Status::default()
            },
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.snippet.description = description.into();
        self
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snippet.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Validate metadata before a session is opened
    pub fn validate(&self) -> Result<(), String> {
        if self.snippet.title.trim().is_empty() {
            return Err("Title cannot be empty".to_string());
        }

        if self.snippet.title.chars().count() > 100 {
            return Err(format!(
                "Title must be at most 100 characters, got {}",
                self.snippet.title.chars().count()
            ));
        }

        if self.snippet.title.contains(['<', '>']) {
            return Err("Title cannot contain '<' or '>'".to_string());
        }

        Ok(())
    }
}

/// Finalized remote resource returned by a completed upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Server-assigned resource id
    #[serde(default)]
    pub id: String,
    /// Resource kind (e.g. "youtube#video")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// All remaining fields, preserved as returned
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}
