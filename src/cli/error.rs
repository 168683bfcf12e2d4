//! CLI error types and conversions

use crate::session::SessionError;
use crate::transport::TransportError;
use crate::upload::UploadError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Upload engine error
    #[error("upload error: {0}")]
    UploadError(#[from] UploadError),

    /// Session store error
    #[error("session error: {0}")]
    SessionError(#[from] SessionError),

    /// Transport construction error
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    /// An upload run ended in an error; `hint` says whether a rerun resumes
    #[error("upload failed: {source}{hint}")]
    UploadFailed {
        /// Engine error that ended the run
        source: UploadError,
        /// Resume hint appended to the message, or empty
        hint: &'static str,
    },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
