//! CLI command implementations

pub mod error;
pub mod upload;

pub use error::CliError;
pub use upload::{Cli, Commands, DiscardArgs, OutputFormat, StatusArgs, UploadArgs};
