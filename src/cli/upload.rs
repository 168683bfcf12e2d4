//! Upload, status, and discard commands

use crate::session::SessionStore;
use crate::transport::HttpTransport;
use crate::upload::config::DEFAULT_UPLOAD_URL;
use crate::upload::progress::format_bytes;
use crate::upload::{
    probe, ProbeStatus, ProgressUpdate, RetryPolicy, UploadConfig, UploadCoordinator,
    UploadOutcome,
};
use crate::{Privacy, VideoMetadata};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::CliError;

/// Parse a duration given in (possibly fractional) seconds
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("'{s}' must be a non-negative number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{s}' is out of range: {e}"))
}

/// Media uploader CLI
#[derive(Parser, Debug)]
#[command(name = "media-uploader")]
#[command(about = "Upload large media files with resumable sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Session-initiation URL
    #[arg(long, global = true, default_value = DEFAULT_UPLOAD_URL)]
    pub upload_url: String,

    /// Seconds between progress probes while a transfer runs
    #[arg(long, global = true, value_parser = parse_seconds, default_value = "10")]
    pub poll_interval: Duration,

    /// Seconds to wait before re-probing after a timeout or connection reset
    #[arg(long, global = true, value_parser = parse_seconds, default_value = "60")]
    pub retry_delay: Duration,

    /// Give up after this many retries (default: retry indefinitely)
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// OAuth access token sent as a bearer credential
    #[arg(long, global = true, env = "UPLOAD_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Engine configuration from the global flags
    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig::default()
            .with_upload_url(self.upload_url.clone())
            .with_retry(RetryPolicy {
                poll_interval: self.poll_interval,
                retry_delay: self.retry_delay,
                max_retries: self.max_retries,
            })
    }

    /// HTTP transport carrying the access token, if one was given
    pub fn transport(&self) -> Result<HttpTransport, CliError> {
        let transport = HttpTransport::new()?;
        Ok(match &self.access_token {
            Some(token) if !token.trim().is_empty() => transport.with_bearer_token(token.trim()),
            _ => transport,
        })
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file, resuming its session if one exists
    Upload(UploadArgs),

    /// Show how much of a file the server has confirmed
    Status(StatusArgs),

    /// Remove a file's saved session so the next upload starts over
    Discard(DiscardArgs),
}

/// Arguments for the upload command
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Media file to upload
    pub file: PathBuf,

    /// Video title (default: the file name without extension)
    #[arg(long)]
    pub title: Option<String>,

    /// Video description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Tags (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Privacy setting: public, unlisted, or private
    #[arg(long, default_value = "public")]
    pub privacy: Privacy,
}

impl UploadArgs {
    /// Metadata sent with the session-initiation request
    pub fn metadata(&self) -> Result<VideoMetadata, CliError> {
        let title = match &self.title {
            Some(title) => title.clone(),
            None => self
                .file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let tags = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let metadata = VideoMetadata::new(title, self.privacy)
            .with_description(self.description.clone())
            .with_tags(tags);
        metadata.validate().map_err(CliError::InvalidArgument)?;
        Ok(metadata)
    }

    /// Execute the upload
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let metadata = self.metadata()?;
        let config = cli.upload_config();
        config.validate()?;

        let transport = Arc::new(cli.transport()?);
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = UploadCoordinator::new(transport, config).with_progress(tx);

        let renderer = match cli.output_format {
            OutputFormat::Human => Some(tokio::spawn(render_progress(
                rx,
                create_progress_bar(&self.file),
            ))),
            OutputFormat::Json => None,
        };

        info!(file = %self.file.display(), title = %metadata.snippet.title, "Uploading");
        let result = coordinator.upload(&metadata, &self.file).await;

        // Closes the progress channel so the renderer finishes.
        drop(coordinator);
        if let Some(renderer) = renderer {
            if let Ok(pb) = renderer.await {
                if result.is_ok() {
                    pb.finish();
                } else {
                    pb.abandon();
                }
            }
        }

        match cli.output_format {
            OutputFormat::Json => output_json(&self.file, &result),
            OutputFormat::Human => output_human(&self.file, &result),
        }

        result.map(|_| ()).map_err(|source| CliError::UploadFailed {
            hint: resume_hint(&self.file),
            source,
        })
    }
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Media file whose session to check
    pub file: PathBuf,
}

impl StatusArgs {
    /// Probe the saved session once and print the result
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = SessionStore::for_source(&self.file);
        let Some(session) = store.open()? else {
            match cli.output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "file": self.file.display().to_string(),
                        "session": null,
                    })
                ),
                OutputFormat::Human => {
                    println!("No active upload session for {}", self.file.display())
                }
            }
            return Ok(());
        };

        let transport = cli.transport()?;
        let config = cli.upload_config();
        let status = probe(&transport, &session, Some(config.request_timeout)).await?;
        let update = ProgressUpdate::new(
            status.bytes_confirmed(session.total_size()),
            session.total_size(),
        );

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "file": self.file.display().to_string(),
                    "session": session.endpoint(),
                    "complete": status == ProbeStatus::Complete,
                    "bytes_confirmed": update.bytes_confirmed,
                    "total_size": update.total_size,
                })
            ),
            OutputFormat::Human => match status {
                ProbeStatus::Complete => println!("Upload complete"),
                ProbeStatus::Confirmed(_) => println!(
                    "Progress: {}/{} bytes ({:.1}%)",
                    update.bytes_confirmed,
                    update.total_size,
                    update.percentage()
                ),
            },
        }
        Ok(())
    }
}

/// Arguments for the discard command
#[derive(Parser, Debug)]
pub struct DiscardArgs {
    /// Media file whose session to remove
    pub file: PathBuf,
}

impl DiscardArgs {
    /// Remove the saved session
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let store = SessionStore::for_source(&self.file);
        let _lock = store.lock()?;
        let existed = store.path().exists();
        store.discard()?;

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "file": self.file.display().to_string(),
                    "discarded": existed,
                })
            ),
            OutputFormat::Human if existed => {
                println!("Discarded upload session for {}", self.file.display())
            }
            OutputFormat::Human => {
                println!("No upload session for {}", self.file.display())
            }
        }
        Ok(())
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

fn output_json(file: &Path, result: &Result<UploadOutcome, crate::UploadError>) {
    let output = match result {
        Ok(outcome) => serde_json::json!({
            "success": true,
            "file": file.display().to_string(),
            "already_complete": matches!(outcome, UploadOutcome::AlreadyComplete),
            "resource": outcome.resource(),
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "file": file.display().to_string(),
            "error": e.to_string(),
        }),
    };
    println!("{output}");
}

fn output_human(file: &Path, result: &Result<UploadOutcome, crate::UploadError>) {
    match result {
        Ok(UploadOutcome::Uploaded(resource)) => {
            println!("\nUpload completed successfully!");
            println!("File: {}", file.display());
            println!("Video id: {}", resource.id);
        }
        Ok(UploadOutcome::AlreadyComplete) => {
            println!("\nUpload was already complete.");
            println!("File: {}", file.display());
        }
        // Reported once, by the caller, from the returned error.
        Err(_) => {}
    }
}

/// Resume hint for a failed run, only when a side-car survived it
fn resume_hint(file: &Path) -> &'static str {
    if SessionStore::session_path(file).exists() {
        "; the session was kept, run the same command again to resume"
    } else {
        ""
    }
}

/// Create a byte progress bar for `file`
fn create_progress_bar(file: &Path) -> ProgressBar {
    let total = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Uploading {name}"));
    pb
}

async fn render_progress(
    mut rx: mpsc::UnboundedReceiver<ProgressUpdate>,
    pb: ProgressBar,
) -> ProgressBar {
    while let Some(update) = rx.recv().await {
        pb.set_length(update.total_size);
        pb.set_position(update.bytes_confirmed);
        if !update.is_complete() {
            pb.set_message(format!(
                "{} of {} confirmed",
                format_bytes(update.bytes_confirmed),
                format_bytes(update.total_size)
            ));
        }
    }
    pb
}
