//! Unit tests for CLI argument parsing

use clap::Parser;
use media_uploader::cli::{Cli, Commands, OutputFormat};
use media_uploader::upload::UploadConfig;
use media_uploader::Privacy;
use std::time::Duration;

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["media-uploader", "upload", "clip.mp4"]);

    assert_eq!(cli.output_format, OutputFormat::Human);
    assert_eq!(cli.poll_interval, Duration::from_secs(10));
    assert_eq!(cli.retry_delay, Duration::from_secs(60));
    assert_eq!(cli.max_retries, None, "retries are unbounded by default");
    assert_eq!(cli.upload_config(), UploadConfig::default());
}

#[test]
fn test_cli_respects_retry_flags() {
    let cli = Cli::parse_from([
        "media-uploader",
        "--poll-interval",
        "2.5",
        "--retry-delay",
        "5",
        "--max-retries",
        "3",
        "upload",
        "clip.mp4",
    ]);

    let config = cli.upload_config();
    assert_eq!(config.retry.poll_interval, Duration::from_millis(2500));
    assert_eq!(config.retry.retry_delay, Duration::from_secs(5));
    assert_eq!(config.retry.max_retries, Some(3));
}

#[test]
fn test_global_flags_accepted_after_subcommand() {
    let cli = Cli::parse_from([
        "media-uploader",
        "status",
        "clip.mp4",
        "--output-format",
        "json",
        "--upload-url",
        "https://upload.test/videos",
    ]);

    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.upload_url, "https://upload.test/videos");
    assert!(matches!(cli.command, Commands::Status(_)));
}

#[test]
fn test_upload_metadata_flags() {
    let cli = Cli::parse_from([
        "media-uploader",
        "upload",
        "clip.mp4",
        "--title",
        "Conference talk",
        "--description",
        "Recorded live",
        "--tags",
        "rust, async,,tokio",
        "--privacy",
        "unlisted",
    ]);
    let Commands::Upload(args) = cli.command else {
        panic!("expected upload command");
    };

    let metadata = args.metadata().unwrap();
    assert_eq!(metadata.snippet.title, "Conference talk");
    assert_eq!(metadata.snippet.description, "Recorded live");
    assert_eq!(metadata.snippet.tags, vec!["rust", "async", "tokio"]);
    assert_eq!(metadata.status.privacy_status, Privacy::Unlisted);
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(Cli::try_parse_from(["media-uploader", "upload", "a.mp4", "--privacy", "friends"]).is_err());
    assert!(Cli::try_parse_from(["media-uploader", "--retry-delay", "-1", "upload", "a.mp4"]).is_err());
    assert!(Cli::try_parse_from(["media-uploader", "--output-format", "xml", "status", "a.mp4"]).is_err());
    assert!(Cli::try_parse_from(["media-uploader", "upload"]).is_err());
    assert!(Cli::try_parse_from(["media-uploader", "--poll-interval", "1e30", "status", "a.mp4"]).is_err());
}

#[test]
fn test_blank_title_fails_validation() {
    let cli = Cli::parse_from(["media-uploader", "upload", "clip.mp4", "--title", "   "]);
    let Commands::Upload(args) = cli.command else {
        panic!("expected upload command");
    };
    assert!(args.metadata().is_err());
}
