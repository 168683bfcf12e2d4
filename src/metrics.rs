//! Upload metrics
//!
//! Counters and gauges for attempts, retries, and probes, emitted through the
//! `metrics` facade. Without an installed recorder every call is a no-op; the
//! CLI installs a Prometheus exporter when `--metrics-addr` is given.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Install the Prometheus exporter and register metric descriptions
///
/// Idempotent: later calls are no-ops.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "upload_attempts_total",
        Unit::Count,
        "Transfer attempts started"
    );
    describe_counter!(
        "upload_retries_total",
        Unit::Count,
        "Retries after a transient transport failure"
    );
    describe_counter!(
        "upload_probes_total",
        Unit::Count,
        "Status probes issued, labelled by result"
    );
    describe_gauge!(
        "upload_bytes_confirmed",
        Unit::Bytes,
        "Bytes confirmed by the server for the current upload"
    );
    describe_histogram!(
        "upload_retry_delay_seconds",
        Unit::Seconds,
        "Delay applied before each retry"
    );
    describe_counter!(
        "uploads_completed_total",
        Unit::Count,
        "Uploads finished successfully"
    );
    describe_counter!(
        "uploads_failed_total",
        Unit::Count,
        "Uploads that ended in an error"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if the exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record the start of a transfer attempt
pub fn record_attempt(start_offset: u64) {
    let kind = if start_offset == 0 { "fresh" } else { "resume" };
    counter!("upload_attempts_total", "kind" => kind).increment(1);
}

/// Record a retry and its delay
pub fn record_retry(delay: Duration, reason: &'static str) {
    counter!("upload_retries_total", "reason" => reason).increment(1);
    histogram!("upload_retry_delay_seconds").record(delay.as_secs_f64());
}

/// Record a probe result (`incomplete`, `complete`, `error`)
pub fn record_probe(result: &'static str) {
    counter!("upload_probes_total", "result" => result).increment(1);
}

/// Record the latest server-confirmed byte count
pub fn record_bytes_confirmed(bytes: u64) {
    gauge!("upload_bytes_confirmed").set(bytes as f64);
}

/// Per-upload metrics
pub struct UploadMetrics {
    source: String,
    start_time: Instant,
}

impl UploadMetrics {
    /// Start tracking an upload
    pub fn start(source: impl Into<String>) -> Self {
        let source = source.into();
        info!(source = %source, "Upload started");
        Self {
            source,
            start_time: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn record_success(&self, total_size: u64, retries: u32) {
        counter!("uploads_completed_total").increment(1);
        info!(
            source = %self.source,
            total_size,
            retries,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Upload completed successfully"
        );
    }

    /// Record a failed upload
    pub fn record_failure(&self, error: &str) {
        counter!("uploads_failed_total").increment(1);
        debug!(
            source = %self.source,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Upload failed"
        );
    }
}
