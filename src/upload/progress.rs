//! Upload progress reporting
//!
//! The coordinator emits a [`ProgressUpdate`] for every probe result and once
//! more at terminal success. [`ProgressTracker`] turns that stream into a
//! transfer rate and an ETA for log lines and progress bars.

use std::time::{Duration, Instant};

/// Server-confirmed progress of one upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Bytes the server has confirmed
    pub bytes_confirmed: u64,
    /// Declared size of the upload
    pub total_size: u64,
}

impl ProgressUpdate {
    /// Create an update
    pub fn new(bytes_confirmed: u64, total_size: u64) -> Self {
        Self {
            bytes_confirmed,
            total_size,
        }
    }

    /// Update reporting the whole file as confirmed
    pub fn complete(total_size: u64) -> Self {
        Self::new(total_size, total_size)
    }

    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (self.bytes_confirmed as f64 / self.total_size as f64) * 100.0
    }

    /// Whether every byte is confirmed
    pub fn is_complete(&self) -> bool {
        self.bytes_confirmed >= self.total_size
    }
}

/// Rate and ETA estimation over a stream of progress updates
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_size: u64,
    baseline: Option<u64>,
    latest: u64,
    start_time: Instant,
}

impl ProgressTracker {
    /// Start tracking an upload of `total_size` bytes
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            baseline: None,
            latest: 0,
            start_time: Instant::now(),
        }
    }

    /// Record an update
    ///
    /// The first update sets the baseline, so bytes confirmed by an earlier
    /// run do not inflate the rate.
    pub fn record(&mut self, update: ProgressUpdate) {
        if self.baseline.is_none() {
            self.baseline = Some(update.bytes_confirmed);
            self.start_time = Instant::now();
        }
        self.latest = update.bytes_confirmed.min(self.total_size);
    }

    /// Latest confirmed byte count
    pub fn bytes_confirmed(&self) -> u64 {
        self.latest
    }

    /// Bytes per second since the baseline
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let sent = self.latest.saturating_sub(self.baseline.unwrap_or(0));
        if elapsed > 0.0 {
            sent as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Estimated time to finish at the current rate
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let rate = self.rate();
        let remaining = self.total_size.saturating_sub(self.latest);
        if rate > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        }
    }

    /// Human-readable progress string for logging
    pub fn format_progress(&self) -> String {
        let update = ProgressUpdate::new(self.latest, self.total_size);
        let mut parts = vec![format!(
            "[PROGRESS] Uploaded {} of {} - {:.1}% complete",
            format_bytes(self.latest),
            format_bytes(self.total_size),
            update.percentage()
        )];

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {}/s", format_bytes(rate as u64)));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Format a byte count with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
