//! Upload coordinator
//!
//! Drives one upload to a terminal state. Each transfer attempt runs on a
//! spawned worker task that reports through a `oneshot` channel, while a
//! poller task probes the session every `poll_interval` and reports through
//! an `mpsc` channel. The control loop owns the session and all decisions;
//! the tasks only send immutable results.
//!
//! When an attempt resolves the poller is aborted and its receiver dropped
//! before anything else happens, so a probe result that was in flight can
//! never be applied after the attempt's outcome.

use super::config::UploadConfig;
use super::probe::{probe, ProbeStatus};
use super::progress::{ProgressTracker, ProgressUpdate};
use super::retry::RetryContext;
use super::transfer::transfer;
use super::{TransferOutcome, UploadError, UploadOutcome, UploadState};
use crate::metrics::{self, UploadMetrics};
use crate::session::{Session, SessionOrigin, SessionStore};
use crate::transport::Transport;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

type ProbeReport = Result<ProbeStatus, UploadError>;

/// Runs resumable uploads against a shared transport
pub struct UploadCoordinator {
    transport: Arc<dyn Transport>,
    config: UploadConfig,
    progress: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl UploadCoordinator {
    /// Create a coordinator
    pub fn new(transport: Arc<dyn Transport>, config: UploadConfig) -> Self {
        Self {
            transport,
            config,
            progress: None,
        }
    }

    /// Send progress updates to `sender`
    ///
    /// Updates arrive at probe cadence and once more, with every byte
    /// confirmed, when the upload completes.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload `source`, resuming its persisted session when one exists
    ///
    /// Holds the per-source upload lock for the whole run.
    pub async fn upload<M>(&self, metadata: &M, source: &Path) -> Result<UploadOutcome, UploadError>
    where
        M: Serialize + ?Sized,
    {
        self.config.validate()?;

        let store = SessionStore::for_source(source);
        let _lock = store.lock()?;

        let (session, origin) = store
            .open_or_create(self.transport.as_ref(), &self.config, metadata)
            .await?;

        self.run(session, origin, source).await
    }

    /// Drive an already-opened session to a terminal state
    ///
    /// On success the side-car is discarded. On failure it is left untouched
    /// so a later run can resume.
    pub async fn run(
        &self,
        session: Session,
        origin: SessionOrigin,
        source: &Path,
    ) -> Result<UploadOutcome, UploadError> {
        let store = SessionStore::for_source(source);
        let mut run = Run {
            state: UploadState::Idle,
            retries: 0,
            tracker: ProgressTracker::new(session.total_size()),
            metrics: UploadMetrics::start(source.display().to_string()),
        };

        info!(
            endpoint = session.endpoint(),
            total_size = session.total_size(),
            origin = ?origin,
            "Starting upload run"
        );

        let result = self.drive(&mut run, &session, origin, source).await;

        match &result {
            Ok(_) => {
                self.transition(&mut run, UploadState::Succeeded);
                self.emit(&mut run, ProgressUpdate::complete(session.total_size()));

                if let Err(e) = store.discard() {
                    warn!(path = %store.path().display(), error = %e, "Failed to discard session");
                }

                if run.retries > 0 {
                    let ctx = RetryContext::succeeded(
                        run.retries,
                        self.config.retry.max_retries,
                        source.display().to_string(),
                        session.endpoint(),
                    );
                    info!("{}", ctx.format_success());
                }
                run.metrics.record_success(session.total_size(), run.retries);
            }
            Err(e) => {
                self.transition(&mut run, UploadState::Failed);
                let ctx = RetryContext::new(
                    run.retries,
                    self.config.retry.max_retries,
                    e,
                    self.config.retry.retry_delay,
                    source.display().to_string(),
                    session.endpoint(),
                );
                debug!("{}", ctx.format_failure());
                run.metrics.record_failure(&e.to_string());
            }
        }

        result
    }

    async fn drive(
        &self,
        run: &mut Run,
        session: &Session,
        origin: SessionOrigin,
        source: &Path,
    ) -> Result<UploadOutcome, UploadError> {
        // A fresh session has nothing on the server yet; a resumed one must
        // ask where to continue.
        let mut next_start = match origin {
            SessionOrigin::Created => Some(0),
            SessionOrigin::Resumed => None,
        };
        // Only a re-probe after a failed attempt retries network errors; the
        // resume probe fails the run on any error.
        let mut after_failed_attempt = false;

        loop {
            let start = match next_start.take() {
                Some(start) => start,
                None => {
                    self.transition(run, UploadState::Probing);
                    let status = if after_failed_attempt {
                        self.probe_with_retry(run, session, source).await?
                    } else {
                        self.probe_once(session).await?
                    };
                    match status {
                        ProbeStatus::Complete => {
                            info!(endpoint = session.endpoint(), "Server reports upload already complete");
                            return Ok(UploadOutcome::AlreadyComplete);
                        }
                        ProbeStatus::Confirmed(last) => {
                            let update = ProgressUpdate::new(last + 1, session.total_size());
                            self.emit(run, update);
                            last + 1
                        }
                    }
                }
            };

            self.transition(run, UploadState::Transferring);
            match self.run_attempt(run, session, source, start).await {
                TransferOutcome::Success(resource) => {
                    info!(id = %resource.id, "Transfer finished");
                    return Ok(UploadOutcome::Uploaded(resource));
                }
                TransferOutcome::TransientFailure(err) if err.is_transient() => {
                    self.before_retry(run, session, source, UploadError::Transport(err))
                        .await?;
                    after_failed_attempt = true;
                }
                TransferOutcome::TransientFailure(err) => {
                    return Err(UploadError::Transport(err));
                }
                TransferOutcome::FatalFailure(err) => return Err(err),
            }
        }
    }

    async fn probe_once(&self, session: &Session) -> Result<ProbeStatus, UploadError> {
        let result = probe(
            self.transport.as_ref(),
            session,
            Some(self.config.request_timeout),
        )
        .await;
        metrics::record_probe(match &result {
            Ok(status) => probe_label(status),
            Err(_) => "error",
        });
        result
    }

    /// Probe, retrying transient network failures with the retry delay
    async fn probe_with_retry(
        &self,
        run: &mut Run,
        session: &Session,
        source: &Path,
    ) -> Result<ProbeStatus, UploadError> {
        loop {
            match self.probe_once(session).await {
                Err(e) if e.is_transient() => {
                    self.before_retry(run, session, source, e).await?;
                    self.transition(run, UploadState::Probing);
                }
                result => return result,
            }
        }
    }

    /// Account for a qualifying failure and wait out the retry delay
    async fn before_retry(
        &self,
        run: &mut Run,
        session: &Session,
        source: &Path,
        err: UploadError,
    ) -> Result<(), UploadError> {
        let policy = &self.config.retry;
        if !policy.allows_retry(run.retries) {
            return Err(match err {
                UploadError::Transport(e) => UploadError::RetriesExhausted(run.retries, e),
                other => other,
            });
        }

        run.retries += 1;
        self.transition(run, UploadState::Retrying);

        let ctx = RetryContext::new(
            run.retries,
            policy.max_retries,
            &err,
            policy.retry_delay,
            source.display().to_string(),
            session.endpoint(),
        );
        warn!(error = %err, "{}", ctx.format_retry());
        metrics::record_retry(policy.retry_delay, ctx.error_type.description());

        tokio::time::sleep(policy.retry_delay).await;
        Ok(())
    }

    /// One transfer attempt with concurrent progress polling
    async fn run_attempt(
        &self,
        run: &mut Run,
        session: &Session,
        source: &Path,
        start: u64,
    ) -> TransferOutcome {
        metrics::record_attempt(start);

        let (tx, mut rx) = oneshot::channel();
        let worker = {
            let transport = Arc::clone(&self.transport);
            let session = session.clone();
            let source: PathBuf = source.to_path_buf();
            let content_type = self.config.content_type.clone();
            tokio::spawn(async move {
                let outcome =
                    transfer(transport.as_ref(), &session, &source, start, &content_type).await;
                let _ = tx.send(outcome);
            })
        };

        let mut poller = ProgressPoller::spawn(
            Arc::clone(&self.transport),
            session.clone(),
            self.config.retry.poll_interval,
            self.config.request_timeout,
        );

        let outcome = loop {
            tokio::select! {
                biased;

                result = &mut rx => break result,
                Some(report) = poller.recv() => self.apply_poll(run, session, report),
            }
        };

        // Stop polling before the outcome is acted on.
        drop(poller);

        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = match worker.await {
                    Err(e) if e.is_panic() => "transfer worker panicked".to_string(),
                    Err(e) => format!("transfer worker failed: {e}"),
                    Ok(()) => "transfer worker exited without a result".to_string(),
                };
                TransferOutcome::FatalFailure(UploadError::Task(reason))
            }
        }
    }

    /// Apply an advisory probe result from the poller
    fn apply_poll(&self, run: &mut Run, session: &Session, report: ProbeReport) {
        match report {
            Ok(status) => {
                metrics::record_probe(probe_label(&status));
                let confirmed = status.bytes_confirmed(session.total_size());
                self.emit(run, ProgressUpdate::new(confirmed, session.total_size()));
            }
            Err(e) => {
                metrics::record_probe("error");
                debug!(error = %e, "Progress probe failed");
            }
        }
    }

    fn emit(&self, run: &mut Run, update: ProgressUpdate) {
        run.tracker.record(update);
        metrics::record_bytes_confirmed(update.bytes_confirmed);
        info!(
            bytes_confirmed = update.bytes_confirmed,
            total_size = update.total_size,
            "{}",
            run.tracker.format_progress()
        );

        if let Some(sender) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(update);
        }
    }

    fn transition(&self, run: &mut Run, next: UploadState) {
        debug!(from = %run.state, to = %next, "Upload state transition");
        run.state = next;
    }
}

/// Mutable bookkeeping for one run
struct Run {
    state: UploadState,
    retries: u32,
    tracker: ProgressTracker,
    metrics: UploadMetrics,
}

fn probe_label(status: &ProbeStatus) -> &'static str {
    match status {
        ProbeStatus::Confirmed(_) => "incomplete",
        ProbeStatus::Complete => "complete",
    }
}

/// Periodic progress probe task
///
/// The first probe fires one interval after spawn. Dropping the poller aborts
/// the task and closes the channel, discarding any result not yet received.
struct ProgressPoller {
    handle: JoinHandle<()>,
    rx: mpsc::Receiver<ProbeReport>,
}

impl ProgressPoller {
    fn spawn(
        transport: Arc<dyn Transport>,
        session: Session,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let report = probe(transport.as_ref(), &session, Some(timeout)).await;
                if tx.send(report).await.is_err() {
                    break;
                }
            }
        });
        Self { handle, rx }
    }

    async fn recv(&mut self) -> Option<ProbeReport> {
        self.rx.recv().await
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.handle.abort();
        self.rx.close();
    }
}
