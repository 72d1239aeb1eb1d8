//! Diagnosis polling: follow one analysis until it reaches a terminal state.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend analyses uploaded radiographs asynchronously and offers no
//! push channel, so a view that shows a diagnosis in progress polls
//! `GET /ai/diagnosis/{id}/` until the status is `completed` or `failed`.
//!
//! DESIGN
//! ======
//! One spawned task per poll, owned by a [`PollHandle`]. The task sleeps
//! and fetches sequentially, so there is never more than one pending timer
//! or in-flight fetch for a poll. Every wait and every fetch races the
//! cancel signal in a `biased` select, so once [`PollHandle::cancel`] (or
//! drop) has run, no further fetch starts. Observed states are published on
//! a `watch` channel; the latest value wins.
//!
//! [`Poller`] is the per-view controller: starting a new poll always
//! cancels the previous one first.
//!
//! ERROR HANDLING
//! ==============
//! Retryable failures (transport, 408/429/5xx) are retried with capped
//! exponential backoff plus jitter, up to `max_retries` consecutive times.
//! Anything else, including an expired session, ends the poll with
//! [`PollState::Error`] immediately.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PollConfig;
use crate::error::ApiError;
use crate::models::{Diagnosis, DiagnosisId, DiagnosisStatus};

// =============================================================================
// SOURCE
// =============================================================================

/// Anything that can fetch the current state of a diagnosis. Implemented by
/// [`crate::ApiClient`]; tests supply scripted sources.
#[async_trait::async_trait]
pub trait DiagnosisSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the diagnosis cannot be fetched.
    async fn fetch_diagnosis(&self, id: DiagnosisId) -> Result<Diagnosis, ApiError>;
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone)]
pub enum PollState {
    /// Spawned, first fetch not answered yet.
    Starting,
    /// Latest non-terminal observation.
    InProgress(Diagnosis),
    /// A fetch failed and another attempt is scheduled.
    Retrying { attempt: u32, last: Option<Diagnosis>, error: String },
    Completed(Diagnosis),
    /// The backend reported the analysis as failed.
    Failed(Diagnosis),
    /// Polling gave up.
    Error { last: Option<Diagnosis>, message: String, session_expired: bool },
    Cancelled,
}

impl PollState {
    /// Whether the poll has stopped for good.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_) | Self::Error { .. } | Self::Cancelled)
    }

    /// Most recent diagnosis observed, if any.
    #[must_use]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            Self::InProgress(d) | Self::Completed(d) | Self::Failed(d) => Some(d),
            Self::Retrying { last, .. } | Self::Error { last, .. } => last.as_ref(),
            Self::Starting | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::InProgress(d) => d.status.as_str(),
            Self::Retrying { .. } => "retrying",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Error { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Owner of one running poll. Dropping it cancels the poll.
#[derive(Debug)]
pub struct PollHandle {
    id: DiagnosisId,
    state: Arc<watch::Sender<PollState>>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Start polling `id` on the current tokio runtime. Waits shorter than
/// [`crate::config::MIN_POLL_DELAY`] are raised to it.
pub fn spawn_poll<S>(source: Arc<S>, id: DiagnosisId, config: PollConfig) -> PollHandle
where
    S: DiagnosisSource + ?Sized + 'static,
{
    let sanitized = config.sanitized();
    if sanitized != config {
        warn!(%id, ?config, "poll timing below the minimum delay; clamped");
    }
    let config = sanitized;
    let (state_tx, _) = watch::channel(PollState::Starting);
    let state = Arc::new(state_tx);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let task = tokio::spawn(run_poll(source, id, config, state.clone(), cancel_rx));
    debug!(%id, "diagnosis poll started");
    PollHandle { id, state, cancel: cancel_tx, task }
}

impl PollHandle {
    #[must_use]
    pub fn id(&self) -> DiagnosisId {
        self.id
    }

    /// Snapshot of the latest state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_finished()
    }

    /// Wait for the poll to finish and return its final state.
    pub async fn wait(&self) -> PollState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(PollState::is_finished).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Stop the poll. No fetch starts after this returns.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
        self.task.abort();
        let cancelled = self.state.send_if_modified(|state| {
            if state.is_finished() {
                false
            } else {
                *state = PollState::Cancelled;
                true
            }
        });
        if cancelled {
            debug!(id = %self.id, "diagnosis poll cancelled");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Per-view poll controller holding at most one active poll.
pub struct Poller<S: ?Sized> {
    source: Arc<S>,
    config: PollConfig,
    current: Option<PollHandle>,
}

impl<S> Poller<S>
where
    S: DiagnosisSource + ?Sized + 'static,
{
    #[must_use]
    pub fn new(source: Arc<S>, config: PollConfig) -> Self {
        Self { source, config, current: None }
    }

    /// Cancel any running poll, then start one for `id`.
    pub fn start(&mut self, id: DiagnosisId) -> watch::Receiver<PollState> {
        self.stop();
        let handle = spawn_poll(self.source.clone(), id, self.config);
        let rx = handle.subscribe();
        self.current = Some(handle);
        rx
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&PollHandle> {
        self.current.as_ref()
    }
}

// =============================================================================
// TASK
// =============================================================================

async fn run_poll<S>(
    source: Arc<S>,
    id: DiagnosisId,
    config: PollConfig,
    state: Arc<watch::Sender<PollState>>,
    mut cancel: watch::Receiver<bool>,
) where
    S: DiagnosisSource + ?Sized,
{
    let mut last: Option<Diagnosis> = None;
    let mut failures: u32 = 0;
    let mut delay = Duration::ZERO;

    loop {
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.changed() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
        if *cancel.borrow() {
            return;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.changed() => return,
            result = source.fetch_diagnosis(id) => result,
        };

        match result {
            Ok(diagnosis) => {
                failures = 0;
                if let Some(prev) = &last {
                    if diagnosis.status.rank() < prev.status.rank() {
                        warn!(%id, from = %prev.status, to = %diagnosis.status, "diagnosis status moved backwards");
                    }
                }
                match diagnosis.status {
                    DiagnosisStatus::Completed => {
                        info!(%id, "diagnosis completed");
                        state.send_replace(PollState::Completed(diagnosis));
                        return;
                    }
                    DiagnosisStatus::Failed => {
                        error!(%id, "diagnosis analysis failed");
                        state.send_replace(PollState::Failed(diagnosis));
                        return;
                    }
                    DiagnosisStatus::Pending | DiagnosisStatus::Processing => {
                        debug!(%id, status = %diagnosis.status, "diagnosis not ready");
                        state.send_replace(PollState::InProgress(diagnosis.clone()));
                        last = Some(diagnosis);
                        delay = config.interval;
                    }
                }
            }
            Err(e) if e.retryable() && failures < config.max_retries => {
                failures += 1;
                delay = retry_delay(&config, failures);
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(%id, attempt = failures, delay_ms, error = %e, "diagnosis fetch failed; retrying");
                state.send_replace(PollState::Retrying { attempt: failures, last: last.clone(), error: e.to_string() });
            }
            Err(e) => {
                error!(%id, error = %e, "diagnosis poll gave up");
                state.send_replace(PollState::Error {
                    last,
                    message: e.user_message(),
                    session_expired: e.is_session_expired(),
                });
                return;
            }
        }
    }
}

/// `base * 2^(attempt-1)` plus up to 25% jitter, capped at `retry_max`.
fn retry_delay(config: &PollConfig, attempt: u32) -> Duration {
    let exp = config.retry_base.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(config.retry_max);
    let jitter_ms = u64::try_from(capped.as_millis() / 4).unwrap_or(0);
    let jitter = if jitter_ms == 0 { 0 } else { rand::rng().random_range(0..=jitter_ms) };
    (capped + Duration::from_millis(jitter)).min(config.retry_max)
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;
