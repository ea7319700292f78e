//! Watcher loops and their supervisor.
//!
//! Every [`Watcher`] runs in its own task on its own fixed interval:
//!
//! ```text
//! Idle -> Sampling -> Updating -> Sleeping -> Idle ...
//! ```
//!
//! A failed or panicking cycle is logged, counted, and recorded on the
//! [`StatusBoard`]; the loop then sleeps its normal interval and tries again.
//! Nothing a watcher does can stop the [`Scheduler`] or another loop.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use pipewatch_core::metric_names::METRIC_SAMPLE_FAILURES;
use pipewatch_core::types::Timestamp;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::MetricsRegistry;
use crate::sources::SampleError;

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// One independently scheduled polling loop.
///
/// `sample` talks to the collaborator; `apply` publishes the result. `apply`
/// only runs after a successful sample, so a failed sample never touches the
/// registry.
#[async_trait]
pub trait Watcher: Send + 'static {
    type Sample: Send;

    fn name(&self) -> &'static str;

    async fn sample(&mut self) -> Result<Self::Sample, SampleError>;

    async fn apply(&mut self, sample: Self::Sample);
}

// ---------------------------------------------------------------------------
// Status board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Idle,
    Sampling,
    Updating,
    Sleeping,
    Stopped,
}

/// Health of one watcher loop, as shown on `/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatcherStatus {
    pub state: WatcherState,
    pub interval_secs: u64,
    pub cycles: u64,
    pub last_success: Option<Timestamp>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Timestamp>,
    pub consecutive_failures: u32,
}

impl WatcherStatus {
    fn new(interval: Duration) -> Self {
        Self {
            state: WatcherState::Idle,
            interval_secs: interval.as_secs(),
            cycles: 0,
            last_success: None,
            last_error: None,
            last_error_at: None,
            consecutive_failures: 0,
        }
    }
}

/// Shared per-watcher status map.
#[derive(Debug, Default)]
pub struct StatusBoard {
    watchers: RwLock<BTreeMap<&'static str, WatcherStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, name: &'static str, f: impl FnOnce(&mut WatcherStatus)) {
        let mut guard = self.watchers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(status) = guard.get_mut(name) {
            f(status);
        }
    }

    fn register(&self, name: &'static str, interval: Duration) {
        let mut guard = self.watchers.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(name, WatcherStatus::new(interval));
    }

    fn set_state(&self, name: &'static str, state: WatcherState) {
        self.update(name, |s| s.state = state);
    }

    fn record_success(&self, name: &'static str) {
        self.update(name, |s| {
            s.cycles += 1;
            s.last_success = Some(Utc::now());
            s.consecutive_failures = 0;
        });
    }

    fn record_failure(&self, name: &'static str, error: String) {
        self.update(name, |s| {
            s.cycles += 1;
            s.last_error = Some(error);
            s.last_error_at = Some(Utc::now());
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
        });
    }

    pub fn get(&self, name: &str) -> Option<WatcherStatus> {
        let guard = self.watchers.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(name).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, WatcherStatus> {
        let guard = self.watchers.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .iter()
            .map(|(name, status)| (name.to_string(), status.clone()))
            .collect()
    }

    /// True when no watcher's most recent cycle failed.
    pub fn all_healthy(&self) -> bool {
        let guard = self.watchers.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().all(|s| s.consecutive_failures == 0)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns every watcher task and the token that stops them.
pub struct Scheduler {
    cancel: CancellationToken,
    registry: Arc<MetricsRegistry>,
    board: Arc<StatusBoard>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(registry: Arc<MetricsRegistry>, board: Arc<StatusBoard>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            registry,
            board,
            handles: Vec::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn watcher_count(&self) -> usize {
        self.handles.len()
    }

    /// Start `watcher` on its own task. The first cycle runs immediately.
    pub fn spawn<W: Watcher>(&mut self, watcher: W, interval: Duration) {
        let name = watcher.name();
        self.board.register(name, interval);
        tracing::info!(watcher = name, interval_secs = interval.as_secs(), "Starting watcher");

        let handle = tokio::spawn(run_loop(
            watcher,
            interval,
            self.cancel.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.board),
        ));
        self.handles.push((name, handle));
    }

    /// Cancel every loop and wait up to `timeout` for them to finish.
    ///
    /// In-flight collaborator calls are not interrupted; loops still running
    /// at the deadline are aborted.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now() + timeout;

        for (name, mut handle) in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(watcher = name, "Watcher stopped"),
                Ok(Err(e)) => tracing::error!(watcher = name, error = %e, "Watcher task failed"),
                Err(_) => {
                    tracing::warn!(watcher = name, "Watcher did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
        tracing::info!("All watchers stopped");
    }
}

async fn run_cycle<W: Watcher>(watcher: &mut W, board: &StatusBoard) -> Result<(), SampleError> {
    let name = watcher.name();
    board.set_state(name, WatcherState::Sampling);
    let sample = watcher.sample().await?;
    board.set_state(name, WatcherState::Updating);
    watcher.apply(sample).await;
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_loop<W: Watcher>(
    mut watcher: W,
    interval: Duration,
    cancel: CancellationToken,
    registry: Arc<MetricsRegistry>,
    board: Arc<StatusBoard>,
) {
    let name = watcher.name();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = AssertUnwindSafe(run_cycle(&mut watcher, &board))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => board.record_success(name),
            Ok(Err(e)) => {
                tracing::warn!(watcher = name, error = %e, "Watcher sample failed");
                registry.increment_counter(METRIC_SAMPLE_FAILURES, 1);
                board.record_failure(name, e.to_string());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(watcher = name, panic = %message, "Watcher cycle panicked");
                registry.increment_counter(METRIC_SAMPLE_FAILURES, 1);
                board.record_failure(name, format!("panicked: {message}"));
            }
        }

        board.set_state(name, WatcherState::Sleeping);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        board.set_state(name, WatcherState::Idle);
    }

    board.set_state(name, WatcherState::Stopped);
    tracing::info!(watcher = name, "Watcher stopped");
}
