//! Change Listener
//!
//! Long-running task that pulls changes from one resource, either by live
//! synchronization or by asynchronous updates, and hands them to a
//! [`ChangeHandler`]. Cancellation is cooperative: the shutdown flag is
//! checked between batches and after every handled change; a connector call
//! in flight is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use xavyo_resource::error::{ResourceError, ResourceResult};
use xavyo_resource::operation::SyncToken;

use crate::converter::{ProvisioningContext, ResourceObjectChange, ResourceObjectConverter};
use crate::result::OperationResult;

/// Receives changes from a listener.
pub trait ChangeHandler: Send + Sync {
    /// Handle one change. Returning `false` stops the listener.
    fn handle_change(&self, change: ResourceObjectChange) -> bool;
}

impl<F> ChangeHandler for F
where
    F: Fn(ResourceObjectChange) -> bool + Send + Sync,
{
    fn handle_change(&self, change: ResourceObjectChange) -> bool {
        self(change)
    }
}

/// Where changes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Poll for changes after a token.
    LiveSync,
    /// Wait for changes pushed by the resource.
    AsyncUpdate,
}

impl ListenerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerMode::LiveSync => "live_sync",
            ListenerMode::AsyncUpdate => "async_update",
        }
    }
}

impl std::fmt::Display for ListenerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a listener stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested.
    Cancelled,
    /// The handler asked to stop.
    HandlerStopped,
    /// Too many connector failures in a row.
    TooManyErrors { last_error: String },
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Cancelled => "cancelled",
            StopReason::HandlerStopped => "handler_stopped",
            StopReason::TooManyErrors { .. } => "too_many_errors",
        }
    }
}

/// Summary of a listener run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerReport {
    /// Token after the last processed change (live sync only).
    pub token: Option<SyncToken>,
    pub changes_processed: usize,
    pub stop_reason: StopReason,
}

/// Listener for one resource object class.
pub struct ChangeListener {
    converter: Arc<ResourceObjectConverter>,
    ctx: ProvisioningContext,
    handler: Arc<dyn ChangeHandler>,
    mode: ListenerMode,
    token: Option<SyncToken>,
    shutdown: Arc<AtomicBool>,
}

impl ChangeListener {
    pub fn new(
        converter: Arc<ResourceObjectConverter>,
        ctx: ProvisioningContext,
        handler: Arc<dyn ChangeHandler>,
        mode: ListenerMode,
    ) -> Self {
        Self {
            converter,
            ctx,
            handler,
            mode,
            token: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resume live sync from a stored token instead of the current one.
    #[must_use]
    pub fn with_token(mut self, token: SyncToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Request shutdown; the listener stops at its next check.
    pub fn shutdown(&self) {
        info!("Listener shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Run on a separate task.
    pub fn spawn(self) -> ListenerHandle {
        let shutdown = Arc::clone(&self.shutdown);
        let join = tokio::spawn(async move { self.run().await });
        ListenerHandle { shutdown, join }
    }

    /// Run until shut down, stopped by the handler, or failing repeatedly.
    #[instrument(skip(self), fields(resource_id = %self.ctx.resource_id(), mode = %self.mode))]
    pub async fn run(&self) -> ListenerReport {
        info!(
            object_class = %self.ctx.object_class(),
            "Starting change listener"
        );
        let report = match self.mode {
            ListenerMode::LiveSync => self.run_live_sync().await,
            ListenerMode::AsyncUpdate => self.run_async_update().await,
        };
        info!(
            changes_processed = report.changes_processed,
            stop_reason = report.stop_reason.as_str(),
            "Change listener stopped"
        );
        report
    }

    fn can_run(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
    }

    async fn run_live_sync(&self) -> ListenerReport {
        let config = self.converter.config();
        let mut report = ListenerReport {
            token: self.token.clone(),
            changes_processed: 0,
            stop_reason: StopReason::Cancelled,
        };
        let mut errors = ErrorCounter::new(config.max_consecutive_listener_errors);

        while report.token.is_none() && self.can_run() {
            let mut result = OperationResult::new("liveSync.start");
            match self
                .converter
                .fetch_current_token(&self.ctx, &mut result)
                .await
            {
                Ok(Some(token)) => {
                    debug!(token = %token, "Starting from current token");
                    report.token = Some(token);
                }
                Ok(None) => break,
                Err(e) => {
                    if let Some(reason) = errors.failed(&e) {
                        report.stop_reason = reason;
                        return report;
                    }
                    tokio::time::sleep(config.async_update_poll_interval()).await;
                }
            }
        }

        while self.can_run() {
            let mut result = OperationResult::new("liveSync");
            let outcome = self
                .converter
                .fetch_changes(
                    &self.ctx,
                    report.token.clone(),
                    |change| self.handler.handle_change(change) && self.can_run(),
                    &mut result,
                )
                .await;
            match outcome {
                Ok(progress) => {
                    errors.reset();
                    report.token = progress.token;
                    report.changes_processed += progress.changes_processed;
                    if !progress.all_fetched {
                        if self.can_run() {
                            report.stop_reason = StopReason::HandlerStopped;
                        }
                        return report;
                    }
                }
                Err(e) => {
                    if let Some(reason) = errors.failed(&e) {
                        report.stop_reason = reason;
                        return report;
                    }
                }
            }
            tokio::time::sleep(config.async_update_poll_interval()).await;
        }
        report
    }

    async fn run_async_update(&self) -> ListenerReport {
        let config = self.converter.config();
        let mut report = ListenerReport {
            token: None,
            changes_processed: 0,
            stop_reason: StopReason::Cancelled,
        };
        let mut errors = ErrorCounter::new(config.max_consecutive_listener_errors);
        let stopped_by_handler = AtomicBool::new(false);

        while self.can_run() {
            let mut result = OperationResult::new("asyncUpdate");
            let outcome = self
                .converter
                .listen_for_asynchronous_updates(
                    &self.ctx,
                    |change| {
                        let go = self.handler.handle_change(change);
                        if !go {
                            stopped_by_handler.store(true, Ordering::Relaxed);
                        }
                        go
                    },
                    || self.can_run(),
                    &mut result,
                )
                .await;
            match outcome {
                Ok(handled) => {
                    errors.reset();
                    report.changes_processed += handled;
                    if stopped_by_handler.load(Ordering::Relaxed) {
                        report.stop_reason = StopReason::HandlerStopped;
                        return report;
                    }
                }
                Err(e) => {
                    if let Some(reason) = errors.failed(&e) {
                        report.stop_reason = reason;
                        return report;
                    }
                    tokio::time::sleep(config.async_update_poll_interval()).await;
                }
            }
        }
        report
    }
}

/// Handle of a spawned listener.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    join: JoinHandle<ListenerReport>,
}

impl ListenerHandle {
    pub fn shutdown(&self) {
        info!("Listener shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the listener to stop.
    pub async fn join(self) -> ResourceResult<ListenerReport> {
        self.join
            .await
            .map_err(|e| ResourceError::internal(format!("listener task failed: {e}")))
    }

    /// Request shutdown and wait for the listener to stop.
    pub async fn stop(self) -> ResourceResult<ListenerReport> {
        self.shutdown();
        self.join().await
    }
}

/// Consecutive failure tracking.
struct ErrorCounter {
    max: u32,
    consecutive: u32,
}

impl ErrorCounter {
    fn new(max: u32) -> Self {
        Self {
            max: max.max(1),
            consecutive: 0,
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Count a failure; returns the stop reason once the limit is reached.
    fn failed(&mut self, error: &ResourceError) -> Option<StopReason> {
        self.consecutive += 1;
        warn!(
            error = %error,
            error_code = error.error_code(),
            consecutive = self.consecutive,
            "Listener iteration failed"
        );
        let hopeless = matches!(
            error,
            ResourceError::Unsupported { .. } | ResourceError::Configuration { .. }
        );
        (self.consecutive >= self.max || hopeless).then(|| StopReason::TooManyErrors {
            last_error: error.to_string(),
        })
    }
}
