//! The proximity pipeline task.
//!
//! One spawned task owns the location subscription and the current marker
//! snapshot. It waits on three things at once:
//!
//! - the cancellation token (checked first),
//! - a new marker snapshot, which re-evaluates the last fix,
//! - the next admitted fix, which is evaluated against the current snapshot.
//!
//! Evaluations run inside the task, so they never overlap. Each one also
//! races the token: cancelling abandons an evaluation still waiting on the OS
//! notification service and releases the location watch at once.

use crate::evaluator::ProximityEvaluator;
use crate::location::{LocationStream, LocationSubscription};
use crate::model::PositionFix;
use crate::snapshot::MarkerSnapshot;
use markerwatch_core::{Error, ErrorCode, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why the pipeline task stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MonitorExit {
    /// [`MonitorHandle::stop`] was called or the handle was dropped.
    Cancelled,
    /// The location stream reported an error (revocation, sensor loss, closed).
    Failed { code: ErrorCode, message: String },
}

impl MonitorExit {
    /// Error code for the exit; [`ErrorCode::Cancelled`] for a requested stop.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Failed { code, .. } => *code,
        }
    }
}

/// Counters returned when the pipeline task ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSummary {
    pub fixes_processed: u64,
    pub evaluations: u64,
    pub exit: MonitorExit,
}

/// Wires a [`LocationStream`] to a [`ProximityEvaluator`].
#[derive(Debug)]
pub struct ProximityMonitor {
    location: LocationStream,
    evaluator: ProximityEvaluator,
}

impl ProximityMonitor {
    pub fn new(location: LocationStream, evaluator: ProximityEvaluator) -> Self {
        Self { location, evaluator }
    }

    /// Negotiate location permission, start the OS watch and spawn the pipeline.
    ///
    /// Fails with `LocationPermissionDenied` when access is refused, or with the
    /// service error when the watch cannot be started. Notification permission
    /// is not required here: evaluations are skipped until it is granted.
    pub async fn start(self, snapshots: watch::Receiver<Arc<MarkerSnapshot>>) -> Result<MonitorHandle> {
        if !self.location.request_permission().await {
            return Err(Error::location_permission_denied());
        }

        let subscription = self.location.subscribe().await?;
        let threshold = self.evaluator.threshold();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(subscription, snapshots, self.evaluator, cancel.clone()));

        tracing::info!(%threshold, "Proximity monitor started");
        Ok(MonitorHandle {
            cancel,
            task: Some(task),
        })
    }
}

async fn run(
    mut subscription: LocationSubscription,
    mut snapshots: watch::Receiver<Arc<MarkerSnapshot>>,
    evaluator: ProximityEvaluator,
    cancel: CancellationToken,
) -> MonitorSummary {
    let mut current = snapshots.borrow_and_update().clone();
    let mut store_open = true;
    let mut fixes_processed = 0u64;
    let mut evaluations = 0u64;

    let exit = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break MonitorExit::Cancelled,

            changed = snapshots.changed(), if store_open => {
                if changed.is_err() {
                    tracing::debug!("Marker store closed, keeping last snapshot");
                    store_open = false;
                    continue;
                }
                current = snapshots.borrow_and_update().clone();
                tracing::debug!(markers = current.len(), index = current.index_name(), "Marker snapshot updated");

                if let Some(fix) = subscription.last_fix().cloned() {
                    if !evaluate_unless_cancelled(&evaluator, &fix, &current, &cancel).await {
                        break MonitorExit::Cancelled;
                    }
                    evaluations += 1;
                }
            }

            next = subscription.next() => match next {
                Some(Ok(fix)) => {
                    fixes_processed += 1;
                    if !evaluate_unless_cancelled(&evaluator, &fix, &current, &cancel).await {
                        break MonitorExit::Cancelled;
                    }
                    evaluations += 1;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Location stream ended, proximity alerts stopped");
                    break MonitorExit::Failed { code: e.code, message: e.message };
                }
                None => {
                    break MonitorExit::Failed {
                        code: ErrorCode::LocationStreamClosed,
                        message: "Location stream closed".to_string(),
                    };
                }
            },
        }
    };

    subscription.cancel();
    tracing::info!(fixes_processed, evaluations, exit = ?exit, "Proximity monitor stopped");

    MonitorSummary {
        fixes_processed,
        evaluations,
        exit,
    }
}

/// Returns `false` when the token fired first. The evaluation future is then
/// dropped along with any OS call it was waiting on; the notification map only
/// changes after a call completes, so it stays consistent.
async fn evaluate_unless_cancelled(
    evaluator: &ProximityEvaluator,
    fix: &PositionFix,
    snapshot: &MarkerSnapshot,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            tracing::debug!("Evaluation abandoned on cancel");
            false
        }
        _ = evaluator.evaluate(fix, snapshot) => true,
    }
}

/// Control handle for a running pipeline. Dropping it stops the pipeline.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<MonitorSummary>>,
}

impl MonitorHandle {
    /// Stop future evaluations and release the location watch. Does not wait.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the pipeline task to end and return its summary.
    ///
    /// Does not stop the pipeline by itself; call [`stop`](Self::stop) first
    /// unless the location stream is expected to end on its own.
    pub async fn join(mut self) -> Result<MonitorSummary> {
        let task = self
            .task
            .take()
            .ok_or_else(|| Error::internal("Monitor task already joined"))?;
        task.await.map_err(|e| {
            if e.is_cancelled() {
                Error::cancelled("Monitor task was aborted before it finished")
            } else {
                Error::internal(format!("Monitor task failed: {}", e))
            }
        })
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
