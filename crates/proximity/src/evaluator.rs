//! Per-fix proximity evaluation.
//!
//! Every fix re-derives the desired state from scratch: markers within the
//! threshold should have a notification, nothing else should. A failed OS call
//! is logged and reported, and the next fix simply tries again.

use crate::model::{MarkerId, PositionFix};
use crate::notification::NotificationManager;
use crate::snapshot::MarkerSnapshot;
use markerwatch_core::config::ProximityThreshold;
use markerwatch_core::{Error, ErrorCode};
use markerwatch_telemetry::{metrics, names, Timer};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Which manager operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Show,
    Dismiss,
}

/// One marker whose notification call failed during an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerFailure {
    pub marker_id: MarkerId,
    pub action: NotificationAction,
    pub code: ErrorCode,
    pub message: String,
}

impl MarkerFailure {
    fn new(marker_id: MarkerId, action: NotificationAction, error: &Error) -> Self {
        Self {
            marker_id,
            action,
            code: error.code,
            message: error.message.clone(),
        }
    }
}

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Notifications are disabled; nothing was evaluated.
    pub skipped: bool,
    /// Markers within the threshold.
    pub near: Vec<MarkerId>,
    /// Newly shown notifications.
    pub shown: Vec<MarkerId>,
    /// Notifications dismissed because the marker is now out of range.
    pub dismissed: Vec<MarkerId>,
    /// Notifications dismissed because the marker no longer exists.
    pub orphans_removed: Vec<MarkerId>,
    pub failures: Vec<MarkerFailure>,
}

impl EvaluationReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// True when any notification was shown or dismissed.
    pub fn changed(&self) -> bool {
        !(self.shown.is_empty() && self.dismissed.is_empty() && self.orphans_removed.is_empty())
    }
}

/// Drives the [`NotificationManager`] from position fixes.
#[derive(Debug, Clone)]
pub struct ProximityEvaluator {
    notifications: Arc<NotificationManager>,
    threshold: ProximityThreshold,
}

impl ProximityEvaluator {
    pub fn new(notifications: Arc<NotificationManager>, threshold: ProximityThreshold) -> Self {
        Self {
            notifications,
            threshold,
        }
    }

    pub fn threshold(&self) -> ProximityThreshold {
        self.threshold
    }

    pub fn notifications(&self) -> &Arc<NotificationManager> {
        &self.notifications
    }

    /// Reconcile active notifications with `fix` against `markers`.
    ///
    /// A no-op when notification permission was not granted. Show calls are
    /// issued closest marker first, then dismissals. Errors are isolated per
    /// marker and never abort the pass.
    #[instrument(
        skip(self, fix, markers),
        fields(lat = fix.coordinate.latitude, lon = fix.coordinate.longitude, markers = markers.len())
    )]
    pub async fn evaluate(&self, fix: &PositionFix, markers: &MarkerSnapshot) -> EvaluationReport {
        if !self.notifications.is_enabled() {
            tracing::trace!("Notifications disabled, evaluation skipped");
            return EvaluationReport::skipped();
        }

        let timer = Timer::start(names::EVALUATE_DURATION_MS);
        metrics().increment(names::EVALUATIONS);
        let mut report = EvaluationReport::default();

        let near = markers.near(&fix.coordinate, self.threshold.meters());
        let near_ids: HashSet<&MarkerId> = near.iter().map(|(m, _)| &m.id).collect();

        for (marker, distance_m) in &near {
            report.near.push(marker.id.clone());
            tracing::debug!(marker_id = %marker.id, distance_m, "Marker within threshold");

            match self.notifications.show(marker).await {
                Ok(true) => report.shown.push(marker.id.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(marker_id = %marker.id, error = %e, "Failed to show proximity notification");
                    report.failures.push(MarkerFailure::new(marker.id.clone(), NotificationAction::Show, &e));
                }
            }
        }

        // Every active entry outside the near set goes, including entries for
        // markers that have disappeared from the snapshot.
        for marker_id in self.notifications.active_ids().await {
            if near_ids.contains(&marker_id) {
                continue;
            }
            let orphan = !markers.contains(&marker_id);

            match self.notifications.remove(&marker_id).await {
                Ok(true) if orphan => {
                    tracing::info!(%marker_id, "Removed notification for deleted marker");
                    metrics().increment(names::NOTIFICATIONS_ORPHANS_REMOVED);
                    report.orphans_removed.push(marker_id);
                }
                Ok(true) => report.dismissed.push(marker_id),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(%marker_id, orphan, error = %e, "Failed to dismiss proximity notification");
                    report.failures.push(MarkerFailure::new(marker_id, NotificationAction::Dismiss, &e));
                }
            }
        }

        timer.stop();
        report
    }
}
