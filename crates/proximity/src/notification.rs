//! Notification lifecycle: at most one visible proximity notification per marker.
//!
//! [`NotificationManager`] owns the map of active notifications. Every
//! check-then-act sequence (is it showing? schedule, record; is it showing?
//! dismiss, forget) runs under one async mutex, so two fixes racing through
//! `show` for the same marker schedule a single OS notification.

use crate::model::{Marker, MarkerId};
use crate::BoxFuture;
use chrono::{DateTime, Utc};
use markerwatch_core::config::NotificationsConfig;
use markerwatch_core::{Error, Result};
use markerwatch_telemetry::{metrics, names};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Identifier the OS returns for a scheduled notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a notification is presented while the app is in the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub show_banner: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl From<&NotificationsConfig> for Presentation {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            show_banner: config.show_banner,
            play_sound: config.play_sound,
            set_badge: config.set_badge,
        }
    }
}

/// An immediate (non-deferred) notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    /// `{"markerId": "<id>"}`
    pub payload: serde_json::Value,
    pub presentation: Presentation,
}

/// OS notification tray.
pub trait NotificationService: Send + Sync {
    /// Ask the user for permission; `Ok(false)` means declined.
    fn request_permission(&self) -> BoxFuture<'_, Result<bool>>;

    /// Show a notification now and return its handle.
    fn schedule(&self, request: NotificationRequest) -> BoxFuture<'_, Result<NotificationHandle>>;

    /// Remove a previously shown notification.
    fn dismiss(&self, handle: NotificationHandle) -> BoxFuture<'_, Result<()>>;
}

/// A proximity notification currently visible for one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveNotification {
    pub marker_id: MarkerId,
    pub handle: NotificationHandle,
    pub shown_at: DateTime<Utc>,
}

/// Owns the active-notification map and talks to the [`NotificationService`].
pub struct NotificationManager {
    service: Arc<dyn NotificationService>,
    content: NotificationsConfig,
    active: Mutex<HashMap<MarkerId, ActiveNotification>>,
    enabled: AtomicBool,
}

impl NotificationManager {
    pub fn new(service: Arc<dyn NotificationService>, content: NotificationsConfig) -> Self {
        Self {
            service,
            content,
            active: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(false),
        }
    }

    /// Request notification permission.
    ///
    /// A refusal (or a failing permission call) returns a recoverable
    /// `NotificationPermissionDenied` error and leaves alerts disabled.
    pub async fn initialize(&self) -> Result<()> {
        match self.service.request_permission().await {
            Ok(true) => {
                self.enabled.store(true, Ordering::SeqCst);
                tracing::info!("Notification permission granted");
                Ok(())
            }
            Ok(false) => {
                self.enabled.store(false, Ordering::SeqCst);
                tracing::warn!("Notification permission denied, proximity alerts disabled");
                Err(Error::notification_permission_denied())
            }
            Err(e) => {
                self.enabled.store(false, Ordering::SeqCst);
                tracing::warn!(error = %e, "Notification permission request failed");
                Err(Error::notification_permission_denied().with_source(e))
            }
        }
    }

    /// Whether permission was granted.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Show the proximity notification for `marker` unless one is already active.
    ///
    /// Returns `true` when a new notification was scheduled. On failure no
    /// entry is recorded, so the next fix tries again.
    pub async fn show(&self, marker: &Marker) -> Result<bool> {
        let mut active = self.active.lock().await;
        if active.contains_key(&marker.id) {
            return Ok(false);
        }

        let request = self.request_for(marker);
        let handle = self.service.schedule(request).await.map_err(|e| {
            metrics().increment(names::NOTIFICATIONS_FAILED);
            Error::schedule_failed(marker.id.as_str(), e.message.clone()).with_source(e)
        })?;

        tracing::info!(marker_id = %marker.id, %handle, title = %marker.title, "Proximity notification shown");
        active.insert(
            marker.id.clone(),
            ActiveNotification {
                marker_id: marker.id.clone(),
                handle,
                shown_at: Utc::now(),
            },
        );
        metrics().increment(names::NOTIFICATIONS_SHOWN);
        metrics().gauge(names::NOTIFICATIONS_ACTIVE, active.len() as u64);
        Ok(true)
    }

    /// Dismiss the notification for `marker_id` if one is active.
    ///
    /// Returns `true` when a notification was dismissed. On failure the entry
    /// is kept so a later call retries the dismissal.
    pub async fn remove(&self, marker_id: &MarkerId) -> Result<bool> {
        let mut active = self.active.lock().await;
        let Some(handle) = active.get(marker_id).map(|n| n.handle.clone()) else {
            return Ok(false);
        };

        self.service.dismiss(handle.clone()).await.map_err(|e| {
            metrics().increment(names::NOTIFICATIONS_FAILED);
            Error::dismiss_failed(marker_id.as_str(), e.message.clone()).with_source(e)
        })?;

        active.remove(marker_id);
        tracing::info!(%marker_id, %handle, "Proximity notification dismissed");
        metrics().increment(names::NOTIFICATIONS_DISMISSED);
        metrics().gauge(names::NOTIFICATIONS_ACTIVE, active.len() as u64);
        Ok(true)
    }

    /// Copy of the active-notification map.
    pub async fn snapshot(&self) -> HashMap<MarkerId, ActiveNotification> {
        self.active.lock().await.clone()
    }

    /// Ids with an active notification, sorted.
    pub async fn active_ids(&self) -> Vec<MarkerId> {
        let mut ids: Vec<MarkerId> = self.active.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn is_active(&self, marker_id: &MarkerId) -> bool {
        self.active.lock().await.contains_key(marker_id)
    }

    fn request_for(&self, marker: &Marker) -> NotificationRequest {
        NotificationRequest {
            title: self.content.title.clone(),
            body: self.content.render_body(marker.id.as_str(), &marker.title),
            payload: serde_json::json!({ "markerId": marker.id }),
            presentation: Presentation::from(&self.content),
        }
    }
}

impl fmt::Debug for NotificationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationManager")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}
