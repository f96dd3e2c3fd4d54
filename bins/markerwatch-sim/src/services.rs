//! Terminal-backed stand-ins for the OS notification tray and location sensor.

use chrono::{DateTime, Utc};
use markerwatch_core::{Error, Result};
use markerwatch_proximity::{
    BoxFuture, LocationEvent, LocationService, NotificationHandle, NotificationRequest,
    NotificationService, PositionFix, WatchHandle, WatchOptions,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something the tray did, in call order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrayEvent {
    Shown {
        handle: NotificationHandle,
        marker_id: String,
        title: String,
        body: String,
        at: DateTime<Utc>,
    },
    Dismissed {
        handle: NotificationHandle,
        marker_id: String,
        at: DateTime<Utc>,
    },
}

/// Notification tray that prints to the terminal and keeps a log.
pub struct ConsoleTray {
    grant: bool,
    echo: bool,
    next_handle: AtomicU64,
    visible: Mutex<HashMap<NotificationHandle, String>>,
    events: Mutex<Vec<TrayEvent>>,
}

impl ConsoleTray {
    /// `grant` answers the permission prompt; `echo` prints each call.
    pub fn new(grant: bool, echo: bool) -> Self {
        Self {
            grant,
            echo,
            next_handle: AtomicU64::new(1),
            visible: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<TrayEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, event: TrayEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl NotificationService for ConsoleTray {
    fn request_permission(&self) -> BoxFuture<'_, Result<bool>> {
        let grant = self.grant;
        Box::pin(async move { Ok(grant) })
    }

    fn schedule(&self, request: NotificationRequest) -> BoxFuture<'_, Result<NotificationHandle>> {
        Box::pin(async move {
            let marker_id = request
                .payload
                .get("markerId")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::validation("Notification payload is missing markerId"))?
                .to_string();

            let handle = NotificationHandle::new(format!(
                "sim-{}",
                self.next_handle.fetch_add(1, Ordering::Relaxed)
            ));

            if self.echo {
                println!("{} {} {}", "🔔".yellow(), request.title.bold(), request.body);
            }

            self.visible
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(handle.clone(), marker_id.clone());
            self.record(TrayEvent::Shown {
                handle: handle.clone(),
                marker_id,
                title: request.title,
                body: request.body,
                at: Utc::now(),
            });
            Ok(handle)
        })
    }

    fn dismiss(&self, handle: NotificationHandle) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let marker_id = self
                .visible
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&handle)
                .ok_or_else(|| Error::internal(format!("Unknown notification handle {}", handle)))?;

            if self.echo {
                println!("{} {}", "↩".dimmed(), format!("left marker {}", marker_id).dimmed());
            }

            self.record(TrayEvent::Dismissed {
                handle,
                marker_id,
                at: Utc::now(),
            });
            Ok(())
        })
    }
}

/// Location sensor that plays back a recorded track once.
pub struct ReplaySensor {
    track: Mutex<Option<Vec<PositionFix>>>,
    player: Mutex<Option<JoinHandle<()>>>,
    watches: AtomicU64,
}

impl ReplaySensor {
    pub fn new(track: Vec<PositionFix>) -> Self {
        Self {
            track: Mutex::new(Some(track)),
            player: Mutex::new(None),
            watches: AtomicU64::new(0),
        }
    }
}

impl LocationService for ReplaySensor {
    fn request_foreground_permission(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async { Ok(true) })
    }

    fn watch(&self, options: WatchOptions, sink: mpsc::Sender<LocationEvent>) -> BoxFuture<'_, Result<WatchHandle>> {
        Box::pin(async move {
            let track = self
                .track
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .ok_or_else(|| Error::sensor_unavailable("Track has already been replayed"))?;

            tracing::debug!(fixes = track.len(), accuracy = ?options.accuracy, "Replaying track");

            // Dropping `sink` at the end closes the stream.
            let player = tokio::spawn(async move {
                for fix in track {
                    if sink.send(LocationEvent::Fix(fix)).await.is_err() {
                        break;
                    }
                }
            });
            *self.player.lock().unwrap_or_else(PoisonError::into_inner) = Some(player);

            Ok(WatchHandle(self.watches.fetch_add(1, Ordering::Relaxed)))
        })
    }

    fn cancel(&self, _handle: &WatchHandle) {
        if let Some(player) = self.player.lock().unwrap_or_else(PoisonError::into_inner).take() {
            player.abort();
        }
    }
}
