//! Recording fakes for the OS collaborators.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use markerwatch_core::config::{LocationConfig, NotificationsConfig, ProximityThreshold};
use markerwatch_core::{Error, Result};
use markerwatch_proximity::{
    BoxFuture, LocationEvent, LocationService, LocationStream, Marker, NotificationHandle,
    NotificationManager, NotificationRequest, NotificationService, PositionFix, ProximityEvaluator,
    WatchHandle, WatchOptions,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Fixtures
// ============================================================================

/// Marker used throughout: Manezhnaya Square, Moscow.
pub const MARKER_LAT: f64 = 55.7558;
pub const MARKER_LON: f64 = 37.6173;

/// Latitude ~200 m north of the marker.
pub const FAR_LAT: f64 = 55.7576;

pub fn marker(id: &str) -> Marker {
    Marker::new(id, MARKER_LAT, MARKER_LON, format!("Marker {}", id))
}

pub fn t(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap() + Duration::seconds(seconds)
}

pub fn at_marker(seconds: i64) -> PositionFix {
    PositionFix::new(MARKER_LAT, MARKER_LON, t(seconds))
}

pub fn far_away(seconds: i64) -> PositionFix {
    PositionFix::new(FAR_LAT, MARKER_LON, t(seconds))
}

/// Manager + evaluator (50 m) over `tray`, with permission already granted.
pub async fn pipeline(tray: &Arc<RecordingTray>) -> (Arc<NotificationManager>, ProximityEvaluator) {
    let manager = Arc::new(NotificationManager::new(tray.clone(), NotificationsConfig::default()));
    manager.initialize().await.unwrap();
    let evaluator = ProximityEvaluator::new(manager.clone(), ProximityThreshold::default());
    (manager, evaluator)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Notification tray
// ============================================================================

/// Notification service that records every call.
pub struct RecordingTray {
    grant: AtomicBool,
    fail_schedule_for: Mutex<HashSet<String>>,
    fail_dismiss: AtomicBool,
    hang_schedule: AtomicBool,
    schedule_calls: AtomicUsize,
    next_handle: AtomicU64,
    scheduled: Mutex<Vec<NotificationRequest>>,
    dismissed: Mutex<Vec<NotificationHandle>>,
}

impl RecordingTray {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self::with_grant(true))
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self::with_grant(false))
    }

    fn with_grant(grant: bool) -> Self {
        Self {
            grant: AtomicBool::new(grant),
            fail_schedule_for: Mutex::new(HashSet::new()),
            fail_dismiss: AtomicBool::new(false),
            hang_schedule: AtomicBool::new(false),
            schedule_calls: AtomicUsize::new(0),
            next_handle: AtomicU64::new(1),
            scheduled: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
        }
    }

    /// Make `schedule` fail for one marker id until cleared.
    pub fn fail_schedule_for(&self, marker_id: &str, fail: bool) {
        let mut set = self.fail_schedule_for.lock().unwrap();
        if fail {
            set.insert(marker_id.to_string());
        } else {
            set.remove(marker_id);
        }
    }

    pub fn fail_dismiss(&self, fail: bool) {
        self.fail_dismiss.store(fail, Ordering::SeqCst);
    }

    /// Make every `schedule` call wait forever, like a wedged OS service.
    pub fn hang_schedule(&self, hang: bool) {
        self.hang_schedule.store(hang, Ordering::SeqCst);
    }

    /// Calls to `schedule`, including ones that never completed.
    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn schedule_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    pub fn dismiss_count(&self) -> usize {
        self.dismissed.lock().unwrap().len()
    }

    /// Marker ids carried in scheduled payloads, in call order.
    pub fn scheduled_marker_ids(&self) -> Vec<String> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|req| req.payload["markerId"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl NotificationService for RecordingTray {
    fn request_permission(&self) -> BoxFuture<'_, Result<bool>> {
        let grant = self.grant.load(Ordering::SeqCst);
        Box::pin(async move { Ok(grant) })
    }

    fn schedule(&self, request: NotificationRequest) -> BoxFuture<'_, Result<NotificationHandle>> {
        Box::pin(async move {
            self.schedule_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_schedule.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let marker_id = request.payload["markerId"].as_str().unwrap_or_default().to_string();
            if self.fail_schedule_for.lock().unwrap().contains(&marker_id) {
                return Err(Error::internal(format!("tray rejected {}", marker_id)));
            }
            self.scheduled.lock().unwrap().push(request);
            let n = self.next_handle.fetch_add(1, Ordering::SeqCst);
            Ok(NotificationHandle::new(format!("os-{}", n)))
        })
    }

    fn dismiss(&self, handle: NotificationHandle) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_dismiss.load(Ordering::SeqCst) {
                return Err(Error::internal("tray busy"));
            }
            self.dismissed.lock().unwrap().push(handle);
            Ok(())
        })
    }
}

// ============================================================================
// Location sensor
// ============================================================================

/// Location service driven by the test through [`FakeSensor::push`].
pub struct FakeSensor {
    grant: AtomicBool,
    available: AtomicBool,
    sink: Mutex<Option<mpsc::Sender<LocationEvent>>>,
    options: Mutex<Option<WatchOptions>>,
    watches: AtomicUsize,
    cancels: AtomicUsize,
}

impl FakeSensor {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    fn new(grant: bool) -> Self {
        Self {
            grant: AtomicBool::new(grant),
            available: AtomicBool::new(true),
            sink: Mutex::new(None),
            options: Mutex::new(None),
            watches: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stream(self: &Arc<Self>) -> LocationStream {
        LocationStream::new(self.clone(), LocationConfig::default())
    }

    /// Deliver an event as the OS would.
    pub async fn push(&self, event: LocationEvent) {
        let sink = self.sink.lock().unwrap().clone().expect("no active watch");
        sink.send(event).await.expect("watch receiver dropped");
    }

    pub async fn fix(&self, fix: PositionFix) {
        self.push(LocationEvent::Fix(fix)).await;
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<WatchOptions> {
        *self.options.lock().unwrap()
    }
}

impl LocationService for FakeSensor {
    fn request_foreground_permission(&self) -> BoxFuture<'_, Result<bool>> {
        let grant = self.grant.load(Ordering::SeqCst);
        Box::pin(async move { Ok(grant) })
    }

    fn watch(&self, options: WatchOptions, sink: mpsc::Sender<LocationEvent>) -> BoxFuture<'_, Result<WatchHandle>> {
        Box::pin(async move {
            if !self.available.load(Ordering::SeqCst) {
                return Err(Error::sensor_unavailable("location services are off"));
            }
            *self.sink.lock().unwrap() = Some(sink);
            *self.options.lock().unwrap() = Some(options);
            let n = self.watches.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(WatchHandle(n))
        })
    }

    fn cancel(&self, _handle: &WatchHandle) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().unwrap().take();
    }
}
