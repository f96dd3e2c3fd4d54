//! Location stream adapter.
//!
//! Wraps the OS continuous-location API ([`LocationService`]) into a pull
//! stream of [`PositionFix`]es. The OS pushes [`LocationEvent`]s into a bounded
//! channel; [`LocationSubscription::next`] drains it one event at a time, so a
//! subscriber never sees two fixes concurrently.
//!
//! The OS watch is released exactly once: on [`LocationSubscription::cancel`],
//! on drop, or when the stream reports permission revocation or sensor loss.

use crate::model::PositionFix;
use crate::BoxFuture;
use markerwatch_core::config::{LocationAccuracy, LocationConfig};
use markerwatch_core::{Error, Result};
use markerwatch_geo::haversine_distance_meters;
use markerwatch_telemetry::{metrics, names};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Options handed to the OS when starting a watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub accuracy: LocationAccuracy,
    /// Minimum movement in meters between two deliveries
    pub distance_interval_m: f64,
}

impl From<&LocationConfig> for WatchOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            accuracy: config.accuracy,
            distance_interval_m: config.distance_interval_meters,
        }
    }
}

/// What the OS can push into a watch.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(PositionFix),
    /// The user withdrew location access while the watch was running.
    PermissionRevoked,
    /// Location hardware became unavailable (disabled, backgrounded, lost).
    SensorLost(String),
}

/// OS identifier for a running watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(pub u64);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// OS location API.
pub trait LocationService: Send + Sync {
    /// Ask for foreground location access; `Ok(false)` means declined.
    fn request_foreground_permission(&self) -> BoxFuture<'_, Result<bool>>;

    /// Start delivering events into `sink` until [`cancel`](Self::cancel) is called.
    fn watch(&self, options: WatchOptions, sink: mpsc::Sender<LocationEvent>) -> BoxFuture<'_, Result<WatchHandle>>;

    /// Stop a watch and release the sensor. Must not block.
    fn cancel(&self, handle: &WatchHandle);
}

/// Outcome of running one fix through [`FixFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixDecision {
    Admit,
    /// Older than the last admitted fix.
    Stale,
    /// Closer than the distance interval to the last admitted fix.
    Throttled,
    /// Out-of-range or non-finite coordinate.
    Invalid,
}

/// Per-subscription filter applied before a fix reaches the evaluator.
#[derive(Debug, Clone)]
pub struct FixFilter {
    last: Option<PositionFix>,
    min_distance_m: f64,
    reject_stale: bool,
}

impl FixFilter {
    pub fn new(min_distance_m: f64, reject_stale: bool) -> Self {
        Self {
            last: None,
            min_distance_m,
            reject_stale,
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(config.distance_interval_meters, config.reject_stale_fixes)
    }

    /// Decide whether `fix` is delivered; admitted fixes become the new reference.
    pub fn admit(&mut self, fix: &PositionFix) -> FixDecision {
        metrics().increment(names::FIXES_RECEIVED);

        if !fix.coordinate.is_valid() {
            return FixDecision::Invalid;
        }

        if let Some(last) = &self.last {
            if self.reject_stale && fix.timestamp < last.timestamp {
                metrics().increment(names::FIXES_STALE);
                return FixDecision::Stale;
            }
            if self.min_distance_m > 0.0
                && haversine_distance_meters(&last.coordinate, &fix.coordinate) < self.min_distance_m
            {
                metrics().increment(names::FIXES_THROTTLED);
                return FixDecision::Throttled;
            }
        }

        self.last = Some(fix.clone());
        FixDecision::Admit
    }

    /// Last admitted fix.
    pub fn last(&self) -> Option<&PositionFix> {
        self.last.as_ref()
    }
}

/// Permission negotiation and subscription factory over a [`LocationService`].
#[derive(Clone)]
pub struct LocationStream {
    service: Arc<dyn LocationService>,
    config: LocationConfig,
}

impl LocationStream {
    pub fn new(service: Arc<dyn LocationService>, config: LocationConfig) -> Self {
        Self { service, config }
    }

    /// Request foreground location access.
    ///
    /// Never fails: a refusal or an OS error both yield `false`.
    pub async fn request_permission(&self) -> bool {
        match self.service.request_foreground_permission().await {
            Ok(true) => {
                tracing::info!("Location permission granted");
                true
            }
            Ok(false) => {
                tracing::warn!("Location permission denied");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Location permission request failed");
                false
            }
        }
    }

    /// Start an OS watch and return the subscription that owns it.
    pub async fn subscribe(&self) -> Result<LocationSubscription> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let options = WatchOptions::from(&self.config);
        let handle = self.service.watch(options, tx).await?;

        tracing::info!(
            %handle,
            accuracy = ?options.accuracy,
            distance_interval_m = options.distance_interval_m,
            "Location watch started"
        );

        Ok(LocationSubscription {
            service: self.service.clone(),
            handle: Some(handle),
            events: rx,
            filter: FixFilter::from_config(&self.config),
        })
    }
}

impl fmt::Debug for LocationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationStream")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A running OS watch. Dropping it releases the sensor.
pub struct LocationSubscription {
    service: Arc<dyn LocationService>,
    handle: Option<WatchHandle>,
    events: mpsc::Receiver<LocationEvent>,
    filter: FixFilter,
}

impl LocationSubscription {
    /// Next admitted fix.
    ///
    /// Permission revocation, sensor loss and the OS closing the channel are
    /// returned once as an error, after which the watch is released and every
    /// further call returns `None`. Cancel-safe: the only await point is the
    /// channel receive.
    pub async fn next(&mut self) -> Option<Result<PositionFix>> {
        loop {
            self.handle.as_ref()?;

            let Some(event) = self.events.recv().await else {
                self.release();
                return Some(Err(Error::stream_closed()));
            };

            match event {
                LocationEvent::Fix(fix) => match self.filter.admit(&fix) {
                    FixDecision::Admit => return Some(Ok(fix)),
                    decision => {
                        tracing::trace!(?decision, timestamp = %fix.timestamp, "Fix dropped");
                    }
                },
                LocationEvent::PermissionRevoked => {
                    self.release();
                    return Some(Err(Error::location_permission_denied()
                        .with_context("Location access revoked while watching")));
                }
                LocationEvent::SensorLost(reason) => {
                    self.release();
                    return Some(Err(Error::sensor_unavailable(reason)));
                }
            }
        }
    }

    /// Stop the watch. Returns immediately.
    pub fn cancel(mut self) {
        self.release();
    }

    /// Whether the OS watch is still held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Last fix handed out by [`next`](Self::next).
    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.filter.last()
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.service.cancel(&handle);
            self.events.close();
            tracing::info!(%handle, "Location watch released");
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for LocationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationSubscription")
            .field("handle", &self.handle)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use markerwatch_core::ErrorCode;
    use std::sync::Mutex;

    fn at(seconds: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_filter_rejects_stale() {
        let mut filter = FixFilter::new(0.0, true);
        assert_eq!(filter.admit(&PositionFix::new(55.0, 37.0, at(10))), FixDecision::Admit);
        assert_eq!(filter.admit(&PositionFix::new(55.1, 37.0, at(5))), FixDecision::Stale);
        assert_eq!(filter.admit(&PositionFix::new(55.1, 37.0, at(10))), FixDecision::Admit);
        assert_eq!(filter.last().unwrap().timestamp, at(10));
    }

    #[test]
    fn test_filter_stale_allowed_when_disabled() {
        let mut filter = FixFilter::new(0.0, false);
        filter.admit(&PositionFix::new(55.0, 37.0, at(10)));
        assert_eq!(filter.admit(&PositionFix::new(55.1, 37.0, at(5))), FixDecision::Admit);
    }

    #[test]
    fn test_filter_throttles_small_moves() {
        let mut filter = FixFilter::new(5.0, true);
        assert_eq!(filter.admit(&PositionFix::new(55.0, 37.0, at(0))), FixDecision::Admit);
        // ~1.1 m north
        assert_eq!(filter.admit(&PositionFix::new(55.00001, 37.0, at(1))), FixDecision::Throttled);
        // ~11 m north
        assert_eq!(filter.admit(&PositionFix::new(55.0001, 37.0, at(2))), FixDecision::Admit);
    }

    #[test]
    fn test_filter_invalid_coordinate() {
        let mut filter = FixFilter::new(0.0, true);
        assert_eq!(filter.admit(&PositionFix::new(f64::NAN, 37.0, at(0))), FixDecision::Invalid);
        assert!(filter.last().is_none());
    }

    #[derive(Default)]
    struct Sensor {
        grant: bool,
        sink: Mutex<Option<mpsc::Sender<LocationEvent>>>,
        cancelled: Mutex<Vec<WatchHandle>>,
    }

    impl Sensor {
        fn sender(&self) -> mpsc::Sender<LocationEvent> {
            self.sink.lock().unwrap().clone().unwrap()
        }
    }

    impl LocationService for Sensor {
        fn request_foreground_permission(&self) -> BoxFuture<'_, Result<bool>> {
            let grant = self.grant;
            Box::pin(async move { Ok(grant) })
        }

        fn watch(&self, _options: WatchOptions, sink: mpsc::Sender<LocationEvent>) -> BoxFuture<'_, Result<WatchHandle>> {
            *self.sink.lock().unwrap() = Some(sink);
            Box::pin(async { Ok(WatchHandle(7)) })
        }

        fn cancel(&self, handle: &WatchHandle) {
            self.cancelled.lock().unwrap().push(*handle);
            self.sink.lock().unwrap().take();
        }
    }

    #[tokio::test]
    async fn test_permission_denied_is_false() {
        let stream = LocationStream::new(Arc::new(Sensor::default()), LocationConfig::default());
        assert!(!stream.request_permission().await);
    }

    #[tokio::test]
    async fn test_next_delivers_fixes_in_order() {
        let sensor = Arc::new(Sensor { grant: true, ..Sensor::default() });
        let stream = LocationStream::new(sensor.clone(), LocationConfig::default());
        let mut sub = stream.subscribe().await.unwrap();

        let tx = sensor.sender();
        tx.send(LocationEvent::Fix(PositionFix::new(55.0, 37.0, at(0)))).await.unwrap();
        tx.send(LocationEvent::Fix(PositionFix::new(55.001, 37.0, at(1)))).await.unwrap();

        assert_eq!(sub.next().await.unwrap().unwrap().timestamp, at(0));
        assert_eq!(sub.next().await.unwrap().unwrap().timestamp, at(1));
        assert_eq!(sub.last_fix().unwrap().timestamp, at(1));
    }

    #[tokio::test]
    async fn test_revocation_releases_watch() {
        let sensor = Arc::new(Sensor { grant: true, ..Sensor::default() });
        let stream = LocationStream::new(sensor.clone(), LocationConfig::default());
        let mut sub = stream.subscribe().await.unwrap();

        sensor.sender().send(LocationEvent::PermissionRevoked).await.unwrap();

        let err = sub.next().await.unwrap().unwrap_err();
        assert_eq!(err.code, ErrorCode::LocationPermissionDenied);
        assert!(!sub.is_active());
        assert!(sub.next().await.is_none());
        assert_eq!(sensor.cancelled.lock().unwrap().as_slice(), &[WatchHandle(7)]);
    }

    #[tokio::test]
    async fn test_sensor_lost_is_sensor_unavailable() {
        let sensor = Arc::new(Sensor { grant: true, ..Sensor::default() });
        let stream = LocationStream::new(sensor.clone(), LocationConfig::default());
        let mut sub = stream.subscribe().await.unwrap();

        sensor.sender().send(LocationEvent::SensorLost("gps off".into())).await.unwrap();
        let err = sub.next().await.unwrap().unwrap_err();
        assert_eq!(err.code, ErrorCode::SensorUnavailable);
    }

    #[tokio::test]
    async fn test_cancel_and_drop_release_once() {
        let sensor = Arc::new(Sensor { grant: true, ..Sensor::default() });
        let stream = LocationStream::new(sensor.clone(), LocationConfig::default());

        stream.subscribe().await.unwrap().cancel();
        drop(stream.subscribe().await.unwrap());

        assert_eq!(sensor.cancelled.lock().unwrap().len(), 2);
    }
}
