//! Proximity alerts for saved map markers.
//!
//! Data flows one way:
//!
//! ```text
//! LocationService ──▶ LocationSubscription ──▶ ProximityMonitor task ──▶ ProximityEvaluator ──▶ NotificationManager ──▶ NotificationService
//!                                                   ▲
//!                              MarkerStore ─────────┘ (watch channel of MarkerSnapshot)
//! ```
//!
//! The OS-facing pieces ([`LocationService`], [`NotificationService`],
//! [`MarkerStore`]) are traits so hosts can plug in platform bindings and
//! tests can plug in fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = InMemoryMarkerStore::with_config(config.schema.proximity.clone());
//! let notifications = Arc::new(NotificationManager::new(os_notifications, config.schema.notifications.clone()));
//! notifications.initialize().await?;
//!
//! let evaluator = ProximityEvaluator::new(notifications.clone(), config.schema.proximity.threshold());
//! let location = LocationStream::new(os_location, config.schema.location.clone());
//! let handle = ProximityMonitor::new(location, evaluator).start(store.subscribe()).await?;
//! // ...
//! handle.stop();
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod evaluator;
pub mod location;
pub mod model;
pub mod monitor;
pub mod notification;
pub mod snapshot;
pub mod store;

pub use evaluator::{EvaluationReport, MarkerFailure, NotificationAction, ProximityEvaluator};
pub use location::{
    FixDecision, FixFilter, LocationEvent, LocationService, LocationStream, LocationSubscription,
    WatchHandle, WatchOptions,
};
pub use model::{Marker, MarkerId, MarkerImage, NewMarker, PositionFix};
pub use monitor::{MonitorExit, MonitorHandle, MonitorSummary, ProximityMonitor};
pub use notification::{
    ActiveNotification, NotificationHandle, NotificationManager, NotificationRequest,
    NotificationService, Presentation,
};
pub use snapshot::MarkerSnapshot;
pub use store::{InMemoryMarkerStore, MarkerStore};

pub use markerwatch_core::config::ProximityThreshold;

/// Boxed `Send` future returned by the collaborator traits, keeping them object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
