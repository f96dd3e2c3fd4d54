//! Marker store interface and an in-memory implementation.
//!
//! The proximity pipeline only reads from the store: a full listing, and a
//! `watch` channel that always holds the latest [`MarkerSnapshot`].

use crate::model::{Marker, MarkerId, MarkerImage, NewMarker};
use crate::snapshot::MarkerSnapshot;
use crate::BoxFuture;
use chrono::Utc;
use markerwatch_core::config::ProximityConfig;
use markerwatch_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Source of markers for the proximity pipeline.
pub trait MarkerStore: Send + Sync {
    /// Every marker currently saved.
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Marker>>>;

    /// Receiver that is updated with a fresh snapshot after every change.
    fn subscribe(&self) -> watch::Receiver<Arc<MarkerSnapshot>>;
}

/// Markers held in memory, published as snapshots on every mutation.
pub struct InMemoryMarkerStore {
    markers: Mutex<BTreeMap<MarkerId, Marker>>,
    proximity: ProximityConfig,
    publisher: watch::Sender<Arc<MarkerSnapshot>>,
}

impl InMemoryMarkerStore {
    /// Empty store building linear-scan snapshots.
    pub fn new() -> Self {
        Self::with_config(ProximityConfig::default())
    }

    /// Empty store building snapshots with the configured index.
    pub fn with_config(proximity: ProximityConfig) -> Self {
        let (publisher, _) = watch::channel(Arc::new(MarkerSnapshot::empty()));
        Self {
            markers: Mutex::new(BTreeMap::new()),
            proximity,
            publisher,
        }
    }

    /// Store pre-populated with `markers`.
    pub fn with_markers(proximity: ProximityConfig, markers: Vec<Marker>) -> Result<Self> {
        let store = Self::with_config(proximity);
        store.mutate(|all| {
            for marker in markers {
                if all.contains_key(&marker.id) {
                    return Err(Error::duplicate_marker(marker.id.as_str()));
                }
                all.insert(marker.id.clone(), marker);
            }
            Ok(())
        })?;
        Ok(store)
    }

    /// Save a new marker and return its generated id.
    pub fn add_marker(&self, new: NewMarker) -> Result<MarkerId> {
        let marker = Marker {
            id: MarkerId::generate(),
            coordinate: new.coordinate,
            title: new.title,
            description: new.description,
            created_at: Utc::now(),
            images: Vec::new(),
        };
        marker.validate()?;
        let id = marker.id.clone();

        self.mutate(|all| {
            all.insert(marker.id.clone(), marker);
            Ok(())
        })?;
        tracing::debug!(marker_id = %id, "Marker added");
        Ok(id)
    }

    /// Replace title, description and position of an existing marker.
    ///
    /// Images and creation time are kept.
    pub fn update_marker(&self, marker: Marker) -> Result<()> {
        marker.validate()?;
        self.mutate(|all| {
            let existing = all
                .get_mut(&marker.id)
                .ok_or_else(|| Error::marker_not_found(marker.id.as_str()))?;
            existing.coordinate = marker.coordinate;
            existing.title = marker.title;
            existing.description = marker.description;
            Ok(())
        })
    }

    /// Remove a marker together with its images.
    pub fn delete_marker(&self, id: &MarkerId) -> Result<Marker> {
        let removed = self.mutate(|all| {
            all.remove(id).ok_or_else(|| Error::marker_not_found(id.as_str()))
        })?;
        tracing::debug!(marker_id = %id, images = removed.images.len(), "Marker deleted");
        Ok(removed)
    }

    pub fn get_marker(&self, id: &MarkerId) -> Option<Marker> {
        self.lock().get(id).cloned()
    }

    /// Attach a photo URI to a marker and return the image id.
    pub fn add_image(&self, marker_id: &MarkerId, uri: impl Into<String>) -> Result<String> {
        let image = MarkerImage {
            id: uuid::Uuid::new_v4().to_string(),
            marker_id: marker_id.clone(),
            uri: uri.into(),
            created_at: Utc::now(),
        };
        let image_id = image.id.clone();
        self.mutate(|all| {
            let marker = all
                .get_mut(marker_id)
                .ok_or_else(|| Error::marker_not_found(marker_id.as_str()))?;
            marker.images.push(image);
            Ok(())
        })?;
        Ok(image_id)
    }

    /// Detach a photo by image id, wherever it is.
    pub fn delete_image(&self, image_id: &str) -> Result<()> {
        self.mutate(|all| {
            for marker in all.values_mut() {
                if let Some(pos) = marker.images.iter().position(|img| img.id == image_id) {
                    marker.images.remove(pos);
                    return Ok(());
                }
            }
            Err(Error::store(format!("Image not found: {}", image_id)))
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<MarkerId, Marker>> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy, rebuild the snapshot, then commit and publish.
    ///
    /// Nothing is committed if either step fails.
    fn mutate<T>(&self, change: impl FnOnce(&mut BTreeMap<MarkerId, Marker>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = change(&mut next)?;

        let snapshot = MarkerSnapshot::from_config(next.values().cloned().collect(), &self.proximity)?;
        *guard = next;
        self.publisher.send_replace(Arc::new(snapshot));
        Ok(out)
    }
}

impl Default for InMemoryMarkerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn list_all(&self) -> BoxFuture<'_, Result<Vec<Marker>>> {
        let markers = self.lock().values().cloned().collect();
        Box::pin(async move { Ok(markers) })
    }

    fn subscribe(&self) -> watch::Receiver<Arc<MarkerSnapshot>> {
        self.publisher.subscribe()
    }
}
