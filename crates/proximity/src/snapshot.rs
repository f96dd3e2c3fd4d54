//! Immutable, indexed view of the marker set.
//!
//! The store publishes a new `Arc<MarkerSnapshot>` after every change; the
//! evaluator only ever reads one.

use crate::model::{Marker, MarkerId};
use markerwatch_core::config::{IndexKind, ProximityConfig};
use markerwatch_core::{Error, Result};
use markerwatch_geo::{Coordinate, GridIndex, LinearScan, SpatialIndex};
use std::collections::HashMap;

/// Markers keyed by id plus a spatial index over their coordinates.
#[derive(Debug)]
pub struct MarkerSnapshot {
    markers: HashMap<MarkerId, Marker>,
    index: Box<dyn SpatialIndex<MarkerId>>,
}

impl MarkerSnapshot {
    /// Snapshot with no markers.
    pub fn empty() -> Self {
        Self {
            markers: HashMap::new(),
            index: Box::new(LinearScan::new()),
        }
    }

    /// Linear-scan snapshot.
    pub fn new(markers: Vec<Marker>) -> Result<Self> {
        Self::with_index(markers, Box::new(LinearScan::new()))
    }

    /// Snapshot using the index kind named in the configuration.
    pub fn from_config(markers: Vec<Marker>, config: &ProximityConfig) -> Result<Self> {
        let index: Box<dyn SpatialIndex<MarkerId>> = match config.index {
            IndexKind::Linear => Box::new(LinearScan::new()),
            IndexKind::Grid => Box::new(GridIndex::new(config.grid_cell_degrees)?),
        };
        Self::with_index(markers, index)
    }

    /// Build with a caller-supplied index.
    ///
    /// Fails on a duplicate id or an invalid coordinate.
    pub fn with_index(markers: Vec<Marker>, mut index: Box<dyn SpatialIndex<MarkerId>>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(markers.len());
        for marker in markers {
            marker.validate()?;
            if by_id.contains_key(&marker.id) {
                return Err(Error::duplicate_marker(marker.id.as_str()));
            }
            by_id.insert(marker.id.clone(), marker);
        }

        index.rebuild(
            by_id
                .values()
                .map(|m| (m.id.clone(), m.coordinate))
                .collect(),
        );

        Ok(Self { markers: by_id, index })
    }

    /// Markers within `radius_m` of `position` with their distances, closest first.
    pub fn near(&self, position: &Coordinate, radius_m: f64) -> Vec<(&Marker, f64)> {
        self.index
            .within(position, radius_m)
            .into_iter()
            .filter_map(|hit| self.markers.get(&hit.id).map(|m| (m, hit.distance_m)))
            .collect()
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.markers.contains_key(id)
    }

    pub fn get(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers.get(id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Markers in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Name of the spatial index, for logs.
    pub fn index_name(&self) -> &'static str {
        self.index.name()
    }
}

impl Default for MarkerSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
