//! Candidate lookup: "which items lie within `r` meters of this position".
//!
//! Two implementations share the [`SpatialIndex`] trait:
//! - [`LinearScan`] measures every item (fine for tens of markers)
//! - [`GridIndex`] buckets items into a uniform lat/lon grid and only measures
//!   items in the cells the search cap can touch
//!
//! Both return exact haversine results, so callers can swap one for the other
//! without observable change.

use crate::batch::{within_radius, DistanceResult};
use crate::{haversine_distance_meters, Coordinate, GeoError, Result, EARTH_RADIUS_M};
use std::collections::HashMap;
use std::fmt;

/// Slack added to cap extents so rounding never drops a point on the boundary.
const EDGE_MARGIN_DEGREES: f64 = 1e-9;

/// A rebuildable set of identified coordinates answering radius queries.
pub trait SpatialIndex<K>: Send + Sync + fmt::Debug {
    /// Replace the indexed contents.
    fn rebuild(&mut self, items: Vec<(K, Coordinate)>);

    /// Items within `radius_m` meters (inclusive) of `origin`, closest first.
    fn within(&self, origin: &Coordinate, radius_m: f64) -> Vec<DistanceResult<K>>;

    /// Number of indexed items.
    fn len(&self) -> usize;

    /// Whether the index holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Brute-force index: one distance per item per query.
#[derive(Debug, Clone, Default)]
pub struct LinearScan<K> {
    items: Vec<(K, Coordinate)>,
}

impl<K> LinearScan<K> {
    /// Create an empty linear index.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<K> SpatialIndex<K> for LinearScan<K>
where
    K: Clone + Send + Sync + fmt::Debug,
{
    fn rebuild(&mut self, items: Vec<(K, Coordinate)>) {
        self.items = items;
    }

    fn within(&self, origin: &Coordinate, radius_m: f64) -> Vec<DistanceResult<K>> {
        within_radius(origin, &self.items, radius_m)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Smallest accepted grid cell, roughly 11 m of latitude.
pub const MIN_CELL_DEGREES: f64 = 1e-4;

/// Cell lookups a grid query may spend per stored item before it scans instead.
const CELLS_PER_ITEM: u64 = 4;

/// Uniform latitude/longitude grid.
///
/// Column indices wrap at the antimeridian; queries whose cap reaches a pole
/// span every column of the touched rows. A query that would visit more cells
/// than a small multiple of the item count measures every item instead, so its cost never exceeds
/// a linear scan by more than a constant.
#[derive(Debug, Clone)]
pub struct GridIndex<K> {
    cell_degrees: f64,
    column_degrees: f64,
    columns: i64,
    rows: i64,
    items: Vec<(K, Coordinate)>,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl<K> GridIndex<K> {
    /// Create an empty grid with square cells of `cell_degrees` on a side.
    ///
    /// Fails below [`MIN_CELL_DEGREES`].
    pub fn new(cell_degrees: f64) -> Result<Self> {
        if !cell_degrees.is_finite() || cell_degrees < MIN_CELL_DEGREES {
            return Err(GeoError::InvalidRadius(cell_degrees));
        }
        let columns = ((360.0 / cell_degrees).round() as i64).max(1);
        Ok(Self {
            cell_degrees,
            // Columns must tile 360° exactly for the antimeridian wrap to line up.
            column_degrees: 360.0 / columns as f64,
            columns,
            rows: ((180.0 / cell_degrees).ceil() as i64).max(1),
            items: Vec::new(),
            cells: HashMap::new(),
        })
    }

    /// Cell size in degrees.
    pub fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    fn column(&self, longitude: f64) -> i64 {
        (((longitude + 180.0) / self.column_degrees).floor() as i64).rem_euclid(self.columns)
    }

    fn row(&self, latitude: f64) -> i64 {
        (((latitude + 90.0) / self.cell_degrees).floor() as i64).clamp(0, self.rows - 1)
    }

    /// First and last (unwrapped) column touched by a cap of `angular_radius`
    /// radians around `origin`, or `None` when it touches every column.
    fn column_span(&self, origin: &Coordinate, angular_radius: f64) -> Option<(i64, i64)> {
        let lat = origin.latitude.to_radians();
        if lat.abs() + angular_radius >= std::f64::consts::FRAC_PI_2 {
            return None;
        }
        let ratio = angular_radius.sin() / lat.cos();
        if ratio >= 1.0 {
            return None;
        }
        let half_span = ratio.asin().to_degrees() + EDGE_MARGIN_DEGREES;

        let first = ((origin.longitude - half_span + 180.0) / self.column_degrees).floor() as i64;
        let last = ((origin.longitude + half_span + 180.0) / self.column_degrees).floor() as i64;
        if last - first + 1 >= self.columns {
            return None;
        }
        Some((first, last))
    }
}

impl<K> SpatialIndex<K> for GridIndex<K>
where
    K: Clone + Send + Sync + fmt::Debug,
{
    fn rebuild(&mut self, items: Vec<(K, Coordinate)>) {
        self.cells.clear();
        for (slot, (_, coord)) in items.iter().enumerate() {
            let key = (self.row(coord.latitude), self.column(coord.longitude));
            self.cells.entry(key).or_default().push(slot);
        }
        self.items = items;
    }

    fn within(&self, origin: &Coordinate, radius_m: f64) -> Vec<DistanceResult<K>> {
        if self.items.is_empty() || !(radius_m >= 0.0) {
            return Vec::new();
        }

        let angular_radius = (radius_m / EARTH_RADIUS_M).min(std::f64::consts::PI);
        let spread = angular_radius.to_degrees() + EDGE_MARGIN_DEGREES;
        let first_row = self.row(origin.latitude - spread);
        let last_row = self.row(origin.latitude + spread);
        let span = self.column_span(origin, angular_radius);

        let row_count = (last_row - first_row + 1) as u64;
        let column_count = span.map_or(self.columns, |(first, last)| last - first + 1) as u64;
        if row_count.saturating_mul(column_count) > CELLS_PER_ITEM * self.items.len() as u64 {
            return within_radius(origin, &self.items, radius_m);
        }

        let mut results = Vec::new();
        for row in first_row..=last_row {
            for offset in 0..column_count as i64 {
                let column = match span {
                    Some((first, _)) => (first + offset).rem_euclid(self.columns),
                    None => offset,
                };
                let Some(slots) = self.cells.get(&(row, column)) else { continue };
                for &slot in slots {
                    let (id, coord) = &self.items[slot];
                    let distance_m = haversine_distance_meters(origin, coord);
                    if distance_m <= radius_m {
                        results.push(DistanceResult { id: id.clone(), distance_m });
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            a.distance_m.partial_cmp(&b.distance_m).unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}
