//! Batch distance calculations with optional parallelism.
//!
//! Used by the linear-scan index to measure one position fix against every
//! known marker in a single pass.

use crate::{haversine_distance_meters, Coordinate};
use serde::{Deserialize, Serialize};

/// Result of a distance calculation for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult<K> {
    /// The item ID
    pub id: K,
    /// Calculated distance in meters
    pub distance_m: f64,
}

/// Calculate distances in meters from `origin` to every item.
///
/// Output order matches input order.
///
/// # Example
/// ```
/// use markerwatch_geo::{calculate_distances, Coordinate};
///
/// let items = vec![
///     ("home", Coordinate::new(58.010455, 56.229443)),
///     ("work", Coordinate::new(58.0150, 56.2400)),
/// ];
///
/// let results = calculate_distances(&Coordinate::new(58.0105, 56.2295), &items);
/// assert_eq!(results.len(), 2);
/// assert!(results[0].distance_m < results[1].distance_m);
/// ```
pub fn calculate_distances<K>(origin: &Coordinate, items: &[(K, Coordinate)]) -> Vec<DistanceResult<K>>
where
    K: Clone + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        items
            .par_iter()
            .map(|(id, coord)| calculate_single_distance(origin, id, coord))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        items
            .iter()
            .map(|(id, coord)| calculate_single_distance(origin, id, coord))
            .collect()
    }
}

/// Calculate distances and keep only items within `radius_m` (inclusive),
/// sorted closest first.
pub fn within_radius<K>(origin: &Coordinate, items: &[(K, Coordinate)], radius_m: f64) -> Vec<DistanceResult<K>>
where
    K: Clone + Send + Sync,
{
    let mut results = calculate_distances(origin, items);

    results.retain(|r| r.distance_m <= radius_m);

    results.sort_by(|a, b| {
        a.distance_m.partial_cmp(&b.distance_m).unwrap_or(std::cmp::Ordering::Equal)
    });

    results
}

#[inline]
fn calculate_single_distance<K: Clone>(origin: &Coordinate, id: &K, coord: &Coordinate) -> DistanceResult<K> {
    DistanceResult {
        id: id.clone(),
        distance_m: haversine_distance_meters(origin, coord),
    }
}
