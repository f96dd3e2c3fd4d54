//! Haversine distance calculation.
//!
//! The Haversine formula calculates the great-circle distance between two points
//! on a sphere given their longitudes and latitudes.

use crate::Coordinate;

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculates the great-circle distance between two coordinates in kilometers.
///
/// # Example
/// ```
/// use markerwatch_geo::{haversine_distance, Coordinate};
///
/// let moscow = Coordinate::new(55.7558, 37.6173);
/// let perm = Coordinate::new(58.010455, 56.229443);
///
/// let distance = haversine_distance(&moscow, &perm);
/// assert!((distance - 1155.0).abs() < 15.0);
/// ```
#[inline]
pub fn haversine_distance(from: &Coordinate, to: &Coordinate) -> f64 {
    haversine_distance_with_radius(from, to, EARTH_RADIUS_KM)
}

/// Calculates the great-circle distance between two coordinates in meters.
///
/// This is the distance used for proximity decisions. The result is always
/// finite and non-negative for valid coordinates, including identical points
/// (exactly `0.0`) and antipodal points (`π · R`).
///
/// # Arguments
/// * `from` - Starting coordinate
/// * `to` - Ending coordinate
///
/// # Returns
/// Distance in meters
#[inline]
pub fn haversine_distance_meters(from: &Coordinate, to: &Coordinate) -> f64 {
    haversine_distance_with_radius(from, to, EARTH_RADIUS_M)
}

/// Distance in meters between two raw decimal-degree points.
///
/// ```
/// use markerwatch_geo::distance;
///
/// assert_eq!(distance(55.7558, 37.6173, 55.7558, 37.6173), 0.0);
/// assert!((distance(1.0, 2.0, 3.0, 4.0) - distance(3.0, 4.0, 1.0, 2.0)).abs() < 1e-9);
/// ```
#[inline]
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance_meters(&Coordinate::new(lat1, lon1), &Coordinate::new(lat2, lon2))
}

/// Internal function that calculates distance with a custom radius.
#[inline]
fn haversine_distance_with_radius(from: &Coordinate, to: &Coordinate, radius: f64) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair outside [0, 1] near antipodes; sqrt(1 - a) would be NaN.
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}
