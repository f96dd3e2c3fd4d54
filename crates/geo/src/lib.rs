//! Geodesic utilities for proximity alerts.
//!
//! This crate provides:
//! - Haversine distance calculations (clamped, safe for identical and antipodal points)
//! - Batch distance calculations with optional parallelism
//! - Spatial candidate lookup (linear scan or uniform grid) for "what is near me" queries
//!
//! # Example
//!
//! ```
//! use markerwatch_geo::{haversine_distance_meters, Coordinate};
//!
//! let red_square = Coordinate::new(55.7539, 37.6208);
//! let kremlin = Coordinate::new(55.7520, 37.6175);
//!
//! let meters = haversine_distance_meters(&red_square, &kremlin);
//! assert!(meters > 200.0 && meters < 400.0);
//! ```

mod haversine;
pub mod batch;
mod error;
pub mod index;

pub use haversine::{
    distance, haversine_distance, haversine_distance_meters, EARTH_RADIUS_KM,
    EARTH_RADIUS_M,
};
pub use batch::{calculate_distances, within_radius, DistanceResult};
pub use error::{GeoError, GeoErrorCode, Result};
pub use index::{GridIndex, LinearScan, SpatialIndex, MIN_CELL_DEGREES};

/// A geographic coordinate with latitude and longitude (WGS-84 decimal degrees).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    ///
    /// # Arguments
    /// * `latitude` - Latitude in degrees (-90 to 90)
    /// * `longitude` - Longitude in degrees (-180 to 180)
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns true if the coordinate has valid values.
    ///
    /// NaN never compares in range, so non-finite input is rejected too.
    #[inline]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Returns the coordinate unchanged if it is valid.
    pub fn validate(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(GeoError::InvalidCoordinate(format!(
                "({}, {}) is outside [-90, 90] x [-180, 180]",
                self.latitude, self.longitude
            )))
        }
    }

    /// Converts degrees to radians for internal calculations.
    #[inline]
    pub(crate) fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_creation() {
        let coord = Coordinate::new(55.7558, 37.6173);
        assert_eq!(coord.latitude, 55.7558);
        assert_eq!(coord.longitude, 37.6173);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(Coordinate::new(90.0, 180.0).is_valid());
        assert!(Coordinate::new(-90.0, -180.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_validate_reports_values() {
        let err = Coordinate::new(95.0, 10.0).validate().unwrap_err();
        assert!(err.to_string().contains("95"));
        assert_eq!(err.code(), GeoErrorCode::InvalidCoordinate);
    }

    #[test]
    fn test_coordinate_from_tuple() {
        let coord: Coordinate = (58.010455, 56.229443).into();
        assert_eq!(coord.latitude, 58.010455);
    }
}
