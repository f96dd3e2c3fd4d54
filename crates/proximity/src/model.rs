//! Markers, marker images and position fixes.

use chrono::{DateTime, Utc};
use markerwatch_core::{Error, Result};
use markerwatch_geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque unique marker identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MarkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A photo attached to a marker. Only the URI is tracked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerImage {
    pub id: String,
    pub marker_id: MarkerId,
    pub uri: String,
    pub created_at: DateTime<Utc>,
}

/// A saved point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: MarkerId,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub images: Vec<MarkerImage>,
}

impl Marker {
    /// Marker with the given id, position and title; everything else defaulted.
    pub fn new(id: impl Into<MarkerId>, latitude: f64, longitude: f64, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinate: Coordinate::new(latitude, longitude),
            title: title.into(),
            description: String::new(),
            created_at: Utc::now(),
            images: Vec::new(),
        }
    }

    /// Non-empty id and an in-range coordinate.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(Error::validation("Marker id must not be empty"));
        }
        self.coordinate
            .validate()
            .map_err(|e| Error::from(e).with_context(format!("Marker {}", self.id)))?;
        Ok(())
    }
}

/// Input for creating a marker; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarker {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl NewMarker {
    pub fn new(latitude: f64, longitude: f64, title: impl Into<String>) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            title: title.into(),
            description: String::new(),
        }
    }
}

/// One position sample from the location sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionFix {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
    /// Horizontal accuracy radius reported by the sensor, in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            timestamp,
            accuracy_m: None,
        }
    }

    /// Fix taken now.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markerwatch_core::ErrorCode;

    #[test]
    fn test_marker_json_shape() {
        let json = r#"{
            "id": "1718000000000",
            "latitude": 58.010455,
            "longitude": 56.229443,
            "title": "Opera house",
            "createdAt": "2024-06-10T08:00:00Z"
        }"#;
        let marker: Marker = serde_json::from_str(json).unwrap();
        assert_eq!(marker.id.as_str(), "1718000000000");
        assert_eq!(marker.coordinate, Coordinate::new(58.010455, 56.229443));
        assert!(marker.description.is_empty());
        assert!(marker.images.is_empty());

        let back = serde_json::to_value(&marker).unwrap();
        assert_eq!(back["latitude"], 58.010455);
        assert_eq!(back["createdAt"], "2024-06-10T08:00:00Z");
    }

    #[test]
    fn test_marker_validation() {
        assert!(Marker::new("a", 55.0, 37.0, "ok").validate().is_ok());

        let err = Marker::new("a", 120.0, 37.0, "bad").validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCoordinate);

        let err = Marker::new("  ", 55.0, 37.0, "blank").validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_fix_json_shape() {
        let fix: PositionFix = serde_json::from_str(
            r#"{"latitude": 55.7558, "longitude": 37.6173, "timestamp": "2024-06-10T08:00:05Z"}"#,
        )
        .unwrap();
        assert_eq!(fix.coordinate.latitude, 55.7558);
        assert!(fix.accuracy_m.is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(MarkerId::generate(), MarkerId::generate());
    }
}
