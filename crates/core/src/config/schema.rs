//! Configuration schema definitions
//!
//! Every section falls back to its defaults when missing from the file.

use crate::error::{Error, Result};
use markerwatch_geo::MIN_CELL_DEGREES;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub proximity: ProximityConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigSchema {
    /// Check every constraint; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        self.proximity.validate()?;
        self.location.validate()?;
        self.notifications.validate()?;
        Ok(())
    }
}

/// Distance in meters at or below which a marker counts as "near".
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ProximityThreshold(f64);

impl ProximityThreshold {
    /// Default radius, matching the 50 m circle drawn around the user on the map.
    pub const DEFAULT_METERS: f64 = 50.0;

    /// Validate and wrap a threshold in meters.
    pub fn new(meters: f64) -> Result<Self> {
        if meters.is_finite() && meters > 0.0 {
            Ok(Self(meters))
        } else {
            Err(Error::invalid_config(
                "proximity.threshold_meters",
                format!("must be a finite number greater than 0, got {}", meters),
            ))
        }
    }

    /// The threshold in meters.
    pub fn meters(self) -> f64 {
        self.0
    }
}

impl Default for ProximityThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT_METERS)
    }
}

impl<'de> Deserialize<'de> for ProximityThreshold {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let meters = f64::deserialize(deserializer)?;
        Self::new(meters).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ProximityThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} m", self.0)
    }
}

/// Which candidate lookup the evaluator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Measure every marker on every fix.
    #[default]
    Linear,
    /// Uniform lat/lon grid.
    Grid,
}

/// Proximity evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityConfig {
    #[serde(default)]
    pub threshold_meters: ProximityThreshold,

    #[serde(default)]
    pub index: IndexKind,

    /// Grid cell size in degrees, only read when `index = "grid"`
    #[serde(default = "default_grid_cell_degrees")]
    pub grid_cell_degrees: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_meters: ProximityThreshold::default(),
            index: IndexKind::default(),
            grid_cell_degrees: default_grid_cell_degrees(),
        }
    }
}

impl ProximityConfig {
    /// Validated threshold.
    pub fn threshold(&self) -> ProximityThreshold {
        self.threshold_meters
    }

    fn validate(&self) -> Result<()> {
        ProximityThreshold::new(self.threshold_meters.meters())?;
        if !(self.grid_cell_degrees.is_finite() && self.grid_cell_degrees >= MIN_CELL_DEGREES) {
            return Err(Error::invalid_config(
                "proximity.grid_cell_degrees",
                format!("must be at least {}, got {}", MIN_CELL_DEGREES, self.grid_cell_degrees),
            ));
        }
        Ok(())
    }
}

fn default_grid_cell_degrees() -> f64 {
    0.01
}

/// Location accuracy tier requested from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationAccuracy {
    Lowest,
    Low,
    #[default]
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Location watch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub accuracy: LocationAccuracy,

    /// Minimum movement in meters between two delivered fixes
    #[serde(default = "default_distance_interval")]
    pub distance_interval_meters: f64,

    /// Capacity of the bounded fix channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Drop fixes whose timestamp is older than the last delivered fix
    #[serde(default = "default_true")]
    pub reject_stale_fixes: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            accuracy: LocationAccuracy::default(),
            distance_interval_meters: default_distance_interval(),
            channel_capacity: default_channel_capacity(),
            reject_stale_fixes: true,
        }
    }
}

impl LocationConfig {
    fn validate(&self) -> Result<()> {
        if !(self.distance_interval_meters.is_finite() && self.distance_interval_meters >= 0.0) {
            return Err(Error::invalid_config(
                "location.distance_interval_meters",
                format!("must be 0 or more, got {}", self.distance_interval_meters),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid_config("location.channel_capacity", "must be at least 1"));
        }
        Ok(())
    }
}

fn default_distance_interval() -> f64 {
    5.0
}

fn default_channel_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

/// Notification content and foreground presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Notification title
    #[serde(default = "default_title")]
    pub title: String,

    /// Body template; `{title}` and `{id}` are replaced with the marker's values
    #[serde(default = "default_body")]
    pub body: String,

    #[serde(default = "default_true")]
    pub play_sound: bool,

    #[serde(default = "default_true")]
    pub show_banner: bool,

    #[serde(default)]
    pub set_badge: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            play_sound: true,
            show_banner: true,
            set_badge: false,
        }
    }
}

impl NotificationsConfig {
    /// Fill the body template for one marker.
    pub fn render_body(&self, marker_id: &str, marker_title: &str) -> String {
        self.body.replace("{title}", marker_title).replace("{id}", marker_id)
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::invalid_config("notifications.title", "must not be empty"));
        }
        Ok(())
    }
}

fn default_title() -> String {
    "You are near a marker!".to_string()
}

fn default_body() -> String {
    "You are near \"{title}\"".to_string()
}

/// Logging settings handed to the telemetry crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of compact text
    #[serde(default)]
    pub json: bool,

    /// Directory for a daily rolling log file; empty means stderr only
    #[serde(default)]
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
