//! Structured error handling with codes, context and recovery suggestions
//!
//! Every failure the proximity pipeline can hit maps onto an [`ErrorCode`].
//! Permission, sensor and notification failures are *recoverable*: the host
//! degrades the affected feature and keeps running.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General errors (1xxx)
    Internal = 1001,
    Cancelled = 1002,

    // Permission errors (2xxx)
    PermissionDenied = 2000,
    LocationPermissionDenied = 2001,
    NotificationPermissionDenied = 2002,

    // Configuration errors (3xxx)
    ConfigError = 3000,
    ConfigNotFound = 3001,
    ConfigParseError = 3002,
    InvalidConfigValue = 3003,

    // Sensor errors (4xxx)
    SensorUnavailable = 4000,
    LocationStreamClosed = 4001,

    // Notification errors (5xxx)
    NotificationScheduleFailed = 5001,
    NotificationDismissFailed = 5002,

    // Validation errors (6xxx)
    ValidationError = 6000,
    InvalidCoordinate = 6001,
    DuplicateMarker = 6002,
    MarkerNotFound = 6003,

    // Store errors (7xxx)
    StoreError = 7000,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "Permission",
            3 => "Configuration",
            4 => "Sensor",
            5 => "Notification",
            6 => "Validation",
            7 => "Store",
            _ => "Unknown",
        }
    }

    /// Whether the affected subsystem should degrade instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.code() / 1000, 2 | 4 | 5)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {}", ctx)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// See [`ErrorCode::is_recoverable`].
    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    /// Convert to a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    // Convenience constructors

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    pub fn location_permission_denied() -> Self {
        Self::new(ErrorCode::LocationPermissionDenied, "Location access was not granted")
            .with_suggestion("Allow location access for the app in the system settings")
    }

    pub fn notification_permission_denied() -> Self {
        Self::new(
            ErrorCode::NotificationPermissionDenied,
            "Notification permission was not granted",
        )
        .with_suggestion("Enable notifications for the app to receive proximity alerts")
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create a .markerwatch.toml file or pass --config with a valid path")
    }

    pub fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfigValue,
            format!("Invalid value for `{}`: {}", key, message.into()),
        )
    }

    pub fn sensor_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SensorUnavailable, message)
            .with_suggestion("Turn on location services for the device")
    }

    pub fn stream_closed() -> Self {
        Self::new(ErrorCode::LocationStreamClosed, "Location stream closed")
    }

    pub fn schedule_failed(marker_id: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotificationScheduleFailed, message)
            .with_context(format!("Scheduling notification for marker {}", marker_id))
    }

    pub fn dismiss_failed(marker_id: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotificationDismissFailed, message)
            .with_context(format!("Dismissing notification for marker {}", marker_id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn invalid_coordinate(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCoordinate, message)
    }

    pub fn duplicate_marker(id: &str) -> Self {
        Self::new(ErrorCode::DuplicateMarker, format!("Duplicate marker id: {}", id))
    }

    pub fn marker_not_found(id: &str) -> Self {
        Self::new(ErrorCode::MarkerNotFound, format!("Marker not found: {}", id))
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreError, message)
    }
}

/// Serializable error report for logging and API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for CLI commands
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const VALIDATION_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const PERMISSION_DENIED: i32 = 4;
}

// Implement From for common error types

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::ConfigNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::Internal,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::ValidationError, format!("JSON parse error: {}", err))
            .with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {}", err))
            .with_source(err)
    }
}

impl From<markerwatch_geo::GeoError> for Error {
    fn from(err: markerwatch_geo::GeoError) -> Self {
        let code = match err.code() {
            markerwatch_geo::GeoErrorCode::InvalidCoordinate => ErrorCode::InvalidCoordinate,
            markerwatch_geo::GeoErrorCode::InvalidRadius => ErrorCode::InvalidConfigValue,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NotificationPermissionDenied.to_string(), "E2002");
        assert_eq!(ErrorCode::SensorUnavailable.to_string(), "E4000");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::LocationPermissionDenied.category(), "Permission");
        assert_eq!(ErrorCode::NotificationDismissFailed.category(), "Notification");
        assert_eq!(ErrorCode::DuplicateMarker.category(), "Validation");
    }

    #[test]
    fn test_recoverable_classes() {
        assert!(Error::notification_permission_denied().is_recoverable());
        assert!(Error::sensor_unavailable("gps off").is_recoverable());
        assert!(Error::schedule_failed("m1", "tray full").is_recoverable());
        assert!(!Error::invalid_config("proximity.threshold_meters", "must be > 0").is_recoverable());
        assert!(!Error::duplicate_marker("m1").is_recoverable());
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::config_not_found("/path/to/markerwatch.toml")
            .with_context("While loading configuration");

        assert_eq!(err.code, ErrorCode::ConfigNotFound);
        assert!(err.context.is_some());
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_geo_error_conversion() {
        let err: Error = markerwatch_geo::Coordinate::new(100.0, 0.0).validate().unwrap_err().into();
        assert_eq!(err.code, ErrorCode::InvalidCoordinate);
        assert!(err.source.is_some());
    }

    #[test]
    fn test_error_report_serialization() {
        let err = Error::dismiss_failed("42", "handle expired");

        let report = err.to_report();
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("E5002"));
        assert!(json.contains("Notification"));
        assert!(json.contains("marker 42"));
    }
}
