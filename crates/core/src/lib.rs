//! Core types shared by the markerwatch crates
//!
//! - **Error handling**: coded errors with context, recovery suggestions and
//!   a recoverable/fatal split for permission, sensor and notification failures
//! - **Configuration**: TOML configuration for the proximity threshold,
//!   location watch options, notification content and logging
//!
//! # Example
//!
//! ```rust
//! use markerwatch_core::config::Config;
//!
//! let config = Config::from_toml_str("[proximity]\nthreshold_meters = 75.0\n").unwrap();
//! assert_eq!(config.schema.proximity.threshold().meters(), 75.0);
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

pub use error::{exit_codes, Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        Config, ConfigSchema, IndexKind, LocationAccuracy, LocationConfig, NotificationsConfig,
        ProximityConfig, ProximityThreshold,
    };
    pub use crate::error::{exit_codes, Error, ErrorCode, ErrorReport, Result, ResultExt};
}
