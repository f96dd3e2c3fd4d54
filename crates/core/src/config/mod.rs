//! Configuration loading and schema definitions
//!
//! TOML file with `[proximity]`, `[location]`, `[notifications]` and
//! `[logging]` sections, validated on load.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
