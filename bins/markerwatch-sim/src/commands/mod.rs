//! Subcommand implementations

pub mod check_config;
pub mod distance;
pub mod replay;
