//! `check-config` - load, validate and print the effective configuration

use crate::output::Status;
use markerwatch_core::config::Config;
use markerwatch_core::exit_codes;
use serde_json::json;
use std::path::Path;

pub fn run(path: Option<&Path>, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(path)?;

    if json {
        let out = json!({
            "path": config.path.as_ref().map(|p| p.display().to_string()),
            "config": config.schema,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(exit_codes::SUCCESS);
    }

    match &config.path {
        Some(p) => Status::success(&format!("{} is valid", p.display())),
        None => Status::info("No configuration file found, using defaults"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&config.schema)?);

    Ok(exit_codes::SUCCESS)
}
