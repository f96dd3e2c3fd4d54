//! markerwatch-sim - proximity alert simulator
//!
//! Replays a recorded location track against a marker file through the full
//! proximity pipeline and prints every notification the device would show.

use clap::{Parser, Subcommand};
use markerwatch_core::exit_codes;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;
mod services;

/// Replay location tracks against saved markers
#[derive(Parser)]
#[command(name = "markerwatch-sim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded track through the proximity pipeline
    Replay {
        /// JSON array of markers ({id, latitude, longitude, title, ...})
        #[arg(short, long)]
        markers: PathBuf,

        /// JSON array of fixes ({latitude, longitude, timestamp})
        #[arg(short, long)]
        track: PathBuf,

        /// Configuration file (searched in the usual places if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the proximity threshold in meters
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f64>,

        /// Simulate the user declining notification permission
        #[arg(long)]
        deny_notifications: bool,
    },

    /// Great-circle distance in meters between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },

    /// Validate a configuration file and print the effective settings
    CheckConfig {
        /// Path to the configuration file (searched if omitted)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            markers,
            track,
            config,
            threshold,
            deny_notifications,
        } => {
            let args = commands::replay::ReplayArgs {
                markers,
                track,
                config,
                threshold,
                deny_notifications,
                json: cli.json,
                verbose: cli.verbose,
            };
            commands::replay::run(args).await
        }

        Commands::Distance { lat1, lon1, lat2, lon2 } => {
            commands::distance::run(lat1, lon1, lat2, lon2, cli.json)
        }

        Commands::CheckConfig { path } => commands::check_config::run(path.as_deref(), cli.json),
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            let coded = e.downcast_ref::<markerwatch_core::Error>();
            match coded {
                Some(err) if cli.json => match serde_json::to_string_pretty(&err.to_report()) {
                    Ok(report) => eprintln!("{}", report),
                    Err(_) => output::Status::error(&format!("{:#}", e)),
                },
                _ => output::Status::error(&format!("{:#}", e)),
            }
            let code = coded.map(exit_code_for).unwrap_or(exit_codes::FAILURE);
            ExitCode::from(code as u8)
        }
    }
}

fn exit_code_for(err: &markerwatch_core::Error) -> i32 {
    match err.code.category() {
        "Configuration" => exit_codes::CONFIG_ERROR,
        "Validation" => exit_codes::VALIDATION_ERROR,
        "Permission" => exit_codes::PERMISSION_DENIED,
        _ => exit_codes::FAILURE,
    }
}
