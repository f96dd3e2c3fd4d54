//! `replay` - run a recorded track through the proximity pipeline

use crate::output::{format_count, Status};
use crate::services::{ConsoleTray, ReplaySensor, TrayEvent};
use anyhow::Context;
use markerwatch_core::config::{Config, ProximityThreshold};
use markerwatch_core::{exit_codes, ErrorCode};
use markerwatch_proximity::{
    InMemoryMarkerStore, LocationStream, Marker, MarkerId, MarkerStore, MonitorExit,
    MonitorSummary, NotificationManager, PositionFix, ProximityEvaluator, ProximityMonitor,
};
use markerwatch_telemetry::TelemetryConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ReplayArgs {
    pub markers: PathBuf,
    pub track: PathBuf,
    pub config: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub deny_notifications: bool,
    pub json: bool,
    pub verbose: bool,
}

#[derive(Serialize)]
struct ReplayReport {
    markers: usize,
    fixes: usize,
    threshold_m: f64,
    notifications_enabled: bool,
    summary: MonitorSummary,
    notifications: Vec<TrayEvent>,
    still_visible: Vec<MarkerId>,
    metrics: serde_json::Value,
}

pub async fn run(args: ReplayArgs) -> anyhow::Result<i32> {
    let config = Config::load(args.config.as_deref())?;
    let mut schema = config.schema;
    if let Some(meters) = args.threshold {
        schema.proximity.threshold_meters = ProximityThreshold::new(meters)?;
    }

    let mut telemetry = TelemetryConfig::from(&schema.logging);
    if args.verbose {
        telemetry.log_level = "debug".to_string();
    }
    let _guard = markerwatch_telemetry::init_with_config(telemetry)?;

    let markers: Vec<Marker> = read_json(&args.markers)?;
    let track: Vec<PositionFix> = read_json(&args.track)?;
    let fixes = track.len();

    let store = InMemoryMarkerStore::with_markers(schema.proximity.clone(), markers)
        .with_context(|| format!("Loading markers from {}", args.markers.display()))?;
    let marker_count = store.list_all().await?.len();

    let tray = Arc::new(ConsoleTray::new(!args.deny_notifications, !args.json));
    let manager = Arc::new(NotificationManager::new(tray.clone(), schema.notifications.clone()));
    if let Err(e) = manager.initialize().await {
        if !e.is_recoverable() {
            return Err(e.into());
        }
        if !args.json {
            Status::warning(&format!("{}, replaying without alerts", e.message));
        }
    }

    let threshold = schema.proximity.threshold();
    if !args.json {
        Status::header(&format!(
            "Replaying {} against {} ({} radius)",
            format_count(fixes, "fix", "fixes"),
            format_count(marker_count, "marker", "markers"),
            threshold
        ));
    }

    let evaluator = ProximityEvaluator::new(manager.clone(), threshold);
    let location = LocationStream::new(Arc::new(ReplaySensor::new(track)), schema.location.clone());
    let handle = ProximityMonitor::new(location, evaluator)
        .start(store.subscribe())
        .await?;
    let summary = handle.join().await?;

    // The replay sensor closes the stream once the track is exhausted.
    let completed = summary.exit.code() == ErrorCode::LocationStreamClosed;

    let report = ReplayReport {
        markers: marker_count,
        fixes,
        threshold_m: threshold.meters(),
        notifications_enabled: manager.is_enabled(),
        summary,
        notifications: tray.events(),
        still_visible: manager.active_ids().await,
        metrics: markerwatch_telemetry::metrics().export_json(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(if completed { exit_codes::SUCCESS } else { exit_codes::FAILURE })
}

fn print_summary(report: &ReplayReport) {
    let shown = report
        .notifications
        .iter()
        .filter(|e| matches!(e, TrayEvent::Shown { .. }))
        .count();
    let dismissed = report.notifications.len() - shown;

    println!();
    match &report.summary.exit {
        MonitorExit::Failed { code: ErrorCode::LocationStreamClosed, .. } => Status::success(&format!(
            "Processed {} ({} filtered)",
            format_count(report.summary.fixes_processed as usize, "fix", "fixes"),
            report.fixes.saturating_sub(report.summary.fixes_processed as usize)
        )),
        MonitorExit::Failed { code, message } => Status::error(&format!("Stopped early: [{}] {}", code, message)),
        MonitorExit::Cancelled => Status::warning("Replay cancelled"),
    }

    if !report.notifications_enabled {
        Status::info("Notifications disabled, nothing was shown");
        return;
    }

    Status::info(&format!(
        "{} shown, {} dismissed",
        format_count(shown, "notification", "notifications"),
        dismissed
    ));
    if !report.still_visible.is_empty() {
        let ids: Vec<&str> = report.still_visible.iter().map(|id| id.as_str()).collect();
        Status::info(&format!("Still visible: {}", ids.join(", ")));
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Parsing {}", path.display()))
}
