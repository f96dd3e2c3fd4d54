//! End-to-end tests for the markerwatch-sim binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn sim() -> Command {
    let mut cmd = Command::cargo_bin("markerwatch-sim").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const MARKERS: &str = r#"[
    {"id": "manezh", "latitude": 55.7558, "longitude": 37.6173, "title": "Manezhnaya Square"},
    {"id": "perm", "latitude": 58.010455, "longitude": 56.229443, "title": "Perm Opera"}
]"#;

// Approach the square, linger, walk ~200 m north.
const TRACK: &str = r#"[
    {"latitude": 55.7540, "longitude": 37.6173, "timestamp": "2024-06-10T08:00:00Z"},
    {"latitude": 55.7558, "longitude": 37.6173, "timestamp": "2024-06-10T08:01:00Z"},
    {"latitude": 55.7559, "longitude": 37.6174, "timestamp": "2024-06-10T08:02:00Z"},
    {"latitude": 55.7576, "longitude": 37.6173, "timestamp": "2024-06-10T08:03:00Z"}
]"#;

#[test]
fn test_distance_prints_meters() {
    sim()
        .args(["distance", "55.7558", "37.6173", "55.7558", "37.6173"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.0 m"));
}

#[test]
fn test_distance_accepts_negative_coordinates() {
    sim()
        .args(["--json", "distance", "-33.8688", "151.2093", "-37.8136", "144.9631"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"meters\""));
}

#[test]
fn test_distance_rejects_out_of_range() {
    sim()
        .args(["distance", "91", "0", "0", "0"])
        .assert()
        .code(2);
}

#[test]
fn test_check_config_defaults() {
    let dir = TempDir::new().unwrap();
    sim()
        .current_dir(dir.path())
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("threshold_meters = 50.0"));
}

#[test]
fn test_check_config_rejects_bad_threshold() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "markerwatch.toml", "[proximity]\nthreshold_meters = 0.0\n");
    sim()
        .arg("check-config")
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("threshold_meters"));
}

#[test]
fn test_replay_shows_and_dismisses() {
    let dir = TempDir::new().unwrap();
    let markers = write(&dir, "markers.json", MARKERS);
    let track = write(&dir, "track.json", TRACK);

    sim()
        .current_dir(dir.path())
        .arg("replay")
        .arg("--markers")
        .arg(&markers)
        .arg("--track")
        .arg(&track)
        .assert()
        .success()
        .stdout(predicate::str::contains("You are near \"Manezhnaya Square\""))
        .stdout(predicate::str::contains("1 notification shown, 1 dismissed"));
}

#[test]
fn test_replay_json_report() {
    let dir = TempDir::new().unwrap();
    let markers = write(&dir, "markers.json", MARKERS);
    let track = write(&dir, "track.json", TRACK);

    let output = sim()
        .current_dir(dir.path())
        .args(["--json", "replay"])
        .arg("--markers")
        .arg(&markers)
        .arg("--track")
        .arg(&track)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["markers"], 2);
    assert_eq!(report["fixes"], 4);
    assert_eq!(report["notifications"][0]["event"], "shown");
    assert_eq!(report["notifications"][0]["marker_id"], "manezh");
    assert_eq!(report["notifications"][1]["event"], "dismissed");
    assert_eq!(report["still_visible"].as_array().unwrap().len(), 0);
}

#[test]
fn test_replay_with_denied_notifications() {
    let dir = TempDir::new().unwrap();
    let markers = write(&dir, "markers.json", MARKERS);
    let track = write(&dir, "track.json", TRACK);

    sim()
        .current_dir(dir.path())
        .arg("replay")
        .arg("--markers")
        .arg(&markers)
        .arg("--track")
        .arg(&track)
        .arg("--deny-notifications")
        .assert()
        .success()
        .stdout(predicate::str::contains("Notifications disabled"))
        .stdout(predicate::str::contains("You are near").not());
}

#[test]
fn test_replay_invalid_threshold() {
    let dir = TempDir::new().unwrap();
    let markers = write(&dir, "markers.json", MARKERS);
    let track = write(&dir, "track.json", TRACK);

    sim()
        .current_dir(dir.path())
        .arg("replay")
        .arg("--markers")
        .arg(&markers)
        .arg("--track")
        .arg(&track)
        .args(["--threshold", "-5"])
        .assert()
        .code(3);
}

#[test]
fn test_json_errors_are_reports() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    sim()
        .arg("--json")
        .arg("check-config")
        .arg(&missing)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("\"code_str\": \"E3001\""))
        .stderr(predicate::str::contains("\"category\": \"Configuration\""));
}
