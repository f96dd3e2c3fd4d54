//! `distance` - haversine distance between two points

use crate::output::format_distance;
use markerwatch_core::exit_codes;
use markerwatch_geo::{haversine_distance_meters, Coordinate};
use serde_json::json;

pub fn run(lat1: f64, lon1: f64, lat2: f64, lon2: f64, json: bool) -> anyhow::Result<i32> {
    let from = Coordinate::new(lat1, lon1)
        .validate()
        .map_err(markerwatch_core::Error::from)?;
    let to = Coordinate::new(lat2, lon2)
        .validate()
        .map_err(markerwatch_core::Error::from)?;

    let meters = haversine_distance_meters(&from, &to);

    if json {
        let out = json!({ "from": from, "to": to, "meters": meters });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_distance(meters));
    }

    Ok(exit_codes::SUCCESS)
}
