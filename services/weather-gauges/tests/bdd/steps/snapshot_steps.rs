//! BDD step definitions for the snapshot feature

use std::sync::Arc;

use cucumber::{given, then, when};

use weather_gauges::config::DeviceConfig;
use weather_gauges::snapshot::SnapshotLoader;

use crate::steps::display_steps::registry;
use crate::world::{GaugeWorld, SnapshotReply};

// --- Given steps ---

#[given(expr = "the station serves the snapshot {string}")]
fn station_serves_snapshot(world: &mut GaugeWorld, body: String) {
    *world.station.snapshot.lock().unwrap() = SnapshotReply::Respond { status: 200, body };
}

#[given(expr = "the station answers the snapshot with status {int}")]
fn station_answers_with_status(world: &mut GaugeWorld, status: u16) {
    *world.station.snapshot.lock().unwrap() = SnapshotReply::Respond {
        status,
        body: r#"{"ws_temp_c": 21.5}"#.to_string(),
    };
}

#[given("the station cannot be reached for the snapshot")]
fn station_unreachable(world: &mut GaugeWorld) {
    *world.station.snapshot.lock().unwrap() = SnapshotReply::Unreachable;
}

// --- When steps ---

#[when("the snapshot is loaded")]
async fn snapshot_is_loaded(world: &mut GaugeWorld) {
    let registry = registry(world);
    let loader = SnapshotLoader::new(
        DeviceConfig::default().readings_url(),
        Arc::clone(&world.station) as Arc<dyn weather_gauges::io::HttpClient>,
        registry,
    );
    world.snapshot_outcome = Some(loader.load().await);
}

// --- Then steps ---

#[then(expr = "the snapshot outcome is {string}")]
fn snapshot_outcome_is(world: &mut GaugeWorld, expected: String) {
    let outcome = world.snapshot_outcome.expect("snapshot was not loaded");
    assert_eq!(format!("{:?}", outcome), expected);
}

#[then("the snapshot was requested once")]
fn snapshot_requested_once(world: &mut GaugeWorld) {
    assert_eq!(world.station.requests_to("/readings").len(), 1);
}
