//! BDD step definitions shared by every feature: the dashboard and its gauges

use std::sync::Arc;

use cucumber::{given, then};

use weather_gauges::instrument::default_instruments;
use weather_gauges::{ReadingName, SinkRegistry};

use crate::world::GaugeWorld;

/// Build the dashboard on first use
pub fn registry(world: &mut GaugeWorld) -> Arc<SinkRegistry> {
    if let Some(registry) = &world.registry {
        return Arc::clone(registry);
    }
    let (registry, gauges) = SinkRegistry::animated(default_instruments()).unwrap();
    let registry =
        Arc::new(registry.with_snapshot_yielding_to_live(world.snapshot_yields_to_live));
    world.registry = Some(Arc::clone(&registry));
    world.gauges = gauges;
    registry
}

pub fn reading_for(key: &str) -> ReadingName {
    ReadingName::ALL
        .into_iter()
        .find(|r| r.wire_key() == key)
        .unwrap_or_else(|| panic!("unknown reading key '{}'", key))
}

// --- Given steps ---

#[given("the default dashboard")]
fn default_dashboard(world: &mut GaugeWorld) {
    registry(world);
}

#[given("snapshot values yield to live updates")]
fn snapshot_yields(world: &mut GaugeWorld) {
    assert!(
        world.registry.is_none(),
        "set the merge policy before the dashboard is built"
    );
    world.snapshot_yields_to_live = true;
}

// --- Then steps ---

#[then(expr = "the {string} gauge shows {float}")]
fn gauge_shows(world: &mut GaugeWorld, key: String, value: f64) {
    let gauge = world.gauge(reading_for(&key));
    assert!(gauge.assignments() > 0, "gauge for {} was never updated", key);
    assert_eq!(gauge.target(), value, "gauge for {}", key);
}

#[then(expr = "only the {string} gauges were updated")]
fn only_gauges_updated(world: &mut GaugeWorld, keys: String) {
    let expected: Vec<ReadingName> = keys.split(',').map(|k| reading_for(k.trim())).collect();
    for gauge in &world.gauges {
        let reading = gauge.config().reading;
        assert_eq!(
            gauge.assignments() > 0,
            expected.contains(&reading),
            "unexpected update state for {}",
            reading
        );
    }
}

#[then("no gauge was updated")]
fn no_gauge_updated(world: &mut GaugeWorld) {
    for gauge in &world.gauges {
        assert_eq!(gauge.assignments(), 0, "{} was updated", gauge.config().reading);
    }
}
