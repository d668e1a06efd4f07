//! BDD step definitions for the live update feature

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use weather_gauges::channel::{ConnectionState, LiveChannel, NEW_READINGS_EVENT};
use weather_gauges::config::DeviceConfig;
use weather_gauges::io::EventStreamFactory;
use weather_gauges::sse::SseEvent;

use crate::steps::display_steps::registry;
use crate::world::{eventually, fast_reconnect, GaugeWorld};

/// Start the channel in the background without waiting for it to connect
pub fn start_channel(world: &mut GaugeWorld) {
    let registry = registry(world);
    let channel = Arc::new(LiveChannel::new(
        DeviceConfig::default().events_url(),
        Arc::clone(&world.streams) as Arc<dyn EventStreamFactory>,
        registry,
        world.reconnect.clone().unwrap_or_else(fast_reconnect),
        CancellationToken::new(),
    ));
    let runner = Arc::clone(&channel);
    world.channel_task = Some(tokio::spawn(async move { runner.run().await }));
    world.channel = Some(channel);
}

async fn push_and_settle(world: &mut GaugeWorld, event: SseEvent) {
    let channel = world.channel();
    let before = channel.stats();
    let handled_before = before.readings_applied + before.readings_rejected;
    let is_readings = event.event == NEW_READINGS_EVENT;

    world.streams.push(event);

    if is_readings {
        eventually("the payload to be handled", || {
            let stats = channel.stats();
            stats.readings_applied + stats.readings_rejected > handled_before
        })
        .await;
    } else {
        // Nothing observable changes; give the channel a moment to log it
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// --- Given steps ---

#[given("the live channel is connected")]
async fn live_channel_connected(world: &mut GaugeWorld) {
    start_channel(world);
    let channel = world.channel();
    eventually("the channel to open", || channel.state() == ConnectionState::Open).await;
}

// --- When steps ---

#[when(expr = "the station pushes new_readings {string}")]
async fn station_pushes_readings(world: &mut GaugeWorld, data: String) {
    push_and_settle(world, SseEvent::new(NEW_READINGS_EVENT, &data)).await;
}

#[when(expr = "the station pushes new_readings {string} with id {string}")]
async fn station_pushes_readings_with_id(world: &mut GaugeWorld, data: String, id: String) {
    let mut event = SseEvent::new(NEW_READINGS_EVENT, &data);
    event.id = Some(id);
    push_and_settle(world, event).await;
}

#[when(expr = "the station pushes a {string} event with {string}")]
async fn station_pushes_event(world: &mut GaugeWorld, name: String, data: String) {
    push_and_settle(world, SseEvent::new(&name, &data)).await;
}

// --- Then steps ---

#[then(expr = "the live channel is {string}")]
fn live_channel_is(world: &mut GaugeWorld, state: String) {
    assert_eq!(world.channel().state().to_string(), state);
}

#[then(expr = "{int} live payload(s) was/were rejected")]
fn payloads_rejected(world: &mut GaugeWorld, count: u64) {
    assert_eq!(world.channel().stats().readings_rejected, count);
}
