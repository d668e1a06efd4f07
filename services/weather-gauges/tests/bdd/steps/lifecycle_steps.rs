//! BDD step definitions for channel teardown, reconnection and the client lifecycle

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};

use weather_gauges::channel::{ConnectionState, NEW_READINGS_EVENT};
use weather_gauges::clock::WallClock;
use weather_gauges::io::{EventStreamFactory, HttpClient};
use weather_gauges::sse::SseEvent;
use weather_gauges::{Config, GaugeSyncBuilder, ReadingName};

use crate::steps::clock_steps::FixedClock;
use crate::steps::live_steps::start_channel;
use crate::world::{eventually, fast_reconnect, GaugeWorld};

async fn await_channel_task(world: &mut GaugeWorld) {
    let task = world.channel_task.take().expect("live channel not started");
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("live channel did not stop")
        .expect("live channel task panicked");
}

// --- Given steps ---

#[given("the station refuses event stream connections")]
fn station_refuses_streams(world: &mut GaugeWorld) {
    world.streams.refuse.store(true, Ordering::SeqCst);
}

#[given(expr = "reconnection gives up after {int} retries")]
fn reconnect_gives_up(world: &mut GaugeWorld, retries: u32) {
    world.reconnect = Some(weather_gauges::config::ReconnectConfig {
        max_retries: Some(retries),
        ..fast_reconnect()
    });
}

#[given("reconnection is disabled")]
fn reconnect_disabled(world: &mut GaugeWorld) {
    world.reconnect = Some(weather_gauges::config::ReconnectConfig {
        enabled: false,
        ..fast_reconnect()
    });
}

#[given(expr = "a client configured for {string}")]
fn client_configured(world: &mut GaugeWorld, base_url: String) {
    let mut config = Config::default();
    config.device.base_url = base_url;
    config.live.reconnect = fast_reconnect();
    config.panel.enabled = false;
    world.config = Some(config);
}

#[given("the live channel is disabled in the configuration")]
fn live_disabled(world: &mut GaugeWorld) {
    world.config.as_mut().expect("no client config").live.enabled = false;
}

// --- When steps ---

#[when("the live channel starts")]
fn live_channel_starts(world: &mut GaugeWorld) {
    start_channel(world);
}

#[when("the client shuts down")]
async fn client_shuts_down(world: &mut GaugeWorld) {
    let channel = world.channel();
    channel.close();
    await_channel_task(world).await;
    // A second teardown must be harmless
    channel.close();
}

#[when("the station ends the event stream")]
fn station_ends_stream(world: &mut GaugeWorld) {
    world.streams.end();
}

#[when("the client is built")]
fn client_is_built(world: &mut GaugeWorld) {
    let config = world.config.clone().expect("no client config");
    let result = GaugeSyncBuilder::new(config)
        .with_http_client(Arc::clone(&world.station) as Arc<dyn HttpClient>)
        .with_event_streams(Arc::clone(&world.streams) as Arc<dyn EventStreamFactory>)
        .with_wall_clock(Arc::new(FixedClock(1_700_000_000)) as Arc<dyn WallClock>)
        .build();
    world.build_error = result.err().map(|e| e.to_string());
}

#[when(expr = "the client runs until the station pushes new_readings {string}")]
async fn client_runs(world: &mut GaugeWorld, data: String) {
    let config = world.config.clone().expect("no client config");
    let sync = GaugeSyncBuilder::new(config)
        .with_http_client(Arc::clone(&world.station) as Arc<dyn HttpClient>)
        .with_event_streams(Arc::clone(&world.streams) as Arc<dyn EventStreamFactory>)
        .with_wall_clock(Arc::new(FixedClock(1_700_000_000)) as Arc<dyn WallClock>)
        .build()
        .expect("client should build");

    world.gauges = sync.gauges().to_vec();
    let cancel = sync.cancellation_token();
    let channel = sync.channel();
    let engine = tokio::spawn(async move { sync.start().await });

    if let Some(channel) = &channel {
        eventually("the channel to open", || {
            channel.state() == ConnectionState::Open
        })
        .await;
        world.streams.push(SseEvent::new(NEW_READINGS_EVENT, &data));
        eventually("the live payload to be applied", || {
            channel.stats().readings_applied > 0
        })
        .await;
    }
    let station = Arc::clone(&world.station);
    eventually("the snapshot and clock requests", || {
        !station.requests_to("/readings").is_empty() && !station.requests_to("/settime").is_empty()
    })
    .await;

    cancel.cancel();
    let report = tokio::time::timeout(Duration::from_secs(5), engine)
        .await
        .expect("client did not stop")
        .expect("client task panicked")
        .expect("client run failed");
    world.report = Some(report);
    world.channel = channel;
}

// --- Then steps ---

#[then(expr = "the event stream was closed {int} time(s)")]
fn stream_closed_times(world: &mut GaugeWorld, count: usize) {
    assert_eq!(world.streams.closes.load(Ordering::SeqCst), count);
}

#[then(expr = "the live channel eventually reports {string}")]
async fn channel_eventually_reports(world: &mut GaugeWorld, state: String) {
    let channel = world.channel();
    eventually(&format!("the channel to report {}", state), || {
        channel.state().to_string() == state
    })
    .await;
}

#[then("the live channel stops by itself")]
async fn channel_stops_by_itself(world: &mut GaugeWorld) {
    await_channel_task(world).await;
    assert_eq!(world.channel().state(), ConnectionState::Closed);
}

#[then(expr = "the station saw {int} connection attempt(s)")]
fn station_saw_attempts(world: &mut GaugeWorld, count: usize) {
    assert_eq!(world.streams.opens.load(Ordering::SeqCst), count);
}

#[then(expr = "the client reconnects with Last-Event-ID {string}")]
async fn client_reconnects_with_id(world: &mut GaugeWorld, id: String) {
    let streams = Arc::clone(&world.streams);
    eventually("a second connection", || streams.opens.load(Ordering::SeqCst) >= 2).await;
    let ids = world.streams.last_event_ids.lock().unwrap().clone();
    assert_eq!(ids[0], None);
    assert_eq!(ids[1].as_deref(), Some(id.as_str()));

    let channel = world.channel();
    eventually("the channel to reopen", || {
        channel.state() == ConnectionState::Open
    })
    .await;
    assert_eq!(channel.stats().connections, 2);
}

#[then("the build succeeds")]
fn build_succeeds(world: &mut GaugeWorld) {
    assert_eq!(world.build_error, None);
}

#[then(expr = "the build fails mentioning {string}")]
fn build_fails(world: &mut GaugeWorld, fragment: String) {
    let error = world.build_error.as_ref().expect("build should have failed");
    assert!(error.contains(&fragment), "{}", error);
}

#[then(expr = "the client reported the snapshot as {string}")]
fn client_reported_snapshot(world: &mut GaugeWorld, expected: String) {
    let report = world.report.expect("client did not run");
    assert_eq!(format!("{:?}", report.snapshot), expected);
}

#[then(expr = "the client applied {int} live payload(s)")]
fn client_applied_payloads(world: &mut GaugeWorld, count: u64) {
    let report = world.report.expect("client did not run");
    let applied = report.channel.map(|stats| stats.readings_applied).unwrap_or(0);
    assert_eq!(applied, count);
}

#[then(expr = "the station clock was set to {int}")]
fn station_clock_set(world: &mut GaugeWorld, epoch: i64) {
    let requests = world.station.requests_to("/settime");
    assert!(!requests.is_empty(), "no settime request");
    let expected = format!("/settime?epoch={}", epoch);
    assert!(requests.iter().all(|url| url.ends_with(&expected)), "{:?}", requests);
}

#[then("the humidity gauge was seeded from the snapshot")]
fn humidity_seeded(world: &mut GaugeWorld) {
    assert!(world.gauge(ReadingName::Humidity).assignments() > 0);
}
