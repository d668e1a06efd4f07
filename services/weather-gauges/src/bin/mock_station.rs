//! Simulated weather station
//!
//! Serves `/readings`, `/events` and `/settime` on a local port and pushes a
//! slowly changing reading set at a fixed interval.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use weather_gauges::simulator::StationSimulator;
use weather_gauges::ReadingSet;

#[derive(Parser)]
#[command(name = "mock_station")]
#[command(about = "Simulated weather station for local runs")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Seconds between pushed readings
    #[arg(short, long, default_value_t = 5)]
    interval_seconds: u64,

    /// Reconnection delay announced to clients, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    retry_ms: u64,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

/// Reading set for the n-th tick: a slow daily-ish cycle with rain building up
fn synthetic_readings(tick: u64) -> ReadingSet {
    let phase = tick as f64 / 24.0;
    let rain_hourly = (tick % 12) as f64 * 0.4;
    ReadingSet {
        temperature: Some(round1(12.0 + 8.0 * phase.sin())),
        humidity: Some((65.0 - 20.0 * phase.sin()).round()),
        wind_average: Some(round1(3.0 + 2.0 * (phase * 3.0).sin().abs())),
        wind_gust: Some(round1(5.0 + 6.0 * (phase * 3.0).sin().abs())),
        wind_direction: Some(((tick * 15) % 360) as f64),
        rain_hourly: Some(round1(rain_hourly)),
        rain_daily: Some(round1(tick as f64 * 0.2 % 60.0)),
        rain_weekly: Some(round1(tick as f64 * 0.5 % 120.0)),
        rain_monthly: Some(round1(tick as f64 * 0.9 % 120.0)),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let station = StationSimulator::new(Duration::from_millis(args.retry_ms));
    station.set_snapshot(&synthetic_readings(0))?;

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    let publisher = station.clone();
    let cancel_for_publisher = cancel.clone();
    let interval = Duration::from_secs(args.interval_seconds.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut tick = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel_for_publisher.cancelled() => break,
            }
            tick += 1;
            let readings = synthetic_readings(tick);
            if let Err(e) = publisher.set_snapshot(&readings) {
                tracing::warn!("Failed to update snapshot: {}", e);
            }
            match publisher.publish_readings(&readings) {
                Ok(receivers) => tracing::debug!("Pushed tick {} to {} clients", tick, receivers),
                Err(e) => tracing::warn!("Failed to push readings: {}", e),
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Mock station listening on http://{}", listener.local_addr()?);

    axum::serve(listener, station.router())
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    tracing::info!("Mock station stopped");
    Ok(())
}
