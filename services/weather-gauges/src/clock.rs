//! Pushes the client's wall-clock time to the station
//!
//! The station has no NTP access when it runs as a WiFi access point, so the
//! client announces its epoch seconds on start and then at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::DeviceConfig;
use crate::io::HttpClient;

/// Source of the current Unix time
#[cfg_attr(test, mockall::automock)]
pub trait WallClock: Send + Sync {
    /// Whole seconds since the Unix epoch
    fn epoch_seconds(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn epoch_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

pub struct ClockAnnouncer {
    device: DeviceConfig,
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn WallClock>,
    interval: Duration,
}

impl ClockAnnouncer {
    pub fn new(
        device: DeviceConfig,
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn WallClock>,
        interval: Duration,
    ) -> Self {
        Self {
            device,
            http,
            clock,
            interval,
        }
    }

    /// Send the current time once. Returns the station's reply, if any.
    pub async fn announce_once(&self) -> Option<String> {
        let epoch = self.clock.epoch_seconds();
        let url = self.device.settime_url(epoch);
        match self.http.get(&url).await {
            Ok(response) => {
                tracing::info!("settime: {} {}", epoch, response.body.trim());
                Some(response.body)
            }
            Err(e) => {
                tracing::warn!("settime error: {}", e);
                None
            }
        }
    }

    /// Announce immediately, then every interval until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // A slow station must not delay shutdown
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.announce_once() => {}
            }
        }
        tracing::debug!("Clock announcer stopped");
    }
}
