//! Periodic text rendering of the gauges to the log

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::channel::ConnectionState;
use crate::instrument::AnimatedGauge;

pub struct StatusPanel {
    gauges: Vec<Arc<AnimatedGauge>>,
    interval: Duration,
}

impl StatusPanel {
    pub fn new(gauges: Vec<Arc<AnimatedGauge>>, interval: Duration) -> Self {
        Self { gauges, interval }
    }

    /// One line per gauge, as displayed at `now`
    pub fn render(&self, now: Instant) -> Vec<String> {
        self.gauges.iter().map(|g| render_gauge(g, now)).collect()
    }

    /// Log the panel every interval until cancelled. `state` reports the
    /// live channel's connection, when there is one.
    pub async fn run<F>(&self, state: F, cancel: CancellationToken)
    where
        F: Fn() -> Option<ConnectionState> + Send + Sync,
    {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let header = match state() {
                Some(state) => format!("live: {}", state),
                None => "live: disabled".to_string(),
            };
            tracing::info!("{} | {}", header, self.render(Instant::now()).join(" | "));
        }
    }
}

fn render_gauge(gauge: &AnimatedGauge, now: Instant) -> String {
    let config = gauge.config();
    let value = gauge.value_at(now);
    let mut line = format!("{}: {}", config.title, config.format_value(value));
    if let Some(band) = config.highlight_for(value) {
        line.push_str(&format!(" [{}]", band.color));
    }
    line
}
