//! Weather gauges - keeps a set of display gauges in sync with a weather station
//!
//! Seeds the gauges from a one-shot snapshot, follows the station's event
//! stream for live updates and keeps the station's clock set.

pub mod channel;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod instrument;
pub mod io;
pub mod panel;
pub mod reading;
pub mod registry;
pub mod sanitize;
pub mod simulator;
pub mod snapshot;
pub mod sse;
pub mod uplink;

pub use channel::{ConnectionState, LiveChannel};
pub use config::{load_config, Config};
pub use engine::{Engine, EngineReport};
pub use error::{GaugeError, Result};
pub use instrument::{AnimatedGauge, Instrument, InstrumentConfig};
pub use reading::{ReadingName, ReadingSet};
pub use registry::{SinkRegistry, UpdateSource};
pub use sanitize::clamp;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clock::{ClockAnnouncer, SystemClock, WallClock};
use crate::io::{EventStreamFactory, HttpClient, ReqwestEventStreamFactory, ReqwestHttpClient};
use crate::panel::StatusPanel;
use crate::snapshot::SnapshotLoader;

/// Assembles a [`GaugeSync`] from configuration and optional injected parts.
///
/// Anything not injected gets the production implementation: reqwest for
/// HTTP and the event stream, the system clock and the default animated
/// dashboard.
pub struct GaugeSyncBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    streams: Option<Arc<dyn EventStreamFactory>>,
    wall_clock: Option<Arc<dyn WallClock>>,
    instruments: Option<Vec<(InstrumentConfig, Arc<dyn Instrument>)>>,
    cancel: Option<CancellationToken>,
}

impl GaugeSyncBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            streams: None,
            wall_clock: None,
            instruments: None,
            cancel: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_event_streams(mut self, streams: Arc<dyn EventStreamFactory>) -> Self {
        self.streams = Some(streams);
        self
    }

    pub fn with_wall_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = Some(clock);
        self
    }

    /// Bind these instruments instead of the animated dashboard. The status
    /// panel only renders the animated dashboard, so it stays off.
    pub fn with_instruments(
        mut self,
        instruments: Vec<(InstrumentConfig, Arc<dyn Instrument>)>,
    ) -> Self {
        self.instruments = Some(instruments);
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<GaugeSync> {
        self.config.validate()?;
        let device = &self.config.device;
        let timeout = device.request_timeout();

        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new(timeout)));
        let streams = self
            .streams
            .unwrap_or_else(|| {
                Arc::new(
                    ReqwestEventStreamFactory::new(timeout)
                        .with_idle_timeout(self.config.live.idle_timeout()),
                )
            });
        let wall_clock = self.wall_clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cancel = self.cancel.unwrap_or_default();

        let (registry, gauges) = match self.instruments {
            Some(instruments) => (SinkRegistry::new(instruments)?, Vec::new()),
            None => SinkRegistry::animated(instrument::default_instruments())?,
        };
        let registry = Arc::new(
            registry.with_snapshot_yielding_to_live(self.config.sync.snapshot_yields_to_live),
        );
        tracing::debug!("Instrument bindings: {:?}", registry);

        let snapshot = SnapshotLoader::new(
            device.readings_url(),
            Arc::clone(&http),
            Arc::clone(&registry),
        );

        let channel = self.config.live.enabled.then(|| {
            Arc::new(LiveChannel::new(
                device.events_url(),
                streams,
                Arc::clone(&registry),
                self.config.live.reconnect.clone(),
                cancel.child_token(),
            ))
        });

        let clock = self.config.clock.enabled.then(|| {
            ClockAnnouncer::new(
                device.clone(),
                Arc::clone(&http),
                wall_clock,
                Duration::from_secs(self.config.clock.interval_seconds),
            )
        });

        let panel = (self.config.panel.enabled && !gauges.is_empty()).then(|| {
            StatusPanel::new(
                gauges.clone(),
                Duration::from_secs(self.config.panel.interval_seconds),
            )
        });

        let engine = Engine::new(snapshot, channel, clock, panel, cancel.clone());

        Ok(GaugeSync {
            engine,
            gauges,
            cancel,
        })
    }
}

/// A built, not yet started synchronization engine
pub struct GaugeSync {
    engine: Engine,
    gauges: Vec<Arc<AnimatedGauge>>,
    cancel: CancellationToken,
}

impl GaugeSync {
    /// Token that stops the engine when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn channel(&self) -> Option<Arc<LiveChannel>> {
        self.engine.channel().cloned()
    }

    /// Animated gauges, empty when instruments were injected
    pub fn gauges(&self) -> &[Arc<AnimatedGauge>] {
        &self.gauges
    }

    /// Run until the cancellation token is triggered, then tear down
    pub async fn start(self) -> Result<EngineReport> {
        tracing::info!("Gauge sync started");
        let report = self.engine.run().await;
        tracing::info!("Gauge sync stopped");
        Ok(report)
    }
}
