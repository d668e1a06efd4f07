//! Live update channel
//!
//! Holds the single server-push connection to `/events`, dispatches events by
//! name and tracks the connection state. A dropped stream is re-opened after
//! the reconnection delay (the server's `retry:` value when it sent one),
//! growing by the configured multiplier while attempts keep failing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ReconnectConfig;
use crate::io::{EventStream, EventStreamFactory};
use crate::reading::ReadingSet;
use crate::registry::{SinkRegistry, UpdateSource};
use crate::sse::{SseEvent, DEFAULT_EVENT};

/// Event name carrying a reading set
pub const NEW_READINGS_EVENT: &str = "new_readings";

/// Lifecycle of the push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Error => write!(f, "Error"),
        }
    }
}

/// Everything the channel reacts to, transport signals and named events alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Error(String),
    Message(String),
    NewReadings(String),
    Other { name: String, data: String },
}

impl From<SseEvent> for ChannelEvent {
    fn from(event: SseEvent) -> Self {
        match event.event.as_str() {
            DEFAULT_EVENT => ChannelEvent::Message(event.data),
            NEW_READINGS_EVENT => ChannelEvent::NewReadings(event.data),
            _ => ChannelEvent::Other {
                name: event.event,
                data: event.data,
            },
        }
    }
}

/// Counters describing what the channel has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub connections: u64,
    pub readings_applied: u64,
    pub readings_rejected: u64,
}

#[derive(Default)]
struct Counters {
    connections: AtomicU64,
    readings_applied: AtomicU64,
    readings_rejected: AtomicU64,
}

enum Step {
    Next(crate::Result<Option<SseEvent>>),
    Shutdown,
}

pub struct LiveChannel {
    url: String,
    factory: Arc<dyn EventStreamFactory>,
    registry: Arc<SinkRegistry>,
    reconnect: ReconnectConfig,
    state: watch::Sender<ConnectionState>,
    counters: Counters,
    cancel: CancellationToken,
}

impl fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveChannel")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

impl LiveChannel {
    pub fn new(
        url: String,
        factory: Arc<dyn EventStreamFactory>,
        registry: Arc<SinkRegistry>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            url,
            factory,
            registry,
            reconnect,
            state,
            counters: Counters::default(),
            cancel,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            connections: self.counters.connections.load(Ordering::Relaxed),
            readings_applied: self.counters.readings_applied.load(Ordering::Relaxed),
            readings_rejected: self.counters.readings_rejected.load(Ordering::Relaxed),
        }
    }

    /// Tear the channel down. Safe to call repeatedly, and before `run`.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// React to one signal or event
    pub fn handle(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => {
                self.counters.connections.fetch_add(1, Ordering::Relaxed);
                self.set_state(ConnectionState::Open);
                tracing::info!("Events Connected");
            }
            ChannelEvent::Error(reason) => {
                self.set_state(ConnectionState::Error);
                tracing::info!("Events Disconnected: {}", reason);
            }
            ChannelEvent::Message(data) => {
                tracing::info!("message {}", data);
            }
            ChannelEvent::NewReadings(data) => {
                tracing::debug!("{} {}", NEW_READINGS_EVENT, data);
                match ReadingSet::decode(&data) {
                    Ok(set) => {
                        self.registry.apply(&set, UpdateSource::Live);
                        self.counters.readings_applied.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.counters
                            .readings_rejected
                            .fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("Error parsing {} payload: {}", NEW_READINGS_EVENT, e);
                    }
                }
            }
            ChannelEvent::Other { name, data } => {
                tracing::debug!("Ignoring event '{}': {}", name, data);
            }
        }
    }

    /// Keep the connection up until closed or out of retries
    pub async fn run(&self) {
        let mut failures: u32 = 0;
        let mut last_event_id: Option<String> = None;
        let mut server_retry: Option<Duration> = None;

        while !self.cancel.is_cancelled() {
            self.set_state(ConnectionState::Connecting);
            tracing::debug!("Connecting to {}", self.url);

            let opened = tokio::select! {
                opened = self.factory.open(&self.url, last_event_id.clone()) => opened,
                _ = self.cancel.cancelled() => break,
            };

            match opened {
                Ok(mut stream) => {
                    failures = 0;
                    self.handle(ChannelEvent::Open);

                    let Some(reason) = self.pump(stream.as_mut()).await else {
                        stream.close().await;
                        tracing::info!("Event stream closed");
                        break;
                    };

                    if let Some(id) = stream.last_event_id() {
                        last_event_id = Some(id);
                    }
                    if let Some(retry) = stream.retry_hint() {
                        server_retry = Some(retry);
                    }
                    self.handle(ChannelEvent::Error(reason));
                }
                Err(e) => {
                    failures += 1;
                    self.handle(ChannelEvent::Error(e.to_string()));
                }
            }

            if !self.reconnect.enabled {
                tracing::warn!("Reconnect disabled, live updates stopped");
                break;
            }
            if let Some(max) = self.reconnect.max_retries {
                if failures > max {
                    tracing::warn!(
                        "Giving up on live updates after {} failed attempts",
                        failures
                    );
                    break;
                }
            }

            let delay = backoff_delay(&self.reconnect, server_retry, failures);
            tracing::debug!("Reconnecting in {:?} (failed attempts: {})", delay, failures);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    /// Dispatch events until the stream fails (`Some(reason)`) or the
    /// channel is closed (`None`)
    async fn pump(&self, stream: &mut dyn EventStream) -> Option<String> {
        loop {
            let step = tokio::select! {
                next = stream.next_event() => Step::Next(next),
                _ = self.cancel.cancelled() => Step::Shutdown,
            };
            match step {
                Step::Next(Ok(Some(event))) => self.handle(event.into()),
                Step::Next(Ok(None)) => return Some("stream ended by server".to_string()),
                Step::Next(Err(e)) => return Some(e.to_string()),
                Step::Shutdown => return None,
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Live channel {} -> {}", previous, state);
        }
    }
}

/// Delay before the next connection attempt.
///
/// `failures` is the number of consecutive failed attempts; the first retry
/// after a dropped stream or a single failure waits the base delay. A zero
/// `retry:` hint from the server is ignored.
pub fn backoff_delay(
    config: &ReconnectConfig,
    server_retry: Option<Duration>,
    failures: u32,
) -> Duration {
    let base = server_retry
        .filter(|retry| !retry.is_zero())
        .unwrap_or(Duration::from_millis(config.initial_delay_ms));
    let max = Duration::from_millis(config.max_delay_ms);
    let exponent = failures.saturating_sub(1).min(64) as i32;
    let scaled = base.as_secs_f64() * config.multiplier.powi(exponent);
    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(scaled.max(0.0))
}
