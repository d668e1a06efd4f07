//! In-process weather station: `/readings`, `/events` and `/settime`
//!
//! Backs the `mock_station` binary and the integration tests. Every event
//! stream starts with a `hello!` message carrying the reconnection delay,
//! like the station firmware does.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::channel::NEW_READINGS_EVENT;
use crate::reading::ReadingSet;

/// Reconnection delay announced to clients, as the firmware does
pub const DEFAULT_RETRY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum Broadcast {
    Event { name: String, data: String, id: u64 },
    Hangup,
}

#[derive(Debug, Default)]
struct Records {
    snapshot: String,
    epochs: Vec<i64>,
    last_event_ids: Vec<Option<String>>,
}

struct Inner {
    records: Mutex<Records>,
    events: broadcast::Sender<Broadcast>,
    next_id: AtomicU64,
    retry: Duration,
}

/// Shared handle to the simulated station
#[derive(Clone)]
pub struct StationSimulator {
    inner: Arc<Inner>,
}

impl Default for StationSimulator {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY)
    }
}

impl StationSimulator {
    pub fn new(retry: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(Records {
                    snapshot: "{}".to_string(),
                    ..Records::default()
                }),
                events,
                next_id: AtomicU64::new(0),
                retry,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/readings", get(readings_handler))
            .route("/events", get(events_handler))
            .route("/settime", get(settime_handler))
            .with_state(self.clone())
    }

    /// Body served by `/readings`, sent verbatim
    pub fn set_snapshot_body(&self, body: impl Into<String>) {
        self.records().snapshot = body.into();
    }

    pub fn set_snapshot(&self, readings: &ReadingSet) -> crate::Result<()> {
        let body = serde_json::to_string(readings)?;
        self.set_snapshot_body(body);
        Ok(())
    }

    /// Send an event to every open stream. Returns how many received it.
    pub fn publish(&self, name: &str, data: &str) -> usize {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .events
            .send(Broadcast::Event {
                name: name.to_string(),
                data: data.to_string(),
                id,
            })
            .unwrap_or(0)
    }

    pub fn publish_readings(&self, readings: &ReadingSet) -> crate::Result<usize> {
        let data = serde_json::to_string(readings)?;
        Ok(self.publish(NEW_READINGS_EVENT, &data))
    }

    /// End every open event stream from the server side
    pub fn hang_up(&self) -> usize {
        self.inner.events.send(Broadcast::Hangup).unwrap_or(0)
    }

    pub fn open_streams(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Epochs received on `/settime`, oldest first
    pub fn settime_epochs(&self) -> Vec<i64> {
        self.records().epochs.clone()
    }

    /// `Last-Event-ID` header of every `/events` request, oldest first
    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.records().last_event_ids.clone()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn readings_handler(State(station): State<StationSimulator>) -> impl IntoResponse {
    let body = station.records().snapshot.clone();
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body)
}

#[derive(Debug, Deserialize)]
struct SettimeQuery {
    epoch: i64,
}

async fn settime_handler(
    State(station): State<StationSimulator>,
    Query(query): Query<SettimeQuery>,
) -> impl IntoResponse {
    tracing::debug!("settime epoch={}", query.epoch);
    station.records().epochs.push(query.epoch);
    "OK"
}

async fn events_handler(
    State(station): State<StationSimulator>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    tracing::debug!("Event stream opened (Last-Event-ID: {:?})", last_event_id);
    station.records().last_event_ids.push(last_event_id);

    let receiver = station.inner.events.subscribe();
    let hello_id = station.inner.next_id.load(Ordering::Relaxed);
    let hello = Event::default()
        .data("hello!")
        .id(hello_id.to_string())
        .retry(station.inner.retry);

    let updates = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(Broadcast::Event { name, data, id }) => {
                    let event = Event::default().event(name).data(data).id(id.to_string());
                    return Some((Ok(event), receiver));
                }
                Ok(Broadcast::Hangup) | Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Event stream lagged, {} events dropped", missed);
                }
            }
        }
    });

    Sse::new(stream::once(async move { Ok(hello) }).chain(updates)).keep_alive(KeepAlive::default())
}
