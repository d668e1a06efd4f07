//! BDD test world and station doubles for the weather gauges service

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::World;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use weather_gauges::channel::LiveChannel;
use weather_gauges::config::ReconnectConfig;
use weather_gauges::engine::EngineReport;
use weather_gauges::io::{EventStream, EventStreamFactory, HttpClient, HttpResponse};
use weather_gauges::snapshot::SnapshotOutcome;
use weather_gauges::sse::SseEvent;
use weather_gauges::{AnimatedGauge, Config, GaugeError, ReadingName, SinkRegistry};

#[derive(Debug, Default, World)]
pub struct GaugeWorld {
    // Station doubles
    pub station: Arc<StationHttp>,
    pub streams: Arc<PushStreams>,

    // Display
    pub registry: Option<Arc<SinkRegistry>>,
    pub gauges: Vec<Arc<AnimatedGauge>>,
    pub snapshot_yields_to_live: bool,

    // Snapshot
    pub snapshot_outcome: Option<SnapshotOutcome>,

    // Live channel
    pub reconnect: Option<ReconnectConfig>,
    pub channel: Option<Arc<LiveChannel>>,
    pub channel_task: Option<JoinHandle<()>>,

    // Engine lifecycle
    pub config: Option<Config>,
    pub build_error: Option<String>,
    pub report: Option<EngineReport>,
}

impl GaugeWorld {
    pub fn gauge(&self, reading: ReadingName) -> Arc<AnimatedGauge> {
        self.gauges
            .iter()
            .find(|g| g.config().reading == reading)
            .cloned()
            .unwrap_or_else(|| panic!("no gauge bound to {}", reading))
    }

    pub fn channel(&self) -> Arc<LiveChannel> {
        Arc::clone(self.channel.as_ref().expect("live channel not started"))
    }
}

/// Wait for a condition the background tasks will eventually satisfy
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        enabled: true,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        multiplier: 2.0,
        max_retries: None,
    }
}

/// What `/readings` answers
#[derive(Debug, Clone)]
pub enum SnapshotReply {
    Respond { status: u16, body: String },
    Unreachable,
}

impl Default for SnapshotReply {
    fn default() -> Self {
        SnapshotReply::Respond {
            status: 200,
            body: "{}".to_string(),
        }
    }
}

/// HTTP side of the station: `/readings` and `/settime`
#[derive(Debug, Default)]
pub struct StationHttp {
    pub snapshot: Mutex<SnapshotReply>,
    pub settime_fails: AtomicBool,
    pub requests: Mutex<Vec<String>>,
}

impl StationHttp {
    pub fn requests_to(&self, path: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(path))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl HttpClient for StationHttp {
    async fn get(&self, url: &str) -> weather_gauges::Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());

        if url.contains("/settime") {
            if self.settime_fails.load(Ordering::SeqCst) {
                return Err(GaugeError::Http("station unreachable".to_string()));
            }
            return Ok(HttpResponse {
                status: 200,
                body: "OK".to_string(),
            });
        }

        match self.snapshot.lock().unwrap().clone() {
            SnapshotReply::Respond { status, body } => Ok(HttpResponse { status, body }),
            SnapshotReply::Unreachable => {
                Err(GaugeError::Http("connection refused".to_string()))
            }
        }
    }
}

#[derive(Debug)]
enum Push {
    Event(SseEvent),
    End,
}

/// Event stream side of the station. Steps push events into whichever
/// stream is currently open.
#[derive(Debug, Default)]
pub struct PushStreams {
    pub refuse: AtomicBool,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub last_event_ids: Mutex<Vec<Option<String>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Push>>>,
}

impl PushStreams {
    pub fn push(&self, event: SseEvent) {
        let sender = self.sender.lock().unwrap();
        let sent = sender
            .as_ref()
            .map(|tx| tx.send(Push::Event(event)).is_ok())
            .unwrap_or(false);
        assert!(sent, "no open event stream to push to");
    }

    /// End the open stream from the server side
    pub fn end(&self) {
        if let Some(tx) = self.sender.lock().unwrap().take() {
            let _ = tx.send(Push::End);
        }
    }
}

#[async_trait::async_trait]
impl EventStreamFactory for PushStreams {
    async fn open(
        &self,
        _url: &str,
        last_event_id: Option<String>,
    ) -> weather_gauges::Result<Box<dyn EventStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.last_event_ids.lock().unwrap().push(last_event_id);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(GaugeError::Stream("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        Ok(Box::new(PushStream {
            rx,
            last_event_id: None,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct PushStream {
    rx: mpsc::UnboundedReceiver<Push>,
    last_event_id: Option<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl EventStream for PushStream {
    async fn next_event(&mut self) -> weather_gauges::Result<Option<SseEvent>> {
        match self.rx.recv().await {
            Some(Push::Event(event)) => {
                if event.id.is_some() {
                    self.last_event_id = event.id.clone();
                }
                Ok(Some(event))
            }
            Some(Push::End) | None => Ok(None),
        }
    }

    fn retry_hint(&self) -> Option<Duration> {
        None
    }

    fn last_event_id(&self) -> Option<String> {
        self.last_event_id.clone()
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.rx.close();
    }
}
