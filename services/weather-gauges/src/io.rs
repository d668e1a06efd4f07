//! HTTP and event stream abstractions for testability

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};

use crate::error::GaugeError;
use crate::sse::{SseDecoder, SseEvent};

/// HTTP response from a request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request to the given URL
    async fn get(&self, url: &str) -> crate::Result<HttpResponse>;
}

/// An open server-push connection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EventStream: Send {
    /// Wait for the next event.
    ///
    /// `Ok(None)` means the server ended the stream.
    async fn next_event(&mut self) -> crate::Result<Option<SseEvent>>;

    /// Reconnection delay requested by the server, if any
    fn retry_hint(&self) -> Option<Duration>;

    /// Id of the last event received that carried one
    fn last_event_id(&self) -> Option<String>;

    /// Close the connection
    async fn close(&mut self);
}

/// Opens server-push connections
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EventStreamFactory: Send + Sync {
    /// Connect to `url`, resuming after `last_event_id` if given
    async fn open(
        &self,
        url: &str,
        last_event_id: Option<String>,
    ) -> crate::Result<Box<dyn EventStream>>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GaugeError::Http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GaugeError::Http(format!("Reading response body: {}", e)))?;

        tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Event stream connections over reqwest.
///
/// `request_timeout` bounds connecting and waiting for the response headers.
/// Once open, the stream fails when no bytes arrive for `idle_timeout`.
pub struct ReqwestEventStreamFactory {
    client: reqwest::Client,
    request_timeout: Duration,
    idle_timeout: Option<Duration>,
}

impl ReqwestEventStreamFactory {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default event stream client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            request_timeout,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

impl Default for ReqwestEventStreamFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl EventStreamFactory for ReqwestEventStreamFactory {
    async fn open(
        &self,
        url: &str,
        last_event_id: Option<String>,
    ) -> crate::Result<Box<dyn EventStream>> {
        tracing::debug!("Opening event stream {}", url);
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id.filter(|id| !id.is_empty()) {
            request = request.header("Last-Event-ID", id);
        }

        let response = tokio::time::timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| {
                GaugeError::Stream(format!(
                    "GET {} sent no response within {:?}",
                    url, self.request_timeout
                ))
            })?
            .map_err(|e| GaugeError::Stream(format!("GET {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(GaugeError::Stream(format!(
                "GET {} returned status {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(GaugeError::Stream(format!(
                "GET {} returned content type '{}'",
                url, content_type
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(Box::new(ReqwestEventStream {
            body: Some(body),
            decoder: SseDecoder::new(),
            queue: VecDeque::new(),
            idle_timeout: self.idle_timeout,
        }))
    }
}

struct ReqwestEventStream {
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    decoder: SseDecoder,
    queue: VecDeque<SseEvent>,
    idle_timeout: Option<Duration>,
}

#[async_trait]
impl EventStream for ReqwestEventStream {
    async fn next_event(&mut self) -> crate::Result<Option<SseEvent>> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            let Some(body) = self.body.as_mut() else {
                return Ok(None);
            };
            let next = match self.idle_timeout {
                Some(idle) => tokio::time::timeout(idle, body.next()).await.map_err(|_| {
                    GaugeError::Stream(format!("event stream idle for {:?}", idle))
                })?,
                None => body.next().await,
            };
            match next {
                Some(Ok(chunk)) => self.queue.extend(self.decoder.feed(&chunk)?),
                Some(Err(e)) => {
                    return Err(GaugeError::Stream(format!("Reading event stream: {}", e)))
                }
                None => return Ok(None),
            }
        }
    }

    fn retry_hint(&self) -> Option<Duration> {
        self.decoder.retry()
    }

    fn last_event_id(&self) -> Option<String> {
        self.decoder.last_event_id().map(str::to_string)
    }

    async fn close(&mut self) {
        // Dropping the body releases the connection
        self.body = None;
        self.queue.clear();
    }
}
