//! Incremental decoder for `text/event-stream` bodies
//!
//! Bytes are fed in whatever chunks the transport delivers; complete events
//! come out. Lines may end in LF, CRLF or a lone CR, and a CRLF pair split
//! across two chunks is handled. An event without data is never dispatched.
//! A line or an event larger than the decoder's limit fails the stream.

use std::time::Duration;

use crate::error::GaugeError;

/// Event name used when the server does not set one
pub const DEFAULT_EVENT: &str = "message";

/// Largest line or event data the decoder buffers
pub const DEFAULT_MAX_EVENT_BYTES: usize = 256 * 1024;

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    /// Last event id in effect when this event was dispatched
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(event: &str, data: &str) -> Self {
        Self {
            event: event.to_string(),
            data: data.to_string(),
            id: None,
        }
    }
}

#[derive(Debug)]
pub struct SseDecoder {
    max_event_bytes: usize,
    pending: Vec<u8>,
    bom_checked: bool,
    event_type: String,
    data: String,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that rejects lines and event data longer than `max_event_bytes`
    pub fn with_limit(max_event_bytes: usize) -> Self {
        Self {
            max_event_bytes,
            pending: Vec::new(),
            bom_checked: false,
            event_type: String::new(),
            data: String::new(),
            last_event_id: None,
            retry: None,
        }
    }

    /// Feed a chunk and collect every event it completes.
    ///
    /// Fails with [`GaugeError::Stream`] once an unterminated line or the
    /// data of an undispatched event outgrows the limit. The partial event is
    /// discarded; the last event id and retry hint are kept for the reconnect.
    pub fn feed(&mut self, chunk: &[u8]) -> crate::Result<Vec<SseEvent>> {
        self.pending.extend_from_slice(chunk);
        if !self.bom_checked {
            if self.pending.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.pending) {
                return Ok(Vec::new());
            }
            if self.pending.starts_with(b"\xEF\xBB\xBF") {
                self.pending.drain(..3);
            }
            self.bom_checked = true;
        }

        let mut events = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < self.pending.len() {
            let next = match self.pending[i] {
                b'\n' => i + 1,
                b'\r' => {
                    // Hold a trailing CR until we know whether LF follows
                    if i + 1 == self.pending.len() {
                        break;
                    }
                    if self.pending[i + 1] == b'\n' {
                        i + 2
                    } else {
                        i + 1
                    }
                }
                _ => {
                    i += 1;
                    continue;
                }
            };
            let line = String::from_utf8_lossy(&self.pending[start..i]).into_owned();
            if let Err(e) = self.process_line(&line, &mut events) {
                self.discard_partial();
                return Err(e);
            }
            start = next;
            i = next;
        }
        self.pending.drain(..start);
        if self.pending.len() > self.max_event_bytes {
            let pending = self.pending.len();
            self.discard_partial();
            return Err(GaugeError::Stream(format!(
                "event stream line exceeds {} bytes ({} buffered)",
                self.max_event_bytes, pending
            )));
        }
        Ok(events)
    }

    /// Id of the most recent event carrying one
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay most recently requested by the server
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn discard_partial(&mut self) {
        self.pending.clear();
        self.event_type.clear();
        self.data.clear();
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) -> crate::Result<()> {
        if line.is_empty() {
            self.dispatch(events);
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                if self.data.len() + value.len() >= self.max_event_bytes {
                    return Err(GaugeError::Stream(format!(
                        "event stream data exceeds {} bytes",
                        self.max_event_bytes
                    )));
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            other => tracing::trace!("Ignoring unknown event stream field '{}'", other),
        }
        Ok(())
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        let event = if event_type.is_empty() {
            DEFAULT_EVENT.to_string()
        } else {
            event_type
        };
        events.push(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        });
    }
}
