use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::warn;

use crate::types::LiveSample;

static PARSE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Longest line the decoder buffers before giving up on it.
const MAX_LINE_BYTES: usize = 256 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `message` when the server did not name one.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes arrive in arbitrary chunks; lines may end in `\n`, `\r\n` or `\r`,
/// and a chunk boundary may split a line or a multi-byte character. Events
/// are dispatched on a blank line. `retry:` hints and the last event id are
/// kept on the decoder for the reconnect logic.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: String,
    event_type: String,
    pending_id: Option<String>,
    last_event_id: Option<String>,
    retry_ms: Option<u64>,
    /// Skipping the rest of an over-long line.
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect delay most recently announced by the server.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Drop any partially received event, keeping the retry hint and last event id.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.data.clear();
        self.event_type.clear();
        self.pending_id = None;
        self.discarding = false;
    }

    /// Feed a chunk and return every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        if self.discarding {
            match self.buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    self.buf.drain(..=pos);
                    self.discarding = false;
                }
                None => {
                    self.buf.clear();
                    return events;
                }
            }
        }

        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') else {
                break;
            };
            // A trailing `\r` may be the first half of `\r\n`; wait for more input.
            if self.buf[pos] == b'\r' && pos + 1 == self.buf.len() {
                break;
            }
            let terminator_len =
                if self.buf[pos] == b'\r' && self.buf.get(pos + 1) == Some(&b'\n') { 2 } else { 1 };

            let line_bytes: Vec<u8> = self.buf.drain(..pos + terminator_len).take(pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buf.len() > MAX_LINE_BYTES {
            warn!(len = self.buf.len(), "[STREAM PARSE] line too long, dropping event");
            self.buf.clear();
            self.data.clear();
            self.event_type.clear();
            self.pending_id = None;
            self.discarding = true;
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event_type = value.to_string(),
            "id" => {
                if !value.contains('\0') {
                    self.pending_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.retry_ms = value.parse().ok();
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if let Some(id) = self.pending_id.take() {
            self.last_event_id = Some(id);
        }
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseEvent {
            event: if event_type.is_empty() { "message".to_string() } else { event_type },
            data,
            id: self.last_event_id.clone(),
        })
    }
}

/// Decoded body of a `message` event on the live stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Sample(LiveSample),
    /// Server-side failure marker, e.g. `{"error":"read_failed"}`.
    Error(String),
    Invalid,
}

/// Parse the JSON body of a stream event.
/// A truthy `error` field marks the payload as an error regardless of other fields.
pub fn parse_payload(data: &str) -> StreamPayload {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return record_failure(data),
    };

    if let Some(err) = value.get("error").filter(|e| is_truthy(e)) {
        let marker = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return StreamPayload::Error(marker);
    }

    match serde_json::from_value::<LiveSample>(value) {
        Ok(sample) => StreamPayload::Sample(sample),
        Err(_) => record_failure(data),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn record_failure(data: &str) -> StreamPayload {
    let count = PARSE_FAILURES.fetch_add(1, Ordering::Relaxed) + 1;
    if count <= 10 || count % 1000 == 0 {
        let sample: String = data.chars().take(200).collect();
        warn!(count, "[STREAM PARSE] unrecognized payload: {sample}");
    }
    StreamPayload::Invalid
}
