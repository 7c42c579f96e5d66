use tracing::debug;

use crate::stream::messages::{parse_payload, StreamPayload};
use crate::types::{ConnectionStatus, LiveSample};

/// What the view is allowed to see of the live stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveState {
    pub status: ConnectionStatus,
    /// Most recently received non-error sample. Never cleared by a transport error.
    pub sample: Option<LiveSample>,
}

/// Transport-independent state machine of the live delta stream.
///
/// Each handler returns `true` when the visible state changed. Once closed,
/// every handler is a no-op, so late transport callbacks cannot leak through.
#[derive(Debug, Default)]
pub struct LiveDeltaReceiver {
    state: LiveState,
    closed: bool,
}

impl LiveDeltaReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LiveState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn on_connecting(&mut self) -> bool {
        self.set_status(ConnectionStatus::Connecting)
    }

    pub fn on_open(&mut self) -> bool {
        self.set_status(ConnectionStatus::Connected)
    }

    pub fn on_error(&mut self) -> bool {
        self.set_status(ConnectionStatus::Disconnected)
    }

    /// Handle one `message` event body. Last write wins; no timestamp ordering.
    pub fn on_message(&mut self, data: &str) -> bool {
        if self.closed {
            return false;
        }
        match parse_payload(data) {
            StreamPayload::Sample(sample) => {
                self.state.sample = Some(sample);
                true
            }
            StreamPayload::Error(marker) => {
                debug!(marker = %marker, "stream error payload discarded");
                false
            }
            StreamPayload::Invalid => false,
        }
    }

    /// Returns `true` only for the call that actually closed the receiver.
    pub fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    fn set_status(&mut self, status: ConnectionStatus) -> bool {
        if self.closed || self.state.status == status {
            return false;
        }
        self.state.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(markets: u64, ts: f64) -> String {
        format!(
            r#"{{"markets_scanned":{markets},"opportunities":4,"avg_spread":1.5,"timestamp":{ts}}}"#
        )
    }

    #[test]
    fn starts_connecting_without_sample() {
        let rx = LiveDeltaReceiver::new();
        assert_eq!(rx.state().status, ConnectionStatus::Connecting);
        assert!(rx.state().sample.is_none());
    }

    #[test]
    fn open_then_error_transitions() {
        let mut rx = LiveDeltaReceiver::new();
        assert!(rx.on_open());
        assert_eq!(rx.state().status, ConnectionStatus::Connected);
        assert!(rx.on_error());
        assert_eq!(rx.state().status, ConnectionStatus::Disconnected);
        assert!(rx.on_connecting());
        assert_eq!(rx.state().status, ConnectionStatus::Connecting);
    }

    #[test]
    fn last_write_wins_without_reordering() {
        let mut rx = LiveDeltaReceiver::new();
        rx.on_message(&sample_json(12, 200.0));
        // Older timestamp still replaces the held sample.
        rx.on_message(&sample_json(9, 100.0));
        assert_eq!(rx.state().sample.unwrap().markets_scanned, 9);
    }

    #[test]
    fn error_payload_never_changes_state() {
        let mut rx = LiveDeltaReceiver::new();
        rx.on_open();
        rx.on_message(&sample_json(12, 1.0));
        let before = rx.state();
        assert!(!rx.on_message(r#"{"error":"read_failed"}"#));
        assert!(!rx.on_message("garbage"));
        assert_eq!(rx.state(), before);
    }

    #[test]
    fn transport_error_retains_last_sample() {
        let mut rx = LiveDeltaReceiver::new();
        rx.on_open();
        rx.on_message(&sample_json(12, 1.0));
        rx.on_error();
        assert_eq!(rx.state().status, ConnectionStatus::Disconnected);
        assert_eq!(rx.state().sample.unwrap().markets_scanned, 12);
    }

    #[test]
    fn nothing_handled_after_close() {
        let mut rx = LiveDeltaReceiver::new();
        rx.on_open();
        assert!(rx.close());
        assert!(!rx.close());
        assert!(!rx.on_message(&sample_json(12, 1.0)));
        assert!(!rx.on_error());
        assert_eq!(rx.state().status, ConnectionStatus::Connected);
        assert!(rx.state().sample.is_none());
    }
}
