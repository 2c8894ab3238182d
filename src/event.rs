//! Outbound event protocol and the channel wrapper the stages emit through.
//!
//! Event names and payload shapes are the session's wire contract; the
//! serde tags below are what a consumer on the other side of the channel
//! sees after serialization.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_derive::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Scan phase carried by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discovery,
    Scanning,
}

/// One outbound message on the session's event channel.
///
/// `ScanComplete` and `ScanStopped` are terminal: a session emits exactly
/// one of the two, as its last event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ScanEvent {
    /// Advisory narration, non-contractual.
    Log { message: String },
    /// A host answered on at least one discovery port.
    HostFound { host: Ipv4Addr },
    /// `current` is monotonically non-decreasing within a phase.
    Progress {
        phase: Phase,
        current: usize,
        total: usize,
    },
    /// Emitted once per reachable (host, port) pair, as soon as it is known.
    ScanResult {
        host: Ipv4Addr,
        port: u16,
        status: PortStatus,
    },
    ScanComplete,
    ScanStopped,
}

/// Status of a reported port. Only open ports are ever reported; anything
/// not confirmed open never produces a result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
}

/// Sending half of the session's event channel.
///
/// A send can only fail when the consumer dropped the receiving half. That
/// is treated as the consumer disconnecting mid-scan, so the sink flips the
/// session's cancellation flag: no new targets are dispatched once nobody
/// is listening.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<ScanEvent>,
    cancelled: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<ScanEvent>, cancelled: Arc<AtomicBool>) -> Self {
        Self { tx, cancelled }
    }

    pub fn emit(&self, event: ScanEvent) {
        if self.tx.send(event).is_err() {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(ScanEvent::Log {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn events_serialize_to_wire_shapes() {
        let result = ScanEvent::ScanResult {
            host: "192.168.1.7".parse().unwrap(),
            port: 8080,
            status: PortStatus::Open,
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"event":"scan-result","host":"192.168.1.7","port":8080,"status":"open"}"#
        );

        let progress = ScanEvent::Progress {
            phase: Phase::Discovery,
            current: 50,
            total: 254,
        };
        assert_eq!(
            serde_json::to_string(&progress).unwrap(),
            r#"{"event":"progress","phase":"discovery","current":50,"total":254}"#
        );

        assert_eq!(
            serde_json::to_string(&ScanEvent::ScanStopped).unwrap(),
            r#"{"event":"scan-stopped"}"#
        );
    }

    #[test]
    fn dropped_receiver_cancels_the_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let sink = EventSink::new(tx, Arc::clone(&cancelled));

        sink.log("still connected");
        assert!(!cancelled.load(Ordering::SeqCst));

        drop(rx);
        sink.log("talking to nobody");
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
