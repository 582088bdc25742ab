use std::time::Duration;

use log::{debug, info, warn};
use tlsight_common::{CaptureSource, ConnectionEvent, HandshakeEvent};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    summary::{ConnectionSummary, TlsSummary},
    telemetry,
};

/// Receiver of finished records. Implementations must return promptly: the
/// correlators call into the sink from the packet path.
pub trait EventSink: Send + Sync {
    fn handshake(&self, source: CaptureSource, event: &HandshakeEvent);
    fn connection(&self, event: &ConnectionEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Handshake {
        source: CaptureSource,
        event: HandshakeEvent,
    },
    Connection(ConnectionEvent),
}

/// Writes every record to the log as JSON and counts it in the metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    persistent_after: Duration,
}

impl LogSink {
    pub fn new(persistent_after: Duration) -> Self {
        Self { persistent_after }
    }
}

impl EventSink for LogSink {
    fn handshake(&self, source: CaptureSource, event: &HandshakeEvent) {
        let summary = TlsSummary::from_event(source, event);
        log_handshake(&summary);
        telemetry::record_handshake(&summary);
    }

    fn connection(&self, event: &ConnectionEvent) {
        let summary = ConnectionSummary::from_event(event);
        log_connection(&summary);
        telemetry::record_connection(&summary, summary.is_persistent(self.persistent_after));
    }
}

pub(crate) fn log_handshake(summary: &TlsSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => info!("TLS connection: {}", json),
        Err(e) => warn!("Failed to serialize TLS summary: {}", e),
    }
}

pub(crate) fn log_connection(summary: &ConnectionSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => info!("TCP connection: {}", json),
        Err(e) => warn!("Failed to serialize TCP summary: {}", e),
    }
}

/// Hands records to an async consumer over a bounded channel. When the
/// consumer falls behind the record is dropped rather than waited for.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: SinkEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Event channel full, dropping record"),
            Err(TrySendError::Closed(_)) => debug!("Event channel closed, dropping record"),
        }
    }
}

impl EventSink for ChannelSink {
    fn handshake(&self, source: CaptureSource, event: &HandshakeEvent) {
        self.send(SinkEvent::Handshake {
            source,
            event: *event,
        });
    }

    fn connection(&self, event: &ConnectionEvent) {
        self.send(SinkEvent::Connection(*event));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tlsight_common::FourTuple;

    /// Keeps every record it is handed.
    #[derive(Debug, Default)]
    pub(crate) struct MemorySink {
        events: Mutex<Vec<SinkEvent>>,
    }

    impl MemorySink {
        pub(crate) fn events(&self) -> Vec<SinkEvent> {
            self.events.lock().clone()
        }

        pub(crate) fn handshakes(&self) -> Vec<HandshakeEvent> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Handshake { event, .. } => Some(event),
                    SinkEvent::Connection(_) => None,
                })
                .collect()
        }

        pub(crate) fn connections(&self) -> Vec<ConnectionEvent> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    SinkEvent::Connection(event) => Some(event),
                    SinkEvent::Handshake { .. } => None,
                })
                .collect()
        }
    }

    impl EventSink for MemorySink {
        fn handshake(&self, source: CaptureSource, event: &HandshakeEvent) {
            self.events.lock().push(SinkEvent::Handshake {
                source,
                event: *event,
            });
        }

        fn connection(&self, event: &ConnectionEvent) {
            self.events.lock().push(SinkEvent::Connection(*event));
        }
    }

    fn tuple() -> FourTuple {
        FourTuple::new([10, 0, 0, 1], 40000, [10, 0, 0, 2], 443)
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx);

        sink.connection(&ConnectionEvent::opened(tuple()));
        sink.handshake(CaptureSource::SocketFilter, &HandshakeEvent::new(tuple()));

        assert_eq!(
            rx.recv().await,
            Some(SinkEvent::Connection(ConnectionEvent::opened(tuple())))
        );
        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::Handshake {
                source: CaptureSource::SocketFilter,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);

        sink.connection(&ConnectionEvent::opened(tuple()));
        // would block a sending sink; this one must return straight away
        sink.connection(&ConnectionEvent::closed(tuple(), 1, 2, 3));

        assert_eq!(
            rx.recv().await,
            Some(SinkEvent::Connection(ConnectionEvent::opened(tuple())))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        ChannelSink::new(tx).connection(&ConnectionEvent::opened(tuple()));
    }

    #[test]
    fn test_log_sink_accepts_records() {
        let sink = LogSink::new(Duration::from_secs(1));
        sink.handshake(CaptureSource::TrafficControl, &HandshakeEvent::new(tuple()));
        sink.connection(&ConnectionEvent::closed(tuple(), 1, 2, 3));
    }
}
