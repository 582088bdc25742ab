use std::sync::Arc;

use log::debug;
use tlsight_common::{
    DecodedSegment, HandshakeEvent, HandshakeKind, ServerHelloParse, classify, parse_client_hello,
    parse_server_hello,
};

use crate::{
    sink::EventSink,
    store::{BoundedStore, InsertOutcome},
    utils::endpoint_to_string,
};

pub const DEFAULT_TLS_STORE_CAPACITY: usize = 4096;

/// What became of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// Not a ClientHello or ServerHello record.
    Ignored,
    Stored,
    /// A ClientHello with the same key overwrote the earlier record.
    Replaced,
    /// Parsing failed or the store was full; nothing was kept.
    Dropped,
    /// ServerHello without a stored ClientHello.
    Missed,
    Emitted,
}

/// Pairs ClientHello and ServerHello segments of the same connection.
///
/// A ClientHello is stored under its acknowledgment number; the ServerHello
/// answering it carries that number as its sequence number.
pub struct HandshakeCorrelator {
    pending: BoundedStore<u32, HandshakeEvent>,
    sink: Arc<dyn EventSink>,
}

impl HandshakeCorrelator {
    pub fn new(capacity: usize, sink: Arc<dyn EventSink>) -> Self {
        Self {
            pending: BoundedStore::with_capacity(capacity),
            sink,
        }
    }

    pub fn on_segment(&self, segment: &DecodedSegment<'_>) -> SegmentOutcome {
        match classify(segment.payload) {
            Some(HandshakeKind::ClientHello) => self.on_client_hello(segment),
            Some(HandshakeKind::ServerHello) => self.on_server_hello(segment),
            None => SegmentOutcome::Ignored,
        }
    }

    fn on_client_hello(&self, segment: &DecodedSegment<'_>) -> SegmentOutcome {
        let event = match parse_client_hello(segment.payload, segment.tuple) {
            Ok(Some(event)) => event,
            Ok(None) => return SegmentOutcome::Ignored,
            Err(e) => {
                debug!(
                    "Dropping ClientHello from {} ack={}: {}",
                    endpoint_to_string(segment.tuple.saddr, segment.tuple.sport),
                    segment.ack,
                    e
                );
                return SegmentOutcome::Dropped;
            }
        };

        match self.pending.insert(segment.ack, event) {
            InsertOutcome::Inserted => SegmentOutcome::Stored,
            InsertOutcome::Replaced => SegmentOutcome::Replaced,
            InsertOutcome::Full => {
                debug!(
                    "Handshake store full ({}), dropping ClientHello ack={}",
                    self.pending.capacity(),
                    segment.ack
                );
                SegmentOutcome::Dropped
            }
            // only insert_new leaves an existing key in place
            InsertOutcome::Occupied => SegmentOutcome::Dropped,
        }
    }

    fn on_server_hello(&self, segment: &DecodedSegment<'_>) -> SegmentOutcome {
        // the entry leaves the store whatever the parse result
        let Some(mut event) = self.pending.take(&segment.seq) else {
            return SegmentOutcome::Missed;
        };

        match parse_server_hello(segment.payload, &mut event) {
            Ok(ServerHelloParse::Complete) => {}
            Ok(ServerHelloParse::Partial(e)) => {
                debug!("Partial ServerHello seq={}: {}", segment.seq, e);
            }
            Ok(ServerHelloParse::NotServerHello) => {
                debug!("Dropping handshake seq={}: not a ServerHello", segment.seq);
                return SegmentOutcome::Dropped;
            }
            Err(e) => {
                debug!("Dropping handshake seq={}: {}", segment.seq, e);
                return SegmentOutcome::Dropped;
            }
        }

        self.sink.handshake(segment.source, &event);
        SegmentOutcome::Emitted
    }

    pub fn is_pending(&self, key: u32) -> bool {
        self.pending.contains(&key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
