use std::sync::Arc;

use log::debug;
use tlsight_common::{
    BirthRecord, ConnectionEvent, ConnectionId, FourTuple, IPPROTO_TCP, SocketStateChange,
    TcpState,
};

use crate::{
    sink::EventSink,
    store::{BoundedStore, InsertOutcome},
    utils::Clock,
};

pub const DEFAULT_LIFECYCLE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Not TCP, or a transition the tracker does not follow.
    Ignored,
    Opened,
    /// Open announced, but the map was full so the close will be missed.
    Untracked,
    /// Repeated SYN-class transition for a connection already pending.
    AlreadyPending,
    Closed,
    /// Close without a recorded open.
    Missed,
}

/// Follows TCP connections from SYN to close and reports their duration and
/// byte counts from the initiator's point of view.
pub struct ConnectionLifecycleTracker {
    births: BoundedStore<ConnectionId, BirthRecord>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl ConnectionLifecycleTracker {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            births: BoundedStore::with_capacity(capacity),
            clock,
            sink,
        }
    }

    pub fn on_state_change(&self, change: &SocketStateChange) -> LifecycleOutcome {
        if change.protocol != IPPROTO_TCP {
            return LifecycleOutcome::Ignored;
        }
        match change.new_state {
            TcpState::SynSent => self.on_open(change, true),
            TcpState::SynRecv => self.on_open(change, false),
            TcpState::Close => self.on_close(change),
            _ => LifecycleOutcome::Ignored,
        }
    }

    fn on_open(&self, change: &SocketStateChange, initiator: bool) -> LifecycleOutcome {
        let birth = BirthRecord {
            ts_ns: self.clock.now_ns(),
            initiator,
        };

        let outcome = match self.births.insert_new(change.id, birth) {
            InsertOutcome::Inserted | InsertOutcome::Replaced => LifecycleOutcome::Opened,
            InsertOutcome::Occupied => return LifecycleOutcome::AlreadyPending,
            InsertOutcome::Full => {
                debug!(
                    "Lifecycle map full ({}), not tracking {:?}",
                    self.births.capacity(),
                    change.id
                );
                LifecycleOutcome::Untracked
            }
        };

        self.sink
            .connection(&ConnectionEvent::opened(initiator_first(change.tuple, initiator)));
        outcome
    }

    fn on_close(&self, change: &SocketStateChange) -> LifecycleOutcome {
        let Some(birth) = self.births.take(&change.id) else {
            return LifecycleOutcome::Missed;
        };

        let delta_us = self.clock.now_ns().saturating_sub(birth.ts_ns) / 1000;
        let (rx_b, tx_b) = if birth.initiator {
            (change.bytes_received, change.bytes_acked)
        } else {
            (change.bytes_acked, change.bytes_received)
        };

        self.sink.connection(&ConnectionEvent::closed(
            initiator_first(change.tuple, birth.initiator),
            delta_us,
            rx_b,
            tx_b,
        ));
        LifecycleOutcome::Closed
    }

    pub fn is_tracking(&self, id: ConnectionId) -> bool {
        self.births.contains(&id)
    }

    pub fn tracked_len(&self) -> usize {
        self.births.len()
    }
}

/// Local addressing becomes initiator addressing.
fn initiator_first(local: FourTuple, initiator: bool) -> FourTuple {
    if initiator { local } else { local.reversed() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sink::tests::MemorySink, utils::tests::ManualClock};

    const H: [u8; 4] = [10, 0, 0, 1];
    const P: [u8; 4] = [10, 0, 0, 2];

    fn local() -> FourTuple {
        FourTuple::new(H, 40000, P, 443)
    }

    fn change(id: u64, new_state: TcpState) -> SocketStateChange {
        SocketStateChange {
            id: ConnectionId(id),
            protocol: IPPROTO_TCP,
            old_state: TcpState::Close,
            new_state,
            tuple: local(),
            bytes_received: 0,
            bytes_acked: 0,
        }
    }

    fn closing(id: u64, bytes_received: u64, bytes_acked: u64) -> SocketStateChange {
        SocketStateChange {
            old_state: TcpState::LastAck,
            bytes_received,
            bytes_acked,
            ..change(id, TcpState::Close)
        }
    }

    fn setup(capacity: usize) -> (ConnectionLifecycleTracker, Arc<ManualClock>, Arc<MemorySink>) {
        let clock = Arc::new(ManualClock::at(1_000_000));
        let sink = Arc::new(MemorySink::default());
        let tracker = ConnectionLifecycleTracker::new(capacity, clock.clone(), sink.clone());
        (tracker, clock, sink)
    }

    #[test]
    fn test_outbound_connection_keeps_counters() {
        let (tracker, clock, sink) = setup(8);

        assert_eq!(
            tracker.on_state_change(&change(1, TcpState::SynSent)),
            LifecycleOutcome::Opened
        );
        clock.set(1_000_000 + 2_500_999);
        assert_eq!(
            tracker.on_state_change(&closing(1, 4096, 512)),
            LifecycleOutcome::Closed
        );

        let events = sink.connections();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ConnectionEvent::opened(local()));
        assert_eq!(events[1], ConnectionEvent::closed(local(), 2500, 4096, 512));
        assert!(!tracker.is_tracking(ConnectionId(1)));
    }

    #[test]
    fn test_inbound_connection_is_reported_from_initiator() {
        let (tracker, clock, sink) = setup(8);

        tracker.on_state_change(&change(2, TcpState::SynRecv));
        clock.set(1_000_000 + 7_000);
        tracker.on_state_change(&closing(2, 4096, 512));

        let events = sink.connections();
        // the remote peer opened the connection, so it is the source
        assert_eq!(events[0].tuple, local().reversed());
        assert_eq!(events[0].tuple.saddr, P);
        assert!(!events[0].closed);
        assert_eq!(
            events[1],
            ConnectionEvent::closed(local().reversed(), 7, 512, 4096)
        );
    }

    #[test]
    fn test_close_without_open_is_ignored() {
        let (tracker, _clock, sink) = setup(8);
        tracker.on_state_change(&change(3, TcpState::SynSent));

        assert_eq!(
            tracker.on_state_change(&closing(99, 1, 1)),
            LifecycleOutcome::Missed
        );
        assert_eq!(sink.connections().len(), 1);
        assert_eq!(tracker.tracked_len(), 1);
        assert!(tracker.is_tracking(ConnectionId(3)));
    }

    #[test]
    fn test_repeated_syn_does_not_reset_birth() {
        let (tracker, clock, sink) = setup(8);
        tracker.on_state_change(&change(4, TcpState::SynSent));
        clock.set(1_000_000 + 5_000);
        assert_eq!(
            tracker.on_state_change(&change(4, TcpState::SynRecv)),
            LifecycleOutcome::AlreadyPending
        );
        clock.set(1_000_000 + 9_000);
        tracker.on_state_change(&closing(4, 10, 20));

        let events = sink.connections();
        assert_eq!(events.len(), 2);
        // first birth wins: initiator and timestamp unchanged
        assert_eq!(events[1], ConnectionEvent::closed(local(), 9, 10, 20));
    }

    #[test]
    fn test_non_tcp_and_other_states_are_ignored() {
        let (tracker, _clock, sink) = setup(8);
        let udp = SocketStateChange {
            protocol: 17,
            ..change(5, TcpState::SynSent)
        };
        assert_eq!(tracker.on_state_change(&udp), LifecycleOutcome::Ignored);
        for state in [TcpState::Established, TcpState::FinWait1, TcpState::Listen] {
            assert_eq!(
                tracker.on_state_change(&change(5, state)),
                LifecycleOutcome::Ignored
            );
        }
        assert!(sink.events().is_empty());
        assert_eq!(tracker.tracked_len(), 0);
    }

    #[test]
    fn test_full_map_still_announces_open() {
        let (tracker, _clock, sink) = setup(1);
        tracker.on_state_change(&change(6, TcpState::SynSent));
        assert_eq!(
            tracker.on_state_change(&change(7, TcpState::SynSent)),
            LifecycleOutcome::Untracked
        );
        assert_eq!(
            tracker.on_state_change(&closing(7, 1, 1)),
            LifecycleOutcome::Missed
        );
        assert_eq!(sink.connections().len(), 2);
        assert_eq!(tracker.tracked_len(), 1);
    }

    #[test]
    fn test_duration_never_negative() {
        let (tracker, clock, sink) = setup(8);
        tracker.on_state_change(&change(8, TcpState::SynSent));
        clock.set(0);
        tracker.on_state_change(&closing(8, 0, 0));
        assert_eq!(sink.connections()[1].delta_us, 0);
    }
}
