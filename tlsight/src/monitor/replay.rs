//! Line-oriented front-end: each line is one JSON object describing either a
//! decoded TCP segment or a socket state transition.
//!
//! ```text
//! {"kind":"segment","source":"tc","saddr":"10.0.0.1","sport":40000,"daddr":"10.0.0.2","dport":443,"seq":1,"ack":2,"payload":"1603010200..."}
//! {"kind":"state","id":7,"protocol":6,"old_state":7,"new_state":2,"saddr":"10.0.0.1","sport":40000,"daddr":"10.0.0.2","dport":443}
//! ```

use std::{net::Ipv4Addr, sync::Arc};

use log::{info, warn};
use serde::Deserialize;
use tlsight_common::{
    CaptureSource, ConnectionId, DecodedSegment, FourTuple, SocketStateChange, TcpState,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::{
    handshake::{HandshakeCorrelator, SegmentOutcome},
    lifecycle::{ConnectionLifecycleTracker, LifecycleOutcome},
};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid payload hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("unknown TCP state {0}")]
    UnknownState(u8),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayRecord {
    Segment(SegmentRecord),
    State(StateRecord),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SourceRecord {
    #[default]
    Tc,
    SocketFilter,
}

impl From<SourceRecord> for CaptureSource {
    fn from(value: SourceRecord) -> Self {
        match value {
            SourceRecord::Tc => CaptureSource::TrafficControl,
            SourceRecord::SocketFilter => CaptureSource::SocketFilter,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SegmentRecord {
    #[serde(default)]
    source: SourceRecord,
    saddr: Ipv4Addr,
    sport: u16,
    daddr: Ipv4Addr,
    dport: u16,
    seq: u32,
    ack: u32,
    payload: String,
}

#[derive(Debug, Deserialize)]
struct StateRecord {
    id: u64,
    protocol: u8,
    old_state: u8,
    new_state: u8,
    saddr: Ipv4Addr,
    sport: u16,
    daddr: Ipv4Addr,
    dport: u16,
    #[serde(default)]
    bytes_received: u64,
    #[serde(default)]
    bytes_acked: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Segment(SegmentOutcome),
    State(LifecycleOutcome),
    Blank,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub segments: u64,
    pub state_changes: u64,
    pub handshakes: u64,
    pub connections_closed: u64,
    pub skipped: u64,
}

impl ReplayStats {
    fn record(&mut self, outcome: ReplayOutcome) {
        match outcome {
            ReplayOutcome::Segment(outcome) => {
                self.segments += 1;
                if outcome == SegmentOutcome::Emitted {
                    self.handshakes += 1;
                }
            }
            ReplayOutcome::State(outcome) => {
                self.state_changes += 1;
                if outcome == LifecycleOutcome::Closed {
                    self.connections_closed += 1;
                }
            }
            ReplayOutcome::Blank => {}
        }
    }
}

/// Feeds one input line into the matching correlator. Blank lines and lines
/// starting with `#` are skipped.
pub fn apply_line(
    line: &str,
    handshakes: &HandshakeCorrelator,
    lifecycle: &ConnectionLifecycleTracker,
) -> Result<ReplayOutcome, ReplayError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(ReplayOutcome::Blank);
    }

    match serde_json::from_str::<ReplayRecord>(line)? {
        ReplayRecord::Segment(record) => {
            let payload = hex::decode(record.payload.trim())?;
            let segment = DecodedSegment {
                source: record.source.into(),
                tuple: FourTuple::new(
                    record.saddr.octets(),
                    record.sport,
                    record.daddr.octets(),
                    record.dport,
                ),
                seq: record.seq,
                ack: record.ack,
                payload: &payload,
            };
            Ok(ReplayOutcome::Segment(handshakes.on_segment(&segment)))
        }
        ReplayRecord::State(record) => {
            let state = |raw: u8| TcpState::try_from(raw).map_err(ReplayError::UnknownState);
            let change = SocketStateChange {
                id: ConnectionId(record.id),
                protocol: record.protocol,
                old_state: state(record.old_state)?,
                new_state: state(record.new_state)?,
                tuple: FourTuple::new(
                    record.saddr.octets(),
                    record.sport,
                    record.daddr.octets(),
                    record.dport,
                ),
                bytes_received: record.bytes_received,
                bytes_acked: record.bytes_acked,
            };
            Ok(ReplayOutcome::State(lifecycle.on_state_change(&change)))
        }
    }
}

pub async fn replay_lines<R>(
    reader: R,
    handshakes: &HandshakeCorrelator,
    lifecycle: &ConnectionLifecycleTracker,
) -> Result<ReplayStats, anyhow::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match apply_line(&line, handshakes, lifecycle) {
            Ok(outcome) => stats.record(outcome),
            Err(e) => {
                warn!("Skipping line {}: {}", line_no, e);
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// Replays `input` (a path, or `-` for stdin) until end of input.
pub async fn run_replay_monitor(
    input: String,
    handshakes: Arc<HandshakeCorrelator>,
    lifecycle: Arc<ConnectionLifecycleTracker>,
) -> Result<ReplayStats, anyhow::Error> {
    info!("Starting replay monitor on {}...", input);

    let stats = if input == "-" {
        replay_lines(BufReader::new(tokio::io::stdin()), &handshakes, &lifecycle).await?
    } else {
        let file = tokio::fs::File::open(&input).await?;
        replay_lines(BufReader::new(file), &handshakes, &lifecycle).await?
    };

    info!(
        "Replay finished: segments={}, state_changes={}, handshakes={}, closed={}, skipped={}",
        stats.segments,
        stats.state_changes,
        stats.handshakes,
        stats.connections_closed,
        stats.skipped
    );
    Ok(stats)
}
