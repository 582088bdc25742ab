use crate::record::FourTuple;

pub const IPPROTO_TCP: u8 = 6;

pub const HANDSHAKE_RECORD: u8 = 0x16;
pub const CLIENT_HELLO: u8 = 0x01;
pub const SERVER_HELLO: u8 = 0x02;

/// Offset of the handshake message type: 5-byte record header.
pub const HANDSHAKE_TYPE_OFFSET: usize = 5;

/// Capture front-end a segment was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    TrafficControl,
    SocketFilter,
}

impl CaptureSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureSource::TrafficControl => "tc",
            CaptureSource::SocketFilter => "socket_filter",
        }
    }
}

/// A TCP segment after the header decoder has located its payload.
#[derive(Debug, Clone, Copy)]
pub struct DecodedSegment<'a> {
    pub source: CaptureSource,
    pub tuple: FourTuple,
    pub seq: u32,
    pub ack: u32,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    ClientHello,
    ServerHello,
}

/// Peeks the record type and handshake message type at their fixed offsets.
/// Anything that is not a ClientHello or ServerHello handshake record is `None`.
pub fn classify(payload: &[u8]) -> Option<HandshakeKind> {
    if *payload.first()? != HANDSHAKE_RECORD {
        return None;
    }
    match *payload.get(HANDSHAKE_TYPE_OFFSET)? {
        CLIENT_HELLO => Some(HandshakeKind::ClientHello),
        SERVER_HELLO => Some(HandshakeKind::ServerHello),
        _ => None,
    }
}

/// Linux TCP states as reported by `inet_sock_set_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
}

impl TryFrom<u8> for TcpState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let state = match value {
            1 => TcpState::Established,
            2 => TcpState::SynSent,
            3 => TcpState::SynRecv,
            4 => TcpState::FinWait1,
            5 => TcpState::FinWait2,
            6 => TcpState::TimeWait,
            7 => TcpState::Close,
            8 => TcpState::CloseWait,
            9 => TcpState::LastAck,
            10 => TcpState::Listen,
            11 => TcpState::Closing,
            12 => TcpState::NewSynRecv,
            other => return Err(other),
        };
        Ok(state)
    }
}

/// Opaque per-connection handle assigned by the socket event source at open
/// time and echoed on every later transition of the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// One kernel socket state transition.
#[derive(Debug, Clone, Copy)]
pub struct SocketStateChange {
    pub id: ConnectionId,
    pub protocol: u8,
    pub old_state: TcpState,
    pub new_state: TcpState,
    /// Addressing as seen by the local socket (source = local endpoint).
    pub tuple: FourTuple,
    pub bytes_received: u64,
    pub bytes_acked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&[0x16, 3, 1, 0, 50, 0x01]),
            Some(HandshakeKind::ClientHello)
        );
        assert_eq!(
            classify(&[0x16, 3, 3, 0, 50, 0x02]),
            Some(HandshakeKind::ServerHello)
        );
        // certificate message
        assert_eq!(classify(&[0x16, 3, 3, 0, 50, 0x0b]), None);
        // application data
        assert_eq!(classify(&[0x17, 3, 3, 0, 50, 0x01]), None);
        assert_eq!(classify(&[0x16, 3, 3]), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn test_tcp_state_numbering() {
        assert_eq!(TcpState::try_from(2), Ok(TcpState::SynSent));
        assert_eq!(TcpState::try_from(3), Ok(TcpState::SynRecv));
        assert_eq!(TcpState::try_from(7), Ok(TcpState::Close));
        assert_eq!(TcpState::try_from(0), Err(0));
        assert_eq!(TcpState::try_from(13), Err(13));
    }
}
