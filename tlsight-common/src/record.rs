/// Byte capacity of the offered cipher-suite window (50 two-byte suites).
pub const CIPHERS_MAX_SIZE: usize = 100;
/// Byte capacity of the server name window.
pub const SERVER_NAME_MAX_SIZE: usize = 100;
/// Byte capacity of the supported-versions window (4 two-byte versions).
pub const SUPPORTED_TLS_VERSIONS_MAX_SIZE: usize = 8;

/// Addressing of one direction of an IPv4 TCP connection.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FourTuple {
    pub saddr: [u8; 4],
    pub daddr: [u8; 4],
    pub sport: u16, // host byte order
    pub dport: u16,
}

impl FourTuple {
    pub fn new(saddr: [u8; 4], sport: u16, daddr: [u8; 4], dport: u16) -> Self {
        Self {
            saddr,
            daddr,
            sport,
            dport,
        }
    }

    /// The same connection seen from the other endpoint.
    pub fn reversed(&self) -> Self {
        Self {
            saddr: self.daddr,
            daddr: self.saddr,
            sport: self.dport,
            dport: self.sport,
        }
    }
}

/// TLS handshake metadata for one connection, built from a ClientHello and
/// completed from the matching ServerHello.
///
/// Variable-length fields are stored as the declared length plus a fixed
/// window. The declared length may exceed the window, in which case the
/// value is truncated; use the accessors to read only the valid part.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HandshakeEvent {
    pub tuple: FourTuple,

    pub tls_version: u16, // ClientHello legacy version
    pub tls_versions_length: u8, // declared bytes in supported_versions
    pub tls_versions: [u8; SUPPORTED_TLS_VERSIONS_MAX_SIZE],
    pub ciphers_length: u16, // declared bytes in the cipher-suite list
    pub ciphers: [u8; CIPHERS_MAX_SIZE],
    pub server_name_length: u16,
    pub server_name: [u8; SERVER_NAME_MAX_SIZE],

    pub used_tls_version: u16,
    pub used_cipher: u16,
}

impl HandshakeEvent {
    pub fn new(tuple: FourTuple) -> Self {
        Self {
            tuple,
            tls_version: 0,
            tls_versions_length: 0,
            tls_versions: [0; SUPPORTED_TLS_VERSIONS_MAX_SIZE],
            ciphers_length: 0,
            ciphers: [0; CIPHERS_MAX_SIZE],
            server_name_length: 0,
            server_name: [0; SERVER_NAME_MAX_SIZE],
            used_tls_version: 0,
            used_cipher: 0,
        }
    }

    /// Offered cipher suites, truncated to the window.
    pub fn cipher_suites(&self) -> impl Iterator<Item = u16> + '_ {
        u16_codes(&self.ciphers, self.ciphers_length as usize)
    }

    /// Versions from the supported_versions extension, truncated to the window.
    pub fn tls_versions(&self) -> impl Iterator<Item = u16> + '_ {
        u16_codes(&self.tls_versions, self.tls_versions_length as usize)
    }

    pub fn server_name(&self) -> &[u8] {
        let len = (self.server_name_length as usize).min(SERVER_NAME_MAX_SIZE);
        &self.server_name[..len]
    }

    pub fn is_server_name_truncated(&self) -> bool {
        self.server_name_length as usize > SERVER_NAME_MAX_SIZE
    }
}

impl core::fmt::Debug for HandshakeEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandshakeEvent")
            .field("tuple", &self.tuple)
            .field("tls_version", &self.tls_version)
            .field("tls_versions_length", &self.tls_versions_length)
            .field("ciphers_length", &self.ciphers_length)
            .field("server_name_length", &self.server_name_length)
            .field("used_tls_version", &self.used_tls_version)
            .field("used_cipher", &self.used_cipher)
            .finish_non_exhaustive()
    }
}

fn u16_codes(window: &[u8], declared: usize) -> impl Iterator<Item = u16> + '_ {
    let len = declared.min(window.len());
    window[..len]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
}

/// Connection lifecycle record. The same shape announces an open connection
/// and summarizes a closed one; addressing always has the initiator as source.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub tuple: FourTuple,
    pub delta_us: u64, // duration in microseconds
    pub rx_b: u64,     // bytes received by the initiator
    pub tx_b: u64,     // bytes transmitted by the initiator
    pub closed: bool,
}

impl ConnectionEvent {
    pub fn opened(tuple: FourTuple) -> Self {
        Self {
            tuple,
            ..Self::default()
        }
    }

    pub fn closed(tuple: FourTuple, delta_us: u64, rx_b: u64, tx_b: u64) -> Self {
        Self {
            tuple,
            delta_us,
            rx_b,
            tx_b,
            closed: true,
        }
    }
}

/// State kept between the open and close transitions of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthRecord {
    pub ts_ns: u64, // monotonic timestamp of the open transition
    pub initiator: bool, // opened by a locally initiated SYN
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_codes_stop_at_declared_length() {
        let mut event = HandshakeEvent::new(FourTuple::default());
        event.ciphers[..6].copy_from_slice(&[0x13, 0x01, 0x13, 0x02, 0x13, 0x03]);
        event.ciphers_length = 4;
        assert_eq!(event.cipher_suites().collect::<Vec<_>>(), [0x1301u16, 0x1302]);
    }

    #[test]
    fn test_oversized_declared_lengths_are_truncated() {
        let mut event = HandshakeEvent::new(FourTuple::default());
        event.ciphers_length = 0xffff;
        event.tls_versions_length = 0xff;
        event.server_name_length = 300;
        assert_eq!(event.cipher_suites().count(), CIPHERS_MAX_SIZE / 2);
        assert_eq!(
            event.tls_versions().count(),
            SUPPORTED_TLS_VERSIONS_MAX_SIZE / 2
        );
        assert_eq!(event.server_name().len(), SERVER_NAME_MAX_SIZE);
        assert!(event.is_server_name_truncated());
    }

    #[test]
    fn test_reversed_tuple() {
        let tuple = FourTuple::new([10, 0, 0, 1], 40000, [10, 0, 0, 2], 443);
        let rev = tuple.reversed();
        assert_eq!(rev.saddr, [10, 0, 0, 2]);
        assert_eq!(rev.sport, 443);
        assert_eq!(rev.reversed(), tuple);
    }

    #[test]
    fn test_connection_event_shapes() {
        let tuple = FourTuple::new([1, 1, 1, 1], 1, [2, 2, 2, 2], 2);
        let open = ConnectionEvent::opened(tuple);
        assert!(!open.closed);
        assert_eq!((open.delta_us, open.rx_b, open.tx_b), (0, 0, 0));
        let close = ConnectionEvent::closed(tuple, 5, 6, 7);
        assert!(close.closed);
        assert_eq!(close.tuple, tuple);
    }
}
