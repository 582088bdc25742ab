use std::time::Duration;

use serde::Serialize;
use tlsight_common::{CaptureSource, ConnectionEvent, HandshakeEvent};

use crate::{
    dict::{cipher_suite_name, tls_version_name},
    utils::ip_to_string,
};

/// Owned, human-readable view of a completed handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TlsSummary {
    pub source: &'static str,
    pub client: String,
    pub client_port: u16,
    pub server: String,
    pub server_port: u16,
    pub domain: String,
    pub client_tls_version: String,
    pub client_tls_versions: Vec<String>,
    pub client_cipher_suites: Vec<String>,
    pub used_tls_version: String,
    pub used_cipher_suite: String,
}

impl TlsSummary {
    pub fn from_event(source: CaptureSource, event: &HandshakeEvent) -> Self {
        let tuple = event.tuple;
        Self {
            source: source.as_str(),
            client: ip_to_string(tuple.saddr),
            client_port: tuple.sport,
            server: ip_to_string(tuple.daddr),
            server_port: tuple.dport,
            domain: String::from_utf8_lossy(event.server_name()).into_owned(),
            client_tls_version: tls_version_name(event.tls_version),
            client_tls_versions: event.tls_versions().map(tls_version_name).collect(),
            client_cipher_suites: event.cipher_suites().map(cipher_suite_name).collect(),
            used_tls_version: tls_version_name(event.used_tls_version),
            used_cipher_suite: cipher_suite_name(event.used_cipher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub client: String,
    pub client_port: u16,
    pub server: String,
    pub server_port: u16,
    pub closed: bool,
    pub duration_us: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl ConnectionSummary {
    pub fn from_event(event: &ConnectionEvent) -> Self {
        let tuple = event.tuple;
        Self {
            client: ip_to_string(tuple.saddr),
            client_port: tuple.sport,
            server: ip_to_string(tuple.daddr),
            server_port: tuple.dport,
            closed: event.closed,
            duration_us: event.delta_us,
            rx_bytes: event.rx_b,
            tx_bytes: event.tx_b,
        }
    }

    /// A closed connection that lasted at least `threshold`.
    pub fn is_persistent(&self, threshold: Duration) -> bool {
        self.closed && u128::from(self.duration_us) >= threshold.as_micros()
    }
}
