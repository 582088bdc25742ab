//! Prometheus counters and histograms for finished records.
//!
//! Without an installed recorder every call is a no-op, so the record paths
//! call in unconditionally.

use std::net::SocketAddr;

use log::info;
use metrics::{Label, counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::summary::{ConnectionSummary, TlsSummary};

pub const TLS_RECORD: &str = "tlsight_tls_record";
pub const BYTES_SENT: &str = "tlsight_bytes_sent";
pub const BYTES_RECEIVED: &str = "tlsight_bytes_received";
pub const DURATION_SECONDS: &str = "tlsight_duration_seconds";

/// Installs the global recorder and serves `/metrics` on `addr`.
pub fn init(addr: SocketAddr) -> Result<(), BuildError> {
    info!("Serving metrics on {}", addr);
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_handshake(summary: &TlsSummary) {
    counter!(
        TLS_RECORD,
        "src" => summary.client.clone(),
        "dst" => summary.server.clone(),
        "dst_port" => summary.server_port.to_string(),
        "domain" => summary.domain.clone(),
        "tls_version" => summary.used_tls_version.clone(),
        "cipher_suite" => summary.used_cipher_suite.clone()
    )
    .increment(1);
}

/// Only closed connections carry a duration and byte counts.
pub fn record_connection(summary: &ConnectionSummary, persistent: bool) {
    if !summary.closed {
        return;
    }

    let labels = vec![
        Label::new("src", summary.client.clone()),
        Label::new("dst", summary.server.clone()),
        Label::new("dst_port", summary.server_port.to_string()),
        Label::new("persistent", persistent.to_string()),
    ];
    histogram!(BYTES_SENT, labels.clone()).record(summary.tx_bytes as f64);
    histogram!(BYTES_RECEIVED, labels.clone()).record(summary.rx_bytes as f64);
    histogram!(DURATION_SECONDS, labels).record(summary.duration_us as f64 / 1_000_000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(closed: bool) -> ConnectionSummary {
        ConnectionSummary {
            client: "10.0.0.1".to_string(),
            client_port: 40000,
            server: "10.0.0.2".to_string(),
            server_port: 443,
            closed,
            duration_us: 2_500_000,
            rx_bytes: 4096,
            tx_bytes: 512,
        }
    }

    #[test]
    fn test_records_are_exported() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let summary = TlsSummary {
            source: "tc",
            client: "192.168.1.100".to_string(),
            client_port: 15000,
            server: "10.1.2.3".to_string(),
            server_port: 443,
            domain: "example.com".to_string(),
            client_tls_version: "TLS 1.2".to_string(),
            client_tls_versions: vec![],
            client_cipher_suites: vec![],
            used_tls_version: "TLS 1.3".to_string(),
            used_cipher_suite: "TLS_AES_128_GCM_SHA256".to_string(),
        };

        metrics::with_local_recorder(&recorder, || {
            record_handshake(&summary);
            record_handshake(&summary);
            record_connection(&connection(true), true);
            record_connection(&connection(false), false);
        });

        let rendered = handle.render();
        assert!(rendered.contains(TLS_RECORD));
        assert!(rendered.contains(r#"domain="example.com""#));
        assert!(rendered.contains(r#"cipher_suite="TLS_AES_128_GCM_SHA256""#));
        assert!(rendered.contains(BYTES_SENT));
        assert!(rendered.contains(BYTES_RECEIVED));
        assert!(rendered.contains(DURATION_SECONDS));
        assert!(rendered.contains(r#"persistent="true""#));
        // open events are not observed
        assert!(!rendered.contains(r#"persistent="false""#));
    }
}
