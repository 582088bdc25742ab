use std::time::Duration;

use log::{info, warn};
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::{
    sink::{SinkEvent, log_connection, log_handshake},
    storage,
    summary::{ConnectionSummary, TlsSummary},
    telemetry,
};

/// Drains the event channel into the log, the metrics and the database until
/// every sender is gone. Connections closed after at least `persistent_after`
/// count as persistent.
pub async fn run_event_writer(
    pool: SqlitePool,
    mut rx: mpsc::Receiver<SinkEvent>,
    persistent_after: Duration,
) -> u64 {
    info!("Waiting for events...");
    let mut written = 0u64;

    while let Some(event) = rx.recv().await {
        handle_event(&pool, event, persistent_after).await;
        written += 1;
    }

    info!("Event writer stopped after {} events", written);
    written
}

pub(crate) async fn handle_event(pool: &SqlitePool, event: SinkEvent, persistent_after: Duration) {
    match event {
        SinkEvent::Handshake { source, event } => {
            let summary = TlsSummary::from_event(source, &event);
            log_handshake(&summary);
            telemetry::record_handshake(&summary);
            if let Err(e) = storage::upsert_tls_connection(pool, &summary).await {
                warn!("Failed to store TLS connection: {}", e);
            }
        }
        SinkEvent::Connection(event) => {
            let summary = ConnectionSummary::from_event(&event);
            let persistent = summary.is_persistent(persistent_after);
            log_connection(&summary);
            telemetry::record_connection(&summary, persistent);
            if let Err(e) = storage::insert_connection(pool, &summary).await {
                warn!("Failed to store TCP connection: {}", e);
            }
            if let Err(e) = storage::upsert_tcp_edge(pool, &summary, persistent).await {
                warn!("Failed to update TCP edge: {}", e);
            }
        }
    }
}
