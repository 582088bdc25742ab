use log::info;
use sqlx::SqlitePool;

use crate::summary::{ConnectionSummary, TlsSummary};

pub async fn init(path: &str) -> Result<SqlitePool, sqlx::Error> {
    info!("Initialising DB at path: {}", path);
    let url = format!("sqlite:{}?mode=rwc", path);
    let pool = SqlitePool::connect(&url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// One row per client/server/port; repeated handshakes refresh the row.
pub async fn upsert_tls_connection(
    pool: &SqlitePool,
    summary: &TlsSummary,
) -> Result<(), sqlx::Error> {
    let versions = to_json(&summary.client_tls_versions)?;
    let ciphers = to_json(&summary.client_cipher_suites)?;

    sqlx::query(
        "INSERT INTO tls_connections (source, client, server, server_port, domain, client_tls_version, client_tls_versions, client_cipher_suites, used_tls_version, used_cipher_suite)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (client, server, server_port) DO UPDATE SET
            source = excluded.source,
            domain = excluded.domain,
            client_tls_version = excluded.client_tls_version,
            client_tls_versions = excluded.client_tls_versions,
            client_cipher_suites = excluded.client_cipher_suites,
            used_tls_version = excluded.used_tls_version,
            used_cipher_suite = excluded.used_cipher_suite,
            seen_count = tls_connections.seen_count + 1,
            last_seen = CURRENT_TIMESTAMP",
    )
    .bind(summary.source)
    .bind(&summary.client)
    .bind(&summary.server)
    .bind(summary.server_port as i64)
    .bind(&summary.domain)
    .bind(&summary.client_tls_version)
    .bind(versions)
    .bind(ciphers)
    .bind(&summary.used_tls_version)
    .bind(&summary.used_cipher_suite)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_connection(
    pool: &SqlitePool,
    summary: &ConnectionSummary,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tcp_connections (client, client_port, server, server_port, closed, duration_us, rx_bytes, tx_bytes)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&summary.client)
    .bind(summary.client_port as i64)
    .bind(&summary.server)
    .bind(summary.server_port as i64)
    .bind(summary.closed)
    .bind(to_i64(summary.duration_us))
    .bind(to_i64(summary.rx_bytes))
    .bind(to_i64(summary.tx_bytes))
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per client/server/port. Closed connections add to the counters;
/// any event refreshes `last_seen`.
pub async fn upsert_tcp_edge(
    pool: &SqlitePool,
    summary: &ConnectionSummary,
    persistent: bool,
) -> Result<(), sqlx::Error> {
    let (count, persistent, sent, received, duration) = if summary.closed {
        (
            1i64,
            i64::from(persistent),
            to_i64(summary.tx_bytes),
            to_i64(summary.rx_bytes),
            to_i64(summary.duration_us),
        )
    } else {
        (0, 0, 0, 0, 0)
    };

    sqlx::query(
        "INSERT INTO tcp_edges (client, server, server_port, conn_count, conn_persistent, bytes_sent, bytes_received, duration_us, max_duration_us)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (client, server, server_port) DO UPDATE SET
            conn_count = tcp_edges.conn_count + excluded.conn_count,
            conn_persistent = tcp_edges.conn_persistent + excluded.conn_persistent,
            bytes_sent = tcp_edges.bytes_sent + excluded.bytes_sent,
            bytes_received = tcp_edges.bytes_received + excluded.bytes_received,
            duration_us = tcp_edges.duration_us + excluded.duration_us,
            max_duration_us = MAX(tcp_edges.max_duration_us, excluded.max_duration_us),
            last_seen = CURRENT_TIMESTAMP",
    )
    .bind(&summary.client)
    .bind(&summary.server)
    .bind(summary.server_port as i64)
    .bind(count)
    .bind(persistent)
    .bind(sent)
    .bind(received)
    .bind(duration)
    .bind(duration)
    .execute(pool)
    .await?;

    Ok(())
}

fn to_json(names: &[String]) -> Result<String, sqlx::Error> {
    serde_json::to_string(names).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
