use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::monitor::{handshake::DEFAULT_TLS_STORE_CAPACITY, lifecycle::DEFAULT_LIFECYCLE_CAPACITY};

/// Passive TLS handshake and TCP lifecycle observer.
#[derive(Debug, Clone, Parser)]
#[command(name = "tlsight", version, about, long_about = None)]
pub struct Args {
    /// JSON-lines capture to replay, `-` for stdin
    #[arg(short, long, env = "TLSIGHT_INPUT", default_value = "-")]
    pub input: String,

    /// sqlite database receiving the records
    #[arg(long, env = "TLSIGHT_DB_PATH", default_value = "tlsight.db")]
    pub db_path: String,

    /// Only log records, do not open the database
    #[arg(long, env = "TLSIGHT_NO_STORE", default_value_t = false)]
    pub no_store: bool,

    /// Pending ClientHello records kept while waiting for a ServerHello
    #[arg(long, env = "TLSIGHT_TLS_STORE_CAPACITY", default_value_t = DEFAULT_TLS_STORE_CAPACITY, value_parser = parse_capacity)]
    pub tls_store_capacity: usize,

    /// Connections tracked between open and close
    #[arg(long, env = "TLSIGHT_LIFECYCLE_CAPACITY", default_value_t = DEFAULT_LIFECYCLE_CAPACITY, value_parser = parse_capacity)]
    pub lifecycle_capacity: usize,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "TLSIGHT_METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,

    /// Closed connections at least this long count as persistent (`500ms`, `2s`, ...)
    #[arg(long, env = "TLSIGHT_PERSISTENT_DURATION", default_value = "1s", value_parser = parse_duration)]
    pub persistent_duration: Duration,

    /// Records buffered between the correlators and the database writer
    #[arg(long, env = "TLSIGHT_CHANNEL_CAPACITY", default_value_t = 1024, value_parser = parse_capacity)]
    pub channel_capacity: usize,
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    let capacity: usize = s.parse().map_err(|e| format!("{e}"))?;
    if capacity == 0 {
        return Err("capacity must be at least 1".to_string());
    }
    Ok(capacity)
}

/// Integer with an optional `us`, `ms`, `s` or `m` suffix; bare numbers are
/// milliseconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| format!("invalid duration `{s}`"))?;
    match unit {
        "us" => Ok(Duration::from_micros(value)),
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(format!("unknown duration unit `{unit}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["tlsight"]).unwrap();
        assert_eq!(args.input, "-");
        assert_eq!(args.tls_store_capacity, 4096);
        assert_eq!(args.lifecycle_capacity, 100);
        assert_eq!(args.channel_capacity, 1024);
        assert!(!args.no_store);
        assert_eq!(args.metrics_address, None);
        assert_eq!(args.persistent_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "tlsight",
            "--input",
            "capture.jsonl",
            "--tls-store-capacity",
            "16",
            "--lifecycle-capacity",
            "8",
            "--no-store",
            "--metrics-address",
            "127.0.0.1:9100",
            "--persistent-duration",
            "250ms",
        ])
        .unwrap();
        assert_eq!(args.input, "capture.jsonl");
        assert_eq!(args.tls_store_capacity, 16);
        assert_eq!(args.lifecycle_capacity, 8);
        assert!(args.no_store);
        assert_eq!(args.metrics_address, Some("127.0.0.1:9100".parse().unwrap()));
        assert_eq!(args.persistent_duration, Duration::from_millis(250));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(Args::try_parse_from(["tlsight", "--lifecycle-capacity", "0"]).is_err());
        assert!(Args::try_parse_from(["tlsight", "--tls-store-capacity", "lots"]).is_err());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("750us"), Ok(Duration::from_micros(750)));
        assert_eq!(parse_duration("40"), Ok(Duration::from_millis(40)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("5h").is_err());
        assert!(Args::try_parse_from(["tlsight", "--metrics-address", "nowhere"]).is_err());
    }
}
