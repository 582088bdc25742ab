mod config;
mod dict;
mod monitor;
mod sink;
mod storage;
mod store;
mod summary;
mod telemetry;
mod utils;

use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use tokio::{signal, sync::mpsc};

use crate::{
    config::Args,
    monitor::{ConnectionLifecycleTracker, HandshakeCorrelator, run_event_writer, run_replay_monitor},
    sink::{ChannelSink, EventSink, LogSink},
    utils::MonotonicClock,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    if let Some(addr) = args.metrics_address {
        telemetry::init(addr)?;
    }

    let mut writer = None;
    let sink: Arc<dyn EventSink> = if args.no_store {
        Arc::new(LogSink::new(args.persistent_duration))
    } else {
        let pool = storage::init(&args.db_path).await?;
        let (tx, rx) = mpsc::channel(args.channel_capacity);
        writer = Some(tokio::spawn(run_event_writer(
            pool,
            rx,
            args.persistent_duration,
        )));
        Arc::new(ChannelSink::new(tx))
    };

    let handshakes = Arc::new(HandshakeCorrelator::new(
        args.tls_store_capacity,
        sink.clone(),
    ));
    let lifecycle = Arc::new(ConnectionLifecycleTracker::new(
        args.lifecycle_capacity,
        Arc::new(MonotonicClock::new()),
        sink,
    ));

    let mut replay = tokio::spawn(run_replay_monitor(
        args.input,
        handshakes.clone(),
        lifecycle.clone(),
    ));

    info!("Waiting for Ctrl-C...");
    tokio::select! {
        res = &mut replay => match res {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Replay failed: {}", e),
            Err(e) => warn!("Replay task failed: {}", e),
        },
        res = signal::ctrl_c() => {
            res?;
            replay.abort();
            let _ = replay.await;
        }
    }

    info!(
        "Unanswered ClientHellos: {}, open connections: {}",
        handshakes.pending_len(),
        lifecycle.tracked_len()
    );
    drop(handshakes);
    drop(lifecycle);

    // the writer ends once the last correlator, and with it the sender, is gone
    if let Some(writer) = writer {
        let written = writer.await?;
        info!("Stored {} records", written);
    }

    info!("Exiting...");
    Ok(())
}
