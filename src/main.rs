use anyhow::{Context, Result};
use clap::Parser;
use rs_peer_core::client::Client;
use rs_peer_core::peer::listener;
use rs_peer_core::torrent::Metainfo;
use rs_peer_core::tracker;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// BitTorrent peer core: verifies the local file, serves the peer
/// listener, and polls the tracker until interrupted.
#[derive(Debug, Parser)]
#[command(name = "rspc", version)]
struct Args {
    /// Path to the .torrent file
    torrent: PathBuf,

    /// TCP port to listen on and advertise to the tracker
    #[arg(short, long, default_value_t = 6881)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let torrent = Metainfo::load(&args.torrent)
        .with_context(|| format!("failed to load {}", args.torrent.display()))?;
    info!(
        name = %torrent.name,
        length = torrent.length,
        pieces = torrent.piece_count(),
        info_hash = %hex::encode(torrent.info_hash),
        "torrent loaded"
    );

    let client = Client::new(Arc::new(torrent), args.port).context("failed to initialize client")?;

    let listener_task = tokio::spawn(listener::run(Arc::clone(&client)));
    let tracker_task = tokio::spawn(tracker::run(Arc::clone(&client)));

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    info!("shutting down");

    client.shutdown().await;
    if let Ok(Err(err)) = listener_task.await {
        error!(%err, "peer listener failed");
    }
    if let Ok(Err(err)) = tracker_task.await {
        error!(%err, "tracker poller failed");
    }

    info!(
        downloaded = client.downloaded(),
        left = client.left(),
        "session ended"
    );
    Ok(())
}
