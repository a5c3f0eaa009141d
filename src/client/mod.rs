//! Client state: peer identity, transfer counters, and the live peer set.
//!
//! One `Client` exists per torrent session. The listener task, the tracker
//! poller, and the outbound dial tasks all share it behind an `Arc`; the
//! peer set is the only mutable structure they touch concurrently.
use crate::peer::Peer;
use crate::torrent::Metainfo;
use rand::Rng;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::sync::Mutex;
use tracing::info;

pub mod verify;

pub struct Client {
    peer_id: [u8; 20],
    port: u16,
    uploaded: AtomicU64,
    downloaded: AtomicU64,
    left: AtomicU64,
    torrent: Arc<Metainfo>,
    peers: Mutex<Vec<Peer>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Client {
    /**
    Creates the client for a torrent session.

    Generates the 20-byte peer id once, then initializes the transfer
    counters by verifying whatever already exists of the content file in
    the current directory (creating it empty when absent).
    */
    pub fn new(torrent: Arc<Metainfo>, port: u16) -> std::io::Result<Arc<Client>> {
        let status = verify::verify_local_file(&torrent, Path::new("."))?;
        let (shutdown_tx, _) = watch::channel(false);
        info!(
            name = %torrent.name,
            downloaded = status.downloaded,
            left = status.left,
            "client initialized"
        );
        Ok(Arc::new(Client {
            peer_id: generate_peer_id(),
            port,
            uploaded: AtomicU64::new(0),
            downloaded: AtomicU64::new(status.downloaded),
            left: AtomicU64::new(status.left),
            torrent,
            peers: Mutex::new(Vec::new()),
            shutdown_tx,
        }))
    }

    pub fn peer_id(&self) -> &[u8; 20] {
        &self.peer_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn left(&self) -> u64 {
        self.left.load(Ordering::Relaxed)
    }

    pub fn torrent(&self) -> &Metainfo {
        &self.torrent
    }

    /// A receiver on the shutdown flag; tasks select on `changed()`.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Appends a handshaken peer to the live set. Called concurrently by
    /// the listener, the tracker poller's dial tasks, and nothing else.
    pub async fn add_peer(&self, peer: Peer) {
        let mut peers = self.peers.lock().await;
        peers.push(peer);
        info!(count = peers.len(), "peer registered");
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /**
    First phase of teardown: raise the shutdown flag so the listener and
    tracker poller wind down, then close every registered peer socket.

    The caller still owns the task handles and awaits them; the poller
    sends its final `stopped` announce on its way out.
    */
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut peers = self.peers.lock().await;
        let count = peers.len();
        peers.clear(); // dropping each Peer closes its stream
        info!(closed = count, "peer connections closed");
    }
}

/// Generates this session's peer ID: a client prefix in the Azureus
/// convention followed by random bytes.
fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    let prefix = b"-RP0001-";
    peer_id[..prefix.len()].copy_from_slice(prefix);
    let mut rng = rand::rng();
    rng.fill(&mut peer_id[prefix.len()..]);
    peer_id
}
