//! Background task accepting inbound peer connections.
use crate::client::Client;
use crate::peer::Peer;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::TcpSocket;
use tracing::{info, warn};

const BACKLOG: u32 = 5;

/**
Accept loop bound to `0.0.0.0:<client port>`.

Each accepted connection runs the acceptor handshake inline; a valid peer
joins the client's set, anything else is dropped (the handshake path
already shut down the write half on a validation failure). The loop also
watches the client's shutdown flag, so teardown is observed without a
poll interval.
*/
pub async fn run(client: Arc<Client>) -> std::io::Result<()> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        client.port(),
    )))?;
    let listener = socket.listen(BACKLOG)?;
    info!(port = client.port(), "peer listener started");

    let mut shutdown = client.shutdown_signal();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        if client.is_shutting_down() {
                            break;
                        }
                        warn!(%err, "accept failed");
                        continue;
                    }
                };
                let info_hash = client.torrent().info_hash;
                let our_id = *client.peer_id();
                match Peer::accept(stream, info_hash, our_id).await {
                    Ok(peer) => {
                        info!(%addr, peer_id = %hex::encode(peer.peer_id), "inbound peer accepted");
                        client.add_peer(peer).await;
                    }
                    Err(err) => warn!(%addr, %err, "inbound handshake rejected"),
                }
            }
        }
    }

    info!("peer listener stopped");
    Ok(())
}
