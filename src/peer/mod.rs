//! Peer connection setup: outbound dials, inbound accepts, and the
//! handshake both run before a connection counts as a peer.
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub mod handshake;
pub mod listener;

use handshake::Handshake;

/// Single deadline covering the connect attempt, and separately the
/// handshake read, on both sides of a connection.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Handshake failed: invalid pstrlen {0}")]
    InvalidPstrlen(u8),

    #[error("Handshake failed: invalid protocol identifier")]
    InvalidProtocol,

    #[error("Handshake failed: non-zero reserved bytes")]
    NonZeroReserved,

    #[error("Handshake failed: info hash mismatch")]
    InfoHashMismatch,

    #[error("Handshake timed out")]
    Timeout,
}

pub type PeerResult<T> = std::result::Result<T, PeerError>;

/// A live, handshaken peer connection.
///
/// Exists only after a successful handshake; the client's peer set owns it
/// and closes the stream at shutdown by dropping it.
#[derive(Debug)]
pub struct Peer {
    pub peer_id: [u8; 20],
    pub stream: TcpStream,
}

impl Peer {
    /**
    Dials a peer and performs the initiator side of the handshake.

    # How it works
    1. Resolves `host` (a numeric address or a DNS name) with the port and
       connects, bounded by the 5-second deadline.
    2. Sends our 68-byte handshake first, as the initiator does.
    3. Reads the peer's handshake (5-second deadline, short reads
       tolerated) and validates it against our `info_hash`.
    4. Returns the connected peer carrying the remote peer id.

    Any failure closes the socket by dropping it; nothing is registered.
    */
    pub async fn connect(
        host: &str,
        port: u16,
        info_hash: [u8; 20],
        our_peer_id: [u8; 20],
    ) -> PeerResult<Peer> {
        let mut stream = timeout(HANDSHAKE_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| PeerError::Timeout)??;

        stream
            .write_all(&Handshake::new(info_hash, our_peer_id).serialize())
            .await?;

        let theirs = Handshake::read(&mut stream).await?;
        theirs.validate(&info_hash)?;

        debug!(peer = %host, port, "outbound handshake complete");
        Ok(Peer {
            peer_id: theirs.peer_id,
            stream,
        })
    }

    /**
    Performs the acceptor side of the handshake on an inbound connection.

    The acceptor reads the initiator's handshake first and only answers
    with its own once every field checks out. On a validation failure the
    write half is shut down so the remote's pending read sees EOF, then
    the connection is dropped.
    */
    pub async fn accept(
        mut stream: TcpStream,
        info_hash: [u8; 20],
        our_peer_id: [u8; 20],
    ) -> PeerResult<Peer> {
        let theirs = match Handshake::read(&mut stream).await {
            Ok(handshake) => match handshake.validate(&info_hash) {
                Ok(()) => handshake,
                Err(err) => {
                    let _ = stream.shutdown().await;
                    return Err(err);
                }
            },
            Err(err) => {
                let _ = stream.shutdown().await;
                return Err(err);
            }
        };

        stream
            .write_all(&Handshake::new(info_hash, our_peer_id).serialize())
            .await?;

        Ok(Peer {
            peer_id: theirs.peer_id,
            stream,
        })
    }
}
