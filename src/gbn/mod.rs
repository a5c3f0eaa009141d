//! Go-Back-N reliable transport over UDP datagrams.
//!
//! Wire format: every packet starts with a 4-byte big-endian sequence
//! number. Data packets carry up to [`MSS`] payload bytes; a zero-length
//! payload is the in-band EOF marker and travels through the window like
//! any other segment. ACK packets are header-only and carry the sequence
//! number the receiver expects next (cumulative acknowledgment).
use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

pub mod args;
pub mod receiver;
pub mod sender;

/// Maximum payload bytes per data packet.
pub const MSS: usize = 1000;

/// Size of the sequence-number header.
pub const HEADER: usize = 4;

/// Ring capacity of the sender's retransmission window.
pub const MAX_WINDOW: usize = 1024;

/// Number of out-of-order packet slots on the receiver.
pub const PKT_BUF_SIZE: usize = 100;

/// Reads the sequence number from a packet header.
pub fn get_seq(pkt: &[u8]) -> u32 {
    BigEndian::read_u32(&pkt[..HEADER])
}

/// Writes the sequence number into a packet header.
pub fn set_seq(pkt: &mut [u8], seq: u32) {
    BigEndian::write_u32(&mut pkt[..HEADER], seq)
}

/// Errors that end a GBN session. Per-packet oddities (duplicate ACKs,
/// sequence numbers from the future) are state-machine inputs, not errors.
#[derive(Debug, Error)]
pub enum GbnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("received invalid, zero-length packet")]
    EmptyDatagram,

    #[error("received invalid packet of {0} bytes")]
    ShortDatagram(usize),
}

pub type GbnResult<T> = std::result::Result<T, GbnError>;
