//! GBN receiver: in-order delivery, cumulative ACKs, and a small buffer
//! for out-of-order packets.
use super::{get_seq, set_seq, GbnError, GbnResult, HEADER, MSS, PKT_BUF_SIZE};
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::trace;

/// Running counters, mirrored on stderr in verbose mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReceiverStats {
    pub packets: u64,
    pub segments: u64,
    pub seq_violations: u64,
    pub total_size: u64,
}

/// Everything one datagram produced: payloads now deliverable in order,
/// the cumulative ACK to send back, and whether the EOF marker was among
/// the delivered segments.
#[derive(Debug)]
pub struct Ingest {
    pub deliver: Vec<Bytes>,
    pub ack: u32,
    pub closing: bool,
}

pub struct ReceiverSession {
    expected_seq: u32,
    slots: Vec<Option<(u32, Bytes)>>,
    closing: bool,
    pub stats: ReceiverStats,
}

impl ReceiverSession {
    pub fn new() -> Self {
        Self {
            expected_seq: 0,
            slots: vec![None; PKT_BUF_SIZE],
            closing: false,
            stats: ReceiverStats::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closing
    }

    /**
    Processes one received datagram.

    A datagram shorter than the header (a zero-length one included) is a
    protocol violation and ends the session. An in-sequence packet is
    delivered together with every consecutive packet already buffered
    behind it; anything else elicits a duplicate ACK and, when it is a
    future packet whose slot is free, gets buffered for later. The
    returned ACK always carries the post-delivery `expected_seq`.
    */
    pub fn on_datagram(&mut self, data: &[u8]) -> GbnResult<Ingest> {
        if data.is_empty() {
            return Err(GbnError::EmptyDatagram);
        }
        if data.len() < HEADER {
            return Err(GbnError::ShortDatagram(data.len()));
        }
        self.stats.packets += 1;
        let seq = get_seq(data);

        if seq != self.expected_seq {
            self.stats.seq_violations += 1;
            if seq > self.expected_seq {
                let slot = &mut self.slots[seq as usize % PKT_BUF_SIZE];
                if slot.is_none() {
                    *slot = Some((seq, Bytes::copy_from_slice(&data[HEADER..])));
                } else {
                    trace!(seq, "buffer slot occupied, dropping packet");
                }
            }
            return Ok(Ingest {
                deliver: Vec::new(),
                ack: self.expected_seq,
                closing: false,
            });
        }

        let mut deliver = Vec::new();
        let mut payload = Bytes::copy_from_slice(&data[HEADER..]);
        loop {
            self.stats.segments += 1;
            self.stats.total_size += payload.len() as u64;
            if payload.is_empty() {
                self.closing = true;
            }
            deliver.push(payload);
            self.expected_seq = self.expected_seq.wrapping_add(1);

            // drain the next consecutive buffered packet, if any
            let index = self.expected_seq as usize % PKT_BUF_SIZE;
            match self.slots[index].take() {
                Some((seq, buffered)) if seq == self.expected_seq => payload = buffered,
                other => {
                    self.slots[index] = other;
                    break;
                }
            }
        }

        Ok(Ingest {
            deliver,
            ack: self.expected_seq,
            closing: self.closing,
        })
    }

    fn verbose_line(&self) -> String {
        format!(
            " seg={}  size={}  pkt={}  seq_err={}",
            self.stats.segments, self.stats.total_size, self.stats.packets, self.stats.seq_violations,
        )
    }
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new()
    }
}

/**
Runs a receiver session over a connected UDP socket, writing delivered
payloads to `sink` in order.

Every datagram is answered with a cumulative ACK. The loop ends after
acknowledging the EOF marker; a malformed datagram ends the session with
an error instead.
*/
pub async fn run<W: AsyncWrite + Unpin>(
    socket: &UdpSocket,
    sink: &mut W,
    verbose: bool,
) -> GbnResult<ReceiverStats> {
    let mut session = ReceiverSession::new();
    let mut buf = [0u8; HEADER + MSS];
    let mut ack_pkt = [0u8; HEADER];

    while session.is_open() {
        if verbose {
            eprint!("{}\r", session.verbose_line());
        }

        let n = socket.recv(&mut buf).await?;
        let ingest = session.on_datagram(&buf[..n])?;
        for payload in &ingest.deliver {
            sink.write_all(payload).await?;
        }
        if !ingest.deliver.is_empty() {
            sink.flush().await?;
        }
        set_seq(&mut ack_pkt, ingest.ack);
        socket.send(&ack_pkt).await?;
    }

    if verbose {
        eprintln!("{}", session.verbose_line());
    }
    Ok(session.stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0u8; HEADER + payload.len()];
        set_seq(&mut pkt, seq);
        pkt[HEADER..].copy_from_slice(payload);
        pkt
    }

    #[test]
    fn delivers_in_order_and_acks_cumulatively() {
        let mut session = ReceiverSession::new();
        let ingest = session.on_datagram(&packet(0, b"hello")).unwrap();
        assert_eq!(ingest.deliver, vec![Bytes::from_static(b"hello")]);
        assert_eq!(ingest.ack, 1);
        assert!(!ingest.closing);

        let ingest = session.on_datagram(&packet(1, b"world")).unwrap();
        assert_eq!(ingest.ack, 2);
    }

    #[test]
    fn out_of_order_packet_is_buffered_and_drained() {
        let mut session = ReceiverSession::new();
        // packet 1 arrives first: duplicate ACK of 0, buffered
        let ingest = session.on_datagram(&packet(1, b"second")).unwrap();
        assert!(ingest.deliver.is_empty());
        assert_eq!(ingest.ack, 0);
        assert_eq!(session.stats.seq_violations, 1);

        // packet 0 arrives: both deliver, ACK jumps to 2
        let ingest = session.on_datagram(&packet(0, b"first")).unwrap();
        assert_eq!(
            ingest.deliver,
            vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]
        );
        assert_eq!(ingest.ack, 2);
    }

    #[test]
    fn stale_packet_elicits_duplicate_ack_without_buffering() {
        let mut session = ReceiverSession::new();
        session.on_datagram(&packet(0, b"a")).unwrap();
        let ingest = session.on_datagram(&packet(0, b"a")).unwrap();
        assert!(ingest.deliver.is_empty());
        assert_eq!(ingest.ack, 1);
        assert!(session.slots.iter().all(Option::is_none));
    }

    #[test]
    fn occupied_slot_drops_the_newcomer() {
        let mut session = ReceiverSession::new();
        // seq 5 and seq 105 share slot 5; the first one stays
        session.on_datagram(&packet(5, b"keep")).unwrap();
        session.on_datagram(&packet(105, b"drop")).unwrap();
        let slot = session.slots[5].as_ref().unwrap();
        assert_eq!(slot.0, 5);
        assert_eq!(slot.1, Bytes::from_static(b"keep"));
    }

    #[test]
    fn aliased_far_future_packet_never_delivers_early() {
        let mut session = ReceiverSession::new();
        // seq 101 occupies slot 1 long before it is due
        session.on_datagram(&packet(101, b"future")).unwrap();
        let ingest = session.on_datagram(&packet(0, b"now")).unwrap();
        // the drain must stop at seq 1, not hand out packet 101
        assert_eq!(ingest.deliver, vec![Bytes::from_static(b"now")]);
        assert_eq!(ingest.ack, 1);
    }

    #[test]
    fn empty_payload_closes_the_session() {
        let mut session = ReceiverSession::new();
        session.on_datagram(&packet(0, b"data")).unwrap();
        let ingest = session.on_datagram(&packet(1, b"")).unwrap();
        assert_eq!(ingest.deliver, vec![Bytes::new()]);
        assert_eq!(ingest.ack, 2);
        assert!(ingest.closing);
        assert!(!session.is_open());
    }

    #[test]
    fn buffered_eof_closes_after_the_gap_fills() {
        let mut session = ReceiverSession::new();
        session.on_datagram(&packet(1, b"tail")).unwrap();
        session.on_datagram(&packet(2, b"")).unwrap();
        assert!(session.is_open());

        let ingest = session.on_datagram(&packet(0, b"head")).unwrap();
        assert_eq!(ingest.deliver.len(), 3);
        assert_eq!(ingest.ack, 3);
        assert!(ingest.closing);
    }

    #[test]
    fn malformed_datagrams_are_fatal() {
        let mut session = ReceiverSession::new();
        assert!(matches!(
            session.on_datagram(&[]),
            Err(GbnError::EmptyDatagram)
        ));
        assert!(matches!(
            session.on_datagram(&[1, 2]),
            Err(GbnError::ShortDatagram(2))
        ));
    }
}
