//! GBN sender: sliding window, retransmit timer, RTT estimation, and
//! TCP-Reno-style congestion control.
//!
//! All mutable transport state lives in one [`SenderSession`] owned by the
//! event loop. The session itself performs no I/O; every event handler
//! returns the datagram to (re)transmit, which keeps the window, timer,
//! and congestion bookkeeping testable without sockets.
use super::{get_seq, set_seq, GbnResult, HEADER, MAX_WINDOW, MSS};
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const INITIAL_TIMEOUT: Duration = Duration::from_millis(1000);
const INITIAL_RTT_MS: f64 = 150.0;
const INITIAL_RTT_DEV_MS: f64 = 50.0;
const INITIAL_SSTRESH: f64 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CcState {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SockState {
    Open,
    Closing,
    Closed,
}

/// Running counters, mirrored on stderr in verbose mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderStats {
    pub packets: u64,
    pub acks: u64,
    pub timeouts: u64,
    pub fast_retransmits: u64,
    pub segments: u64,
    pub total_size: u64,
}

/// Jacobson/Karels RTT estimator with a single outstanding sample.
///
/// A sample starts when a segment is sent and none is pending, and
/// resolves when the matching cumulative ACK arrives. An ACK past the
/// expectation discards the sample without an update, so retransmitted
/// segments never pollute the estimate.
#[derive(Debug)]
struct RttEstimator {
    rtt_ms: f64,
    rtt_dev_ms: f64,
    sample: Option<(u32, Instant)>,
    timeout: Duration,
}

impl RttEstimator {
    fn new() -> Self {
        Self {
            rtt_ms: INITIAL_RTT_MS,
            rtt_dev_ms: INITIAL_RTT_DEV_MS,
            sample: None,
            timeout: INITIAL_TIMEOUT,
        }
    }

    fn segment_sent(&mut self, seq: u32, now: Instant) {
        if self.sample.is_none() {
            self.sample = Some((seq.wrapping_add(1), now));
        }
    }

    fn ack_received(&mut self, ack: u32, now: Instant) {
        let Some((expected, start)) = self.sample else {
            return;
        };
        if ack < expected {
            return;
        }
        if ack == expected {
            let sample_ms = now.duration_since(start).as_secs_f64() * 1000.0;
            let deviation = (self.rtt_ms - sample_ms).abs();
            self.rtt_ms = 0.875 * self.rtt_ms + 0.125 * sample_ms;
            self.rtt_dev_ms = 0.75 * self.rtt_dev_ms + 0.25 * deviation;
            self.timeout = Duration::from_millis((self.rtt_ms + 4.0 * self.rtt_dev_ms) as u64);
        }
        self.sample = None;
    }

    /// Exponential backoff: the pending sample is lost and the next clean
    /// sample restores the timeout.
    fn timeout_event(&mut self) {
        self.sample = None;
        self.timeout *= 2;
    }
}

pub struct SenderSession {
    window: Vec<Option<Bytes>>,
    base: u32,
    next_seq: u32,
    cwnd: f64,
    sstresh: f64,
    dup_ack_count: u32,
    cc_state: CcState,
    state: SockState,
    rtt: RttEstimator,
    deadline: Option<Instant>,
    pub stats: SenderStats,
}

impl SenderSession {
    pub fn new() -> Self {
        Self {
            window: vec![None; MAX_WINDOW],
            base: 0,
            next_seq: 0,
            cwnd: 1.0,
            sstresh: INITIAL_SSTRESH,
            dup_ack_count: 0,
            cc_state: CcState::SlowStart,
            state: SockState::Open,
            rtt: RttEstimator::new(),
            deadline: None,
            stats: SenderStats::default(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == SockState::Closed
    }

    /// Application input is consumed only while the connection is open and
    /// the congestion window has room. The ring capacity caps the window
    /// so an unacked slot is never overwritten.
    pub fn window_open(&self) -> bool {
        let limit = self.cwnd.min(MAX_WINDOW as f64) as u32;
        self.state == SockState::Open && self.next_seq.wrapping_sub(self.base) < limit
    }

    /// Next retransmit deadline, when the timer is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn start_timer(&mut self, now: Instant) {
        self.deadline = Some(now + self.rtt.timeout);
    }

    fn stop_timer(&mut self) {
        self.deadline = None;
    }

    fn base_packet(&self) -> Option<Bytes> {
        self.window[self.base as usize % MAX_WINDOW].clone()
    }

    /**
    Admits one application segment into the window.

    Builds the packet with the next sequence number, remembers it for
    retransmission, and returns it for transmission. An empty segment is
    the EOF marker: it is still sent and acknowledged like any other
    packet, but the connection stops accepting input.
    */
    pub fn on_segment(&mut self, payload: &[u8], now: Instant) -> Bytes {
        debug_assert!(self.window_open());
        debug_assert!(payload.len() <= MSS);

        let mut pkt = BytesMut::zeroed(HEADER + payload.len());
        set_seq(&mut pkt, self.next_seq);
        pkt[HEADER..].copy_from_slice(payload);
        let pkt = pkt.freeze();

        self.window[self.next_seq as usize % MAX_WINDOW] = Some(pkt.clone());
        self.stats.segments += 1;
        self.stats.total_size += payload.len() as u64;
        self.stats.packets += 1;
        self.rtt.segment_sent(self.next_seq, now);
        if payload.is_empty() {
            self.state = SockState::Closing;
        }
        if self.next_seq == self.base {
            self.start_timer(now);
        }
        self.next_seq = self.next_seq.wrapping_add(1);
        pkt
    }

    /**
    Processes one cumulative ACK.

    - `ack == base` is a duplicate; the third consecutive one triggers
      fast retransmit and fast recovery, and the retransmitted base
      packet is returned. Once in fast recovery, each further duplicate
      inflates `cwnd` by one packet.
    - `base < ack <= next_seq` advances the window: RTT update, then
      congestion update by the number of newly acked packets, then base,
      then the timer (restarted while packets remain outstanding,
      stopped otherwise). A closing sender whose window empties is done.
    - Anything else is a spurious or forged ACK and is ignored.
    */
    pub fn on_ack(&mut self, ack: u32, now: Instant) -> Option<Bytes> {
        self.stats.acks += 1;
        self.rtt.ack_received(ack, now);

        if ack == self.base {
            if self.cc_state == CcState::FastRecovery {
                self.cwnd += 1.0;
                return None;
            }
            self.dup_ack_count += 1;
            if self.dup_ack_count < 3 {
                return None;
            }
            // fast retransmission
            self.dup_ack_count = 0;
            self.sstresh = (self.cwnd / 2.0).max(1.0);
            self.cwnd = self.sstresh + 3.0;
            self.cc_state = CcState::FastRecovery;
            self.stats.fast_retransmits += 1;
            let pkt = self.base_packet()?;
            self.stats.packets += 1;
            self.rtt.segment_sent(self.base, now);
            self.start_timer(now);
            debug!(base = self.base, cwnd = self.cwnd, "fast retransmit");
            return Some(pkt);
        }

        let outstanding = self.next_seq.wrapping_sub(self.base);
        let advance = ack.wrapping_sub(self.base);
        if advance == 0 || advance > outstanding {
            trace!(ack, base = self.base, "ignoring out-of-window ack");
            return None;
        }

        self.dup_ack_count = 0;
        self.receive_acks(advance);
        self.base = ack;
        if self.base == self.next_seq {
            self.stop_timer();
            if self.state == SockState::Closing {
                self.state = SockState::Closed;
            }
        } else {
            self.start_timer(now);
        }
        None
    }

    /// Congestion window growth for `acks` newly acknowledged packets.
    fn receive_acks(&mut self, acks: u32) {
        match self.cc_state {
            CcState::SlowStart => {
                self.cwnd += acks as f64;
                if self.cwnd >= self.sstresh {
                    self.cc_state = CcState::CongestionAvoidance;
                }
            }
            CcState::CongestionAvoidance => {
                self.cwnd += acks as f64 / self.cwnd;
            }
            CcState::FastRecovery => {
                self.cwnd = self.sstresh;
                self.cc_state = CcState::CongestionAvoidance;
            }
        }
    }

    /**
    Retransmit-timer expiry: collapse to slow start, resend the base
    packet, and double the retransmit timeout.
    */
    pub fn on_timeout(&mut self, now: Instant) -> Option<Bytes> {
        self.stats.timeouts += 1;
        self.rtt.timeout_event();
        self.dup_ack_count = 0;
        self.sstresh = (self.cwnd / 2.0).max(1.0);
        self.cwnd = 1.0;
        self.cc_state = CcState::SlowStart;

        let pkt = self.base_packet()?;
        self.stats.packets += 1;
        self.rtt.segment_sent(self.base, now);
        self.start_timer(now);
        debug!(base = self.base, timeout = ?self.rtt.timeout, "timeout retransmit");
        Some(pkt)
    }

    fn verbose_line(&self) -> String {
        format!(
            " base={}  seg={}  size={}  pkt={}  ack={}  to={}  rtt={:.3}",
            self.base,
            self.stats.segments,
            self.stats.total_size,
            self.stats.packets,
            self.stats.acks,
            self.stats.timeouts,
            self.rtt.rtt_ms,
        )
    }
}

impl Default for SenderSession {
    fn default() -> Self {
        Self::new()
    }
}

/**
Runs a sender session to completion over a connected UDP socket.

The loop multiplexes three events, handled in priority order: the
retransmit deadline, an incoming ACK datagram, and (only while the window
has room) the next application segment from `input`. It returns once the
EOF marker has been acknowledged.
*/
pub async fn run<R: AsyncRead + Unpin>(
    socket: &UdpSocket,
    input: &mut R,
    verbose: bool,
) -> GbnResult<SenderStats> {
    let mut session = SenderSession::new();
    let mut ack_buf = [0u8; HEADER];
    let mut seg_buf = [0u8; MSS];

    while !session.is_closed() {
        if verbose {
            eprint!("{}\r", session.verbose_line());
        }

        let deadline = session.deadline();
        let timer_active = deadline.is_some();
        let wake_at = deadline.unwrap_or_else(|| Instant::now() + INITIAL_TIMEOUT);

        tokio::select! {
            biased;

            _ = tokio::time::sleep_until(wake_at), if timer_active => {
                if let Some(pkt) = session.on_timeout(Instant::now()) {
                    socket.send(&pkt).await?;
                }
            }

            received = socket.recv(&mut ack_buf) => {
                let n = received?;
                if n < HEADER {
                    warn!(bytes = n, "invalid ack packet");
                } else {
                    let ack = get_seq(&ack_buf);
                    if let Some(pkt) = session.on_ack(ack, Instant::now()) {
                        socket.send(&pkt).await?;
                    }
                }
            }

            read = input.read(&mut seg_buf), if session.window_open() => {
                let n = read?;
                let pkt = session.on_segment(&seg_buf[..n], Instant::now());
                socket.send(&pkt).await?;
            }
        }
    }

    if verbose {
        eprintln!("{}", session.verbose_line());
    }
    Ok(session.stats)
}
