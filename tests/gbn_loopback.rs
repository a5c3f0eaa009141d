//! End-to-end GBN sessions over real UDP sockets on loopback.
use rs_peer_core::gbn::{get_seq, receiver, sender, HEADER};
use tokio::net::UdpSocket;

async fn socket_pair() -> (UdpSocket, UdpSocket) {
    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let a_addr = a.local_addr().unwrap();
    let b_addr = b.local_addr().unwrap();
    a.connect(b_addr).await.unwrap();
    b.connect(a_addr).await.unwrap();
    (a, b)
}

#[tokio::test]
async fn clean_session_delivers_input_and_terminates() {
    let (send_sock, recv_sock) = socket_pair().await;
    let data: Vec<u8> = (0..3500u32).map(|i| (i % 251) as u8).collect();

    let receiver_task = tokio::spawn(async move {
        let mut out: Vec<u8> = Vec::new();
        let stats = receiver::run(&recv_sock, &mut out, false).await.unwrap();
        (stats, out)
    });

    let mut input = &data[..];
    let sender_stats = sender::run(&send_sock, &mut input, false).await.unwrap();
    let (receiver_stats, out) = receiver_task.await.unwrap();

    assert_eq!(out, data);
    // four data packets (1000 + 1000 + 1000 + 500) plus the EOF marker
    assert_eq!(sender_stats.segments, 5);
    assert_eq!(sender_stats.total_size, 3500);
    assert_eq!(receiver_stats.segments, 5);
    assert_eq!(receiver_stats.total_size, 3500);
    assert_eq!(sender_stats.timeouts, 0);
}

#[tokio::test]
async fn empty_input_still_closes_cleanly() {
    let (send_sock, recv_sock) = socket_pair().await;

    let receiver_task = tokio::spawn(async move {
        let mut out: Vec<u8> = Vec::new();
        let stats = receiver::run(&recv_sock, &mut out, false).await.unwrap();
        (stats, out)
    });

    let mut input = &b""[..];
    let sender_stats = sender::run(&send_sock, &mut input, false).await.unwrap();
    let (receiver_stats, out) = receiver_task.await.unwrap();

    assert!(out.is_empty());
    // just the EOF marker travels
    assert_eq!(sender_stats.segments, 1);
    assert_eq!(receiver_stats.segments, 1);
}

#[tokio::test]
async fn lost_packet_is_recovered_and_delivery_stays_exact() {
    // sender <-> relay <-> receiver, the relay losing one pass of seq 5
    let send_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let recv_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_front = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_back = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    send_sock.connect(relay_front.local_addr().unwrap()).await.unwrap();
    recv_sock.connect(relay_back.local_addr().unwrap()).await.unwrap();
    relay_front.connect(send_sock.local_addr().unwrap()).await.unwrap();
    relay_back.connect(recv_sock.local_addr().unwrap()).await.unwrap();

    let relay = tokio::spawn(async move {
        let mut forward = [0u8; 2048];
        let mut backward = [0u8; 2048];
        let mut dropped = false;
        loop {
            tokio::select! {
                received = relay_front.recv(&mut forward) => {
                    let n = received.unwrap();
                    if !dropped && n > HEADER && get_seq(&forward) == 5 {
                        dropped = true;
                        continue;
                    }
                    relay_back.send(&forward[..n]).await.unwrap();
                }
                received = relay_back.recv(&mut backward) => {
                    let n = received.unwrap();
                    relay_front.send(&backward[..n]).await.unwrap();
                }
            }
        }
    });

    let data: Vec<u8> = (0..15_000u32).map(|i| (i.wrapping_mul(7) % 256) as u8).collect();
    let receiver_task = tokio::spawn(async move {
        let mut out: Vec<u8> = Vec::new();
        let stats = receiver::run(&recv_sock, &mut out, false).await.unwrap();
        (stats, out)
    });

    let mut input = &data[..];
    let sender_stats = sender::run(&send_sock, &mut input, false).await.unwrap();
    let (receiver_stats, out) = receiver_task.await.unwrap();
    relay.abort();

    assert_eq!(out, data);
    // the gap produced duplicate ACKs and some form of retransmission
    assert!(receiver_stats.seq_violations > 0);
    assert!(sender_stats.fast_retransmits + sender_stats.timeouts >= 1);
    assert_eq!(sender_stats.segments, 16);
    assert_eq!(receiver_stats.total_size, 15_000);
}
