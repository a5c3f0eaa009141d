//! Tracker client logic for the BitTorrent protocol.
//!
//! This module implements communication with BitTorrent trackers, including:
//! - Announce URL construction with raw-byte percent encoding
//! - The announce lifecycle events (started, completed, stopped)
//! - Response parsing and peer dialing
//!
//! The poller drives peer discovery for the client.
use crate::client::Client;
use crate::peer::Peer;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_bytes::ByteBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP deadline for a single tracker request.
const TRACKER_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll period used until the tracker supplies one, and whenever it
/// supplies a non-positive value.
const DEFAULT_INTERVAL: u64 = 30;

/// Announce lifecycle events, in the order a session emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    Started,
    Completed,
    Stopped,
}

impl TrackerEvent {
    fn as_str(self) -> &'static str {
        match self {
            TrackerEvent::Started => "started",
            TrackerEvent::Completed => "completed",
            TrackerEvent::Stopped => "stopped",
        }
    }
}

/// A peer entry extracted from a tracker response.
#[derive(Debug, Clone)]
pub struct TrackerPeer {
    pub ip: String,
    pub port: u16,
    pub peer_id: Vec<u8>,
}

/// Contains the parsed response from a tracker.
#[derive(Debug)]
pub struct Announce {
    pub interval: u64,
    pub peers: Vec<TrackerPeer>,
}

#[derive(Debug, Deserialize)]
struct TrackerResponse {
    #[serde(rename = "failure reason")]
    failure_reason: Option<String>,
    interval: Option<i64>,
    peers: Option<Vec<PeerDict>>,
}

// Entries with missing or out-of-range fields are skipped, not fatal.
#[derive(Debug, Deserialize)]
struct PeerDict {
    ip: Option<String>,
    port: Option<i64>,
    #[serde(rename = "peer id")]
    peer_id: Option<ByteBuf>,
}

/**
Builds the full announce URL for one request.

The query carries `info_hash`, `peer_id`, `port`, `uploaded`,
`downloaded`, and `left` on every request; `event` is appended only when
the lifecycle calls for one. The two 20-byte values are percent-encoded
as raw bytes, so the URL is assembled by hand rather than through a
form-encoding API that would re-escape them.
*/
pub fn announce_url(
    announce: &str,
    info_hash: &[u8; 20],
    peer_id: &[u8; 20],
    port: u16,
    uploaded: u64,
    downloaded: u64,
    left: u64,
    event: Option<TrackerEvent>,
) -> String {
    let mut url = format!(
        "{}?info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}",
        announce,
        url_encode(info_hash),
        url_encode(peer_id),
        port,
        uploaded,
        downloaded,
        left,
    );
    if let Some(event) = event {
        url.push_str("&event=");
        url.push_str(event.as_str());
    }
    url
}

/// Parses the bencoded body of a tracker announce response.
///
/// A `failure reason` entry fails the poll. The interval falls back to 30
/// seconds when absent or non-positive. Peer entries missing a field or
/// carrying an out-of-range port are skipped.
fn parse_announce_response(bytes: &[u8]) -> Result<Announce> {
    let response: TrackerResponse =
        serde_bencode::from_bytes(bytes).context("malformed tracker response")?;

    if let Some(reason) = response.failure_reason {
        bail!("tracker failure: {}", reason);
    }

    let interval = match response.interval {
        Some(secs) if secs > 0 => secs as u64,
        _ => DEFAULT_INTERVAL,
    };

    let peers = response
        .peers
        .unwrap_or_default()
        .into_iter()
        .filter_map(|dict| {
            let ip = dict.ip?;
            let port = u16::try_from(dict.port?).ok()?;
            Some(TrackerPeer {
                ip,
                port,
                peer_id: dict.peer_id.map(ByteBuf::into_vec).unwrap_or_default(),
            })
        })
        .collect();

    Ok(Announce { interval, peers })
}

/// Sends one announce request and parses the response.
#[tracing::instrument(skip(http, client), level = "debug")]
async fn announce(
    http: &reqwest::Client,
    client: &Client,
    event: Option<TrackerEvent>,
) -> Result<Announce> {
    let url = announce_url(
        &client.torrent().announce,
        &client.torrent().info_hash,
        client.peer_id(),
        client.port(),
        client.uploaded(),
        client.downloaded(),
        client.left(),
        event,
    );
    debug!(%url, "announcing to tracker");
    let body = http.get(&url).send().await?.bytes().await?;
    parse_announce_response(&body)
}

/// Spawns a short-lived dial task for every peer the tracker returned.
fn spawn_peer_dials(client: &Arc<Client>, peers: Vec<TrackerPeer>) {
    for entry in peers {
        let client = Arc::clone(client);
        tokio::spawn(async move {
            let info_hash = client.torrent().info_hash;
            let our_id = *client.peer_id();
            match Peer::connect(&entry.ip, entry.port, info_hash, our_id).await {
                Ok(peer) => {
                    info!(ip = %entry.ip, port = entry.port, "outbound peer connected");
                    client.add_peer(peer).await;
                }
                Err(err) => {
                    warn!(ip = %entry.ip, port = entry.port, %err, "outbound peer connect failed");
                }
            }
        });
    }
}

/**
The tracker poll loop.

Announces immediately with `started`, then re-polls every `interval`
seconds (bootstrapped from the first response). When `left` transitions
to zero a single `completed` announce goes out. Poll failures are logged
and the next interval still runs. On shutdown the loop sends a final
`stopped` announce and discards whatever the tracker answers.
*/
pub async fn run(client: Arc<Client>) -> Result<()> {
    url::Url::parse(&client.torrent().announce).context("invalid announce URL")?;
    let http = reqwest::Client::builder()
        .timeout(TRACKER_TIMEOUT)
        .build()?;

    let mut shutdown = client.shutdown_signal();
    let mut interval = Duration::from_secs(DEFAULT_INTERVAL);
    let mut started_sent = false;
    // A file already complete at startup never "transitions" to zero.
    let mut completed_sent = client.left() == 0;

    loop {
        let event = if !started_sent {
            Some(TrackerEvent::Started)
        } else if !completed_sent && client.left() == 0 {
            Some(TrackerEvent::Completed)
        } else {
            None
        };

        match announce(&http, &client, event).await {
            Ok(response) => {
                if event == Some(TrackerEvent::Completed) {
                    completed_sent = true;
                }
                interval = Duration::from_secs(response.interval);
                info!(
                    peers = response.peers.len(),
                    interval = response.interval,
                    "tracker poll complete"
                );
                spawn_peer_dials(&client, response.peers);
            }
            Err(err) => warn!(%err, "tracker poll failed"),
        }
        // The session's first request has been made, whatever its outcome.
        started_sent = true;

        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    // Final announce; the response is discarded, no peers come from it.
    if let Err(err) = announce(&http, &client, Some(TrackerEvent::Stopped)).await {
        debug!(%err, "stopped announce failed");
    }
    info!("tracker poller stopped");
    Ok(())
}

/// URL-encodes a byte slice according to RFC 3986.
///
/// Unreserved characters (a-z, A-Z, 0-9, -, ., _, ~) pass through; every
/// other byte becomes %XX with uppercase hex digits.
pub fn url_encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}
