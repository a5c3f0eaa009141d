//! Library root for rs-peer-core.
//!
//! Two protocol cores live here: the BitTorrent peer side (bencode,
//! torrent, client, peer, tracker) and the Go-Back-N reliable transport
//! (gbn), shared by the rspc, gbn-sender, and gbn-receiver binaries.
pub mod bencode;
pub mod client;
pub mod gbn;
pub mod peer;
pub mod torrent;
pub mod tracker;
