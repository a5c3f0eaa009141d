//! Torrent metainfo parsing and error handling logic.
//!
//! This module defines the Metainfo descriptor for single-file torrents,
//! its loader, and the error type shared by the parsing path.
use thiserror::Error;
pub mod file;
pub mod info_hash;

pub use file::Metainfo;

#[derive(Debug, Error)]
pub enum TorrentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bencode decoding error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("Invalid torrent file format: {0}")]
    InvalidFormat(String),

    #[error("Missing or invalid field: {0}")]
    MissingField(String),

    #[error("Invalid pieces hash length")]
    InvalidPiecesHashLength,

    #[error("Url Parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type for torrent operations derived from `std::result`
pub type TorrentResult<T> = std::result::Result<T, TorrentError>;
