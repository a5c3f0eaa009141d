//! Torrent descriptor and parsing logic.
//!
//! Defines the Metainfo struct for single-file torrents and the loader that
//! validates a .torrent file and computes its info hash.
use crate::bencode::decoder;
use crate::bencode::BencodeValue;
use crate::torrent::info_hash;

use super::TorrentError;
use super::TorrentResult;
use std::path::Path;

/// An immutable descriptor of a single-file torrent.
///
/// Built once by [`Metainfo::load`]; the announce URL, file name, and piece
/// hashes are copied out of the decoded tree so the tree itself can be
/// dropped.
#[derive(Debug, PartialEq, Clone)]
pub struct Metainfo {
    pub announce: String,
    pub name: String,
    pub piece_length: u64,
    pub length: u64,
    pub pieces: Vec<u8>,
    pub info_hash: [u8; 20],
}

impl Metainfo {
    /**
    Loads and validates a .torrent file.

    # How it works:
    1. Reads the whole file and decodes it as a single bencoded value.
    2. Extracts and validates `announce` plus the `info` fields `name`,
       `piece length` (> 0), `length` (> 0), and `pieces` (length a
       multiple of 20). Unknown keys are tolerated.
    3. Re-encodes the `info` subvalue and takes its SHA-1 as `info_hash`,
       so the hash matches the bytes that were actually on disk.
    4. Returns a `Metainfo` owning copies of every extracted field.
    */
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> TorrentResult<Metainfo> {
        let raw = std::fs::read(path)?;
        let (root, _consumed) = decoder::decode(&raw)?;
        Self::parse(&root)
    }

    /// Extracts and validates the descriptor fields from a decoded tree.
    pub fn parse(root: &BencodeValue) -> TorrentResult<Metainfo> {
        if root.as_dict().is_none() {
            return Err(TorrentError::InvalidFormat(
                "Root is not a dictionary".to_string(),
            ));
        }

        let announce_bytes = root
            .lookup(b"announce")
            .and_then(BencodeValue::as_str)
            .ok_or_else(|| TorrentError::MissingField("announce".to_string()))?;
        let announce = String::from_utf8(announce_bytes.to_vec()).map_err(|e| {
            TorrentError::InvalidFormat(format!("Invalid announce Url (not UTF-8): {}", e))
        })?;

        let info = root
            .lookup(b"info")
            .ok_or_else(|| TorrentError::MissingField("info".to_string()))?;
        if info.as_dict().is_none() {
            return Err(TorrentError::InvalidFormat(
                "info is not a dict".to_string(),
            ));
        }

        let name_bytes = info
            .lookup(b"name")
            .and_then(BencodeValue::as_str)
            .ok_or_else(|| TorrentError::MissingField("name".to_string()))?;
        let name = String::from_utf8(name_bytes.to_vec()).map_err(|e| {
            TorrentError::InvalidFormat(format!("Invalid name (not UTF-8): {}", e))
        })?;

        let piece_length = info
            .lookup(b"piece length")
            .and_then(BencodeValue::as_int)
            .filter(|len| *len > 0)
            .ok_or_else(|| TorrentError::MissingField("piece length".to_string()))?
            as u64;

        let length = info
            .lookup(b"length")
            .and_then(BencodeValue::as_int)
            .filter(|len| *len > 0)
            .ok_or_else(|| TorrentError::MissingField("length".to_string()))?
            as u64;

        let pieces = info
            .lookup(b"pieces")
            .and_then(BencodeValue::as_str)
            .ok_or_else(|| TorrentError::MissingField("pieces".to_string()))?;
        if pieces.len() % 20 != 0 {
            return Err(TorrentError::InvalidPiecesHashLength);
        }

        let info_hash = info_hash::calculate_info_hash(info);

        Ok(Metainfo {
            announce,
            name,
            piece_length,
            length,
            pieces: pieces.to_vec(),
            info_hash,
        })
    }

    /// Returns the number of pieces, counting the possibly short final one.
    pub fn piece_count(&self) -> u64 {
        (self.length + self.piece_length - 1) / self.piece_length
    }

    /// Returns the 20-byte SHA-1 recorded for piece `i`, or `None` when the
    /// index is past the end of `pieces`.
    pub fn piece_hash(&self, i: u64) -> Option<&[u8]> {
        let start = (i as usize).checked_mul(20)?;
        self.pieces.get(start..start + 20)
    }

    /**
    Returns the size in bytes of piece `i`.

    Every piece is `piece_length` long except the final one, which covers
    whatever remains of `length`. Out-of-range indexes size to 0.
    */
    pub fn piece_size(&self, i: u64) -> u64 {
        let count = self.piece_count();
        if i >= count {
            0
        } else if i < count - 1 {
            self.piece_length
        } else {
            self.length - (count - 1) * self.piece_length
        }
    }
}
