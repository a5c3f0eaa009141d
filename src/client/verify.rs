//! Startup verification of the local content file against the piece hashes.
use crate::torrent::Metainfo;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Byte counters derived from what is already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub downloaded: u64,
    pub left: u64,
}

/**
Checks the content file named by the torrent against its piece hashes.

# How it works:
1. Opens `dir/<name>`. A missing file is created empty and reports
   nothing downloaded.
2. Decides how many pieces to check: every piece (the final one short)
   when the file has reached the torrent length, otherwise only the
   pieces that are fully present. A torn tail is never hashed.
3. Reads and SHA-1s each checked piece; a piece counts toward
   `downloaded` only when its hash matches the recorded one. Mismatches
   are silent, they simply count zero.
4. Returns `downloaded = min(valid bytes, length)` and the remainder as
   `left`. Bytes past the torrent length are ignored.
*/
pub fn verify_local_file(torrent: &Metainfo, dir: &Path) -> std::io::Result<FileStatus> {
    let path = dir.join(&torrent.name);
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            File::create(&path)?;
            debug!(name = %torrent.name, "content file absent, created empty");
            return Ok(FileStatus {
                downloaded: 0,
                left: torrent.length,
            });
        }
        Err(err) => return Err(err),
    };

    let actual_size = file.metadata()?.len();
    let complete = actual_size >= torrent.length;
    let pieces_to_check = if complete {
        torrent.piece_count()
    } else {
        actual_size / torrent.piece_length
    };

    let mut valid = 0u64;
    let mut buffer = vec![0u8; torrent.piece_length as usize];
    for i in 0..pieces_to_check {
        let piece_size = if complete {
            torrent.piece_size(i)
        } else {
            torrent.piece_length
        };
        file.seek(SeekFrom::Start(i * torrent.piece_length))?;
        let piece = &mut buffer[..piece_size as usize];
        file.read_exact(piece)?;
        let digest: [u8; 20] = Sha1::digest(&piece[..]).into();
        if torrent.piece_hash(i) == Some(&digest[..]) {
            valid += piece_size;
        }
    }

    let downloaded = valid.min(torrent.length);
    debug!(
        name = %torrent.name,
        actual_size,
        downloaded,
        left = torrent.length - downloaded,
        "verified local file"
    );
    Ok(FileStatus {
        downloaded,
        left: torrent.length - downloaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIECE_LEN: u64 = 64;

    /// Builds a descriptor whose hashes match `content` split into
    /// 64-byte pieces.
    fn torrent_for(content: &[u8], name: &str) -> Metainfo {
        let mut pieces = Vec::new();
        for chunk in content.chunks(PIECE_LEN as usize) {
            let digest: [u8; 20] = Sha1::digest(chunk).into();
            pieces.extend_from_slice(&digest);
        }
        Metainfo {
            announce: "http://tracker.invalid/announce".to_string(),
            name: name.to_string(),
            piece_length: PIECE_LEN,
            length: content.len() as u64,
            pieces,
            info_hash: [0u8; 20],
        }
    }

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![7u8; 200];
        let torrent = torrent_for(&content, "fresh.bin");

        let status = verify_local_file(&torrent, dir.path()).unwrap();
        assert_eq!(status.downloaded, 0);
        assert_eq!(status.left, 200);
        assert_eq!(std::fs::metadata(dir.path().join("fresh.bin")).unwrap().len(), 0);
    }

    #[test]
    fn complete_file_counts_every_piece() {
        let dir = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..200u32).map(|i| i as u8).collect();
        let torrent = torrent_for(&content, "full.bin");
        std::fs::write(dir.path().join("full.bin"), &content).unwrap();

        let status = verify_local_file(&torrent, dir.path()).unwrap();
        assert_eq!(status.downloaded, 200);
        assert_eq!(status.left, 0);
    }

    #[test]
    fn partial_file_checks_only_whole_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![3u8; 200];
        let torrent = torrent_for(&content, "partial.bin");
        // first piece and a half: the torn tail must not count
        std::fs::write(dir.path().join("partial.bin"), &content[..96]).unwrap();

        let status = verify_local_file(&torrent, dir.path()).unwrap();
        assert_eq!(status.downloaded, 64);
        assert_eq!(status.left, 136);
    }

    #[test]
    fn corrupt_piece_counts_zero_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![9u8; 200];
        let torrent = torrent_for(&content, "corrupt.bin");
        let mut on_disk = content.clone();
        on_disk[70] ^= 0xff; // damage the second piece
        std::fs::write(dir.path().join("corrupt.bin"), &on_disk).unwrap();

        let status = verify_local_file(&torrent, dir.path()).unwrap();
        // pieces 0, 2 (64 each) and the 8-byte tail piece 3 still match
        assert_eq!(status.downloaded, 64 + 64 + 8);
        assert_eq!(status.left, 64);
    }

    #[test]
    fn oversized_file_never_reports_more_than_length() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![5u8; 130];
        let torrent = torrent_for(&content, "grown.bin");
        let mut on_disk = content.clone();
        on_disk.extend_from_slice(&[0u8; 64]); // junk past the torrent length
        std::fs::write(dir.path().join("grown.bin"), &on_disk).unwrap();

        let status = verify_local_file(&torrent, dir.path()).unwrap();
        assert_eq!(status.downloaded, 130);
        assert_eq!(status.left, 0);
    }
}
