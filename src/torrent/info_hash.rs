use crate::bencode::encoder;
use crate::bencode::BencodeValue;
use sha1::Digest;
use sha1::Sha1;

/// Calculates the SHA-1 hash of a bencode-encoded info dictionary.
///
/// This function takes the decoded `info` value of a torrent and:
/// 1. Re-encodes it into bencode form, preserving the decoded pair order
/// 2. Calculates the SHA-1 hash of the encoded bytes
/// 3. Returns the 20-byte digest as a fixed-size array
///
/// Because the encoder reproduces the decoder's output byte for byte, the
/// result is identical to hashing the `info` slice of the original file,
/// and two loads of the same file always agree.
pub fn calculate_info_hash(info: &BencodeValue) -> [u8; 20] {
    let encoded = encoder::to_bytes(info);
    let digest = Sha1::digest(&encoded);
    let mut info_hash = [0u8; 20];
    info_hash.copy_from_slice(&digest);
    info_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::decoder;

    #[test]
    fn hash_matches_direct_digest_of_wire_bytes() {
        let wire = b"d6:lengthi92063e4:name10:sample.txt12:piece lengthi32768e6:pieces20:aaaaaaaaaaaaaaaaaaaae";
        let (info, consumed) = decoder::decode(wire).unwrap();
        assert_eq!(consumed, wire.len());

        let expected: [u8; 20] = Sha1::digest(&wire[..]).into();
        assert_eq!(calculate_info_hash(&info), expected);
    }

    #[test]
    fn hash_depends_on_pair_order() {
        let (a, _) = decoder::decode(b"d1:ai1e1:bi2ee").unwrap();
        let (b, _) = decoder::decode(b"d1:bi2e1:ai1ee").unwrap();
        assert_ne!(calculate_info_hash(&a), calculate_info_hash(&b));
    }
}
