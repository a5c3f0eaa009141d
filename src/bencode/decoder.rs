use super::BencodeError;
use super::BencodeResult;
use super::BencodeValue;

use tracing::instrument;

/// Decodes a single bencode value from the front of `input`.
///
/// Returns the decoded value together with the number of bytes consumed.
/// The decoder is strict: it accepts exactly the well-formed grammar and
/// nothing else, and it never reads past the end of the slice.
///
/// Rejected inputs include:
/// - integers with leading zeros (`i03e`), a negative zero (`i-0e`), or no
///   digits at all (`ie`, `i-e`)
/// - string bodies that overrun the input (`10:abc`)
/// - dictionaries whose keys are not byte strings
/// - lists and dictionaries missing their terminating `e`
///
/// # Arguments
/// * `input` - The encoded bytes; trailing bytes past the first complete
///   value are left untouched and are not an error
///
/// # Returns
/// * `BencodeResult<(BencodeValue, usize)>` - The value and the consumed
///   byte count, or an error describing the first malformed construct
///
/// # Example
/// For input "i42e3:abc", this function returns (Integer(42), 4).
#[instrument(skip(input), level = "trace")]
pub fn decode(input: &[u8]) -> BencodeResult<(BencodeValue, usize)> {
    decode_value(input)
}

/// Decodes a bencode byte string in the format `<length>:<data>`.
///
/// The length prefix is a run of ASCII digits; a prefix longer than one
/// digit must not start with '0'. The body must be fully present in the
/// input. Returns the string bytes and the total bytes consumed.
fn decode_string(input: &[u8]) -> BencodeResult<(Vec<u8>, usize)> {
    let colon = input
        .iter()
        .position(|&b| b == b':')
        .ok_or(BencodeError::UnexpectedEOI)?;
    if colon == 0 {
        return Err(BencodeError::InvalidStringLength);
    }
    let digits = &input[..colon];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(BencodeError::InvalidStringLength);
    }
    let length: usize = std::str::from_utf8(digits)
        .map_err(|_| BencodeError::InvalidStringLength)?
        .parse()
        .map_err(|_| BencodeError::InvalidStringLength)?;
    let body_start = colon + 1;
    let body_end = body_start
        .checked_add(length)
        .ok_or(BencodeError::InvalidStringLength)?;
    if body_end > input.len() {
        return Err(BencodeError::UnexpectedEOI);
    }
    Ok((input[body_start..body_end].to_vec(), body_end))
}

/// Decodes a bencode integer in the format `i<number>e`.
///
/// Several encodings are rejected as non-canonical:
/// - leading zeros, except for the single digit `i0e`
/// - `-0`
/// - an empty digit run
fn decode_integer(input: &[u8]) -> BencodeResult<(i64, usize)> {
    debug_assert_eq!(input.first(), Some(&b'i'));
    let end = input
        .iter()
        .position(|&b| b == b'e')
        .ok_or(BencodeError::UnexpectedEOI)?;
    let body = &input[1..end];

    let digits = match body.first() {
        Some(b'-') => &body[1..],
        _ => body,
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(BencodeError::InvalidInteger);
    }
    if digits[0] == b'0' && digits.len() > 1 {
        return Err(BencodeError::InvalidInteger);
    }
    if body == b"-0" {
        return Err(BencodeError::InvalidInteger);
    }

    let value = std::str::from_utf8(body)
        .map_err(|_| BencodeError::InvalidInteger)?
        .parse::<i64>()
        .map_err(|_| BencodeError::InvalidInteger)?;
    Ok((value, end + 1))
}

/// Decodes a bencode list in the format `l<items>e`, recursively decoding
/// each element until the terminating 'e'.
fn decode_list(input: &[u8]) -> BencodeResult<(Vec<BencodeValue>, usize)> {
    debug_assert_eq!(input.first(), Some(&b'l'));
    let mut items = Vec::new();
    let mut offset = 1;
    loop {
        match input.get(offset) {
            None => return Err(BencodeError::UnexpectedEOI),
            Some(b'e') => return Ok((items, offset + 1)),
            Some(_) => {
                let (item, consumed) = decode_value(&input[offset..])?;
                items.push(item);
                offset += consumed;
            }
        }
    }
}

/// Decodes a bencode dictionary in the format `d<key><value>...e`.
///
/// Keys must be byte strings. Pairs are stored in encounter order; the
/// decoder does not check or impose the sorted-key convention, so whatever
/// order the producer used survives a round trip.
fn decode_dict(input: &[u8]) -> BencodeResult<(Vec<(Vec<u8>, BencodeValue)>, usize)> {
    debug_assert_eq!(input.first(), Some(&b'd'));
    let mut pairs = Vec::new();
    let mut offset = 1;
    loop {
        match input.get(offset) {
            None => return Err(BencodeError::UnexpectedEOI),
            Some(b'e') => return Ok((pairs, offset + 1)),
            Some(b) => {
                if !b.is_ascii_digit() {
                    return Err(BencodeError::DictKeyNotString);
                }
                let (key, key_consumed) = decode_string(&input[offset..])?;
                offset += key_consumed;
                let (value, value_consumed) = decode_value(
                    input.get(offset..).ok_or(BencodeError::UnexpectedEOI)?,
                )?;
                offset += value_consumed;
                pairs.push((key, value));
            }
        }
    }
}

fn decode_value(input: &[u8]) -> BencodeResult<(BencodeValue, usize)> {
    match input.first().ok_or(BencodeError::UnexpectedEOI)? {
        b'0'..=b'9' => {
            let (s, n) = decode_string(input)?;
            Ok((BencodeValue::String(s), n))
        }
        b'i' => {
            let (i, n) = decode_integer(input)?;
            Ok((BencodeValue::Integer(i), n))
        }
        b'l' => {
            let (items, n) = decode_list(input)?;
            Ok((BencodeValue::List(items), n))
        }
        b'd' => {
            let (pairs, n) = decode_dict(input)?;
            Ok((BencodeValue::Dict(pairs), n))
        }
        other => Err(BencodeError::InvalidFormat(format!(
            "Unexpected character: {}",
            *other as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::encoder;

    fn decode_all(input: &[u8]) -> BencodeValue {
        let (value, consumed) = decode(input).expect("well-formed input");
        assert_eq!(consumed, input.len());
        value
    }

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode_all(b"i42e"), BencodeValue::Integer(42));
        assert_eq!(decode_all(b"i-17e"), BencodeValue::Integer(-17));
        assert_eq!(decode_all(b"i0e"), BencodeValue::Integer(0));
        assert_eq!(decode_all(b"4:spam"), BencodeValue::String(b"spam".to_vec()));
        assert_eq!(decode_all(b"0:"), BencodeValue::String(Vec::new()));
    }

    #[test]
    fn decodes_binary_strings_verbatim() {
        let input = b"3:\x00\xff\x01";
        assert_eq!(
            decode_all(input),
            BencodeValue::String(vec![0x00, 0xff, 0x01])
        );
    }

    #[test]
    fn decodes_nested_containers() {
        let value = decode_all(b"d3:cow3:moo4:spamli1ei2eee");
        assert_eq!(
            value.lookup(b"cow").and_then(|v| v.as_str()),
            Some(&b"moo"[..])
        );
        let spam = value.lookup(b"spam").and_then(|v| v.as_list()).unwrap();
        assert_eq!(spam.len(), 2);
    }

    #[test]
    fn reports_consumed_bytes_with_trailing_garbage() {
        let (value, consumed) = decode(b"i7etrailing").unwrap();
        assert_eq!(value, BencodeValue::Integer(7));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn rejects_malformed_integers() {
        for input in [&b"ie"[..], b"i-e", b"i-0e", b"i03e", b"i1x2e", b"i12"] {
            assert!(decode(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn rejects_truncated_strings_and_bad_lengths() {
        for input in [&b"10:abc"[..], b"5", b":abc", b"4spam"] {
            assert!(decode(input).is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn rejects_unterminated_containers_and_bad_keys() {
        for input in [&b"l"[..], b"li1e", b"d", b"d3:key", b"di1ei2ee"] {
            assert!(decode(input).is_err(), "accepted {:?}", input);
        }
        // the empty dict itself is fine, trailing bytes are not consumed
        let (value, consumed) = decode(b"de3").unwrap();
        assert_eq!(value, BencodeValue::Dict(Vec::new()));
        assert_eq!(consumed, 2);
    }

    #[test]
    fn rejects_empty_input() {
        assert!(decode(b"").is_err());
    }

    #[test]
    fn round_trips_preserve_exact_bytes() {
        let inputs: [&[u8]; 6] = [
            b"d3:cow3:moo4:spam4:eggse",
            b"l4:spami42ee",
            b"d4:spaml1:a1:bee",
            b"i-42e",
            b"0:",
            // keys deliberately not sorted: order must survive
            b"d1:b1:x1:a1:ye",
        ];
        for input in inputs {
            let (value, consumed) = decode(input).unwrap();
            assert_eq!(consumed, input.len());
            assert_eq!(encoder::to_bytes(&value), input);
        }
    }
}
