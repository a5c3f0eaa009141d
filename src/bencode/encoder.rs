use super::BencodeResult;
use super::BencodeValue;
use std::io::Write;

fn encode_string<W: Write>(writer: &mut W, s: &[u8]) -> BencodeResult<()> {
    write!(writer, "{}:", s.len())?;
    writer.write_all(s)?;
    Ok(())
}

fn encode_integer<W: Write>(writer: &mut W, i: i64) -> BencodeResult<()> {
    write!(writer, "i{}e", i)?;
    Ok(())
}

fn encode_list<W: Write>(writer: &mut W, list: &[BencodeValue]) -> BencodeResult<()> {
    writer.write_all(b"l")?;
    for item in list {
        encode_value(writer, item)?;
    }
    writer.write_all(b"e")?;
    Ok(())
}

fn encode_dict<W: Write>(
    writer: &mut W,
    pairs: &[(Vec<u8>, BencodeValue)],
) -> BencodeResult<()> {
    writer.write_all(b"d")?;
    // Pairs go out in stored order. Sorting here would silently change the
    // info_hash of any torrent whose producer did not sort its keys.
    for (key, value) in pairs {
        encode_string(writer, key)?;
        encode_value(writer, value)?;
    }
    writer.write_all(b"e")?;
    Ok(())
}

fn encode_value<W: Write>(writer: &mut W, value: &BencodeValue) -> BencodeResult<()> {
    match value {
        BencodeValue::String(s) => encode_string(writer, s),
        BencodeValue::Integer(i) => encode_integer(writer, *i),
        BencodeValue::List(list) => encode_list(writer, list),
        BencodeValue::Dict(pairs) => encode_dict(writer, pairs),
    }
}

/// Encodes `value` into `writer` in canonical minimal form.
///
/// Integers use the shortest decimal representation with a leading '-' for
/// negatives, and dictionaries are written in the order their pairs are
/// stored. A value produced by the decoder therefore encodes back to the
/// exact bytes it was decoded from.
pub fn encode<W: Write>(writer: &mut W, value: &BencodeValue) -> BencodeResult<()> {
    encode_value(writer, value)
}

/// Returns the exact number of bytes `encode` would write for `value`.
///
/// Useful for sizing a buffer up front without a throwaway encode pass.
pub fn encoded_len(value: &BencodeValue) -> usize {
    fn decimal_digits(mut n: u64) -> usize {
        let mut digits = 1;
        while n >= 10 {
            n /= 10;
            digits += 1;
        }
        digits
    }

    match value {
        BencodeValue::String(s) => decimal_digits(s.len() as u64) + 1 + s.len(),
        BencodeValue::Integer(i) => {
            let sign = usize::from(*i < 0);
            2 + sign + decimal_digits(i.unsigned_abs())
        }
        BencodeValue::List(list) => 2 + list.iter().map(encoded_len).sum::<usize>(),
        BencodeValue::Dict(pairs) => {
            2 + pairs
                .iter()
                .map(|(k, v)| decimal_digits(k.len() as u64) + 1 + k.len() + encoded_len(v))
                .sum::<usize>()
        }
    }
}

/// Encodes `value` into a freshly allocated buffer sized by `encoded_len`.
pub fn to_bytes(value: &BencodeValue) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(encoded_len(value));
    // Writing into a Vec cannot fail.
    let _ = encode_value(&mut buffer, value);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_use_minimal_decimal_form() {
        assert_eq!(to_bytes(&BencodeValue::Integer(0)), b"i0e");
        assert_eq!(to_bytes(&BencodeValue::Integer(42)), b"i42e");
        assert_eq!(to_bytes(&BencodeValue::Integer(-7)), b"i-7e");
        assert_eq!(
            to_bytes(&BencodeValue::Integer(i64::MIN)),
            b"i-9223372036854775808e"
        );
    }

    #[test]
    fn dict_encodes_in_stored_order() {
        let dict = BencodeValue::Dict(vec![
            (b"zz".to_vec(), BencodeValue::Integer(1)),
            (b"aa".to_vec(), BencodeValue::Integer(2)),
        ]);
        assert_eq!(to_bytes(&dict), b"d2:zzi1e2:aai2ee");
    }

    #[test]
    fn encoded_len_matches_actual_output() {
        let values = [
            BencodeValue::Integer(-1200),
            BencodeValue::String(vec![0u8; 1000]),
            BencodeValue::List(vec![
                BencodeValue::Integer(9),
                BencodeValue::String(b"ten bytes!".to_vec()),
            ]),
            BencodeValue::Dict(vec![(
                b"k".to_vec(),
                BencodeValue::List(vec![BencodeValue::Integer(1_000_000)]),
            )]),
        ];
        for value in &values {
            assert_eq!(encoded_len(value), to_bytes(value).len());
        }
    }

    #[test]
    fn empty_containers() {
        assert_eq!(to_bytes(&BencodeValue::List(Vec::new())), b"le");
        assert_eq!(to_bytes(&BencodeValue::Dict(Vec::new())), b"de");
        assert_eq!(to_bytes(&BencodeValue::String(Vec::new())), b"0:");
    }
}
