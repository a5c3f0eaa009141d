use thiserror::Error;
pub mod decoder;
pub mod encoder;

/**
 * Represents a Bencode value, the core data structure of the Bencode
 * encoding format used throughout the BitTorrent protocol.
 *
 * The enum contains four variants that represent all possible Bencode
 * data types:
 *
 * 1. String(Vec<u8>):
 *    - A byte string, stored as raw bytes rather than UTF-8
 *    - May contain NUL or any other byte value (the `pieces` field does)
 *    - Example: "4:spam" decodes to String(b"spam")
 *
 * 2. Integer(i64):
 *    - A 64-bit signed integer, written as 'i' digits 'e'
 *    - Example: "i42e" decodes to Integer(42)
 *
 * 3. List(Vec<BencodeValue>):
 *    - An ordered sequence of Bencode values, written as 'l' ... 'e'
 *
 * 4. Dict(Vec<(Vec<u8>, BencodeValue)>):
 *    - A key/value mapping where keys are byte strings, written as 'd' ... 'e'
 *    - Pairs are kept in the order the decoder produced them and the encoder
 *      emits them verbatim; the bytes the `info` dictionary hashes to depend
 *      on that order
 */
#[derive(Debug, PartialEq, Clone)]
pub enum BencodeValue {
    String(Vec<u8>),
    Integer(i64),
    List(Vec<BencodeValue>),
    Dict(Vec<(Vec<u8>, BencodeValue)>),
}

impl BencodeValue {
    /// Returns the byte-string contents if this value is a string.
    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the list elements if this value is a list.
    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the dictionary pairs if this value is a dictionary.
    pub fn as_dict(&self) -> Option<&[(Vec<u8>, BencodeValue)]> {
        match self {
            BencodeValue::Dict(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Looks up a dictionary entry by exact byte equality on the key.
    ///
    /// The scan is linear and in insertion order. Returns `None` when this
    /// value is not a dictionary or the key is absent.
    pub fn lookup(&self, key: &[u8]) -> Option<&BencodeValue> {
        match self {
            BencodeValue::Dict(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_slice() == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Custom error type for Bencode operations.
#[derive(Debug, Error)]
pub enum BencodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid bencode format:{0}")]
    InvalidFormat(String),

    #[error("Invalid integer format")]
    InvalidInteger,

    #[error("Invalid String length")]
    InvalidStringLength,

    #[error("Unexpected end of input")]
    UnexpectedEOI,

    #[error("Dictionary keys must be strings")]
    DictKeyNotString,
}

pub type BencodeResult<T> = std::result::Result<T, BencodeError>;
