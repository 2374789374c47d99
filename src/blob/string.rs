//! Owned, encoded strings that compare against borrowed blob handles.

use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::BufMut;

use super::BlobHandle;
use crate::error::OscError;

/// Text encoding used when converting strings to and from OSC bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// 7-bit ASCII. Characters outside ASCII encode as `?`.
    #[default]
    Ascii,
    Utf8,
}

impl StringEncoding {
    /// Appends the encoded form of `s` to `out`.
    pub fn encode_into<B: BufMut>(self, s: &str, out: &mut B) {
        match self {
            Self::Utf8 => out.put_slice(s.as_bytes()),
            Self::Ascii => {
                for c in s.chars() {
                    out.put_u8(if c.is_ascii() { c as u8 } else { b'?' });
                }
            }
        }
    }

    /// Number of bytes `s` occupies once encoded.
    pub fn encoded_len(self, s: &str) -> usize {
        match self {
            Self::Utf8 => s.len(),
            Self::Ascii => s.chars().count(),
        }
    }

    /// Decodes `bytes`, failing on bytes the encoding cannot represent.
    pub fn decode(self, bytes: &[u8]) -> Result<String, OscError> {
        match self {
            Self::Ascii if !bytes.is_ascii() => {
                Err(OscError::Encoding("non-ASCII byte in ASCII string".into()))
            }
            _ => String::from_utf8(bytes.to_vec())
                .map_err(|e| OscError::Encoding(format!("invalid UTF-8 string: {e}"))),
        }
    }
}

/// A string stored as its encoded bytes, for allocation-free comparison
/// against addresses read straight out of a packet buffer.
#[derive(Clone)]
pub struct BlobString {
    bytes: Box<[u8]>,
}

impl BlobString {
    /// Encodes `source` as ASCII.
    pub fn new(source: &str) -> Self {
        Self::with_encoding(source, StringEncoding::Ascii)
    }

    /// Encodes `source` with `encoding`.
    pub fn with_encoding(source: &str, encoding: StringEncoding) -> Self {
        let mut bytes = Vec::with_capacity(encoding.encoded_len(source));
        encoding.encode_into(source, &mut bytes);
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Copies already-encoded bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// A borrowed view of the encoded bytes.
    pub fn handle(&self) -> BlobHandle<'_> {
        BlobHandle::new(&self.bytes)
    }

    /// The encoded bytes, without terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the bytes back to text.
    pub fn decode(&self, encoding: StringEncoding) -> Result<String, OscError> {
        encoding.decode(&self.bytes)
    }
}

impl PartialEq for BlobString {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for BlobString {}

impl Hash for BlobString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle().hash(state);
    }
}

impl PartialEq<BlobHandle<'_>> for BlobString {
    fn eq(&self, other: &BlobHandle<'_>) -> bool {
        self.handle() == *other
    }
}

impl From<&str> for BlobString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for BlobString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for BlobString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobString({:?})", String::from_utf8_lossy(&self.bytes))
    }
}
