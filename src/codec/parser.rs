//! OSC message parsing: address, type tags and element offsets.

use super::tag::{BUNDLE_PREFIX, COMMA, FORWARD_SLASH, MAX_ELEMENTS_PER_MESSAGE, TypeTag};
use super::values::{ElementTable, MessageValues};
use super::{align4, padded_string_len};
use crate::blob::BlobHandle;
use crate::error::OscError;

/// Default packet buffer capacity.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Smallest accepted packet buffer capacity; smaller requests get the default.
pub const MIN_CAPACITY: usize = 256;

/// Classification of an address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Invalid,
    /// A literal address.
    Address,
    /// Contains pattern-matching characters (`*?[]{}`).
    Pattern,
}

/// Parses OSC messages in place from a fixed packet buffer.
///
/// The buffer is written by a receive call, then [`parse`](Parser::parse)
/// fills the element table that [`values`](Parser::values) reads from.
/// Each parse overwrites the results of the previous one.
pub struct Parser {
    buffer: Box<[u8]>,
    table: ElementTable,
    address_start: usize,
    address_len: usize,
    end: usize,
}

impl Parser {
    /// Creates a parser with the default 4096-byte buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a parser with a `capacity`-byte buffer. Capacities below 256
    /// fall back to the default.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity < MIN_CAPACITY {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            table: ElementTable::new(),
            address_start: 0,
            address_len: 0,
            end: 0,
        }
    }

    /// Size of the packet buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The whole packet buffer, including bytes past the last datagram.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The packet buffer, for receive calls to write into.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Number of elements recorded by the last parse.
    pub fn element_count(&self) -> usize {
        self.table.len()
    }

    /// Typed access to the elements found by the last successful parse.
    ///
    /// Reads are bounded by the end of the parsed message; bytes left over
    /// from earlier datagrams are never visible.
    pub fn values(&self) -> MessageValues<'_> {
        MessageValues::new(&self.buffer[..self.end], &self.table)
    }

    /// The address bytes of the last successful parse, without terminator.
    pub fn address(&self) -> BlobHandle<'_> {
        BlobHandle::new(&self.buffer[self.address_start..self.address_start + self.address_len])
    }

    /// Parses a single non-bundle message occupying `buffer[..len]`.
    ///
    /// Returns the unaligned address length. On error the element table is
    /// left as it was.
    pub fn parse(&mut self, len: usize) -> Result<usize, OscError> {
        self.parse_at(0, len)
    }

    /// Parses a single non-bundle message starting at `start` and ending no
    /// later than `end`.
    pub fn parse_at(&mut self, start: usize, end: usize) -> Result<usize, OscError> {
        let end = end.min(self.buffer.len());
        let bytes = &self.buffer[..end];

        // address length excludes the terminator so the address can be
        // looked up by its content bytes alone
        let address_len = find_unaligned_address_length(bytes, start)?;
        let tags_start = start + padded_string_len(address_len);

        let tag_size = self.table.parse_tags(bytes, tags_start);
        let values_start = tags_start + padded_string_len(tag_size);
        self.table.find_offsets(bytes, values_start);

        self.address_start = start;
        self.address_len = address_len;
        self.end = end;
        Ok(address_len)
    }

    /// Parses the type-tag string at `start` of `bytes` into this parser's
    /// element table. See [`ElementTable::parse_tags`].
    pub fn parse_tags(&mut self, bytes: &[u8], start: usize) -> usize {
        self.table.parse_tags(bytes, start)
    }

    /// Recomputes element offsets against the packet buffer, with the first
    /// value at `offset`.
    pub fn find_offsets(&mut self, offset: usize) {
        self.table.find_offsets(&self.buffer, offset);
    }

    /// Tests whether the 8 bytes at `index` are the `#bundle` prefix.
    pub fn is_bundle_tag_at(&self, index: usize) -> bool {
        is_bundle_tag_at(&self.buffer, index)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTable {
    /// Records the tags of the tag string at `start`.
    ///
    /// The string must begin with `,`; otherwise no elements are recorded and
    /// 0 is returned. Scanning stops at the first unsupported byte (normally
    /// the NUL terminator). Returns the tag string length including the
    /// comma. At most [`MAX_ELEMENTS_PER_MESSAGE`] tags are recorded.
    pub fn parse_tags(&mut self, bytes: &[u8], start: usize) -> usize {
        if bytes.get(start) != Some(&COMMA) {
            self.clear();
            return 0;
        }

        let mut recognized = 0;
        for tag in bytes[start + 1..].iter().map_while(|&b| TypeTag::from_byte(b)) {
            if recognized < MAX_ELEMENTS_PER_MESSAGE {
                self.tags[recognized] = tag;
            }
            recognized += 1;
        }

        self.count = recognized.min(MAX_ELEMENTS_PER_MESSAGE);
        recognized + 1
    }

    /// Walks the recorded tags and stores where each value begins, starting
    /// at `offset`. Sizes of strings and blobs are read from `bytes`.
    pub fn find_offsets(&mut self, bytes: &[u8], mut offset: usize) {
        for i in 0..self.count {
            self.offsets[i] = offset;
            let advance = match self.tags[i] {
                TypeTag::String | TypeTag::AltTypeString => string_length(bytes, offset),
                TypeTag::Blob => {
                    let size = read_u32(bytes, offset).unwrap_or(0) as usize;
                    4usize.saturating_add(align4(size.min(usize::MAX - 3)))
                }
                // true, false, nil, infinitum and array brackets carry no bytes
                tag => tag.fixed_width().unwrap_or(0),
            };
            offset = offset.saturating_add(advance);
        }
    }
}

/// Length of the address starting at `offset`, excluding its NUL.
///
/// Fails if the address does not start with `/` or is not terminated
/// within `bytes`.
pub fn find_unaligned_address_length(bytes: &[u8], offset: usize) -> Result<usize, OscError> {
    if bytes.get(offset) != Some(&FORWARD_SLASH) {
        return Err(OscError::MalformedAddress);
    }
    bytes[offset + 1..]
        .iter()
        .position(|&b| b == 0)
        .map(|nul| nul + 1)
        .ok_or(OscError::MalformedAddress)
}

/// Size of the string field at `offset`, terminator and padding included.
///
/// An unterminated string extends to the end of `bytes`.
pub fn string_length(bytes: &[u8], offset: usize) -> usize {
    let rest = bytes.get(offset..).unwrap_or_default();
    match rest.iter().position(|&b| b == 0) {
        Some(nul) => padded_string_len(nul),
        None => rest.len().max(1),
    }
}

/// Tests whether the 8 bytes at `index` of `bytes` are the `#bundle` prefix.
pub fn is_bundle_tag_at(bytes: &[u8], index: usize) -> bool {
    index
        .checked_add(8)
        .and_then(|end| bytes.get(index..end))
        .map(|b| u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        == Some(BUNDLE_PREFIX)
}

/// Distance from the `[` tag at `offset` to its matching `]`, or `None` if
/// there is no array starting there or it is unterminated.
pub fn find_array_length(bytes: &[u8], offset: usize) -> Option<usize> {
    if bytes.get(offset) != Some(&TypeTag::ArrayStart.as_byte()) {
        return None;
    }
    let mut depth = 0usize;
    for (i, &b) in bytes[offset..].iter().enumerate() {
        match TypeTag::from_byte(b) {
            Some(TypeTag::ArrayStart) => depth += 1,
            Some(TypeTag::ArrayEnd) => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            Some(_) => {}
            None => return None,
        }
    }
    None
}

const fn is_reserved_address_char(c: char) -> bool {
    matches!(c, ' ' | '#' | '*' | ',' | '?' | '[' | ']' | '{' | '}')
}

/// True for a literal address: starts with `/` and contains none of
/// ` #*,?[]{}`.
pub fn address_is_valid(address: &str) -> bool {
    address.starts_with('/') && !address.chars().any(is_reserved_address_char)
}

pub fn address_type(address: &str) -> AddressType {
    if !address.starts_with('/') {
        return AddressType::Invalid;
    }
    if !address.chars().any(is_reserved_address_char) {
        return AddressType::Address;
    }
    // not a literal address, but may still be a valid pattern
    if address.chars().any(|c| matches!(c, ' ' | '#' | ',')) {
        AddressType::Invalid
    } else {
        AddressType::Pattern
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
