//! Typed access to the elements of a parsed message.
//!
//! Checked reads decode an element into an [`Element`] and convert it
//! through [`FromElement`], so every tag/target combination goes through
//! one place. Unchecked reads reinterpret the bytes at the element's offset
//! without looking at the tag.

use std::borrow::Cow;

use super::tag::{MAX_ELEMENTS_PER_MESSAGE, TypeTag};
use crate::blob::BlobHandle;
use crate::error::{OscError, Result};
use crate::types::{Color32, MidiMessage, NtpTimestamp};

/// Tags and value offsets of one message. Entries at or past `len()` are
/// stale.
#[derive(Debug, Clone)]
pub struct ElementTable {
    pub(super) tags: [TypeTag; MAX_ELEMENTS_PER_MESSAGE],
    pub(super) offsets: [usize; MAX_ELEMENTS_PER_MESSAGE],
    pub(super) count: usize,
}

impl ElementTable {
    /// An empty table.
    pub const fn new() -> Self {
        Self {
            tags: [TypeTag::Nil; MAX_ELEMENTS_PER_MESSAGE],
            offsets: [0; MAX_ELEMENTS_PER_MESSAGE],
            count: 0,
        }
    }

    /// Number of recorded elements.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Forgets all elements without touching the arrays.
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Appends an element. Returns false if the table is full.
    pub fn push(&mut self, tag: TypeTag, offset: usize) -> bool {
        if self.count == MAX_ELEMENTS_PER_MESSAGE {
            return false;
        }
        self.tags[self.count] = tag;
        self.offsets[self.count] = offset;
        self.count += 1;
        true
    }

    /// Tag of element `index`, if recorded.
    pub fn tag(&self, index: usize) -> Option<TypeTag> {
        self.tags().get(index).copied()
    }

    pub fn offset(&self, index: usize) -> Option<usize> {
        self.offsets().get(index).copied()
    }

    /// Recorded tags, in message order.
    pub fn tags(&self) -> &[TypeTag] {
        &self.tags[..self.count]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets[..self.count]
    }
}

impl Default for ElementTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded element value. Strings and blobs borrow the packet buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element<'a> {
    Int32(i32),
    Float32(f32),
    /// String content without the terminator (`s` and `S` tags).
    String(&'a [u8]),
    Blob(&'a [u8]),
    Int64(i64),
    Float64(f64),
    TimeTag(NtpTimestamp),
    Midi(MidiMessage),
    Color32(Color32),
    AsciiChar32(char),
    True,
    False,
    Nil,
    Infinitum,
    ArrayStart,
    ArrayEnd,
}

impl Element<'_> {
    /// The tag this element was decoded from. `S` strings report `String`.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Int32(_) => TypeTag::Int32,
            Self::Float32(_) => TypeTag::Float32,
            Self::String(_) => TypeTag::String,
            Self::Blob(_) => TypeTag::Blob,
            Self::Int64(_) => TypeTag::Int64,
            Self::Float64(_) => TypeTag::Float64,
            Self::TimeTag(_) => TypeTag::TimeTag,
            Self::Midi(_) => TypeTag::Midi,
            Self::Color32(_) => TypeTag::Color32,
            Self::AsciiChar32(_) => TypeTag::AsciiChar32,
            Self::True => TypeTag::True,
            Self::False => TypeTag::False,
            Self::Nil => TypeTag::Nil,
            Self::Infinitum => TypeTag::Infinitum,
            Self::ArrayStart => TypeTag::ArrayStart,
            Self::ArrayEnd => TypeTag::ArrayEnd,
        }
    }
}

/// Conversion from a decoded element, used by the checked readers.
pub trait FromElement<'a>: Sized {
    /// Name of the target type in mismatch errors.
    const EXPECTED: &'static str;

    /// Returns `None` when the element's tag cannot be read as `Self`.
    fn from_element(element: Element<'a>) -> Option<Self>;
}

impl<'a> FromElement<'a> for i32 {
    const EXPECTED: &'static str = "i32";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::Int32(v) => Some(v),
            Element::Float32(v) => Some(v as i32),
            Element::AsciiChar32(c) => Some(c as i32),
            Element::True => Some(1),
            Element::False => Some(0),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for i64 {
    const EXPECTED: &'static str = "i64";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::Int32(v) => Some(i64::from(v)),
            Element::Int64(v) => Some(v),
            Element::Float32(v) => Some(v as i64),
            Element::Float64(v) => Some(v as i64),
            Element::AsciiChar32(c) => Some(i64::from(u32::from(c))),
            Element::True => Some(1),
            Element::False => Some(0),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for f32 {
    const EXPECTED: &'static str = "f32";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::Int32(v) => Some(v as f32),
            Element::Float32(v) => Some(v),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::Int32(v) => Some(f64::from(v)),
            Element::Int64(v) => Some(v as f64),
            Element::Float32(v) => Some(f64::from(v)),
            Element::Float64(v) => Some(v),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for bool {
    const EXPECTED: &'static str = "bool";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::True => Some(true),
            Element::False => Some(false),
            Element::Int32(v) => Some(v >= 0),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for Cow<'a, str> {
    const EXPECTED: &'static str = "string";

    fn from_element(element: Element<'a>) -> Option<Self> {
        let s = match element {
            Element::String(bytes) => return Some(String::from_utf8_lossy(bytes)),
            Element::Int32(v) => v.to_string(),
            Element::Int64(v) => v.to_string(),
            Element::Float32(v) => v.to_string(),
            Element::Float64(v) => v.to_string(),
            Element::AsciiChar32(c) => c.to_string(),
            Element::Color32(c) => c.to_string(),
            Element::Midi(m) => m.to_string(),
            Element::TimeTag(t) => t.to_string(),
            Element::True => return Some(Cow::Borrowed("True")),
            Element::False => return Some(Cow::Borrowed("False")),
            Element::Nil => return Some(Cow::Borrowed("Nil")),
            Element::Infinitum => return Some(Cow::Borrowed("Infinitum")),
            Element::Blob(_) | Element::ArrayStart | Element::ArrayEnd => return None,
        };
        Some(Cow::Owned(s))
    }
}

impl<'a> FromElement<'a> for &'a [u8] {
    const EXPECTED: &'static str = "blob";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl<'a> FromElement<'a> for BlobHandle<'a> {
    const EXPECTED: &'static str = "string handle";

    fn from_element(element: Element<'a>) -> Option<Self> {
        match element {
            Element::String(bytes) | Element::Blob(bytes) => Some(BlobHandle::new(bytes)),
            _ => None,
        }
    }
}

macro_rules! from_own_tag {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl<'a> FromElement<'a> for $ty {
            const EXPECTED: &'static str = $name;

            fn from_element(element: Element<'a>) -> Option<Self> {
                match element {
                    Element::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

from_own_tag!(char, AsciiChar32, "char");
from_own_tag!(Color32, Color32, "Color32");
from_own_tag!(MidiMessage, Midi, "MIDI");
from_own_tag!(NtpTimestamp, TimeTag, "timestamp");

/// Fixed-width values that unchecked reads reinterpret straight from the
/// buffer.
pub trait FixedElement: Sized {
    const WIDTH: usize;

    /// Decodes the first `WIDTH` bytes of `bytes` as big-endian.
    ///
    /// # Panics
    /// If `bytes` is shorter than `WIDTH`.
    fn from_be_slice(bytes: &[u8]) -> Self;
}

fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    raw.copy_from_slice(&bytes[..N]);
    raw
}

impl FixedElement for i32 {
    const WIDTH: usize = 4;
    fn from_be_slice(bytes: &[u8]) -> Self {
        i32::from_be_bytes(take(bytes))
    }
}

impl FixedElement for i64 {
    const WIDTH: usize = 8;
    fn from_be_slice(bytes: &[u8]) -> Self {
        i64::from_be_bytes(take(bytes))
    }
}

impl FixedElement for f32 {
    const WIDTH: usize = 4;
    fn from_be_slice(bytes: &[u8]) -> Self {
        f32::from_be_bytes(take(bytes))
    }
}

impl FixedElement for f64 {
    const WIDTH: usize = 8;
    fn from_be_slice(bytes: &[u8]) -> Self {
        f64::from_be_bytes(take(bytes))
    }
}

impl FixedElement for char {
    const WIDTH: usize = 4;
    fn from_be_slice(bytes: &[u8]) -> Self {
        char_from_code(u32::from_be_bytes(take(bytes)))
    }
}

impl FixedElement for Color32 {
    const WIDTH: usize = 4;
    fn from_be_slice(bytes: &[u8]) -> Self {
        Color32::from_be_bytes(take(bytes))
    }
}

impl FixedElement for MidiMessage {
    const WIDTH: usize = 4;
    fn from_be_slice(bytes: &[u8]) -> Self {
        MidiMessage::from_be_bytes(take(bytes))
    }
}

impl FixedElement for NtpTimestamp {
    const WIDTH: usize = 8;
    fn from_be_slice(bytes: &[u8]) -> Self {
        NtpTimestamp::from_be_bytes(take(bytes))
    }
}

fn char_from_code(code: u32) -> char {
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Read-only view over a packet buffer and the element table describing it.
#[derive(Debug, Clone, Copy)]
pub struct MessageValues<'a> {
    buffer: &'a [u8],
    table: &'a ElementTable,
}

impl<'a> MessageValues<'a> {
    /// A view of `table`'s elements within `buffer`.
    pub fn new(buffer: &'a [u8], table: &'a ElementTable) -> Self {
        Self { buffer, table }
    }

    /// Number of recorded elements.
    pub fn element_count(&self) -> usize {
        self.table.len()
    }

    /// Tag of element `index`.
    pub fn tag(&self, index: usize) -> Option<TypeTag> {
        self.table.tag(index)
    }

    /// Tags of all recorded elements, in message order.
    pub fn tags(&self) -> &'a [TypeTag] {
        self.table.tags()
    }

    /// Byte offset of element `index` within the buffer.
    pub fn offset(&self, index: usize) -> Option<usize> {
        self.table.offset(index)
    }

    /// The bytes element reads are bounded by.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    fn checked_tag(&self, index: usize) -> Result<TypeTag> {
        self.table.tag(index).ok_or(OscError::IndexOutOfRange {
            index,
            count: self.table.len(),
        })
    }

    fn fixed<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        offset
            .checked_add(N)
            .and_then(|end| self.buffer.get(offset..end))
            .map(take)
            .ok_or(OscError::Truncated { offset, needed: N })
    }

    fn string_at(&self, offset: usize) -> Result<&'a [u8]> {
        let rest = self
            .buffer
            .get(offset..)
            .ok_or(OscError::Truncated { offset, needed: 1 })?;
        match rest.iter().position(|&b| b == 0) {
            Some(nul) => Ok(&rest[..nul]),
            None => Err(OscError::Truncated {
                offset,
                needed: rest.len() + 1,
            }),
        }
    }

    fn blob_at(&self, offset: usize) -> Result<&'a [u8]> {
        let size = u32::from_be_bytes(self.fixed::<4>(offset)?) as usize;
        let start = offset + 4;
        start
            .checked_add(size)
            .and_then(|end| self.buffer.get(start..end))
            .ok_or(OscError::Truncated {
                offset: start,
                needed: size,
            })
    }

    /// Decodes element `index` according to its tag.
    pub fn element(&self, index: usize) -> Result<Element<'a>> {
        let tag = self.checked_tag(index)?;
        let offset = self.table.offsets[index];

        let element = match tag {
            TypeTag::Int32 => Element::Int32(i32::from_be_bytes(self.fixed(offset)?)),
            TypeTag::Float32 => Element::Float32(f32::from_be_bytes(self.fixed(offset)?)),
            TypeTag::String | TypeTag::AltTypeString => Element::String(self.string_at(offset)?),
            TypeTag::Blob => Element::Blob(self.blob_at(offset)?),
            TypeTag::Int64 => Element::Int64(i64::from_be_bytes(self.fixed(offset)?)),
            TypeTag::Float64 => Element::Float64(f64::from_be_bytes(self.fixed(offset)?)),
            TypeTag::TimeTag => Element::TimeTag(NtpTimestamp::from_be_bytes(self.fixed(offset)?)),
            TypeTag::Midi => Element::Midi(MidiMessage::from_be_bytes(self.fixed(offset)?)),
            TypeTag::Color32 => Element::Color32(Color32::from_be_bytes(self.fixed(offset)?)),
            TypeTag::AsciiChar32 => {
                Element::AsciiChar32(char_from_code(u32::from_be_bytes(self.fixed(offset)?)))
            }
            TypeTag::True => Element::True,
            TypeTag::False => Element::False,
            TypeTag::Nil => Element::Nil,
            TypeTag::Infinitum => Element::Infinitum,
            TypeTag::ArrayStart => Element::ArrayStart,
            TypeTag::ArrayEnd => Element::ArrayEnd,
        };
        Ok(element)
    }

    /// Reads element `index` as `T`, converting across compatible tags.
    pub fn read<T: FromElement<'a>>(&self, index: usize) -> Result<T> {
        let element = self.element(index)?;
        T::from_element(element).ok_or(OscError::TypeMismatch {
            index,
            tag: element.tag(),
            expected: T::EXPECTED,
        })
    }

    /// Reinterprets the bytes of element `index` as `T` without checking its
    /// tag.
    ///
    /// # Panics
    /// If the element's bytes fall outside the buffer.
    pub fn read_unchecked<T: FixedElement>(&self, index: usize) -> T {
        let offset = self.table.offsets[index];
        T::from_be_slice(&self.buffer[offset..offset + T::WIDTH])
    }

    /// Iterates over all elements, decoding each in turn.
    pub fn iter(&self) -> impl Iterator<Item = Result<Element<'a>>> + 'a {
        let values = *self;
        (0..values.element_count()).map(move |i| values.element(i))
    }

    /// Reads an `i32`; floats are truncated, 64-bit tags are rejected.
    pub fn read_int(&self, index: usize) -> Result<i32> {
        self.read(index)
    }

    /// Reads an `i64` from any integer or float element.
    pub fn read_long(&self, index: usize) -> Result<i64> {
        self.read(index)
    }

    /// Reads an `f32`; 64-bit tags are rejected.
    pub fn read_float(&self, index: usize) -> Result<f32> {
        self.read(index)
    }

    /// Reads an `f64` from any integer or float element.
    pub fn read_double(&self, index: usize) -> Result<f64> {
        self.read(index)
    }

    /// Reads True/False, or a non-negative Int32 as true.
    pub fn read_bool(&self, index: usize) -> Result<bool> {
        self.read(index)
    }

    /// Reads a string, or the text form of a numeric, boolean, nil or
    /// infinitum element.
    pub fn read_str(&self, index: usize) -> Result<Cow<'a, str>> {
        self.read(index)
    }

    /// The content bytes of a blob element, without length prefix or padding.
    pub fn read_blob(&self, index: usize) -> Result<&'a [u8]> {
        self.read(index)
    }

    /// A handle over the content of a string element, for allocation-free
    /// comparison against known strings.
    pub fn read_string_handle(&self, index: usize) -> Result<BlobHandle<'a>> {
        self.read(index)
    }

    /// Reads an ASCII char element.
    pub fn read_char(&self, index: usize) -> Result<char> {
        self.read(index)
    }

    /// Reads a color element.
    pub fn read_color32(&self, index: usize) -> Result<Color32> {
        self.read(index)
    }

    /// Reads a MIDI message element.
    pub fn read_midi(&self, index: usize) -> Result<MidiMessage> {
        self.read(index)
    }

    /// Reads a time tag element.
    pub fn read_timestamp(&self, index: usize) -> Result<NtpTimestamp> {
        self.read(index)
    }

    /// True if element `index` is tagged Nil or Infinitum.
    pub fn read_nil_or_infinitum(&self, index: usize) -> Result<bool> {
        let tag = self.checked_tag(index)?;
        Ok(matches!(tag, TypeTag::Nil | TypeTag::Infinitum))
    }

    /// Big-endian `i32` at the element's offset, whatever its tag.
    pub fn read_int_unchecked(&self, index: usize) -> i32 {
        self.read_unchecked(index)
    }

    /// Big-endian `i64` at the element's offset.
    pub fn read_long_unchecked(&self, index: usize) -> i64 {
        self.read_unchecked(index)
    }

    pub fn read_float_unchecked(&self, index: usize) -> f32 {
        self.read_unchecked(index)
    }

    /// Big-endian `f64` at the element's offset.
    pub fn read_double_unchecked(&self, index: usize) -> f64 {
        self.read_unchecked(index)
    }

    pub fn read_char_unchecked(&self, index: usize) -> char {
        self.read_unchecked(index)
    }

    /// Color bytes at the element's offset.
    pub fn read_color32_unchecked(&self, index: usize) -> Color32 {
        self.read_unchecked(index)
    }

    pub fn read_midi_unchecked(&self, index: usize) -> MidiMessage {
        self.read_unchecked(index)
    }

    /// Time tag at the element's offset.
    pub fn read_timestamp_unchecked(&self, index: usize) -> NtpTimestamp {
        self.read_unchecked(index)
    }
}
