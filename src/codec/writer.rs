//! OSC encoding: typed values → aligned big-endian bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::tag::{COMMA, TypeTag};
use super::values::{Element, MessageValues};
use super::{align4, padded_string_len};
use crate::blob::{BlobHandle, BlobString, StringEncoding};
use crate::error::Result;
use crate::types::{Color32, MidiMessage, NtpTimestamp, Vector2, Vector3};

const DEFAULT_CAPACITY: usize = 4096;
const PADDING: [u8; 4] = [0; 4];

/// Reusable buffer that serializes one OSC packet at a time.
///
/// `reset` rewinds the buffer but keeps its allocation, so a writer owned
/// by a sender stops allocating once it has grown to its largest packet.
#[derive(Debug, Clone)]
pub struct OscWriter {
    buf: BytesMut,
    encoding: StringEncoding,
}

impl OscWriter {
    /// Creates a writer with a 4096-byte buffer and ASCII strings.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a writer whose buffer starts with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            encoding: StringEncoding::default(),
        }
    }

    /// Creates a writer that encodes strings with `encoding`.
    pub fn with_encoding(encoding: StringEncoding) -> Self {
        Self {
            encoding,
            ..Self::new()
        }
    }

    /// Encoding used by [`write_str`](Self::write_str).
    pub fn encoding(&self) -> StringEncoding {
        self.encoding
    }

    /// Discards the written bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes written since the last reset.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes the buffer can hold before it reallocates.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The packet written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Moves the written packet out as shared bytes and leaves the writer
    /// empty. Spare capacity stays with the writer.
    pub fn take_packet(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Writes a big-endian 32-bit integer.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    /// Writes a big-endian IEEE 754 single.
    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    /// Writes a big-endian 64-bit integer.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Writes a big-endian IEEE 754 double.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// Writes a character as a 4-byte big-endian code. Characters outside
    /// ASCII are written as `?`.
    pub fn write_char(&mut self, value: char) {
        let c = if value.is_ascii() { value } else { '?' };
        self.buf.put_u32(u32::from(c));
    }

    /// Writes a color as r, g, b, a.
    pub fn write_color32(&mut self, value: Color32) {
        self.buf.put_slice(&value.to_be_bytes());
    }

    /// Writes port id, status, data1, data2.
    pub fn write_midi(&mut self, value: MidiMessage) {
        self.buf.put_slice(&value.to_be_bytes());
    }

    /// Writes an 8-byte NTP time tag.
    pub fn write_timestamp(&mut self, value: NtpTimestamp) {
        self.buf.put_u64(value.to_bits());
    }

    /// Writes `x` and `y` as two floats.
    pub fn write_vec2(&mut self, value: Vector2) {
        self.buf.put_f32(value.x);
        self.buf.put_f32(value.y);
    }

    /// Writes `x`, `y` and `z` as three floats.
    pub fn write_vec3(&mut self, value: Vector3) {
        self.buf.put_f32(value.x);
        self.buf.put_f32(value.y);
        self.buf.put_f32(value.z);
    }

    /// Writes a string in the writer's encoding, NUL-terminated and padded to
    /// 4 bytes.
    pub fn write_str(&mut self, value: &str) {
        let len = self.encoding.encoded_len(value);
        self.encoding.encode_into(value, &mut self.buf);
        self.put_string_padding(len);
    }

    /// Writes already-encoded string bytes with the same terminator and
    /// padding as [`write_str`](Self::write_str).
    pub fn write_blob_string(&mut self, value: &BlobString) {
        self.write_handle(value.handle());
    }

    /// Writes borrowed string bytes, terminated and padded.
    pub fn write_handle(&mut self, value: BlobHandle<'_>) {
        self.buf.put_slice(value.as_bytes());
        self.put_string_padding(value.len());
    }

    /// Writes a blob: big-endian length, content, then zero padding to 4
    /// bytes.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.buf.put_i32(value.len() as i32);
        self.buf.put_slice(value);
        self.buf.put_slice(&PADDING[..align4(value.len()) - value.len()]);
    }

    /// Starts a new message with `address` and a packed single-tag string
    /// such as [`single::FLOAT32`](super::tag::single::FLOAT32).
    pub fn write_address_and_tags(&mut self, address: &str, tags: [u8; 4]) {
        self.reset();
        self.write_str(address);
        self.buf.put_slice(&tags);
    }

    /// Writes a `,`-prefixed type-tag string for `tags`.
    pub fn write_tags(&mut self, tags: &[TypeTag]) {
        self.buf.put_u8(COMMA);
        for tag in tags {
            self.buf.put_u8(tag.as_byte());
        }
        self.put_string_padding(tags.len() + 1);
    }

    /// Re-serializes a parsed message: `address`, every recorded tag, then
    /// one value per element.
    ///
    /// Fails if an element cannot be decoded from its packet. The writer then
    /// holds a partial message.
    pub fn write_message(
        &mut self,
        address: BlobHandle<'_>,
        values: &MessageValues<'_>,
    ) -> Result<()> {
        self.reset();
        self.write_handle(address);
        self.write_tags(values.tags());
        for element in values.iter() {
            match element? {
                Element::Int32(v) => self.write_i32(v),
                Element::Float32(v) => self.write_f32(v),
                Element::String(v) => self.write_handle(BlobHandle::new(v)),
                Element::Blob(v) => self.write_blob(v),
                Element::Int64(v) => self.write_i64(v),
                Element::Float64(v) => self.write_f64(v),
                Element::TimeTag(v) => self.write_timestamp(v),
                Element::Midi(v) => self.write_midi(v),
                Element::Color32(v) => self.write_color32(v),
                Element::AsciiChar32(v) => self.write_char(v),
                Element::True
                | Element::False
                | Element::Nil
                | Element::Infinitum
                | Element::ArrayStart
                | Element::ArrayEnd => {}
            }
        }
        Ok(())
    }

    /// Starts a new bundle: the `#bundle` prefix and its time tag.
    pub fn write_bundle_header(&mut self, time: NtpTimestamp) {
        self.reset();
        self.buf.put_slice(b"#bundle\0");
        self.write_timestamp(time);
    }

    /// Reserves the size field of a bundle element. Write the element, then
    /// pass the returned mark to [`end_bundle_element`](Self::end_bundle_element).
    pub fn begin_bundle_element(&mut self) -> usize {
        let mark = self.buf.len();
        self.buf.put_i32(0);
        mark
    }

    /// Fills in the size of the element started at `mark`.
    pub fn end_bundle_element(&mut self, mark: usize) {
        let size = (self.buf.len() - mark - 4) as i32;
        self.buf[mark..mark + 4].copy_from_slice(&size.to_be_bytes());
    }

    fn put_string_padding(&mut self, content_len: usize) {
        self.buf
            .put_slice(&PADDING[..padded_string_len(content_len) - content_len]);
    }
}

impl Default for OscWriter {
    fn default() -> Self {
        Self::new()
    }
}
