//! OSC type tag alphabet.

/// Maximum number of elements recorded for a single message.
pub const MAX_ELEMENTS_PER_MESSAGE: usize = 32;

/// Big-endian value of the 8-byte `#bundle` prefix (including its NUL).
pub const BUNDLE_PREFIX: u64 = u64::from_be_bytes(*b"#bundle\0");

// Structural bytes
pub const FORWARD_SLASH: u8 = b'/';
pub const COMMA: u8 = b',';

/// A single OSC type tag. Discriminants are the tag characters on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Int32 = b'i',
    Float32 = b'f',
    String = b's',
    Blob = b'b',
    Int64 = b'h',
    Float64 = b'd',
    TimeTag = b't',
    Midi = b'm',
    Color32 = b'r',
    AsciiChar32 = b'c',
    True = b'T',
    False = b'F',
    Nil = b'N',
    Infinitum = b'I',
    ArrayStart = b'[',
    ArrayEnd = b']',
    AltTypeString = b'S',
}

impl TypeTag {
    /// Maps a tag byte to its `TypeTag`, or `None` for unsupported bytes
    /// (including the NUL that ends a tag string).
    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'i' => Self::Int32,
            b'f' => Self::Float32,
            b's' => Self::String,
            b'b' => Self::Blob,
            b'h' => Self::Int64,
            b'd' => Self::Float64,
            b't' => Self::TimeTag,
            b'm' => Self::Midi,
            b'r' => Self::Color32,
            b'c' => Self::AsciiChar32,
            b'T' => Self::True,
            b'F' => Self::False,
            b'N' => Self::Nil,
            b'I' => Self::Infinitum,
            b'[' => Self::ArrayStart,
            b']' => Self::ArrayEnd,
            b'S' => Self::AltTypeString,
            _ => return None,
        })
    }

    /// True if `b` is a tag character this crate reads.
    pub const fn is_supported(b: u8) -> bool {
        Self::from_byte(b).is_some()
    }

    /// The tag character as a byte.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// The tag character.
    pub const fn as_char(self) -> char {
        self as u8 as char
    }

    /// Payload width in bytes for fixed-size tags; `None` for strings and
    /// blobs, whose size is read from the packet.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int32 | Self::Float32 | Self::Color32 | Self::AsciiChar32 | Self::Midi => {
                Some(4)
            }
            Self::Int64 | Self::Float64 | Self::TimeTag => Some(8),
            Self::String | Self::AltTypeString | Self::Blob => None,
            Self::True
            | Self::False
            | Self::Nil
            | Self::Infinitum
            | Self::ArrayStart
            | Self::ArrayEnd => Some(0),
        }
    }

    /// True for Int32, Float32, Int64 and Float64.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Float32 | Self::Int64 | Self::Float64
        )
    }

    /// The packed tag string for a message carrying exactly this one tag:
    /// `,` + tag + two NUL bytes.
    pub const fn single_tag_string(self) -> [u8; 4] {
        [COMMA, self as u8, 0, 0]
    }
}

/// Packed single-tag strings for the one-argument send fast path.
pub mod single {
    use super::TypeTag;

    pub const INT32: [u8; 4] = TypeTag::Int32.single_tag_string();
    pub const FLOAT32: [u8; 4] = TypeTag::Float32.single_tag_string();
    pub const STRING: [u8; 4] = TypeTag::String.single_tag_string();
    pub const BLOB: [u8; 4] = TypeTag::Blob.single_tag_string();
    pub const INT64: [u8; 4] = TypeTag::Int64.single_tag_string();
    pub const FLOAT64: [u8; 4] = TypeTag::Float64.single_tag_string();
    pub const TIME_TAG: [u8; 4] = TypeTag::TimeTag.single_tag_string();
    pub const MIDI: [u8; 4] = TypeTag::Midi.single_tag_string();
    pub const COLOR32: [u8; 4] = TypeTag::Color32.single_tag_string();
    pub const ASCII_CHAR32: [u8; 4] = TypeTag::AsciiChar32.single_tag_string();
    pub const TRUE: [u8; 4] = TypeTag::True.single_tag_string();
    pub const FALSE: [u8; 4] = TypeTag::False.single_tag_string();
    pub const NIL: [u8; 4] = TypeTag::Nil.single_tag_string();
    pub const INFINITUM: [u8; 4] = TypeTag::Infinitum.single_tag_string();
}
