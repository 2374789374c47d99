//! OSC binary encoding: message parsing, typed value access and writing.
//!
//! OSC uses big-endian byte ordering and pads every field to a 4-byte
//! boundary.

pub mod bundle;
pub mod parser;
pub mod tag;
pub mod values;
pub mod writer;

pub use bundle::{BundleCursor, read_bundle_header};
pub use parser::{AddressType, Parser};
pub use tag::{MAX_ELEMENTS_PER_MESSAGE, TypeTag};
pub use values::{Element, ElementTable, FixedElement, FromElement, MessageValues};
pub use writer::OscWriter;

/// Rounds `n` up to the next multiple of 4.
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Size of a string field holding `n` content bytes: the content, at least
/// one NUL terminator, and padding to 4 bytes.
pub const fn padded_string_len(n: usize) -> usize {
    (n + 4) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(5), 8);
    }

    #[test]
    fn string_padding_always_terminates() {
        assert_eq!(padded_string_len(0), 4);
        assert_eq!(padded_string_len(3), 4);
        assert_eq!(padded_string_len(4), 8);
        assert_eq!(padded_string_len(18), 20);
    }
}
