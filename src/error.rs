//! Error types for OSC parsing, value access and transport.

use crate::codec::TypeTag;

/// Errors that can occur during OSC operations.
#[derive(Debug, thiserror::Error)]
pub enum OscError {
    #[error("malformed address: must start with '/' and be NUL-terminated")]
    MalformedAddress,

    #[error("element index {index} out of range ({count} elements)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("element {index} is tagged {tag:?}, cannot read as {expected}")]
    TypeMismatch {
        index: usize,
        tag: TypeTag,
        expected: &'static str,
    },

    #[error("need {needed} bytes at offset {offset}, packet is truncated")]
    Truncated { offset: usize, needed: usize },

    #[error("malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("socket closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OscError>;

impl OscError {
    /// Returns true for receive errors that the socket loop treats as
    /// timeouts and silently retries.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(e) if io_err_is_timeout(e.kind()))
    }
}

pub(crate) fn io_err_is_timeout(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classification() {
        let timeout = OscError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(timeout.is_timeout());

        let refused = OscError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(!refused.is_timeout());
        assert!(!OscError::MalformedAddress.is_timeout());
    }

    #[test]
    fn mismatch_message_names_tag() {
        let e = OscError::TypeMismatch {
            index: 2,
            tag: TypeTag::Blob,
            expected: "i32",
        };
        assert_eq!(e.to_string(), "element 2 is tagged Blob, cannot read as i32");
    }
}
