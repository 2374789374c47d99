//! Flat bundle iteration.
//!
//! A bundle is `#bundle\0`, an 8-byte time tag, then a sequence of elements,
//! each a big-endian i32 size followed by that many bytes of message (or
//! nested bundle).

use std::ops::Range;

use super::parser::is_bundle_tag_at;
use crate::error::{OscError, Result};
use crate::types::NtpTimestamp;

const HEADER_LEN: usize = 16;

/// Reads the bundle header at `start` and returns its time tag and a cursor
/// over the elements that follow, up to `end`.
pub fn read_bundle_header(
    bytes: &[u8],
    start: usize,
    end: usize,
) -> Result<(NtpTimestamp, BundleCursor)> {
    let end = end.min(bytes.len());
    if !is_bundle_tag_at(&bytes[..end], start) {
        return Err(OscError::MalformedBundle("missing #bundle prefix".into()));
    }
    let time = bytes
        .get(start + 8..start + HEADER_LEN)
        .filter(|_| start + HEADER_LEN <= end)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(NtpTimestamp::from_be_bytes)
        .ok_or_else(|| OscError::MalformedBundle("truncated time tag".into()))?;

    Ok((
        time,
        BundleCursor {
            pos: start + HEADER_LEN,
            end,
        },
    ))
}

/// Position within a bundle's element list.
#[derive(Debug, Clone)]
pub struct BundleCursor {
    pos: usize,
    end: usize,
}

impl BundleCursor {
    /// Returns the byte range of the next element's content.
    ///
    /// After an error the cursor is exhausted.
    pub fn next(&mut self, bytes: &[u8]) -> Option<Result<Range<usize>>> {
        if self.pos >= self.end {
            return None;
        }
        let Some(size_bytes) = self
            .pos
            .checked_add(4)
            .filter(|&e| e <= self.end)
            .and_then(|e| bytes.get(self.pos..e))
        else {
            return Some(Err(self.fail("truncated element size")));
        };

        let size = i32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]);
        let content_start = self.pos + 4;
        let content_end = match usize::try_from(size)
            .ok()
            .and_then(|s| content_start.checked_add(s))
        {
            Some(e) if e <= self.end => e,
            _ => return Some(Err(self.fail("element size exceeds bundle"))),
        };

        self.pos = content_end;
        Some(Ok(content_start..content_end))
    }

    fn fail(&mut self, reason: &str) -> OscError {
        self.pos = self.end;
        OscError::MalformedBundle(reason.into())
    }
}
