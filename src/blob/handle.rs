//! Borrowed byte-range view with content equality and hashing.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::BlobString;

/// A non-owning view over a run of bytes, usable as a lookup key.
///
/// Two handles are equal when they cover the same bytes, regardless of
/// where those bytes live. Handles taken from a socket's receive buffer
/// borrow that buffer and cannot outlive the callback that received them.
#[derive(Clone, Copy)]
pub struct BlobHandle<'a> {
    bytes: &'a [u8],
}

impl<'a> BlobHandle<'a> {
    /// A handle over all of `bytes`.
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// A handle over `length` bytes of `bytes` starting at `offset`.
    ///
    /// Returns `None` if the range does not fit.
    pub fn from_range(bytes: &'a [u8], offset: usize, length: usize) -> Option<Self> {
        let end = offset.checked_add(length)?;
        bytes.get(offset..end).map(Self::new)
    }

    /// The viewed bytes.
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of viewed bytes.
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The cheap content hash: the length mixed with the last byte.
    pub fn hash_code(&self) -> i32 {
        let last = self.bytes.last().copied().unwrap_or(0);
        (self.bytes.len() as i32).wrapping_mul(397) ^ i32::from(last)
    }

    /// Copies the viewed bytes into an owned `BlobString`.
    pub fn to_blob_string(&self) -> BlobString {
        BlobString::from_bytes(self.bytes)
    }
}

impl PartialEq for BlobHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.len() == other.bytes.len() && self.bytes == other.bytes
    }
}

impl Eq for BlobHandle<'_> {}

impl Hash for BlobHandle<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.bytes.len());
        if let Some(&last) = self.bytes.last() {
            state.write_u8(last);
        }
    }
}

impl PartialEq<[u8]> for BlobHandle<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl PartialEq<&str> for BlobHandle<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<BlobString> for BlobHandle<'_> {
    fn eq(&self, other: &BlobString) -> bool {
        *self == other.handle()
    }
}

impl<'a> From<&'a [u8]> for BlobHandle<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for BlobHandle<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl fmt::Debug for BlobHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobHandle({} bytes @ {:p})", self.bytes.len(), self.bytes.as_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(h: BlobHandle<'_>) -> u64 {
        let mut hasher = DefaultHasher::new();
        h.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_content_in_distinct_storage() {
        let a = b"/layers/1/opacity".to_vec();
        let b = b"/layers/1/opacity".to_vec();
        assert_ne!(a.as_ptr(), b.as_ptr());

        let ha = BlobHandle::new(&a);
        let hb = BlobHandle::new(&b);
        assert_eq!(ha, hb);
        assert_eq!(hash_of(ha), hash_of(hb));
        assert_eq!(ha.hash_code(), hb.hash_code());
    }

    #[test]
    fn hash_collision_is_resolved_by_equality() {
        // same length and same last byte
        let ha = BlobHandle::new(b"/abc");
        let hb = BlobHandle::new(b"/xyc");
        assert_eq!(hash_of(ha), hash_of(hb));
        assert_ne!(ha, hb);
    }

    #[test]
    fn length_mismatch() {
        assert_ne!(BlobHandle::new(b"/a"), BlobHandle::new(b"/a/"));
    }

    #[test]
    fn range_views() {
        let packet = b"xx/pingyy";
        let h = BlobHandle::from_range(packet, 2, 5).unwrap();
        assert_eq!(h, "/ping");
        assert!(BlobHandle::from_range(packet, 6, 10).is_none());
        assert!(BlobHandle::from_range(packet, usize::MAX, 2).is_none());
    }

    #[test]
    fn empty_handle() {
        let h = BlobHandle::new(&[]);
        assert!(h.is_empty());
        assert_eq!(h.hash_code(), 0);
        assert_eq!(h, BlobHandle::new(b""));
    }

    #[test]
    fn works_as_map_key() {
        use std::collections::HashMap;

        let mut counts: HashMap<BlobHandle<'_>, usize> = HashMap::new();
        let first = b"/tempo".to_vec();
        let second = b"/tempo".to_vec();
        *counts.entry(BlobHandle::new(&first)).or_default() += 1;
        *counts.entry(BlobHandle::new(&second)).or_default() += 1;
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&BlobHandle::new(b"/tempo")], 2);
    }
}
