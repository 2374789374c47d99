//! Zero-copy byte views and owned encoded strings.

mod handle;
mod string;

pub use handle::BlobHandle;
pub use string::{BlobString, StringEncoding};
