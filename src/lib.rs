//! oscwire: Open Sound Control 1.0 over UDP.
//!
//! Received packets are parsed in place: the parser records where each
//! element starts and typed reads go straight to the packet bytes, so the
//! receive path does not allocate. Sending goes through a reusable
//! [`OscWriter`](codec::OscWriter).
//!
//! # Architecture
//!
//! - **`codec`**: Type tags, the message parser, typed value access, the writer and bundles
//! - **`blob`**: Byte views and owned strings with content equality, for address lookup
//! - **`types`**: Color, MIDI, NTP time tag and vector values
//! - **`server`**: UDP receive loop and monitor callbacks
//! - **`client`**: UDP sender with one method per element type, and a forwarder (feature-gated)

pub mod blob;
pub mod codec;
pub mod error;
pub mod server;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

pub use blob::{BlobHandle, BlobString, StringEncoding};
pub use codec::{MessageValues, OscWriter, Parser, TypeTag};
pub use error::{OscError, Result};
pub use server::{MonitorCallback, OscServer};

#[cfg(feature = "client")]
pub use client::{OscClient, OscForwarder};
