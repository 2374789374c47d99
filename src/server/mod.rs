//! OSC server: UDP receive loop and message dispatch.

pub mod builder;
pub mod dispatch;
pub mod socket;

pub use builder::{OscServer, OscServerBuilder};
pub use dispatch::{Dispatcher, MonitorCallback, PacketHandler};
pub use socket::{OscSocket, SocketConfig};
