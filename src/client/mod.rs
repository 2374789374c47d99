//! OSC client: sends typed messages to a UDP destination, and forwards
//! received messages to another one.
//!
//! Feature-gated behind `client`.

mod forward;
mod udp;

pub use forward::OscForwarder;
pub use udp::OscClient;
