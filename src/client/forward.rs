//! Re-sends received messages to another destination.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::udp::connect_socket;
use crate::blob::BlobHandle;
use crate::codec::{MessageValues, OscWriter};
use crate::error::{OscError, Result};
use crate::server::MonitorCallback;

/// Forwards messages to one destination through a send queue.
///
/// [`forward`](Self::forward) serializes the message straight away, since
/// the values borrow a packet buffer the receive loop is about to reuse.
/// Sending happens on a separate task in queue order. Once the last handle
/// is dropped, the task sends what is queued and exits.
pub struct OscForwarder {
    writer: Mutex<OscWriter>,
    queue: mpsc::UnboundedSender<Bytes>,
    task: JoinHandle<()>,
    destination: SocketAddr,
}

impl OscForwarder {
    /// Binds an ephemeral local socket, connects it to `destination` and
    /// starts the send task. Broadcast is enabled for `255.255.255.255`.
    pub async fn connect(destination: SocketAddr) -> Result<Self> {
        let socket = connect_socket(destination).await?;
        let (queue, pending) = mpsc::unbounded_channel();
        let task = tokio::spawn(send_loop(socket, pending));
        tracing::debug!(%destination, "OSC forwarder connected");

        Ok(Self {
            writer: Mutex::new(OscWriter::new()),
            queue,
            task,
            destination,
        })
    }

    /// Where messages are forwarded to.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// True while the send task is alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Serializes a message and queues it for sending.
    ///
    /// Fails if an element cannot be decoded, or with
    /// [`OscError::Closed`] if the send task is gone.
    pub fn forward(&self, address: BlobHandle<'_>, values: &MessageValues<'_>) -> Result<()> {
        let packet = {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.write_message(address, values)?;
            writer.take_packet()
        };
        self.queue.send(packet).map_err(|_| OscError::Closed)
    }

    /// A monitor callback forwarding every message it sees.
    pub fn callback(self: &Arc<Self>) -> MonitorCallback {
        let forwarder = Arc::clone(self);
        Arc::new(move |address: BlobHandle<'_>, values: &MessageValues<'_>| {
            if let Err(e) = forwarder.forward(address, values) {
                tracing::debug!(error = %e, "OSC message not forwarded");
            }
        })
    }
}

impl std::fmt::Debug for OscForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscForwarder")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

async fn send_loop(socket: UdpSocket, mut pending: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(packet) = pending.recv().await {
        // a refused send only means nobody is listening yet
        if let Err(e) = socket.send(&packet).await {
            tracing::warn!(error = %e, "OSC forward failed");
        }
    }
    tracing::debug!("OSC forwarder exiting");
}
