//! OSC server builder and lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::server::dispatch::{Dispatcher, MonitorCallback};
use crate::server::socket::{OscSocket, SocketConfig};

/// Builder for configuring an [`OscServer`].
#[derive(Debug, Clone)]
pub struct OscServerBuilder {
    addr: SocketAddr,
    config: SocketConfig,
}

impl OscServerBuilder {
    /// Sets the packet buffer size. Values below 256 use the default of 4096.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Bounds each receive wait. Expiry is not an error.
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.config.recv_timeout = Some(timeout);
        self
    }

    /// Sets how many times a failed bind is retried.
    pub fn bind_retries(mut self, retries: u32) -> Self {
        self.config.bind_retries = retries;
        self
    }

    /// Creates the server. Nothing is bound until `start`.
    pub fn build(self) -> OscServer {
        let dispatcher = Arc::new(Dispatcher::new());
        OscServer {
            socket: OscSocket::new(self.addr, self.config, dispatcher.clone()),
            dispatcher,
        }
    }
}

/// An OSC server: a UDP socket whose messages go to monitor callbacks.
pub struct OscServer {
    socket: OscSocket<Dispatcher>,
    dispatcher: Arc<Dispatcher>,
}

impl OscServer {
    /// Creates a server builder listening on `addr`.
    pub fn builder(addr: SocketAddr) -> OscServerBuilder {
        OscServerBuilder {
            addr,
            config: SocketConfig::default(),
        }
    }

    /// A server on `port` of all IPv4 interfaces, with default settings.
    pub fn new(port: u16) -> Self {
        Self::builder(SocketAddr::from(([0, 0, 0, 0], port))).build()
    }

    /// Binds the socket and starts receiving.
    pub async fn start(&mut self) -> Result<()> {
        self.socket.start().await
    }

    /// Stops receiving and waits for the receive task.
    pub async fn stop(&mut self) -> Result<()> {
        self.socket.stop().await
    }

    /// Starts the server, runs until `signal` resolves, then stops it.
    pub async fn run_until(&mut self, signal: impl Future<Output = ()>) -> Result<()> {
        self.start().await?;
        signal.await;
        tracing::info!("OSC server shutting down");
        self.stop().await
    }

    /// True while the receive task is alive.
    pub fn is_running(&self) -> bool {
        self.socket.is_running()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr()
    }

    /// The dispatcher holding this server's callbacks.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Registers a callback invoked for every received message.
    pub fn add_callback(&self, callback: MonitorCallback) {
        self.dispatcher.add_callback(callback);
    }

    /// Removes one registration of `callback`. See [`Dispatcher::remove_callback`].
    pub fn remove_callback(&self, callback: &MonitorCallback) -> bool {
        self.dispatcher.remove_callback(callback)
    }
}
