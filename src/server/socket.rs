//! UDP receive loop: one task per socket feeding datagrams to a handler.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::codec::Parser;
use crate::codec::parser::DEFAULT_CAPACITY;
use crate::error::{OscError, Result, io_err_is_timeout};
use crate::server::dispatch::PacketHandler;

const BIND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Receive-side settings for an [`OscSocket`].
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Packet buffer size; datagrams longer than this are truncated.
    pub buffer_capacity: usize,
    /// Upper bound on a single receive wait. `None` waits indefinitely.
    pub recv_timeout: Option<Duration>,
    /// Extra bind attempts, 500 ms apart, before `start` gives up.
    pub bind_retries: u32,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            recv_timeout: None,
            bind_retries: 5,
        }
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
    local_addr: SocketAddr,
}

/// A UDP socket whose datagrams are parsed and handled on a dedicated task.
///
/// Each datagram is fully handled before the next receive, so handlers never
/// run concurrently for one socket.
///
/// [`stop`](Self::stop) is the only teardown that waits for the task. Dropping
/// a running socket signals shutdown and aborts the task without joining it,
/// so a handler call already in progress may still be running after the drop
/// returns.
pub struct OscSocket<H: PacketHandler> {
    addr: SocketAddr,
    config: SocketConfig,
    handler: Arc<H>,
    running: Option<Running>,
}

impl<H: PacketHandler> OscSocket<H> {
    /// A stopped socket that will bind `addr` on [`start`](Self::start).
    pub fn new(addr: SocketAddr, config: SocketConfig, handler: Arc<H>) -> Self {
        Self {
            addr,
            config,
            handler,
            running: None,
        }
    }

    /// The handler datagrams are passed to.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Address the socket is bound to while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// True while the receive task is alive.
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Binds the socket and spawns the receive task. Does nothing if already
    /// running.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        if let Some(dead) = self.running.take() {
            // the previous loop ended on its own; surface why before restarting
            if let Ok(Err(e)) = dead.task.await {
                tracing::warn!(addr = %dead.local_addr, error = %e, "restarting failed OSC socket");
            }
        }

        let socket = bind_with_retry(self.addr, self.config.bind_retries).await?;
        let local_addr = socket.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let parser = Parser::with_capacity(self.config.buffer_capacity);

        let task = tokio::spawn(receive_loop(
            socket,
            parser,
            self.handler.clone(),
            shutdown_rx,
            self.config.recv_timeout,
        ));
        tracing::info!(addr = %local_addr, "OSC socket listening");

        self.running = Some(Running {
            shutdown,
            task,
            local_addr,
        });
        Ok(())
    }

    /// Signals the receive task to exit and waits for it. Does nothing if
    /// not running.
    ///
    /// Returns the error that ended the loop, if it ended on its own.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.shutdown.send(true);
        let result = running
            .task
            .await
            .unwrap_or_else(|e| Err(OscError::Io(io::Error::other(e))));
        tracing::info!(addr = %running.local_addr, "OSC socket stopped");
        result
    }
}

// Drop cannot await, so the task is aborted rather than joined. Callers that
// need the handler finished must call `stop` first.
impl<H: PacketHandler> Drop for OscSocket<H> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(true);
            running.task.abort();
        }
    }
}

async fn bind_with_retry(addr: SocketAddr, retries: u32) -> Result<UdpSocket> {
    let mut attempt = 0;
    loop {
        match UdpSocket::bind(addr).await {
            Ok(socket) => return Ok(socket),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(%addr, attempt, error = %e, "OSC bind failed, retrying");
                tokio::time::sleep(BIND_RETRY_DELAY).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Receives into `buf`, returning `None` if `limit` elapses first.
async fn recv(
    socket: &UdpSocket,
    buf: &mut [u8],
    limit: Option<Duration>,
) -> io::Result<Option<(usize, SocketAddr)>> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, socket.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        },
        None => socket.recv_from(buf).await.map(Some),
    }
}

async fn receive_loop<H: PacketHandler>(
    socket: UdpSocket,
    mut parser: Parser,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
    recv_timeout: Option<Duration>,
) -> Result<()> {
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            result = recv(&socket, parser.buffer_mut(), recv_timeout) => result,
        };

        match received {
            Ok(Some((0, _))) | Ok(None) => continue,
            Ok(Some((byte_count, peer))) => {
                tracing::trace!(%peer, byte_count, "OSC datagram");
                handler.parse_buffer(&mut parser, byte_count);
            }
            Err(e) if io_err_is_timeout(e.kind()) => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                ) =>
            {
                tracing::warn!(error = %e, "OSC receive error, continuing");
            }
            Err(e) => {
                if *shutdown.borrow() {
                    break;
                }
                tracing::error!(error = %e, "OSC receive loop failed");
                return Err(e.into());
            }
        }
    }
    tracing::debug!("OSC receive loop exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<(String, usize)>);

    impl PacketHandler for Forward {
        fn parse_buffer(&self, parser: &mut Parser, byte_count: usize) {
            let text = String::from_utf8_lossy(&parser.buffer()[..byte_count]).into_owned();
            let _ = self.0.send((text, byte_count));
        }
    }

    fn socket(
        config: SocketConfig,
    ) -> (OscSocket<Forward>, mpsc::UnboundedReceiver<(String, usize)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        (OscSocket::new(addr, config, Arc::new(Forward(tx))), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<(String, usize)>) -> Option<(String, usize)> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    async fn sender() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (mut socket, _rx) = socket(SocketConfig::default());
        assert!(!socket.is_running());
        assert!(socket.local_addr().is_none());
        socket.stop().await.unwrap();

        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(socket.is_running());
        socket.start().await.unwrap();
        assert_eq!(socket.local_addr(), Some(addr));

        socket.stop().await.unwrap();
        assert!(!socket.is_running());
        socket.stop().await.unwrap();
    }

    #[tokio::test]
    async fn handles_datagrams_in_order() {
        let (mut socket, mut rx) = socket(SocketConfig::default());
        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();

        let tx = sender().await;
        tx.send_to(b"first", addr).await.unwrap();
        tx.send_to(b"second", addr).await.unwrap();

        assert_eq!(next(&mut rx).await, Some(("first".to_string(), 5)));
        assert_eq!(next(&mut rx).await, Some(("second".to_string(), 6)));
        socket.stop().await.unwrap();
    }

    #[tokio::test]
    async fn ignores_empty_datagrams() {
        let (mut socket, mut rx) = socket(SocketConfig::default());
        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();

        let tx = sender().await;
        tx.send_to(&[], addr).await.unwrap();
        tx.send_to(b"after", addr).await.unwrap();

        assert_eq!(next(&mut rx).await, Some(("after".to_string(), 5)));
        socket.stop().await.unwrap();
    }

    #[tokio::test]
    async fn receive_timeouts_keep_the_loop_alive() {
        let config = SocketConfig {
            recv_timeout: Some(Duration::from_millis(10)),
            ..SocketConfig::default()
        };
        let (mut socket, mut rx) = socket(config);
        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(socket.is_running());

        sender().await.send_to(b"late", addr).await.unwrap();
        assert_eq!(next(&mut rx).await, Some(("late".to_string(), 4)));
        socket.stop().await.unwrap();
    }

    #[tokio::test]
    async fn nothing_is_handled_after_stop() {
        let (mut socket, mut rx) = socket(SocketConfig::default());
        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();
        socket.stop().await.unwrap();

        let _ = sender().await.send_to(b"dropped", addr).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn restarts_after_stop() {
        let (mut socket, mut rx) = socket(SocketConfig::default());
        socket.start().await.unwrap();
        socket.stop().await.unwrap();
        socket.start().await.unwrap();

        let addr = socket.local_addr().unwrap();
        sender().await.send_to(b"again", addr).await.unwrap();
        assert_eq!(next(&mut rx).await, Some(("again".to_string(), 5)));
        socket.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_fails_after_retries() {
        let taken = sender().await;
        let addr = taken.local_addr().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = SocketConfig {
            bind_retries: 0,
            ..SocketConfig::default()
        };
        let mut socket = OscSocket::new(addr, config, Arc::new(Forward(tx)));
        assert!(matches!(socket.start().await, Err(OscError::Io(_))));
        assert!(!socket.is_running());
    }

    struct Slow {
        started: Arc<AtomicBool>,
        done: Arc<AtomicBool>,
    }

    impl PacketHandler for Slow {
        fn parse_buffer(&self, _parser: &mut Parser, _byte_count: usize) {
            self.started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
            self.done.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_waits_for_running_handler() {
        let started = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let handler = Slow {
            started: started.clone(),
            done: done.clone(),
        };
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let mut socket = OscSocket::new(addr, SocketConfig::default(), Arc::new(handler));
        socket.start().await.unwrap();

        sender()
            .await
            .send_to(b"slow", socket.local_addr().unwrap())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !started.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        socket.stop().await.unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn drop_stops_the_task() {
        let (mut socket, mut rx) = socket(SocketConfig::default());
        socket.start().await.unwrap();
        let addr = socket.local_addr().unwrap();
        drop(socket);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = sender().await.send_to(b"gone", addr).await;
        // the handler (and its sender) went away with the task
        assert_eq!(next(&mut rx).await, None);
    }
}
