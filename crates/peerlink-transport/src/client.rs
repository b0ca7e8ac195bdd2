// ============================================
// File: crates/peerlink-transport/src/client.rs
// ============================================
//! # TCP Client Engine
//!
//! ## Creation Reason
//! The plain connecting side: dials the server, sends and receives
//! framed messages, and optionally runs a background receive task that
//! feeds the event hub.
//!
//! ## Main Functionality
//! - `TcpClient`: connect/disconnect/reconnect lifecycle
//! - Blocking `receive` for handshake-style call-and-response
//! - `start_auto_receive`/`stop_auto_receive` toggle event-driven
//!   operation; stopping returns the stream to blocking reads
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never run `receive` while the auto-receive task is active; both
//!   would race for the reader half. Drive the handshake with direct
//!   receives FIRST, then start the task.
//! - Stopping cancels a read in flight; toggle between messages or
//!   accept losing a partially received frame
//! - `disconnect` joins the task with a bounded timeout and aborts it
//!   if the join overruns
//!
//! ## Last Modified
//! v0.1.0 - Initial client engine

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::connection::{Connection, DEFAULT_RECV_BUFFER};
use crate::error::{Result, TransportError};
use crate::events::{EventHub, ExceptionRecord, TransportEvent};
use crate::traits::ClientHooks;

/// How long `disconnect` waits for the receive task to finish.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// TcpClient
// ============================================

/// Plain TCP client with chunked message framing and an event hub.
pub struct TcpClient {
    recv_buffer: usize,
    remote: Mutex<Option<SocketAddr>>,
    conn: Mutex<Option<Arc<Connection>>>,
    events: EventHub<Vec<u8>>,
    recv_task: tokio::sync::Mutex<Option<(JoinHandle<()>, Arc<Notify>)>>,
}

impl TcpClient {
    /// Creates a client with the default receive buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_recv_buffer(DEFAULT_RECV_BUFFER)
    }

    /// Creates a client with an explicit receive buffer size.
    #[must_use]
    pub fn with_recv_buffer(recv_buffer: usize) -> Self {
        Self {
            recv_buffer: recv_buffer.max(1),
            remote: Mutex::new(None),
            conn: Mutex::new(None),
            events: EventHub::new(),
            recv_task: tokio::sync::Mutex::new(None),
        }
    }

    /// The shared event hub.
    #[must_use]
    pub fn events(&self) -> &EventHub<Vec<u8>> {
        &self.events
    }

    /// Address of the current or most recent connection.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote.lock()
    }

    /// Returns `true` while a live connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .as_ref()
            .is_some_and(|conn| !conn.is_closed())
    }

    fn current(&self) -> Result<Arc<Connection>> {
        self.conn
            .lock()
            .as_ref()
            .cloned()
            .ok_or(TransportError::NotConnected)
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Dials the server.
    ///
    /// # Errors
    /// `ConnectFailed` if the dial fails, `Setup` if already connected.
    pub async fn connect(&self, addr: SocketAddr) -> Result<Arc<Connection>> {
        if self.is_connected() {
            return Err(TransportError::setup("already connected"));
        }

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::connect_failed(addr, e.to_string()))?;
        let conn = Arc::new(Connection::new(stream, self.recv_buffer)?);

        *self.remote.lock() = Some(addr);
        *self.conn.lock() = Some(Arc::clone(&conn));
        self.events.push_connected();
        debug!(%addr, "connected");
        Ok(conn)
    }

    /// Dials the address of the previous connection again.
    ///
    /// # Errors
    /// `NotConnected` if there never was a connection.
    pub async fn reconnect(&self) -> Result<Arc<Connection>> {
        let addr = self.remote_addr().ok_or(TransportError::NotConnected)?;
        self.disconnect().await?;
        self.connect(addr).await
    }

    /// Closes the connection and joins the receive task.
    ///
    /// Idempotent; disconnecting while not connected is a no-op.
    ///
    /// # Errors
    /// `Io` if the socket shutdown fails.
    pub async fn disconnect(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            // Best effort; the peer may already be gone.
            let _ = conn.shutdown().await;
        }
        self.stop_auto_receive().await;
        Ok(())
    }

    // ========================================
    // I/O
    // ========================================

    /// Sends one message.
    ///
    /// # Errors
    /// `NotConnected` without a connection, `Io` on stream failures.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.current()?.send(data).await
    }

    /// Receives one message directly off the stream.
    ///
    /// Only valid while the auto-receive task is NOT running.
    ///
    /// # Errors
    /// `NotConnected` without a connection, `ConnectionClosed` when the
    /// server goes away.
    pub async fn receive(&self) -> Result<Vec<u8>> {
        self.current()?.receive().await
    }

    /// Waits for the next event, up to `timeout`.
    pub async fn await_event(&self, timeout: Duration) -> TransportEvent<Vec<u8>> {
        self.events.await_event(timeout).await
    }

    /// Drains captured background exceptions.
    pub fn drain_exceptions(&self) -> Vec<ExceptionRecord> {
        self.events.drain_exceptions()
    }

    // ========================================
    // Auto-Receive
    // ========================================

    /// Starts the background receive task feeding the event hub.
    ///
    /// # Errors
    /// `NotConnected` without a connection, `Setup` if a task is
    /// already running.
    pub async fn start_auto_receive(&self, hooks: Arc<dyn ClientHooks>) -> Result<()> {
        let conn = self.current()?;
        let mut slot = self.recv_task.lock().await;
        if slot.is_some() {
            return Err(TransportError::setup("auto-receive already running"));
        }

        let events = self.events.clone();
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let handle = tokio::spawn(async move {
            receive_loop(conn, hooks, events, stop_signal).await;
        });
        *slot = Some((handle, stop));
        Ok(())
    }

    /// Stops the background receive task, returning the stream to
    /// blocking [`TcpClient::receive`] use.
    ///
    /// A no-op when no task is running. The connection stays open.
    pub async fn stop_auto_receive(&self) {
        let task = self.recv_task.lock().await.take();
        if let Some((mut task, stop)) = task {
            stop.notify_one();
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                warn!("receive task did not stop in time");
                task.abort();
            }
        }
    }
}

impl Default for TcpClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn receive_loop(
    conn: Arc<Connection>,
    hooks: Arc<dyn ClientHooks>,
    events: EventHub<Vec<u8>>,
    stop: Arc<Notify>,
) {
    loop {
        let received = tokio::select! {
            () = stop.notified() => {
                debug!("auto-receive stopped");
                return;
            }
            received = conn.receive() => received,
        };
        let message = match received {
            Ok(message) => message,
            Err(err) if err.is_disconnect() => {
                debug!(peer = %conn.peer(), "server closed the connection");
                hooks.on_disconnect().await;
                events.push_disconnected();
                break;
            }
            Err(err) => {
                events.push_exception(ExceptionRecord::new("client receive loop", err));
                hooks.on_disconnect().await;
                events.push_disconnected();
                break;
            }
        };

        match hooks.on_receive(&message).await {
            Ok(true) => events.push_received(message),
            Ok(false) => {}
            Err(err) => {
                events.push_exception(ExceptionRecord::new("client receive hook", err));
            }
        }
    }
    conn.mark_closed();
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoopClientHooks;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_send_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let conn = Connection::new(stream, DEFAULT_RECV_BUFFER).unwrap();
            let message = conn.receive().await.unwrap();
            conn.send(&message).await.unwrap();
        });

        let client = TcpClient::new();
        client.connect(addr).await.unwrap();
        client.send(b"Does this work?").await.unwrap();
        assert_eq!(client.receive().await.unwrap(), b"Does this work?");

        client.disconnect().await.unwrap();
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_without_connection() {
        let client = TcpClient::new();
        assert!(matches!(
            client.send(b"data").await.unwrap_err(),
            TransportError::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_auto_receive_feeds_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"pushed from server").await.unwrap();
            stream.flush().await.unwrap();
            // Hold the socket open until the client saw the message.
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let client = TcpClient::new();
        client.connect(addr).await.unwrap();
        assert!(matches!(
            client.await_event(Duration::from_millis(50)).await,
            TransportEvent::Connected
        ));

        client
            .start_auto_receive(Arc::new(NoopClientHooks))
            .await
            .unwrap();

        match client.await_event(Duration::from_secs(2)).await {
            TransportEvent::Received(items) => {
                assert_eq!(items, vec![b"pushed from server".to_vec()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        client.disconnect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_auto_receive_returns_to_blocking_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let conn = Connection::new(stream, DEFAULT_RECV_BUFFER).unwrap();
            conn.send(b"pushed while automatic").await.unwrap();
            // The go-ahead keeps the second message out of the task's
            // reads.
            assert_eq!(conn.receive().await.unwrap(), b"go");
            conn.send(b"read directly").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let client = TcpClient::new();
        client.connect(addr).await.unwrap();
        client
            .start_auto_receive(Arc::new(NoopClientHooks))
            .await
            .unwrap();

        loop {
            match client.await_event(Duration::from_secs(2)).await {
                TransportEvent::Received(items) => {
                    assert_eq!(items, vec![b"pushed while automatic".to_vec()]);
                    break;
                }
                TransportEvent::Connected => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }

        client.stop_auto_receive().await;
        client.send(b"go").await.unwrap();
        assert_eq!(client.receive().await.unwrap(), b"read directly");

        // A stopped task frees the slot for a fresh start.
        client
            .start_auto_receive(Arc::new(NoopClientHooks))
            .await
            .unwrap();

        client.disconnect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_event_on_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let client = TcpClient::new();
        client.connect(addr).await.unwrap();
        client
            .start_auto_receive(Arc::new(NoopClientHooks))
            .await
            .unwrap();
        server.await.unwrap();

        // The first event is Connected from the dial.
        assert!(matches!(
            client.await_event(Duration::from_secs(2)).await,
            TransportEvent::Connected
        ));
        assert!(matches!(
            client.await_event(Duration::from_secs(2)).await,
            TransportEvent::Disconnected
        ));
    }
}
