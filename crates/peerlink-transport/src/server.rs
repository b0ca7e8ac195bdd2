// ============================================
// File: crates/peerlink-transport/src/server.rs
// ============================================
//! # TCP Server Engine
//!
//! ## Creation Reason
//! The plain accepting side: owns the listener, a worker task per
//! connection, the connection registry and an orderly shutdown path.
//!
//! ## Main Functionality
//! - `TcpServer`: bind, accept loop, per-connection workers
//! - `start`/`stop` toggle the accept loop; the listening socket
//!   survives a stop and a later `start` resumes on it
//! - `send_to`/`disconnect` addressed at registered peers
//! - Connection limit that pauses accepting until a slot frees
//!
//! ## Main Logical Flow
//! 1. Accept loop admits a connection and spawns its handler task
//! 2. The handler runs `ServerHooks::on_connect` to completion; only on
//!    `Ok(true)` is the peer registered and its read loop started
//! 3. The read loop feeds `on_receive` and the event hub until the peer
//!    goes away, then deregisters exactly once
//!
//! ## ⚠️ Important Note for Next Developer
//! - Deregistration is guarded by the registry `remove`; whichever of
//!   worker and `disconnect` removes the entry first runs the
//!   disconnect hook, the other does nothing
//! - `shutdown` joins every task with a bounded timeout and aborts
//!   stragglers; it must never hang on a stuck peer
//!
//! ## Last Modified
//! v0.1.0 - Initial server engine

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::{Connection, DEFAULT_RECV_BUFFER};
use crate::error::{Result, TransportError};
use crate::events::{EventHub, ExceptionRecord, TransportEvent};
use crate::traits::ServerHooks;

/// How long `shutdown` waits for each task to finish.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// EngineConfig
// ============================================

/// Tunables for the TCP server engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Receive buffer size used for message framing.
    pub recv_buffer: usize,
    /// Maximum registered connections; `None` means unlimited.
    pub max_connections: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recv_buffer: DEFAULT_RECV_BUFFER,
            max_connections: None,
        }
    }
}

// ============================================
// TcpServer
// ============================================

/// Plain TCP server with chunked message framing, a connection
/// registry and pluggable per-connection hooks.
pub struct TcpServer {
    local_addr: SocketAddr,
    config: EngineConfig,
    hooks: Arc<dyn ServerHooks>,
    listener: tokio::sync::Mutex<Option<TcpListener>>,
    registry: Arc<DashMap<SocketAddr, Arc<Connection>>>,
    workers: Arc<DashMap<SocketAddr, JoinHandle<()>>>,
    events: EventHub<(SocketAddr, Vec<u8>)>,
    shutdown_tx: broadcast::Sender<()>,
    accepting: Arc<AtomicBool>,
    slot_freed: Arc<Notify>,
    stop_accept: Notify,
    accept_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TcpServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    /// `BindFailed` if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        config: EngineConfig,
        hooks: Arc<dyn ServerHooks>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::setup(format!("local address unavailable: {e}")))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(%local_addr, "listener bound");
        Ok(Arc::new(Self {
            local_addr,
            config,
            hooks,
            listener: tokio::sync::Mutex::new(Some(listener)),
            registry: Arc::new(DashMap::new()),
            workers: Arc::new(DashMap::new()),
            events: EventHub::new(),
            shutdown_tx,
            accepting: Arc::new(AtomicBool::new(false)),
            slot_freed: Arc::new(Notify::new()),
            stop_accept: Notify::new(),
            accept_task: tokio::sync::Mutex::new(None),
        }))
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The shared event hub.
    #[must_use]
    pub fn events(&self) -> &EventHub<(SocketAddr, Vec<u8>)> {
        &self.events
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Addresses of every registered connection.
    #[must_use]
    pub fn connected_peers(&self) -> Vec<SocketAddr> {
        self.registry.iter().map(|entry| *entry.key()).collect()
    }

    /// Looks up a registered connection.
    #[must_use]
    pub fn connection(&self, addr: SocketAddr) -> Option<Arc<Connection>> {
        self.registry.get(&addr).map(|entry| Arc::clone(&entry))
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Starts (or resumes) the accept loop.
    ///
    /// # Errors
    /// `Setup` if the loop is already running or the listener was lost
    /// to an aborted accept task.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.accept_task.lock().await;
        if slot.is_some() {
            return Err(TransportError::setup("accept loop already running"));
        }
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::setup("listener already consumed"))?;

        self.accepting.store(true, Ordering::Release);
        let server = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            server.accept_loop(listener).await;
        }));
        Ok(())
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            if !self.accepting.load(Ordering::Acquire) {
                break;
            }

            if let Some(limit) = self.config.max_connections {
                if self.registry.len() >= limit {
                    debug!(limit, "connection limit reached, pausing accept");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        () = self.stop_accept.notified() => continue,
                        () = self.slot_freed.notified() => {}
                    }
                    continue;
                }
            }

            let accepted = tokio::select! {
                _ = shutdown_rx.recv() => break,
                // The accepting flag at the loop top decides whether
                // this was a stop or a stale wakeup.
                () = self.stop_accept.notified() => continue,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "connection accepted");
                    self.spawn_handler(stream, addr);
                }
                Err(err) => {
                    self.events.push_exception(ExceptionRecord::new(
                        "accept loop",
                        TransportError::io("accept", err),
                    ));
                }
            }
        }
        // Hand the socket back so a later `start` resumes on it.
        *self.listener.lock().await = Some(listener);
        debug!("accept loop stopped");
    }

    /// Pauses the accept loop without dropping the listening socket.
    ///
    /// Established connections keep running; a later [`TcpServer::start`]
    /// resumes accepting on the same socket.
    ///
    /// # Errors
    /// `Setup` if the loop is not running.
    pub async fn stop(&self) -> Result<()> {
        let task = self.accept_task.lock().await.take();
        let Some(mut task) = task else {
            return Err(TransportError::setup("accept loop not running"));
        };

        self.accepting.store(false, Ordering::Release);
        self.stop_accept.notify_one();
        if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            warn!("accept loop did not stop in time");
            task.abort();
        }
        debug!("accept loop paused");
        Ok(())
    }

    fn spawn_handler(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let server = Arc::clone(self);
        let handle = tokio::spawn(async move {
            server.handle_connection(stream, addr).await;
            server.workers.remove(&addr);
        });
        self.workers.insert(addr, handle);
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let conn = match Connection::new(stream, self.config.recv_buffer) {
            Ok(conn) => Arc::new(conn),
            Err(err) => {
                self.events
                    .push_exception(ExceptionRecord::new("connection setup", err));
                return;
            }
        };

        // The connect hook owns the stream until it returns; a
        // handshake performed here sees no competing reads.
        match self.hooks.on_connect(&conn).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%addr, "connection rejected by hook");
                let _ = conn.shutdown().await;
                return;
            }
            Err(err) => {
                warn!(%addr, error = %err, "connect hook failed");
                self.events
                    .push_exception(ExceptionRecord::new("connect hook", err));
                let _ = conn.shutdown().await;
                return;
            }
        }

        self.registry.insert(addr, Arc::clone(&conn));
        self.events.push_connected();
        debug!(%addr, "connection registered");

        loop {
            let message = match conn.receive().await {
                Ok(message) => message,
                Err(err) if err.is_disconnect() => break,
                Err(err) => {
                    self.events
                        .push_exception(ExceptionRecord::new("server receive loop", err));
                    break;
                }
            };

            match self.hooks.on_receive(&conn, &message).await {
                Ok(true) => self.events.push_received((addr, message)),
                Ok(false) => {}
                Err(err) => {
                    self.events
                        .push_exception(ExceptionRecord::new("receive hook", err));
                }
            }
        }

        self.deregister(addr).await;
    }

    /// Removes a peer from the registry; only the caller that wins the
    /// removal runs the disconnect hook.
    async fn deregister(&self, addr: SocketAddr) {
        if let Some((_, conn)) = self.registry.remove(&addr) {
            conn.mark_closed();
            self.hooks.on_disconnect(&conn).await;
            self.events.push_disconnected();
            self.slot_freed.notify_one();
            debug!(%addr, "connection deregistered");
        }
    }

    /// Stops the accept loop, closes every connection and joins every
    /// task with a bounded timeout.
    pub async fn shutdown(&self) {
        info!("server shutting down");
        self.accepting.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(());

        let accept = self.accept_task.lock().await.take();
        if let Some(task) = accept {
            if tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await.is_err() {
                warn!("accept loop did not stop in time");
            }
        }

        let peers: Vec<Arc<Connection>> = self
            .registry
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for conn in peers {
            let _ = conn.shutdown().await;
        }

        let addrs: Vec<SocketAddr> = self.workers.iter().map(|entry| *entry.key()).collect();
        for addr in addrs {
            if let Some((_, mut handle)) = self.workers.remove(&addr) {
                if tokio::time::timeout(TASK_JOIN_TIMEOUT, &mut handle)
                    .await
                    .is_err()
                {
                    warn!(%addr, "worker did not stop in time");
                    handle.abort();
                }
            }
        }
        info!("server stopped");
    }

    // ========================================
    // Addressed I/O
    // ========================================

    /// Sends one message to a registered peer.
    ///
    /// # Errors
    /// `UnknownPeer` if the address is not registered, `Io` on stream
    /// failures.
    pub async fn send_to(&self, addr: SocketAddr, data: &[u8]) -> Result<()> {
        let conn = self
            .connection(addr)
            .ok_or(TransportError::UnknownPeer { addr })?;
        conn.send(data).await
    }

    /// Closes a registered peer's connection.
    ///
    /// # Errors
    /// `UnknownPeer` if the address is not registered.
    pub async fn disconnect(&self, addr: SocketAddr) -> Result<()> {
        let conn = self
            .connection(addr)
            .ok_or(TransportError::UnknownPeer { addr })?;
        let _ = conn.shutdown().await;
        self.deregister(addr).await;
        Ok(())
    }

    /// Waits for the next event, up to `timeout`.
    pub async fn await_event(&self, timeout: Duration) -> TransportEvent<(SocketAddr, Vec<u8>)> {
        self.events.await_event(timeout).await
    }

    /// Drains captured background exceptions.
    pub fn drain_exceptions(&self) -> Vec<ExceptionRecord> {
        self.events.drain_exceptions()
    }
}

// ============================================
// Tests
// ============================================
