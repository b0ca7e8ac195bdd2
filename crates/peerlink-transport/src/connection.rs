// ============================================
// File: crates/peerlink-transport/src/connection.rs
// ============================================
//! # TCP Connection
//!
//! ## Creation Reason
//! Wraps one established TCP stream with the framing both sides rely
//! on: a message ends when a read fills less than the receive buffer.
//!
//! ## Main Functionality
//! - `Connection`: split stream halves behind async mutexes
//! - `send`: writes the whole message
//! - `receive`: accumulates buffer-sized chunks until a short read
//!
//! ## Main Logical Flow
//! 1. Read `recv_buffer` bytes at a time into the message
//! 2. A read shorter than the buffer terminates the message
//! 3. A zero-length read with nothing accumulated means the peer closed
//!
//! ## ⚠️ Important Note for Next Developer
//! - A message whose length is an exact multiple of `recv_buffer` is
//!   terminated by the NEXT read (zero-length or short); senders keep
//!   messages off that boundary by padding
//! - Reader and writer halves are locked separately so a send never
//!   waits on an in-flight receive
//!
//! ## Last Modified
//! v0.1.0 - Initial connection wrapper

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::{Result, TransportError};

/// Default receive buffer size in bytes.
pub const DEFAULT_RECV_BUFFER: usize = 2048;

// ============================================
// Connection
// ============================================

/// One established TCP connection.
///
/// # Thread Safety
/// Safe to share behind an `Arc`; concurrent sends serialize on the
/// writer half, concurrent receives on the reader half.
#[derive(Debug)]
pub struct Connection {
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    recv_buffer: usize,
    closed: AtomicBool,
}

impl Connection {
    /// Wraps an established stream.
    ///
    /// # Errors
    /// `Setup` if the peer address cannot be read off the socket.
    pub fn new(stream: TcpStream, recv_buffer: usize) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map_err(|e| TransportError::setup(format!("peer address unavailable: {e}")))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            recv_buffer: recv_buffer.max(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Remote peer address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Receive buffer size used for message framing.
    #[must_use]
    pub const fn recv_buffer(&self) -> usize {
        self.recv_buffer
    }

    /// Returns `true` once either side has closed the connection.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the connection closed without touching the socket.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    // ========================================
    // I/O
    // ========================================

    /// Sends one whole message.
    ///
    /// # Errors
    /// `ConnectionClosed` if the connection is already closed, `Io` on
    /// stream failures.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed { addr: self.peer });
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(data).await.map_err(|e| {
            self.mark_closed();
            TransportError::io(format!("send to {}", self.peer), e)
        })?;
        writer
            .flush()
            .await
            .map_err(|e| TransportError::io(format!("flush to {}", self.peer), e))
    }

    /// Receives one whole message.
    ///
    /// Chunks of `recv_buffer` bytes are accumulated until a read comes
    /// back short, which terminates the message.
    ///
    /// # Errors
    /// `ConnectionClosed` if the peer went away, `Io` on stream
    /// failures.
    pub async fn receive(&self) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed { addr: self.peer });
        }

        let mut reader = self.reader.lock().await;
        let mut message = Vec::new();
        let mut chunk = vec![0u8; self.recv_buffer];

        loop {
            let n = reader.read(&mut chunk).await.map_err(|e| {
                self.mark_closed();
                TransportError::io(format!("receive from {}", self.peer), e)
            })?;

            if n == 0 {
                if message.is_empty() {
                    self.mark_closed();
                    return Err(TransportError::ConnectionClosed { addr: self.peer });
                }
                return Ok(message);
            }

            message.extend_from_slice(&chunk[..n]);
            if n < self.recv_buffer {
                return Ok(message);
            }
        }
    }

    /// Shuts the write half down, signalling EOF to the peer.
    ///
    /// # Errors
    /// `Io` if the shutdown itself fails.
    pub async fn shutdown(&self) -> Result<()> {
        self.mark_closed();
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| TransportError::io(format!("shutdown of {}", self.peer), e))
    }
}

// ============================================
// Tests
// ============================================
