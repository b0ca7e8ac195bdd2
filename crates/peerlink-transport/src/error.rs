// ============================================
// File: crates/peerlink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to the TCP transport layer: socket
//! setup, connection lifecycle and stream I/O failures.
//!
//! ## Main Functionality
//! - `TransportError`: primary error enum for transport operations
//! - Error conversion from system errors
//! - Categorization of retryable vs fatal errors
//!
//! ## Error Categories
//! 1. **Setup Errors**: bind/listen failures, invalid setup state
//! 2. **Connection Errors**: connect failures, closed peers
//! 3. **I/O Errors**: stream read/write failures with context
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ConnectionClosed` is the normal end of a peer's life, not a bug;
//!   workers translate it into a disconnect event
//! - `Timeout` from `await_event` means "nothing happened", callers
//!   usually loop on it
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use peerlink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
///
/// # Categories
/// - **Setup**: socket creation and bind errors
/// - **Connection**: lifecycle errors on an established peer
/// - **I/O**: stream errors wrapped with context
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Setup Errors
    // ========================================

    /// Socket setup failed before any connection existed.
    #[error("Transport setup failed: {reason}")]
    Setup {
        /// Why setup failed
        reason: String,
    },

    /// Failed to bind the listening socket.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    // ========================================
    // Connection Errors
    // ========================================

    /// Failed to reach the remote peer.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Address we tried to reach
        addr: SocketAddr,
        /// Why the connection failed
        reason: String,
    },

    /// Operation attempted before a connection was established.
    #[error("Socket not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("Connection closed by peer {addr}")]
    ConnectionClosed {
        /// The peer that went away
        addr: SocketAddr,
    },

    /// No registered peer at the given address.
    #[error("Unknown peer {addr}")]
    UnknownPeer {
        /// The address with no registered connection
        addr: SocketAddr,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    /// The transport is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `Setup` error.
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the peer is gone and the connection should be
    /// deregistered.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. } | Self::NotConnected)
    }

    /// Returns `true` if this is a setup-time error.
    #[must_use]
    pub const fn is_setup_error(&self) -> bool {
        matches!(self, Self::Setup { .. } | Self::BindFailed { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
