// ============================================
// File: crates/peerlink-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Creation Reason
//! Defines error types for the secure client: handshake breakdowns,
//! missing peers and lower layers passed through.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A rejected login is NOT an error; `connect` reports it as a
//!   [`HandshakeOutcome`](crate::client::HandshakeOutcome) so callers
//!   can prompt for credentials again
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use peerlink_common::error::CommonError;
use peerlink_core::error::CoreError;
use peerlink_transport::error::TransportError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================
// ClientError
// ============================================

/// Secure client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The handshake broke down before authentication completed.
    #[error("Handshake failed: {reason}")]
    Handshake {
        /// Where it broke down
        reason: String,
    },

    /// Operation needs an authenticated connection.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The directory lists no such peer.
    #[error("No key known for peer '{user}'")]
    UnknownPeer {
        /// The peer we have no key for
        user: String,
    },

    /// Cipher or codec error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Transport layer error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ClientError {
    /// Creates a `Handshake` error.
    pub fn handshake(reason: impl Into<String>) -> Self {
        Self::Handshake {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the server is gone and a reconnect may help.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_disconnect())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::UnknownPeer {
            user: "carol".into(),
        };
        assert!(err.to_string().contains("carol"));
    }

    #[test]
    fn test_disconnect_classification() {
        let err: ClientError = TransportError::NotConnected.into();
        assert!(err.is_disconnect());
        assert!(!ClientError::NotAuthenticated.is_disconnect());
    }
}
