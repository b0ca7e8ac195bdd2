// ============================================
// File: crates/peerlink-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Defines error types for the secure server: configuration loading,
//! credential storage, handshake and relay failures.
//!
//! ## Main Functionality
//! - `ServerError`: primary error enum for server operations
//! - Transparent wrapping of lower-layer errors
//! - Classification of authentication vs relay vs internal failures
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed login is expected traffic, not an error: the handshake
//!   answers it with a rejection envelope and returns `Ok(None)`
//! - `UnknownRecipient` is captured as an exception rather than
//!   propagated, so one bad target never kills a worker
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use peerlink_common::error::CommonError;
use peerlink_core::error::CoreError;
use peerlink_transport::error::TransportError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

// ============================================
// ServerError
// ============================================

/// Secure server error types.
///
/// # Categories
/// - **Config**: loading and validating the server configuration
/// - **Auth**: credential storage and login verification
/// - **Relay**: envelope routing between peers
/// - **Wrapped**: lower layers passed through transparently
#[derive(Error, Debug)]
pub enum ServerError {
    // ========================================
    // Configuration Errors
    // ========================================

    /// A configuration field failed validation.
    #[error("Invalid configuration: {field} - {reason}")]
    Config {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration at {path}: {reason}")]
    ConfigParse {
        /// File we tried to parse
        path: PathBuf,
        /// Parser diagnostics
        reason: String,
    },

    // ========================================
    // Authentication Errors
    // ========================================

    /// The credential store could not be read or written.
    #[error("Credential store failure: {reason}")]
    CredentialStore {
        /// What went wrong
        reason: String,
    },

    /// The handshake broke down before authentication completed.
    #[error("Handshake failed: {reason}")]
    Handshake {
        /// Where it broke down
        reason: String,
    },

    // ========================================
    // Relay Errors
    // ========================================

    /// An envelope named a recipient with no live session.
    #[error("No session for recipient '{user}'")]
    UnknownRecipient {
        /// The target username
        user: String,
    },

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

impl ServerError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `Config` error.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `CredentialStore` error.
    pub fn credential_store(reason: impl Into<String>) -> Self {
        Self::CredentialStore {
            reason: reason.into(),
        }
    }

    /// Creates a `Handshake` error.
    pub fn handshake(reason: impl Into<String>) -> Self {
        Self::Handshake {
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

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the peer caused this error and the server
    /// itself is healthy.
    #[must_use]
    pub fn is_peer_error(&self) -> bool {
        match self {
            Self::Handshake { .. } | Self::UnknownRecipient { .. } => true,
            Self::Core(err) => err.is_codec_error() || err.is_cipher_error(),
            Self::Common(err) => err.is_client_error(),
            _ => false,
        }
    }

    /// Returns `true` for configuration or storage problems that need
    /// operator attention.
    #[must_use]
    pub const fn is_operator_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::ConfigParse { .. } | Self::CredentialStore { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
