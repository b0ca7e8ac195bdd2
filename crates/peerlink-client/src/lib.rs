// ============================================
// File: crates/peerlink-client/src/lib.rs
// ============================================
//! # Peerlink Client - Authenticated Peer
//!
//! ## Creation Reason
//! The connecting side of the system: authenticates against the relay
//! server, learns the other peers' keys from directory broadcasts and
//! exchanges payloads no relay can open.
//!
//! ## Main Functionality
//! - [`client`]: the [`SecureClient`] and its handshake
//! - [`error`]: client error taxonomy
//!
//! ## ⚠️ Important Note for Next Developer
//! - The client's private key never leaves the process; only the
//!   exported PUBLIC key travels in the handshake
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;

pub use client::{HandshakeOutcome, PeerMessage, SecureClient};
pub use error::{ClientError, Result};
