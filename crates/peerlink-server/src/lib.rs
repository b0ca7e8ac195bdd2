// ============================================
// File: crates/peerlink-server/src/lib.rs
// ============================================
//! # Peerlink Server - Authenticated Relay
//!
//! ## Creation Reason
//! The accepting side of the system: authenticates peers against a
//! credential store, tracks their public keys in a directory and
//! relays sealed envelopes between them without ever opening a
//! forwarded payload.
//!
//! ## Main Functionality
//! - [`server`]: the [`SecureServer`] composition
//! - [`services`]: credentials, directory, handshake
//! - [`config`]: TOML-backed deployment tunables
//!
//! ## ⚠️ Important Note for Next Developer
//! - The server holds the only copy of its private key; it is generated
//!   at bind time and never leaves the process
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod server;
pub mod services;

pub use config::{ServerConfig, MIN_KEY_BITS};
pub use error::{Result, ServerError};
pub use server::{InboundMessage, SecureServer};
pub use services::{CredentialStore, Directory, Session};
