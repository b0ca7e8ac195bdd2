// ============================================
// File: crates/peerlink-transport/src/lib.rs
// ============================================
//! # Peerlink Transport - Plain TCP Engines
//!
//! ## Creation Reason
//! Provides the protocol-free TCP layer both sides build on: chunked
//! message framing, connection registries, event hubs and the hook
//! seams the secure layer plugs into.
//!
//! ## Main Functionality
//! - [`connection`]: one established stream with short-read framing
//! - [`client`] / [`server`]: the plain engines
//! - [`events`]: the event hub callers wait on
//! - [`traits`]: hook seams for the secure layer
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing in this crate knows about ciphers or envelopes; keep it
//!   that way so the engines stay independently testable
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod server;
pub mod traits;

pub use client::TcpClient;
pub use connection::{Connection, DEFAULT_RECV_BUFFER};
pub use error::{Result, TransportError};
pub use events::{EventHub, ExceptionRecord, TransportEvent};
pub use server::{EngineConfig, TcpServer};
pub use traits::{ClientHooks, NoopClientHooks, NoopServerHooks, ServerHooks};
