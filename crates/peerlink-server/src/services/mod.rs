// ============================================
// File: crates/peerlink-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Groups the stateful services the secure server composes: credential
//! verification, the live session directory and the handshake that
//! feeds it.
//!
//! ## Last Modified
//! v0.1.0 - Initial services module

pub mod credentials;
pub mod directory;
pub mod handshake;

pub use credentials::CredentialStore;
pub use directory::{Directory, Session};
pub use handshake::{authenticate, broadcast_directory, HandshakeContext};
