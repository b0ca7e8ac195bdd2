// ============================================
// File: crates/peerlink-core/src/protocol/mod.rs
// ============================================
//! # Wire Protocol
//!
//! ## Creation Reason
//! Groups the wire-level codecs: envelope framing with hybrid payload
//! sealing, and the directory/login record formats.
//!
//! ## Main Functionality
//! - [`envelope`]: `kind SEP1 target SEP2 payload` framing and the
//!   hybrid seal/open operations
//! - [`records`]: directory broadcasts and login records
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol module

pub mod envelope;
pub mod records;

pub use envelope::{open_body, open_envelope, seal_body, seal_envelope, Envelope};
