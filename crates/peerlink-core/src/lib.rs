// ============================================
// File: crates/peerlink-core/src/lib.rs
// ============================================
//! # Peerlink Core - Cipher Primitives and Wire Protocol
//!
//! ## Creation Reason
//! Implements the protocol-critical pieces shared by the server and the
//! client: the from-scratch cipher primitives and the envelope codec.
//!
//! ## Main Functionality
//! - [`crypto`]: RSA-style public-key cipher, autokey stream cipher,
//!   columnar transposition, combined key with sentinel padding
//! - [`protocol`]: envelope framing, hybrid sealing, directory/login
//!   records
//! - [`error`]: core error taxonomy
//!
//! ## ⚠️ Important Note for Next Developer
//! - The cipher primitives are from-scratch protocol implementations
//!   and NOT cryptographically hardened; the traits in [`crypto`] are
//!   the seam for substituting vetted primitives
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

pub use crypto::combined::{CombinedKey, Pad, PaddingSpec};
pub use crypto::rsa::{import_key, KeyPair, PrivateKey, PublicKey, RsaKey};
pub use crypto::stream::StreamKey;
pub use crypto::transposition::TranspositionKey;
pub use crypto::{AsymmetricCipher, AsymmetricDecipher, SymmetricCipher};
pub use error::{CoreError, Result};
pub use protocol::{open_body, open_envelope, seal_body, seal_envelope, Envelope};
