// ============================================
// File: crates/peerlink-core/src/crypto/mod.rs
// ============================================
//! # Cipher Primitives
//!
//! ## Creation Reason
//! Central module for the from-scratch cipher primitives: an RSA-style
//! public-key cipher and a polyalphabetic symmetric cipher with columnar
//! transposition and randomized padding.
//!
//! ## Main Functionality
//! - [`rsa`]: keypair generation, encrypt/decrypt, text export/import
//! - [`stream`]: byte-wise keystream cipher (repeating and autokey modes)
//! - [`transposition`]: keyed columnar transposition
//! - [`combined`]: composed symmetric key plus sentinel padding
//! - Uniform cipher traits so vetted primitives can substitute without
//!   touching the handshake or envelope layers
//!
//! ## ⚠️ Important Note for Next Developer
//! - These primitives are NOT cryptographically hardened. They implement
//!   the protocol faithfully and nothing more; do not reuse them outside
//!   this crate's protocol
//! - The traits below are the substitution seam for real primitives
//!
//! ## Last Modified
//! v0.1.0 - Initial cipher primitives

pub mod combined;
pub mod primes;
pub mod rsa;
pub mod stream;
pub mod transposition;

use crate::error::Result;

// ============================================
// Cipher Traits
// ============================================

/// Public-key encryption seam.
pub trait AsymmetricCipher {
    /// Encrypts `plaintext`, optionally with randomized padding.
    ///
    /// # Errors
    /// Fails if the (padded) plaintext does not fit the key.
    fn encrypt(&self, plaintext: &[u8], padded: bool) -> Result<Vec<u8>>;
}

/// Private-key decryption seam.
pub trait AsymmetricDecipher {
    /// Decrypts `ciphertext`, removing padding when `padded` is set.
    ///
    /// # Errors
    /// Fails if the ciphertext does not fit the key or the padding
    /// structure is violated.
    fn decrypt(&self, ciphertext: &[u8], padded: bool) -> Result<Vec<u8>>;
}

/// Symmetric cipher seam.
pub trait SymmetricCipher {
    /// Encrypts `plaintext`.
    ///
    /// # Errors
    /// Fails if the cipher could not transform the input.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext`.
    ///
    /// # Errors
    /// Fails if the ciphertext structure is violated.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
