// ============================================
// File: crates/peerlink-core/src/crypto/stream.rs
// ============================================
//! # Byte Keystream Cipher
//!
//! ## Creation Reason
//! The symmetric half of the envelope scheme starts from a byte-wise
//! polyalphabetic cipher: each plaintext byte is shifted by a key byte
//! modulo 256.
//!
//! ## Main Functionality
//! - Repeating mode: `cipher[i] = (plain[i] + key[i mod len]) mod 256`
//! - Autokey mode: the key queue is drained and refilled with consumed
//!   plaintext, so the effective keystream never simply repeats
//!
//! ## ⚠️ Important Note for Next Developer
//! - Autokey decryption must push the *recovered plaintext* back onto
//!   the queue, mirroring what encryption consumed
//! - Key bytes are zeroized on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial keystream cipher

use std::collections::VecDeque;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// Byte keystream key with repeating and autokey modes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct StreamKey {
    key: Vec<u8>,
}

impl StreamKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    /// `KeyImport` if the key is empty.
    pub fn new(key: Vec<u8>) -> Result<Self> {
        if key.is_empty() {
            return Err(CoreError::key_import("stream key cannot be empty"));
        }
        Ok(Self { key })
    }

    /// Generates a random key of `len` bytes from the OS source.
    #[must_use]
    pub fn generate(len: usize) -> Self {
        let mut key = vec![0u8; len.max(1)];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Repeating-key encryption.
    #[must_use]
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(&p, &k)| p.wrapping_add(k))
            .collect()
    }

    /// Repeating-key decryption.
    #[must_use]
    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(&c, &k)| c.wrapping_sub(k))
            .collect()
    }

    /// Autokey encryption: each consumed plaintext byte is pushed onto
    /// the key queue, so the keystream is self-synchronizing.
    #[must_use]
    pub fn encrypt_autokey(&self, data: &[u8]) -> Vec<u8> {
        let mut queue: VecDeque<u8> = self.key.iter().copied().collect();
        let mut out = Vec::with_capacity(data.len());
        for &plain in data {
            let k = queue.pop_front().unwrap_or(0);
            out.push(plain.wrapping_add(k));
            queue.push_back(plain);
        }
        out
    }

    /// Autokey decryption: mirrors encryption by feeding the recovered
    /// plaintext back onto the queue.
    #[must_use]
    pub fn decrypt_autokey(&self, data: &[u8]) -> Vec<u8> {
        let mut queue: VecDeque<u8> = self.key.iter().copied().collect();
        let mut out = Vec::with_capacity(data.len());
        for &cipher in data {
            let k = queue.pop_front().unwrap_or(0);
            let plain = cipher.wrapping_sub(k);
            out.push(plain);
            queue.push_back(plain);
        }
        out
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamKey")
            .field("len", &self.key.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
