// ============================================
// File: crates/peerlink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! The cipher primitives and codecs fail in ways the caller must tell
//! apart: malformed key material, integer views exceeding the modulus,
//! broken padding structure, invalid transposition keys, and framing
//! violations each get their own variant.
//!
//! ## Design Philosophy
//! - Cipher construction errors are raised synchronously to the caller
//! - Never include key material or plaintext in messages
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use peerlink_common::error::CommonError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types for cipher and codec operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key material could not be parsed or recognized.
    #[error("Key import failed: {reason}")]
    KeyImport {
        /// What was wrong with the material
        reason: String,
    },

    /// Key generation produced inconsistent components.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Which consistency check failed
        reason: String,
    },

    /// The integer view of the data exceeds the modulus.
    #[error("Value out of range: {context} does not fit the modulus")]
    ValueOutOfRange {
        /// Whether plaintext or ciphertext overflowed
        context: &'static str,
    },

    /// Padding structure violated on construction or removal.
    #[error("Padding error: {reason}")]
    Padding {
        /// What part of the structure was violated
        reason: String,
    },

    /// The pad sentinel did not appear exactly twice.
    #[error("Unpad failed: sentinel split produced {parts} parts, expected 3")]
    Unpad {
        /// How many parts the sentinel split produced
        parts: usize,
    },

    /// A transposition key contains the same byte value twice.
    #[error("Transposition key has repeating byte value {value}")]
    RepeatingKeyByte {
        /// The repeated byte value
        value: u8,
    },

    /// A transposition key without a descent would not scramble anything.
    #[error("Transposition key has no descent and therefore no effect")]
    NoEffectKey,

    /// Cipher output was byte-for-byte identical to its input.
    #[error("Cipher output equals input, data was not transformed")]
    NotTransformed,

    /// Envelope framing violated (missing separator, truncated field).
    #[error("Envelope error: {reason}")]
    Envelope {
        /// What part of the frame was malformed
        reason: String,
    },

    /// Directory or login record framing violated.
    #[error("Record error: {reason}")]
    Record {
        /// What part of the record was malformed
        reason: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates a `KeyImport` error.
    pub fn key_import(reason: impl Into<String>) -> Self {
        Self::KeyImport {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyDerivation` error.
    pub fn key_derivation(reason: impl Into<String>) -> Self {
        Self::KeyDerivation {
            reason: reason.into(),
        }
    }

    /// Creates a `Padding` error.
    pub fn padding(reason: impl Into<String>) -> Self {
        Self::Padding {
            reason: reason.into(),
        }
    }

    /// Creates an `Envelope` error.
    pub fn envelope(reason: impl Into<String>) -> Self {
        Self::Envelope {
            reason: reason.into(),
        }
    }

    /// Creates a `Record` error.
    pub fn record(reason: impl Into<String>) -> Self {
        Self::Record {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error concerns key material.
    #[must_use]
    pub const fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::KeyImport { .. }
                | Self::KeyDerivation { .. }
                | Self::RepeatingKeyByte { .. }
                | Self::NoEffectKey
        )
    }

    /// Returns `true` if the error arose while (de)ciphering data.
    #[must_use]
    pub const fn is_cipher_error(&self) -> bool {
        matches!(
            self,
            Self::ValueOutOfRange { .. }
                | Self::Padding { .. }
                | Self::Unpad { .. }
                | Self::NotTransformed
        )
    }

    /// Returns `true` if the error arose while framing or parsing.
    #[must_use]
    pub const fn is_codec_error(&self) -> bool {
        matches!(self, Self::Envelope { .. } | Self::Record { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::key_import("missing armor header");
        assert!(err.to_string().contains("armor header"));

        let err = CoreError::Unpad { parts: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::NoEffectKey.is_key_error());
        assert!(CoreError::NotTransformed.is_cipher_error());
        assert!(CoreError::envelope("missing separator").is_codec_error());
        assert!(!CoreError::NotTransformed.is_key_error());
    }
}
