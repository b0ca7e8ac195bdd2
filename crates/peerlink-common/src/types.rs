// ============================================
// File: crates/peerlink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Usernames travel on the wire inside directory broadcasts and login
//! records, so they need validation against the reserved separator
//! sequences before any protocol layer touches them.
//!
//! ## Main Functionality
//! - `Username`: validated, displayable peer identifier
//! - Reserved wire sequences shared by validation and the codecs
//!
//! ## ⚠️ Important Note for Next Developer
//! - A username containing a reserved sequence would corrupt the
//!   directory broadcast framing; validation here is the only guard
//! - Keep `RESERVED_SEQUENCES` in sync with the codec constants in
//!   peerlink-core (they re-export from here)
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// Reserved Wire Sequences
// ============================================

/// Separates username and password in a login record.
pub const LOGIN_SEPARATOR: &[u8] = b"%|%";

/// Separates a username from its key bytes in a directory record.
pub const DIRECTORY_KEY_SEPARATOR: &[u8] = b"user-key";

/// Terminates one directory record and introduces the next.
pub const DIRECTORY_RECORD_SEPARATOR: &[u8] = b"!!next!!";

/// Sequences a username must never contain.
pub const RESERVED_SEQUENCES: &[&[u8]] = &[
    LOGIN_SEPARATOR,
    DIRECTORY_KEY_SEPARATOR,
    DIRECTORY_RECORD_SEPARATOR,
];

/// Maximum accepted username length in bytes.
pub const MAX_USERNAME_LEN: usize = 128;

// ============================================
// Username
// ============================================

/// Validated peer identifier.
///
/// # Validation
/// Non-empty, at most [`MAX_USERNAME_LEN`] bytes, no control characters,
/// and free of every reserved wire sequence.
///
/// # Example
/// ```
/// use peerlink_common::Username;
///
/// let user = Username::new("alice").unwrap();
/// assert_eq!(user.as_str(), "alice");
/// assert!(Username::new("a%|%b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Creates a validated username.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidInput` if the name is empty, too
    /// long, contains control characters, or contains a reserved wire
    /// sequence.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() {
            return Err(CommonError::invalid_input("username", "cannot be empty"));
        }
        if name.len() > MAX_USERNAME_LEN {
            return Err(CommonError::invalid_length(MAX_USERNAME_LEN, name.len()));
        }
        if name.chars().any(char::is_control) {
            return Err(CommonError::invalid_input(
                "username",
                "control characters are not allowed",
            ));
        }
        for seq in RESERVED_SEQUENCES {
            if contains_sequence(name.as_bytes(), seq) {
                return Err(CommonError::invalid_input(
                    "username",
                    format!("contains reserved sequence {:?}", String::from_utf8_lossy(seq)),
                ));
            }
        }

        Ok(Self(name))
    }

    /// Parses a username from raw wire bytes.
    ///
    /// # Errors
    /// Returns an error if the bytes are not valid UTF-8 or fail
    /// [`Username::new`] validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let name = std::str::from_utf8(bytes)
            .map_err(|_| CommonError::invalid_input("username", "not valid UTF-8"))?;
        Self::new(name)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the username as wire bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Substring search over raw bytes.
fn contains_sequence(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_username() {
        let user = Username::new("alice").unwrap();
        assert_eq!(user.as_str(), "alice");
        assert_eq!(user.to_string(), "alice");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(Username::new("").is_err());
    }

    #[test]
    fn test_too_long_rejected() {
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(Username::new(long).is_err());
    }

    #[test]
    fn test_reserved_sequences_rejected() {
        assert!(Username::new("a%|%b").is_err());
        assert!(Username::new("me-user-key").is_err());
        assert!(Username::new("next!!next!!").is_err());
    }

    #[test]
    fn test_control_chars_rejected() {
        assert!(Username::new("ali\nce").is_err());
        assert!(Username::new("ali\0ce").is_err());
    }

    #[test]
    fn test_from_bytes() {
        let user = Username::from_bytes(b"bob").unwrap();
        assert_eq!(user.as_bytes(), b"bob");
        assert!(Username::from_bytes(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let user = Username::new("carol").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        let back: Username = serde_json::from_str(&json).unwrap();
        assert_eq!(user, back);
    }
}
