// ============================================
// File: crates/peerlink-core/src/protocol/records.rs
// ============================================
//! # Directory and Login Records
//!
//! ## Creation Reason
//! The handshake carries two record formats beside the envelope frame:
//! the login credential pair and the directory broadcast listing every
//! authenticated peer with its exported public key.
//!
//! ## Main Functionality
//! - Login: `username %|% password`
//! - Directory: `username user-key key-bytes !!next!!` per peer,
//!   concatenated
//!
//! ## Last Modified
//! v0.1.0 - Initial record codecs

use peerlink_common::types::{
    Username, DIRECTORY_KEY_SEPARATOR, DIRECTORY_RECORD_SEPARATOR, LOGIN_SEPARATOR,
};

use crate::crypto::combined::find_sequence;
use crate::error::{CoreError, Result};

// ============================================
// Login Records
// ============================================

/// Encodes a credential pair for the login step.
#[must_use]
pub fn encode_login(user: &Username, password: &str) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(user.as_bytes().len() + LOGIN_SEPARATOR.len() + password.len());
    out.extend_from_slice(user.as_bytes());
    out.extend_from_slice(LOGIN_SEPARATOR);
    out.extend_from_slice(password.as_bytes());
    out
}

/// Decodes a login record into username and password.
///
/// # Errors
/// `Record` if the separator is missing or the username is invalid.
pub fn decode_login(data: &[u8]) -> Result<(Username, String)> {
    let pos = find_sequence(data, LOGIN_SEPARATOR)
        .ok_or_else(|| CoreError::record("login separator missing"))?;
    let user = Username::from_bytes(&data[..pos])?;
    let password = String::from_utf8(data[pos + LOGIN_SEPARATOR.len()..].to_vec())
        .map_err(|_| CoreError::record("password is not valid UTF-8"))?;
    Ok((user, password))
}

// ============================================
// Directory Records
// ============================================

/// Encodes the directory broadcast from `(username, exported key)`
/// entries.
#[must_use]
pub fn encode_directory<'a, I>(entries: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a Username, &'a [u8])>,
{
    let mut out = Vec::new();
    for (user, key) in entries {
        out.extend_from_slice(user.as_bytes());
        out.extend_from_slice(DIRECTORY_KEY_SEPARATOR);
        out.extend_from_slice(key);
        out.extend_from_slice(DIRECTORY_RECORD_SEPARATOR);
    }
    out
}

/// Decodes a directory broadcast into `(username, exported key)` pairs.
///
/// # Errors
/// `Record` on malformed entries; empty trailing records are ignored.
pub fn decode_directory(data: &[u8]) -> Result<Vec<(Username, Vec<u8>)>> {
    let mut entries = Vec::new();
    let mut rest = data;

    while let Some(end) = find_sequence(rest, DIRECTORY_RECORD_SEPARATOR) {
        let record = &rest[..end];
        rest = &rest[end + DIRECTORY_RECORD_SEPARATOR.len()..];
        if record.is_empty() {
            continue;
        }

        let split = find_sequence(record, DIRECTORY_KEY_SEPARATOR)
            .ok_or_else(|| CoreError::record("directory record missing key separator"))?;
        let user = Username::from_bytes(&record[..split])?;
        let key = record[split + DIRECTORY_KEY_SEPARATOR.len()..].to_vec();
        if key.is_empty() {
            return Err(CoreError::record("directory record has empty key"));
        }
        entries.push((user, key));
    }

    if !rest.is_empty() {
        return Err(CoreError::record("directory payload has trailing bytes"));
    }
    Ok(entries)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    #[test]
    fn test_login_roundtrip() {
        let encoded = encode_login(&user("alice"), "s3cret%pass");
        let (decoded_user, decoded_pw) = decode_login(&encoded).unwrap();
        assert_eq!(decoded_user.as_str(), "alice");
        assert_eq!(decoded_pw, "s3cret%pass");
    }

    #[test]
    fn test_login_missing_separator() {
        let err = decode_login(b"alice-without-separator").unwrap_err();
        assert!(matches!(err, CoreError::Record { .. }));
    }

    #[test]
    fn test_directory_roundtrip() {
        let alice = user("alice");
        let bob = user("bob");
        let encoded = encode_directory([
            (&alice, &b"ALICE-KEY"[..]),
            (&bob, &b"BOB-KEY"[..]),
        ]);

        let decoded = decode_directory(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].0.as_str(), "alice");
        assert_eq!(decoded[0].1, b"ALICE-KEY");
        assert_eq!(decoded[1].0.as_str(), "bob");
        assert_eq!(decoded[1].1, b"BOB-KEY");
    }

    #[test]
    fn test_directory_empty() {
        assert!(decode_directory(b"").unwrap().is_empty());
    }

    #[test]
    fn test_directory_malformed() {
        let err = decode_directory(b"no-key-separator!!next!!").unwrap_err();
        assert!(matches!(err, CoreError::Record { .. }));

        let err = decode_directory(b"trailing bytes without record end").unwrap_err();
        assert!(matches!(err, CoreError::Record { .. }));
    }
}
