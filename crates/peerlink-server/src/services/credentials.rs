// ============================================
// File: crates/peerlink-server/src/services/credentials.rs
// ============================================
//! # Credential Store
//!
//! ## Creation Reason
//! Holds the username/password database the handshake verifies logins
//! against, with salted slow hashing so a leaked store file does not
//! leak passwords.
//!
//! ## Main Functionality
//! - PBKDF2-HMAC-SHA512, 100k iterations, 32-byte random salt
//! - Stored record: `hex(salt) || hex(digest)` per user in a JSON map
//! - Constant-time digest comparison on verify
//!
//! ## ⚠️ Important Note for Next Developer
//! - `verify` returns plain `bool`; wrong user and wrong password are
//!   indistinguishable to the caller on purpose
//! - A missing store file loads as an empty store so first boot works
//!
//! ## Last Modified
//! v0.1.0 - Initial credential store

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use peerlink_common::types::Username;

use crate::error::{Result, ServerError};

/// PBKDF2 iteration count.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
const SALT_LEN: usize = 32;

/// Digest length in bytes (SHA-512 output).
const DIGEST_LEN: usize = 64;

// ============================================
// CredentialStore
// ============================================

/// Salted password database backed by a JSON file.
///
/// # Thread Safety
/// Verifications and additions run concurrently; `save` snapshots the
/// map at call time.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    records: DashMap<String, String>,
}

impl CredentialStore {
    /// Loads the store from `path`; a missing file yields an empty
    /// store.
    ///
    /// # Errors
    /// `Io` on unreadable files, `CredentialStore` on malformed JSON or
    /// records.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let parsed: HashMap<String, String> = serde_json::from_str(&raw)
                    .map_err(|e| ServerError::credential_store(format!("malformed store: {e}")))?;
                for (user, record) in parsed {
                    if record.len() != 2 * (SALT_LEN + DIGEST_LEN) {
                        return Err(ServerError::credential_store(format!(
                            "record for '{user}' has wrong length"
                        )));
                    }
                    records.insert(user, record);
                }
                info!(path = %path.display(), users = records.len(), "credential store loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no credential store yet, starting empty");
            }
            Err(e) => {
                return Err(ServerError::io(
                    format!("read credential store {}", path.display()),
                    e,
                ));
            }
        }

        Ok(Self { path, records })
    }

    /// Writes the store back to its file.
    ///
    /// # Errors
    /// `Io` if the file cannot be written.
    pub async fn save(&self) -> Result<()> {
        let snapshot: HashMap<String, String> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let raw = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ServerError::credential_store(format!("serialize store: {e}")))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| ServerError::io(format!("write credential store {}", self.path.display()), e))
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no users are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ========================================
    // Operations
    // ========================================

    /// Adds or replaces a user with a fresh salt.
    pub fn add_user(&self, user: &Username, password: &str) {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = derive(password, &salt);

        let mut record = String::with_capacity(2 * (SALT_LEN + DIGEST_LEN));
        record.push_str(&hex::encode(salt));
        record.push_str(&hex::encode(digest));
        self.records.insert(user.as_str().to_owned(), record);
        debug!(user = %user, "credential added");
    }

    /// Removes a user; returns `true` if one was stored.
    pub fn remove_user(&self, user: &Username) -> bool {
        self.records.remove(user.as_str()).is_some()
    }

    /// Verifies a login attempt.
    ///
    /// Unknown users and wrong passwords both return `false`.
    #[must_use]
    pub fn verify(&self, user: &Username, password: &str) -> bool {
        let Some(record) = self.records.get(user.as_str()) else {
            return false;
        };

        let (salt_hex, digest_hex) = record.split_at(2 * SALT_LEN);
        let (Ok(salt), Ok(stored)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
            return false;
        };

        let candidate = derive(password, &salt);
        candidate.ct_eq(&stored).into()
    }
}

/// Derives the slow hash of a password under a salt.
fn derive(password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut digest);
    digest
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

    async fn empty_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(dir.path().join("creds.json"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_add_and_verify() {
        let (_dir, store) = empty_store().await;
        store.add_user(&user("alice"), "correct horse");

        assert!(store.verify(&user("alice"), "correct horse"));
        assert!(!store.verify(&user("alice"), "wrong horse"));
        assert!(!store.verify(&user("nobody"), "correct horse"));
    }

    #[tokio::test]
    async fn test_fresh_salt_per_user() {
        let (_dir, store) = empty_store().await;
        store.add_user(&user("alice"), "same password");
        store.add_user(&user("bob"), "same password");

        let a = store.records.get("alice").unwrap().clone();
        let b = store.records.get("bob").unwrap().clone();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        let store = CredentialStore::load(&path).await.unwrap();
        store.add_user(&user("alice"), "pass one");
        store.add_user(&user("bob"), "pass two");
        store.save().await.unwrap();

        let reloaded = CredentialStore::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.verify(&user("alice"), "pass one"));
        assert!(reloaded.verify(&user("bob"), "pass two"));
        assert!(!reloaded.verify(&user("alice"), "pass two"));
    }

    #[tokio::test]
    async fn test_malformed_store_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        tokio::fs::write(&path, "{\"alice\": \"tooshort\"}")
            .await
            .unwrap();

        let err = CredentialStore::load(&path).await.unwrap_err();
        assert!(matches!(err, ServerError::CredentialStore { .. }));
    }

    #[tokio::test]
    async fn test_remove_user() {
        let (_dir, store) = empty_store().await;
        store.add_user(&user("alice"), "pw");
        assert!(store.remove_user(&user("alice")));
        assert!(!store.remove_user(&user("alice")));
        assert!(!store.verify(&user("alice"), "pw"));
    }
}
