// ============================================
// File: crates/peerlink-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Centralizes the server's tunables in one TOML-backed structure so
//! deployments adjust ports, limits and key sizes without rebuilding.
//!
//! ## Main Functionality
//! - `ServerConfig`: network, crypto, auth and protocol sections
//! - Async load from a TOML file with validation
//! - Defaults matching a local single-instance deployment
//!
//! ## ⚠️ Important Note for Next Developer
//! - `key_bits` below 1024 breaks the hybrid seal: an exported combined
//!   key no longer fits one modulus. Validation rejects it.
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Smallest key size the hybrid seal works with.
pub const MIN_KEY_BITS: u64 = 1024;

// ============================================
// Sections
// ============================================

/// Socket and connection tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the listener binds to.
    pub listen_addr: SocketAddr,
    /// Receive buffer size used for message framing.
    pub recv_buffer: usize,
    /// Maximum simultaneous sessions; `None` means unlimited.
    pub max_connections: Option<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 25565)),
            recv_buffer: 2048,
            max_connections: None,
        }
    }
}

/// Key generation tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Modulus size for the server key pair, in bits.
    pub key_bits: u64,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self { key_bits: 2048 }
    }
}

/// Credential storage tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path of the JSON credential store.
    pub credentials_path: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
        }
    }
}

/// Protocol timing tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Delay before the directory broadcast after a login, in
    /// milliseconds. Gives the fresh client time to arm its receive
    /// loop.
    pub directory_delay_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            directory_delay_ms: 50,
        }
    }
}

// ============================================
// ServerConfig
// ============================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket and connection settings.
    pub network: NetworkConfig,
    /// Key generation settings.
    pub crypto: CryptoConfig,
    /// Credential storage settings.
    pub auth: AuthConfig,
    /// Protocol timing settings.
    pub protocol: ProtocolConfig,
}

impl ServerConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `ConfigParse` on malformed
    /// TOML, `Config` on invalid values.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::io(format!("read config {}", path.display()), e))?;
        let config: Self = toml::from_str(&raw).map_err(|e| ServerError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates field values.
    ///
    /// # Errors
    /// `Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.crypto.key_bits < MIN_KEY_BITS {
            return Err(ServerError::config(
                "crypto.key_bits",
                format!("must be at least {MIN_KEY_BITS}"),
            ));
        }
        if self.crypto.key_bits % 2 != 0 {
            return Err(ServerError::config("crypto.key_bits", "must be even"));
        }
        if self.network.recv_buffer < 64 {
            return Err(ServerError::config(
                "network.recv_buffer",
                "must be at least 64 bytes",
            ));
        }
        if self.network.max_connections == Some(0) {
            return Err(ServerError::config(
                "network.max_connections",
                "zero would refuse every peer; use None for unlimited",
            ));
        }
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
