// ============================================
// File: crates/peerlink-server/src/server.rs
// ============================================
//! # Secure Server
//!
//! ## Creation Reason
//! Composes the plain TCP engine with the handshake, directory and
//! relay into the message server peers actually talk to.
//!
//! ## Main Functionality
//! - `SecureServer`: bind/start/shutdown lifecycle around the engine
//! - Relay: re-seals envelope routing fields per recipient, forwards
//!   payloads untouched
//! - Server-addressed envelopes surface as [`InboundMessage`] events
//!
//! ## Main Logical Flow
//! 1. The connect hook runs the handshake; only authenticated peers
//!    become workers
//! 2. The receive hook opens kind and target with the server key; the
//!    payload stays sealed for its final recipient
//! 3. Target `Server` is opened and queued locally, any other target is
//!    looked up in the directory and forwarded
//!
//! ## ⚠️ Important Note for Next Developer
//! - The relay can NEVER open a forwarded payload; it was sealed with
//!   the recipient's key. End-to-end privacy of payloads rests on this.
//! - Relay failures (unknown recipient, dead connection) are captured
//!   as exceptions; a worker must outlive its peer's mistakes
//!
//! ## Last Modified
//! v0.1.0 - Initial secure server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use peerlink_common::types::Username;
use peerlink_core::protocol::envelope::targets;
use peerlink_core::{open_body, seal_body, seal_envelope, Envelope, KeyPair, PublicKey};
use peerlink_transport::{
    Connection, EngineConfig, EventHub, ExceptionRecord, ServerHooks, TcpServer, TransportEvent,
};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::services::credentials::CredentialStore;
use crate::services::directory::Directory;
use crate::services::handshake::{self, HandshakeContext};

// ============================================
// InboundMessage
// ============================================

/// One opened envelope that was addressed to the server itself.
#[derive(Debug)]
pub struct InboundMessage {
    /// Authenticated sender.
    pub from: Username,
    /// Opened kind field.
    pub kind: Vec<u8>,
    /// Opened payload.
    pub payload: Vec<u8>,
}

// ============================================
// SecureServer
// ============================================

struct SecureState {
    keys: Arc<KeyPair>,
    credentials: Arc<CredentialStore>,
    directory: Arc<Directory>,
    events: EventHub<InboundMessage>,
    directory_delay: Duration,
}

/// The authenticated relay server.
pub struct SecureServer {
    engine: Arc<TcpServer>,
    state: Arc<SecureState>,
}

impl SecureServer {
    /// Loads credentials, generates the server key pair and binds the
    /// listener.
    ///
    /// # Errors
    /// Configuration, credential store, key generation and bind
    /// failures.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let credentials =
            Arc::new(CredentialStore::load(&config.auth.credentials_path).await?);
        info!(bits = config.crypto.key_bits, "generating server key pair");
        let keys = Arc::new(KeyPair::generate(config.crypto.key_bits)?);

        let state = Arc::new(SecureState {
            keys,
            credentials,
            directory: Arc::new(Directory::new()),
            events: EventHub::new(),
            directory_delay: Duration::from_millis(config.protocol.directory_delay_ms),
        });

        let engine_config = EngineConfig {
            recv_buffer: config.network.recv_buffer,
            max_connections: config.network.max_connections,
        };
        let hooks = Arc::new(SecureHooks {
            state: Arc::clone(&state),
        });
        let engine = TcpServer::bind(config.network.listen_addr, engine_config, hooks).await?;

        Ok(Self { engine, state })
    }

    /// Starts accepting connections.
    ///
    /// # Errors
    /// `Transport` if the engine is already running.
    pub async fn start(&self) -> Result<()> {
        self.engine.start().await?;
        info!(addr = %self.engine.local_addr(), "secure server started");
        Ok(())
    }

    /// Stops the engine and joins every task.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.engine.local_addr()
    }

    /// The credential store, for account administration.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.state.credentials
    }

    /// Number of authenticated sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state.directory.len()
    }

    /// Usernames of every authenticated session.
    #[must_use]
    pub fn connected_users(&self) -> Vec<Username> {
        self.state
            .directory
            .sessions()
            .iter()
            .map(|session| session.username().clone())
            .collect()
    }

    /// Socket address of a user's live session.
    #[must_use]
    pub fn user_addr(&self, user: &Username) -> Option<SocketAddr> {
        self.state.directory.lookup(user).map(|s| s.addr())
    }

    /// Public key of a user's live session.
    #[must_use]
    pub fn user_key(&self, user: &Username) -> Option<PublicKey> {
        self.state.directory.lookup(user).map(|s| s.key().clone())
    }

    /// Snapshot of every session's username and exported key.
    #[must_use]
    pub fn exported_keys(&self) -> Vec<(Username, Vec<u8>)> {
        self.state.directory.snapshot()
    }

    /// Waits for the next server-addressed message or lifecycle event.
    pub async fn await_event(&self, timeout: Duration) -> TransportEvent<InboundMessage> {
        self.state.events.await_event(timeout).await
    }

    /// Drains captured background exceptions.
    #[must_use]
    pub fn drain_exceptions(&self) -> Vec<ExceptionRecord> {
        self.state.events.drain_exceptions()
    }

    /// Sends a server-originated message to an authenticated user.
    ///
    /// # Errors
    /// `UnknownRecipient` if the user has no live session.
    pub async fn send_to(&self, user: &Username, kind: &[u8], payload: &[u8]) -> Result<()> {
        let session = self
            .state
            .directory
            .lookup(user)
            .ok_or_else(|| ServerError::UnknownRecipient {
                user: user.as_str().to_owned(),
            })?;
        let envelope = seal_envelope(kind, targets::CLIENT, payload, session.key())?;
        session.connection().send(&envelope.encode()).await?;
        Ok(())
    }

    /// Closes an authenticated user's connection.
    ///
    /// # Errors
    /// `UnknownRecipient` if the user has no live session.
    pub async fn disconnect_user(&self, user: &Username) -> Result<()> {
        let session = self
            .state
            .directory
            .lookup(user)
            .ok_or_else(|| ServerError::UnknownRecipient {
                user: user.as_str().to_owned(),
            })?;
        self.engine.disconnect(session.addr()).await?;
        Ok(())
    }
}

// ============================================
// SecureHooks
// ============================================

struct SecureHooks {
    state: Arc<SecureState>,
}

impl SecureHooks {
    /// Routes one decoded envelope; see the module notes for the
    /// opening rules.
    async fn relay(&self, conn: &Arc<Connection>, message: &[u8]) -> Result<()> {
        let state = &self.state;
        let Some(sender) = state.directory.lookup_addr(conn.peer()) else {
            // Registered at the engine but gone from the directory; the
            // session is tearing down.
            return Ok(());
        };
        sender.touch();

        let envelope = Envelope::decode(message)?;
        let kind = state.keys.private().decrypt(&envelope.kind, true)?;
        let target = open_body(&envelope.target, state.keys.private())?;

        if target == targets::SERVER {
            let payload = open_body(&envelope.payload, state.keys.private())?;
            debug!(from = %sender.username(), "server-addressed message");
            state.events.push_received(InboundMessage {
                from: sender.username().clone(),
                kind,
                payload,
            });
            return Ok(());
        }

        let user = Username::from_bytes(&target)
            .map_err(|_| ServerError::handshake("unroutable target"))?;
        let recipient =
            state
                .directory
                .lookup(&user)
                .ok_or_else(|| ServerError::UnknownRecipient {
                    user: user.as_str().to_owned(),
                })?;

        // Only the routing fields are re-sealed; the payload stays as
        // the sender sealed it for the recipient.
        let forwarded = Envelope::new(
            recipient.key().encrypt(&kind, true)?,
            seal_body(&target, recipient.key())?,
            envelope.payload.clone(),
        );
        recipient.connection().send(&forwarded.encode()).await?;
        debug!(from = %sender.username(), to = %user, "envelope relayed");
        Ok(())
    }
}

#[async_trait]
impl ServerHooks for SecureHooks {
    async fn on_connect(&self, conn: &Arc<Connection>) -> peerlink_transport::Result<bool> {
        let ctx = HandshakeContext {
            keys: Arc::clone(&self.state.keys),
            credentials: Arc::clone(&self.state.credentials),
            directory: Arc::clone(&self.state.directory),
            directory_delay: self.state.directory_delay,
        };
        match handshake::authenticate(&ctx, conn).await {
            Ok(Some(_)) => {
                self.state.events.push_connected();
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                warn!(peer = %conn.peer(), error = %err, "handshake failed");
                self.state
                    .events
                    .push_exception(ExceptionRecord::new("handshake", err));
                Ok(false)
            }
        }
    }

    async fn on_receive(
        &self,
        conn: &Arc<Connection>,
        message: &[u8],
    ) -> peerlink_transport::Result<bool> {
        if let Err(err) = self.relay(conn, message).await {
            warn!(peer = %conn.peer(), error = %err, "relay failed");
            self.state
                .events
                .push_exception(ExceptionRecord::new("relay", err));
        }
        // Raw frames never surface through the engine hub.
        Ok(false)
    }

    async fn on_disconnect(&self, conn: &Arc<Connection>) {
        if let Some(session) = self.state.directory.remove_by_addr(conn.peer()) {
            info!(user = %session.username(), "session ended");
            self.state.events.push_disconnected();
            let directory = Arc::clone(&self.state.directory);
            tokio::spawn(async move {
                handshake::broadcast_directory(&directory).await;
            });
        }
    }
}
