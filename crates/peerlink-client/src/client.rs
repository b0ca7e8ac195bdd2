// ============================================
// File: crates/peerlink-client/src/client.rs
// ============================================
//! # Secure Client
//!
//! ## Creation Reason
//! The connecting side of the system: performs the key and credential
//! exchange, keeps the broadcast peer directory and exchanges sealed
//! envelopes with other peers through the relay.
//!
//! ## Main Functionality
//! - `connect`: drives the handshake inline, then arms the secure
//!   receive task
//! - `send_to`: payload sealed for the peer, routing sealed for the
//!   relay
//! - Directory broadcasts fold into the local peer map silently
//!
//! ## Main Logical Flow
//! 1. Take the server's key from its plaintext offer
//! 2. Send our key and the login, each sealed for the server
//! 3. The first envelope after login decides the outcome: a rejection
//!    or the initial directory broadcast
//! 4. From then on every inbound envelope is opened by the receive
//!    task; directory updates refresh the peer map, everything else
//!    surfaces as an event
//!
//! ## ⚠️ Important Note for Next Developer
//! - The relay re-seals routing fields, so inbound envelopes are
//!   always opened with OUR private key, never the server's
//! - Peers absent from a directory broadcast are dropped from the map;
//!   the broadcast is the complete live list
//!
//! ## Last Modified
//! v0.1.0 - Initial secure client

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use peerlink_common::types::Username;
use peerlink_core::protocol::envelope::{kinds, targets};
use peerlink_core::protocol::records::{decode_directory, encode_login};
use peerlink_core::{
    import_key, open_envelope, seal_body, seal_envelope, Envelope, KeyPair, PublicKey, RsaKey,
};
use peerlink_transport::{ClientHooks, EventHub, ExceptionRecord, TcpClient, TransportEvent};

use crate::error::{ClientError, Result};

// ============================================
// Public Types
// ============================================

/// How the handshake ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The server accepted the login; the session is live.
    Authenticated,
    /// The server rejected the credentials and closed the session.
    Rejected,
}

/// One opened envelope from the relay.
#[derive(Debug)]
pub struct PeerMessage {
    /// Opened kind field.
    pub kind: Vec<u8>,
    /// Opened payload.
    pub payload: Vec<u8>,
}

// ============================================
// SecureClient
// ============================================

struct ClientState {
    keys: KeyPair,
    server_key: Mutex<Option<PublicKey>>,
    peers: DashMap<Username, PublicKey>,
    events: EventHub<PeerMessage>,
}

/// The authenticated peer-to-peer client.
pub struct SecureClient {
    tcp: TcpClient,
    state: Arc<ClientState>,
    credentials: Mutex<Option<(Username, String)>>,
}

impl SecureClient {
    /// Creates a client with a freshly generated key pair.
    ///
    /// # Errors
    /// Key generation failures.
    pub fn generate(key_bits: u64) -> Result<Self> {
        Ok(Self::with_keys(KeyPair::generate(key_bits)?))
    }

    /// Creates a client around an existing key pair.
    #[must_use]
    pub fn with_keys(keys: KeyPair) -> Self {
        Self {
            tcp: TcpClient::new(),
            state: Arc::new(ClientState {
                keys,
                server_key: Mutex::new(None),
                peers: DashMap::new(),
                events: EventHub::new(),
            }),
            credentials: Mutex::new(None),
        }
    }

    /// Returns `true` while the underlying connection is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.tcp.is_connected()
    }

    /// The server's public key, once the handshake delivered it.
    #[must_use]
    pub fn server_key(&self) -> Option<PublicKey> {
        self.state.server_key.lock().clone()
    }

    /// Usernames the latest directory broadcast listed.
    #[must_use]
    pub fn connected_users(&self) -> Vec<Username> {
        self.state
            .peers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The known public key of a peer.
    #[must_use]
    pub fn peer_key(&self, user: &Username) -> Option<PublicKey> {
        self.state.peers.get(user).map(|entry| entry.clone())
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Connects and authenticates.
    ///
    /// On `Rejected` the connection is closed before returning.
    ///
    /// # Errors
    /// Transport failures and handshake protocol violations.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        username: Username,
        password: &str,
    ) -> Result<HandshakeOutcome> {
        self.tcp.connect(addr).await?;
        let outcome = match self.handshake(&username, password).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = self.tcp.disconnect().await;
                return Err(err);
            }
        };

        match outcome {
            HandshakeOutcome::Authenticated => {
                *self.credentials.lock() = Some((username, password.to_owned()));
                let hooks = Arc::new(SecureClientHooks {
                    state: Arc::clone(&self.state),
                });
                self.tcp.start_auto_receive(hooks).await?;
                Ok(HandshakeOutcome::Authenticated)
            }
            HandshakeOutcome::Rejected => {
                self.tcp.disconnect().await?;
                Ok(HandshakeOutcome::Rejected)
            }
        }
    }

    async fn handshake(&self, username: &Username, password: &str) -> Result<HandshakeOutcome> {
        // Step 1: the server's key arrives in the clear.
        let frame = self.tcp.receive().await?;
        let offer = Envelope::decode(&frame)?;
        if offer.kind != kinds::KEY {
            return Err(ClientError::handshake("expected key offer"));
        }
        let server_key = match import_key(&offer.payload)? {
            RsaKey::Public(key) => key,
            RsaKey::Private(_) => {
                return Err(ClientError::handshake("server offered a private key"));
            }
        };

        // Step 2: our key, sealed for the server.
        let envelope = seal_envelope(
            kinds::KEY,
            targets::SERVER,
            &self.state.keys.public().export(),
            &server_key,
        )?;
        self.tcp.send(&envelope.encode()).await?;

        // Step 3: the login.
        let record = encode_login(username, password);
        let envelope = seal_envelope(kinds::LOGIN, targets::SERVER, &record, &server_key)?;
        self.tcp.send(&envelope.encode()).await?;
        *self.state.server_key.lock() = Some(server_key);

        // Step 4: the verdict is the next envelope.
        let frame = self.tcp.receive().await?;
        let envelope = Envelope::decode(&frame)?;
        let (kind, _, payload) = open_envelope(&envelope, self.state.keys.private())?;
        if kind == kinds::REJECTED {
            info!(user = %username, "login rejected");
            return Ok(HandshakeOutcome::Rejected);
        }
        if kind != kinds::DIRECTORY {
            return Err(ClientError::handshake("expected directory or rejection"));
        }

        fold_directory(&self.state, &payload)?;
        info!(user = %username, peers = self.state.peers.len(), "authenticated");
        Ok(HandshakeOutcome::Authenticated)
    }

    /// Closes the connection.
    ///
    /// # Errors
    /// `Transport` if the socket shutdown fails.
    pub async fn disconnect(&self) -> Result<()> {
        self.tcp.disconnect().await?;
        self.state.peers.clear();
        *self.state.server_key.lock() = None;
        Ok(())
    }

    /// Dials the previous server again and re-authenticates with the
    /// stored credentials.
    ///
    /// # Errors
    /// `NotAuthenticated` if there was no successful login to repeat.
    pub async fn reconnect(&self) -> Result<HandshakeOutcome> {
        let (username, password) = self
            .credentials
            .lock()
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;
        let addr = self
            .tcp
            .remote_addr()
            .ok_or(ClientError::NotAuthenticated)?;
        self.disconnect().await?;
        self.connect(addr, username, &password).await
    }

    // ========================================
    // Messaging
    // ========================================

    /// Sends a sealed message to another peer through the relay.
    ///
    /// The payload is sealed with the peer's key; only the routing
    /// fields are readable by the relay.
    ///
    /// # Errors
    /// `UnknownPeer` if no key is known for the recipient,
    /// `NotAuthenticated` before a successful login.
    pub async fn send_to(&self, user: &Username, kind: &[u8], payload: &[u8]) -> Result<()> {
        let server_key = self
            .server_key()
            .ok_or(ClientError::NotAuthenticated)?;
        let peer_key = self
            .peer_key(user)
            .ok_or_else(|| ClientError::UnknownPeer {
                user: user.as_str().to_owned(),
            })?;

        let envelope = Envelope::new(
            server_key.encrypt(kind, true)?,
            seal_body(user.as_bytes(), &server_key)?,
            seal_body(payload, &peer_key)?,
        );
        self.tcp.send(&envelope.encode()).await?;
        debug!(to = %user, "envelope sent");
        Ok(())
    }

    /// Sends a message addressed to the server itself.
    ///
    /// # Errors
    /// `NotAuthenticated` before a successful login.
    pub async fn send_to_server(&self, kind: &[u8], payload: &[u8]) -> Result<()> {
        let server_key = self
            .server_key()
            .ok_or(ClientError::NotAuthenticated)?;
        let envelope = seal_envelope(kind, targets::SERVER, payload, &server_key)?;
        self.tcp.send(&envelope.encode()).await?;
        Ok(())
    }

    /// Waits for the next opened message or lifecycle event.
    pub async fn await_event(&self, timeout: Duration) -> TransportEvent<PeerMessage> {
        self.state.events.await_event(timeout).await
    }

    /// Drains captured background exceptions.
    #[must_use]
    pub fn drain_exceptions(&self) -> Vec<ExceptionRecord> {
        self.state.events.drain_exceptions()
    }
}

/// Replaces the peer map with the broadcast listing.
fn fold_directory(state: &ClientState, payload: &[u8]) -> Result<()> {
    let listing = decode_directory(payload)?;
    let mut fresh = Vec::with_capacity(listing.len());
    for (user, exported) in listing {
        match import_key(&exported)? {
            RsaKey::Public(key) => {
                state.peers.insert(user.clone(), key);
                fresh.push(user);
            }
            RsaKey::Private(_) => {
                return Err(ClientError::handshake("directory carried a private key"));
            }
        }
    }
    state.peers.retain(|user, _| fresh.contains(user));
    debug!(peers = fresh.len(), "peer directory updated");
    Ok(())
}

// ============================================
// SecureClientHooks
// ============================================

struct SecureClientHooks {
    state: Arc<ClientState>,
}

impl SecureClientHooks {
    fn open(&self, message: &[u8]) -> Result<()> {
        let envelope = Envelope::decode(message)?;
        let (kind, _, payload) = open_envelope(&envelope, self.state.keys.private())?;

        if kind == kinds::DIRECTORY {
            fold_directory(&self.state, &payload)?;
            return Ok(());
        }

        self.state
            .events
            .push_received(PeerMessage { kind, payload });
        Ok(())
    }
}

#[async_trait]
impl ClientHooks for SecureClientHooks {
    async fn on_receive(&self, message: &[u8]) -> peerlink_transport::Result<bool> {
        if let Err(err) = self.open(message) {
            warn!(error = %err, "inbound envelope dropped");
            self.state
                .events
                .push_exception(ExceptionRecord::new("open envelope", err));
        }
        // Raw frames never surface through the plain hub.
        Ok(false)
    }

    async fn on_disconnect(&self) {
        self.state.events.push_disconnected();
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_keys() -> KeyPair {
        use std::sync::OnceLock;
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| KeyPair::generate(1024).unwrap())
            .clone()
    }

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_send_before_login_fails() {
        let client = SecureClient::with_keys(fixture_keys());
        let err = client.send_to(&user("bob"), b"msg", b"hi").await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
    }

    #[test]
    fn test_fold_directory_replaces_map() {
        use peerlink_core::protocol::records::encode_directory;

        let client = SecureClient::with_keys(fixture_keys());
        let peer_keys = fixture_keys();
        let exported = peer_keys.public().export();

        let alice = user("alice");
        let bob = user("bob");
        let listing = encode_directory([
            (&alice, exported.as_slice()),
            (&bob, exported.as_slice()),
        ]);
        fold_directory(&client.state, &listing).unwrap();
        assert_eq!(client.connected_users().len(), 2);

        // A later broadcast without bob drops bob.
        let listing = encode_directory([(&alice, exported.as_slice())]);
        fold_directory(&client.state, &listing).unwrap();
        assert_eq!(client.connected_users(), vec![user("alice")]);
        assert!(client.peer_key(&bob).is_none());
    }

    #[test]
    fn test_fold_directory_rejects_garbage_keys() {
        use peerlink_core::protocol::records::encode_directory;

        let client = SecureClient::with_keys(fixture_keys());
        let alice = user("alice");
        let listing = encode_directory([(&alice, &b"not a key"[..])]);
        assert!(fold_directory(&client.state, &listing).is_err());
    }
}
