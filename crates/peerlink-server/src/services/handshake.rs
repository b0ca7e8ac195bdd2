// ============================================
// File: crates/peerlink-server/src/services/handshake.rs
// ============================================
//! # Authentication Handshake
//!
//! ## Creation Reason
//! Runs the three-step key and credential exchange every fresh
//! connection must pass before it becomes a routable session.
//!
//! ## Main Functionality
//! - `authenticate`: offer server key, take client key, verify login
//! - `broadcast_directory`: per-recipient sealed peer list
//!
//! ## Main Logical Flow
//! 1. Send the server's exported public key in a plaintext envelope
//! 2. Receive the client's key envelope, sealed for the server
//! 3. Receive the login envelope, verify against the credential store
//! 4. Register the session, then broadcast the directory after a short
//!    delay so the fresh client has armed its receive loop
//!
//! ## ⚠️ Important Note for Next Developer
//! - This runs inside the connect hook, so it owns the stream; direct
//!   `receive` calls here never race a worker
//! - A failed login is answered with a sealed `Rejected` envelope and
//!   `Ok(None)`, not an error; errors mean the exchange itself broke
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use peerlink_core::protocol::envelope::{kinds, targets};
use peerlink_core::protocol::records::{decode_login, encode_directory};
use peerlink_core::{import_key, open_body, seal_envelope, Envelope, KeyPair, RsaKey};
use peerlink_transport::Connection;

use crate::error::{Result, ServerError};
use crate::services::credentials::CredentialStore;
use crate::services::directory::{Directory, Session};

// ============================================
// HandshakeContext
// ============================================

/// Everything `authenticate` needs, shared across connections.
#[derive(Clone)]
pub struct HandshakeContext {
    /// The server's key pair.
    pub keys: Arc<KeyPair>,
    /// Login verification.
    pub credentials: Arc<CredentialStore>,
    /// Live session registry.
    pub directory: Arc<Directory>,
    /// Delay before the post-login directory broadcast.
    pub directory_delay: Duration,
}

// ============================================
// Handshake
// ============================================

/// Runs the handshake on a fresh connection.
///
/// Returns the registered session, or `None` if the login was
/// rejected.
///
/// # Errors
/// `Handshake` on protocol violations, transport and cipher errors
/// pass through.
pub async fn authenticate(
    ctx: &HandshakeContext,
    conn: &Arc<Connection>,
) -> Result<Option<Arc<Session>>> {
    let addr = conn.peer();

    // Step 1: our key travels in the clear; the client has nothing to
    // open a sealed envelope with yet.
    let offer = Envelope::new(
        kinds::KEY,
        targets::CLIENT,
        ctx.keys.public().export(),
    );
    conn.send(&offer.encode()).await?;

    // Step 2: the client's key, sealed for us.
    let frame = conn.receive().await?;
    let envelope = Envelope::decode(&frame)?;
    expect_kind(&envelope.kind, kinds::KEY, &ctx.keys, "client key kind")?;
    expect_target(&envelope.target, targets::SERVER, &ctx.keys, "client key target")?;
    let exported = open_body(&envelope.payload, ctx.keys.private())?;
    let key = match import_key(&exported)? {
        RsaKey::Public(key) => key,
        RsaKey::Private(_) => {
            return Err(ServerError::handshake("client offered a private key"));
        }
    };
    debug!(%addr, "client key accepted");

    // Step 3: the login, sealed for us.
    let frame = conn.receive().await?;
    let envelope = Envelope::decode(&frame)?;
    expect_kind(&envelope.kind, kinds::LOGIN, &ctx.keys, "login kind")?;
    expect_target(&envelope.target, targets::SERVER, &ctx.keys, "login target")?;
    let record = open_body(&envelope.payload, ctx.keys.private())?;
    let (user, password) = decode_login(&record)?;

    if !ctx.credentials.verify(&user, &password) {
        warn!(%addr, user = %user, "login rejected");
        let rejection = seal_envelope(kinds::REJECTED, targets::CLIENT, b"", &key)?;
        // Best effort; the peer may have hung up already.
        let _ = conn.send(&rejection.encode()).await;
        return Ok(None);
    }

    // Step 4: the peer becomes routable.
    let session = Arc::new(Session::new(Arc::clone(conn), user, key, exported));
    info!(%addr, user = %session.username(), "login accepted");
    if let Some(old) = ctx.directory.register(Arc::clone(&session)) {
        debug!(user = %session.username(), "closing replaced session");
        let _ = old.connection().shutdown().await;
    }

    let directory = Arc::clone(&ctx.directory);
    let delay = ctx.directory_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        broadcast_directory(&directory).await;
    });

    Ok(Some(session))
}

/// Deciphers a directly enciphered kind and checks it against the
/// expected constant.
fn expect_kind(sealed: &[u8], expected: &[u8], keys: &KeyPair, what: &str) -> Result<()> {
    let opened = keys.private().decrypt(sealed, true)?;
    if opened == expected {
        Ok(())
    } else {
        Err(ServerError::handshake(format!("unexpected {what}")))
    }
}

/// Opens a hybrid-sealed target and checks it against the expected
/// constant.
fn expect_target(sealed: &[u8], expected: &[u8], keys: &KeyPair, what: &str) -> Result<()> {
    let opened = open_body(sealed, keys.private())?;
    if opened == expected {
        Ok(())
    } else {
        Err(ServerError::handshake(format!("unexpected {what}")))
    }
}

// ============================================
// Directory Broadcast
// ============================================

/// Sends the current peer list to every session, sealed per recipient.
///
/// Failed sends are logged and skipped; the broadcast never takes a
/// session down.
pub async fn broadcast_directory(directory: &Directory) {
    let sessions = directory.sessions();
    let entries = directory.snapshot();
    debug!(peers = sessions.len(), "broadcasting directory");

    let listing = encode_directory(
        entries
            .iter()
            .map(|(user, key)| (user, key.as_slice())),
    );

    for session in sessions {
        let sealed = match seal_envelope(
            kinds::DIRECTORY,
            targets::CLIENT,
            &listing,
            session.key(),
        ) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(user = %session.username(), error = %err, "directory seal failed");
                continue;
            }
        };
        if let Err(err) = session.connection().send(&sealed.encode()).await {
            warn!(user = %session.username(), error = %err, "directory send failed");
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_common::types::Username;
    use peerlink_core::protocol::records::{decode_directory, encode_login};
    use peerlink_core::{open_envelope, seal_body};
    use peerlink_transport::DEFAULT_RECV_BUFFER;
    use tokio::net::{TcpListener, TcpStream};

    fn server_keys() -> Arc<KeyPair> {
        use std::sync::OnceLock;
        static PAIR: OnceLock<Arc<KeyPair>> = OnceLock::new();
        Arc::clone(PAIR.get_or_init(|| Arc::new(KeyPair::generate(1024).unwrap())))
    }

    fn client_keys() -> &'static KeyPair {
        use std::sync::OnceLock;
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| KeyPair::generate(1024).unwrap())
    }

    async fn context() -> (tempfile::TempDir, HandshakeContext) {
        let dir = tempfile::tempdir().unwrap();
        let credentials = CredentialStore::load(dir.path().join("creds.json"))
            .await
            .unwrap();
        credentials.add_user(&Username::new("alice").unwrap(), "wonderland");
        (
            dir,
            HandshakeContext {
                keys: server_keys(),
                credentials: Arc::new(credentials),
                directory: Arc::new(Directory::new()),
                directory_delay: Duration::from_millis(10),
            },
        )
    }

    async fn connection_pair() -> (Arc<Connection>, Arc<Connection>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        (
            Arc::new(Connection::new(server_side, DEFAULT_RECV_BUFFER).unwrap()),
            Arc::new(Connection::new(client, DEFAULT_RECV_BUFFER).unwrap()),
        )
    }

    /// Drives the client half of the handshake by hand.
    async fn drive_client(conn: Arc<Connection>, user: &str, password: &str) {
        // Server key offer arrives in the clear.
        let frame = conn.receive().await.unwrap();
        let offer = Envelope::decode(&frame).unwrap();
        assert_eq!(&offer.kind[..], kinds::KEY);
        let server_key = match import_key(&offer.payload).unwrap() {
            RsaKey::Public(key) => key,
            RsaKey::Private(_) => panic!("server offered a private key"),
        };

        // Our key, sealed for the server.
        let envelope = seal_envelope(
            kinds::KEY,
            targets::SERVER,
            &client_keys().public().export(),
            &server_key,
        )
        .unwrap();
        conn.send(&envelope.encode()).await.unwrap();

        // The login.
        let record = encode_login(&Username::new(user).unwrap(), password);
        let envelope = seal_envelope(kinds::LOGIN, targets::SERVER, &record, &server_key).unwrap();
        conn.send(&envelope.encode()).await.unwrap();
    }

    #[tokio::test]
    async fn test_valid_login_registers_session() {
        let (_tmp, ctx) = context().await;
        let (server_conn, client_conn) = connection_pair().await;

        let client = tokio::spawn(async move {
            drive_client(Arc::clone(&client_conn), "alice", "wonderland").await;
            client_conn
        });

        let session = authenticate(&ctx, &server_conn).await.unwrap().unwrap();
        assert_eq!(session.username().as_str(), "alice");
        assert_eq!(ctx.directory.len(), 1);

        // The delayed broadcast reaches the client and lists alice.
        let client_conn = client.await.unwrap();
        let frame = client_conn.receive().await.unwrap();
        let envelope = Envelope::decode(&frame).unwrap();
        let (kind, target, payload) =
            open_envelope(&envelope, client_keys().private()).unwrap();
        assert_eq!(kind, kinds::DIRECTORY);
        assert_eq!(target, targets::CLIENT);

        let listing = decode_directory(&payload).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].0.as_str(), "alice");
        assert_eq!(listing[0].1, client_keys().public().export());
    }

    #[tokio::test]
    async fn test_bad_password_rejected() {
        let (_tmp, ctx) = context().await;
        let (server_conn, client_conn) = connection_pair().await;

        let client = tokio::spawn(async move {
            drive_client(Arc::clone(&client_conn), "alice", "not wonderland").await;
            client_conn
        });

        let outcome = authenticate(&ctx, &server_conn).await.unwrap();
        assert!(outcome.is_none());
        assert!(ctx.directory.is_empty());

        let client_conn = client.await.unwrap();
        let frame = client_conn.receive().await.unwrap();
        let envelope = Envelope::decode(&frame).unwrap();
        let (kind, _, _) = open_envelope(&envelope, client_keys().private()).unwrap();
        assert_eq!(kind, kinds::REJECTED);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let (_tmp, ctx) = context().await;
        let (server_conn, client_conn) = connection_pair().await;

        let client = tokio::spawn(async move {
            drive_client(Arc::clone(&client_conn), "mallory", "wonderland").await;
        });

        assert!(authenticate(&ctx, &server_conn).await.unwrap().is_none());
        client.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_key_envelope_is_error() {
        let (_tmp, ctx) = context().await;
        let (server_conn, client_conn) = connection_pair().await;

        let client = tokio::spawn(async move {
            let _ = client_conn.receive().await.unwrap();
            client_conn.send(b"not an envelope at all").await.unwrap();
        });

        let err = authenticate(&ctx, &server_conn).await.unwrap_err();
        assert!(err.is_peer_error());
        client.await.unwrap();
    }

    #[test]
    fn test_expect_field_helpers() {
        let keys = server_keys();

        let kind = keys.public().encrypt(kinds::LOGIN, true).unwrap();
        assert!(expect_kind(&kind, kinds::LOGIN, &keys, "kind").is_ok());
        assert!(expect_kind(&kind, kinds::KEY, &keys, "kind").is_err());

        let target = seal_body(targets::SERVER, keys.public()).unwrap();
        assert!(expect_target(&target, targets::SERVER, &keys, "target").is_ok());
        assert!(expect_target(&target, targets::CLIENT, &keys, "target").is_err());
    }
}
