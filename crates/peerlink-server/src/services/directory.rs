// ============================================
// File: crates/peerlink-server/src/services/directory.rs
// ============================================
//! # Session Directory
//!
//! ## Creation Reason
//! Tracks every authenticated session so envelopes can be routed by
//! username and so directory broadcasts can list the live peers with
//! their public keys.
//!
//! ## Main Functionality
//! - `Session`: authenticated peer with its connection and public key
//! - `Directory`: address and username indices over live sessions
//! - `snapshot`: the `(username, exported key)` list broadcasts carry
//!
//! ## ⚠️ Important Note for Next Developer
//! - A second login under the same username replaces the first; the
//!   old session is handed back so the caller can close it
//! - `remove_by_addr` wins-once: the caller that gets `Some` is the
//!   only one running teardown for that session
//!
//! ## Last Modified
//! v0.1.0 - Initial session directory

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use peerlink_common::time::AtomicInstant;
use peerlink_common::types::Username;
use peerlink_core::PublicKey;
use peerlink_transport::Connection;

// ============================================
// Session
// ============================================

/// One authenticated peer.
#[derive(Debug)]
pub struct Session {
    conn: Arc<Connection>,
    username: Username,
    key: PublicKey,
    exported_key: Vec<u8>,
    last_seen: AtomicInstant,
}

impl Session {
    /// Builds a session from handshake results.
    #[must_use]
    pub fn new(
        conn: Arc<Connection>,
        username: Username,
        key: PublicKey,
        exported_key: Vec<u8>,
    ) -> Self {
        Self {
            conn,
            username,
            key,
            exported_key,
            last_seen: AtomicInstant::now(),
        }
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Peer address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.conn.peer()
    }

    /// Authenticated username.
    #[must_use]
    pub const fn username(&self) -> &Username {
        &self.username
    }

    /// The peer's public key.
    #[must_use]
    pub const fn key(&self) -> &PublicKey {
        &self.key
    }

    /// The peer's key exactly as it exported it.
    #[must_use]
    pub fn exported_key(&self) -> &[u8] {
        &self.exported_key
    }

    /// Records activity on this session.
    pub fn touch(&self) {
        self.last_seen.touch();
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle(&self) -> std::time::Duration {
        self.last_seen.elapsed()
    }
}

// ============================================
// Directory
// ============================================

/// Indices over the live authenticated sessions.
#[derive(Debug, Default)]
pub struct Directory {
    by_addr: DashMap<SocketAddr, Arc<Session>>,
    by_user: DashMap<Username, SocketAddr>,
}

impl Directory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    /// Returns `true` when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }

    /// Registers a session, replacing any older session under the same
    /// username. The replaced session is returned for teardown.
    pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let addr = session.addr();
        let user = session.username().clone();

        let replaced = self
            .by_user
            .insert(user.clone(), addr)
            .filter(|old_addr| *old_addr != addr)
            .and_then(|old_addr| self.by_addr.remove(&old_addr))
            .map(|(_, old)| old);

        self.by_addr.insert(addr, session);
        debug!(%addr, user = %user, replaced = replaced.is_some(), "session registered");
        replaced
    }

    /// Removes the session at an address, exactly once.
    pub fn remove_by_addr(&self, addr: SocketAddr) -> Option<Arc<Session>> {
        let (_, session) = self.by_addr.remove(&addr)?;
        // Only drop the username index if it still points here; a
        // replacement login may have re-claimed the name already.
        self.by_user
            .remove_if(session.username(), |_, mapped| *mapped == addr);
        debug!(%addr, user = %session.username(), "session removed");
        Some(session)
    }

    /// Looks up a session by username.
    #[must_use]
    pub fn lookup(&self, user: &Username) -> Option<Arc<Session>> {
        let addr = *self.by_user.get(user)?;
        self.by_addr.get(&addr).map(|entry| Arc::clone(&entry))
    }

    /// Looks up a session by peer address.
    #[must_use]
    pub fn lookup_addr(&self, addr: SocketAddr) -> Option<Arc<Session>> {
        self.by_addr.get(&addr).map(|entry| Arc::clone(&entry))
    }

    /// Every live session.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.by_addr
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// The `(username, exported key)` list directory broadcasts carry.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Username, Vec<u8>)> {
        self.by_addr
            .iter()
            .map(|entry| {
                (
                    entry.username().clone(),
                    entry.exported_key().to_vec(),
                )
            })
            .collect()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::KeyPair;
    use peerlink_transport::DEFAULT_RECV_BUFFER;
    use tokio::net::{TcpListener, TcpStream};

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    fn fixture_key() -> &'static KeyPair {
        use std::sync::OnceLock;
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| KeyPair::generate(1024).unwrap())
    }

    async fn session_for(name: &str) -> Arc<Session> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();
        // The client end may drop; these tests never read the stream.
        drop(client);

        let conn = Arc::new(Connection::new(server_side, DEFAULT_RECV_BUFFER).unwrap());
        let key = fixture_key().public().clone();
        let exported = key.export();
        Arc::new(Session::new(conn, user(name), key, exported))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let directory = Directory::new();
        let alice = session_for("alice").await;
        assert!(directory.register(Arc::clone(&alice)).is_none());

        assert_eq!(directory.len(), 1);
        let found = directory.lookup(&user("alice")).unwrap();
        assert_eq!(found.addr(), alice.addr());
        assert!(directory.lookup(&user("bob")).is_none());
    }

    #[tokio::test]
    async fn test_relogin_replaces_session() {
        let directory = Directory::new();
        let first = session_for("alice").await;
        let second = session_for("alice").await;

        directory.register(Arc::clone(&first));
        let replaced = directory.register(Arc::clone(&second)).unwrap();
        assert_eq!(replaced.addr(), first.addr());

        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.lookup(&user("alice")).unwrap().addr(),
            second.addr()
        );
    }

    #[tokio::test]
    async fn test_remove_exactly_once() {
        let directory = Directory::new();
        let alice = session_for("alice").await;
        let addr = alice.addr();
        directory.register(alice);

        assert!(directory.remove_by_addr(addr).is_some());
        assert!(directory.remove_by_addr(addr).is_none());
        assert!(directory.lookup(&user("alice")).is_none());
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_stale_removal_keeps_new_login() {
        let directory = Directory::new();
        let first = session_for("alice").await;
        let second = session_for("alice").await;
        let first_addr = first.addr();

        directory.register(first);
        directory.register(Arc::clone(&second));

        // Tearing down the replaced session must not evict the new one.
        directory.remove_by_addr(first_addr);
        assert_eq!(
            directory.lookup(&user("alice")).unwrap().addr(),
            second.addr()
        );
    }

    #[tokio::test]
    async fn test_snapshot_lists_every_session() {
        let directory = Directory::new();
        directory.register(session_for("alice").await);
        directory.register(session_for("bob").await);

        let mut names: Vec<String> = directory
            .snapshot()
            .into_iter()
            .map(|(name, _)| name.as_str().to_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["alice", "bob"]);
    }
}
