// ============================================
// File: crates/peerlink-server/tests/secure_session.rs
// ============================================
//! End-to-end sessions against a live server: login, rejection,
//! peer-to-peer relay and orderly shutdown.

use std::sync::OnceLock;
use std::time::Duration;

use peerlink_client::{HandshakeOutcome, SecureClient};
use peerlink_common::types::Username;
use peerlink_core::KeyPair;
use peerlink_server::{SecureServer, ServerConfig};
use peerlink_transport::TransportEvent;

const EVENT_WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

fn client_keys(slot: usize) -> KeyPair {
    static PAIRS: OnceLock<Vec<KeyPair>> = OnceLock::new();
    PAIRS
        .get_or_init(|| (0..3).map(|_| KeyPair::generate(1024).unwrap()).collect())[slot]
        .clone()
}

async fn start_server(users: &[(&str, &str)]) -> (tempfile::TempDir, SecureServer) {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.network.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.crypto.key_bits = 1024;
    config.auth.credentials_path = dir.path().join("creds.json");

    let server = SecureServer::bind(config).await.unwrap();
    for (name, password) in users {
        server.credentials().add_user(&user(name), password);
    }
    server.start().await.unwrap();
    (dir, server)
}

#[tokio::test]
async fn valid_login_receives_directory_with_self() {
    let (_tmp, server) = start_server(&[("alice", "wonderland")]).await;

    let client = SecureClient::with_keys(client_keys(0));
    let outcome = client
        .connect(server.local_addr(), user("alice"), "wonderland")
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Authenticated);
    assert_eq!(client.connected_users(), vec![user("alice")]);
    assert!(client.peer_key(&user("alice")).is_some());
    assert_eq!(server.session_count(), 1);

    client.disconnect().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn wrong_password_is_rejected_and_not_listed() {
    let (_tmp, server) = start_server(&[("alice", "wonderland")]).await;

    let client = SecureClient::with_keys(client_keys(0));
    let outcome = client
        .connect(server.local_addr(), user("alice"), "through the looking glass")
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Rejected);
    assert!(!client.is_connected());
    assert_eq!(server.session_count(), 0);

    server.shutdown().await;
}

#[tokio::test]
async fn unknown_user_is_rejected() {
    let (_tmp, server) = start_server(&[("alice", "wonderland")]).await;

    let client = SecureClient::with_keys(client_keys(0));
    let outcome = client
        .connect(server.local_addr(), user("mallory"), "wonderland")
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Rejected);
    server.shutdown().await;
}

#[tokio::test]
async fn relay_delivers_between_peers() {
    let (_tmp, server) = start_server(&[("alice", "pw-a"), ("bob", "pw-b")]).await;

    let alice = SecureClient::with_keys(client_keys(0));
    assert_eq!(
        alice
            .connect(server.local_addr(), user("alice"), "pw-a")
            .await
            .unwrap(),
        HandshakeOutcome::Authenticated
    );

    let bob = SecureClient::with_keys(client_keys(1));
    assert_eq!(
        bob.connect(server.local_addr(), user("bob"), "pw-b")
            .await
            .unwrap(),
        HandshakeOutcome::Authenticated
    );

    // Alice needs the broadcast that includes bob before she can seal
    // for him.
    let deadline = tokio::time::Instant::now() + EVENT_WAIT;
    while alice.peer_key(&user("bob")).is_none() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "directory update never reached alice"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    alice
        .send_to(&user("bob"), b"msg", b"Does this work?")
        .await
        .unwrap();

    loop {
        match bob.await_event(EVENT_WAIT).await {
            TransportEvent::Received(messages) => {
                assert_eq!(messages[0].kind, b"msg");
                assert_eq!(messages[0].payload, b"Does this work?");
                break;
            }
            TransportEvent::Connected => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    alice.disconnect().await.unwrap();
    bob.disconnect().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn server_receives_server_addressed_messages() {
    let (_tmp, server) = start_server(&[("alice", "wonderland")]).await;

    let client = SecureClient::with_keys(client_keys(0));
    client
        .connect(server.local_addr(), user("alice"), "wonderland")
        .await
        .unwrap();

    client.send_to_server(b"status", b"ping").await.unwrap();

    loop {
        match server.await_event(EVENT_WAIT).await {
            TransportEvent::Received(messages) => {
                assert_eq!(messages[0].from, user("alice"));
                assert_eq!(messages[0].kind, b"status");
                assert_eq!(messages[0].payload, b"ping");
                break;
            }
            TransportEvent::Connected => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    client.disconnect().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn disconnect_updates_remaining_peers() {
    let (_tmp, server) = start_server(&[("alice", "pw-a"), ("bob", "pw-b")]).await;

    let alice = SecureClient::with_keys(client_keys(0));
    alice
        .connect(server.local_addr(), user("alice"), "pw-a")
        .await
        .unwrap();
    let bob = SecureClient::with_keys(client_keys(1));
    bob.connect(server.local_addr(), user("bob"), "pw-b")
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + EVENT_WAIT;
    while alice.peer_key(&user("bob")).is_none() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    bob.disconnect().await.unwrap();

    // The next broadcast drops bob from alice's map.
    let deadline = tokio::time::Instant::now() + EVENT_WAIT;
    while alice.peer_key(&user("bob")).is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "bob never left alice's directory"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.session_count(), 1);

    alice.disconnect().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn shutdown_joins_all_workers_in_time() {
    let (_tmp, server) = start_server(&[("alice", "pw-a"), ("bob", "pw-b"), ("carol", "pw-c")])
        .await;

    let mut clients = Vec::new();
    for (slot, (name, password)) in
        [("alice", "pw-a"), ("bob", "pw-b"), ("carol", "pw-c")].iter().enumerate()
    {
        let client = SecureClient::with_keys(client_keys(slot));
        assert_eq!(
            client
                .connect(server.local_addr(), user(name), password)
                .await
                .unwrap(),
            HandshakeOutcome::Authenticated
        );
        clients.push(client);
    }
    assert_eq!(server.session_count(), 3);

    let started = std::time::Instant::now();
    server.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(10));

    // Every client observes the close.
    for client in &clients {
        loop {
            match client.await_event(EVENT_WAIT).await {
                TransportEvent::Disconnected => break,
                TransportEvent::Connected | TransportEvent::Received(_) => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
