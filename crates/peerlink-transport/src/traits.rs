// ============================================
// File: crates/peerlink-transport/src/traits.rs
// ============================================
//! # Transport Hooks
//!
//! ## Creation Reason
//! Defines the extension points the secure layer plugs into, so the
//! plain TCP engine stays free of protocol knowledge and can be tested
//! on its own.
//!
//! ## Main Functionality
//! - `ServerHooks`: per-connection lifecycle callbacks on the server
//! - `ClientHooks`: inbound/lifecycle callbacks on the client
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ServerHooks::on_connect` runs to completion BEFORE the worker
//!   task starts reading; a handshake performed inside it owns the
//!   stream exclusively
//! - Returning `Ok(false)` from `on_connect` rejects the peer without
//!   surfacing an error
//!
//! ## Last Modified
//! v0.1.0 - Initial hook traits

use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::Result;

// ============================================
// ServerHooks
// ============================================

/// Per-connection callbacks invoked by the TCP server engine.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the engine shares one
/// instance across every worker task.
#[async_trait]
pub trait ServerHooks: Send + Sync {
    /// Called once for each accepted connection, before its worker
    /// starts reading.
    ///
    /// Return `Ok(false)` to reject the peer; the engine closes the
    /// connection and never registers it.
    ///
    /// # Errors
    /// An error also rejects the peer and is captured as an exception.
    async fn on_connect(&self, conn: &Arc<Connection>) -> Result<bool> {
        let _ = conn;
        Ok(true)
    }

    /// Called for every message a worker reads off a registered
    /// connection.
    ///
    /// Return `true` to also queue the message as a received event,
    /// `false` to swallow it.
    ///
    /// # Errors
    /// Errors are captured as exceptions; the worker keeps running.
    async fn on_receive(&self, conn: &Arc<Connection>, message: &[u8]) -> Result<bool> {
        let _ = (conn, message);
        Ok(true)
    }

    /// Called exactly once when a registered connection goes away.
    async fn on_disconnect(&self, conn: &Arc<Connection>) {
        let _ = conn;
    }
}

/// Hooks implementation with every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopServerHooks;

#[async_trait]
impl ServerHooks for NoopServerHooks {}

// ============================================
// ClientHooks
// ============================================

/// Callbacks invoked by the TCP client's auto-receive task.
#[async_trait]
pub trait ClientHooks: Send + Sync {
    /// Called for every message the auto-receive task reads.
    ///
    /// Return `true` to also queue the message as a received event.
    ///
    /// # Errors
    /// Errors are captured as exceptions; the task keeps running.
    async fn on_receive(&self, message: &[u8]) -> Result<bool> {
        let _ = message;
        Ok(true)
    }

    /// Called once when the server side goes away.
    async fn on_disconnect(&self) {}
}

/// Hooks implementation with every default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClientHooks;

#[async_trait]
impl ClientHooks for NoopClientHooks {}
