// ============================================
// File: crates/peerlink-transport/src/events.rs
// ============================================
//! # Event Hub
//!
//! ## Creation Reason
//! The transport surfaces everything that happens on the socket as a
//! stream of events a caller can wait on: received data, connection
//! state changes and background exceptions.
//!
//! ## Main Functionality
//! - `EventHub<T>`: accumulates events and wakes waiters
//! - `TransportEvent<T>`: what `await_event` hands back
//! - `ExceptionRecord`: a captured background error with context
//!
//! ## Main Logical Flow
//! 1. Worker tasks push events as they happen
//! 2. `await_event` returns the oldest pending event kind, draining
//!    every entry of that kind at once
//! 3. On timeout a `Timeout` event is returned rather than an error
//!
//! ## ⚠️ Important Note for Next Developer
//! - The hub is generic over the inbound item so the secure layer can
//!   reuse it with decoded messages instead of raw byte frames
//! - Ordering between kinds is arrival order of the FIRST entry of each
//!   kind; entries of one kind are drained together
//!
//! ## Last Modified
//! v0.1.0 - Initial event hub

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use peerlink_common::time::Timestamp;

// ============================================
// Event Types
// ============================================

/// Internal tag for ordering pending event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Received,
    Exception,
    Connected,
    Disconnected,
}

/// One event handed back by [`EventHub::await_event`].
#[derive(Debug)]
pub enum TransportEvent<T> {
    /// Inbound items, oldest first.
    Received(Vec<T>),
    /// Background errors captured since the last drain.
    Exception(Vec<ExceptionRecord>),
    /// A peer connected.
    Connected,
    /// A peer disconnected.
    Disconnected,
    /// Nothing happened within the wait window.
    Timeout,
}

/// A background error captured by a worker task.
///
/// The error is boxed so layers above the transport can report their
/// own error types through the same hub.
#[derive(Debug)]
pub struct ExceptionRecord {
    /// What the worker was doing.
    pub context: String,
    /// The captured error.
    pub error: Box<dyn std::error::Error + Send + Sync>,
    /// When it was captured.
    pub at: Timestamp,
}

impl ExceptionRecord {
    /// Captures an error with context, stamped now.
    pub fn new(
        context: impl Into<String>,
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            context: context.into(),
            error: error.into(),
            at: Timestamp::now(),
        }
    }
}

// ============================================
// EventHub
// ============================================

#[derive(Debug, Default)]
struct HubState<T> {
    order: VecDeque<EventKind>,
    inbox: Vec<T>,
    exceptions: Vec<ExceptionRecord>,
    connected: usize,
    disconnected: usize,
}

/// Accumulates transport events and wakes waiters.
///
/// # Thread Safety
/// Cloneable handle; all clones share the same state.
#[derive(Debug)]
pub struct EventHub<T> {
    state: Arc<Mutex<HubState<T>>>,
    notify: Arc<Notify>,
}

impl<T> Clone for EventHub<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHub<T> {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                order: VecDeque::new(),
                inbox: Vec::new(),
                exceptions: Vec::new(),
                connected: 0,
                disconnected: 0,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    // ========================================
    // Producers
    // ========================================

    /// Pushes an inbound item.
    pub fn push_received(&self, item: T) {
        let mut state = self.state.lock();
        if state.inbox.is_empty() {
            state.order.push_back(EventKind::Received);
        }
        state.inbox.push(item);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Captures a background error.
    pub fn push_exception(&self, record: ExceptionRecord) {
        let mut state = self.state.lock();
        if state.exceptions.is_empty() {
            state.order.push_back(EventKind::Exception);
        }
        state.exceptions.push(record);
        drop(state);
        self.notify.notify_waiters();
    }

    /// Records a peer connection.
    pub fn push_connected(&self) {
        let mut state = self.state.lock();
        if state.connected == 0 {
            state.order.push_back(EventKind::Connected);
        }
        state.connected += 1;
        drop(state);
        self.notify.notify_waiters();
    }

    /// Records a peer disconnection.
    pub fn push_disconnected(&self) {
        let mut state = self.state.lock();
        if state.disconnected == 0 {
            state.order.push_back(EventKind::Disconnected);
        }
        state.disconnected += 1;
        drop(state);
        self.notify.notify_waiters();
    }

    // ========================================
    // Consumers
    // ========================================

    /// Waits for the next pending event, up to `timeout`.
    ///
    /// Returns [`TransportEvent::Timeout`] if nothing arrives in time.
    pub async fn await_event(&self, timeout: Duration) -> TransportEvent<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.pop_event() {
                return event;
            }
            let notified = self.notify.notified();
            // Re-check after arming the waiter so a push between the
            // first check and `notified()` is not lost.
            if let Some(event) = self.pop_event() {
                return event;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return match self.pop_event() {
                    Some(event) => event,
                    None => TransportEvent::Timeout,
                };
            }
        }
    }

    /// Pops the oldest pending event without waiting.
    pub fn pop_event(&self) -> Option<TransportEvent<T>> {
        let mut state = self.state.lock();
        let kind = state.order.pop_front()?;
        Some(match kind {
            EventKind::Received => TransportEvent::Received(std::mem::take(&mut state.inbox)),
            EventKind::Exception => {
                TransportEvent::Exception(std::mem::take(&mut state.exceptions))
            }
            EventKind::Connected => {
                state.connected = 0;
                TransportEvent::Connected
            }
            EventKind::Disconnected => {
                state.disconnected = 0;
                TransportEvent::Disconnected
            }
        })
    }

    /// Drains captured exceptions without consuming other events.
    pub fn drain_exceptions(&self) -> Vec<ExceptionRecord> {
        let mut state = self.state.lock();
        state.order.retain(|kind| *kind != EventKind::Exception);
        std::mem::take(&mut state.exceptions)
    }

    /// Returns the number of inbound items waiting.
    #[must_use]
    pub fn pending_received(&self) -> usize {
        self.state.lock().inbox.len()
    }

    /// Discards every pending event.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.order.clear();
        state.inbox.clear();
        state.exceptions.clear();
        state.connected = 0;
        state.disconnected = 0;
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_received_drains_together() {
        let hub: EventHub<Vec<u8>> = EventHub::new();
        hub.push_received(b"one".to_vec());
        hub.push_received(b"two".to_vec());

        match hub.await_event(Duration::from_millis(50)).await {
            TransportEvent::Received(items) => {
                assert_eq!(items, vec![b"one".to_vec(), b"two".to_vec()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(hub.pop_event().is_none());
    }

    #[tokio::test]
    async fn test_event_kind_ordering() {
        let hub: EventHub<Vec<u8>> = EventHub::new();
        hub.push_connected();
        hub.push_received(b"data".to_vec());

        assert!(matches!(
            hub.await_event(Duration::from_millis(50)).await,
            TransportEvent::Connected
        ));
        assert!(matches!(
            hub.await_event(Duration::from_millis(50)).await,
            TransportEvent::Received(_)
        ));
    }

    #[tokio::test]
    async fn test_timeout_when_empty() {
        let hub: EventHub<Vec<u8>> = EventHub::new();
        assert!(matches!(
            hub.await_event(Duration::from_millis(10)).await,
            TransportEvent::Timeout
        ));
    }

    #[tokio::test]
    async fn test_wakes_concurrent_waiter() {
        let hub: EventHub<Vec<u8>> = EventHub::new();
        let waiter = hub.clone();
        let handle = tokio::spawn(async move {
            waiter.await_event(Duration::from_secs(5)).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        hub.push_received(b"late".to_vec());

        match handle.await.unwrap() {
            TransportEvent::Received(items) => assert_eq!(items, vec![b"late".to_vec()]),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drain_exceptions() {
        let hub: EventHub<Vec<u8>> = EventHub::new();
        hub.push_exception(ExceptionRecord::new(
            "receive loop",
            crate::error::TransportError::NotConnected,
        ));
        hub.push_received(b"still here".to_vec());

        let drained = hub.drain_exceptions();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].context, "receive loop");

        // The received event must survive the drain.
        assert!(matches!(
            hub.await_event(Duration::from_millis(50)).await,
            TransportEvent::Received(_)
        ));
    }
}
