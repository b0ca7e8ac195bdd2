// ============================================
// File: crates/peerlink-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Sessions track last activity and event/exception records carry
//! timestamps; both need cheap concurrent access.
//!
//! ## Main Functionality
//! - `AtomicInstant`: Thread-safe wrapper around `Instant`
//! - `Timestamp`: Unix timestamp for event and exception records
//!
//! ## ⚠️ Important Note for Next Developer
//! - `AtomicInstant` uses `AtomicU64` internally (nanoseconds since a
//!   process-wide reference instant)
//! - Be aware of potential overflow after ~584 years of uptime
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for concurrent access.
///
/// Stores nanoseconds elapsed since a reference instant (program start)
/// in an `AtomicU64` with relaxed ordering, so workers can stamp
/// activity without locks.
///
/// # Example
/// ```
/// use peerlink_common::time::AtomicInstant;
/// use std::time::Instant;
///
/// let atomic = AtomicInstant::now();
/// atomic.store(Instant::now());
/// let _ = atomic.elapsed();
/// ```
#[derive(Debug)]
pub struct AtomicInstant {
    /// Nanoseconds since the reference instant
    nanos: AtomicU64,
}

impl AtomicInstant {
    /// Reference instant (lazily initialized at program start).
    fn reference() -> Instant {
        use std::sync::OnceLock;
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Creates a new `AtomicInstant` from an `Instant`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        let reference = Self::reference();
        let nanos = instant
            .checked_duration_since(reference)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        let nanos = self.nanos.load(Ordering::Relaxed);
        Self::reference() + Duration::from_nanos(nanos)
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        let reference = Self::reference();
        let nanos = instant
            .checked_duration_since(reference)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.nanos.store(nanos, Ordering::Relaxed);
    }

    /// Updates to the current time and returns the previous value.
    pub fn touch(&self) -> Instant {
        let old = self.load();
        self.store(Instant::now());
        old
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }

    /// Checks if more than `duration` has elapsed since the stored instant.
    #[must_use]
    pub fn has_elapsed(&self, duration: Duration) -> bool {
        self.elapsed() > duration
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

impl Clone for AtomicInstant {
    fn clone(&self) -> Self {
        Self {
            nanos: AtomicU64::new(self.nanos.load(Ordering::Relaxed)),
        }
    }
}

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in milliseconds, used in event and exception records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp for the current time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System time before Unix epoch")
            .as_millis() as i64;
        Self(millis)
    }

    /// Returns the Unix timestamp in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_atomic_instant_basic() {
        let atomic = AtomicInstant::now();
        let loaded = atomic.load();
        assert!(loaded.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_atomic_instant_store() {
        let atomic = AtomicInstant::now();
        thread::sleep(Duration::from_millis(10));

        let before = atomic.load();
        atomic.store(Instant::now());
        let after = atomic.load();

        assert!(after > before);
    }

    #[test]
    fn test_atomic_instant_elapsed() {
        let atomic = AtomicInstant::now();
        thread::sleep(Duration::from_millis(10));

        assert!(atomic.elapsed() >= Duration::from_millis(10));
        assert!(atomic.has_elapsed(Duration::from_millis(5)));
    }

    #[test]
    fn test_timestamp_ordering() {
        let a = Timestamp::now();
        thread::sleep(Duration::from_millis(5));
        let b = Timestamp::now();
        assert!(b > a);
    }
}
