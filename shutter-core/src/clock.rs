//! Clock provider for time abstraction.
//!
//! The runtime timestamps events in microseconds from an injected monotonic
//! clock. Tests use a manual clock with controllable time; emit APIs also
//! accept externally provided timestamps for hosts that keep their own
//! time base.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Provider trait for monotonic time.
pub trait Clock: Send + Sync {
    /// Microseconds elapsed since the clock's epoch.
    ///
    /// Must be monotonically non-decreasing for the life of the clock.
    fn now_micros(&self) -> u64;
}

/// Real clock measuring from its own creation instant.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

/// Manual clock for tests with controllable time.
///
/// Starts at zero and only moves when explicitly advanced.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock at the given microsecond timestamp.
    #[must_use]
    pub fn at(micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(micros),
        }
    }

    /// Advance the clock.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute microsecond timestamp.
    ///
    /// Callers are responsible for keeping the values non-decreasing.
    pub fn set(&self, micros: u64) {
        self.micros.store(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}
