// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide monotonic-seconds clock.
//!
//! Expiry comparisons only need second resolution and, per spec, should
//! only advance once per event-loop tick rather than on every lookup —
//! querying the OS clock per-operation would put a syscall on the hot
//! path for no benefit at this granularity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic seconds-since-start counter, refreshed explicitly by the
/// worker loop.
pub struct Clock {
    epoch: Instant,
    now_secs: AtomicU64,
}

impl Clock {
    /// Create a clock anchored at the current instant; `now()` reads 0
    /// until the first [`Clock::tick`].
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            now_secs: AtomicU64::new(0),
        }
    }

    /// Refresh the cached value from the system monotonic clock. Called
    /// once per event-loop iteration, never from within request
    /// processing.
    pub fn tick(&self) {
        let secs = self.epoch.elapsed().as_secs();
        self.now_secs.store(secs, Ordering::Relaxed);
    }

    /// Current cached value, as seconds since this clock's construction.
    pub fn now(&self) -> u64 {
        self.now_secs.load(Ordering::Relaxed)
    }

    /// Whether `expiry` (0 = never, otherwise absolute seconds on this
    /// clock) has passed as of the last `tick`.
    pub fn is_expired(&self, expiry: u64) -> bool {
        expiry != 0 && expiry <= self.now()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn never_expires_at_zero() {
        let clock = Clock::new();
        clock.tick();
        assert!(!clock.is_expired(0));
    }

    #[test]
    fn expiry_in_the_past_is_expired() {
        let clock = Clock::new();
        clock.tick();
        assert!(clock.is_expired(1));
    }

    #[test]
    fn expiry_in_the_future_is_not_expired() {
        let clock = Clock::new();
        clock.tick();
        assert!(!clock.is_expired(u64::MAX));
    }

    #[test]
    fn tick_advances_granularity_is_per_call_not_per_read() {
        let clock = Clock::new();
        clock.tick();
        let a = clock.now();
        sleep(Duration::from_millis(5));
        let b = clock.now();
        assert_eq!(a, b, "now() must not advance without an explicit tick()");
    }
}
