// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Time source injected into the cache, so heat/recency computations can be
//! driven deterministically in tests instead of depending on wall-clock time.

/// Gets the unix timestamp in milliseconds
fn unix_timestamp_ms() -> u64 {
    let now = std::time::SystemTime::now();

    #[expect(clippy::expect_used, reason = "trivial")]
    let dur = now
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .expect("time went backwards");

    #[expect(clippy::cast_possible_truncation, reason = "not a problem until year 2554")]
    {
        dur.as_millis() as u64
    }
}

/// A source of the current time, injected into [`crate::TieredCache`]
///
/// See the spec's guidance on breaking cyclic references by defining narrow
/// interfaces (`ObjectStore`, `Clock`, `Metrics`) injected into the orchestrator.
pub trait Clock: Send + Sync {
    /// Current time, in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// The default [`Clock`], backed by [`std::time::SystemTime`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        unix_timestamp_ms()
    }
}

/// A [`Clock`] that only advances when told to, for deterministic tests
#[derive(Debug)]
pub struct ManualClock(std::sync::atomic::AtomicU64);

impl ManualClock {
    /// Creates a manual clock starting at the given millisecond timestamp
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(start_ms))
    }

    /// Advances the clock by `ms` milliseconds
    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, std::sync::atomic::Ordering::Relaxed);
    }

    /// Sets the clock to an absolute millisecond timestamp
    pub fn set(&self, ms: u64) {
        self.0.store(ms, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn system_clock_is_recent() {
        let clock = SystemClock;
        assert!(clock.now_ms() > 1_700_000_000_000);
    }
}
