//! Clock Abstraction
//!
//! Drop expiration is computed and checked against this clock so that the
//! registry runs on wall time in production and on virtual time in tests
//! and simulation.
//!
//! - `ProductionClock`: real system time (Unix milliseconds)
//! - `SimulatedClock`: only moves when `advance_ms()` or `set()` is called

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Absolute timestamp in Unix milliseconds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn saturating_sub(&self, other: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }

    /// True once `now` has reached this timestamp.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now >= *self
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

/// Source of the current time
pub trait Clock: Send + Sync + Clone + 'static {
    /// Get current time
    fn now(&self) -> Timestamp;

    /// Get elapsed time since a previous timestamp
    fn elapsed(&self, since: Timestamp) -> Duration {
        self.now().saturating_sub(since)
    }
}

/// Production clock using real system time
#[derive(Clone)]
pub struct ProductionClock {
    start: Instant,
    start_millis: u64,
}

impl Default for ProductionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionClock {
    pub fn new() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        // A clock set before 1970 reads as the epoch.
        let start_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        ProductionClock {
            start: Instant::now(),
            start_millis,
        }
    }
}

impl Clock for ProductionClock {
    fn now(&self) -> Timestamp {
        let elapsed = self.start.elapsed().as_millis() as u64;
        Timestamp(self.start_millis + elapsed)
    }
}

/// Simulated clock for deterministic testing
///
/// Clones share the same underlying time.
#[derive(Clone)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    /// Create a new simulated clock starting at the given time
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as u64);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }

    pub fn current_ms(&self) -> u64 {
        self.time_ms.load(Ordering::SeqCst)
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.time_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_clock_advances() {
        let clock = ProductionClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1, "Time should advance");
        assert!(t2.0 - t1.0 >= 10, "Should have elapsed at least 10ms");
    }

    #[test]
    fn test_simulated_clock_deterministic() {
        let clock = SimulatedClock::new(1000);

        assert_eq!(clock.now(), clock.now(), "Time should not advance on its own");

        clock.advance_ms(100);
        assert_eq!(clock.now().0, 1100);

        clock.set(5000);
        assert_eq!(clock.now().0, 5000);
    }

    #[test]
    fn test_simulated_clock_shared() {
        let clock = SimulatedClock::new(0);
        let clock2 = clock.clone();

        clock.advance(Duration::from_millis(100));
        assert_eq!(clock2.now().0, 100, "Clones should share state");
        assert_eq!(clock2.elapsed(Timestamp::ZERO), Duration::from_millis(100));
    }

    #[test]
    fn test_expiration_boundary() {
        let expiration = Timestamp::from_millis(1000) + Duration::from_millis(500);
        assert_eq!(expiration.as_millis(), 1500);

        assert!(!expiration.has_passed(Timestamp(1499)));
        assert!(expiration.has_passed(Timestamp(1500)));
        assert!(expiration.has_passed(Timestamp(1501)));
    }
}
