//! Time sources for the buffer.
//!
//! Span timing uses a monotonic millisecond clock (the `performance.now()`
//! of the buffer); metrics, logs and flushes are stamped with wall-clock time.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock's origin. Never decreases.
    fn monotonic_ms(&self) -> f64;

    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time: `Instant` for spans, `Utc::now()` for timestamps.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<(f64, DateTime<Utc>)>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new((0.0, start)),
        }
    }

    /// Move both the monotonic and wall clocks forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.0 += by.as_secs_f64() * 1000.0;
        state.1 += ChronoDuration::from_std(by).unwrap_or(ChronoDuration::zero());
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> f64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.monotonic_ms();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.monotonic_ms();
        assert!(b >= a + 1.0);
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.monotonic_ms(), 0.0);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.monotonic_ms(), 250.0);
        assert_eq!(clock.now() - start, ChronoDuration::milliseconds(250));
    }
}
