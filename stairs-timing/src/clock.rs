use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of `created_at` stamps for trial records
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Nanoseconds since the Unix epoch. Stamps stay comparable across process
/// restarts, unlike an `Instant`-based clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64)
    }
}

/// Advances by a fixed step on every read, so stamps are distinct and
/// reproducible.
#[derive(Debug)]
pub struct ManualClock {
    ticks: AtomicU64,
    step: u64,
}

impl ManualClock {
    pub fn new(step: u64) -> Self {
        Self {
            ticks: AtomicU64::new(0),
            step,
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.fetch_add(self.step, Ordering::Relaxed) + self.step
    }
}
