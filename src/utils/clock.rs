//! Injectable wall-clock so time-slot and freshness logic stays deterministic in tests.

use chrono::{DateTime, Utc};

/// Anything that can report "now". Production code uses [`SystemClock`];
/// tests pin a [`FixedClock`] instead of sprinkling `Utc::now()` everywhere.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed point in time, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
