use chrono::Utc;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// Defines how a component determines the current time, in integer nanoseconds
/// since the Unix epoch.
///
/// The clock is a first-class injected dependency: live services use
/// [`LiveClock`], deterministic tests substitute a [`SteppedClock`].
pub trait Clock: Send + Sync {
    fn now_ns(&self) -> i64;
}

/// Live clock over `Utc::now()`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn now_ns(&self) -> i64 {
        // Only out of range beyond the year 2262.
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct SteppedClock {
    now_ns: Arc<AtomicI64>,
}

impl SteppedClock {
    pub fn new(start_ns: i64) -> Self {
        Self {
            now_ns: Arc::new(AtomicI64::new(start_ns)),
        }
    }

    pub fn advance(&self, delta_ns: i64) {
        self.now_ns.fetch_add(delta_ns, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(secs * 1_000_000_000);
    }

    pub fn set(&self, ts_ns: i64) {
        self.now_ns.store(ts_ns, Ordering::SeqCst);
    }
}

impl Clock for SteppedClock {
    fn now_ns(&self) -> i64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}
