//! Monotonic time source, swappable for deterministic tests.
//!
//! Production code drives everything off [`SystemClock`], which is a thin
//! wrapper over `slopos_lib::clock::uptime_ms`. Tests use [`FakeClock`], an
//! atomic tick counter advanced explicitly, so timer-dependent scenarios
//! (§8 of the cache's design) don't need wall-clock sleeps.

use core::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since an arbitrary epoch fixed at boot.
pub type Millis = u64;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Millis;
}

pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> Millis {
        slopos_lib::clock::uptime_ms()
    }
}

pub struct FakeClock {
    ms: AtomicU64,
}

impl FakeClock {
    pub const fn new() -> Self {
        Self {
            ms: AtomicU64::new(0),
        }
    }

    pub fn set(&self, ms: Millis) {
        self.ms.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: Millis) {
        self.ms.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for FakeClock {
    #[inline]
    fn now_ms(&self) -> Millis {
        self.ms.load(Ordering::Relaxed)
    }
}
