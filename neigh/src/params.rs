//! Per-(table, interface) tunables.
//!
//! Refcounted via `Arc` so entries created against an interface's parameter
//! set keep it alive independent of the interface's own lifetime; `dead`
//! gates further entry creation once the interface is torn down.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::time::Millis;

/// Tunables for one (table, interface) pair. Individual fields are atomics
/// so they can be adjusted live by the admin surface without a table-wide lock.
pub struct Parameters {
    pub base_reachable_time_ms: AtomicU64,
    /// Current randomized reachable timeout, resampled every 300s.
    pub reachable_time_ms: AtomicU64,
    pub retrans_time_ms: AtomicU64,
    pub gc_staletime_ms: AtomicU64,
    pub delay_probe_time_ms: AtomicU64,
    pub queue_len: AtomicU32,
    pub ucast_probes: AtomicU32,
    pub mcast_probes: AtomicU32,
    pub app_probes: AtomicU32,
    pub proxy_delay_ms: AtomicU64,
    pub proxy_qlen: AtomicU32,
    pub locktime_ms: AtomicU64,
    /// Once set, no further entries may be created against this parameter set.
    pub dead: AtomicBool,
}

impl Parameters {
    pub const DEFAULT_BASE_REACHABLE_MS: u64 = 30_000;
    pub const DEFAULT_RETRANS_MS: u64 = 1_000;
    pub const DEFAULT_GC_STALETIME_MS: u64 = 60_000;
    pub const DEFAULT_DELAY_PROBE_MS: u64 = 5_000;
    pub const DEFAULT_QUEUE_LEN: u32 = 3;
    pub const DEFAULT_UCAST_PROBES: u32 = 3;
    pub const DEFAULT_MCAST_PROBES: u32 = 3;
    pub const DEFAULT_APP_PROBES: u32 = 0;
    pub const DEFAULT_PROXY_DELAY_MS: u64 = 800;
    pub const DEFAULT_PROXY_QLEN: u32 = 64;
    pub const DEFAULT_LOCKTIME_MS: u64 = 1_000;

    pub fn defaults() -> Self {
        Self {
            base_reachable_time_ms: AtomicU64::new(Self::DEFAULT_BASE_REACHABLE_MS),
            reachable_time_ms: AtomicU64::new(Self::DEFAULT_BASE_REACHABLE_MS),
            retrans_time_ms: AtomicU64::new(Self::DEFAULT_RETRANS_MS),
            gc_staletime_ms: AtomicU64::new(Self::DEFAULT_GC_STALETIME_MS),
            delay_probe_time_ms: AtomicU64::new(Self::DEFAULT_DELAY_PROBE_MS),
            queue_len: AtomicU32::new(Self::DEFAULT_QUEUE_LEN),
            ucast_probes: AtomicU32::new(Self::DEFAULT_UCAST_PROBES),
            mcast_probes: AtomicU32::new(Self::DEFAULT_MCAST_PROBES),
            app_probes: AtomicU32::new(Self::DEFAULT_APP_PROBES),
            proxy_delay_ms: AtomicU64::new(Self::DEFAULT_PROXY_DELAY_MS),
            proxy_qlen: AtomicU32::new(Self::DEFAULT_PROXY_QLEN),
            locktime_ms: AtomicU64::new(Self::DEFAULT_LOCKTIME_MS),
            dead: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn base_reachable_time(&self) -> Millis {
        self.base_reachable_time_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn reachable_time(&self) -> Millis {
        self.reachable_time_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn retrans_time(&self) -> Millis {
        self.retrans_time_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn gc_staletime(&self) -> Millis {
        self.gc_staletime_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn delay_probe_time(&self) -> Millis {
        self.delay_probe_time_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed) as usize
    }
    #[inline]
    pub fn ucast_probes(&self) -> u32 {
        self.ucast_probes.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn mcast_probes(&self) -> u32 {
        self.mcast_probes.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn app_probes(&self) -> u32 {
        self.app_probes.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn proxy_delay(&self) -> Millis {
        self.proxy_delay_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn proxy_qlen(&self) -> usize {
        self.proxy_qlen.load(Ordering::Relaxed) as usize
    }
    #[inline]
    pub fn locktime(&self) -> Millis {
        self.locktime_ms.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Relaxed)
    }
    #[inline]
    pub fn mark_dead(&self) {
        self.dead.store(true, Ordering::Relaxed);
    }

    /// Initial probe budget for entries that have never been confirmed
    /// (unicast + broadcast + app probes, per §9's compound gate).
    #[inline]
    pub fn incomplete_probe_budget(&self) -> u32 {
        self.ucast_probes() + self.mcast_probes() + self.app_probes()
    }

    /// Resample `reachable_time` into `[base/2, base*3/2]`. Called every 300s
    /// by the periodic GC sweep, and at creation of a fresh `Parameters`.
    pub fn resample_reachable_time(&self) {
        let base = self.base_reachable_time();
        let half = base / 2;
        let span = base.saturating_sub(half).max(1);
        let jitter = slopos_lib::kernel_services::platform::rng_next() % (span + 1);
        self.reachable_time_ms.store(half + jitter, Ordering::Relaxed);
    }
}
