//! Per-CPU statistics, written without locking and summed on read.

use core::sync::atomic::{AtomicU64, Ordering};

use slopos_lib::cpu_local;

#[derive(Default)]
pub struct TableStatsCounters {
    pub allocs: AtomicU64,
    pub destroys: AtomicU64,
    pub res_failed: AtomicU64,
    pub unresolved_discards: AtomicU64,
    pub lookups: AtomicU64,
    pub hits: AtomicU64,
    pub periodic_gc_deleted: AtomicU64,
    pub forced_gc_deleted: AtomicU64,
    pub table_fulls: AtomicU64,
    pub proxy_dispatched: AtomicU64,
}

cpu_local! {
    static NEIGH_STATS: TableStatsCounters = TableStatsCounters {
        allocs: AtomicU64::new(0),
        destroys: AtomicU64::new(0),
        res_failed: AtomicU64::new(0),
        unresolved_discards: AtomicU64::new(0),
        lookups: AtomicU64::new(0),
        hits: AtomicU64::new(0),
        periodic_gc_deleted: AtomicU64::new(0),
        forced_gc_deleted: AtomicU64::new(0),
        table_fulls: AtomicU64::new(0),
        proxy_dispatched: AtomicU64::new(0),
    };
}

/// A read-summed snapshot of [`TableStatsCounters`] across all CPUs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub allocs: u64,
    pub destroys: u64,
    pub res_failed: u64,
    pub unresolved_discards: u64,
    pub lookups: u64,
    pub hits: u64,
    pub periodic_gc_deleted: u64,
    pub forced_gc_deleted: u64,
    pub table_fulls: u64,
    pub proxy_dispatched: u64,
}

macro_rules! bump {
    ($field:ident) => {
        pub fn $field() {
            NEIGH_STATS
                .get()
                .$field
                .fetch_add(1, Ordering::Relaxed);
        }
    };
}

bump!(allocs);
bump!(destroys);
bump!(res_failed);
bump!(unresolved_discards);
bump!(lookups);
bump!(hits);
bump!(periodic_gc_deleted);
bump!(forced_gc_deleted);
bump!(table_fulls);
bump!(proxy_dispatched);

/// Sum per-CPU counters into a single snapshot. Racy by nature (counters
/// keep moving while summed); acceptable for diagnostics.
pub fn snapshot() -> TableStats {
    let mut out = TableStats::default();
    for cpu in 0..slopos_lib::percpu::get_cpu_count() {
        // SAFETY: only reading a foreign CPU's slot for a diagnostic sum;
        // atomics make the individual loads safe regardless of ownership.
        let counters = unsafe { NEIGH_STATS.get_for_cpu(cpu) };
        out.allocs += counters.allocs.load(Ordering::Relaxed);
        out.destroys += counters.destroys.load(Ordering::Relaxed);
        out.res_failed += counters.res_failed.load(Ordering::Relaxed);
        out.unresolved_discards += counters.unresolved_discards.load(Ordering::Relaxed);
        out.lookups += counters.lookups.load(Ordering::Relaxed);
        out.hits += counters.hits.load(Ordering::Relaxed);
        out.periodic_gc_deleted += counters.periodic_gc_deleted.load(Ordering::Relaxed);
        out.forced_gc_deleted += counters.forced_gc_deleted.load(Ordering::Relaxed);
        out.table_fulls += counters.table_fulls.load(Ordering::Relaxed);
        out.proxy_dispatched += counters.proxy_dispatched.load(Ordering::Relaxed);
    }
    out
}
