//! Hash-bucket container of entries (§3/§4.1/§4.7): global parameters,
//! statistics, GC scheduling, proxy subsystem.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use slopos_lib::{IrqRwLock, klog_debug, klog_warn};

use crate::addr::{IfaceId, NeighKey, ProtoAddr};
use crate::entry::{Entry, NudState};
use crate::error::{NeighError, NeighResult};
use crate::events;
use crate::params::Parameters;
use crate::protocol::{OutputVariant, Protocol};
use crate::proxy::ProxyTable;
use crate::stats;
use crate::time::{Clock, Millis, SystemClock};
use crate::timer::TimerWheel;

pub const DEFAULT_GC_THRESH1: usize = 128;
pub const DEFAULT_GC_THRESH2: usize = 512;
pub const DEFAULT_GC_THRESH3: usize = 1024;

const INITIAL_BUCKETS: usize = 16;
/// Gate on repeated forced shrinks (§4.1 step 1).
const FORCED_GC_GATE_MS: Millis = 5_000;

struct Buckets<P: Protocol> {
    mask: usize,
    slots: Vec<Vec<Arc<Entry<P>>>>,
}

impl<P: Protocol> Buckets<P> {
    fn new(n: usize) -> Self {
        let mut slots = Vec::with_capacity(n);
        for _ in 0..n {
            slots.push(Vec::new());
        }
        Self { mask: n - 1, slots }
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

pub struct Table<P: Protocol> {
    pub name: &'static str,
    buckets: IrqRwLock<Buckets<P>>,
    count: core::sync::atomic::AtomicUsize,
    hash_key: u64,
    pub gc_thresh1: core::sync::atomic::AtomicUsize,
    pub gc_thresh2: core::sync::atomic::AtomicUsize,
    pub gc_thresh3: core::sync::atomic::AtomicUsize,
    last_forced_gc_ms: core::sync::atomic::AtomicU64,
    last_reachable_resample_ms: core::sync::atomic::AtomicU64,
    pub timers: TimerWheel,
    pub proxy: ProxyTable<P>,
    params_by_iface: IrqRwLock<BTreeMap<IfaceId, Arc<Parameters>>>,
    clock: &'static dyn Clock,
}

impl<P: Protocol> Table<P> {
    pub fn new(name: &'static str) -> Self {
        Self::with_clock(name, &SystemClock)
    }

    pub fn with_clock(name: &'static str, clock: &'static dyn Clock) -> Self {
        let seed = slopos_lib::kernel_services::platform::rng_next();
        Self {
            name,
            buckets: IrqRwLock::new(Buckets::new(INITIAL_BUCKETS)),
            count: core::sync::atomic::AtomicUsize::new(0),
            hash_key: seed,
            gc_thresh1: core::sync::atomic::AtomicUsize::new(DEFAULT_GC_THRESH1),
            gc_thresh2: core::sync::atomic::AtomicUsize::new(DEFAULT_GC_THRESH2),
            gc_thresh3: core::sync::atomic::AtomicUsize::new(DEFAULT_GC_THRESH3),
            last_forced_gc_ms: core::sync::atomic::AtomicU64::new(0),
            last_reachable_resample_ms: core::sync::atomic::AtomicU64::new(0),
            timers: TimerWheel::new(),
            proxy: ProxyTable::new(),
            params_by_iface: IrqRwLock::new(BTreeMap::new()),
            clock,
        }
    }

    #[inline]
    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(core::sync::atomic::Ordering::Relaxed)
    }

    pub(crate) fn dec_count(&self, n: usize) {
        self.count.fetch_sub(n, core::sync::atomic::Ordering::Relaxed);
    }

    /// Parameters for `iface`, created with defaults on first reference.
    pub fn params_for(&self, iface: IfaceId) -> Arc<Parameters> {
        {
            let map = self.params_by_iface.read();
            if let Some(p) = map.get(&iface) {
                return p.clone();
            }
        }
        let mut map = self.params_by_iface.write();
        map.entry(iface)
            .or_insert_with(|| {
                let p = Arc::new(Parameters::defaults());
                p.resample_reachable_time();
                p
            })
            .clone()
    }

    /// Mark an interface's parameter set dead, preventing new entry creation
    /// against it (called from `on_interface_down`, §4.8).
    pub fn retire_params(&self, iface: IfaceId) {
        let map = self.params_by_iface.read();
        if let Some(p) = map.get(&iface) {
            p.mark_dead();
        }
    }

    fn hash_key_addr(&self, addr: &ProtoAddr, iface: IfaceId) -> u64 {
        P::hash(addr, iface, self.hash_key)
    }

    /// `lookup(table, protocol_address, interface)` (§4.1).
    pub fn lookup(&self, addr: &ProtoAddr, iface: IfaceId) -> Option<Arc<Entry<P>>> {
        stats::lookups();
        let key = NeighKey::new(*addr, iface);
        let hash = self.hash_key_addr(addr, iface);
        let buckets = self.buckets.read();
        let idx = buckets.bucket_of(hash);
        let found = buckets.slots[idx]
            .iter()
            .find(|e| e.key == key && !e.is_dead())
            .cloned();
        if found.is_some() {
            stats::hits();
        }
        found
    }

    /// `create(table, protocol_address, interface)` (§4.1).
    pub fn create(
        &self,
        addr: &ProtoAddr,
        iface_id: IfaceId,
        iface: Arc<P::Interface>,
    ) -> NeighResult<Arc<Entry<P>>> {
        let thresh3 = self.gc_thresh3.load(core::sync::atomic::Ordering::Relaxed);
        let thresh2 = self.gc_thresh2.load(core::sync::atomic::Ordering::Relaxed);
        let now = self.now_ms();

        if self.len() >= thresh3 {
            self.forced_gc();
        } else if self.len() >= thresh2 {
            let last = self
                .last_forced_gc_ms
                .load(core::sync::atomic::Ordering::Relaxed);
            if now.saturating_sub(last) > FORCED_GC_GATE_MS {
                self.forced_gc();
            }
        }

        if self.len() >= thresh3 {
            stats::table_fulls();
            klog_warn!("neigh[{}]: create refused, table full ({})", self.name, self.len());
            return Err(NeighError::ResourceExhausted);
        }

        let params = self.params_for(iface_id);
        if params.is_dead() {
            return Err(NeighError::ParametersDead);
        }

        let key = NeighKey::new(*addr, iface_id);

        // Step 5/6 need the bucket lock held across the duplicate re-scan and
        // link, so take the write lock once and do the whole insert under it.
        let hash = self.hash_key_addr(addr, iface_id);
        let variant = OutputVariant::select(iface.as_ref());
        let fabricated = P::fabricate_l2(addr, iface.as_ref());
        let initial_state = if fabricated.is_some() {
            NudState::Noarp
        } else {
            NudState::None
        };

        let mut buckets = self.buckets.write();
        let idx = buckets.bucket_of(hash);
        if let Some(existing) = buckets.slots[idx].iter().find(|e| e.key == key && !e.is_dead()) {
            return Ok(existing.clone());
        }

        let entry = Arc::new(Entry::new(key, params, iface, variant, initial_state, now));
        if let Some(l2) = fabricated {
            let mut st = entry.write();
            st.ll_addr = l2;
            st.updated_ms = now;
        }

        buckets.slots[idx].push(entry.clone());
        let new_count = self.count.fetch_add(1, core::sync::atomic::Ordering::Relaxed) + 1;

        // §4.1 step 4: grow before the next create would overrun bucket width.
        if new_count > buckets.len() {
            self.grow_locked(&mut buckets);
        }

        stats::allocs();
        klog_debug!("neigh[{}]: created entry {:?}", self.name, key);
        Ok(entry)
    }

    fn grow_locked(&self, buckets: &mut Buckets<P>) {
        let new_n = buckets.len() * 2;
        let mut new_buckets = Buckets::<P>::new(new_n);
        for slot in buckets.slots.drain(..) {
            for entry in slot {
                let hash = self.hash_key_addr(&entry.key.addr, entry.key.iface);
                let idx = new_buckets.bucket_of(hash);
                new_buckets.slots[idx].push(entry);
            }
        }
        *buckets = new_buckets;
        klog_debug!("neigh[{}]: resized to {} buckets", self.name, new_n);
    }

    /// Remove `entry` from its bucket unconditionally (used by GC and
    /// explicit admin delete). Caller must have already cancelled the
    /// entry's timer.
    pub fn unlink(&self, key: &NeighKey) -> bool {
        let hash = self.hash_key_addr(&key.addr, key.iface);
        let mut buckets = self.buckets.write();
        let idx = buckets.bucket_of(hash);
        let slot = &mut buckets.slots[idx];
        if let Some(pos) = slot.iter().position(|e| e.key == *key) {
            slot.swap_remove(pos);
            self.count.fetch_sub(1, core::sync::atomic::Ordering::Relaxed);
            stats::destroys();
            true
        } else {
            false
        }
    }

    /// `delete(e)` admin surface entry point (§8 round-trip property).
    pub fn delete(&self, entry: &Arc<Entry<P>>) {
        self.timers.cancel(entry.write().timer);
        entry.mark_dead();
        self.unlink(&entry.key);
        events::on_delete(entry.key.addr, entry.key.iface);
    }

    /// Run a closure over every live entry in every bucket, used by GC sweeps
    /// and interface-down handling. Takes the write lock for the duration of
    /// one bucket at a time isn't modeled here directly — see `gc.rs` for the
    /// cooperative (per-bucket-lock-drop) periodic sweep.
    pub(crate) fn for_each_bucket_mut<F: FnMut(&mut Vec<Arc<Entry<P>>>)>(&self, mut f: F) {
        let mut buckets = self.buckets.write();
        for slot in buckets.slots.iter_mut() {
            f(slot);
        }
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    pub(crate) fn with_bucket_mut<F: FnMut(&mut Vec<Arc<Entry<P>>>)>(&self, idx: usize, mut f: F) {
        let mut buckets = self.buckets.write();
        if idx < buckets.slots.len() {
            f(&mut buckets.slots[idx]);
        }
    }

    pub(crate) fn resample_all_params(&self) {
        let map = self.params_by_iface.read();
        for p in map.values() {
            p.resample_reachable_time();
        }
    }

    pub(crate) fn mark_forced_gc_now(&self) {
        self.last_forced_gc_ms
            .store(self.now_ms(), core::sync::atomic::Ordering::Relaxed);
    }

    pub(crate) fn last_reachable_resample(&self) -> Millis {
        self.last_reachable_resample_ms
            .load(core::sync::atomic::Ordering::Relaxed)
    }

    pub(crate) fn set_last_reachable_resample(&self, ms: Millis) {
        self.last_reachable_resample_ms
            .store(ms, core::sync::atomic::Ordering::Relaxed);
    }

    pub fn stats(&self) -> stats::TableStats {
        stats::snapshot()
    }
}
