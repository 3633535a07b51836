//! Garbage collection (§4.6): synchronous forced shrink under pressure, and
//! a cooperative periodic sweep for ordinary reclamation.

extern crate alloc;

use alloc::sync::Arc;

use slopos_lib::klog_debug;

use crate::addr::IfaceId;
use crate::entry::NudState;
use crate::events;
use crate::protocol::Protocol;
use crate::stats;
use crate::table::Table;
use crate::time::Millis;

/// Resample every attached parameter set's `reachable_time` this often.
const REACHABLE_RESAMPLE_INTERVAL_MS: Millis = 300_000;

impl<P: Protocol> Table<P> {
    /// Forced (synchronous) GC (§4.6): scans every bucket and deletes every
    /// entry with `Arc` refcount == 1 (no external holder left) and state
    /// not `PERMANENT`. Triggered from `create()` under pressure; may
    /// reclaim nothing, in which case the caller rejects the creation.
    pub fn forced_gc(&self) {
        let mut deleted = 0usize;
        self.for_each_bucket_mut(|slot| {
            slot.retain(|entry| {
                let collectible = Arc::strong_count(entry) == 1
                    && entry.read().nud != NudState::Permanent;
                if collectible {
                    self.timers.cancel(entry.write().timer);
                    entry.mark_dead();
                    events::on_delete(entry.key.addr, entry.key.iface);
                    deleted += 1;
                }
                !collectible
            });
        });
        if deleted > 0 {
            for _ in 0..deleted {
                stats::forced_gc_deleted();
                stats::destroys();
            }
            self.dec_count(deleted);
        }
        self.mark_forced_gc_now();
        klog_debug!("neigh[{}]: forced gc reclaimed {} entries", self.name, deleted);
    }

    /// Periodic (asynchronous) sweep (§4.6): called by a deferred-work task
    /// roughly every `base_reachable_time/2`. Walks buckets one at a time,
    /// dropping the table lock between them so other work isn't starved.
    pub fn periodic_sweep(&self, now_ms: Millis) {
        let mut deleted = 0usize;
        let n = self.bucket_count();
        for idx in 0..n {
            self.with_bucket_mut(idx, |slot| {
                slot.retain(|entry| {
                    if entry.is_dead() {
                        return false;
                    }
                    let mut st = entry.write();
                    if st.nud == NudState::Permanent || st.nud.in_timer() {
                        return true;
                    }
                    if st.used_ms < st.confirmed_ms {
                        st.used_ms = st.confirmed_ms;
                    }
                    let gc_staletime = entry.params.gc_staletime();
                    let idle = st.nud == NudState::Failed
                        || now_ms > st.used_ms.saturating_add(gc_staletime);
                    let collectible = Arc::strong_count(entry) == 1 && idle;
                    if collectible {
                        self.timers.cancel(st.timer);
                        drop(st);
                        entry.mark_dead();
                        events::on_delete(entry.key.addr, entry.key.iface);
                        deleted += 1;
                        false
                    } else {
                        true
                    }
                });
            });
        }
        if deleted > 0 {
            for _ in 0..deleted {
                stats::periodic_gc_deleted();
                stats::destroys();
            }
            self.dec_count(deleted);
            klog_debug!("neigh[{}]: periodic sweep reclaimed {} entries", self.name, deleted);
        }

        if now_ms.saturating_sub(self.last_reachable_resample()) >= REACHABLE_RESAMPLE_INTERVAL_MS {
            self.resample_all_params();
            self.set_last_reachable_resample(now_ms);
        }
    }

    /// `TABLE_EVENT` on interface down/address change (§4.8): cancel every
    /// affected entry's timer, mark it dead, repoint state to the
    /// appropriate black hole, flush its queue, and release the table's
    /// reference. Actual destruction happens when the last external `Arc`
    /// drops. The proxy table is swept the same way.
    pub fn on_interface_down(&self, iface: IfaceId) {
        let mut deleted = 0usize;
        self.for_each_bucket_mut(|slot| {
            slot.retain(|entry| {
                if entry.key.iface != iface {
                    return true;
                }
                let mut st = entry.write();
                self.timers.cancel(st.timer);
                st.timer = crate::timer::TimerToken::INVALID;
                st.nud = if st.nud.valid() {
                    NudState::Noarp
                } else {
                    NudState::None
                };
                let dropped_frames = st.queue.drain();
                drop(st);
                for _frame in dropped_frames {
                    stats::unresolved_discards();
                }
                entry.mark_dead();
                deleted += 1;
                false
            });
        });
        self.dec_count(deleted);
        self.retire_params(iface);
        self.proxy.flush_iface(iface);
        klog_debug!("neigh[{}]: interface {:?} down, {} entries released", self.name, iface, deleted);
    }
}
