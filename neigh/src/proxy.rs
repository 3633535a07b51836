//! Proxy subsystem (§4.9): pattern-matched "answer on behalf of" entries,
//! a delayed-reply queue, and a single table-wide timer.

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use slopos_lib::{IrqMutex, IrqRwLock, klog_debug};

use crate::addr::{IfaceId, ProtoAddr};
use crate::iface::{Frame, Interface};
use crate::protocol::Protocol;
use crate::stats;
use crate::time::Millis;

/// Answer resolution requests for `addr` on behalf of another host.
/// `iface = None` matches requests arriving on any interface.
pub struct ProxyEntry {
    pub addr: ProtoAddr,
    pub iface: Option<IfaceId>,
}

struct Pending<P: Protocol> {
    target: ProtoAddr,
    iface: Arc<P::Interface>,
    deadline_ms: Millis,
    request: Frame,
}

pub struct ProxyTable<P: Protocol> {
    entries: IrqRwLock<Vec<ProxyEntry>>,
    queue: IrqMutex<Vec<Pending<P>>>,
    next_deadline_ms: AtomicU64,
}

impl<P: Protocol> ProxyTable<P> {
    pub fn new() -> Self {
        Self {
            entries: IrqRwLock::new(Vec::new()),
            queue: IrqMutex::new(Vec::new()),
            next_deadline_ms: AtomicU64::new(u64::MAX),
        }
    }

    pub fn add(&self, addr: ProtoAddr, iface: Option<IfaceId>) {
        self.entries.write().push(ProxyEntry { addr, iface });
    }

    pub fn remove(&self, addr: &ProtoAddr, iface: Option<IfaceId>) {
        self.entries
            .write()
            .retain(|e| !(e.addr == *addr && e.iface == iface));
    }

    /// Whether a request for `addr` arriving on `iface` should be proxied.
    pub fn matches(&self, addr: &ProtoAddr, iface: IfaceId) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.addr == *addr && (e.iface.is_none() || e.iface == Some(iface)))
    }

    /// Queue a deferred proxy reply for `target`, due somewhere in
    /// `[now_ms, now_ms + proxy_delay_ms]` — the per-request randomized delay
    /// bounded by `proxy_delay` (§8 scenario 6). Evicts the oldest pending
    /// reply if the queue is already at `proxy_qlen`.
    pub fn schedule_reply(
        &self,
        target: ProtoAddr,
        iface: Arc<P::Interface>,
        request: Frame,
        now_ms: Millis,
        proxy_delay_ms: Millis,
        proxy_qlen: usize,
    ) {
        let jitter = slopos_lib::kernel_services::platform::rng_next() % (proxy_delay_ms + 1);
        let deadline_ms = now_ms + jitter;
        let mut queue = self.queue.lock();
        if queue.len() >= proxy_qlen {
            queue.remove(0);
            stats::unresolved_discards();
        }
        queue.push(Pending {
            target,
            iface,
            deadline_ms,
            request,
        });
        self.rearm_locked(&queue);
    }

    fn rearm_locked(&self, queue: &[Pending<P>]) {
        let next = queue.iter().map(|p| p.deadline_ms).min().unwrap_or(u64::MAX);
        self.next_deadline_ms.store(next, Ordering::Relaxed);
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        let v = self.next_deadline_ms.load(Ordering::Relaxed);
        if v == u64::MAX { None } else { Some(v) }
    }

    /// Dispatch every reply now due through [`Protocol::proxy_reply`],
    /// re-arming the timer for whatever remains. Returns the count
    /// dispatched.
    pub fn poll(&self, now_ms: Millis) -> usize {
        if self.next_deadline().is_none_or(|d| d > now_ms) {
            return 0;
        }
        let due = {
            let mut queue = self.queue.lock();
            let mut due = Vec::new();
            let mut i = 0;
            while i < queue.len() {
                if queue[i].deadline_ms <= now_ms {
                    due.push(queue.remove(i));
                } else {
                    i += 1;
                }
            }
            self.rearm_locked(&queue);
            due
        };
        let n = due.len();
        for p in due {
            P::proxy_reply(&p.iface, &p.target, p.request);
            stats::proxy_dispatched();
        }
        if n > 0 {
            klog_debug!("neigh: dispatched {} deferred proxy replies", n);
        }
        n
    }

    /// Drop every pending reply referencing `iface` (interface teardown,
    /// §4.8's "proxy queue is drained").
    pub fn flush_iface(&self, iface: IfaceId) {
        let mut queue = self.queue.lock();
        queue.retain(|p| p.iface.id() != iface);
        self.rearm_locked(&queue);
    }
}

impl<P: Protocol> Default for ProxyTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
