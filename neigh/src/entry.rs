//! The atomic unit of the cache (§3): identity, binding, NUD state, timers,
//! and a small per-entry queue.

extern crate alloc;

use alloc::sync::Arc;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use slopos_lib::{IrqRwLock, IrqRwLockReadGuard, IrqRwLockWriteGuard};

use crate::addr::{LlAddr, NeighKey};
use crate::iface::Interface;
use crate::params::Parameters;
use crate::protocol::{OutputVariant, Protocol};
use crate::queue::BoundedQueue;
use crate::seqlock::SeqLock;
use crate::time::Millis;
use crate::timer::TimerToken;

/// NUD state (§3/§4.3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NudState {
    None,
    Incomplete,
    Reachable,
    Stale,
    Delay,
    Probe,
    Failed,
    Permanent,
    Noarp,
}

impl NudState {
    /// `IN_TIMER = {INCOMPLETE, REACHABLE, DELAY, PROBE}`.
    #[inline]
    pub fn in_timer(self) -> bool {
        matches!(
            self,
            Self::Incomplete | Self::Reachable | Self::Delay | Self::Probe
        )
    }

    /// `VALID = {PERMANENT, NOARP, REACHABLE, STALE, DELAY, PROBE}`.
    #[inline]
    pub fn valid(self) -> bool {
        matches!(
            self,
            Self::Permanent | Self::Noarp | Self::Reachable | Self::Stale | Self::Delay | Self::Probe
        )
    }

    /// `CONNECTED = {PERMANENT, NOARP, REACHABLE}` — may transmit immediately.
    #[inline]
    pub fn connected(self) -> bool {
        matches!(self, Self::Permanent | Self::Noarp | Self::Reachable)
    }
}

/// Events driving the NUD state machine (§4.3).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NudEvent {
    Use,
    Confirm,
    SolicitReply { broadcast_or_foreign: bool },
    Timer,
    Admin,
    TableEvent,
}

/// Cached outbound L2-header template for the fast path, read through a
/// sequence lock so concurrent updates never hand back a torn snapshot.
#[derive(Clone, Copy, Default)]
pub struct HeaderTemplate {
    pub dst_l2: Option<LlAddr>,
}

/// The mutable part of an entry, behind the per-entry read/write lock.
pub struct EntryState<F> {
    pub nud: NudState,
    pub ll_addr: LlAddr,
    pub confirmed_ms: Millis,
    pub used_ms: Millis,
    pub updated_ms: Millis,
    pub probes: u32,
    pub queue: BoundedQueue<F>,
    pub timer: TimerToken,
}

/// One L3-address -> L2-address binding. Shared by reference (`Arc`) with
/// any routing-cache entry, in-flight transmit, or scheduled timer; not
/// physically freed until the last `Arc` drops — by which point the table
/// has already marked `dead` and unlinked it from its bucket.
pub struct Entry<P: Protocol> {
    pub key: NeighKey,
    pub params: Arc<Parameters>,
    pub iface: Arc<P::Interface>,
    pub variant: OutputVariant,
    pub dead: AtomicBool,
    state: IrqRwLock<EntryState<crate::iface::Frame>>,
    header: SeqLock<HeaderTemplate>,
    _marker: PhantomData<P>,
}

impl<P: Protocol> Entry<P> {
    pub fn new(
        key: NeighKey,
        params: Arc<Parameters>,
        iface: Arc<P::Interface>,
        variant: OutputVariant,
        initial_state: NudState,
        now_ms: Millis,
    ) -> Self {
        let queue_cap = params.queue_len();
        let backdate = 2 * params.base_reachable_time();
        Self {
            key,
            params,
            iface,
            variant,
            dead: AtomicBool::new(false),
            state: IrqRwLock::new(EntryState {
                nud: initial_state,
                ll_addr: LlAddr::zero(),
                // confirmed is backdated so the entry can transition quickly
                // on first evidence (§4.1 step 2).
                confirmed_ms: now_ms.saturating_sub(backdate),
                used_ms: now_ms,
                updated_ms: now_ms,
                probes: 0,
                queue: BoundedQueue::new(queue_cap),
                timer: TimerToken::INVALID,
            }),
            header: SeqLock::new(HeaderTemplate::default()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn read(&self) -> IrqRwLockReadGuard<'_, EntryState<crate::iface::Frame>> {
        self.state.read()
    }

    #[inline]
    pub fn write(&self) -> IrqRwLockWriteGuard<'_, EntryState<crate::iface::Frame>> {
        self.state.write()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mark_dead(&self) {
        self.dead.store(true, Ordering::Relaxed);
    }

    /// Coherent snapshot of the cached header template (fast-path read).
    #[inline]
    pub fn header_snapshot(&self) -> HeaderTemplate {
        self.header.read()
    }

    /// Publish a new header template. The resolve path is the only mutation
    /// site that calls this (§4.2): on first successful transmit while
    /// `CONNECTED`.
    #[inline]
    pub fn publish_header(&self, template: HeaderTemplate) {
        self.header.write(template);
    }
}
