//! Tick-driven timer wheel for per-entry NUD timers.
//!
//! Generalizes `slopos_drivers::net::timer::NetTimerWheel` beyond a fixed
//! `TimerKind` enum: entries are keyed by [`NeighKey`] and the wheel only
//! ever fires one kind of event (re-evaluate this entry's NUD state), so the
//! payload is just the key. Distinct from the proxy subsystem's single
//! shared timer (§4.9), which lives in `proxy.rs`.

extern crate alloc;

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use slopos_lib::IrqMutex;

use crate::addr::NeighKey;
use crate::time::Millis;

const NUM_SLOTS: usize = 256;
/// Per-drain bound so a burst of simultaneous expiries can't stall the caller.
pub const MAX_TIMERS_PER_DRAIN: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimerToken(u64);

impl TimerToken {
    pub const INVALID: Self = Self(0);
}

struct TimerEntry {
    deadline_ms: Millis,
    token: TimerToken,
    key: NeighKey,
    cancelled: bool,
}

pub struct TimerWheel {
    current_ms: AtomicU64,
    slots: IrqMutex<Vec<Vec<TimerEntry>>>,
    token_gen: AtomicU64,
}

impl TimerWheel {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(NUM_SLOTS);
        for _ in 0..NUM_SLOTS {
            slots.push(Vec::new());
        }
        Self {
            current_ms: AtomicU64::new(0),
            slots: IrqMutex::new(slots),
            token_gen: AtomicU64::new(1),
        }
    }

    /// Arm a timer for `key` at absolute `deadline_ms`. Returns a token the
    /// caller can use to cancel it; re-arming an entry's timer should cancel
    /// the previous token first (an entry in `IN_TIMER` has exactly one).
    pub fn arm(&self, key: NeighKey, deadline_ms: Millis) -> TimerToken {
        let token = TimerToken(self.token_gen.fetch_add(1, Ordering::Relaxed));
        let slot_idx = (deadline_ms as usize) % NUM_SLOTS;
        let mut slots = self.slots.lock();
        slots[slot_idx].push(TimerEntry {
            deadline_ms,
            token,
            key,
            cancelled: false,
        });
        token
    }

    pub fn cancel(&self, token: TimerToken) {
        if token == TimerToken::INVALID {
            return;
        }
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            for entry in slot.iter_mut() {
                if entry.token == token {
                    entry.cancelled = true;
                    return;
                }
            }
        }
    }

    /// Advance to `now_ms`, draining every slot whose deadline has passed.
    /// Returns the keys whose timers fired, bounded by
    /// [`MAX_TIMERS_PER_DRAIN`] per call — callers in a tight poll loop
    /// should call repeatedly until the return value is empty.
    ///
    /// `current_ms` only advances to `now_ms` once a call drains every due
    /// entry without hitting the cap; a capped call leaves it behind so the
    /// next call at the same `now_ms` keeps draining the overflow instead of
    /// being short-circuited by the `now_ms <= current_ms` guard below.
    pub fn advance_to(&self, now_ms: Millis) -> Vec<NeighKey> {
        let mut fired = Vec::new();
        let mut slots = self.slots.lock();
        let prev = self.current_ms.load(Ordering::Relaxed);
        if now_ms <= prev {
            return fired;
        }
        let mut capped = false;
        for slot in slots.iter_mut() {
            slot.retain(|entry| {
                if fired.len() >= MAX_TIMERS_PER_DRAIN {
                    capped = true;
                    return true;
                }
                if entry.cancelled {
                    return false;
                }
                if entry.deadline_ms <= now_ms {
                    fired.push(entry.key);
                    false
                } else {
                    true
                }
            });
        }
        if !capped {
            self.current_ms.store(now_ms, Ordering::Relaxed);
        }
        fired
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}
