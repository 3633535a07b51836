//! The per-entry reachability state machine (§4.3): the hard part of this
//! crate. Transitions are driven by [`NudEvent`]s and by timer expiry;
//! `update()` is the single choke point both inbound learning (§4.5) and
//! the admin surface (§6) go through.

extern crate alloc;

use alloc::sync::Arc;

use slopos_lib::{klog_debug, klog_warn};

use crate::addr::LlAddr;
use crate::entry::{Entry, HeaderTemplate, NudState};
use crate::error::{NeighError, NeighResult};
use crate::events;
use crate::iface::{Frame, Interface};
use crate::protocol::Protocol;
use crate::stats;
use crate::table::Table;
use crate::time::Millis;

/// What the resolve path should do with the frame that triggered `USE`.
pub enum UseOutcome {
    /// Entry already has a usable (if stale) mapping — transmit now, using
    /// the returned frame and address.
    Send(LlAddr, Frame),
    /// Frame was queued; resolution is in flight.
    Queued,
    /// No probe budget available; frame was dropped and reported.
    Dropped,
}

fn rearm<P: Protocol>(
    table: &Table<P>,
    entry: &Arc<Entry<P>>,
    st: &mut crate::entry::EntryState<Frame>,
    deadline_ms: Millis,
) {
    table.timers.cancel(st.timer);
    st.timer = table.timers.arm(entry.key, deadline_ms);
}

fn disarm<P: Protocol>(table: &Table<P>, st: &mut crate::entry::EntryState<Frame>) {
    table.timers.cancel(st.timer);
    st.timer = crate::timer::TimerToken::INVALID;
}

/// `USE`: a frame is about to be sent through an entry that is not yet
/// `CONNECTED`. Only reachable from `NONE` or `STALE` (§4.2) — the resolve
/// path fast-paths `CONNECTED` and handles `INCOMPLETE`/`FAILED` directly.
pub fn on_use<P: Protocol>(table: &Table<P>, entry: &Arc<Entry<P>>, frame: Frame) -> UseOutcome {
    let now = table.now_ms();
    let mut st = entry.write();
    match st.nud {
        NudState::None => {
            if entry.params.incomplete_probe_budget() == 0 {
                st.nud = NudState::Failed;
                drop(st);
                stats::res_failed();
                P::error_report(&entry.iface, frame);
                klog_warn!("neigh: {:?} has no probe budget, entry failed", entry.key);
                UseOutcome::Dropped
            } else {
                st.nud = NudState::Incomplete;
                st.probes = 0;
                let evicted = st.queue.push_evicting(frame);
                // Arm at now+1: the first TIMER tick is what actually sends
                // the solicitation (§4.3).
                rearm(table, entry, &mut st, now + 1);
                drop(st);
                if evicted.is_some() {
                    stats::unresolved_discards();
                }
                UseOutcome::Queued
            }
        }
        NudState::Stale => {
            st.nud = NudState::Delay;
            let delay = entry.params.delay_probe_time();
            rearm(table, entry, &mut st, now + delay);
            let ll = st.ll_addr;
            drop(st);
            UseOutcome::Send(ll, frame)
        }
        // Any other state reaching here is a resolve-path bug: USE is only
        // raised from NONE/STALE. Report rather than silently swallowing it.
        _ => {
            drop(st);
            klog_warn!("neigh: {:?} USE event in unexpected state", entry.key);
            P::error_report(&entry.iface, frame);
            UseOutcome::Dropped
        }
    }
}

/// `TIMER`: the entry's scheduled timer fired. No-op if the entry is dead or
/// no longer `IN_TIMER` (a stale timer that lost a race with a transition).
pub fn on_timer<P: Protocol>(table: &Table<P>, entry: &Arc<Entry<P>>) {
    if entry.is_dead() {
        return;
    }
    let now = table.now_ms();
    let mut st = entry.write();
    if !st.nud.in_timer() {
        return;
    }
    match st.nud {
        NudState::Incomplete => {
            let budget = entry.params.incomplete_probe_budget();
            if st.probes < budget {
                let probe_num = st.probes;
                st.probes += 1;
                let retrans = entry.params.retrans_time();
                rearm(table, entry, &mut st, now + retrans);
                drop(st);
                P::solicit(&entry.iface, &entry.key.addr, probe_num);
            } else {
                fail_and_flush(table, entry, st);
            }
        }
        NudState::Reachable => {
            let confirmed = st.confirmed_ms;
            let used = st.used_ms;
            let reachable_time = entry.params.reachable_time();
            if now <= confirmed.saturating_add(reachable_time) {
                rearm(table, entry, &mut st, confirmed + reachable_time);
            } else if now <= used.saturating_add(entry.params.delay_probe_time()) {
                st.nud = NudState::Delay;
                let delay = entry.params.delay_probe_time();
                rearm(table, entry, &mut st, now + delay);
            } else {
                st.nud = NudState::Stale;
                // No arm: STALE entries are reaped or re-probed on next USE,
                // not on a timer (managed by periodic GC instead).
                disarm(table, &mut st);
                klog_debug!("neigh: {:?} reachable -> stale", entry.key);
            }
        }
        NudState::Delay => {
            let confirmed = st.confirmed_ms;
            let delay_probe = entry.params.delay_probe_time();
            if now <= confirmed.saturating_add(delay_probe) {
                st.nud = NudState::Reachable;
                let reachable_time = entry.params.reachable_time();
                rearm(table, entry, &mut st, confirmed + reachable_time);
            } else {
                st.nud = NudState::Probe;
                st.probes = 0;
                let retrans = entry.params.retrans_time();
                rearm(table, entry, &mut st, now + retrans);
            }
        }
        NudState::Probe => {
            let limit = entry.params.ucast_probes();
            if st.probes < limit {
                let probe_num = st.probes;
                st.probes += 1;
                let retrans = entry.params.retrans_time();
                rearm(table, entry, &mut st, now + retrans);
                drop(st);
                P::solicit(&entry.iface, &entry.key.addr, probe_num);
            } else {
                fail_and_flush(table, entry, st);
            }
        }
        _ => {}
    }
}

fn fail_and_flush<P: Protocol>(
    table: &Table<P>,
    entry: &Arc<Entry<P>>,
    mut st: slopos_lib::IrqRwLockWriteGuard<'_, crate::entry::EntryState<Frame>>,
) {
    st.nud = NudState::Failed;
    disarm(table, &mut st);
    let queued = st.queue.drain();
    drop(st);
    stats::res_failed();
    for frame in queued {
        P::error_report(&entry.iface, frame);
    }
    klog_warn!("neigh: {:?} resolution failed, queue flushed", entry.key);
}

/// `SOLICIT_REPLY`: a protocol-level reply matched this entry. Only
/// meaningful while `INCOMPLETE`; replies arriving in other states are
/// routed through [`update`] instead (§4.5 step 6).
pub fn on_solicit_reply<P: Protocol>(
    table: &Table<P>,
    entry: &Arc<Entry<P>>,
    ll_addr: LlAddr,
    broadcast_or_foreign: bool,
) {
    let now = table.now_ms();
    let mut st = entry.write();
    if st.nud != NudState::Incomplete {
        return;
    }
    st.ll_addr = ll_addr;
    st.updated_ms = now;
    if broadcast_or_foreign {
        st.nud = NudState::Stale;
        disarm(table, &mut st);
    } else {
        st.nud = NudState::Reachable;
        st.confirmed_ms = now;
        let reachable_time = entry.params.reachable_time();
        rearm(table, entry, &mut st, now + reachable_time);
        publish_connected_header(entry, ll_addr);
    }
    let new_state = st.nud;
    let drained = st.queue.drain();
    drop(st);
    klog_debug!("neigh: {:?} resolved -> {:?}", entry.key, ll_addr);
    events::on_update(entry.key.addr, entry.key.iface, new_state);
    dispatch_drained(entry, ll_addr, drained);
}

/// Header and transmit every frame that was queued while unresolved, now
/// that a usable L2 address is available (§4.2, §4.5).
fn dispatch_drained<P: Protocol>(entry: &Arc<Entry<P>>, ll_addr: LlAddr, drained: alloc::vec::Vec<Frame>) {
    for mut frame in drained {
        match entry.iface.build_header(&mut frame, &ll_addr) {
            Ok(()) => {
                if entry.iface.dev_transmit(frame).is_err() {
                    stats::unresolved_discards();
                }
            }
            Err(_) => stats::unresolved_discards(),
        }
    }
}

/// `CONFIRM`: higher-layer evidence the peer is reachable. No-op unless the
/// entry is currently `VALID`.
pub fn on_confirm<P: Protocol>(table: &Table<P>, entry: &Arc<Entry<P>>) {
    let now = table.now_ms();
    let mut st = entry.write();
    if !st.nud.valid() {
        return;
    }
    st.confirmed_ms = now;
    st.used_ms = now;
}

fn publish_connected_header<P: Protocol>(entry: &Arc<Entry<P>>, ll_addr: LlAddr) {
    if matches!(
        entry.variant,
        crate::protocol::OutputVariant::WithHeaderCache
    ) {
        entry.publish_header(HeaderTemplate {
            dst_l2: Some(ll_addr),
        });
    }
}

/// The single choke point for installing a new L2 mapping, shared by
/// inbound learning (§4.5) and the admin surface (§6). Honors the
/// `locktime` anti-flap guard and atomically drains the queue on a
/// transition into a `VALID` state.
pub fn update<P: Protocol>(
    table: &Table<P>,
    entry: &Arc<Entry<P>>,
    new_l2: LlAddr,
    target_state: NudState,
    admin: bool,
) -> NeighResult<()> {
    let now = table.now_ms();
    let mut st = entry.write();

    if !admin && matches!(st.nud, NudState::Permanent | NudState::Noarp) {
        return Err(NeighError::InvalidUpdate);
    }

    let changing_l2 = st.ll_addr != new_l2;
    if !admin && changing_l2 && now.saturating_sub(st.updated_ms) < entry.params.locktime() {
        klog_debug!("neigh: {:?} update refused by locktime", entry.key);
        return Err(NeighError::InvalidUpdate);
    }

    st.ll_addr = new_l2;
    st.updated_ms = now;
    st.nud = target_state;
    if target_state.connected() {
        st.confirmed_ms = now;
        publish_connected_header(entry, new_l2);
    }
    if target_state.in_timer() {
        // Mirrors the arming `on_solicit_reply`/`on_timer` do when entering
        // these states, so an IN_TIMER entry installed via `update` (inbound
        // replies per §4.5 step 6, or an admin add/replace) still gets the
        // one scheduled timer §3/§8 require instead of aging forever.
        st.probes = 0;
        let deadline_ms = match target_state {
            NudState::Reachable => st.confirmed_ms.saturating_add(entry.params.reachable_time()),
            NudState::Delay => now.saturating_add(entry.params.delay_probe_time()),
            NudState::Probe | NudState::Incomplete => now.saturating_add(entry.params.retrans_time()),
            _ => now,
        };
        rearm(table, entry, &mut st, deadline_ms);
    } else {
        disarm(table, &mut st);
    }
    let drained = if target_state.valid() {
        st.queue.drain()
    } else {
        alloc::vec::Vec::new()
    };
    drop(st);
    klog_debug!("neigh: {:?} updated -> {:?}", entry.key, target_state);
    events::on_update(entry.key.addr, entry.key.iface, target_state);
    if !drained.is_empty() {
        dispatch_drained(entry, new_l2, drained);
    }
    Ok(())
}
