//! Resolve path (§4.2): the `output` entry point upper layers call with a
//! frame and a bound entry.

extern crate alloc;

use alloc::sync::Arc;

use crate::addr::LlAddr;
use crate::entry::{Entry, NudState};
use crate::error::{NeighError, NeighResult};
use crate::iface::{Frame, Interface};
use crate::nud::{self, UseOutcome};
use crate::protocol::Protocol;
use crate::stats;
use crate::table::Table;

/// Outcome of handing a frame to [`resolve_and_send`].
#[derive(Debug)]
pub enum ResolveOutcome {
    /// Transmitted immediately (`CONNECTED` fast path, or the optimistic
    /// send `STALE`/`DELAY`/`PROBE` allow while revalidation runs).
    Sent,
    /// Queued pending resolution.
    Pending,
    /// Entry is `FAILED` or dead; the frame was dropped and reported.
    Dropped,
}

/// `output`: called with a frame and a bound entry (typically cached on the
/// upper-layer route).
pub fn resolve_and_send<P: Protocol>(
    table: &Table<P>,
    entry: &Arc<Entry<P>>,
    frame: Frame,
) -> NeighResult<ResolveOutcome> {
    if entry.is_dead() {
        return Err(NeighError::InterfaceDown);
    }

    let (state, cached_l2) = {
        let st = entry.read();
        (st.nud, st.ll_addr)
    };

    match state {
        NudState::Permanent | NudState::Noarp | NudState::Reachable => {
            // Fast path: guarded by the sequence lock so a concurrent
            // update to the header template never hands back a torn read.
            let template = entry.header_snapshot();
            let dst = template.dst_l2.unwrap_or(cached_l2);
            transmit(entry, dst, frame)?;
            Ok(ResolveOutcome::Sent)
        }
        NudState::None | NudState::Stale => match nud::on_use(table, entry, frame) {
            UseOutcome::Send(ll, frame) => {
                transmit(entry, ll, frame)?;
                Ok(ResolveOutcome::Sent)
            }
            UseOutcome::Queued => Ok(ResolveOutcome::Pending),
            UseOutcome::Dropped => Ok(ResolveOutcome::Dropped),
        },
        NudState::Incomplete => {
            let mut st = entry.write();
            let evicted = st.queue.push_evicting(frame);
            drop(st);
            if evicted.is_some() {
                stats::unresolved_discards();
            }
            Ok(ResolveOutcome::Pending)
        }
        NudState::Failed => {
            P::error_report(&entry.iface, frame);
            stats::res_failed();
            Ok(ResolveOutcome::Dropped)
        }
        NudState::Delay | NudState::Probe => {
            // Still carries a (possibly stale) mapping from before
            // DELAY/PROBE was entered; keep transmitting on the fast path
            // while revalidation runs in the background.
            transmit(entry, cached_l2, frame)?;
            Ok(ResolveOutcome::Sent)
        }
    }
}

fn transmit<P: Protocol>(entry: &Arc<Entry<P>>, dst_l2: LlAddr, mut frame: Frame) -> NeighResult<()> {
    entry.iface.build_header(&mut frame, &dst_l2)?;
    entry.iface.dev_transmit(frame)?;
    Ok(())
}
