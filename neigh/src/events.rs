//! Event bus (§6): publish `NEIGH_UPDATE` on state change and `NEIGH_DELETE`
//! on GC, without this crate depending on whatever subsystem consumes them.
//! Modeled on the kernel's `define_service!` indirection — the real
//! subscriber registers its callback at init time; until then, publishing
//! is a no-op.

use crate::addr::{IfaceId, ProtoAddr};
use crate::entry::NudState;

slopos_lib::define_service!(neigh_events => NeighEventServices {
    on_update(addr: ProtoAddr, iface: IfaceId, state: NudState);
    on_delete(addr: ProtoAddr, iface: IfaceId);
});
