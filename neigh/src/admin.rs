//! Admin surface (§2, §6): add/replace/delete/lookup bulk operations the
//! (out-of-scope) management surface maps onto. Callers provide
//! (protocol_address, interface, L2, state, flags); verbs map onto
//! `lookup`, `create`, `update`, `delete`.

extern crate alloc;

use alloc::sync::Arc;

use crate::addr::{IfaceId, NeighKey, ProtoAddr};
use crate::entry::{Entry, NudState};
use crate::error::{NeighError, NeighResult};
use crate::nud;
use crate::protocol::Protocol;
use crate::table::Table;

/// `NUD_PERMANENT`/`NUD_NOARP` administrative entries refuse override
/// without this flag set.
#[derive(Clone, Copy, Default)]
pub struct AdminFlags {
    pub force: bool,
}

/// Look up an entry by (address, interface); does not create one.
pub fn lookup<P: Protocol>(table: &Table<P>, addr: &ProtoAddr, iface: IfaceId) -> Option<Arc<Entry<P>>> {
    table.lookup(addr, iface)
}

/// Add a new permanent/static binding, or update an existing one with
/// `force` semantics equivalent to an admin call.
pub fn add<P: Protocol>(
    table: &Table<P>,
    addr: &ProtoAddr,
    iface_id: IfaceId,
    iface: Arc<P::Interface>,
    l2: crate::addr::LlAddr,
    state: NudState,
) -> NeighResult<Arc<Entry<P>>> {
    let entry = table.create(addr, iface_id, iface)?;
    nud::update(table, &entry, l2, state, true)?;
    Ok(entry)
}

/// Replace the L2 binding and/or state of an existing entry (no creation).
pub fn replace<P: Protocol>(
    table: &Table<P>,
    addr: &ProtoAddr,
    iface: IfaceId,
    l2: crate::addr::LlAddr,
    state: NudState,
    flags: AdminFlags,
) -> NeighResult<()> {
    let entry = table.lookup(addr, iface).ok_or(NeighError::InvalidUpdate)?;
    nud::update(table, &entry, l2, state, flags.force)
}

/// Delete an entry by key.
pub fn delete<P: Protocol>(table: &Table<P>, addr: &ProtoAddr, iface: IfaceId) -> NeighResult<()> {
    let entry = table.lookup(addr, iface).ok_or(NeighError::InvalidUpdate)?;
    table.delete(&entry);
    Ok(())
}

/// Key identifying a management-visible entry, convenience alias.
pub type AdminKey = NeighKey;
