//! The interface adapter: the external collaborator this cache consumes
//! but does not implement (§6). `slopos_drivers::net::netdev::NetDevice`
//! is the concrete production implementor; `drivers/src/net/arp.rs` wires
//! the two together.

extern crate alloc;

use alloc::boxed::Box;

use crate::addr::LlAddr;
use crate::error::NeighResult;

/// An outbound frame buffered while its destination is being resolved, or
/// handed off once resolution completes. Opaque payload bytes; the
/// interface adapter is the only party that interprets them.
pub struct Frame {
    pub payload: Box<[u8]>,
}

impl Frame {
    pub fn new(payload: Box<[u8]>) -> Self {
        Self { payload }
    }
}

/// Broad interface shape, closed set per §4.4's vtable-variant selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InterfaceKind {
    /// Ordinary broadcast-capable LAN interface (Ethernet et al.).
    Broadcast,
    /// Point-to-point link with no address-resolution capability.
    PointToPoint,
    /// Loopback: every address resolves to the interface itself.
    Loopback,
}

/// Abstracts a network interface for the purposes of address resolution:
/// hardware address, MTU, transmit, header construction, broadcast address.
pub trait Interface: Send + Sync {
    fn id(&self) -> crate::addr::IfaceId;
    fn hw_address(&self) -> LlAddr;
    fn broadcast_address(&self) -> LlAddr;
    fn address_length(&self) -> u8;
    fn mtu(&self) -> u16;
    fn kind(&self) -> InterfaceKind;

    /// `true` if the driver exposes cacheable hardware-header templating
    /// (selects the `with-header-cache` vtable variant).
    fn supports_header_cache(&self) -> bool {
        false
    }

    /// `true` for legacy drivers that need a rebuild callback instead of a
    /// cached template (selects the `compat` vtable variant).
    fn requires_rebuild_callback(&self) -> bool {
        false
    }

    /// Prepend an L2 header addressed to `dst_l2` onto `frame`.
    fn build_header(&self, frame: &mut Frame, dst_l2: &LlAddr) -> NeighResult<()>;

    /// Hand a fully-headered frame to the device for transmission.
    fn dev_transmit(&self, frame: Frame) -> NeighResult<()>;
}
