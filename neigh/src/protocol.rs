//! The per-protocol vtable (§4.4): hash, constructor, solicit, error-report,
//! output variants. A small closed set of dispatch tables chosen once at
//! entry construction — tagged-variant dispatch rather than open-set
//! polymorphism, per §9's design notes.

use crate::addr::{IfaceId, LlAddr, ProtoAddr};
use crate::iface::{Frame, Interface, InterfaceKind};

/// Selected once at construction from interface properties (§4.4).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputVariant {
    /// Interface cannot do address resolution: state pinned to `NOARP`,
    /// output bypasses resolution entirely.
    Direct,
    /// No hardware-header caching: slow path on every transmit.
    Generic,
    /// Driver exposes header templating: fast path after first resolve.
    WithHeaderCache,
    /// Legacy driver requiring a rebuild callback instead of a cached template.
    Compat,
}

impl OutputVariant {
    pub fn select<I: Interface>(iface: &I) -> Self {
        if iface.kind() == InterfaceKind::PointToPoint && !iface.supports_header_cache() {
            return Self::Direct;
        }
        if iface.requires_rebuild_callback() {
            return Self::Compat;
        }
        if iface.supports_header_cache() {
            return Self::WithHeaderCache;
        }
        Self::Generic
    }
}

/// Per-protocol hooks selected at entry construction. `Protocol::Interface`
/// ties a table to one concrete interface-adapter implementation.
pub trait Protocol: Sized + Send + Sync + 'static {
    type Interface: Interface + 'static;

    /// Keyed hash over (address, interface identity); `key` is the table's
    /// per-instance random seed (resize-defense).
    fn hash(addr: &ProtoAddr, iface: IfaceId, key: u64) -> u64;

    /// Craft and emit a resolution request (an ARP request, for the ARP
    /// instance). `probe_num` is the 0-based count of probes already sent
    /// in the current attempt.
    fn solicit(iface: &Self::Interface, target: &ProtoAddr, probe_num: u32);

    /// Notify the upper layer that `frame` could not be delivered.
    fn error_report(iface: &Self::Interface, frame: Frame);

    /// Answer `request` on behalf of `target` from the proxy subsystem
    /// (§4.9), either immediately or after the proxy queue's delay has
    /// elapsed.
    fn proxy_reply(iface: &Self::Interface, target: &ProtoAddr, request: Frame);

    /// Construction-time short-circuit (§4.1 step 3): for broadcast,
    /// multicast, loopback, or point-to-point targets the protocol may
    /// fabricate an L2 address directly rather than resolving one. Returning
    /// `Some` pins the new entry to `NOARP`.
    fn fabricate_l2(addr: &ProtoAddr, iface: &Self::Interface) -> Option<LlAddr>;
}
