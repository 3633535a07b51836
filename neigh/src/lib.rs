//! Generic L3→L2 address-resolution ("neighbour") cache.
//!
//! Parameterized over a resolution protocol via [`protocol::Protocol`] and
//! an opaque network interface via [`iface::Interface`]; ARP over Ethernet
//! is the canonical instance, wired up in `slopos_drivers::net::arp`.

#![no_std]

extern crate alloc;

pub mod addr;
pub mod admin;
pub mod entry;
pub mod error;
pub mod events;
pub mod gc;
pub mod iface;
pub mod nud;
pub mod params;
pub mod protocol;
pub mod proxy;
pub mod queue;
pub mod resolve;
pub mod seqlock;
pub mod stats;
pub mod table;
pub mod time;
pub mod timer;

mod tests;

pub use addr::{IfaceId, LlAddr, NeighKey, ProtoAddr, MAX_ADDR_LEN, MAX_LL_LEN};
pub use entry::{Entry, NudEvent, NudState};
pub use error::{NeighError, NeighResult};
pub use iface::{Frame, Interface, InterfaceKind};
pub use params::Parameters;
pub use protocol::{OutputVariant, Protocol};
pub use resolve::{resolve_and_send, ResolveOutcome};
pub use table::Table;
pub use time::{Clock, Millis};
