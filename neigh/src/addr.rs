//! Fixed-capacity address byte buffers.
//!
//! The cache is generic over protocol (L3) and link-layer (L2) address
//! widths: an IPv4/Ethernet table uses 4- and 6-byte keys, a future
//! protocol might use something else. Rather than carry the width as a
//! type parameter through every structure, addresses are stored in a
//! fixed-capacity buffer with an explicit length, the same pattern
//! `PacketBuf` uses for its payload.

use core::hash::{Hash, Hasher};

/// Largest protocol address this cache can key on.
pub const MAX_ADDR_LEN: usize = 16;
/// Largest link-layer address this cache can bind to.
pub const MAX_LL_LEN: usize = 16;

#[derive(Clone, Copy)]
pub struct ProtoAddr {
    bytes: [u8; MAX_ADDR_LEN],
    len: u8,
}

impl ProtoAddr {
    #[inline]
    pub fn new(raw: &[u8]) -> Self {
        let len = raw.len().min(MAX_ADDR_LEN);
        let mut bytes = [0u8; MAX_ADDR_LEN];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl PartialEq for ProtoAddr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for ProtoAddr {}

impl Hash for ProtoAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl core::fmt::Debug for ProtoAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{b}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
pub struct LlAddr {
    bytes: [u8; MAX_LL_LEN],
    len: u8,
}

impl LlAddr {
    #[inline]
    pub fn new(raw: &[u8]) -> Self {
        let len = raw.len().min(MAX_LL_LEN);
        let mut bytes = [0u8; MAX_LL_LEN];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self {
            bytes: [0u8; MAX_LL_LEN],
            len: 0,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.len == 0 || self.as_bytes().iter().all(|b| *b == 0)
    }
}

impl PartialEq for LlAddr {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for LlAddr {}

impl Hash for LlAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl core::fmt::Debug for LlAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Opaque interface identity. The cache never interprets this beyond
/// equality/hashing; the interface adapter is the authority on what it means.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IfaceId(pub usize);

/// The (protocol address, interface) identity a [`crate::table::Table`] keys entries on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NeighKey {
    pub addr: ProtoAddrHash,
    pub iface: IfaceId,
}

/// Wrapper so `NeighKey` can derive `Hash`/`Eq` directly (`ProtoAddr` already
/// implements both by hand, this just gives the derive a named field type).
pub type ProtoAddrHash = ProtoAddr;

impl NeighKey {
    #[inline]
    pub fn new(addr: ProtoAddr, iface: IfaceId) -> Self {
        Self { addr, iface }
    }
}
