//! Crate-wide error type.
//!
//! Mirrors the shape of `slopos_drivers::net::types::NetError`: a small,
//! `Copy`, exhaustively-matched enum with a `Display` impl and no
//! heap-allocated payload.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighError {
    /// Table at `gc_thresh3` and forced GC could not free a slot.
    ResourceExhausted,
    /// Probe sequence completed without reply.
    ResolutionFailed,
    /// Administrative update would overwrite a `PERMANENT`/`NOARP` entry.
    InvalidUpdate,
    /// Entry's interface has been torn down.
    InterfaceDown,
    /// Address length mismatch or other malformed key.
    InvalidAddress,
    /// Parameters for this (table, interface) pair are dead (being torn down).
    ParametersDead,
    /// The interface adapter's `build_header`/`dev_transmit` failed.
    TransmitFailed,
}

impl fmt::Display for NeighError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "neighbour table full, gc could not reclaim"),
            Self::ResolutionFailed => write!(f, "address resolution failed"),
            Self::InvalidUpdate => write!(f, "administrative update refused"),
            Self::InterfaceDown => write!(f, "interface is down"),
            Self::InvalidAddress => write!(f, "invalid or mismatched address"),
            Self::ParametersDead => write!(f, "interface parameters are being torn down"),
            Self::TransmitFailed => write!(f, "interface failed to build or transmit the frame"),
        }
    }
}

pub type NeighResult<T> = Result<T, NeighError>;
