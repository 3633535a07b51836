//! One-shot initialization flags.
//!
//! [`InitFlag`] is a simpler sibling of [`crate::once_lock::OnceLock`] for the
//! common case where there is no value to store, only a "has this run yet"
//! question — service registration, PCR bring-up, and similar boot-once
//! checkpoints.

use core::sync::atomic::{AtomicBool, Ordering};

/// A flag that can be set exactly once.
pub struct InitFlag {
    set: AtomicBool,
}

impl InitFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
        }
    }

    /// Attempt to claim this flag. Returns `true` for the caller that wins
    /// the race (and should run the one-time setup); `false` for everyone
    /// else.
    #[inline]
    pub fn init_once(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// A flag with explicit set/clear, for state that can be re-armed (unlike
/// [`InitFlag`], which is one-way).
pub struct StateFlag {
    set: AtomicBool,
}

impl StateFlag {
    #[inline]
    pub const fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
    }

    #[inline]
    pub fn clear(&self) {
        self.set.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

impl Default for StateFlag {
    fn default() -> Self {
        Self::new()
    }
}
