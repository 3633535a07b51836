//! Sequence lock for the cached outbound L2-header template.
//!
//! Writers (entry updates) serialize via an odd/even sequence counter;
//! readers (the fast-path resolve) retry if they observe a write in
//! progress or straddle one, so the fast path copies a coherent header
//! without ever blocking on the per-entry lock. Same discipline the
//! kernel's PCR fast path uses for its GS-base-resident fields.

use core::sync::atomic::{AtomicU32, Ordering};

pub struct SeqLock<T: Copy> {
    seq: AtomicU32,
    data: core::cell::UnsafeCell<T>,
}

unsafe impl<T: Copy + Send> Sync for SeqLock<T> {}

impl<T: Copy> SeqLock<T> {
    pub const fn new(init: T) -> Self {
        Self {
            seq: AtomicU32::new(0),
            data: core::cell::UnsafeCell::new(init),
        }
    }

    /// Read a coherent snapshot, retrying across concurrent writes.
    pub fn read(&self) -> T {
        loop {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 != 0 {
                core::hint::spin_loop();
                continue;
            }
            // SAFETY: no writer can be mid-update while s1 is even; a
            // concurrent writer would have incremented seq to odd first.
            let snapshot = unsafe { *self.data.get() };
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 {
                return snapshot;
            }
        }
    }

    /// Write a new value, serializing against concurrent writers via the
    /// caller's own lock (the per-entry write lock); this only needs to
    /// keep readers coherent, not serialize writers against each other.
    pub fn write(&self, value: T) {
        self.seq.fetch_add(1, Ordering::AcqRel);
        // SAFETY: seq is now odd; readers will spin until it goes even again.
        unsafe {
            *self.data.get() = value;
        }
        self.seq.fetch_add(1, Ordering::Release);
    }
}
