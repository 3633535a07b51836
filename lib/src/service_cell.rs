//! Generic late-bound singleton slot.
//!
//! A [`ServiceCell<T>`] starts out holding a stub/default value and is
//! overwritten once by whichever module owns the real implementation.
//! [`define_service!`](crate::define_service) builds one of these per
//! registered service group; this type is the building block for ad hoc
//! single-value cases that don't need the full method-table treatment.

use crate::spinlock::{IrqRwLock, IrqRwLockReadGuard, IrqRwLockWriteGuard};

pub struct ServiceCell<T>(IrqRwLock<T>);

impl<T> ServiceCell<T> {
    #[inline]
    pub const fn new(default: T) -> Self {
        Self(IrqRwLock::new(default))
    }

    #[inline]
    pub fn get(&self) -> IrqRwLockReadGuard<'_, T> {
        self.0.read()
    }

    #[inline]
    pub fn set(&self, value: T) {
        *self.0.write() = value;
    }

    #[inline]
    pub fn write(&self) -> IrqRwLockWriteGuard<'_, T> {
        self.0.write()
    }
}
