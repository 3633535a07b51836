//! Bounded per-entry and per-proxy frame queues.
//!
//! Backed by `alloc::collections::VecDeque`; overflow evicts the oldest
//! entry rather than refusing the new one (§4.2: "evicting the head on
//! overflow").

extern crate alloc;

use alloc::collections::VecDeque;

pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap.min(16)),
            cap,
        }
    }

    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap;
    }

    /// Push a frame, evicting the oldest one if at capacity.
    /// Returns the evicted frame, if any.
    pub fn push_evicting(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.cap {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn drain(&mut self) -> alloc::vec::Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
