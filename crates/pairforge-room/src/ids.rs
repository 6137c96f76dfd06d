//! Identifier allocation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing identifiers, starting at a chosen origin.
///
/// Each call to [`next`](Self::next) is a single atomic read-and-increment,
/// so concurrent callers never observe the same value and no value is
/// skipped. Allocators are plain values: create one per id space and pass
/// it to whoever needs it. Overflow past `u64::MAX` is not handled.
pub struct IdAllocator<T> {
    next: AtomicU64,
    _id: PhantomData<fn() -> T>,
}

impl<T> IdAllocator<T> {
    /// Creates an allocator whose first id is 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates an allocator whose first id is `origin`.
    pub fn starting_at(origin: u64) -> Self {
        Self {
            next: AtomicU64::new(origin),
            _id: PhantomData,
        }
    }

    /// Returns the value the next call to `next` will hand out.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl<T: From<u64>> IdAllocator<T> {
    /// Returns the current value and advances the counter.
    pub fn next(&self) -> T {
        T::from(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IdAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator")
            .field("next", &self.peek())
            .finish()
    }
}
