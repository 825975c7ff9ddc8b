//! Reader/writer guarded slot holding the current value.
//!
//! Many readers run concurrently; a writer gets exclusive access only for
//! the instant of a swap. The lock is `parking_lot`'s task-fair `RwLock`: once
//! a writer is queued, new readers wait behind it, so a steady stream of
//! readers cannot starve a rotation.

use parking_lot::RwLock;
use std::fmt;

/// A single value guarded by a reader/writer lock.
///
/// Guards are scoped, so the lock is released on every exit path including a
/// panic inside the action. The lock is never poisoned.
///
/// The slot is not reentrant: calling [`GuardedSlot::read_locked`] from
/// inside a `read_locked` action can deadlock if a writer queued in between.
pub struct GuardedSlot<T> {
    value: RwLock<T>,
}

impl<T> GuardedSlot<T> {
    /// Create a slot holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            value: RwLock::new(initial),
        }
    }

    /// Run `action` against the held value under shared access.
    ///
    /// The value seen by `action` stays the same for its whole duration even
    /// if [`GuardedSlot::get_and_set`] is called concurrently.
    #[inline]
    pub fn read_locked<R, F>(&self, action: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.value.read();
        action(&*guard)
    }

    /// Run `action` against the held value under exclusive access.
    pub fn write_locked<R, F>(&self, action: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.value.write();
        action(&mut *guard)
    }

    /// Replace the held value and return the previous one.
    ///
    /// Blocks until every in-flight reader has released, but not for readers
    /// that arrive after this call started waiting.
    pub fn get_and_set(&self, value: T) -> T {
        let mut guard = self.value.write();
        std::mem::replace(&mut *guard, value)
    }

    /// Consume the slot and return the held value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> GuardedSlot<T> {
    /// Clone of the held value, taken under shared access.
    pub fn get(&self) -> T {
        self.read_locked(T::clone)
    }
}

impl<T> fmt::Debug for GuardedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedSlot")
            .field("locked_exclusive", &self.value.is_locked_exclusive())
            .finish()
    }
}
