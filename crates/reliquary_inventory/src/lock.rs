//! # Pending Locks
//!
//! Per-world-item mutual exclusion for authority-side inventory operations.
//!
//! A lock is acquired and released inside one synchronous authority call and
//! never spans a round trip. [`PendingLockGuard`] ties the release to scope so
//! every exit path, early failure included, frees the item again.

use parking_lot::Mutex;

use crate::store::ActorId;
use crate::world::WorldItem;

/// Lock state embedded in every world item.
#[derive(Debug, Default)]
pub struct PendingLock {
    holder: Mutex<Option<ActorId>>,
}

impl PendingLock {
    /// Creates a free lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Actor currently holding the lock.
    #[must_use]
    pub fn holder(&self) -> Option<ActorId> {
        *self.holder.lock()
    }

    /// True when nobody holds the lock.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.holder.lock().is_none()
    }

    /// Takes the lock for `actor`.
    ///
    /// # Errors
    ///
    /// Returns the current holder if the lock is taken, even when the holder
    /// is `actor` itself: a second in-flight attempt is still a conflict.
    pub fn try_acquire(&self, actor: ActorId) -> Result<(), ActorId> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) => Err(current),
            None => {
                *holder = Some(actor);
                Ok(())
            }
        }
    }

    /// Frees the lock if `actor` holds it. Returns whether it was released.
    pub fn release(&self, actor: ActorId) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(actor) {
            *holder = None;
            true
        } else {
            false
        }
    }
}

/// Scoped ownership of a world item's pending lock.
///
/// Dropping the guard releases the lock.
pub struct PendingLockGuard<'a> {
    item: &'a dyn WorldItem,
    actor: ActorId,
}

impl<'a> PendingLockGuard<'a> {
    /// Acquires `item`'s lock for `actor`.
    ///
    /// # Errors
    ///
    /// Returns the actor already holding the lock.
    pub fn acquire(item: &'a dyn WorldItem, actor: ActorId) -> Result<Self, ActorId> {
        item.acquire_lock(actor)?;
        Ok(Self { item, actor })
    }

    /// The actor holding this guard.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        self.actor
    }
}

impl Drop for PendingLockGuard<'_> {
    fn drop(&mut self) {
        self.item.release_lock(self.actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemCategory, ItemRecord};
    use crate::world::DetachedItem;

    #[test]
    fn test_second_acquire_fails() {
        let lock = PendingLock::new();
        assert!(lock.try_acquire(ActorId(1)).is_ok());
        assert_eq!(lock.try_acquire(ActorId(2)), Err(ActorId(1)));
        assert_eq!(lock.try_acquire(ActorId(1)), Err(ActorId(1)));
    }

    #[test]
    fn test_release_requires_holder() {
        let lock = PendingLock::new();
        lock.try_acquire(ActorId(1)).unwrap();
        assert!(!lock.release(ActorId(2)));
        assert_eq!(lock.holder(), Some(ActorId(1)));
        assert!(lock.release(ActorId(1)));
        assert!(lock.is_free());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let item = DetachedItem::new(ItemRecord::new("rock", ItemCategory::Material));
        {
            let guard = PendingLockGuard::acquire(&item, ActorId(7)).unwrap();
            assert_eq!(guard.actor(), ActorId(7));
            assert!(!item.is_lock_free());
            assert!(PendingLockGuard::acquire(&item, ActorId(8)).is_err());
        }
        assert!(item.is_lock_free());
    }
}
