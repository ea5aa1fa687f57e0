//! # World Items
//!
//! The capability set shared by everything an inventory can pick up, and the
//! contract of the World Spawner collaborator.
//!
//! Two variants satisfy [`WorldItem`]:
//!
//! - [`SpawnedItem`]: a world-visible object with a transform and visibility
//! - [`DetachedItem`]: a bare record with no world presence
//!
//! Both carry their own [`PendingLock`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::item::{ItemId, ItemRecord};
use crate::lock::PendingLock;
use crate::store::ActorId;

/// Handle to a world object, valid on every node that replicates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldItemHandle(pub u64);

impl fmt::Display for WorldItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// World placement of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position (x, y, z).
    pub translation: [f32; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

impl Transform {
    /// Identity rotation at `translation`.
    #[must_use]
    pub const fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            translation: [x, y, z],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Same transform moved up by `offset`.
    #[must_use]
    pub fn raised(mut self, offset: f32) -> Self {
        self.translation[1] += offset;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

/// Capabilities every pickable object exposes to the inventory protocol.
pub trait WorldItem: Send + Sync {
    /// The embedded record.
    fn record(&self) -> ItemRecord;

    /// Replaces the embedded record.
    fn set_record(&self, record: ItemRecord);

    /// The embedded record's identity.
    fn id(&self) -> ItemId {
        self.record().id
    }

    /// Sets the embedded record's identity.
    fn set_id(&self, id: ItemId);

    /// Actor holding the pending lock.
    fn lock_holder(&self) -> Option<ActorId>;

    /// True when no operation is pending on this item.
    fn is_lock_free(&self) -> bool {
        self.lock_holder().is_none()
    }

    /// Takes the pending lock.
    ///
    /// # Errors
    ///
    /// Returns the current holder when the lock is taken.
    fn acquire_lock(&self, actor: ActorId) -> Result<(), ActorId>;

    /// Frees the pending lock if `actor` holds it.
    fn release_lock(&self, actor: ActorId) -> bool;
}

/// A record without world presence.
#[derive(Debug)]
pub struct DetachedItem {
    record: Mutex<ItemRecord>,
    lock: PendingLock,
}

impl DetachedItem {
    /// Wraps a record.
    #[must_use]
    pub fn new(record: ItemRecord) -> Self {
        Self {
            record: Mutex::new(record),
            lock: PendingLock::new(),
        }
    }
}

impl WorldItem for DetachedItem {
    fn record(&self) -> ItemRecord {
        self.record.lock().clone()
    }

    fn set_record(&self, record: ItemRecord) {
        *self.record.lock() = record;
    }

    fn set_id(&self, id: ItemId) {
        self.record.lock().id = id;
    }

    fn lock_holder(&self) -> Option<ActorId> {
        self.lock.holder()
    }

    fn acquire_lock(&self, actor: ActorId) -> Result<(), ActorId> {
        self.lock.try_acquire(actor)
    }

    fn release_lock(&self, actor: ActorId) -> bool {
        self.lock.release(actor)
    }
}

/// A world-visible item.
#[derive(Debug)]
pub struct SpawnedItem {
    handle: WorldItemHandle,
    transform: Transform,
    visible: AtomicBool,
    inner: DetachedItem,
}

impl SpawnedItem {
    /// Creates a visible item at `transform`.
    #[must_use]
    pub fn new(handle: WorldItemHandle, record: ItemRecord, transform: Transform) -> Self {
        Self {
            handle,
            transform,
            visible: AtomicBool::new(true),
            inner: DetachedItem::new(record),
        }
    }

    /// This item's handle.
    #[must_use]
    pub fn handle(&self) -> WorldItemHandle {
        self.handle
    }

    /// Where the item was placed.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Whether the item is currently rendered.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Shows or hides the item.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }
}

impl WorldItem for SpawnedItem {
    fn record(&self) -> ItemRecord {
        self.inner.record()
    }

    fn set_record(&self, record: ItemRecord) {
        self.inner.set_record(record);
    }

    fn set_id(&self, id: ItemId) {
        self.inner.set_id(id);
    }

    fn lock_holder(&self) -> Option<ActorId> {
        self.inner.lock_holder()
    }

    fn acquire_lock(&self, actor: ActorId) -> Result<(), ActorId> {
        self.inner.acquire_lock(actor)
    }

    fn release_lock(&self, actor: ActorId) -> bool {
        self.inner.release_lock(actor)
    }
}

/// World Spawner collaborator: owns world representations of items.
pub trait WorldSpawner {
    /// Materializes `record` at `transform`. `None` when spawning failed.
    fn spawn(&mut self, record: &ItemRecord, transform: Transform) -> Option<WorldItemHandle>;

    /// Permanently disposes of a world item. Unknown handles are ignored.
    fn destroy(&mut self, handle: WorldItemHandle);

    /// Shows or hides a world item.
    fn set_visible(&mut self, handle: WorldItemHandle, visible: bool);

    /// Resolves a handle to the item's capabilities.
    fn world_item(&self, handle: WorldItemHandle) -> Option<Arc<dyn WorldItem>>;
}
