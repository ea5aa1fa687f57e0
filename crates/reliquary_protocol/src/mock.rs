//! # Mock Collaborators
//!
//! In-memory stand-ins for the world and the transport, shared by the unit
//! tests, the integration tests and the golden path binary.
//!
//! `MockSpawner` clones share one world, so an authority and a predictor in
//! the same process see the same items.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use reliquary_inventory::{ItemRecord, SpawnedItem, Transform, WorldItem, WorldItemHandle, WorldSpawner};

use crate::channel::RemoteCallChannel;
use crate::error::ProtocolResult;
use crate::messages::{InventoryRequest, InventoryResponse};

#[derive(Default)]
struct MockWorld {
    items: HashMap<WorldItemHandle, Arc<SpawnedItem>>,
    next_handle: u64,
    spawn_calls: Vec<(ItemRecord, Transform)>,
    fail_spawns: bool,
}

impl MockWorld {
    fn insert(&mut self, record: ItemRecord, transform: Transform) -> WorldItemHandle {
        self.next_handle += 1;
        let handle = WorldItemHandle(self.next_handle);
        self.items
            .insert(handle, Arc::new(SpawnedItem::new(handle, record, transform)));
        handle
    }
}

/// Mock implementation of `WorldSpawner` for testing.
#[derive(Clone, Default)]
pub struct MockSpawner {
    world: Arc<Mutex<MockWorld>>,
}

impl MockSpawner {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a pickable item without counting it as a spawn call.
    pub fn place(&self, record: ItemRecord, transform: Transform) -> WorldItemHandle {
        self.world.lock().insert(record, transform)
    }

    /// Every `spawn` call so far, including failed ones.
    #[must_use]
    pub fn spawn_calls(&self) -> Vec<(ItemRecord, Transform)> {
        self.world.lock().spawn_calls.clone()
    }

    /// True while `handle` exists.
    #[must_use]
    pub fn contains(&self, handle: WorldItemHandle) -> bool {
        self.world.lock().items.contains_key(&handle)
    }

    /// Visibility of `handle`, `None` if it doesn't exist.
    #[must_use]
    pub fn is_visible(&self, handle: WorldItemHandle) -> Option<bool> {
        self.world.lock().items.get(&handle).map(|item| item.is_visible())
    }

    /// Makes every following `spawn` fail.
    pub fn set_fail_spawns(&self, fail: bool) {
        self.world.lock().fail_spawns = fail;
    }
}

impl WorldSpawner for MockSpawner {
    fn spawn(&mut self, record: &ItemRecord, transform: Transform) -> Option<WorldItemHandle> {
        let mut world = self.world.lock();
        world.spawn_calls.push((record.clone(), transform));
        if world.fail_spawns {
            return None;
        }
        Some(world.insert(record.clone(), transform))
    }

    fn destroy(&mut self, handle: WorldItemHandle) {
        self.world.lock().items.remove(&handle);
    }

    fn set_visible(&mut self, handle: WorldItemHandle, visible: bool) {
        if let Some(item) = self.world.lock().items.get(&handle) {
            item.set_visible(visible);
        }
    }

    fn world_item(&self, handle: WorldItemHandle) -> Option<Arc<dyn WorldItem>> {
        self.world
            .lock()
            .items
            .get(&handle)
            .map(|item| Arc::clone(item) as Arc<dyn WorldItem>)
    }
}

/// Channel wrapper that records every request it forwards.
pub struct RecordingChannel<C: RemoteCallChannel> {
    inner: C,
    sent: Vec<InventoryRequest>,
}

impl<C: RemoteCallChannel> RecordingChannel<C> {
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            sent: Vec::new(),
        }
    }

    /// Requests forwarded so far.
    #[must_use]
    pub fn sent(&self) -> &[InventoryRequest] {
        &self.sent
    }
}

impl<C: RemoteCallChannel> RemoteCallChannel for RecordingChannel<C> {
    fn send_to_authority(&mut self, request: &InventoryRequest) -> ProtocolResult<()> {
        self.inner.send_to_authority(request)?;
        self.sent.push(request.clone());
        Ok(())
    }

    fn poll_responses(&mut self) -> ProtocolResult<Vec<InventoryResponse>> {
        self.inner.poll_responses()
    }
}
