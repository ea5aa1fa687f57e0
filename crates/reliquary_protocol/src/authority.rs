//! # Inventory Authority
//!
//! The single source of truth. Every store mutation in the system happens
//! inside one of the `handle_*` calls below, one request at a time and
//! without yielding.
//!
//! ## Add
//!
//! ```text
//! world item? ── lock ──► resolve record ──► insert ──► release (always) ──► destroy item
//!                 │           │
//!                 │           ├─ embedded record valid: use it
//!                 │           ├─ embedded db id only:   assign id once
//!                 │           └─ otherwise:             content lookup + new id
//!                 └─ held: Locked, nothing changes
//! ```
//!
//! ## Transfer
//!
//! Own store first, then the peer. Removal from the source and insertion into
//! the destination run back to back in one call, so no other request ever
//! sees the record in neither or both stores.
//!
//! ## Remove
//!
//! With `drop`, the record is looked up and spawned above the owner first. A
//! failed spawn is logged and the removal still happens.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use reliquary_inventory::{
    ActorId, ContentLookup, InventoryStore, ItemId, ItemRecord, PendingLockGuard, SaveRecord, Transform,
    WorldItem, WorldItemHandle, WorldSpawner,
};

use crate::config::NodeConfig;
use crate::error::FailureReason;
use crate::messages::{
    AddRequest, AddResponse, InventoryRequest, InventoryResponse, Origin, RemoveRequest, RemoveResponse,
    TransferRequest, TransferResponse,
};

/// An authority shared between a server loop and in-process channels.
pub type SharedAuthority<W> = Arc<Mutex<InventoryAuthority<W>>>;

/// A registered actor: its canonical store and where it stands.
struct OwnedStore {
    store: InventoryStore,
    transform: Transform,
}

/// Authoritative request handler for every registered store.
pub struct InventoryAuthority<W: WorldSpawner> {
    stores: HashMap<ActorId, OwnedStore>,
    content: Box<dyn ContentLookup + Send + Sync>,
    spawner: W,
    drop_height_offset: f32,
    log: bool,
}

impl<W: WorldSpawner> InventoryAuthority<W> {
    /// Creates an authority with no registered actors.
    pub fn new(config: &NodeConfig, content: impl ContentLookup + Send + Sync + 'static, spawner: W) -> Self {
        Self {
            stores: HashMap::new(),
            content: Box::new(content),
            spawner,
            drop_height_offset: config.drop_height_offset,
            log: config.log_authority,
        }
    }

    /// Wraps the authority for sharing.
    #[must_use]
    pub fn into_shared(self) -> SharedAuthority<W> {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // ACTOR REGISTRY
    // =========================================================================

    /// Registers `owner` with an empty store. An existing store is kept and
    /// only its transform is updated.
    pub fn register(&mut self, owner: ActorId, transform: Transform) {
        self.stores
            .entry(owner)
            .and_modify(|entry| entry.transform = transform)
            .or_insert_with(|| OwnedStore {
                store: InventoryStore::new(owner),
                transform,
            });
    }

    /// Registers a saved inventory, replacing any store its owner had.
    pub fn restore(&mut self, save: &SaveRecord, transform: Transform) {
        let store = save.restore(self.content.as_ref());
        tracing::info!(owner = %store.owner(), items = store.len(), "inventory restored from save");
        self.stores.insert(store.owner(), OwnedStore { store, transform });
    }

    /// Captures `owner`'s store as a save record.
    #[must_use]
    pub fn save(&self, owner: ActorId, platform_id: &str) -> Option<SaveRecord> {
        let record = SaveRecord::capture(&self.stores.get(&owner)?.store, platform_id);
        if self.log {
            record.log_contents("captured");
        }
        Some(record)
    }

    /// Unregisters `owner`, returning its store.
    pub fn unregister(&mut self, owner: ActorId) -> Option<InventoryStore> {
        self.stores.remove(&owner).map(|entry| entry.store)
    }

    /// True when `owner` has a store here.
    #[must_use]
    pub fn is_registered(&self, owner: ActorId) -> bool {
        self.stores.contains_key(&owner)
    }

    /// `owner`'s canonical store.
    #[must_use]
    pub fn store(&self, owner: ActorId) -> Option<&InventoryStore> {
        self.stores.get(&owner).map(|entry| &entry.store)
    }

    /// The world this authority spawns into.
    #[must_use]
    pub fn spawner(&self) -> &W {
        &self.spawner
    }

    // =========================================================================
    // REQUEST HANDLING
    // =========================================================================

    /// Handles a request forwarded by a predictor.
    pub fn handle(&mut self, request: &InventoryRequest) -> InventoryResponse {
        self.dispatch(request, Origin::Predicted(request.sequence()))
    }

    /// Executes a request the authority started itself.
    pub fn execute(&mut self, request: &InventoryRequest) -> InventoryResponse {
        self.dispatch(request, Origin::Authority(request.sequence()))
    }

    fn dispatch(&mut self, request: &InventoryRequest, origin: Origin) -> InventoryResponse {
        match request {
            InventoryRequest::Add(r) => InventoryResponse::Add(self.handle_add(r, origin)),
            InventoryRequest::Transfer(r) => InventoryResponse::Transfer(self.handle_transfer(r, origin)),
            InventoryRequest::Remove(r) => InventoryResponse::Remove(self.handle_remove(r, origin)),
        }
    }

    /// Adds an item to `request.actor`'s store.
    ///
    /// A picked-up world item is destroyed in the authority's world once the
    /// record is stored, so it can't be picked up a second time.
    pub fn handle_add(&mut self, request: &AddRequest, origin: Origin) -> AddResponse {
        let outcome = self.add_item(request);
        if let (Ok(_), Some(handle)) = (&outcome, request.world_item) {
            self.spawner.destroy(handle);
        }

        match &outcome {
            Ok(record) if self.log => tracing::info!(
                owner = %request.actor,
                item = %record.id,
                database_id = %record.database_id,
                category = %record.category,
                "authority: item added"
            ),
            Err(reason) => tracing::warn!(
                owner = %request.actor,
                database_id = %request.database_id,
                world_item = ?request.world_item,
                %reason,
                "authority: add failed"
            ),
            Ok(_) => {}
        }

        request.respond(origin, outcome)
    }

    fn add_item(&mut self, request: &AddRequest) -> Result<ItemRecord, FailureReason> {
        if !self.stores.contains_key(&request.actor) {
            return Err(FailureReason::UnknownStore { owner: request.actor });
        }

        let world_item = match request.world_item {
            Some(handle) => Some(
                self.spawner
                    .world_item(handle)
                    .ok_or(FailureReason::WorldItemMissing { handle })?,
            ),
            None => None,
        };

        // Held until return, so every exit path below releases the lock.
        let _guard = match world_item.as_deref() {
            Some(item) => Some(
                PendingLockGuard::acquire(item, request.actor)
                    .map_err(|holder| FailureReason::Locked { holder })?,
            ),
            None => None,
        };

        let record = self.resolve_record(request, world_item.as_deref())?;
        self.store_mut(request.actor)?
            .insert(record.clone())
            .map_err(|err| FailureReason::StoreRejected(err.to_string()))?;

        Ok(record)
    }

    fn resolve_record(
        &self,
        request: &AddRequest,
        world_item: Option<&dyn WorldItem>,
    ) -> Result<ItemRecord, FailureReason> {
        let mut existing_id = None;
        if let Some(item) = world_item {
            let embedded = item.record();
            if embedded.is_valid() {
                return Ok(embedded);
            }
            if !embedded.database_id.is_empty() {
                let id = ItemId::new();
                item.set_id(id);
                return Ok(embedded.with_id(id));
            }
            existing_id = Some(embedded.id).filter(|id| id.is_valid());
        }

        let template = Some(request.database_id.as_str())
            .filter(|database_id| !database_id.is_empty())
            .and_then(|database_id| self.content.find_by_database_id(database_id))
            .ok_or_else(|| FailureReason::ContentMiss {
                database_id: request.database_id.clone(),
            })?;

        // An identity, once assigned, is never replaced.
        let record = template.with_id(existing_id.unwrap_or_else(ItemId::new));
        if let Some(item) = world_item {
            item.set_record(record.clone());
        }

        Ok(record)
    }

    /// Moves an item between `request.actor`'s store and the peer's.
    pub fn handle_transfer(&mut self, request: &TransferRequest, origin: Origin) -> TransferResponse {
        let outcome = self.transfer_item(request);

        match &outcome {
            Ok((record, from_this_inventory)) if self.log => tracing::info!(
                owner = %request.actor,
                peer = %request.peer,
                item = %record.id,
                from_this_inventory,
                "authority: item transferred"
            ),
            Err(reason) => tracing::warn!(
                owner = %request.actor,
                peer = %request.peer,
                item = %request.id,
                %reason,
                "authority: transfer failed"
            ),
            Ok(_) => {}
        }

        request.respond(origin, outcome)
    }

    fn transfer_item(&mut self, request: &TransferRequest) -> Result<(ItemRecord, bool), FailureReason> {
        let own = self.store_ref(request.actor)?;
        let peer = self.store_ref(request.peer)?;

        let (record, from_this_inventory) = if let Some(record) = own.get(request.id, request.category) {
            (record.clone(), true)
        } else if let Some(record) = peer.get(request.id, request.category) {
            (record.clone(), false)
        } else {
            return Err(FailureReason::NotFound);
        };

        let (source, destination) = if from_this_inventory {
            (request.actor, request.peer)
        } else {
            (request.peer, request.actor)
        };

        // Records read out of a store are valid, so the insert can't be
        // rejected once the source entry is gone.
        self.store_mut(source)?.remove(record.id, record.category);
        self.store_mut(destination)?
            .insert(record.clone())
            .map_err(|err| FailureReason::StoreRejected(err.to_string()))?;

        Ok((record, from_this_inventory))
    }

    /// Removes an item from `request.actor`'s store, dropping it if asked.
    pub fn handle_remove(&mut self, request: &RemoveRequest, origin: Origin) -> RemoveResponse {
        let outcome = self.remove_item(request);

        match &outcome {
            Ok(spawned) if self.log => tracing::info!(
                owner = %request.actor,
                item = %request.id,
                category = %request.category,
                dropped = request.drop,
                spawned = ?spawned,
                "authority: item removed"
            ),
            Err(reason) => tracing::warn!(
                owner = %request.actor,
                item = %request.id,
                %reason,
                "authority: remove failed"
            ),
            Ok(_) => {}
        }

        request.respond(origin, outcome)
    }

    fn remove_item(&mut self, request: &RemoveRequest) -> Result<Option<WorldItemHandle>, FailureReason> {
        let entry = self
            .stores
            .get(&request.actor)
            .ok_or(FailureReason::UnknownStore { owner: request.actor })?;

        let mut spawned = None;
        if request.drop {
            let record = entry
                .store
                .get(request.id, request.category)
                .cloned()
                .ok_or(FailureReason::NotFound)?;
            let at = entry.transform.raised(self.drop_height_offset);

            spawned = self.spawner.spawn(&record, at);
            if spawned.is_none() {
                tracing::warn!(
                    owner = %request.actor,
                    item = %request.id,
                    database_id = %record.database_id,
                    "authority: drop spawn failed, removing anyway"
                );
            }
        }

        if self.store_mut(request.actor)?.remove(request.id, request.category).is_none() {
            tracing::error!(
                owner = %request.actor,
                item = %request.id,
                category = %request.category,
                "authority: item to remove not found"
            );
        }

        Ok(spawned)
    }

    fn store_ref(&self, owner: ActorId) -> Result<&InventoryStore, FailureReason> {
        self.stores
            .get(&owner)
            .map(|entry| &entry.store)
            .ok_or(FailureReason::UnknownStore { owner })
    }

    fn store_mut(&mut self, owner: ActorId) -> Result<&mut InventoryStore, FailureReason> {
        self.stores
            .get_mut(&owner)
            .map(|entry| &mut entry.store)
            .ok_or(FailureReason::UnknownStore { owner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSpawner;
    use reliquary_inventory::{CategoryQuery, ContentTable, ItemCategory};

    const OWNER: ActorId = ActorId(1);
    const PEER: ActorId = ActorId(2);

    fn authority() -> InventoryAuthority<MockSpawner> {
        let mut content = ContentTable::new();
        content.register(ItemRecord::new("sword_01", ItemCategory::Weapon));
        let mut authority = InventoryAuthority::new(&NodeConfig::default(), content, MockSpawner::new());
        authority.register(OWNER, Transform::at(0.0, 10.0, 0.0));
        authority.register(PEER, Transform::default());
        authority
    }

    fn add(database_id: &str, world_item: Option<WorldItemHandle>) -> AddRequest {
        AddRequest {
            sequence: 1,
            actor: OWNER,
            database_id: database_id.to_string(),
            world_item,
            category: ItemCategory::Weapon,
        }
    }

    #[test]
    fn test_add_from_content() {
        let mut authority = authority();
        let response = authority.handle_add(&add("sword_01", None), Origin::Predicted(1));

        assert!(response.success);
        let record = response.record.unwrap();
        assert!(record.id.is_valid());
        assert_eq!(authority.store(OWNER).unwrap().get(record.id, ItemCategory::Weapon), Some(&record));
    }

    #[test]
    fn test_add_content_miss() {
        let mut authority = authority();
        let response = authority.handle_add(&add("unknown", None), Origin::Authority(1));

        assert!(!response.success);
        assert_eq!(
            response.failure,
            Some(FailureReason::ContentMiss { database_id: "unknown".into() })
        );
        assert!(authority.store(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_world_item_keeps_assigned_identity() {
        let mut authority = authority();
        let handle = authority
            .spawner()
            .place(ItemRecord::new("sword_01", ItemCategory::Weapon), Transform::default());
        let item = authority.spawner().world_item(handle).unwrap();

        let response = authority.handle_add(&add("", Some(handle)), Origin::Predicted(1));
        let record = response.record.unwrap();

        assert_eq!(item.id(), record.id);
        assert!(item.is_lock_free());
        assert!(!authority.spawner().contains(handle));

        let again = authority.handle_add(&add("", Some(handle)), Origin::Predicted(2));
        assert_eq!(again.failure, Some(FailureReason::WorldItemMissing { handle }));
        assert_eq!(authority.store(OWNER).unwrap().len(), 1);
    }

    #[test]
    fn test_add_blank_world_item_resolves_request_database_id() {
        let mut authority = authority();
        let handle = authority
            .spawner()
            .place(ItemRecord::new("", ItemCategory::Item), Transform::default());
        let item = authority.spawner().world_item(handle).unwrap();

        let response = authority.handle_add(&add("sword_01", Some(handle)), Origin::Predicted(1));
        let record = response.record.unwrap();

        assert_eq!(record.database_id, "sword_01");
        assert_eq!(item.record(), record);
    }

    #[test]
    fn test_identified_world_item_keeps_id_through_content() {
        let mut authority = authority();
        let existing = ItemId::new();
        let handle = authority
            .spawner()
            .place(ItemRecord::new("", ItemCategory::Item).with_id(existing), Transform::default());
        let item = authority.spawner().world_item(handle).unwrap();

        let response = authority.handle_add(&add("sword_01", Some(handle)), Origin::Predicted(1));
        let record = response.record.unwrap();

        assert_eq!(record.id, existing);
        assert_eq!(record.database_id, "sword_01");
        assert_eq!(item.id(), existing);
        assert_eq!(authority.store(OWNER).unwrap().get(existing, ItemCategory::Weapon), Some(&record));
    }

    #[test]
    fn test_stale_world_item_fails() {
        let mut authority = authority();
        let response = authority.handle_add(&add("sword_01", Some(WorldItemHandle(99))), Origin::Predicted(1));
        assert_eq!(
            response.failure,
            Some(FailureReason::WorldItemMissing { handle: WorldItemHandle(99) })
        );
    }

    #[test]
    fn test_transfer_from_peer_side() {
        let mut authority = authority();
        let record = ItemRecord::new("sword_01", ItemCategory::Weapon).with_id(ItemId::new());
        authority.store_mut(PEER).unwrap().insert(record.clone()).unwrap();

        let request = TransferRequest {
            sequence: 4,
            actor: OWNER,
            id: record.id,
            peer: PEER,
            category: CategoryQuery::Any,
        };
        let response = authority.handle_transfer(&request, Origin::Predicted(4));

        assert!(response.success);
        assert!(!response.from_this_inventory);
        assert_eq!(authority.store(OWNER).unwrap().get(record.id, CategoryQuery::Any), Some(&record));
        assert!(authority.store(PEER).unwrap().is_empty());
    }

    #[test]
    fn test_transfer_unknown_peer_store() {
        let mut authority = authority();
        let request = TransferRequest {
            sequence: 1,
            actor: OWNER,
            id: ItemId::new(),
            peer: ActorId(77),
            category: CategoryQuery::Any,
        };
        let response = authority.handle_transfer(&request, Origin::Predicted(1));
        assert_eq!(response.failure, Some(FailureReason::UnknownStore { owner: ActorId(77) }));
    }

    #[test]
    fn test_drop_spawns_above_owner() {
        let mut authority = authority();
        let record = ItemRecord::new("sword_01", ItemCategory::Weapon).with_id(ItemId::new());
        authority.store_mut(OWNER).unwrap().insert(record.clone()).unwrap();

        let request = RemoveRequest {
            sequence: 2,
            actor: OWNER,
            id: record.id,
            category: ItemCategory::Weapon,
            drop: true,
        };
        let response = authority.handle_remove(&request, Origin::Predicted(2));

        assert!(response.success);
        assert!(response.spawned.is_some());
        let calls = authority.spawner().spawn_calls();
        assert_eq!(calls.len(), 1);
        assert!((calls[0].1.translation[1] - 44.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_failed_spawn_still_removes() {
        let mut authority = authority();
        authority.spawner().set_fail_spawns(true);
        let record = ItemRecord::new("sword_01", ItemCategory::Weapon).with_id(ItemId::new());
        authority.store_mut(OWNER).unwrap().insert(record.clone()).unwrap();

        let request = RemoveRequest {
            sequence: 2,
            actor: OWNER,
            id: record.id,
            category: ItemCategory::Weapon,
            drop: true,
        };
        let response = authority.handle_remove(&request, Origin::Predicted(2));

        assert!(response.success);
        assert!(response.spawned.is_none());
        assert!(authority.store(OWNER).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_restore() {
        let mut authority = authority();
        let added = authority.handle_add(&add("sword_01", None), Origin::Authority(1));
        let record = added.record.unwrap();

        let save = authority.save(OWNER, "local:1").unwrap();
        authority.unregister(OWNER);
        assert!(!authority.is_registered(OWNER));

        authority.restore(&save, Transform::default());
        assert_eq!(authority.store(OWNER).unwrap().get(record.id, ItemCategory::Weapon), Some(&record));
    }
}
