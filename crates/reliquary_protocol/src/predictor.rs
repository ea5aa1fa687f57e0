//! # Client-Side Prediction
//!
//! Optimistic feedback for the locally controlled actor, reconciled against
//! the authority's responses.
//!
//! ## How It Works
//!
//! 1. `begin`: record the operation under its sequence and apply the
//!    pending-client change (hide the world item being picked up)
//! 2. The authority resolves the request and answers
//! 3. `reconcile`: success replays the authority's outcome into the mirror
//!    store, failure undoes step 1
//!
//! ```text
//! Requests:  [1 add] [2 remove] [3 transfer]
//!                │        │          │
//! In flight: {1, 2, 3}
//!                │
//! Response:  Predicted(1) ok ──► replay, destroy world item, in flight {2, 3}
//! Response:  Predicted(1) ok ──► duplicate, ignored
//! Response:  Authority(7)  ok ──► replay, last authority sequence 7
//! Response:  Authority(7)  ok ──► duplicate, ignored
//! ```
//!
//! Replays are idempotent: the mirror is keyed by item id, so applying the
//! same outcome twice leaves exactly one copy.

use std::collections::BTreeMap;

use reliquary_inventory::{
    ActorId, CategoryQuery, InventoryStore, ItemCategory, ItemId, WorldItemHandle, WorldSpawner,
};

use crate::events::InventoryEvent;
use crate::messages::{InventoryRequest, InventoryResponse, Origin, Sequence, TransferResponse};

/// An operation awaiting its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingOperation {
    /// Add in flight.
    Add {
        /// Requested database id.
        database_id: String,
        /// World item hidden while pending.
        world_item: Option<WorldItemHandle>,
        /// Requested category.
        category: ItemCategory,
    },
    /// Transfer in flight.
    Transfer {
        /// Item being moved.
        id: ItemId,
        /// Other store.
        peer: ActorId,
        /// Search scope.
        category: CategoryQuery,
    },
    /// Remove in flight.
    Remove {
        /// Item being removed.
        id: ItemId,
        /// Its category.
        category: ItemCategory,
        /// Whether it will be dropped.
        drop: bool,
    },
}

impl From<&InventoryRequest> for PendingOperation {
    fn from(request: &InventoryRequest) -> Self {
        match request {
            InventoryRequest::Add(r) => Self::Add {
                database_id: r.database_id.clone(),
                world_item: r.world_item,
                category: r.category,
            },
            InventoryRequest::Transfer(r) => Self::Transfer {
                id: r.id,
                peer: r.peer,
                category: r.category,
            },
            InventoryRequest::Remove(r) => Self::Remove {
                id: r.id,
                category: r.category,
                drop: r.drop,
            },
        }
    }
}

/// Predicted view of one actor's inventory.
pub struct Predictor<W: WorldSpawner> {
    mirror: InventoryStore,
    in_flight: BTreeMap<Sequence, PendingOperation>,
    /// Highest authority-started sequence applied so far.
    last_authority: Sequence,
    spawner: W,
    log: bool,
}

impl<W: WorldSpawner> Predictor<W> {
    /// Creates a predictor with an empty mirror for `owner`.
    pub fn new(owner: ActorId, spawner: W, log: bool) -> Self {
        Self::with_store(InventoryStore::new(owner), spawner, log)
    }

    /// Creates a predictor starting from a known store, e.g. a loaded save.
    pub fn with_store(mirror: InventoryStore, spawner: W, log: bool) -> Self {
        Self {
            mirror,
            in_flight: BTreeMap::new(),
            last_authority: 0,
            spawner,
            log,
        }
    }

    /// The mirrored store.
    #[must_use]
    pub fn store(&self) -> &InventoryStore {
        &self.mirror
    }

    /// Operations awaiting a response, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = (Sequence, &PendingOperation)> {
        self.in_flight.iter().map(|(sequence, op)| (*sequence, op))
    }

    /// Number of operations awaiting a response.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Records `request` as in flight and applies its pending-client change.
    pub fn begin(&mut self, request: &InventoryRequest) {
        if let InventoryRequest::Add(add) = request {
            if let Some(handle) = add.world_item {
                self.spawner.set_visible(handle, false);
            }
        }

        if self.log {
            tracing::info!(
                owner = %self.mirror.owner(),
                sequence = request.sequence(),
                op = request.kind(),
                "predictor: request pending"
            );
        }
        self.in_flight.insert(request.sequence(), PendingOperation::from(request));
    }

    /// Drops an in-flight operation that never reached the authority and
    /// undoes its pending-client change.
    pub fn abandon(&mut self, sequence: Sequence) -> Option<PendingOperation> {
        let pending = self.in_flight.remove(&sequence)?;
        self.revert(&pending);
        Some(pending)
    }

    /// Applies an authority response.
    ///
    /// Returns the terminal event to publish, or `None` for a response that
    /// isn't for this actor, answers a sequence no longer in flight, or
    /// repeats an authority-started operation already applied.
    pub fn reconcile(&mut self, response: &InventoryResponse) -> Option<InventoryEvent> {
        if response.actor() != self.mirror.owner() {
            tracing::warn!(
                owner = %self.mirror.owner(),
                actor = %response.actor(),
                "predictor: response for another actor ignored"
            );
            return None;
        }

        let pending = match response.origin() {
            Origin::Predicted(sequence) => {
                let Some(pending) = self.in_flight.remove(&sequence) else {
                    tracing::debug!(sequence, "predictor: duplicate response ignored");
                    return None;
                };
                Some(pending)
            }
            Origin::Authority(sequence) => {
                if sequence <= self.last_authority {
                    tracing::debug!(sequence, "predictor: duplicate authority response ignored");
                    return None;
                }
                self.last_authority = sequence;
                None
            }
        };

        if response.success() {
            self.replay(response);
        } else if let Some(pending) = &pending {
            self.revert(pending);
        }

        if self.log {
            tracing::info!(
                owner = %self.mirror.owner(),
                origin = ?response.origin(),
                success = response.success(),
                failure = ?response.failure(),
                "predictor: response reconciled"
            );
        }

        Some(InventoryEvent::from_response(response))
    }

    /// Replays a successful outcome into the mirror.
    fn replay(&mut self, response: &InventoryResponse) {
        match response {
            InventoryResponse::Add(r) => {
                if let Some(record) = &r.record {
                    if let Err(err) = self.mirror.insert(record.clone()) {
                        tracing::error!(error = %err, "predictor: authority record rejected by mirror");
                    }
                }
                if let Some(handle) = r.world_item {
                    self.spawner.destroy(handle);
                }
            }
            InventoryResponse::Transfer(r) => replay_transfer(&mut self.mirror, None, r),
            InventoryResponse::Remove(r) => {
                self.mirror.remove(r.id, r.category);
            }
        }
    }

    /// Undoes the pending-client change of `pending`.
    fn revert(&mut self, pending: &PendingOperation) {
        if let PendingOperation::Add {
            world_item: Some(handle),
            ..
        } = pending
        {
            self.spawner.set_visible(*handle, true);
        }
    }
}

/// Replays a successful transfer into the initiator's store and, when it is
/// mirrored too, the peer's.
///
/// Uses the authority's `from_this_inventory` rather than re-deriving it, so
/// replaying twice leaves the record in the destination store only.
pub fn replay_transfer(
    initiator: &mut InventoryStore,
    peer: Option<&mut InventoryStore>,
    response: &TransferResponse,
) {
    let Some(record) = response.record.as_ref().filter(|_| response.success) else {
        return;
    };

    let (source, destination) = if response.from_this_inventory {
        (Some(initiator), peer)
    } else {
        (peer, Some(initiator))
    };

    if let Some(source) = source {
        source.remove(record.id, record.category);
    }
    if let Some(destination) = destination {
        if let Err(err) = destination.insert(record.clone()) {
            tracing::error!(error = %err, "transfer replay rejected by destination store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::mock::MockSpawner;
    use reliquary_inventory::{ItemRecord, Transform};

    const OWNER: ActorId = ActorId(1);

    fn add_request(sequence: Sequence, world_item: Option<WorldItemHandle>) -> InventoryRequest {
        InventoryRequest::add(sequence, OWNER, "apple", world_item, ItemCategory::Item).unwrap()
    }

    fn add_response(request: &InventoryRequest, outcome: Result<ItemRecord, FailureReason>) -> InventoryResponse {
        let InventoryRequest::Add(add) = request else {
            panic!("not an add");
        };
        InventoryResponse::Add(add.respond(Origin::Predicted(add.sequence), outcome))
    }

    #[test]
    fn test_success_replays_and_destroys() {
        let world = MockSpawner::new();
        let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());
        let mut predictor = Predictor::new(OWNER, world.clone(), false);

        let request = add_request(1, Some(handle));
        predictor.begin(&request);
        assert_eq!(world.is_visible(handle), Some(false));
        assert_eq!(predictor.in_flight(), 1);

        let record = ItemRecord::new("apple", ItemCategory::Item).with_id(ItemId::new());
        let event = predictor.reconcile(&add_response(&request, Ok(record.clone()))).unwrap();

        assert!(event.is_success());
        assert_eq!(predictor.store().get(record.id, ItemCategory::Item), Some(&record));
        assert!(!world.contains(handle));
        assert_eq!(predictor.in_flight(), 0);
    }

    #[test]
    fn test_failure_unhides() {
        let world = MockSpawner::new();
        let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());
        let mut predictor = Predictor::new(OWNER, world.clone(), false);

        let request = add_request(1, Some(handle));
        predictor.begin(&request);
        let event = predictor
            .reconcile(&add_response(&request, Err(FailureReason::Locked { holder: ActorId(2) })))
            .unwrap();

        assert!(!event.is_success());
        assert_eq!(world.is_visible(handle), Some(true));
        assert!(predictor.store().is_empty());
    }

    #[test]
    fn test_duplicate_delivery_ignored() {
        let mut predictor = Predictor::new(OWNER, MockSpawner::new(), false);
        let request = add_request(5, None);
        predictor.begin(&request);

        let record = ItemRecord::new("apple", ItemCategory::Item).with_id(ItemId::new());
        let response = add_response(&request, Ok(record));
        assert!(predictor.reconcile(&response).is_some());
        assert!(predictor.reconcile(&response).is_none());
        assert_eq!(predictor.store().len(), 1);
    }

    #[test]
    fn test_authority_redelivery_ignored() {
        let mut predictor = Predictor::new(OWNER, MockSpawner::new(), false);
        let InventoryRequest::Add(add) = add_request(1, None) else {
            panic!("not an add");
        };
        let record = ItemRecord::new("apple", ItemCategory::Item).with_id(ItemId::new());
        let first = InventoryResponse::Add(add.respond(Origin::Authority(3), Ok(record.clone())));
        let older = InventoryResponse::Add(add.respond(Origin::Authority(2), Ok(record)));

        assert!(predictor.reconcile(&first).is_some());
        assert!(predictor.reconcile(&first).is_none());
        assert!(predictor.reconcile(&older).is_none());
        assert_eq!(predictor.store().len(), 1);
    }

    #[test]
    fn test_abandon_reverts() {
        let world = MockSpawner::new();
        let handle = world.place(ItemRecord::new("apple", ItemCategory::Item), Transform::default());
        let mut predictor = Predictor::new(OWNER, world.clone(), false);

        predictor.begin(&add_request(3, Some(handle)));
        assert!(predictor.abandon(3).is_some());
        assert_eq!(world.is_visible(handle), Some(true));
        assert_eq!(predictor.pending().count(), 0);
    }
}
