//! # Inventory Notifications
//!
//! Exactly one terminal event per caller-visible operation, written to every
//! subscriber without ever blocking the protocol.
//!
//! ```text
//! InventoryComponent ──emit──► NotificationSink ──try_send──► UI subscriber (bounded)
//!                                               └─try_send──► audio subscriber (bounded)
//! ```
//!
//! A full subscriber loses the event (with a warning). A disconnected
//! subscriber is dropped from the list.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use reliquary_inventory::{ActorId, CategoryQuery, ItemCategory, ItemId, ItemRecord, WorldItemHandle};

use crate::error::FailureReason;
use crate::messages::{InventoryResponse, Origin};

/// Terminal outcome of one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryEvent {
    /// An item entered the store.
    AddSucceeded {
        /// Store owner.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Database id from the request.
        database_id: String,
        /// World item that was picked up.
        world_item: Option<WorldItemHandle>,
        /// The inserted record.
        record: ItemRecord,
    },

    /// An add was refused.
    AddFailed {
        /// Store owner.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Database id from the request.
        database_id: String,
        /// World item from the request.
        world_item: Option<WorldItemHandle>,
        /// Category from the request.
        category: ItemCategory,
        /// Authority's reason.
        reason: Option<FailureReason>,
    },

    /// An item moved between stores.
    TransferSucceeded {
        /// Initiating actor.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Moved item.
        id: ItemId,
        /// The other store's owner.
        peer: ActorId,
        /// True when the item left the initiator's store.
        from_this_inventory: bool,
    },

    /// A transfer was refused.
    TransferFailed {
        /// Initiating actor.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Item from the request.
        id: ItemId,
        /// Peer from the request.
        peer: ActorId,
        /// Category query from the request.
        category: CategoryQuery,
        /// Authority's reason.
        reason: Option<FailureReason>,
    },

    /// An item left the store.
    RemoveSucceeded {
        /// Store owner.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Removed item.
        id: ItemId,
        /// Category it was removed from.
        category: ItemCategory,
        /// World item spawned by a drop.
        spawned: Option<WorldItemHandle>,
    },

    /// A remove was refused.
    RemoveFailed {
        /// Store owner.
        owner: ActorId,
        /// Who started the operation.
        origin: Origin,
        /// Item from the request.
        id: ItemId,
        /// Category from the request.
        category: ItemCategory,
        /// Authority's reason.
        reason: Option<FailureReason>,
    },
}

impl InventoryEvent {
    /// The event announcing `response`.
    #[must_use]
    pub fn from_response(response: &InventoryResponse) -> Self {
        match response {
            InventoryResponse::Add(r) => match (&r.record, r.success) {
                (Some(record), true) => Self::AddSucceeded {
                    owner: r.actor,
                    origin: r.origin,
                    database_id: r.database_id.clone(),
                    world_item: r.world_item,
                    record: record.clone(),
                },
                _ => Self::AddFailed {
                    owner: r.actor,
                    origin: r.origin,
                    database_id: r.database_id.clone(),
                    world_item: r.world_item,
                    category: r.category,
                    reason: r.failure.clone(),
                },
            },
            InventoryResponse::Transfer(r) if r.success => Self::TransferSucceeded {
                owner: r.actor,
                origin: r.origin,
                id: r.id,
                peer: r.peer,
                from_this_inventory: r.from_this_inventory,
            },
            InventoryResponse::Transfer(r) => Self::TransferFailed {
                owner: r.actor,
                origin: r.origin,
                id: r.id,
                peer: r.peer,
                category: r.category,
                reason: r.failure.clone(),
            },
            InventoryResponse::Remove(r) if r.success => Self::RemoveSucceeded {
                owner: r.actor,
                origin: r.origin,
                id: r.id,
                category: r.category,
                spawned: r.spawned,
            },
            InventoryResponse::Remove(r) => Self::RemoveFailed {
                owner: r.actor,
                origin: r.origin,
                id: r.id,
                category: r.category,
                reason: r.failure.clone(),
            },
        }
    }

    /// True for the `*Succeeded` variants.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::AddSucceeded { .. } | Self::TransferSucceeded { .. } | Self::RemoveSucceeded { .. }
        )
    }

    /// Who started the operation.
    #[must_use]
    pub fn origin(&self) -> Origin {
        match self {
            Self::AddSucceeded { origin, .. }
            | Self::AddFailed { origin, .. }
            | Self::TransferSucceeded { origin, .. }
            | Self::TransferFailed { origin, .. }
            | Self::RemoveSucceeded { origin, .. }
            | Self::RemoveFailed { origin, .. } => *origin,
        }
    }
}

/// Fan-out of terminal events to bounded subscriber queues.
pub struct NotificationSink {
    subscribers: Vec<Sender<InventoryEvent>>,
    capacity: usize,
    dropped: u64,
}

impl NotificationSink {
    /// Creates a sink whose subscribers each buffer `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Adds a subscriber.
    pub fn subscribe(&mut self) -> Receiver<InventoryEvent> {
        let (sender, receiver) = crossbeam_channel::bounded(self.capacity);
        self.subscribers.push(sender);
        receiver
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Events lost to full subscriber queues so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Delivers `event` to every subscriber without blocking.
    pub fn emit(&mut self, event: &InventoryEvent) {
        let mut dropped = 0;
        self.subscribers.retain(|subscriber| match subscriber.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        if dropped > 0 {
            self.dropped += dropped;
            tracing::warn!(dropped, origin = ?event.origin(), "notification subscriber full, event dropped");
        }
    }
}

impl Default for NotificationSink {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}
