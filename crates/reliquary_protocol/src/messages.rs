//! # Operation Messages
//!
//! Requests travel predictor → authority, responses authority → predictor.
//!
//! ```text
//! PREDICTOR                                 AUTHORITY
//!   |--- AddRequest { seq, db id, handle } --->|
//!   |                                          | lock, resolve, insert
//!   |<-- AddResponse { Predicted(seq), ok, record }
//! ```
//!
//! A request carries only the identifying data. A response echoes it and adds
//! whatever the authority resolved (the record, the origin side of a
//! transfer, a spawned handle) so the predictor reconciles without a second
//! round trip.
//!
//! On a real transport both are encoded as JSON with `to_wire`/`from_wire`.

use serde::{Deserialize, Serialize};

use reliquary_inventory::{ActorId, CategoryQuery, ItemCategory, ItemId, ItemRecord, WorldItemHandle};

use crate::error::{FailureReason, ProtocolResult, Rejection};

/// Per-node request counter.
pub type Sequence = u64;

/// Who started the operation a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A predictor's forwarded request with this sequence.
    Predicted(Sequence),
    /// The authority acted on its own, numbered by the authority node.
    Authority(Sequence),
}

/// Add a content item or a world item to the actor's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    /// Sender's sequence number.
    pub sequence: Sequence,
    /// Owner of the target store.
    pub actor: ActorId,
    /// Content database id, may be empty when `world_item` is set.
    pub database_id: String,
    /// World item being picked up.
    pub world_item: Option<WorldItemHandle>,
    /// Category the caller expects.
    pub category: ItemCategory,
}

/// Move an item between the actor's store and a peer store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Sender's sequence number.
    pub sequence: Sequence,
    /// Initiating actor.
    pub actor: ActorId,
    /// Item to move.
    pub id: ItemId,
    /// Owner of the other store.
    pub peer: ActorId,
    /// Where to search in each store.
    pub category: CategoryQuery,
}

/// Remove an item, optionally dropping it into the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    /// Sender's sequence number.
    pub sequence: Sequence,
    /// Owner of the target store.
    pub actor: ActorId,
    /// Item to remove.
    pub id: ItemId,
    /// Category holding the item.
    pub category: ItemCategory,
    /// Spawn a world item from the record before removing it.
    pub drop: bool,
}

/// Any operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InventoryRequest {
    /// Add.
    Add(AddRequest),
    /// Transfer.
    Transfer(TransferRequest),
    /// Remove.
    Remove(RemoveRequest),
}

impl InventoryRequest {
    /// Builds an add request.
    ///
    /// # Errors
    ///
    /// `Rejection::MissingItemReference` when `database_id` is empty and no
    /// world item is named.
    pub fn add(
        sequence: Sequence,
        actor: ActorId,
        database_id: impl Into<String>,
        world_item: Option<WorldItemHandle>,
        category: ItemCategory,
    ) -> Result<Self, Rejection> {
        let database_id = database_id.into();
        if database_id.is_empty() && world_item.is_none() {
            return Err(Rejection::MissingItemReference);
        }

        Ok(Self::Add(AddRequest {
            sequence,
            actor,
            database_id,
            world_item,
            category,
        }))
    }

    /// Builds a transfer request.
    ///
    /// # Errors
    ///
    /// `Rejection::InvalidItemId` for a nil id, `Rejection::MissingPeer`
    /// without a peer and `Rejection::SelfTransfer` when the peer is `actor`.
    pub fn transfer(
        sequence: Sequence,
        actor: ActorId,
        id: ItemId,
        peer: Option<ActorId>,
        category: impl Into<CategoryQuery>,
    ) -> Result<Self, Rejection> {
        if !id.is_valid() {
            return Err(Rejection::InvalidItemId);
        }
        let peer = peer.ok_or(Rejection::MissingPeer)?;
        if peer == actor {
            return Err(Rejection::SelfTransfer);
        }

        Ok(Self::Transfer(TransferRequest {
            sequence,
            actor,
            id,
            peer,
            category: category.into(),
        }))
    }

    /// Builds a remove request.
    ///
    /// # Errors
    ///
    /// `Rejection::InvalidItemId` for a nil id.
    pub fn remove(
        sequence: Sequence,
        actor: ActorId,
        id: ItemId,
        category: ItemCategory,
        drop: bool,
    ) -> Result<Self, Rejection> {
        if !id.is_valid() {
            return Err(Rejection::InvalidItemId);
        }

        Ok(Self::Remove(RemoveRequest {
            sequence,
            actor,
            id,
            category,
            drop,
        }))
    }

    /// The sender's sequence number.
    #[must_use]
    pub fn sequence(&self) -> Sequence {
        match self {
            Self::Add(r) => r.sequence,
            Self::Transfer(r) => r.sequence,
            Self::Remove(r) => r.sequence,
        }
    }

    /// The owning/initiating actor.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        match self {
            Self::Add(r) => r.actor,
            Self::Transfer(r) => r.actor,
            Self::Remove(r) => r.actor,
        }
    }

    /// Operation name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Transfer(_) => "transfer",
            Self::Remove(_) => "remove",
        }
    }

    /// Encodes for the wire.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Codec` if encoding fails.
    pub fn to_wire(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from the wire.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Codec` for malformed bytes.
    pub fn from_wire(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Outcome of an add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    /// Who started the operation.
    pub origin: Origin,
    /// Owner of the target store.
    pub actor: ActorId,
    /// Whether the store changed.
    pub success: bool,
    /// Why not, when `success` is false.
    pub failure: Option<FailureReason>,
    /// Echoed database id.
    pub database_id: String,
    /// Echoed world item.
    pub world_item: Option<WorldItemHandle>,
    /// Echoed category.
    pub category: ItemCategory,
    /// The record the authority inserted.
    pub record: Option<ItemRecord>,
}

/// Outcome of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Who started the operation.
    pub origin: Origin,
    /// Initiating actor.
    pub actor: ActorId,
    /// Whether the item moved.
    pub success: bool,
    /// Why not, when `success` is false.
    pub failure: Option<FailureReason>,
    /// Echoed item id.
    pub id: ItemId,
    /// Echoed peer.
    pub peer: ActorId,
    /// Echoed category query.
    pub category: CategoryQuery,
    /// True when the item left the initiator's store.
    pub from_this_inventory: bool,
    /// The moved record.
    pub record: Option<ItemRecord>,
}

/// Outcome of a remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    /// Who started the operation.
    pub origin: Origin,
    /// Owner of the target store.
    pub actor: ActorId,
    /// Whether the removal went through.
    pub success: bool,
    /// Why not, when `success` is false.
    pub failure: Option<FailureReason>,
    /// Echoed item id.
    pub id: ItemId,
    /// Echoed category.
    pub category: ItemCategory,
    /// Echoed drop flag.
    pub dropped: bool,
    /// World item spawned for a drop. Empty if spawning failed.
    pub spawned: Option<WorldItemHandle>,
}

impl AddRequest {
    /// Builds the response for `outcome`.
    #[must_use]
    pub fn respond(&self, origin: Origin, outcome: Result<ItemRecord, FailureReason>) -> AddResponse {
        let (success, failure, record) = split(outcome);
        AddResponse {
            origin,
            actor: self.actor,
            success,
            failure,
            database_id: self.database_id.clone(),
            world_item: self.world_item,
            category: self.category,
            record,
        }
    }
}

impl TransferRequest {
    /// Builds the response for `outcome`: the moved record and whether it
    /// came from the initiator's store.
    #[must_use]
    pub fn respond(
        &self,
        origin: Origin,
        outcome: Result<(ItemRecord, bool), FailureReason>,
    ) -> TransferResponse {
        let (success, failure, moved) = split(outcome);
        let from_this_inventory = moved.as_ref().is_some_and(|(_, from)| *from);
        TransferResponse {
            origin,
            actor: self.actor,
            success,
            failure,
            id: self.id,
            peer: self.peer,
            category: self.category,
            from_this_inventory,
            record: moved.map(|(record, _)| record),
        }
    }
}

impl RemoveRequest {
    /// Builds the response for `outcome`: the spawned handle, if any.
    #[must_use]
    pub fn respond(
        &self,
        origin: Origin,
        outcome: Result<Option<WorldItemHandle>, FailureReason>,
    ) -> RemoveResponse {
        let (success, failure, spawned) = split(outcome);
        RemoveResponse {
            origin,
            actor: self.actor,
            success,
            failure,
            id: self.id,
            category: self.category,
            dropped: self.drop,
            spawned: spawned.flatten(),
        }
    }
}

fn split<T>(outcome: Result<T, FailureReason>) -> (bool, Option<FailureReason>, Option<T>) {
    match outcome {
        Ok(value) => (true, None, Some(value)),
        Err(reason) => (false, Some(reason), None),
    }
}

/// Any operation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InventoryResponse {
    /// Add.
    Add(AddResponse),
    /// Transfer.
    Transfer(TransferResponse),
    /// Remove.
    Remove(RemoveResponse),
}

impl InventoryResponse {
    /// Who started the operation.
    #[must_use]
    pub fn origin(&self) -> Origin {
        match self {
            Self::Add(r) => r.origin,
            Self::Transfer(r) => r.origin,
            Self::Remove(r) => r.origin,
        }
    }

    /// The owning/initiating actor.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        match self {
            Self::Add(r) => r.actor,
            Self::Transfer(r) => r.actor,
            Self::Remove(r) => r.actor,
        }
    }

    /// Whether the authority applied the request.
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Add(r) => r.success,
            Self::Transfer(r) => r.success,
            Self::Remove(r) => r.success,
        }
    }

    /// The authority's failure reason.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Add(r) => r.failure.as_ref(),
            Self::Transfer(r) => r.failure.as_ref(),
            Self::Remove(r) => r.failure.as_ref(),
        }
    }

    /// Encodes for the wire.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Codec` if encoding fails.
    pub fn to_wire(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from the wire.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Codec` for malformed bytes.
    pub fn from_wire(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
