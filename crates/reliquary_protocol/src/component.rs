//! # Inventory Component
//!
//! The per-actor front door on a predicting node.
//!
//! ```text
//! try_add / try_transfer / try_remove
//!   │
//!   ├─ malformed? ──► Err(Rejection)      no state change, nothing sent
//!   │
//!   ├─ predictor.begin       pending-client change
//!   ├─ channel.send_to_authority
//!   └─ pump                  whatever already came back is reconciled
//!
//! pump: poll responses ──► predictor.reconcile ──► NotificationSink
//! ```
//!
//! With a [`LocalChannel`](crate::channel::LocalChannel) the authority
//! answers inside `send_to_authority`, so the operation is resolved by the
//! time `try_*` returns. Over a real transport the outcome arrives on a later
//! `pump`. The code path is the same.

use crossbeam_channel::Receiver;

use reliquary_inventory::{
    ActorId, CategoryQuery, InventoryStore, ItemCategory, ItemId, WorldItemHandle, WorldSpawner,
};

use crate::channel::RemoteCallChannel;
use crate::config::NodeConfig;
use crate::error::{ProtocolError, ProtocolResult, Rejection};
use crate::events::{InventoryEvent, NotificationSink};
use crate::messages::{InventoryRequest, Sequence};
use crate::predictor::{PendingOperation, Predictor};
use crate::role::Role;

/// Receipt for a request handed to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Sequence the response will echo.
    pub sequence: Sequence,
}

/// Inventory operations for one locally controlled actor.
pub struct InventoryComponent<C: RemoteCallChannel, W: WorldSpawner> {
    role: Role,
    channel: C,
    predictor: Predictor<W>,
    sink: NotificationSink,
    last_sequence: Sequence,
}

impl<C: RemoteCallChannel, W: WorldSpawner> InventoryComponent<C, W> {
    /// Creates the component for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidConfig` for an invalid configuration or
    /// a node that doesn't predict.
    pub fn new(config: &NodeConfig, owner: ActorId, channel: C, spawner: W) -> ProtocolResult<Self> {
        Self::with_store(config, InventoryStore::new(owner), channel, spawner)
    }

    /// Creates the component starting from a known store.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_store(
        config: &NodeConfig,
        store: InventoryStore,
        channel: C,
        spawner: W,
    ) -> ProtocolResult<Self> {
        config.validate()?;
        if !config.role.predicts() {
            return Err(ProtocolError::InvalidConfig(format!(
                "inventory component needs a predicting role, node is {}",
                config.role
            )));
        }

        Ok(Self {
            role: config.role,
            channel,
            predictor: Predictor::with_store(store, spawner, config.log_predictor),
            sink: NotificationSink::new(config.event_capacity),
            last_sequence: 0,
        })
    }

    /// The owning actor.
    #[must_use]
    pub fn owner(&self) -> ActorId {
        self.predictor.store().owner()
    }

    /// This node's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The predicted store.
    #[must_use]
    pub fn store(&self) -> &InventoryStore {
        self.predictor.store()
    }

    /// Operations awaiting a response, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = (Sequence, &PendingOperation)> {
        self.predictor.pending()
    }

    /// Subscribes to terminal events.
    pub fn subscribe(&mut self) -> Receiver<InventoryEvent> {
        self.sink.subscribe()
    }

    /// The remote call channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Requests adding an item by database id and/or world item.
    ///
    /// # Errors
    ///
    /// `Rejection::MissingItemReference` when neither is given,
    /// `Rejection::ChannelUnavailable` when the request can't be sent.
    pub fn try_add(
        &mut self,
        database_id: &str,
        world_item: Option<WorldItemHandle>,
        category: ItemCategory,
    ) -> Result<Accepted, Rejection> {
        let request = InventoryRequest::add(self.next_sequence(), self.owner(), database_id, world_item, category)?;
        self.submit(&request)
    }

    /// Requests moving an item between this store and `peer`'s.
    ///
    /// # Errors
    ///
    /// `Rejection::InvalidItemId`, `Rejection::MissingPeer`,
    /// `Rejection::SelfTransfer` or `Rejection::ChannelUnavailable`.
    pub fn try_transfer(
        &mut self,
        id: ItemId,
        peer: Option<ActorId>,
        category: impl Into<CategoryQuery>,
    ) -> Result<Accepted, Rejection> {
        let request = InventoryRequest::transfer(self.next_sequence(), self.owner(), id, peer, category)?;
        self.submit(&request)
    }

    /// Requests removing an item, optionally dropping it into the world.
    ///
    /// # Errors
    ///
    /// `Rejection::InvalidItemId` or `Rejection::ChannelUnavailable`.
    pub fn try_remove(&mut self, id: ItemId, category: ItemCategory, drop: bool) -> Result<Accepted, Rejection> {
        let request = InventoryRequest::remove(self.next_sequence(), self.owner(), id, category, drop)?;
        self.submit(&request)
    }

    /// Reconciles every response that has arrived. Returns the number of
    /// events published.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ChannelClosed` once the authority is gone.
    pub fn pump(&mut self) -> ProtocolResult<usize> {
        let mut published = 0;
        for response in self.channel.poll_responses()? {
            if let Some(event) = self.predictor.reconcile(&response) {
                self.sink.emit(&event);
                published += 1;
            }
        }
        Ok(published)
    }

    /// Writes the predicted store to the log.
    pub fn log_contents(&self) {
        self.predictor.store().log_contents();
    }

    fn submit(&mut self, request: &InventoryRequest) -> Result<Accepted, Rejection> {
        self.predictor.begin(request);

        if let Err(err) = self.channel.send_to_authority(request) {
            tracing::warn!(
                owner = %self.owner(),
                sequence = request.sequence(),
                error = %err,
                "request could not be sent"
            );
            self.predictor.abandon(request.sequence());
            return Err(Rejection::ChannelUnavailable);
        }

        if let Err(err) = self.pump() {
            tracing::warn!(owner = %self.owner(), error = %err, "response poll failed");
        }

        Ok(Accepted {
            sequence: request.sequence(),
        })
    }

    fn next_sequence(&mut self) -> Sequence {
        self.last_sequence = self.last_sequence.wrapping_add(1);
        self.last_sequence
    }
}
