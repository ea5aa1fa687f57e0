//! # Authority Server
//!
//! Drives an [`InventoryAuthority`] on an authority node: drains every
//! connected predictor's requests in arrival order, answers on the same link,
//! and runs operations the authority starts itself.
//!
//! ## Tick Order
//!
//! ```text
//! for each connected predictor, in actor order:
//!   1. poll requests
//!   2. drop requests naming a different actor
//!   3. authority.handle (one at a time, no yielding)
//!   4. send the response back on the same link
//! ```

use std::collections::BTreeMap;

use crossbeam_channel::Receiver;

use reliquary_inventory::{ActorId, CategoryQuery, ItemCategory, ItemId, WorldItemHandle, WorldSpawner};

use crate::authority::SharedAuthority;
use crate::channel::PredictorLink;
use crate::config::NodeConfig;
use crate::error::{ProtocolError, ProtocolResult, Rejection};
use crate::events::{InventoryEvent, NotificationSink};
use crate::messages::{InventoryRequest, InventoryResponse, Sequence};

/// Server statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Forwarded requests handled.
    pub requests_handled: u64,
    /// Requests dropped for naming another actor.
    pub requests_refused: u64,
    /// Responses that could not be delivered.
    pub delivery_failures: u64,
    /// Operations the authority started itself.
    pub authority_operations: u64,
}

/// Authority-side request loop.
pub struct AuthorityServer<W: WorldSpawner> {
    authority: SharedAuthority<W>,
    links: BTreeMap<ActorId, Box<dyn PredictorLink>>,
    sink: NotificationSink,
    last_sequence: Sequence,
    stats: ServerStats,
}

impl<W: WorldSpawner> AuthorityServer<W> {
    /// Creates a server around `authority`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidConfig` for an invalid configuration or
    /// a node without authority.
    pub fn new(config: &NodeConfig, authority: SharedAuthority<W>) -> ProtocolResult<Self> {
        config.validate()?;
        if !config.role.is_authority() {
            return Err(ProtocolError::InvalidConfig(format!(
                "authority server needs an authoritative role, node is {}",
                config.role
            )));
        }

        Ok(Self {
            authority,
            links: BTreeMap::new(),
            sink: NotificationSink::new(config.event_capacity),
            last_sequence: 0,
            stats: ServerStats::default(),
        })
    }

    /// The served authority.
    #[must_use]
    pub fn authority(&self) -> &SharedAuthority<W> {
        &self.authority
    }

    /// Connects the predictor controlling `actor`, replacing any previous link.
    pub fn connect(&mut self, actor: ActorId, link: impl PredictorLink + 'static) {
        self.links.insert(actor, Box::new(link));
        tracing::info!(%actor, "predictor connected");
    }

    /// Disconnects `actor`'s predictor.
    pub fn disconnect(&mut self, actor: ActorId) -> bool {
        let removed = self.links.remove(&actor).is_some();
        if removed {
            tracing::info!(%actor, "predictor disconnected");
        }
        removed
    }

    /// Subscribes to events of authority-started operations.
    pub fn subscribe(&mut self) -> Receiver<InventoryEvent> {
        self.sink.subscribe()
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Handles every queued request. Returns how many were handled.
    pub fn process_requests(&mut self) -> usize {
        let mut handled = 0;
        let mut closed = Vec::new();

        for (&actor, link) in &mut self.links {
            let requests = match link.poll_requests() {
                Ok(requests) => requests,
                Err(ProtocolError::ChannelClosed) => {
                    closed.push(actor);
                    continue;
                }
                Err(err) => {
                    tracing::error!(%actor, error = %err, "request poll failed");
                    continue;
                }
            };

            for request in requests {
                if request.actor() != actor {
                    tracing::warn!(
                        %actor,
                        named = %request.actor(),
                        op = request.kind(),
                        "request for another actor refused"
                    );
                    self.stats.requests_refused += 1;
                    continue;
                }

                let response = self.authority.lock().handle(&request);
                self.stats.requests_handled += 1;
                handled += 1;

                if let Err(err) = link.send_to_predictor(&response) {
                    tracing::warn!(%actor, error = %err, "response delivery failed");
                    self.stats.delivery_failures += 1;
                }
            }
        }

        for actor in closed {
            self.disconnect(actor);
        }

        handled
    }

    /// Adds an item to `actor`'s store on the authority's initiative.
    ///
    /// # Errors
    ///
    /// `Rejection::OwnerUnresolved` for an unregistered actor and the
    /// rejections of [`InventoryRequest::add`].
    pub fn try_add(
        &mut self,
        actor: ActorId,
        database_id: &str,
        world_item: Option<WorldItemHandle>,
        category: ItemCategory,
    ) -> Result<InventoryResponse, Rejection> {
        self.resolve_owner(actor)?;
        let request = InventoryRequest::add(self.next_sequence(), actor, database_id, world_item, category)?;
        Ok(self.execute(&request))
    }

    /// Moves an item between `actor`'s store and `peer`'s on the authority's
    /// initiative.
    ///
    /// # Errors
    ///
    /// `Rejection::OwnerUnresolved` for an unregistered actor and the
    /// rejections of [`InventoryRequest::transfer`].
    pub fn try_transfer(
        &mut self,
        actor: ActorId,
        id: ItemId,
        peer: Option<ActorId>,
        category: impl Into<CategoryQuery>,
    ) -> Result<InventoryResponse, Rejection> {
        self.resolve_owner(actor)?;
        let request = InventoryRequest::transfer(self.next_sequence(), actor, id, peer, category)?;
        Ok(self.execute(&request))
    }

    /// Removes an item from `actor`'s store on the authority's initiative.
    ///
    /// # Errors
    ///
    /// `Rejection::OwnerUnresolved` for an unregistered actor and the
    /// rejections of [`InventoryRequest::remove`].
    pub fn try_remove(
        &mut self,
        actor: ActorId,
        id: ItemId,
        category: ItemCategory,
        drop: bool,
    ) -> Result<InventoryResponse, Rejection> {
        self.resolve_owner(actor)?;
        let request = InventoryRequest::remove(self.next_sequence(), actor, id, category, drop)?;
        Ok(self.execute(&request))
    }

    fn resolve_owner(&self, actor: ActorId) -> Result<(), Rejection> {
        if self.authority.lock().is_registered(actor) {
            Ok(())
        } else {
            Err(Rejection::OwnerUnresolved { owner: actor })
        }
    }

    /// Executes, pushes the response to the owner's predictor, publishes the
    /// event.
    fn execute(&mut self, request: &InventoryRequest) -> InventoryResponse {
        let response = self.authority.lock().execute(request);
        self.stats.authority_operations += 1;

        if let Some(link) = self.links.get_mut(&request.actor()) {
            if let Err(err) = link.send_to_predictor(&response) {
                tracing::warn!(actor = %request.actor(), error = %err, "response delivery failed");
                self.stats.delivery_failures += 1;
            }
        }

        self.sink.emit(&InventoryEvent::from_response(&response));
        response
    }

    fn next_sequence(&mut self) -> Sequence {
        self.last_sequence = self.last_sequence.wrapping_add(1);
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::InventoryAuthority;
    use crate::channel::{channel_pair, RemoteCallChannel};
    use crate::messages::Origin;
    use crate::mock::MockSpawner;
    use crate::role::Role;
    use reliquary_inventory::{ContentTable, ItemRecord, Transform};

    fn server() -> AuthorityServer<MockSpawner> {
        let config = NodeConfig::for_role(Role::Authority);
        let mut content = ContentTable::new();
        content.register(ItemRecord::new("apple", ItemCategory::Item));
        let mut authority = InventoryAuthority::new(&config, content, MockSpawner::new());
        authority.register(ActorId(1), Transform::default());
        AuthorityServer::new(&config, authority.into_shared()).unwrap()
    }

    #[test]
    fn test_predictor_role_rejected() {
        let config = NodeConfig::for_role(Role::Predictor);
        let authority = InventoryAuthority::new(&config, ContentTable::new(), MockSpawner::new()).into_shared();
        assert!(AuthorityServer::new(&config, authority).is_err());
    }

    #[test]
    fn test_foreign_actor_refused() {
        let mut server = server();
        let (mut predictor, link) = channel_pair();
        server.connect(ActorId(1), link);

        let forged = InventoryRequest::add(1, ActorId(2), "apple", None, ItemCategory::Item).unwrap();
        predictor.send_to_authority(&forged).unwrap();

        assert_eq!(server.process_requests(), 0);
        assert_eq!(server.stats().requests_refused, 1);
        assert!(predictor.poll_responses().unwrap().is_empty());
    }

    #[test]
    fn test_authority_initiated_add_reaches_predictor() {
        let mut server = server();
        let events = server.subscribe();
        let (mut predictor, link) = channel_pair();
        server.connect(ActorId(1), link);

        let response = server.try_add(ActorId(1), "apple", None, ItemCategory::Item).unwrap();
        assert!(response.success());
        assert_eq!(response.origin(), Origin::Authority(1));

        assert_eq!(predictor.poll_responses().unwrap(), vec![response]);
        assert!(events.try_recv().unwrap().is_success());
    }

    #[test]
    fn test_unregistered_owner_rejected() {
        let mut server = server();
        assert_eq!(
            server.try_remove(ActorId(9), ItemId::new(), ItemCategory::Item, false),
            Err(Rejection::OwnerUnresolved { owner: ActorId(9) })
        );
    }

    #[test]
    fn test_closed_link_disconnected() {
        let mut server = server();
        let (predictor, link) = channel_pair();
        server.connect(ActorId(1), link);
        drop(predictor);

        server.process_requests();
        assert!(!server.disconnect(ActorId(1)));
    }
}
