//! # Remote Call Channel
//!
//! Strategy objects carrying requests to the authority and responses back.
//! The operation protocol is written once against [`RemoteCallChannel`] and
//! runs unchanged over either strategy:
//!
//! ```text
//! collapsed:  InventoryComponent ─► LocalChannel ─► InventoryAuthority::handle   (same call)
//!
//! networked:  InventoryComponent ─► PredictorEndpoint ══ JSON bytes ══► AuthorityEndpoint
//!                                                                        │
//!                                                          AuthorityServer::process_requests
//! ```
//!
//! Delivery is reliable and ordered per channel. Nothing is ordered across
//! channels.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use reliquary_inventory::WorldSpawner;

use crate::authority::SharedAuthority;
use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::{InventoryRequest, InventoryResponse};

/// Predictor side of a remote call channel.
pub trait RemoteCallChannel {
    /// Fire-and-forget delivery of `request` to the authority.
    ///
    /// # Errors
    ///
    /// Returns an error when the request can't be handed to the transport.
    fn send_to_authority(&mut self, request: &InventoryRequest) -> ProtocolResult<()>;

    /// Responses that arrived since the last poll, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ChannelClosed` once the authority is gone.
    fn poll_responses(&mut self) -> ProtocolResult<Vec<InventoryResponse>>;
}

/// Authority side of a remote call channel, one per connected predictor.
pub trait PredictorLink {
    /// Requests that arrived since the last poll, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ChannelClosed` once the predictor is gone.
    fn poll_requests(&mut self) -> ProtocolResult<Vec<InventoryRequest>>;

    /// Fire-and-forget delivery of `response` to the predictor.
    ///
    /// # Errors
    ///
    /// Returns an error when the response can't be handed to the transport.
    fn send_to_predictor(&mut self, response: &InventoryResponse) -> ProtocolResult<()>;
}

// ============================================================================
// COLLAPSED MODE
// ============================================================================

/// In-process channel: requests are executed by the authority inside
/// `send_to_authority`, without serialization.
pub struct LocalChannel<W: WorldSpawner> {
    authority: SharedAuthority<W>,
    inbox: Arc<Mutex<VecDeque<InventoryResponse>>>,
}

impl<W: WorldSpawner> LocalChannel<W> {
    /// Connects to an in-process authority.
    #[must_use]
    pub fn new(authority: SharedAuthority<W>) -> Self {
        Self {
            authority,
            inbox: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Authority-side handle delivering into this channel's inbox, for
    /// operations the authority starts on the local actor.
    #[must_use]
    pub fn link(&self) -> LocalLink {
        LocalLink {
            inbox: Arc::clone(&self.inbox),
        }
    }
}

impl<W: WorldSpawner> RemoteCallChannel for LocalChannel<W> {
    fn send_to_authority(&mut self, request: &InventoryRequest) -> ProtocolResult<()> {
        let response = self.authority.lock().handle(request);
        self.inbox.lock().push_back(response);
        Ok(())
    }

    fn poll_responses(&mut self) -> ProtocolResult<Vec<InventoryResponse>> {
        Ok(self.inbox.lock().drain(..).collect())
    }
}

/// Authority-side half of a [`LocalChannel`].
#[derive(Clone)]
pub struct LocalLink {
    inbox: Arc<Mutex<VecDeque<InventoryResponse>>>,
}

impl PredictorLink for LocalLink {
    fn poll_requests(&mut self) -> ProtocolResult<Vec<InventoryRequest>> {
        // Forwarded requests never queue: the local channel executes them inline.
        Ok(Vec::new())
    }

    fn send_to_predictor(&mut self, response: &InventoryResponse) -> ProtocolResult<()> {
        self.inbox.lock().push_back(response.clone());
        Ok(())
    }
}

// ============================================================================
// NETWORKED MODE
// ============================================================================

/// Creates a connected predictor/authority endpoint pair carrying JSON.
#[must_use]
pub fn channel_pair() -> (PredictorEndpoint, AuthorityEndpoint) {
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (response_tx, response_rx) = crossbeam_channel::unbounded();

    (
        PredictorEndpoint {
            to_authority: request_tx,
            from_authority: response_rx,
        },
        AuthorityEndpoint {
            to_predictor: response_tx,
            from_predictor: request_rx,
        },
    )
}

/// Predictor end of a channel pair.
pub struct PredictorEndpoint {
    to_authority: Sender<Vec<u8>>,
    from_authority: Receiver<Vec<u8>>,
}

/// Authority end of a channel pair.
pub struct AuthorityEndpoint {
    to_predictor: Sender<Vec<u8>>,
    from_predictor: Receiver<Vec<u8>>,
}

impl RemoteCallChannel for PredictorEndpoint {
    fn send_to_authority(&mut self, request: &InventoryRequest) -> ProtocolResult<()> {
        let bytes = request.to_wire()?;
        self.to_authority
            .send(bytes)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    fn poll_responses(&mut self) -> ProtocolResult<Vec<InventoryResponse>> {
        drain(&self.from_authority, InventoryResponse::from_wire)
    }
}

impl PredictorLink for AuthorityEndpoint {
    fn poll_requests(&mut self) -> ProtocolResult<Vec<InventoryRequest>> {
        drain(&self.from_predictor, InventoryRequest::from_wire)
    }

    fn send_to_predictor(&mut self, response: &InventoryResponse) -> ProtocolResult<()> {
        let bytes = response.to_wire()?;
        self.to_predictor
            .send(bytes)
            .map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// Drains and decodes everything queued on `receiver`.
///
/// Undecodable messages are logged and skipped. A disconnected, empty
/// channel is `ChannelClosed`.
fn drain<T>(
    receiver: &Receiver<Vec<u8>>,
    decode: impl Fn(&[u8]) -> ProtocolResult<T>,
) -> ProtocolResult<Vec<T>> {
    let mut messages = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(bytes) => match decode(&bytes) {
                Ok(message) => messages.push(message),
                Err(err) => tracing::error!(error = %err, len = bytes.len(), "discarding undecodable message"),
            },
            Err(TryRecvError::Empty) => return Ok(messages),
            Err(TryRecvError::Disconnected) if messages.is_empty() => {
                return Err(ProtocolError::ChannelClosed)
            }
            Err(TryRecvError::Disconnected) => return Ok(messages),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_inventory::{ActorId, ItemCategory};

    #[test]
    fn test_pair_carries_request() {
        let (mut predictor, mut authority) = channel_pair();
        let request = InventoryRequest::add(1, ActorId(1), "apple", None, ItemCategory::Item).unwrap();

        predictor.send_to_authority(&request).unwrap();
        assert_eq!(authority.poll_requests().unwrap(), vec![request]);
        assert!(authority.poll_requests().unwrap().is_empty());
    }

    #[test]
    fn test_closed_peer_reported() {
        let (mut predictor, authority) = channel_pair();
        drop(authority);

        let request = InventoryRequest::add(1, ActorId(1), "apple", None, ItemCategory::Item).unwrap();
        assert!(matches!(
            predictor.send_to_authority(&request),
            Err(ProtocolError::ChannelClosed)
        ));
        assert!(matches!(predictor.poll_responses(), Err(ProtocolError::ChannelClosed)));
    }

    #[test]
    fn test_garbage_skipped() {
        let (predictor, mut authority) = channel_pair();
        predictor.to_authority.send(b"not json".to_vec()).unwrap();
        assert!(authority.poll_requests().unwrap().is_empty());
    }
}
