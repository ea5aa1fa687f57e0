//! # Protocol Error Types
//!
//! Three separate kinds of "no":
//!
//! - [`Rejection`]: a malformed request, refused synchronously by `try_*`
//!   before anything is sent or changed
//! - [`FailureReason`]: the authority could not apply a request. Travels
//!   inside the response, never as `Err`
//! - [`ProtocolError`]: the node itself is misconfigured or its transport
//!   broke

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reliquary_inventory::{ActorId, InventoryError, WorldItemHandle};

/// Synchronous refusal of a `try_*` call. Nothing was sent, nothing changed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The authority has no store registered for the owning actor.
    #[error("owning actor {owner} cannot be resolved")]
    OwnerUnresolved {
        /// The actor that was named.
        owner: ActorId,
    },

    /// Add named neither a database id nor a world item.
    #[error("add request names neither a database id nor a world item")]
    MissingItemReference,

    /// The item id is nil.
    #[error("invalid item id")]
    InvalidItemId,

    /// Transfer without a peer store.
    #[error("transfer request has no peer store")]
    MissingPeer,

    /// Transfer whose peer is the owner itself.
    #[error("transfer peer is the owning actor")]
    SelfTransfer,

    /// The remote call channel refused the request.
    #[error("remote call channel unavailable")]
    ChannelUnavailable,
}

/// Why the authority could not apply a request.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Another operation holds the world item's pending lock.
    #[error("world item locked by {holder}")]
    Locked {
        /// Actor holding the lock.
        holder: ActorId,
    },

    /// The item is in none of the searched stores.
    #[error("item not found")]
    NotFound,

    /// Content lookup has no template for the database id.
    #[error("no content template for {database_id:?}")]
    ContentMiss {
        /// The database id that missed.
        database_id: String,
    },

    /// No store is registered for an actor named by the request.
    #[error("no inventory registered for {owner}")]
    UnknownStore {
        /// The unregistered actor.
        owner: ActorId,
    },

    /// The world item handle no longer resolves.
    #[error("world item {handle} does not exist")]
    WorldItemMissing {
        /// The stale handle.
        handle: WorldItemHandle,
    },

    /// The store refused the resolved record.
    #[error("store rejected record: {0}")]
    StoreRejected(String),
}

/// Node-level protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Error from the inventory layer.
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// A wire message could not be encoded or decoded.
    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The other end of a transport is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// Invalid node configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ProtocolError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for node-level protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
