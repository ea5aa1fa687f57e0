//! # RELIQUARY Protocol
//!
//! Authoritative inventory synchronization with optimistic prediction.
//!
//! ## Architecture
//!
//! - **Roles**: every node is `Authority`, `Predictor` or `Both`, fixed at construction
//! - **Authority**: owns the canonical stores and is the only place they change
//! - **Prediction**: the controlling node hides/reserves optimistically and
//!   replays the authority's outcome when it arrives
//! - **Channels**: one protocol, two strategies (in-process or JSON transport)
//!
//! ## Operation Flow
//!
//! ```text
//! PREDICTOR                                AUTHORITY
//!   | try_add: hide world item                |
//!   |--- AddRequest { seq } ----------------->|
//!   |                                         | lock, resolve, insert, release
//!   |<-- AddResponse { Predicted(seq) } ------|
//!   | replay into mirror, destroy world item  |
//!   | emit AddSucceeded                       |
//! ```
//!
//! The predictor never decides an outcome. It only replays what the
//! authority resolved.
//!
//! ## Example
//!
//! ```rust
//! use reliquary_inventory::{ActorId, ContentTable, ItemCategory, ItemRecord, Transform};
//! use reliquary_protocol::{InventoryAuthority, InventoryComponent, LocalChannel, MockSpawner, NodeConfig};
//!
//! let mut content = ContentTable::new();
//! content.register(ItemRecord::new("sword_01", ItemCategory::Weapon));
//!
//! let config = NodeConfig::default(); // Role::Both
//! let world = MockSpawner::new();
//! let mut authority = InventoryAuthority::new(&config, content, world.clone());
//! authority.register(ActorId(1), Transform::default());
//!
//! let channel = LocalChannel::new(authority.into_shared());
//! let mut inventory = InventoryComponent::new(&config, ActorId(1), channel, world).unwrap();
//!
//! inventory.try_add("sword_01", None, ItemCategory::Weapon).unwrap();
//! assert_eq!(inventory.store().len(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod authority;
pub mod channel;
pub mod component;
pub mod config;
pub mod error;
pub mod events;
pub mod golden_path;
pub mod messages;
pub mod mock;
pub mod predictor;
pub mod role;
pub mod server;

// Re-exports for convenience
pub use authority::{InventoryAuthority, SharedAuthority};
pub use channel::{
    channel_pair, AuthorityEndpoint, LocalChannel, LocalLink, PredictorEndpoint, PredictorLink, RemoteCallChannel,
};
pub use component::{Accepted, InventoryComponent};
pub use config::NodeConfig;
pub use error::{FailureReason, ProtocolError, ProtocolResult, Rejection};
pub use events::{InventoryEvent, NotificationSink};
pub use messages::{
    AddRequest, AddResponse, InventoryRequest, InventoryResponse, Origin, RemoveRequest, RemoveResponse, Sequence,
    TransferRequest, TransferResponse,
};
pub use mock::{MockSpawner, RecordingChannel};
pub use predictor::{replay_transfer, PendingOperation, Predictor};
pub use role::Role;
pub use server::{AuthorityServer, ServerStats};
