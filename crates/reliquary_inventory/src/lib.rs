//! # RELIQUARY Inventory
//!
//! Item records and the per-owner inventory store behind the synchronization
//! protocol.
//!
//! ## Design Principles
//!
//! 1. **Identity-keyed** - Every record is keyed by its UUID; re-inserting overwrites
//! 2. **Categorized** - A record always lives in the section of its own category
//! 3. **Scoped locks** - World items carry a pending lock released on every exit path
//! 4. **External content** - Templates come from a content table loaded from TOML
//!
//! ## Example
//!
//! ```rust
//! use reliquary_inventory::{ActorId, CategoryQuery, ContentTable, InventoryStore, ItemCategory, ItemRecord};
//!
//! let mut content = ContentTable::new();
//! content.register(ItemRecord::new("sword_01", ItemCategory::Weapon));
//!
//! let mut store = InventoryStore::new(ActorId(1));
//! let sword = InventoryStore::resolve_from_content(&content, "sword_01").unwrap();
//! store.insert(sword.clone()).unwrap();
//!
//! assert_eq!(store.get(sword.id, CategoryQuery::Any), Some(&sword));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod content;
pub mod error;
pub mod item;
pub mod lock;
pub mod save;
pub mod store;
pub mod world;

pub use content::{ContentLookup, ContentTable};
pub use error::{InventoryError, InventoryResult};
pub use item::{CategoryQuery, DisplayFields, ItemCategory, ItemId, ItemRecord, WorldTemplate};
pub use lock::{PendingLock, PendingLockGuard};
pub use save::{SaveRecord, SavedItem};
pub use store::{ActorId, InventoryStore};
pub use world::{DetachedItem, SpawnedItem, Transform, WorldItem, WorldItemHandle, WorldSpawner};
