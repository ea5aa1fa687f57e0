//! # Inventory Store
//!
//! Per-owner collection of item records, partitioned by category.
//!
//! ```text
//! InventoryStore(owner)
//!   ├── Item      : ItemId -> ItemRecord
//!   ├── Armor     : ItemId -> ItemRecord
//!   ├── ...
//!   └── Custom    : ItemId -> ItemRecord
//! ```
//!
//! Keys are unique within one owner. A stored record always sits in the
//! section named by its own `category`, so inserting the same id twice
//! overwrites instead of duplicating.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::ContentLookup;
use crate::error::{InventoryError, InventoryResult};
use crate::item::{CategoryQuery, ItemCategory, ItemId, ItemRecord};

/// Network identity of a character/actor owning a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// A categorized inventory owned by exactly one actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryStore {
    owner: ActorId,
    sections: [HashMap<ItemId, ItemRecord>; ItemCategory::COUNT],
}

impl InventoryStore {
    /// Creates an empty store for `owner`.
    #[must_use]
    pub fn new(owner: ActorId) -> Self {
        Self {
            owner,
            sections: std::array::from_fn(|_| HashMap::new()),
        }
    }

    /// The owning actor.
    #[inline]
    #[must_use]
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Looks up a record.
    ///
    /// With [`CategoryQuery::Any`] every category is scanned in
    /// [`ItemCategory::ALL`] order and the first match wins; otherwise only the
    /// named category is searched.
    #[must_use]
    pub fn get(&self, id: ItemId, query: impl Into<CategoryQuery>) -> Option<&ItemRecord> {
        if !id.is_valid() {
            return None;
        }

        match query.into() {
            CategoryQuery::Only(category) => self.sections[category.index()].get(&id),
            CategoryQuery::Any => ItemCategory::ALL
                .iter()
                .find_map(|category| self.sections[category.index()].get(&id)),
        }
    }

    /// True when [`get`](Self::get) would find the record.
    #[must_use]
    pub fn contains(&self, id: ItemId, query: impl Into<CategoryQuery>) -> bool {
        self.get(id, query).is_some()
    }

    /// Inserts or overwrites a record under its own category.
    ///
    /// Returns the record previously stored under the same id, if any.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidRecord` for records without a valid id
    /// or database id.
    pub fn insert(&mut self, record: ItemRecord) -> InventoryResult<Option<ItemRecord>> {
        if !record.is_valid() {
            return Err(InventoryError::InvalidRecord {
                id: record.id,
                database_id: record.database_id,
            });
        }

        Ok(self.sections[record.category.index()].insert(record.id, record))
    }

    /// Removes a record from exactly one category.
    ///
    /// Removing an absent id is a no-op and returns `None`.
    pub fn remove(&mut self, id: ItemId, category: ItemCategory) -> Option<ItemRecord> {
        self.sections[category.index()].remove(&id)
    }

    /// Resolves a content template into a fresh record with a new identity.
    #[must_use]
    pub fn resolve_from_content(content: &dyn ContentLookup, database_id: &str) -> Option<ItemRecord> {
        if database_id.is_empty() {
            return None;
        }

        content
            .find_by_database_id(database_id)
            .map(|template| template.with_id(ItemId::new()))
    }

    /// Number of records across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.iter().map(HashMap::len).sum()
    }

    /// True when no category holds a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(HashMap::is_empty)
    }

    /// Records in one category, unordered.
    pub fn section(&self, category: ItemCategory) -> impl Iterator<Item = &ItemRecord> {
        self.sections[category.index()].values()
    }

    /// All records, category by category in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemRecord> {
        ItemCategory::ALL
            .into_iter()
            .flat_map(move |category| self.section(category))
    }

    /// Writes the store's contents to the log, grouped by category.
    pub fn log_contents(&self) {
        tracing::info!(owner = %self.owner, items = self.len(), "inventory listing");
        for category in ItemCategory::ALL {
            let section = &self.sections[category.index()];
            if section.is_empty() {
                continue;
            }

            let mut records: Vec<&ItemRecord> = section.values().collect();
            records.sort_by_key(|r| r.sort_order);
            for record in records {
                tracing::info!(
                    owner = %self.owner,
                    section = category.label(),
                    sort_order = record.sort_order,
                    id = %record.id,
                    database_id = %record.database_id,
                    display_name = %record.display.display_name,
                    "  item"
                );
            }
        }
    }
}
