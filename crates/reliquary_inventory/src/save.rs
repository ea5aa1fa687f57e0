//! # Save Records
//!
//! The flat persisted form of a store: one entry per retained item.
//!
//! ```text
//! SaveRecord { owner_net_id, platform_id, items: [(id, database_id, sort_order)] }
//! ```
//!
//! Only identity, content reference and display order are kept. Everything
//! else is rebuilt from the content table on load.

use serde::{Deserialize, Serialize};

use crate::content::ContentLookup;
use crate::error::InventoryResult;
use crate::item::{ItemCategory, ItemId};
use crate::store::{ActorId, InventoryStore};

/// One retained item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedItem {
    /// Instance identity.
    pub id: ItemId,
    /// Content database reference.
    pub database_id: String,
    /// Display order.
    pub sort_order: i32,
}

impl SavedItem {
    /// True when the entry names a content item.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.database_id.is_empty()
    }
}

/// A character's saved inventory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    /// Owner's network id.
    pub owner_net_id: u32,
    /// Owner's platform account id.
    pub platform_id: String,
    /// Retained items, in display order.
    #[serde(default)]
    pub items: Vec<SavedItem>,
}

impl SaveRecord {
    /// Captures `store`, ordering entries by sort order then category.
    #[must_use]
    pub fn capture(store: &InventoryStore, platform_id: impl Into<String>) -> Self {
        let mut ordered: Vec<(i32, ItemCategory, SavedItem)> = store
            .iter()
            .map(|record| {
                (
                    record.sort_order,
                    record.category,
                    SavedItem {
                        id: record.id,
                        database_id: record.database_id.clone(),
                        sort_order: record.sort_order,
                    },
                )
            })
            .collect();
        ordered.sort_by(|a, b| (a.0, a.1, a.2.id).cmp(&(b.0, b.1, b.2.id)));

        Self {
            owner_net_id: store.owner().0,
            platform_id: platform_id.into(),
            items: ordered.into_iter().map(|(_, _, item)| item).collect(),
        }
    }

    /// Rebuilds a store from this record.
    ///
    /// Each entry takes its template from `content` and keeps its saved id and
    /// sort order. Entries that are invalid or have no template are skipped.
    #[must_use]
    pub fn restore(&self, content: &dyn ContentLookup) -> InventoryStore {
        let mut store = InventoryStore::new(ActorId(self.owner_net_id));

        for saved in &self.items {
            if !saved.is_valid() || !saved.id.is_valid() {
                tracing::warn!(id = %saved.id, database_id = %saved.database_id, "skipping invalid saved item");
                continue;
            }

            let Some(template) = content.find_by_database_id(&saved.database_id) else {
                tracing::error!(id = %saved.id, database_id = %saved.database_id, "saved item has no content template");
                continue;
            };

            let record = template.with_id(saved.id).with_sort_order(saved.sort_order);
            if let Err(err) = store.insert(record) {
                tracing::error!(id = %saved.id, error = %err, "failed to restore saved item");
            }
        }

        store
    }

    /// Writes the record to the log.
    pub fn log_contents(&self, message: &str) {
        tracing::info!(
            net_id = self.owner_net_id,
            platform_id = %self.platform_id,
            items = self.items.len(),
            "save data: {message}"
        );
        for saved in &self.items {
            tracing::info!(
                sort_order = saved.sort_order,
                database_id = %saved.database_id,
                id = %saved.id,
                "  saved item"
            );
        }
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> InventoryResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Parses a record from TOML.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidConfig` for malformed input.
    pub fn from_toml_str(text: &str) -> InventoryResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentTable;
    use crate::item::{CategoryQuery, ItemRecord};

    fn content() -> ContentTable {
        let mut table = ContentTable::new();
        table.register(ItemRecord::new("sword_01", ItemCategory::Weapon).with_display_name("Iron Sword"));
        table.register(ItemRecord::new("apple", ItemCategory::Item));
        table
    }

    #[test]
    fn test_capture_orders_by_sort_order() {
        let mut store = InventoryStore::new(ActorId(9));
        let late = ItemRecord::new("apple", ItemCategory::Item).with_id(ItemId::new()).with_sort_order(5);
        let early = ItemRecord::new("sword_01", ItemCategory::Weapon).with_id(ItemId::new()).with_sort_order(1);
        store.insert(late.clone()).unwrap();
        store.insert(early.clone()).unwrap();

        let save = SaveRecord::capture(&store, "steam:42");
        assert_eq!(save.owner_net_id, 9);
        assert_eq!(save.platform_id, "steam:42");
        assert_eq!(save.items[0].id, early.id);
        assert_eq!(save.items[1].id, late.id);
    }

    #[test]
    fn test_restore_keeps_identity_and_skips_unknown() {
        let id = ItemId::new();
        let save = SaveRecord {
            owner_net_id: 3,
            platform_id: String::new(),
            items: vec![
                SavedItem { id, database_id: "sword_01".into(), sort_order: 2 },
                SavedItem { id: ItemId::new(), database_id: "gone".into(), sort_order: 3 },
                SavedItem { id: ItemId::new(), database_id: String::new(), sort_order: 4 },
            ],
        };

        let store = save.restore(&content());
        assert_eq!(store.owner(), ActorId(3));
        assert_eq!(store.len(), 1);

        let sword = store.get(id, CategoryQuery::Any).unwrap();
        assert_eq!(sword.category, ItemCategory::Weapon);
        assert_eq!(sword.sort_order, 2);
        assert_eq!(sword.display.display_name, "Iron Sword");
    }

    #[test]
    fn test_toml_round_trip() {
        let save = SaveRecord {
            owner_net_id: 1,
            platform_id: "local".into(),
            items: vec![SavedItem { id: ItemId::new(), database_id: "apple".into(), sort_order: -1 }],
        };
        let text = save.to_toml_string().unwrap();
        assert_eq!(SaveRecord::from_toml_str(&text).unwrap(), save);
    }
}
