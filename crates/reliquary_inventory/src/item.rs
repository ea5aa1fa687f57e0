//! # Item Records
//!
//! The value type describing one inventory entry.
//!
//! A record is valid when it carries both an identity and a database id:
//!
//! ```text
//! is_valid := id != nil AND database_id != ""
//! ```
//!
//! Templates coming out of the content table have no identity of their own;
//! the authority assigns one exactly once when the item first enters a store.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identity of one item instance (same across all nodes).
///
/// The nil UUID is the "empty" identity and is never valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// The empty identity.
    pub const NIL: Self = Self(Uuid::nil());

    /// Creates a fresh random identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an identity from its string form.
    ///
    /// # Errors
    ///
    /// Returns the UUID parse error for malformed input.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true unless this is the empty identity.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition key deciding which section of a store holds a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Common items.
    Item,
    /// Wearable armor.
    Armor,
    /// Readable notes.
    Note,
    /// Quest items.
    QuestItem,
    /// Weapons.
    Weapon,
    /// Crafting materials.
    Material,
    /// Game-specific items.
    Custom,
}

impl ItemCategory {
    /// Number of categories.
    pub const COUNT: usize = 7;

    /// Every category, in the fixed order wildcard lookups scan them.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Item,
        Self::Armor,
        Self::Note,
        Self::QuestItem,
        Self::Weapon,
        Self::Material,
        Self::Custom,
    ];

    /// Index of this category's section.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable section name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Item => "Common Items",
            Self::Armor => "Armors",
            Self::Note => "Notes",
            Self::QuestItem => "Quest Items",
            Self::Weapon => "Armaments",
            Self::Material => "Materials",
            Self::Custom => "Custom Items",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which categories a lookup may search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryQuery {
    /// Search every category in [`ItemCategory::ALL`] order.
    #[default]
    Any,
    /// Search only this category.
    Only(ItemCategory),
}

impl From<ItemCategory> for CategoryQuery {
    fn from(category: ItemCategory) -> Self {
        Self::Only(category)
    }
}

/// Presentation data for an item. Opaque to the inventory core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayFields {
    /// Display name.
    pub display_name: String,
    /// Longer description.
    pub description: String,
    /// Interaction prompt shown in the world.
    pub interact_text: String,
    /// Icon reference.
    pub image: Option<String>,
}

/// Reference to the template used to spawn an item into the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldTemplate(pub String);

/// One inventory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Instance identity. Nil for content templates.
    #[serde(default)]
    pub id: ItemId,
    /// Content database reference.
    pub database_id: String,
    /// Section this record lives in.
    pub category: ItemCategory,
    /// Display order, -1 when unsorted.
    #[serde(default = "unsorted")]
    pub sort_order: i32,
    /// Presentation data.
    #[serde(default)]
    pub display: DisplayFields,
    /// Template for the world representation.
    #[serde(default)]
    pub world_template: Option<WorldTemplate>,
}

const fn unsorted() -> i32 {
    -1
}

impl ItemRecord {
    /// Creates a record template without identity.
    #[must_use]
    pub fn new(database_id: impl Into<String>, category: ItemCategory) -> Self {
        Self {
            id: ItemId::NIL,
            database_id: database_id.into(),
            category,
            sort_order: unsorted(),
            display: DisplayFields::default(),
            world_template: None,
        }
    }

    /// Sets the identity.
    #[must_use]
    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display.display_name = name.into();
        self
    }

    /// Sets the display order.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Sets the world spawn template.
    #[must_use]
    pub fn with_world_template(mut self, template: impl Into<String>) -> Self {
        self.world_template = Some(WorldTemplate(template.into()));
        self
    }

    /// True when the record has both an identity and a database id.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id.is_valid() && !self.database_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_invalid_until_identified() {
        let template = ItemRecord::new("sword_01", ItemCategory::Weapon);
        assert!(!template.is_valid());

        let record = template.with_id(ItemId::new());
        assert!(record.is_valid());
    }

    #[test]
    fn test_empty_database_id_is_invalid() {
        let record = ItemRecord::new("", ItemCategory::Item).with_id(ItemId::new());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_category_indices_follow_scan_order() {
        for (i, category) in ItemCategory::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_item_id_parse() {
        let id = ItemId::new();
        let parsed = ItemId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(!ItemId::NIL.is_valid());
    }
}
