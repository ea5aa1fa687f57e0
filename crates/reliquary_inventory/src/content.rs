//! # Content Lookup
//!
//! Resolves a database id to the default record template for that item.
//!
//! [`ContentTable`] is a table-backed lookup loaded once at startup from TOML:
//!
//! ```toml
//! [[items]]
//! database_id = "sword_01"
//! category = "weapon"
//! world_template = "props/sword_01"
//!
//! [items.display]
//! display_name = "Iron Sword"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{InventoryError, InventoryResult};
use crate::item::{ItemId, ItemRecord};

/// Content Lookup collaborator.
pub trait ContentLookup {
    /// Template for `database_id`, without identity. `None` on a miss.
    fn find_by_database_id(&self, database_id: &str) -> Option<ItemRecord>;
}

/// In-memory content table.
#[derive(Clone, Debug, Default)]
pub struct ContentTable {
    templates: HashMap<String, ItemRecord>,
}

#[derive(Deserialize)]
struct ContentFile {
    #[serde(default)]
    items: Vec<ItemRecord>,
}

impl ContentTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template, replacing any template with the same database id.
    ///
    /// Identities are stripped: templates never carry one.
    pub fn register(&mut self, template: ItemRecord) {
        let template = template.with_id(ItemId::NIL);
        self.templates.insert(template.database_id.clone(), template);
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when the table has no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Parses a table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::InvalidConfig` for malformed TOML, empty
    /// database ids or duplicate entries.
    pub fn from_toml_str(text: &str) -> InventoryResult<Self> {
        let file: ContentFile = toml::from_str(text)?;
        let mut table = Self::new();

        for template in file.items {
            if template.database_id.is_empty() {
                return Err(InventoryError::InvalidConfig(
                    "content entry with empty database_id".to_string(),
                ));
            }
            if table.templates.contains_key(&template.database_id) {
                return Err(InventoryError::InvalidConfig(format!(
                    "duplicate content entry {:?}",
                    template.database_id
                )));
            }
            table.register(template);
        }

        Ok(table)
    }

    /// Loads a table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> InventoryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl ContentLookup for ContentTable {
    fn find_by_database_id(&self, database_id: &str) -> Option<ItemRecord> {
        self.templates.get(database_id).cloned()
    }
}
