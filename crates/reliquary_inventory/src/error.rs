//! # Inventory Error Types
//!
//! All errors that can occur in the inventory layer.

use thiserror::Error;

use crate::item::ItemId;

/// Errors that can occur in the inventory layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Attempted to store a record without a valid id and database id.
    #[error("invalid item record: id {id}, database id {database_id:?}")]
    InvalidRecord {
        /// The record's id (may be nil).
        id: ItemId,
        /// The record's database id (may be empty).
        database_id: String,
    },

    /// Invalid content table or save file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for InventoryError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<toml::ser::Error> for InventoryError {
    fn from(err: toml::ser::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;
