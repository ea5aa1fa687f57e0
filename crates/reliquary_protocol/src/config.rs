//! # Node Configuration
//!
//! Loaded once per node from TOML:
//!
//! ```toml
//! role = "predictor"
//! log_authority = false
//! log_predictor = true
//! event_capacity = 256
//! drop_height_offset = 34.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::role::Role;

/// Default vertical offset for dropped items.
pub const DEFAULT_DROP_HEIGHT_OFFSET: f32 = 34.0;

/// Default per-subscriber notification queue length.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Per-node protocol configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's role.
    pub role: Role,
    /// Trace every authority-side operation.
    pub log_authority: bool,
    /// Trace every predictor-side operation.
    pub log_predictor: bool,
    /// Bounded queue length of each notification subscriber.
    pub event_capacity: usize,
    /// Height above the owner at which dropped items appear.
    pub drop_height_offset: f32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            log_authority: false,
            log_predictor: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            drop_height_offset: DEFAULT_DROP_HEIGHT_OFFSET,
        }
    }
}

impl NodeConfig {
    /// Default configuration for `role`.
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidConfig` for a zero event capacity or a
    /// non-finite drop offset.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.event_capacity == 0 {
            return Err(ProtocolError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if !self.drop_height_offset.is_finite() {
            return Err(ProtocolError::InvalidConfig(format!(
                "drop_height_offset must be finite, got {}",
                self.drop_height_offset
            )));
        }
        Ok(())
    }

    /// Parses and validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidConfig` for malformed or out-of-range input.
    pub fn from_toml_str(text: &str) -> ProtocolResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> ProtocolResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
