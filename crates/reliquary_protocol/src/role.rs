//! # Node Roles
//!
//! Decided once per node at construction and never re-derived per call.
//!
//! ```text
//! Authority  - owns the canonical stores, executes requests
//! Predictor  - controls one actor, predicts and forwards
//! Both       - listen-server host: predicts for its own actor and executes
//!              the forwarded request in-process with no round trip
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A node's place in the protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Single source of truth for one or more stores.
    Authority,
    /// Locally controls an actor and predicts its store.
    Predictor,
    /// Authority and predictor collapsed into one process.
    #[default]
    Both,
}

impl Role {
    /// True when this node executes requests against canonical stores.
    #[inline]
    #[must_use]
    pub const fn is_authority(self) -> bool {
        matches!(self, Self::Authority | Self::Both)
    }

    /// True when this node applies pending-client logic for a local actor.
    #[inline]
    #[must_use]
    pub const fn predicts(self) -> bool {
        matches!(self, Self::Predictor | Self::Both)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authority => "authority",
            Self::Predictor => "predictor",
            Self::Both => "both",
        })
    }
}
