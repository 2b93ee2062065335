//! Logical identifiers for declared resources.
//!
//! A logical id is the build-time name of a resource. It is distinct from
//! whatever physical id the cloud account assigns at apply time, and it
//! must follow the engine's grammar: non-empty, ASCII alphanumeric.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum logical id length accepted by the engine
pub const MAX_LOGICAL_ID_LEN: usize = 255;

/// Logical identifier - unique name of a resource within one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    /// Create a logical id, checking the id grammar
    ///
    /// # Errors
    ///
    /// Returns error if the id is empty, too long, or not alphanumeric
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidLogicalId {
                id,
                reason: "must not be empty".to_string(),
            });
        }
        if id.len() > MAX_LOGICAL_ID_LEN {
            return Err(CoreError::InvalidLogicalId {
                reason: format!("longer than {} characters", MAX_LOGICAL_ID_LEN),
                id,
            });
        }
        if let Some(c) = id.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidLogicalId {
                reason: format!("character '{}' is not ASCII alphanumeric", c),
                id,
            });
        }
        Ok(Self(id))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for LogicalId {
    type Error = CoreError;

    fn try_from(value: &str) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
