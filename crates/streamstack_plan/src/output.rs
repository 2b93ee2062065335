//! Output bindings: named external-facing values of a stack.

use crate::value::AttributeReference;
use streamstack_core::LogicalId;

/// A named value exported from the stack, such as a playback URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    name: LogicalId,
    value: AttributeReference,
    description: Option<String>,
}

impl OutputBinding {
    /// Create a binding
    #[must_use]
    pub fn new(name: LogicalId, value: AttributeReference) -> Self {
        Self {
            name,
            value,
            description: None,
        }
    }

    /// Set a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Output name
    #[must_use]
    pub fn name(&self) -> &LogicalId {
        &self.name
    }

    /// Referenced attribute
    #[must_use]
    pub fn value(&self) -> &AttributeReference {
        &self.value
    }

    /// Optional description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
