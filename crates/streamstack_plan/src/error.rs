//! Errors raised while declaring or validating a stack graph.

use streamstack_core::{CoreError, LogicalId, ResourceKind};

/// Graph result type
pub type GraphResult<T> = Result<T, GraphError>;

/// Declaration and validation errors
///
/// All of these are static: the declaration has to be fixed and the graph
/// rebuilt. None of them can occur during emission of a valid graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Logical id declared twice
    #[error("Duplicate logical id: {id}")]
    DuplicateId {
        /// The repeated id
        id: LogicalId,
    },

    /// Attribute not exposed by the referenced resource's kind
    #[error("Unknown attribute '{attribute}' on {kind} '{id}'")]
    UnknownAttribute {
        /// Referenced resource
        id: LogicalId,
        /// Its kind
        kind: ResourceKind,
        /// Attribute that was asked for
        attribute: String,
    },

    /// Dependency cycle
    #[error("Cycle detected: {}", display_cycle(.cycle))]
    Cycle {
        /// Resources on the cycle, each depending on the next
        cycle: Vec<LogicalId>,
    },

    /// Reference, edge or output pointing at an undeclared resource
    #[error("Dangling reference from '{from}' to undeclared '{to}'")]
    DanglingReference {
        /// Referencing resource or output
        from: LogicalId,
        /// Missing target
        to: LogicalId,
    },

    /// Required property absent for the resource's kind
    #[error("Missing required property '{property}' on '{id}'")]
    MissingRequiredProperty {
        /// Resource missing the property
        id: LogicalId,
        /// Property name
        property: String,
    },

    /// Explicit edge whose dependent side was never declared
    #[error("Unknown resource: {id}")]
    UnknownResource {
        /// The undeclared id
        id: LogicalId,
    },

    /// Core error (ids, encoding, config)
    #[error(transparent)]
    Core(#[from] CoreError),
}

fn display_cycle(cycle: &[LogicalId]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(LogicalId::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}
