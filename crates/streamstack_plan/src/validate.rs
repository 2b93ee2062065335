//! Graph validator.
//!
//! Validation is exhaustive: every violation is collected before returning
//! so one run surfaces all of them. Checks run in a fixed order:
//! reference resolvability, required properties, then acyclicity.

use crate::dag::{EdgeOrigin, StackGraph};
use crate::error::GraphError;
use crate::resource::{attribute, required_properties};
use crate::value::AttributeReference;
use indexmap::IndexSet;
use std::fmt;
use streamstack_core::LogicalId;
use tracing::{debug, info, warn};

/// Every violation found in a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<GraphError>,
}

impl ValidationReport {
    /// Violations in check order
    #[must_use]
    pub fn errors(&self) -> &[GraphError] {
        &self.errors
    }

    /// Number of violations
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no violation was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Take the violations
    #[must_use]
    pub fn into_errors(self) -> Vec<GraphError> {
        self.errors
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// A graph that passed validation
///
/// Only a valid graph can be emitted. Its topological order is computed
/// once and every query on it is read-only.
#[derive(Debug, Clone)]
pub struct ValidGraph {
    graph: StackGraph,
    order: Vec<LogicalId>,
}

impl ValidGraph {
    /// The validated graph
    #[must_use]
    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    /// Deterministic topological order, dependencies first
    #[must_use]
    pub fn topological_order(&self) -> &[LogicalId] {
        &self.order
    }

    /// Give back the graph
    #[must_use]
    pub fn into_inner(self) -> StackGraph {
        self.graph
    }
}

/// Validator for stack graphs
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a graph
    ///
    /// # Errors
    ///
    /// Returns every violation found if the graph is invalid
    pub fn validate(&self, graph: StackGraph) -> Result<ValidGraph, ValidationReport> {
        debug!(resources = graph.len(), edges = graph.edge_count(), "validating stack graph");
        let mut errors = Vec::new();

        self.check_references(&graph, &mut errors);
        self.check_required(&graph, &mut errors);
        let order = match graph.order_or_cycles() {
            Ok(order) => Some(order),
            Err(cycles) => {
                errors.extend(cycles.into_iter().map(|cycle| GraphError::Cycle { cycle }));
                None
            }
        };

        match order {
            Some(order) if errors.is_empty() => {
                info!(resources = graph.len(), outputs = graph.outputs().count(), "stack graph valid");
                Ok(ValidGraph { graph, order })
            }
            _ => {
                warn!(errors = errors.len(), "stack graph invalid");
                Err(ValidationReport { errors })
            }
        }
    }

    /// Every reference, explicit edge and output must point at a declared
    /// resource, and references must name an attribute of its kind
    fn check_references(&self, graph: &StackGraph, errors: &mut Vec<GraphError>) {
        let mut dangling = IndexSet::new();
        let mut unknown = Vec::new();

        for resource in graph.resources() {
            for reference in resource.property_references() {
                self.check_reference(
                    graph,
                    resource.logical_id(),
                    reference,
                    &mut dangling,
                    &mut unknown,
                );
            }
        }
        for edge in graph.edges().filter(|e| e.origin == EdgeOrigin::Explicit) {
            if !graph.contains(&edge.to) {
                dangling.insert((edge.from.clone(), edge.to.clone()));
            }
        }
        for output in graph.outputs() {
            self.check_reference(
                graph,
                output.name(),
                output.value(),
                &mut dangling,
                &mut unknown,
            );
        }

        errors.extend(
            dangling
                .into_iter()
                .map(|(from, to)| GraphError::DanglingReference { from, to }),
        );
        errors.extend(unknown);
    }

    fn check_reference(
        &self,
        graph: &StackGraph,
        from: &LogicalId,
        reference: &AttributeReference,
        dangling: &mut IndexSet<(LogicalId, LogicalId)>,
        unknown: &mut Vec<GraphError>,
    ) {
        match graph.get(reference.source()) {
            None => {
                dangling.insert((from.clone(), reference.source().clone()));
            }
            Some(target) if attribute(target.kind(), reference.attribute()).is_none() => {
                let err = GraphError::UnknownAttribute {
                    id: target.logical_id().clone(),
                    kind: target.kind(),
                    attribute: reference.attribute().to_string(),
                };
                if !unknown.contains(&err) {
                    unknown.push(err);
                }
            }
            Some(_) => {}
        }
    }

    /// Every descriptor carries the properties its kind requires
    fn check_required(&self, graph: &StackGraph, errors: &mut Vec<GraphError>) {
        for resource in graph.resources() {
            for &property in required_properties(resource.kind()) {
                if !resource.has_property(property) {
                    errors.push(GraphError::MissingRequiredProperty {
                        id: resource.logical_id().clone(),
                        property: property.to_string(),
                    });
                }
            }
        }
    }
}
