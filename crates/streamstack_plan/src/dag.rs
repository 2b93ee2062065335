//! Resource dependency graph.
//!
//! The graph owns every declared resource and the union of two edge sets:
//! explicit ordering edges, and edges implied by attribute references found
//! in a resource's properties. An edge `from -> to` means `from` must be
//! realized after `to`.

use crate::error::{GraphError, GraphResult};
use crate::output::OutputBinding;
use crate::resource::{ResourceDescriptor, ResourceHandle};
use crate::value::{AttributeReference, Properties};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use streamstack_core::{LogicalId, ResourceKind};
use tracing::debug;

/// Where an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeOrigin {
    /// Declared with `depends_on` or [`StackGraph::add_edge`]
    Explicit,
    /// Implied by an attribute reference in the dependent's properties
    Reference,
}

/// A dependency edge: `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Dependent resource
    pub from: LogicalId,
    /// Resource it depends on
    pub to: LogicalId,
    /// How the edge was introduced
    pub origin: EdgeOrigin,
}

impl Edge {
    /// Create a new edge
    #[must_use]
    pub fn new(from: LogicalId, to: LogicalId, origin: EdgeOrigin) -> Self {
        Self { from, to, origin }
    }
}

/// Build phase of a graph that has not been validated yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphPhase {
    /// Nothing declared
    Empty,
    /// At least one resource, edge or output declared
    Declaring,
}

/// Dependency graph of one deployable stack
#[derive(Debug, Clone, Default)]
pub struct StackGraph {
    resources: IndexMap<LogicalId, ResourceDescriptor>,
    edges: IndexSet<Edge>,
    outputs: IndexMap<LogicalId, OutputBinding>,
}

type Adjacency = Vec<Vec<usize>>;

impl StackGraph {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current build phase
    #[must_use]
    pub fn phase(&self) -> GraphPhase {
        if self.resources.is_empty() && self.edges.is_empty() && self.outputs.is_empty() {
            GraphPhase::Empty
        } else {
            GraphPhase::Declaring
        }
    }

    /// Declare a resource
    ///
    /// # Errors
    ///
    /// Returns error if the id is invalid or already declared
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        id: &str,
        properties: Properties,
    ) -> GraphResult<ResourceHandle> {
        self.declare_with_dependencies(kind, id, properties, std::iter::empty())
    }

    /// Declare a resource together with explicit dependencies
    ///
    /// # Errors
    ///
    /// Returns error if the id is invalid or already declared
    pub fn declare_with_dependencies<'a>(
        &mut self,
        kind: ResourceKind,
        id: &str,
        properties: Properties,
        depends_on: impl IntoIterator<Item = &'a LogicalId>,
    ) -> GraphResult<ResourceHandle> {
        let builder = depends_on.into_iter().fold(
            ResourceDescriptor::builder(kind, LogicalId::new(id)?),
            |b, dep| b.depends_on(dep),
        );
        let descriptor = properties
            .into_iter()
            .fold(builder, |b, (k, v)| b.property(k, v))
            .build();
        self.add_resource(descriptor)
    }

    /// Register a descriptor and the edges it implies
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if the id is already declared
    pub fn add_resource(&mut self, descriptor: ResourceDescriptor) -> GraphResult<ResourceHandle> {
        let id = descriptor.logical_id().clone();
        if self.resources.contains_key(&id) {
            return Err(GraphError::DuplicateId { id });
        }

        for source in descriptor.referenced_sources() {
            self.edges
                .insert(Edge::new(id.clone(), source.clone(), EdgeOrigin::Reference));
        }
        for dep in descriptor.depends_on() {
            self.edges
                .insert(Edge::new(id.clone(), dep.clone(), EdgeOrigin::Explicit));
        }

        debug!(
            id = %id,
            kind = %descriptor.kind(),
            properties = descriptor.properties().len(),
            "declared resource"
        );
        let handle = descriptor.handle();
        self.resources.insert(id, descriptor);
        Ok(handle)
    }

    /// Add an explicit ordering edge: `from` is realized after `to`
    ///
    /// `to` is a weak name and may be declared later; the validator reports
    /// it if it never is.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownResource`] if `from` is not declared
    pub fn add_edge(&mut self, from: &LogicalId, to: &LogicalId) -> GraphResult<()> {
        if !self.resources.contains_key(from) {
            return Err(GraphError::UnknownResource { id: from.clone() });
        }
        debug!(from = %from, to = %to, "added explicit edge");
        self.edges
            .insert(Edge::new(from.clone(), to.clone(), EdgeOrigin::Explicit));
        Ok(())
    }

    /// Reference an attribute of a declared resource
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownAttribute`] if the resource's kind does
    /// not expose `attribute`
    pub fn reference(
        &self,
        resource: &ResourceHandle,
        attribute: &str,
    ) -> GraphResult<AttributeReference> {
        resource.reference(attribute)
    }

    /// Bind a named output
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if an output with that name exists
    pub fn add_output(&mut self, binding: OutputBinding) -> GraphResult<()> {
        if self.outputs.contains_key(binding.name()) {
            return Err(GraphError::DuplicateId {
                id: binding.name().clone(),
            });
        }
        debug!(name = %binding.name(), value = %binding.value(), "bound output");
        self.outputs.insert(binding.name().clone(), binding);
        Ok(())
    }

    /// Look up a resource
    #[must_use]
    pub fn get(&self, id: &LogicalId) -> Option<&ResourceDescriptor> {
        self.resources.get(id)
    }

    /// Whether a resource is declared
    #[must_use]
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.resources.contains_key(id)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }

    /// Output bindings in declaration order
    pub fn outputs(&self) -> impl Iterator<Item = &OutputBinding> {
        self.outputs.values()
    }

    /// All edges, explicit and reference-implied
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Number of resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the graph has no resources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Number of distinct dependency pairs
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges
            .iter()
            .map(|e| (&e.from, &e.to))
            .collect::<IndexSet<_>>()
            .len()
    }

    /// Direct dependencies of a resource, including undeclared targets
    #[must_use]
    pub fn dependencies(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.edges
            .iter()
            .filter(|e| &e.from == id)
            .map(|e| &e.to)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Direct dependents of a resource
    #[must_use]
    pub fn dependents(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.edges
            .iter()
            .filter(|e| &e.to == id)
            .map(|e| &e.from)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Everything a resource depends on, directly or transitively
    #[must_use]
    pub fn transitive_dependencies(&self, id: &LogicalId) -> IndexSet<&LogicalId> {
        let mut seen = IndexSet::new();
        let mut stack = self.dependencies(id);

        while let Some(current) = stack.pop() {
            if seen.insert(current) {
                stack.extend(self.dependencies(current));
            }
        }

        seen
    }

    /// Deterministic topological order, dependencies first
    ///
    /// Among resources whose dependencies are all placed, the one declared
    /// first goes next. Edges to undeclared resources are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] with a minimal cycle if no order exists
    pub fn topological_order(&self) -> GraphResult<Vec<LogicalId>> {
        self.order_or_cycles().map_err(|cycles| GraphError::Cycle {
            cycle: cycles.into_iter().next().unwrap_or_default(),
        })
    }

    /// Topological order, or one minimal cycle per cyclic component
    ///
    /// The error vector is never empty.
    pub(crate) fn order_or_cycles(&self) -> Result<Vec<LogicalId>, Vec<Vec<LogicalId>>> {
        let ids: Vec<&LogicalId> = self.resources.keys().collect();
        let deps = self.adjacency();
        let n = deps.len();

        let mut dependents: Adjacency = vec![Vec::new(); n];
        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                dependents[d].push(i);
            }
        }

        let mut unmet: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| unmet[i] == 0).collect();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while let Some(next) = ready.pop_first() {
            placed[next] = true;
            order.push(ids[next].clone());
            for &dependent in &dependents[next] {
                unmet[dependent] -= 1;
                if unmet[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }

        Err(find_cycles(&deps, &dependents, &placed)
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| ids[i].clone()).collect())
            .collect())
    }

    /// Dependencies by declaration index, sorted and deduplicated
    fn adjacency(&self) -> Adjacency {
        let mut deps = vec![BTreeSet::new(); self.resources.len()];
        for edge in &self.edges {
            if let (Some(from), Some(to)) = (
                self.resources.get_index_of(&edge.from),
                self.resources.get_index_of(&edge.to),
            ) {
                deps[from].insert(to);
            }
        }
        deps.into_iter().map(|s| s.into_iter().collect()).collect()
    }
}

/// One shortest cycle per strongly connected component left unplaced
fn find_cycles(deps: &Adjacency, dependents: &Adjacency, placed: &[bool]) -> Vec<Vec<usize>> {
    let mut assigned = placed.to_vec();
    let mut cycles = Vec::new();

    for start in 0..deps.len() {
        if assigned[start] {
            continue;
        }
        let forward = reachable(start, deps, placed);
        let backward = reachable(start, dependents, placed);
        let component: BTreeSet<usize> = forward.intersection(&backward).copied().collect();
        for &member in &component {
            assigned[member] = true;
        }
        if let Some(cycle) = minimal_cycle(deps, &component) {
            cycles.push(cycle);
        }
    }

    cycles
}

/// Shortest cycle in a component, led by its earliest-declared member
///
/// Equal lengths go to the cycle through the earliest-declared member.
fn minimal_cycle(deps: &Adjacency, component: &BTreeSet<usize>) -> Option<Vec<usize>> {
    let mut best: Option<Vec<usize>> = None;
    for &member in component {
        if let Some(cycle) = shortest_cycle(member, deps, component) {
            if best.as_ref().is_none_or(|b| cycle.len() < b.len()) {
                best = Some(cycle);
            }
        }
    }

    best.map(|mut cycle| {
        if let Some(lead) = cycle.iter().enumerate().min_by_key(|&(_, &node)| node).map(|(i, _)| i) {
            cycle.rotate_left(lead);
        }
        cycle
    })
}

fn reachable(start: usize, adjacency: &Adjacency, placed: &[bool]) -> BTreeSet<usize> {
    let mut seen = BTreeSet::from([start]);
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        for &next in &adjacency[current] {
            if !placed[next] && seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

/// Breadth-first search for the shortest path from `start` back to itself
fn shortest_cycle(start: usize, deps: &Adjacency, component: &BTreeSet<usize>) -> Option<Vec<usize>> {
    let mut parent = BTreeMap::new();
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        for &next in &deps[current] {
            if next == start {
                let mut path = vec![current];
                let mut node = current;
                while let Some(&p) = parent.get(&node) {
                    path.push(p);
                    node = p;
                }
                path.reverse();
                return Some(path);
            }
            if component.contains(&next) && seen.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }

    None
}
