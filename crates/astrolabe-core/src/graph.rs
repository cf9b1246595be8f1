//! Node and edge records and the graph store that owns them.
//!
//! The layout engine never allocates or frees nodes: callers build a [`Graph`],
//! hand it to a layout by mutable reference, and layouts only ever write
//! [`LayoutNode::position`] (and, for containers, [`LayoutNode::size`]).
//!
//! # Architecture
//!
//! - [`LayoutNode`] / [`NodeData`]: position, mass, hold flags and optional
//!   grouping/containment attributes
//! - [`LayoutEdge`] / [`EdgeData`]: directed relation with optional physical
//!   constraint parameters
//! - [`Graph`]: insertion-ordered storage plus incoming/outgoing edge indices
//!   for traversal

use std::collections::HashMap;

use indexmap::IndexMap;
use log::trace;
use thiserror::Error;

use crate::{
    geometry::{Bounds3, Vec3},
    identifier::Id,
};

/// Relation name marking an edge as "source contains target".
pub const CONTAINS_RELATION: &str = "contains";

/// Errors raised while building a graph
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("edge '{edge}' references unknown node '{node}'")]
    MissingEndpoint { edge: Id, node: Id },

    #[error("node '{0}' already exists")]
    DuplicateNode(Id),
}

/// Optional attributes a caller may attach to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Group tag; nodes sharing a tag receive a cluster constraint
    pub cluster_id: Option<String>,
    /// Explicit container this node lives in
    pub parent_container: Option<Id>,
    /// Marks the node as a container for nested layout
    pub is_container: bool,
    /// Algorithm used to arrange this container's children
    pub child_layout: Option<String>,
    /// Whether nested layout may resize the container around its children
    pub fit_to_children: bool,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            cluster_id: None,
            parent_container: None,
            is_container: false,
            child_layout: None,
            fit_to_children: true,
        }
    }
}

/// A positioned graph node.
///
/// `is_pinned` is a persistent user hold; `is_fixed` is a transient hold used
/// while a node is being dragged. Layouts must not move a node for which
/// [`LayoutNode::is_locked`] returns true.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: Id,
    pub position: Vec3,
    pub mass: f32,
    pub is_pinned: bool,
    pub is_fixed: bool,
    pub radius: f32,
    /// Full extent of the node's visual; containers are resized through this
    pub size: Vec3,
    pub data: NodeData,
}

impl LayoutNode {
    /// Default bounding radius for nodes created without one
    pub const DEFAULT_RADIUS: f32 = 20.0;

    /// Creates a unit-mass node at the origin
    pub fn new(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            position: Vec3::ZERO,
            mass: 1.0,
            is_pinned: false,
            is_fixed: false,
            radius: Self::DEFAULT_RADIUS,
            size: Vec3::splat(Self::DEFAULT_RADIUS * 2.0),
            data: NodeData::default(),
        }
    }

    /// Sets the initial position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the mass; negative values are clamped to zero
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass.max(0.0);
        self
    }

    /// Sets the bounding radius and derives a cubic size from it
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius.max(0.0);
        self.size = Vec3::splat(self.radius * 2.0);
        self
    }

    /// Sets the persistent pinned flag
    pub fn pinned(mut self, pinned: bool) -> Self {
        self.is_pinned = pinned;
        self
    }

    /// Sets the group tag
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.data.cluster_id = Some(cluster.into());
        self
    }

    /// Places the node inside `container`
    pub fn with_parent(mut self, container: impl Into<Id>) -> Self {
        self.data.parent_container = Some(container.into());
        self
    }

    /// Marks the node as a container with the given extent
    pub fn as_container(mut self, size: Vec3) -> Self {
        self.data.is_container = true;
        self.size = size;
        self.radius = size.length() / 2.0;
        self
    }

    /// Names the algorithm that arranges this container's children
    pub fn with_child_layout(mut self, layout: impl Into<String>) -> Self {
        self.data.child_layout = Some(layout.into());
        self
    }

    /// Radius of the sphere enclosing the node's visual
    pub fn bounding_radius(&self) -> f32 {
        self.radius
    }

    /// Mass used by physics; zero or negative masses behave as unit mass
    pub fn effective_mass(&self) -> f32 {
        if self.mass > 0.0 { self.mass } else { 1.0 }
    }

    /// True when any hold (pinned or fixed) excludes the node from movement
    pub fn is_locked(&self) -> bool {
        self.is_pinned || self.is_fixed
    }

    /// True when the node carries a container marker
    pub fn is_container(&self) -> bool {
        self.data.is_container || self.data.child_layout.is_some()
    }

    /// Axis-aligned bounds of the node's visual
    pub fn bounds(&self) -> Bounds3 {
        Bounds3::from_center(self.position, self.size)
    }
}

/// Physical behaviour requested for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstraintType {
    /// Soft spring toward the ideal length
    #[default]
    Elastic,
    /// Stiff spring that strongly holds the ideal length
    Rigid,
    /// Very stiff spring that keeps the endpoints touching
    Weld,
}

impl ConstraintType {
    /// Parses the lowercase name used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "elastic" => Some(Self::Elastic),
            "rigid" => Some(Self::Rigid),
            "weld" => Some(Self::Weld),
            _ => None,
        }
    }
}

/// Per-edge overrides for spring and distance behaviour
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConstraintParams {
    pub ideal_length: Option<f32>,
    pub stiffness: Option<f32>,
    pub min_length: Option<f32>,
    pub max_length: Option<f32>,
}

impl ConstraintParams {
    /// True when no parameter is set
    pub fn is_empty(&self) -> bool {
        self.ideal_length.is_none()
            && self.stiffness.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// Optional attributes a caller may attach to an edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeData {
    /// Free-form relation name; `"contains"` drives nested layout
    pub relation: Option<String>,
    pub constraint_type: Option<ConstraintType>,
    pub constraint_params: Option<ConstraintParams>,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEdge {
    pub id: Id,
    pub source: Id,
    pub target: Id,
    pub data: EdgeData,
}

impl LayoutEdge {
    /// Creates an edge whose id is `"<source>-><target>"`
    pub fn new(source: impl Into<Id>, target: impl Into<Id>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Id::pair(source, target),
            source,
            target,
            data: EdgeData::default(),
        }
    }

    /// Overrides the generated id
    pub fn with_id(mut self, id: impl Into<Id>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the constraint type
    pub fn with_constraint(mut self, constraint: ConstraintType) -> Self {
        self.data.constraint_type = Some(constraint);
        self
    }

    /// Sets the constraint parameters
    pub fn with_params(mut self, params: ConstraintParams) -> Self {
        self.data.constraint_params = Some(params);
        self
    }

    /// Sets the relation name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.data.relation = Some(relation.into());
        self
    }

    /// True when the edge expresses containment of target in source
    pub fn is_containment(&self) -> bool {
        self.data.relation.as_deref() == Some(CONTAINS_RELATION)
    }

    /// True when the edge carries any constraint type or parameter
    pub fn has_constraint_data(&self) -> bool {
        self.data.constraint_type.is_some()
            || self
                .data
                .constraint_params
                .is_some_and(|params| !params.is_empty())
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint
    pub fn other(&self, node: Id) -> Option<Id> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Owning store for nodes and edges.
///
/// Iteration order is insertion order, which keeps every layout deterministic
/// for a given construction sequence.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<Id, LayoutNode>,
    edges: IndexMap<Id, LayoutEdge>,
    incoming: HashMap<Id, Vec<Id>>,
    outgoing: HashMap<Id, Vec<Id>>,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, failing if its id is already taken
    pub fn add_node(&mut self, node: LayoutNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Adds an edge; both endpoints must already exist.
    ///
    /// An edge with an existing id replaces the previous one.
    pub fn add_edge(&mut self, edge: LayoutEdge) -> Result<(), GraphError> {
        for endpoint in [edge.source, edge.target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GraphError::MissingEndpoint {
                    edge: edge.id,
                    node: endpoint,
                });
            }
        }
        self.remove_edge(edge.id);
        self.outgoing.entry(edge.source).or_default().push(edge.id);
        self.incoming.entry(edge.target).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Removes a node together with every incident edge.
    ///
    /// Returns the removed node and the removed edges.
    pub fn remove_node(&mut self, id: Id) -> Option<(LayoutNode, Vec<LayoutEdge>)> {
        let node = self.nodes.shift_remove(&id)?;
        let incident: Vec<Id> = self
            .incoming
            .get(&id)
            .into_iter()
            .chain(self.outgoing.get(&id))
            .flatten()
            .copied()
            .collect();
        let removed: Vec<LayoutEdge> = incident
            .into_iter()
            .filter_map(|edge_id| self.remove_edge(edge_id))
            .collect();
        self.incoming.remove(&id);
        self.outgoing.remove(&id);
        trace!(node:% = id, removed_edges = removed.len(); "Removed node");
        Some((node, removed))
    }

    /// Removes an edge by id
    pub fn remove_edge(&mut self, id: Id) -> Option<LayoutEdge> {
        let edge = self.edges.shift_remove(&id)?;
        if let Some(list) = self.outgoing.get_mut(&edge.source) {
            list.retain(|e| *e != id);
        }
        if let Some(list) = self.incoming.get_mut(&edge.target) {
            list.retain(|e| *e != id);
        }
        Some(edge)
    }

    /// Returns the node with the given id
    pub fn node(&self, id: Id) -> Option<&LayoutNode> {
        self.nodes.get(&id)
    }

    /// Returns the node with the given id mutably
    pub fn node_mut(&mut self, id: Id) -> Option<&mut LayoutNode> {
        self.nodes.get_mut(&id)
    }

    /// Checks if a node with the given id exists
    pub fn contains_node(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns the edge with the given id
    pub fn edge(&self, id: Id) -> Option<&LayoutEdge> {
        self.edges.get(&id)
    }

    /// Iterates nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.values()
    }

    /// Iterates nodes mutably in insertion order
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut LayoutNode> {
        self.nodes.values_mut()
    }

    /// Iterates edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &LayoutEdge> {
        self.edges.values()
    }

    /// Returns the total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges whose target is `id`
    pub fn incoming_edges(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    /// Edges whose source is `id`
    pub fn outgoing_edges(&self, id: Id) -> impl Iterator<Item = &LayoutEdge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    /// Number of incident edges (in + out, self-loops counted twice)
    pub fn degree(&self, id: Id) -> usize {
        self.incoming.get(&id).map_or(0, Vec::len) + self.outgoing.get(&id).map_or(0, Vec::len)
    }

    /// Distinct neighbours regardless of direction, in edge order
    pub fn neighbors(&self, id: Id) -> Vec<Id> {
        let mut seen = Vec::new();
        for edge in self.outgoing_edges(id).chain(self.incoming_edges(id)) {
            if let Some(other) = edge.other(id) {
                if other != id && !seen.contains(&other) {
                    seen.push(other);
                }
            }
        }
        seen
    }

    /// Snapshot of every node position
    pub fn positions(&self) -> IndexMap<Id, Vec3> {
        self.nodes
            .iter()
            .map(|(id, node)| (*id, node.position))
            .collect()
    }

    /// Writes positions back, skipping unknown ids.
    ///
    /// Locked nodes are written too: this is a raw restore, not a layout step.
    pub fn restore_positions(&mut self, positions: &IndexMap<Id, Vec3>) {
        for (id, position) in positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *position;
            }
        }
    }

    /// Moves a node unless it is locked; returns whether it moved
    pub fn move_node(&mut self, id: Id, position: Vec3) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if !node.is_locked() => {
                node.position = position;
                true
            }
            _ => false,
        }
    }

    /// Bounds of every node center, or `None` for an empty graph
    pub fn bounds(&self) -> Option<Bounds3> {
        Bounds3::from_points(self.nodes.values().map(|node| node.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Graph {
        let mut graph = Graph::new();
        for name in ["a", "b", "c"] {
            graph.add_node(LayoutNode::new(name)).unwrap();
        }
        graph.add_edge(LayoutEdge::new("a", "b")).unwrap();
        graph.add_edge(LayoutEdge::new("b", "c")).unwrap();
        graph
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("dup")).unwrap();
        assert_eq!(
            graph.add_node(LayoutNode::new("dup")),
            Err(GraphError::DuplicateNode(Id::new("dup")))
        );
    }

    #[test]
    fn test_edge_with_missing_endpoint_rejected() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("only")).unwrap();
        let err = graph.add_edge(LayoutEdge::new("only", "ghost")).unwrap_err();
        assert!(matches!(err, GraphError::MissingEndpoint { .. }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_incoming_outgoing_and_degree() {
        let graph = chain();
        let b = Id::new("b");
        assert_eq!(graph.degree(b), 2);
        assert_eq!(graph.incoming_edges(b).count(), 1);
        assert_eq!(graph.outgoing_edges(b).next().unwrap().target, "c");
        assert_eq!(graph.neighbors(b), vec![Id::new("c"), Id::new("a")]);
    }

    #[test]
    fn test_remove_node_removes_incident_edges() {
        let mut graph = chain();
        let (node, removed) = graph.remove_node(Id::new("b")).unwrap();
        assert_eq!(node.id, "b");
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.degree(Id::new("a")), 0);
    }

    #[test]
    fn test_replacing_edge_keeps_indices_consistent() {
        let mut graph = chain();
        let edge = LayoutEdge::new("a", "b").with_constraint(ConstraintType::Rigid);
        graph.add_edge(edge).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.degree(Id::new("a")), 1);
    }

    #[test]
    fn test_move_node_respects_locks() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("free")).unwrap();
        graph.add_node(LayoutNode::new("held").pinned(true)).unwrap();

        assert!(graph.move_node(Id::new("free"), Vec3::X));
        assert!(!graph.move_node(Id::new("held"), Vec3::X));
        assert_eq!(graph.node(Id::new("held")).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_positions_snapshot_and_restore() {
        let mut graph = chain();
        let snapshot = graph.positions();
        graph.move_node(Id::new("a"), Vec3::new(5.0, 5.0, 5.0));
        graph.restore_positions(&snapshot);
        assert_eq!(graph.node(Id::new("a")).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_container_marker() {
        let plain = LayoutNode::new("plain");
        let flagged = LayoutNode::new("flagged").as_container(Vec3::splat(100.0));
        let declared = LayoutNode::new("declared").with_child_layout("grid");
        assert!(!plain.is_container());
        assert!(flagged.is_container());
        assert!(declared.is_container());
    }

    #[test]
    fn test_edge_constraint_data() {
        assert!(!LayoutEdge::new("a", "b").has_constraint_data());
        assert!(!LayoutEdge::new("a", "b")
            .with_params(ConstraintParams::default())
            .has_constraint_data());
        assert!(LayoutEdge::new("a", "b")
            .with_constraint(ConstraintType::Weld)
            .has_constraint_data());
    }
}
