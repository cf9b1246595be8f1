//! Recursive per-container layout.
//!
//! Containers are nodes marked with `is_container` or a `child_layout` name.
//! A node's parent is its `parent_container` attribute, or else the source of
//! the first `contains` edge pointing at it. Layout runs in two passes:
//!
//! 1. Top-down, every container lays out its children with its own
//!    [`NestedAlgorithm`] inside the container's padded bounds. Parents are
//!    visited before their children, so a container moved by its parent
//!    carries its own children along.
//! 2. Bottom-up, every container with `fit_to_children` is re-centred and
//!    resized to the bounds of its children plus padding.
//!
//! A fitted container remembers its declared size and where it sat before the
//! fit, so running the layout again starts from the same frame.

mod algorithms;

pub use algorithms::{ChildSlot, FlowDirection, NestedAlgorithm};

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use log::{debug, trace, warn};

use astrolabe_core::{
    geometry::{Bounds3, Vec3},
    graph::{Graph, LayoutNode},
    identifier::Id,
};

use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions},
};

/// Settings for [`NestedLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct NestedConfig {
    /// Algorithm for containers that name none
    pub default_child_layout: String,
    /// World-space gap between a container's edge and its children
    pub padding: f32,
    pub force_iterations: usize,
    pub flow_direction: FlowDirection,
    /// Gap between flowed children, in normalized units
    pub flow_gap: f32,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self {
            default_child_layout: "grid".to_string(),
            padding: 20.0,
            force_iterations: 50,
            flow_direction: FlowDirection::Row,
            flow_gap: 0.1,
        }
    }
}

impl NestedConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("default_child_layout", &mut self.default_child_layout);
        options.load("padding", &mut self.padding);
        options.load("force_iterations", &mut self.force_iterations);
        options.load("flow_direction", &mut self.flow_direction);
        options.load("flow_gap", &mut self.flow_gap);
    }
}

/// The space a container's children are laid out in
pub fn container_space(container: &LayoutNode, padding: f32) -> Bounds3 {
    container.bounds().add_padding(-padding)
}

/// Parent/child relation between containers and their members.
#[derive(Debug, Default)]
struct Hierarchy {
    parents: HashMap<Id, Id>,
    children: IndexMap<Id, Vec<Id>>,
}

impl Hierarchy {
    fn build(graph: &Graph) -> Self {
        let mut hierarchy = Self::default();
        for node in graph.nodes() {
            if let Some(parent) = node.data.parent_container {
                hierarchy.link(graph, parent, node.id);
            }
        }
        for edge in graph.edges().filter(|edge| edge.is_containment()) {
            hierarchy.link(graph, edge.source, edge.target);
        }
        hierarchy
    }

    fn link(&mut self, graph: &Graph, parent: Id, child: Id) {
        if parent == child || self.parents.contains_key(&child) {
            return;
        }
        if !graph.node(parent).is_some_and(LayoutNode::is_container) {
            trace!(parent:% = parent, child:% = child; "Parent is not a container");
            return;
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                warn!(parent:% = parent, child:% = child; "Containment cycle ignored");
                return;
            }
            ancestor = self.parents.get(&current).copied();
        }
        self.parents.insert(child, parent);
        self.children.entry(parent).or_default().push(child);
    }

    fn children(&self, container: Id) -> &[Id] {
        self.children.get(&container).map(Vec::as_slice).unwrap_or_default()
    }

    /// Containers with children, parents before their descendants
    fn top_down(&self) -> Vec<Id> {
        let mut queue: VecDeque<Id> = self
            .children
            .keys()
            .filter(|container| !self.parents.contains_key(*container))
            .copied()
            .collect();
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        while let Some(container) = queue.pop_front() {
            if !seen.insert(container) {
                continue;
            }
            order.push(container);
            queue.extend(
                self.children(container)
                    .iter()
                    .filter(|child| self.children.contains_key(*child)),
            );
        }
        order
    }
}

/// A container's frame before it was fitted to its children.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    extent: Vec3,
    fit_offset: Vec3,
    /// Size written by the fit; any other size is a new declaration
    fitted: Vec3,
}

/// Lays out container contents recursively.
#[derive(Debug, Default)]
pub struct NestedLayout {
    config: NestedConfig,
    algorithms: HashMap<Id, Box<dyn NestedAlgorithm>>,
    frames: HashMap<Id, Frame>,
}

impl NestedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &NestedConfig {
        &self.config
    }

    /// Name of the algorithm cached for `container`, if any
    pub fn cached_algorithm(&self, container: Id) -> Option<&'static str> {
        self.algorithms.get(&container).map(|algorithm| algorithm.name())
    }

    /// The cached algorithm for `container`, rebuilt when its name changed
    fn algorithm_for(&mut self, container: &LayoutNode) -> &mut Box<dyn NestedAlgorithm> {
        let wanted = container
            .data
            .child_layout
            .clone()
            .unwrap_or_else(|| self.config.default_child_layout.clone());
        let stale = self
            .algorithms
            .get(&container.id)
            .is_some_and(|algorithm| algorithm.name() != wanted);
        if stale {
            self.algorithms.remove(&container.id);
        }
        self.algorithms.entry(container.id).or_insert_with(|| {
            algorithms::algorithm(&wanted).unwrap_or_else(|| {
                warn!(container:% = container.id, layout:% = wanted; "Unknown child layout, using grid");
                Box::new(algorithms::GridArrangement)
            })
        })
    }

    /// Puts a previously fitted container back into its declared frame
    fn restore_frame(&mut self, graph: &mut Graph, container: Id) {
        let Some(frame) = self.frames.get(&container).copied() else {
            return;
        };
        let Some(node) = graph.node_mut(container) else {
            return;
        };
        if node.is_locked() || node.size != frame.fitted {
            self.frames.remove(&container);
            return;
        }
        node.position = node.position - frame.fit_offset;
        node.size = frame.extent;
    }

    fn arrange_children(&mut self, graph: &mut Graph, hierarchy: &Hierarchy, container: Id) {
        let Some(node) = graph.node(container).cloned() else {
            return;
        };
        let space = container_space(&node, self.config.padding);
        let span = space.size();

        let members = hierarchy.children(container);
        let slots: Vec<ChildSlot> = members
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|child| ChildSlot {
                id: child.id,
                position: space.normalize(child.position),
                size: Vec3::new(
                    normalized_extent(child.size.x(), span.x()),
                    normalized_extent(child.size.y(), span.y()),
                    normalized_extent(child.size.z(), span.z()),
                ),
                locked: child.is_locked(),
            })
            .collect();
        let index: HashMap<Id, usize> = slots.iter().enumerate().map(|(i, slot)| (slot.id, i)).collect();
        let links: Vec<(usize, usize)> = graph
            .edges()
            .filter(|edge| !edge.is_containment())
            .filter_map(|edge| Some((*index.get(&edge.source)?, *index.get(&edge.target)?)))
            .collect();

        let config = self.config.clone();
        let algorithm = self.algorithm_for(&node);
        let positions = algorithm.arrange(&slots, &links, &config);
        trace!(
            container:% = container,
            algorithm = algorithm.name(),
            children = slots.len();
            "Arranged container"
        );

        for (slot, normalized) in slots.iter().zip(positions) {
            let target = space.denormalize(normalized);
            if target.is_finite() {
                let offset = target - slot_world(graph, slot.id);
                move_subtree(graph, hierarchy, slot.id, offset);
            }
        }
    }

    fn fit_to_children(&mut self, graph: &mut Graph, hierarchy: &Hierarchy, container: Id) {
        let Some(node) = graph.node(container) else {
            return;
        };
        if !node.data.fit_to_children || node.is_locked() {
            return;
        }
        let (center, extent) = (node.position, node.size);
        let children = hierarchy
            .children(container)
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(LayoutNode::bounds)
            .reduce(|acc, bounds| acc.merge(&bounds));
        let Some(content) = children else {
            return;
        };
        let fitted = content.add_padding(self.config.padding);
        if let Some(node) = graph.node_mut(container) {
            node.position = fitted.center();
            node.size = fitted.size();
            self.frames.insert(
                container,
                Frame {
                    extent,
                    fit_offset: fitted.center() - center,
                    fitted: fitted.size(),
                },
            );
        }
    }
}

/// `extent` as a fraction of the `[-1, 1]` span covering `span`
fn normalized_extent(extent: f32, span: f32) -> f32 {
    if span > f32::EPSILON {
        2.0 * extent / span
    } else {
        0.0
    }
}

fn slot_world(graph: &Graph, id: Id) -> Vec3 {
    graph.node(id).map_or(Vec3::ZERO, |node| node.position)
}

/// Moves `root` by `offset` and drags its unlocked descendants along.
///
/// A locked `root` stays put together with everything inside it.
fn move_subtree(graph: &mut Graph, hierarchy: &Hierarchy, root: Id, offset: Vec3) {
    if offset.is_zero() || graph.node(root).is_none_or(LayoutNode::is_locked) {
        return;
    }
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let moved = node.position + offset;
        graph.move_node(id, moved);
        stack.extend_from_slice(hierarchy.children(id));
    }
}

impl Layout for NestedLayout {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        let hierarchy = Hierarchy::build(graph);
        let order = hierarchy.top_down();

        self.algorithms.retain(|id, _| hierarchy.children.contains_key(id));
        self.frames.retain(|id, _| hierarchy.children.contains_key(id));

        for container in &order {
            self.restore_frame(graph, *container);
        }
        for container in &order {
            self.arrange_children(graph, &hierarchy, *container);
        }
        for container in order.iter().rev() {
            self.fit_to_children(graph, &hierarchy, *container);
        }
        debug!(containers = order.len(), cached = self.algorithms.len(); "Nested layout");
        Ok(())
    }

    fn remove_node(&mut self, node: Id) {
        self.algorithms.remove(&node);
        self.frames.remove(&node);
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }

    fn dispose(&mut self) {
        self.algorithms.clear();
        self.frames.clear();
    }
}
