//! The common layout contract.
//!
//! Every algorithm, primitive or composite, implements [`Layout`]. Methods an
//! algorithm has no use for keep their no-op defaults, so callers can drive any
//! layout through the same calls without probing for capabilities.
//!
//! # Position ownership
//!
//! A layout writes `position` only for nodes that are not locked (see
//! [`LayoutNode::is_locked`](astrolabe_core::graph::LayoutNode::is_locked)).
//! External code that needs to move a node without being overwritten pins or
//! fixes it first; that is the only sanctioned way to suspend engine writes.

pub mod engines;
mod options;
mod transition;

pub use options::{FromOption, LayoutOptions, OptionValue};
pub use transition::{Easing, Transition};

use std::{fmt, sync::Arc, time::Duration};

use astrolabe_core::{
    geometry::Vec3,
    graph::Graph,
    identifier::Id,
};

use crate::{
    error::LayoutError,
    events::{EventSink, LayoutEvent, NullSink},
};

/// Shared handles a layout needs from its owner.
#[derive(Clone)]
pub struct LayoutContext {
    events: Arc<dyn EventSink>,
}

impl LayoutContext {
    /// Creates a context publishing into `events`
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }

    /// Publishes one event
    pub fn publish(&self, event: LayoutEvent) {
        self.events.publish(event);
    }

    /// The shared sink
    pub fn events(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.events)
    }
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}

impl fmt::Debug for LayoutContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutContext").finish_non_exhaustive()
    }
}

/// A layout algorithm.
///
/// `init` (re)computes positions for every unlocked node. Options passed to
/// `init` or `update_config` are merged over the layout's current settings,
/// which start at the algorithm's defaults; unknown keys are ignored.
pub trait Layout: Send {
    /// Registered name of the algorithm
    fn name(&self) -> &'static str;

    /// Installs the owner's shared handles
    fn set_context(&mut self, context: LayoutContext) {
        let _ = context;
    }

    /// Computes and assigns positions for all unlocked nodes
    ///
    /// # Errors
    ///
    /// Returns `LayoutError` when the algorithm cannot start, e.g. when a
    /// background worker is unreachable.
    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError>;

    /// True for algorithms with a continuous `run` phase
    fn is_continuous(&self) -> bool {
        false
    }

    /// True while the continuous phase is active
    fn is_running(&self) -> bool {
        false
    }

    /// Starts the continuous phase
    fn run(&mut self) {}

    /// Requests the continuous phase to end
    fn stop(&mut self) {}

    /// Re-triggers computation after small graph edits.
    ///
    /// The default re-runs `init` with the current settings.
    fn kick(&mut self, graph: &mut Graph, intensity: f32) -> Result<(), LayoutError> {
        let _ = intensity;
        self.init(graph, &LayoutOptions::new())
    }

    /// Notifies the layout that `node` was added to the graph
    fn add_node(&mut self, graph: &Graph, node: Id) {
        let _ = (graph, node);
    }

    /// Notifies the layout that `node` (and its edges) left the graph
    fn remove_node(&mut self, node: Id) {
        let _ = node;
    }

    /// Notifies the layout that `edge` was added to the graph
    fn add_edge(&mut self, graph: &Graph, edge: Id) {
        let _ = (graph, edge);
    }

    /// Notifies the layout that `edge` left the graph
    fn remove_edge(&mut self, edge: Id) {
        let _ = edge;
    }

    /// Notifies the layout that a node's pinned/fixed flags or held position changed
    fn node_state_changed(&mut self, graph: &Graph, node: Id) {
        let _ = (graph, node);
    }

    /// Merges `options` over the current settings
    fn update_config(&mut self, options: &LayoutOptions);

    /// Per-frame hook: applies background results, advances animations and timers
    fn tick(&mut self, graph: &mut Graph, dt: Duration) {
        let _ = (graph, dt);
    }

    /// Releases every resource held by the layout
    fn dispose(&mut self) {}
}

/// Assigns one slot per node in graph order, skipping locked nodes.
///
/// Locked nodes still consume their slot so the others do not shift when a
/// node gets pinned.
pub(crate) fn place_in_slots<F>(graph: &mut Graph, mut slot: F)
where
    F: FnMut(usize, usize) -> Vec3,
{
    let count = graph.node_count();
    let ids: Vec<Id> = graph.nodes().map(|node| node.id).collect();
    for (index, id) in ids.into_iter().enumerate() {
        let position = slot(index, count);
        graph.move_node(id, position);
    }
}
