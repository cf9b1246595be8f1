//! Named layout registry with animated switching.
//!
//! [`LayoutManager`] owns one instance per layout name and at most one active
//! layout. Applying a layout stops the previous one, lets the new one compute
//! its targets, and morphs every node there over the configured duration; a
//! continuous layout only starts running once the morph has finished.
//!
//! [`AdvancedLayoutManager`] builds on it with operating modes that run the
//! adaptive, nested and constraint subsystems side by side.

mod advanced;

pub use advanced::{AdvancedLayoutManager, LayoutMode, Subsystem, complexity_score};

use std::{fmt, time::Duration};

use indexmap::IndexMap;
use log::{debug, info, warn};

use astrolabe_core::{
    graph::{Graph, LayoutNode},
    identifier::Id,
};

use crate::{
    config::AppConfig,
    error::LayoutError,
    events::LayoutEvent,
    layout::{
        Easing, Layout, LayoutContext, LayoutOptions, Transition,
        engines::EngineBuilder,
    },
};

/// Registry of layouts with a single active one.
pub struct LayoutManager {
    builder: EngineBuilder,
    layouts: IndexMap<String, Box<dyn Layout>>,
    active: Option<String>,
    transition: Option<Transition>,
    pending_run: bool,
    /// Started and not yet reported stopped
    live: bool,
    duration: Duration,
    easing: Easing,
}

impl fmt::Debug for LayoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutManager")
            .field("layouts", &self.layouts.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("transitioning", &self.transition.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new(EngineBuilder::new())
    }
}

impl LayoutManager {
    /// Creates a manager that builds unregistered layouts with `builder`
    pub fn new(builder: EngineBuilder) -> Self {
        Self {
            builder,
            layouts: IndexMap::new(),
            active: None,
            transition: None,
            pending_run: false,
            live: false,
            duration: Duration::from_millis(1000),
            easing: Easing::default(),
        }
    }

    /// Creates a manager from the application configuration
    pub fn from_config(config: &AppConfig, context: LayoutContext) -> Self {
        let builder = EngineBuilder::from_config(config).with_context(context);
        Self::new(builder).with_transition(config.layout().transition(), config.layout().easing())
    }

    /// Sets the morph used by [`LayoutManager::apply_layout`]
    pub fn with_transition(mut self, duration: Duration, easing: Easing) -> Self {
        self.duration = duration;
        self.easing = easing;
        self
    }

    pub fn builder(&self) -> &EngineBuilder {
        &self.builder
    }

    pub fn context(&self) -> &LayoutContext {
        self.builder.context()
    }

    /// Registers `layout` under `name`, replacing (and disposing) any previous
    /// instance. Replacing the active layout deactivates it.
    pub fn register_layout(&mut self, name: impl Into<String>, mut layout: Box<dyn Layout>) {
        let name = name.into();
        layout.set_context(self.context().clone());
        if let Some(mut previous) = self.layouts.insert(name.clone(), layout) {
            previous.stop();
            previous.dispose();
            if self.active.as_deref() == Some(name.as_str()) {
                self.active = None;
                self.transition = None;
                self.pending_run = false;
                self.live = false;
            }
        }
        debug!(layout:% = name; "Layout registered");
    }

    /// Names of the registered layouts in registration order
    pub fn layout_names(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    pub fn active_layout_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_layout(&self) -> Option<&dyn Layout> {
        let name = self.active.as_ref()?;
        self.layouts.get(name).map(|layout| layout.as_ref())
    }

    pub fn active_layout_mut(&mut self) -> Option<&mut Box<dyn Layout>> {
        let name = self.active.as_ref()?;
        self.layouts.get_mut(name)
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Activates the layout registered as `name`, building it first when the
    /// name is known to the builder but not registered yet.
    ///
    /// Publishes `layout:stopped` for the layout being replaced and
    /// `layout:started` for the new one, also when re-applying the active
    /// layout.
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::UnknownLayout` when `name` is neither registered
    /// nor buildable; the active layout is unchanged. An error from the new
    /// layout's `init` restores every position and leaves the previous layout
    /// stopped but still active.
    pub fn apply_layout(&mut self, graph: &mut Graph, name: &str, options: &LayoutOptions) -> Result<(), LayoutError> {
        if !self.layouts.contains_key(name) {
            match self.builder.build_named(name) {
                Ok(layout) => self.register_layout(name, layout),
                Err(err) => {
                    warn!(layout = name; "Unknown layout requested");
                    return Err(err);
                }
            }
        }

        if let Some(mut transition) = self.transition.take() {
            transition.finish(graph);
        }
        self.stop_active();

        let snapshot = graph.positions();
        let Some(layout) = self.layouts.get_mut(name) else {
            return Err(LayoutError::UnknownLayout(name.to_string()));
        };
        if let Err(err) = layout.init(graph, options) {
            warn!(layout = name, err:% = err; "Layout init failed");
            graph.restore_positions(&snapshot);
            return Err(err);
        }
        let continuous = layout.is_continuous();

        let transition = Transition::start(graph, &snapshot, self.duration, self.easing);
        self.transition = (!transition.is_finished()).then_some(transition);
        self.active = Some(name.to_string());
        info!(layout = name, morph = self.transition.is_some(); "Layout applied");

        if continuous {
            if self.transition.is_some() {
                self.pending_run = true;
            } else {
                self.start_active();
            }
        }
        self.live = true;
        self.context().publish(LayoutEvent::Started {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Stops the active layout; returns false when none is active.
    ///
    /// A morph in flight jumps to its targets. The layout stays active so
    /// that later mutations still reach it.
    pub fn stop_layout(&mut self, graph: &mut Graph) -> bool {
        if self.active.is_none() {
            return false;
        }
        if let Some(mut transition) = self.transition.take() {
            transition.finish(graph);
        }
        self.stop_active();
        true
    }

    /// Forwards a new node to the active layout
    pub fn add_node_to_layout(&mut self, graph: &Graph, node: Id) {
        if let Some(layout) = self.active_layout_mut() {
            layout.add_node(graph, node);
        }
    }

    /// Forwards a node removal to the active layout
    pub fn remove_node_from_layout(&mut self, node: Id) {
        if let Some(layout) = self.active_layout_mut() {
            layout.remove_node(node);
        }
    }

    pub fn add_edge_to_layout(&mut self, graph: &Graph, edge: Id) {
        if let Some(layout) = self.active_layout_mut() {
            layout.add_edge(graph, edge);
        }
    }

    pub fn remove_edge_from_layout(&mut self, edge: Id) {
        if let Some(layout) = self.active_layout_mut() {
            layout.remove_edge(edge);
        }
    }

    /// Re-triggers the active layout; a no-op without one.
    ///
    /// # Errors
    ///
    /// Propagates the active layout's `kick` error.
    pub fn kick(&mut self, graph: &mut Graph, intensity: f32) -> Result<(), LayoutError> {
        match self.active_layout_mut() {
            Some(layout) => layout.kick(graph, intensity),
            None => Ok(()),
        }
    }

    /// Transiently holds `node` in place
    pub fn fix_node(&mut self, graph: &mut Graph, node: Id) {
        self.set_hold(graph, node, |record| record.is_fixed = true);
    }

    /// Releases a transient hold
    pub fn release_node(&mut self, graph: &mut Graph, node: Id) {
        self.set_hold(graph, node, |record| record.is_fixed = false);
    }

    /// Sets or clears the persistent pin on `node`
    pub fn set_pinned(&mut self, graph: &mut Graph, node: Id, pinned: bool) {
        self.set_hold(graph, node, |record| record.is_pinned = pinned);
    }

    fn set_hold<F>(&mut self, graph: &mut Graph, node: Id, update: F)
    where
        F: FnOnce(&mut LayoutNode),
    {
        let Some(record) = graph.node_mut(node) else {
            return;
        };
        update(record);
        if let Some(layout) = self.active_layout_mut() {
            layout.node_state_changed(graph, node);
        }
    }

    /// Advances the morph, or the active layout once no morph is running
    pub fn tick(&mut self, graph: &mut Graph, dt: Duration) {
        if let Some(transition) = self.transition.as_mut() {
            if transition.advance(graph, dt) {
                self.transition = None;
                if std::mem::take(&mut self.pending_run) {
                    self.start_active();
                }
            }
            return;
        }
        if let Some(layout) = self.active_layout_mut() {
            layout.tick(graph, dt);
        }
    }

    /// Stops and disposes every registered layout
    pub fn dispose(&mut self) {
        for layout in self.layouts.values_mut() {
            layout.stop();
            layout.dispose();
        }
        self.layouts.clear();
        self.active = None;
        self.transition = None;
        self.pending_run = false;
        self.live = false;
    }

    fn start_active(&mut self) {
        if let Some(layout) = self.active_layout_mut() {
            layout.run();
        }
    }

    /// Stops the active layout and reports it once per apply.
    ///
    /// A continuous layout that stopped by itself has already published its
    /// own `layout:stopped`.
    fn stop_active(&mut self) {
        let pending = std::mem::take(&mut self.pending_run);
        let live = std::mem::take(&mut self.live);
        let Some(name) = self.active.clone() else {
            return;
        };
        let Some(layout) = self.layouts.get_mut(&name) else {
            return;
        };
        let self_stopped = layout.is_continuous() && !layout.is_running() && !pending;
        layout.stop();
        if live && !self_stopped {
            self.context().publish(LayoutEvent::Stopped { name });
        }
    }
}

impl Drop for LayoutManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Instant};

    use float_cmp::assert_approx_eq;

    use astrolabe_core::{geometry::Vec3, graph::LayoutEdge};

    use super::*;
    use crate::events::EventLog;

    fn manager(log: &Arc<EventLog>, morph_ms: u64) -> LayoutManager {
        let builder = EngineBuilder::new().with_context(LayoutContext::new(log.clone()));
        LayoutManager::new(builder).with_transition(Duration::from_millis(morph_ms), Easing::Linear)
    }

    fn four_nodes() -> Graph {
        let mut graph = Graph::new();
        for name in ["n0", "n1", "n2", "n3"] {
            graph.add_node(LayoutNode::new(name)).unwrap();
        }
        graph
    }

    #[test]
    fn test_apply_builds_and_activates() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = four_nodes();

        manager
            .apply_layout(&mut graph, "circular", &LayoutOptions::new().with("radius", 200.0))
            .unwrap();

        assert_eq!(manager.active_layout_name(), Some("circular"));
        assert_approx_eq!(f32, graph.node(Id::new("n1")).unwrap().position.y(), 200.0, epsilon = 1e-3);
        assert_eq!(log.topics(), vec!["layout:started"]);
    }

    #[test]
    fn test_unknown_layout_keeps_active() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = four_nodes();
        manager.apply_layout(&mut graph, "grid", &LayoutOptions::new()).unwrap();
        let before = graph.positions();

        let err = manager
            .apply_layout(&mut graph, "spiral", &LayoutOptions::new())
            .unwrap_err();
        assert!(matches!(err, LayoutError::UnknownLayout(_)));
        assert_eq!(manager.active_layout_name(), Some("grid"));
        assert_eq!(graph.positions(), before);
        assert_eq!(log.topics(), vec!["layout:started"]);
    }

    #[test]
    fn test_switch_emits_stop_then_start_and_morphs() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 100);
        let mut graph = four_nodes();
        manager.apply_layout(&mut graph, "grid", &LayoutOptions::new()).unwrap();
        // Morph from the origin to the grid.
        manager.tick(&mut graph, Duration::from_millis(100));
        let grid = graph.positions();

        manager
            .apply_layout(&mut graph, "circular", &LayoutOptions::new())
            .unwrap();
        assert!(manager.is_transitioning());
        assert_eq!(graph.positions(), grid);

        manager.tick(&mut graph, Duration::from_millis(100));
        assert!(!manager.is_transitioning());
        assert_eq!(
            graph.node(Id::new("n0")).unwrap().position,
            Vec3::new(200.0, 0.0, 0.0)
        );
        assert_eq!(
            log.topics(),
            vec!["layout:started", "layout:stopped", "layout:started"]
        );
    }

    #[test]
    fn test_continuous_layout_runs_after_morph() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 50);
        let mut graph = four_nodes();

        manager
            .apply_layout(&mut graph, "constraint", &LayoutOptions::new())
            .unwrap();
        if manager.is_transitioning() {
            assert!(!manager.active_layout().unwrap().is_running());
            manager.tick(&mut graph, Duration::from_millis(50));
        }
        assert!(manager.active_layout().unwrap().is_running());

        assert!(manager.stop_layout(&mut graph));
        assert!(!manager.active_layout().unwrap().is_running());
        assert_eq!(log.topics().last(), Some(&"layout:stopped"));
    }

    #[test]
    fn test_self_stopped_force_reports_stop_once() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = Graph::new();
        graph
            .add_node(LayoutNode::new("w0").with_position(Vec3::new(-30.0, 0.0, 0.0)))
            .unwrap();
        graph
            .add_node(LayoutNode::new("w1").with_position(Vec3::new(30.0, 0.0, 0.0)))
            .unwrap();
        graph.add_edge(LayoutEdge::new("w0", "w1")).unwrap();
        let options = LayoutOptions::new()
            .with("frame_interval_ms", 0.0)
            .with("auto_stop_delay_ms", 50.0);

        manager.apply_layout(&mut graph, "force", &options).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while manager.active_layout().unwrap().is_running() && Instant::now() < deadline {
            manager.tick(&mut graph, Duration::from_millis(16));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!manager.active_layout().unwrap().is_running());
        assert_eq!(log.topics(), vec!["layout:started", "layout:stopped"]);

        manager.stop_layout(&mut graph);
        manager.stop_layout(&mut graph);
        assert_eq!(log.topics(), vec!["layout:started", "layout:stopped"]);
    }

    #[test]
    fn test_stop_is_reported_once_per_apply() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = four_nodes();
        manager.apply_layout(&mut graph, "grid", &LayoutOptions::new()).unwrap();

        manager.stop_layout(&mut graph);
        manager.stop_layout(&mut graph);
        assert_eq!(log.topics(), vec!["layout:started", "layout:stopped"]);
    }

    #[test]
    fn test_pinned_node_survives_apply() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = four_nodes();
        graph.move_node(Id::new("n2"), Vec3::new(7.0, 8.0, 9.0));
        manager.set_pinned(&mut graph, Id::new("n2"), true);

        manager.apply_layout(&mut graph, "spherical", &LayoutOptions::new()).unwrap();
        assert_eq!(graph.node(Id::new("n2")).unwrap().position, Vec3::new(7.0, 8.0, 9.0));
        assert!(graph.node(Id::new("n2")).unwrap().is_pinned);
    }

    #[test]
    fn test_registered_instance_is_used() {
        let log = Arc::new(EventLog::new());
        let mut manager = manager(&log, 0);
        let mut graph = four_nodes();
        let custom = EngineBuilder::new()
            .with_options(
                crate::layout::engines::LayoutKind::Grid,
                LayoutOptions::new().with("spacing", 10.0),
            )
            .build(crate::layout::engines::LayoutKind::Grid);
        manager.register_layout("tight-grid", custom);

        manager
            .apply_layout(&mut graph, "tight-grid", &LayoutOptions::new())
            .unwrap();
        assert_eq!(manager.active_layout().unwrap().name(), "grid");
        let n0 = graph.node(Id::new("n0")).unwrap().position;
        let n1 = graph.node(Id::new("n1")).unwrap().position;
        assert_eq!(n0.distance(n1), 10.0);
    }
}
