//! Operating modes on top of [`LayoutManager`].

use std::{fmt, str::FromStr, time::Duration};

use log::{debug, info, warn};

use astrolabe_core::{graph::Graph, identifier::Id};

use super::LayoutManager;
use crate::{
    config::{AppConfig, ManagerConfig},
    error::LayoutError,
    events::LayoutEvent,
    layout::{
        Layout, LayoutContext, LayoutOptions,
        engines::{
            EngineBuilder, LayoutKind,
            adaptive::{AdaptationRule, AdaptiveLayout, GraphMetrics},
            constraint::{ConstraintKind, ConstraintLayout},
            nested::NestedLayout,
        },
    },
};

/// How the advanced manager drives the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// One named layout through the plain [`LayoutManager`]
    Standard,
    Constraint,
    Nested,
    Adaptive,
    /// Several subsystems at once
    Hybrid,
}

impl LayoutMode {
    pub fn name(self) -> &'static str {
        match self {
            LayoutMode::Standard => "standard",
            LayoutMode::Constraint => "constraint",
            LayoutMode::Nested => "nested",
            LayoutMode::Adaptive => "adaptive",
            LayoutMode::Hybrid => "hybrid",
        }
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(LayoutMode::Standard),
            "constraint" => Ok(LayoutMode::Constraint),
            "nested" => Ok(LayoutMode::Nested),
            "adaptive" => Ok(LayoutMode::Adaptive),
            "hybrid" => Ok(LayoutMode::Hybrid),
            _ => Err(format!("unknown layout mode '{s}'")),
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A layout subsystem owned by the advanced manager.
///
/// Declaration order is the per-tick write order in hybrid mode: later
/// subsystems overwrite earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Subsystem {
    Adaptive,
    Nested,
    Constraint,
}

impl Subsystem {
    pub const ORDER: [Subsystem; 3] = [Subsystem::Adaptive, Subsystem::Nested, Subsystem::Constraint];

    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Adaptive => "adaptive",
            Subsystem::Nested => "nested",
            Subsystem::Constraint => "constraint",
        }
    }

    fn mode(self) -> LayoutMode {
        match self {
            Subsystem::Adaptive => LayoutMode::Adaptive,
            Subsystem::Nested => LayoutMode::Nested,
            Subsystem::Constraint => LayoutMode::Constraint,
        }
    }
}

/// Weighted graph complexity in `[0, 1]`: size, density and clustering.
pub fn complexity_score(metrics: &GraphMetrics) -> f32 {
    let size = (metrics.node_count as f32 / 500.0).min(1.0);
    let density = (metrics.density * 5.0).min(1.0);
    0.5 * size + 0.3 * density + 0.2 * metrics.clustering
}

/// Layout manager with constraint, nested, adaptive and hybrid modes.
///
/// The mode is either requested explicitly or, with `auto_mode`, inferred
/// from the graph on every [`AdvancedLayoutManager::apply`].
#[derive(Debug)]
pub struct AdvancedLayoutManager {
    config: ManagerConfig,
    default_layout: String,
    standard: LayoutManager,
    adaptive: AdaptiveLayout,
    nested: NestedLayout,
    constraint: ConstraintLayout,
    requested: Option<LayoutMode>,
    mode: LayoutMode,
    enabled: Vec<Subsystem>,
}

impl AdvancedLayoutManager {
    pub fn new(config: &AppConfig, context: LayoutContext) -> Self {
        let builder = EngineBuilder::from_config(config).with_context(context.clone());

        let mut adaptive = AdaptiveLayout::with_builder(builder.clone());
        adaptive.update_config(&builder.options(LayoutKind::Adaptive));
        let mut nested = NestedLayout::new();
        nested.update_config(&builder.options(LayoutKind::Nested));
        nested.set_context(context.clone());
        let mut constraint = ConstraintLayout::new();
        constraint.update_config(&builder.options(LayoutKind::Constraint));
        constraint.set_context(context);

        Self {
            config: config.manager().clone(),
            default_layout: config.layout().default_layout().to_string(),
            standard: LayoutManager::new(builder)
                .with_transition(config.layout().transition(), config.layout().easing()),
            adaptive,
            nested,
            constraint,
            requested: None,
            mode: LayoutMode::Standard,
            enabled: Vec::new(),
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    /// Subsystems running in the current mode, in write order
    pub fn enabled_subsystems(&self) -> &[Subsystem] {
        &self.enabled
    }

    /// True while a morph is still moving nodes
    pub fn is_transitioning(&self) -> bool {
        match self.mode {
            LayoutMode::Standard => self.standard.is_transitioning(),
            _ => self.enabled.contains(&Subsystem::Adaptive) && self.adaptive.is_transitioning(),
        }
    }

    /// True while any continuous layout of the current mode is running
    pub fn is_running(&self) -> bool {
        match self.mode {
            LayoutMode::Standard => self
                .standard
                .active_layout()
                .is_some_and(|layout| layout.is_running()),
            _ => self.enabled.iter().any(|subsystem| match subsystem {
                Subsystem::Adaptive => self.adaptive.is_running(),
                Subsystem::Nested => self.nested.is_running(),
                Subsystem::Constraint => self.constraint.is_running(),
            }),
        }
    }

    /// Forces a mode on the next apply; `None` returns to inference
    pub fn request_mode(&mut self, mode: Option<LayoutMode>) {
        self.requested = mode;
    }

    pub fn standard(&self) -> &LayoutManager {
        &self.standard
    }

    pub fn standard_mut(&mut self) -> &mut LayoutManager {
        &mut self.standard
    }

    pub fn adaptive_layout(&self) -> &AdaptiveLayout {
        &self.adaptive
    }

    pub fn nested_layout(&self) -> &NestedLayout {
        &self.nested
    }

    pub fn constraint_layout(&self) -> &ConstraintLayout {
        &self.constraint
    }

    pub fn constraint_layout_mut(&mut self) -> &mut ConstraintLayout {
        &mut self.constraint
    }

    /// Registers a layout for standard mode
    pub fn register_layout(&mut self, name: impl Into<String>, layout: Box<dyn Layout>) {
        self.standard.register_layout(name, layout);
    }

    /// Registers a user constraint with the constraint subsystem
    pub fn add_constraint(&mut self, kind: ConstraintKind) -> Id {
        self.constraint.add_constraint(kind)
    }

    pub fn remove_constraint(&mut self, id: Id) -> bool {
        self.constraint.remove_constraint(id)
    }

    /// Registers a selection rule with the adaptive subsystem
    pub fn add_rule(&mut self, rule: AdaptationRule) {
        self.adaptive.add_rule(rule);
    }

    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.adaptive.remove_rule(name)
    }

    /// Marks `node` as a container, optionally naming its child layout.
    ///
    /// Returns false when the node does not exist.
    pub fn register_container(&mut self, graph: &mut Graph, node: Id, child_layout: Option<&str>) -> bool {
        let Some(record) = graph.node_mut(node) else {
            return false;
        };
        record.data.is_container = true;
        if let Some(layout) = child_layout {
            record.data.child_layout = Some(layout.to_string());
        }
        true
    }

    /// Complexity score of `graph`
    pub fn complexity(&self, graph: &Graph) -> f32 {
        complexity_score(&GraphMetrics::compute(graph))
    }

    /// Infers the mode and its subsystems from the graph's features
    pub fn detect_mode(&self, graph: &Graph) -> (LayoutMode, Vec<Subsystem>) {
        let complexity = self.complexity(graph);
        let features = [
            (Subsystem::Adaptive, complexity > self.config.complexity_threshold()),
            (Subsystem::Nested, graph.nodes().any(|node| node.is_container())),
            (Subsystem::Constraint, graph.edges().any(|edge| edge.has_constraint_data())),
        ];
        let detected: Vec<Subsystem> = features
            .into_iter()
            .filter_map(|(subsystem, present)| present.then_some(subsystem))
            .collect();
        debug!(complexity, detected:? = detected; "Mode detection");

        match detected.as_slice() {
            [] => (LayoutMode::Standard, Vec::new()),
            [single] => (single.mode(), vec![*single]),
            _ => {
                let allowed: Vec<Subsystem> = detected
                    .into_iter()
                    .filter(|subsystem| self.hybrid_allows(*subsystem))
                    .collect();
                match allowed.as_slice() {
                    [] => (LayoutMode::Standard, Vec::new()),
                    [single] => (single.mode(), vec![*single]),
                    _ => (LayoutMode::Hybrid, allowed),
                }
            }
        }
    }

    fn hybrid_allows(&self, subsystem: Subsystem) -> bool {
        let flags = self.config.hybrid();
        match subsystem {
            Subsystem::Adaptive => flags.adaptive,
            Subsystem::Nested => flags.nested,
            Subsystem::Constraint => flags.constraint,
        }
    }

    fn resolve_mode(&self, graph: &Graph) -> (LayoutMode, Vec<Subsystem>) {
        match self.requested {
            Some(LayoutMode::Standard) => (LayoutMode::Standard, Vec::new()),
            Some(LayoutMode::Adaptive) => (LayoutMode::Adaptive, vec![Subsystem::Adaptive]),
            Some(LayoutMode::Nested) => (LayoutMode::Nested, vec![Subsystem::Nested]),
            Some(LayoutMode::Constraint) => (LayoutMode::Constraint, vec![Subsystem::Constraint]),
            Some(LayoutMode::Hybrid) => {
                let allowed = Subsystem::ORDER
                    .into_iter()
                    .filter(|subsystem| self.hybrid_allows(*subsystem))
                    .collect();
                (LayoutMode::Hybrid, allowed)
            }
            None if self.config.auto_mode() => self.detect_mode(graph),
            None => (LayoutMode::Standard, Vec::new()),
        }
    }

    /// Stops whatever runs now, picks the mode and starts it.
    ///
    /// `layout` names the layout for standard mode; the configured default is
    /// used when it is `None`.
    ///
    /// # Errors
    ///
    /// Returns the first error of the standard manager or of a subsystem's
    /// `init`. Subsystems after the failing one are not started.
    pub fn apply(&mut self, graph: &mut Graph, layout: Option<&str>) -> Result<LayoutMode, LayoutError> {
        self.stop(graph);
        let (mode, enabled) = self.resolve_mode(graph);
        self.mode = mode;
        self.enabled = enabled;
        info!(mode = mode.name(), subsystems:? = self.enabled; "Layout mode applied");

        if mode == LayoutMode::Standard {
            let name = layout.unwrap_or(&self.default_layout).to_string();
            self.standard.apply_layout(graph, &name, &LayoutOptions::new())?;
            return Ok(mode);
        }

        for subsystem in self.enabled.clone() {
            let context = self.standard.context().clone();
            let layout = self.subsystem_mut(subsystem);
            layout.init(graph, &LayoutOptions::new())?;
            if layout.is_continuous() {
                layout.run();
            }
            context.publish(LayoutEvent::Started {
                name: subsystem.name().to_string(),
            });
        }
        Ok(mode)
    }

    /// Stops the standard layout and every running subsystem
    pub fn stop(&mut self, graph: &mut Graph) {
        if self.mode == LayoutMode::Standard {
            self.standard.stop_layout(graph);
            return;
        }
        let context = self.standard.context().clone();
        for subsystem in self.enabled.clone() {
            self.subsystem_mut(subsystem).stop();
            context.publish(LayoutEvent::Stopped {
                name: subsystem.name().to_string(),
            });
        }
    }

    /// Advances the active mode.
    ///
    /// In hybrid mode the subsystems write in [`Subsystem::ORDER`]; the nested
    /// subsystem re-arranges containers each tick so it has the final say over
    /// container children ahead of the constraint solver.
    pub fn tick(&mut self, graph: &mut Graph, dt: Duration) {
        if self.mode == LayoutMode::Standard {
            self.standard.tick(graph, dt);
            return;
        }
        let hybrid = self.mode == LayoutMode::Hybrid;
        for subsystem in self.enabled.clone() {
            match subsystem {
                Subsystem::Nested if hybrid => {
                    if let Err(err) = self.nested.kick(graph, 0.0) {
                        warn!(err:% = err; "Nested re-arrangement failed");
                    }
                }
                _ => self.subsystem_mut(subsystem).tick(graph, dt),
            }
        }
    }

    /// Re-triggers every active subsystem
    ///
    /// # Errors
    ///
    /// Returns the first `kick` error.
    pub fn kick(&mut self, graph: &mut Graph, intensity: f32) -> Result<(), LayoutError> {
        if self.mode == LayoutMode::Standard {
            return self.standard.kick(graph, intensity);
        }
        for subsystem in self.enabled.clone() {
            self.subsystem_mut(subsystem).kick(graph, intensity)?;
        }
        Ok(())
    }

    pub fn add_node(&mut self, graph: &Graph, node: Id) {
        if self.mode == LayoutMode::Standard {
            self.standard.add_node_to_layout(graph, node);
        }
        for layout in self.active_subsystems() {
            layout.add_node(graph, node);
        }
    }

    pub fn remove_node(&mut self, node: Id) {
        if self.mode == LayoutMode::Standard {
            self.standard.remove_node_from_layout(node);
        }
        for layout in self.active_subsystems() {
            layout.remove_node(node);
        }
    }

    pub fn add_edge(&mut self, graph: &Graph, edge: Id) {
        if self.mode == LayoutMode::Standard {
            self.standard.add_edge_to_layout(graph, edge);
        }
        for layout in self.active_subsystems() {
            layout.add_edge(graph, edge);
        }
    }

    pub fn remove_edge(&mut self, edge: Id) {
        if self.mode == LayoutMode::Standard {
            self.standard.remove_edge_from_layout(edge);
        }
        for layout in self.active_subsystems() {
            layout.remove_edge(edge);
        }
    }

    /// Sets or clears the persistent pin on `node` and tells every subsystem
    pub fn set_pinned(&mut self, graph: &mut Graph, node: Id, pinned: bool) {
        if self.mode == LayoutMode::Standard {
            self.standard.set_pinned(graph, node, pinned);
            return;
        }
        let Some(record) = graph.node_mut(node) else {
            return;
        };
        record.is_pinned = pinned;
        for layout in self.active_subsystems() {
            layout.node_state_changed(graph, node);
        }
    }

    /// Stops everything and releases the subsystems' resources
    pub fn dispose(&mut self) {
        self.standard.dispose();
        self.adaptive.dispose();
        self.nested.dispose();
        self.constraint.dispose();
        self.enabled.clear();
        self.mode = LayoutMode::Standard;
    }

    fn subsystem_mut(&mut self, subsystem: Subsystem) -> &mut dyn Layout {
        match subsystem {
            Subsystem::Adaptive => &mut self.adaptive,
            Subsystem::Nested => &mut self.nested,
            Subsystem::Constraint => &mut self.constraint,
        }
    }

    fn active_subsystems(&mut self) -> Vec<&mut dyn Layout> {
        let mut layouts: Vec<&mut dyn Layout> = Vec::new();
        if self.enabled.contains(&Subsystem::Adaptive) {
            layouts.push(&mut self.adaptive);
        }
        if self.enabled.contains(&Subsystem::Nested) {
            layouts.push(&mut self.nested);
        }
        if self.enabled.contains(&Subsystem::Constraint) {
            layouts.push(&mut self.constraint);
        }
        layouts
    }
}
