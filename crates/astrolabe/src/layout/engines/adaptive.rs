//! Metrics-driven layout selection.
//!
//! [`AdaptiveLayout`] measures the graph, asks its [`RuleSet`] for a layout
//! name, builds that layout through the [`EngineBuilder`] and morphs every
//! node from where it was to where the new layout put it. While running it
//! can re-evaluate on a timer (`auto_adapt`) or walk a fixed list of layouts
//! regardless of the metrics (`time_based`).

mod metrics;
mod rules;

pub use metrics::GraphMetrics;
pub use rules::{AdaptationRule, FallbackThresholds, RulePredicate, RuleSet, Selection};

use std::{fmt, time::Duration};

use log::{debug, info, warn};

use astrolabe_core::{graph::Graph, identifier::Id};

use super::{EngineBuilder, LayoutKind};
use crate::{
    error::LayoutError,
    events::LayoutEvent,
    layout::{Easing, Layout, LayoutContext, LayoutOptions, Transition},
};

/// Settings for [`AdaptiveLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    pub morph_duration_ms: u64,
    pub easing: Easing,
    pub auto_adapt: bool,
    pub evaluation_interval_ms: u64,
    pub time_based: bool,
    pub cycle_interval_ms: u64,
    pub cycle_pattern: Vec<String>,
    pub fallback: FallbackThresholds,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            morph_duration_ms: 1000,
            easing: Easing::EaseInOutCubic,
            auto_adapt: false,
            evaluation_interval_ms: 5000,
            time_based: false,
            cycle_interval_ms: 10000,
            cycle_pattern: ["force", "hierarchical", "circular", "grid"]
                .map(String::from)
                .to_vec(),
            fallback: FallbackThresholds::default(),
        }
    }
}

impl AdaptiveConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("morph_duration_ms", &mut self.morph_duration_ms);
        options.load("easing", &mut self.easing);
        options.load("auto_adapt", &mut self.auto_adapt);
        options.load("evaluation_interval_ms", &mut self.evaluation_interval_ms);
        options.load("time_based", &mut self.time_based);
        options.load("cycle_interval_ms", &mut self.cycle_interval_ms);
        options.load("cycle_pattern", &mut self.cycle_pattern);
        options.load("small_graph_threshold", &mut self.fallback.small_graph);
        options.load("hierarchy_threshold", &mut self.fallback.hierarchy);
        options.load("density_threshold", &mut self.fallback.density);
    }
}

/// Picks and drives one of the other layouts.
pub struct AdaptiveLayout {
    config: AdaptiveConfig,
    rules: RuleSet,
    builder: EngineBuilder,
    context: LayoutContext,
    current: Option<Box<dyn Layout>>,
    metrics: Option<GraphMetrics>,
    transition: Option<Transition>,
    running: bool,
    since_evaluation: Duration,
    since_cycle: Duration,
    next_cycle: usize,
}

impl fmt::Debug for AdaptiveLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveLayout")
            .field("config", &self.config)
            .field("current", &self.current_layout())
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Default for AdaptiveLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveLayout {
    pub fn new() -> Self {
        Self::with_builder(EngineBuilder::new())
    }

    /// Creates an adaptive layout that builds its candidates with `builder`
    pub fn with_builder(builder: EngineBuilder) -> Self {
        Self {
            config: AdaptiveConfig::default(),
            rules: RuleSet::default(),
            context: builder.context().clone(),
            builder,
            current: None,
            metrics: None,
            transition: None,
            running: false,
            since_evaluation: Duration::ZERO,
            since_cycle: Duration::ZERO,
            next_cycle: 0,
        }
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Adds a rule, replacing any rule of the same name
    pub fn add_rule(&mut self, rule: AdaptationRule) {
        self.rules.add(rule);
    }

    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.rules.remove(name)
    }

    /// Name of the layout currently driving the graph
    pub fn current_layout(&self) -> Option<&'static str> {
        self.current.as_ref().map(|layout| layout.name())
    }

    /// Metrics from the most recent evaluation
    pub fn metrics(&self) -> Option<&GraphMetrics> {
        self.metrics.as_ref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Measures `graph` and selects a layout without applying it
    pub fn evaluate(&self, graph: &Graph) -> (GraphMetrics, Selection) {
        let metrics = GraphMetrics::compute(graph);
        let selection = self.rules.select(&metrics);
        (metrics, selection)
    }

    /// Replaces the current layout with `target`, morphing every node.
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::UnknownLayout` for names the builder does not
    /// know (including `adaptive` itself) and any error of the new layout's
    /// `init`. A morph still in flight is completed first; apart from that the
    /// current layout and all positions are left untouched on error.
    pub fn switch_to(&mut self, graph: &mut Graph, target: &str, reason: &str) -> Result<(), LayoutError> {
        let kind: LayoutKind = target.parse()?;
        if kind == LayoutKind::Adaptive {
            return Err(LayoutError::UnknownLayout(target.to_string()));
        }

        if let Some(mut transition) = self.transition.take() {
            transition.finish(graph);
        }
        let snapshot = graph.positions();
        let mut next = self.builder.build(kind);
        next.set_context(self.context.clone());
        if let Err(err) = next.init(graph, &LayoutOptions::new()) {
            graph.restore_positions(&snapshot);
            return Err(err);
        }

        let from = self.current.take().map(|mut previous| {
            previous.stop();
            previous.dispose();
            previous.name().to_string()
        });

        let duration = Duration::from_millis(self.config.morph_duration_ms);
        let transition = Transition::start(graph, &snapshot, duration, self.config.easing);
        self.transition = (!transition.is_finished()).then_some(transition);
        self.current = Some(next);

        info!(from:? = from, to = target, reason = reason; "Adaptive layout switched");
        self.context.publish(LayoutEvent::Adapted {
            from,
            to: target.to_string(),
            reason: reason.to_string(),
        });

        if self.transition.is_none() {
            self.start_current();
        }
        Ok(())
    }

    /// Starts the current layout's continuous phase if this layout runs
    fn start_current(&mut self) {
        if !self.running {
            return;
        }
        if let Some(current) = self.current.as_mut() {
            if current.is_continuous() {
                current.run();
            }
        }
    }

    /// Re-runs the selection and switches when the answer changed
    fn reevaluate(&mut self, graph: &mut Graph) {
        let (metrics, selection) = self.evaluate(graph);
        self.metrics = Some(metrics);
        if self.current_layout() == Some(selection.target.as_str()) {
            return;
        }
        if let Err(err) = self.switch_to(graph, &selection.target, &selection.reason) {
            warn!(layout:% = selection.target, err:% = err; "Adaptive re-evaluation failed");
        }
    }

    fn advance_cycle(&mut self, graph: &mut Graph) {
        let pattern = &self.config.cycle_pattern;
        if pattern.is_empty() {
            return;
        }
        let target = pattern[self.next_cycle % pattern.len()].clone();
        self.next_cycle = (self.next_cycle + 1) % pattern.len();
        if self.current_layout() == Some(target.as_str()) {
            return;
        }
        if let Err(err) = self.switch_to(graph, &target, "time-based cycle") {
            warn!(layout:% = target, err:% = err; "Adaptive cycle step failed");
        }
    }
}

/// True once `elapsed` covers an interval of `millis` (at least 1ms)
fn due(elapsed: Duration, millis: u64) -> bool {
    elapsed >= Duration::from_millis(millis.max(1))
}

impl Layout for AdaptiveLayout {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn set_context(&mut self, context: LayoutContext) {
        if let Some(current) = self.current.as_mut() {
            current.set_context(context.clone());
        }
        self.context = context;
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.update_config(options);
        let (metrics, selection) = self.evaluate(graph);
        debug!(
            node_count = metrics.node_count,
            density = metrics.density,
            hierarchy_score = metrics.hierarchy_score,
            clustering = metrics.clustering,
            selected:% = selection.target;
            "Adaptive evaluation"
        );
        self.metrics = Some(metrics);
        self.since_evaluation = Duration::ZERO;
        self.since_cycle = Duration::ZERO;

        match self.current.as_mut() {
            Some(current) if current.name() == selection.target => {
                current.init(graph, &LayoutOptions::new())
            }
            _ => self.switch_to(graph, &selection.target, &selection.reason),
        }
    }

    fn is_continuous(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn run(&mut self) {
        self.running = true;
        if self.transition.is_none() {
            self.start_current();
        }
    }

    fn stop(&mut self) {
        self.running = false;
        if let Some(current) = self.current.as_mut() {
            current.stop();
        }
    }

    fn kick(&mut self, graph: &mut Graph, intensity: f32) -> Result<(), LayoutError> {
        match self.current.as_mut() {
            Some(current) => current.kick(graph, intensity),
            None => self.init(graph, &LayoutOptions::new()),
        }
    }

    fn add_node(&mut self, graph: &Graph, node: Id) {
        if let Some(current) = self.current.as_mut() {
            current.add_node(graph, node);
        }
    }

    fn remove_node(&mut self, node: Id) {
        if let Some(current) = self.current.as_mut() {
            current.remove_node(node);
        }
    }

    fn add_edge(&mut self, graph: &Graph, edge: Id) {
        if let Some(current) = self.current.as_mut() {
            current.add_edge(graph, edge);
        }
    }

    fn remove_edge(&mut self, edge: Id) {
        if let Some(current) = self.current.as_mut() {
            current.remove_edge(edge);
        }
    }

    fn node_state_changed(&mut self, graph: &Graph, node: Id) {
        if let Some(current) = self.current.as_mut() {
            current.node_state_changed(graph, node);
        }
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
        self.rules.set_fallback(self.config.fallback);
    }

    fn tick(&mut self, graph: &mut Graph, dt: Duration) {
        match self.transition.as_mut() {
            Some(transition) => {
                if transition.advance(graph, dt) {
                    self.transition = None;
                    self.start_current();
                }
            }
            None => {
                if let Some(current) = self.current.as_mut() {
                    current.tick(graph, dt);
                }
            }
        }

        if !self.running {
            return;
        }
        if self.config.auto_adapt {
            self.since_evaluation += dt;
            if due(self.since_evaluation, self.config.evaluation_interval_ms) {
                self.since_evaluation = Duration::ZERO;
                self.reevaluate(graph);
            }
        }
        if self.config.time_based {
            self.since_cycle += dt;
            if due(self.since_cycle, self.config.cycle_interval_ms) {
                self.since_cycle = Duration::ZERO;
                self.advance_cycle(graph);
            }
        }
    }

    fn dispose(&mut self) {
        if let Some(mut current) = self.current.take() {
            current.stop();
            current.dispose();
        }
        self.transition = None;
        self.running = false;
    }
}
