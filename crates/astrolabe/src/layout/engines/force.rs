//! Force-directed layout running on a background thread.
//!
//! [`ForceLayout`] is the main-side proxy: it turns contract calls into
//! [`WorkerCommand`]s and applies [`WorkerMessage`]s when ticked. It never
//! blocks on the worker except in [`ForceLayout::wait_until_stopped`] and
//! `dispose`.

mod protocol;
mod simulation;
mod worker;

pub use protocol::{BodyRecord, SpringRecord, WorkerCommand, WorkerMessage};
pub use simulation::{Simulation, SimulationError, StepOutcome};

use std::time::{Duration, Instant};

use log::{debug, error, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use astrolabe_core::{
    geometry::{EPSILON, Vec3},
    graph::{ConstraintParams, ConstraintType, Graph},
    identifier::Id,
};

use worker::WorkerHandle;

use crate::{
    error::LayoutError,
    events::LayoutEvent,
    layout::{Layout, LayoutContext, LayoutOptions},
};

/// Radius of the sphere coincident nodes are scattered over before a run
const JITTER_RADIUS: f32 = 10.0;

/// Physics and pacing settings for [`ForceLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSettings {
    pub repulsion: f32,
    pub spring_length: f32,
    pub spring_stiffness: f32,
    pub gravity: f32,
    pub gravity_center: Vec3,
    pub damping: f32,
    pub time_step: f32,
    pub max_velocity: f32,
    /// Lower bound on pair distance used by the repulsion term
    pub min_distance: f32,
    pub min_energy_threshold: f32,
    /// How long energy must stay under the threshold before auto-stopping
    pub auto_stop_delay_ms: u64,
    /// Worker pacing; 0 runs frames back to back
    pub frame_interval_ms: u64,
    /// Publish positions every n-th step
    pub update_every: u64,
    pub seed: u64,
    /// Step cap per run; 0 is unlimited
    pub max_steps: u64,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            repulsion: 1000.0,
            spring_length: 100.0,
            spring_stiffness: 0.08,
            gravity: 0.01,
            gravity_center: Vec3::ZERO,
            damping: 0.85,
            time_step: 1.0,
            max_velocity: 50.0,
            min_distance: 1.0,
            min_energy_threshold: 0.05,
            auto_stop_delay_ms: 500,
            frame_interval_ms: 16,
            update_every: 1,
            seed: 42,
            max_steps: 0,
        }
    }
}

impl ForceSettings {
    /// Merges recognised options
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("repulsion", &mut self.repulsion);
        options.load("spring_length", &mut self.spring_length);
        options.load("spring_stiffness", &mut self.spring_stiffness);
        options.load("gravity", &mut self.gravity);
        options.load("gravity_center", &mut self.gravity_center);
        options.load("damping", &mut self.damping);
        options.load("time_step", &mut self.time_step);
        options.load("max_velocity", &mut self.max_velocity);
        options.load("min_distance", &mut self.min_distance);
        options.load("min_energy_threshold", &mut self.min_energy_threshold);
        options.load("auto_stop_delay_ms", &mut self.auto_stop_delay_ms);
        options.load("frame_interval_ms", &mut self.frame_interval_ms);
        options.load("update_every", &mut self.update_every);
        options.load("seed", &mut self.seed);
        options.load("max_steps", &mut self.max_steps);
        self.damping = self.damping.clamp(0.0, 1.0);
        self.update_every = self.update_every.max(1);
    }

    /// Rest length and stiffness for an edge.
    ///
    /// Elastic edges use the configured spring, rigid edges stiffen it, and
    /// weld edges pull the endpoints into contact. Explicit parameters override
    /// the type defaults, and the length is kept within `[min, max]`.
    pub fn spring_for(
        &self,
        constraint_type: Option<ConstraintType>,
        params: Option<ConstraintParams>,
        radius_sum: f32,
    ) -> (f32, f32) {
        let (mut length, mut stiffness) = match constraint_type.unwrap_or_default() {
            ConstraintType::Elastic => (self.spring_length, self.spring_stiffness),
            ConstraintType::Rigid => (self.spring_length, 0.5),
            ConstraintType::Weld => (radius_sum, 0.9),
        };
        if let Some(params) = params {
            length = params.ideal_length.unwrap_or(length);
            stiffness = params.stiffness.unwrap_or(stiffness);
            if let Some(min) = params.min_length {
                length = length.max(min);
            }
            if let Some(max) = params.max_length {
                length = length.min(max);
            }
        }
        (length.max(0.0), stiffness)
    }
}

/// Main-side proxy for the force simulation worker.
#[derive(Debug)]
pub struct ForceLayout {
    settings: ForceSettings,
    context: LayoutContext,
    worker: Option<WorkerHandle>,
    running: bool,
    energy: f32,
}

impl Default for ForceLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceLayout {
    pub fn new() -> Self {
        Self {
            settings: ForceSettings::default(),
            context: LayoutContext::default(),
            worker: None,
            running: false,
            energy: 0.0,
        }
    }

    pub fn settings(&self) -> &ForceSettings {
        &self.settings
    }

    /// Energy reported by the most recent worker message
    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Transiently holds a node where it is, without touching its pinned flag
    pub fn fix_node(&mut self, graph: &mut Graph, node: Id) {
        if let Some(record) = graph.node_mut(node) {
            record.is_fixed = true;
        }
        self.node_state_changed(graph, node);
    }

    /// Releases a transient hold
    pub fn release_node(&mut self, graph: &mut Graph, node: Id) {
        if let Some(record) = graph.node_mut(node) {
            record.is_fixed = false;
        }
        self.node_state_changed(graph, node);
    }

    /// Sets the persistent pinned flag
    pub fn set_pin_state(&mut self, graph: &mut Graph, node: Id, pinned: bool) {
        if let Some(record) = graph.node_mut(node) {
            record.is_pinned = pinned;
        }
        self.node_state_changed(graph, node);
    }

    /// Applies every pending worker message in arrival order.
    ///
    /// Returns the number of messages applied.
    pub fn apply_messages(&mut self, graph: &mut Graph) -> usize {
        let mut pending = Vec::new();
        if let Some(worker) = &self.worker {
            while let Ok(message) = worker.messages.try_recv() {
                pending.push(message);
            }
        }
        let count = pending.len();
        for message in pending {
            self.apply(graph, message);
        }
        count
    }

    /// Blocks until the worker reports `Stopped` or `Error`, or `timeout` elapses.
    ///
    /// Position updates received meanwhile are applied. Returns true if the
    /// run ended within the timeout.
    pub fn wait_until_stopped(&mut self, graph: &mut Graph, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = match &self.worker {
                Some(worker) => worker.messages.recv_timeout(remaining),
                None => return !self.running,
            };
            match received {
                Ok(message) => {
                    let terminal = matches!(
                        message,
                        WorkerMessage::Stopped { .. } | WorkerMessage::Error { .. }
                    );
                    self.apply(graph, message);
                    if terminal {
                        return true;
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => return false,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    self.worker_lost();
                    return true;
                }
            }
        }
    }

    fn apply(&mut self, graph: &mut Graph, message: WorkerMessage) {
        match message {
            WorkerMessage::PositionsUpdate { positions, energy } => {
                // Locked nodes are skipped even if the update predates the hold.
                for (id, position) in positions {
                    graph.move_node(id, position);
                }
                self.energy = energy;
            }
            WorkerMessage::Stopped { energy } => {
                self.energy = energy;
                if self.running {
                    self.running = false;
                    debug!(energy; "Force layout settled");
                    self.context.publish(LayoutEvent::Stopped {
                        name: self.name().to_string(),
                    });
                }
            }
            WorkerMessage::Error { error } => {
                error!(error = error.as_str(); "Force layout failed");
                self.running = false;
                self.context.publish(LayoutEvent::Error { error });
            }
        }
    }

    fn worker_lost(&mut self) {
        warn!("Force worker disconnected");
        self.worker = None;
        if self.running {
            self.running = false;
            self.context.publish(LayoutEvent::Error {
                error: "force worker disconnected".to_string(),
            });
        }
    }

    /// Sends a command to a live worker; a missing worker is not an error
    fn dispatch(&mut self, command: WorkerCommand) -> Result<(), LayoutError> {
        let Some(worker) = &self.worker else {
            return Ok(());
        };
        if worker.commands.send(command).is_err() {
            self.worker_lost();
            return Err(LayoutError::Worker("force worker disconnected".to_string()));
        }
        Ok(())
    }

    fn dispatch_logged(&mut self, command: WorkerCommand) {
        if let Err(err) = self.dispatch(command) {
            warn!(err:% = err; "Force command dropped");
        }
    }

    /// Scatters unlocked nodes that share a position with an earlier node
    fn separate_coincident(&self, graph: &mut Graph) {
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut taken: Vec<Vec3> = graph
            .nodes()
            .filter(|node| node.is_locked())
            .map(|node| node.position)
            .collect();
        let free: Vec<Id> = graph
            .nodes()
            .filter(|node| !node.is_locked())
            .map(|node| node.id)
            .collect();

        let mut moved = 0;
        for id in free {
            let Some(position) = graph.node(id).map(|node| node.position) else {
                continue;
            };
            let mut position = position;
            if taken.iter().any(|other| other.distance(position) < EPSILON) {
                let offset = Vec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                )
                .normalize_or_zero();
                let offset = if offset.is_zero() { Vec3::X } else { offset };
                position += offset.scale(JITTER_RADIUS);
                graph.move_node(id, position);
                moved += 1;
            }
            taken.push(position);
        }
        if moved > 0 {
            debug!(moved; "Scattered coincident nodes");
        }
    }
}

impl Layout for ForceLayout {
    fn name(&self) -> &'static str {
        "force"
    }

    fn set_context(&mut self, context: LayoutContext) {
        self.context = context;
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.settings.apply(options);
        self.separate_coincident(graph);

        if self.worker.is_none() {
            self.worker = Some(WorkerHandle::spawn()?);
        }
        debug!(
            node_count = graph.node_count(),
            edge_count = graph.edge_count();
            "Force layout init"
        );
        self.dispatch(WorkerCommand::Init {
            bodies: graph.nodes().map(BodyRecord::from).collect(),
            springs: graph.edges().map(SpringRecord::from).collect(),
            settings: self.settings.clone(),
        })
    }

    fn is_continuous(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn run(&mut self) {
        if self.worker.is_none() {
            warn!("Force layout run before init");
            return;
        }
        if self.dispatch(WorkerCommand::Start).is_ok() {
            self.running = true;
        }
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            self.dispatch_logged(WorkerCommand::Stop);
        }
    }

    fn kick(&mut self, graph: &mut Graph, intensity: f32) -> Result<(), LayoutError> {
        if self.worker.is_none() {
            return self.init(graph, &LayoutOptions::new()).map(|()| self.run());
        }
        self.dispatch(WorkerCommand::Kick { intensity })?;
        self.running = true;
        Ok(())
    }

    fn add_node(&mut self, graph: &Graph, node: Id) {
        if let Some(record) = graph.node(node) {
            self.dispatch_logged(WorkerCommand::AddNode(BodyRecord::from(record)));
        }
    }

    fn remove_node(&mut self, node: Id) {
        self.dispatch_logged(WorkerCommand::RemoveNode(node));
    }

    fn add_edge(&mut self, graph: &Graph, edge: Id) {
        if let Some(record) = graph.edge(edge) {
            self.dispatch_logged(WorkerCommand::AddEdge(SpringRecord::from(record)));
        }
    }

    fn remove_edge(&mut self, edge: Id) {
        self.dispatch_logged(WorkerCommand::RemoveEdge(edge));
    }

    fn node_state_changed(&mut self, graph: &Graph, node: Id) {
        if let Some(record) = graph.node(node) {
            self.dispatch_logged(WorkerCommand::UpdateNodeState {
                node,
                is_fixed: record.is_fixed,
                is_pinned: record.is_pinned,
                position: Some(record.position),
            });
        }
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.settings.apply(options);
        self.dispatch_logged(WorkerCommand::UpdateSettings(self.settings.clone()));
    }

    fn tick(&mut self, graph: &mut Graph, _dt: Duration) {
        self.apply_messages(graph);
    }

    fn dispose(&mut self) {
        self.running = false;
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl Drop for ForceLayout {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use float_cmp::assert_approx_eq;

    use astrolabe_core::graph::{LayoutEdge, LayoutNode};

    use super::*;
    use crate::events::EventLog;

    fn fast_options() -> LayoutOptions {
        LayoutOptions::new()
            .with("frame_interval_ms", 0.0)
            .with("auto_stop_delay_ms", 100.0)
    }

    #[test]
    fn test_spring_defaults_per_constraint_type() {
        let settings = ForceSettings::default();
        assert_eq!(settings.spring_for(None, None, 30.0), (100.0, 0.08));
        assert_eq!(
            settings.spring_for(Some(ConstraintType::Rigid), None, 30.0),
            (100.0, 0.5)
        );
        assert_eq!(
            settings.spring_for(Some(ConstraintType::Weld), None, 30.0),
            (30.0, 0.9)
        );
        let params = ConstraintParams {
            ideal_length: Some(10.0),
            min_length: Some(40.0),
            ..ConstraintParams::default()
        };
        assert_eq!(settings.spring_for(None, Some(params), 0.0), (40.0, 0.08));
    }

    #[test]
    fn test_coincident_nodes_are_scattered() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("c0")).unwrap();
        graph.add_node(LayoutNode::new("c1")).unwrap();
        graph.add_node(LayoutNode::new("c2").pinned(true)).unwrap();

        ForceLayout::new().separate_coincident(&mut graph);

        let c0 = graph.node(Id::new("c0")).unwrap().position;
        let c1 = graph.node(Id::new("c1")).unwrap().position;
        assert!(c0.distance(Vec3::ZERO) > 1.0);
        assert!(c1.distance(c0) > EPSILON);
        assert_eq!(graph.node(Id::new("c2")).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_worker_settles_and_reports_stop() {
        let mut graph = Graph::new();
        graph
            .add_node(LayoutNode::new("w0").with_position(Vec3::new(-30.0, 0.0, 0.0)))
            .unwrap();
        graph
            .add_node(LayoutNode::new("w1").with_position(Vec3::new(30.0, 0.0, 0.0)))
            .unwrap();
        graph.add_edge(LayoutEdge::new("w0", "w1")).unwrap();

        let events = Arc::new(EventLog::new());
        let mut layout = ForceLayout::new();
        layout.set_context(LayoutContext::new(events.clone()));
        layout.init(&mut graph, &fast_options()).unwrap();
        layout.run();
        assert!(layout.is_running());

        assert!(layout.wait_until_stopped(&mut graph, Duration::from_secs(10)));
        assert!(!layout.is_running());
        assert_eq!(events.topics(), vec!["layout:stopped"]);

        let distance = graph
            .node(Id::new("w0"))
            .unwrap()
            .position
            .distance(graph.node(Id::new("w1")).unwrap().position);
        assert!(distance > 60.0);
        layout.dispose();
    }

    #[test]
    fn test_pinned_node_survives_worker_updates() {
        let mut graph = Graph::new();
        graph
            .add_node(
                LayoutNode::new("p0")
                    .with_position(Vec3::new(7.0, 7.0, 7.0))
                    .pinned(true),
            )
            .unwrap();
        graph
            .add_node(LayoutNode::new("p1").with_position(Vec3::new(20.0, 0.0, 0.0)))
            .unwrap();
        graph.add_edge(LayoutEdge::new("p0", "p1")).unwrap();

        let mut layout = ForceLayout::new();
        layout.init(&mut graph, &fast_options()).unwrap();
        layout.run();
        layout.wait_until_stopped(&mut graph, Duration::from_secs(10));

        let pinned = graph.node(Id::new("p0")).unwrap().position;
        assert_approx_eq!(f32, pinned.x(), 7.0);
        assert_approx_eq!(f32, pinned.y(), 7.0);
        assert_approx_eq!(f32, pinned.z(), 7.0);
    }

    #[test]
    fn test_fix_node_sets_transient_flag_only() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("f0")).unwrap();
        let mut layout = ForceLayout::new();
        let id = Id::new("f0");

        layout.fix_node(&mut graph, id);
        assert!(graph.node(id).unwrap().is_fixed);
        assert!(!graph.node(id).unwrap().is_pinned);

        layout.release_node(&mut graph, id);
        assert!(!graph.node(id).unwrap().is_locked());

        layout.set_pin_state(&mut graph, id, true);
        assert!(graph.node(id).unwrap().is_pinned);
    }

    #[test]
    fn test_stale_stop_after_requested_stop_emits_nothing() {
        let mut graph = Graph::new();
        graph.add_node(LayoutNode::new("s0")).unwrap();
        let events = Arc::new(EventLog::new());
        let mut layout = ForceLayout::new();
        layout.set_context(LayoutContext::new(events.clone()));

        layout.running = false;
        layout.apply(&mut graph, WorkerMessage::Stopped { energy: 0.0 });
        assert!(events.events().is_empty());

        layout.apply(
            &mut graph,
            WorkerMessage::PositionsUpdate {
                positions: vec![(Id::new("s0"), Vec3::new(1.0, 2.0, 3.0))],
                energy: 4.0,
            },
        );
        assert_eq!(
            graph.node(Id::new("s0")).unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
        assert_eq!(layout.energy(), 4.0);
    }
}
