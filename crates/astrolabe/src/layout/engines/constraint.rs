//! Iterative constraint relaxation.
//!
//! Each iteration collects correction vectors from every constraint (and from
//! pairwise collisions), clamps them to `max_force`, and moves each unlocked
//! node by `force * damping_factor / mass`. The loop ends once the largest
//! applied correction drops under `convergence_threshold`.

mod kinds;

pub use kinds::{BoundaryShape, ConstraintKind};

use std::{collections::HashMap, time::Duration};

use indexmap::IndexMap;
use log::{debug, trace};

use astrolabe_core::{
    geometry::Vec3,
    graph::{ConstraintType, Graph, LayoutEdge},
    identifier::Id,
};

use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions},
};

/// Settings for [`ConstraintLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintConfig {
    pub iterations: usize,
    pub convergence_threshold: f32,
    pub damping_factor: f32,
    pub max_force: f32,
    pub collisions: bool,
    pub collision_padding: f32,
    pub default_distance: f32,
    pub default_stiffness: f32,
    pub cluster_cohesion: f32,
    pub cluster_separation: f32,
    /// Iterations per `tick` while running continuously
    pub iterations_per_tick: usize,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            convergence_threshold: 0.1,
            damping_factor: 0.5,
            max_force: 50.0,
            collisions: true,
            collision_padding: 5.0,
            default_distance: 100.0,
            default_stiffness: 0.5,
            cluster_cohesion: 0.1,
            cluster_separation: 50.0,
            iterations_per_tick: 5,
        }
    }
}

impl ConstraintConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("iterations", &mut self.iterations);
        options.load("convergence_threshold", &mut self.convergence_threshold);
        options.load("damping_factor", &mut self.damping_factor);
        options.load("max_force", &mut self.max_force);
        options.load("collisions", &mut self.collisions);
        options.load("collision_padding", &mut self.collision_padding);
        options.load("default_distance", &mut self.default_distance);
        options.load("default_stiffness", &mut self.default_stiffness);
        options.load("cluster_cohesion", &mut self.cluster_cohesion);
        options.load("cluster_separation", &mut self.cluster_separation);
        options.load("iterations_per_tick", &mut self.iterations_per_tick);
    }
}

/// A constraint with its identity.
///
/// Derived constraints are regenerated from edges and cluster tags on every
/// `init`; user constraints persist until removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: Id,
    pub kind: ConstraintKind,
    pub derived: bool,
}

/// Constraint-driven layout.
#[derive(Debug, Default)]
pub struct ConstraintLayout {
    config: ConstraintConfig,
    constraints: IndexMap<Id, Constraint>,
    next_id: usize,
    running: bool,
}

impl ConstraintLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &ConstraintConfig {
        &self.config
    }

    /// Iterates constraints in insertion order
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values()
    }

    pub fn constraint(&self, id: Id) -> Option<&Constraint> {
        self.constraints.get(&id)
    }

    /// Registers a user constraint and returns its id
    pub fn add_constraint(&mut self, kind: ConstraintKind) -> Id {
        let id = Id::new(&format!("constraint-{}", self.next_id));
        self.next_id += 1;
        self.constraints.insert(
            id,
            Constraint {
                id,
                kind,
                derived: false,
            },
        );
        id
    }

    /// Keeps `a` and `b` exactly `distance` apart
    pub fn add_distance_constraint(&mut self, a: Id, b: Id, distance: f32) -> Id {
        let stiffness = self.config.default_stiffness;
        self.add_constraint(ConstraintKind::Distance {
            a,
            b,
            target: distance,
            min: 0.0,
            max: f32::INFINITY,
            stiffness,
        })
    }

    /// Pulls `node` to `target`
    pub fn add_position_constraint(&mut self, node: Id, target: Vec3) -> Id {
        let stiffness = self.config.default_stiffness;
        self.add_constraint(ConstraintKind::Position {
            node,
            target,
            tolerance: 1.0,
            stiffness,
        })
    }

    /// Holds the angle `a-vertex-b` at `angle` radians
    pub fn add_angle_constraint(&mut self, a: Id, vertex: Id, b: Id, angle: f32) -> Id {
        let stiffness = self.config.default_stiffness;
        self.add_constraint(ConstraintKind::Angle {
            a,
            vertex,
            b,
            target: angle,
            stiffness,
        })
    }

    /// Groups `members` around their centroid
    pub fn add_cluster_constraint(&mut self, members: Vec<Id>) -> Id {
        let (cohesion, separation) = (self.config.cluster_cohesion, self.config.cluster_separation);
        self.add_constraint(ConstraintKind::Cluster {
            members,
            cohesion,
            separation,
        })
    }

    /// Confines `members` to `shape`
    pub fn add_boundary_constraint(&mut self, members: Vec<Id>, shape: BoundaryShape, padding: f32) -> Id {
        self.add_constraint(ConstraintKind::Boundary {
            members,
            shape,
            padding,
        })
    }

    /// Removes a constraint; returns whether it existed
    pub fn remove_constraint(&mut self, id: Id) -> bool {
        self.constraints.shift_remove(&id).is_some()
    }

    /// Runs up to `config.iterations` iterations; returns how many ran
    pub fn solve(&mut self, graph: &mut Graph) -> usize {
        let iterations = self.config.iterations;
        self.relax(graph, iterations)
    }

    fn relax(&mut self, graph: &mut Graph, iterations: usize) -> usize {
        let mut forces: HashMap<Id, Vec3> = HashMap::new();
        for iteration in 0..iterations {
            forces.clear();
            for constraint in self.constraints.values() {
                constraint.kind.solve(graph, &mut forces);
            }
            if self.config.collisions {
                kinds::solve_collisions(graph, self.config.collision_padding, &mut forces);
            }

            let mut largest = 0.0_f32;
            for (id, force) in &forces {
                let Some(node) = graph.node_mut(*id) else {
                    continue;
                };
                if node.is_locked() {
                    continue;
                }
                let force = force.clamp_length(self.config.max_force);
                let moved = node.position + force.scale(self.config.damping_factor / node.effective_mass());
                if !moved.is_finite() {
                    continue;
                }
                node.position = moved;
                largest = largest.max(force.length());
            }

            trace!(iteration, largest; "Constraint iteration");
            if largest < self.config.convergence_threshold {
                return iteration + 1;
            }
        }
        iterations
    }

    /// Regenerates edge- and cluster-derived constraints
    fn derive_constraints(&mut self, graph: &Graph) {
        self.constraints.retain(|_, constraint| !constraint.derived);

        for edge in graph.edges() {
            if let Some(constraint) = self.derive_edge(graph, edge) {
                self.constraints.insert(constraint.id, constraint);
            }
        }

        let mut groups: IndexMap<&str, Vec<Id>> = IndexMap::new();
        for node in graph.nodes() {
            if let Some(cluster) = node.data.cluster_id.as_deref() {
                groups.entry(cluster).or_default().push(node.id);
            }
        }
        for (cluster, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let id = Id::new(&format!("cluster:{cluster}"));
            self.constraints.insert(
                id,
                Constraint {
                    id,
                    kind: ConstraintKind::Cluster {
                        members,
                        cohesion: self.config.cluster_cohesion,
                        separation: self.config.cluster_separation,
                    },
                    derived: true,
                },
            );
        }
    }

    /// The distance constraint for one edge, keyed by the edge id
    fn derive_edge(&self, graph: &Graph, edge: &LayoutEdge) -> Option<Constraint> {
        if edge.source == edge.target {
            return None;
        }
        let source = graph.node(edge.source)?;
        let target = graph.node(edge.target)?;

        let (mut length, mut stiffness) = match edge.data.constraint_type.unwrap_or_default() {
            ConstraintType::Elastic => (self.config.default_distance, self.config.default_stiffness),
            ConstraintType::Rigid => (self.config.default_distance, 0.9),
            ConstraintType::Weld => (source.bounding_radius() + target.bounding_radius(), 1.0),
        };
        let (mut min, mut max) = (0.0, f32::INFINITY);
        if let Some(params) = edge.data.constraint_params {
            length = params.ideal_length.unwrap_or(length);
            stiffness = params.stiffness.unwrap_or(stiffness);
            min = params.min_length.unwrap_or(min).max(0.0);
            max = params.max_length.unwrap_or(max).max(min);
        }
        Some(Constraint {
            id: edge.id,
            kind: ConstraintKind::Distance {
                a: edge.source,
                b: edge.target,
                target: length,
                min,
                max,
                stiffness,
            },
            derived: true,
        })
    }
}

impl Layout for ConstraintLayout {
    fn name(&self) -> &'static str {
        "constraint"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        self.derive_constraints(graph);
        let used = self.solve(graph);
        debug!(
            constraints = self.constraints.len(),
            iterations = used;
            "Constraint layout solved"
        );
        Ok(())
    }

    fn is_continuous(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn run(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn kick(&mut self, graph: &mut Graph, _intensity: f32) -> Result<(), LayoutError> {
        self.solve(graph);
        Ok(())
    }

    fn add_node(&mut self, graph: &Graph, node: Id) {
        let tagged = graph
            .node(node)
            .is_some_and(|record| record.data.cluster_id.is_some());
        if tagged {
            self.derive_constraints(graph);
        }
    }

    fn remove_node(&mut self, node: Id) {
        self.constraints
            .retain(|_, constraint| constraint.kind.forget(node));
    }

    fn add_edge(&mut self, graph: &Graph, edge: Id) {
        if let Some(constraint) = graph.edge(edge).and_then(|edge| self.derive_edge(graph, edge)) {
            self.constraints.insert(constraint.id, constraint);
        }
    }

    fn remove_edge(&mut self, edge: Id) {
        if self
            .constraints
            .get(&edge)
            .is_some_and(|constraint| constraint.derived)
        {
            self.constraints.shift_remove(&edge);
        }
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }

    fn tick(&mut self, graph: &mut Graph, _dt: Duration) {
        if self.running {
            let iterations = self.config.iterations_per_tick;
            self.relax(graph, iterations);
        }
    }

    fn dispose(&mut self) {
        self.constraints.clear();
        self.running = false;
    }
}
