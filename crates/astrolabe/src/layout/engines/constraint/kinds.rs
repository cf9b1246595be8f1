//! Constraint kinds and their correction steps.

use std::collections::HashMap;

use astrolabe_core::{
    geometry::{Bounds3, EPSILON, Vec3},
    graph::Graph,
    identifier::Id,
};

/// Region a boundary constraint keeps its members inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryShape {
    Box(Bounds3),
    Sphere { center: Vec3, radius: f32 },
}

/// The relationship a constraint enforces.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// Keeps two nodes `target` apart, clamped to `[min, max]`
    Distance {
        a: Id,
        b: Id,
        target: f32,
        min: f32,
        max: f32,
        stiffness: f32,
    },
    /// Pulls a node toward a fixed point once outside `tolerance`
    Position {
        node: Id,
        target: Vec3,
        tolerance: f32,
        stiffness: f32,
    },
    /// Opens or closes the angle `a-vertex-b` toward `target` radians
    Angle {
        a: Id,
        vertex: Id,
        b: Id,
        target: f32,
        stiffness: f32,
    },
    /// Draws members to their centroid while keeping `separation` between them
    Cluster {
        members: Vec<Id>,
        cohesion: f32,
        separation: f32,
    },
    /// Keeps members inside a box or sphere, shrunk by `padding`
    Boundary {
        members: Vec<Id>,
        shape: BoundaryShape,
        padding: f32,
    },
}

impl ConstraintKind {
    /// Every node id the constraint reads
    pub fn nodes(&self) -> Vec<Id> {
        match self {
            ConstraintKind::Distance { a, b, .. } => vec![*a, *b],
            ConstraintKind::Position { node, .. } => vec![*node],
            ConstraintKind::Angle { a, vertex, b, .. } => vec![*a, *vertex, *b],
            ConstraintKind::Cluster { members, .. } | ConstraintKind::Boundary { members, .. } => {
                members.clone()
            }
        }
    }

    /// Drops `node` from the constraint.
    ///
    /// Returns false when the constraint can no longer hold and must be removed.
    pub fn forget(&mut self, node: Id) -> bool {
        match self {
            ConstraintKind::Cluster { members, .. } => {
                members.retain(|member| *member != node);
                members.len() >= 2
            }
            ConstraintKind::Boundary { members, .. } => {
                members.retain(|member| *member != node);
                !members.is_empty()
            }
            other => !other.nodes().contains(&node),
        }
    }

    /// Adds this constraint's correction vectors to `forces`.
    ///
    /// Missing nodes are skipped. Locked nodes receive no correction; their
    /// share goes to the free side where the kind has one.
    pub fn solve(&self, graph: &Graph, forces: &mut HashMap<Id, Vec3>) {
        match self {
            ConstraintKind::Distance {
                a,
                b,
                target,
                min,
                max,
                stiffness,
            } => solve_distance(graph, forces, (*a, *b), target.clamp(*min, max.max(*min)), *stiffness),
            ConstraintKind::Position {
                node,
                target,
                tolerance,
                stiffness,
            } => {
                let Some(record) = graph.node(*node) else {
                    return;
                };
                let delta = *target - record.position;
                let distance = delta.length();
                if distance > *tolerance && !record.is_locked() {
                    let correction = (delta / distance).scale((distance - tolerance) * stiffness);
                    push(forces, *node, correction);
                }
            }
            ConstraintKind::Angle {
                a,
                vertex,
                b,
                target,
                stiffness,
            } => solve_angle(graph, forces, (*a, *vertex, *b), *target, *stiffness),
            ConstraintKind::Cluster {
                members,
                cohesion,
                separation,
            } => solve_cluster(graph, forces, members, *cohesion, *separation),
            ConstraintKind::Boundary {
                members,
                shape,
                padding,
            } => {
                for member in members {
                    let Some(record) = graph.node(*member) else {
                        continue;
                    };
                    if record.is_locked() {
                        continue;
                    }
                    let p = record.position;
                    let inset = padding + record.bounding_radius();
                    let inside = match shape {
                        BoundaryShape::Box(bounds) => {
                            let inner = bounds.add_padding(-inset);
                            p.clamp(inner.min(), inner.max())
                        }
                        BoundaryShape::Sphere { center, radius } => {
                            let limit = (radius - inset).max(0.0);
                            let offset = p - *center;
                            if offset.length() > limit {
                                *center + offset.normalize_or_zero().scale(limit)
                            } else {
                                p
                            }
                        }
                    };
                    if inside != p {
                        push(forces, *member, inside - p);
                    }
                }
            }
        }
    }
}

fn push(forces: &mut HashMap<Id, Vec3>, node: Id, correction: Vec3) {
    *forces.entry(node).or_insert(Vec3::ZERO) += correction;
}

/// Share of a pair correction each side takes, by inverse mass
fn pair_weights(graph: &Graph, a: Id, b: Id) -> Option<(f32, f32)> {
    let na = graph.node(a)?;
    let nb = graph.node(b)?;
    match (na.is_locked(), nb.is_locked()) {
        (true, true) => None,
        (true, false) => Some((0.0, 1.0)),
        (false, true) => Some((1.0, 0.0)),
        (false, false) => {
            let (ma, mb) = (na.effective_mass(), nb.effective_mass());
            Some((mb / (ma + mb), ma / (ma + mb)))
        }
    }
}

fn solve_distance(
    graph: &Graph,
    forces: &mut HashMap<Id, Vec3>,
    (a, b): (Id, Id),
    desired: f32,
    stiffness: f32,
) {
    let (Some(na), Some(nb)) = (graph.node(a), graph.node(b)) else {
        return;
    };
    let Some((wa, wb)) = pair_weights(graph, a, b) else {
        return;
    };
    let delta = nb.position - na.position;
    let distance = delta.length();
    if distance < EPSILON {
        return;
    }
    let correction = (delta / distance).scale((distance - desired) * stiffness);
    push(forces, a, correction.scale(wa));
    push(forces, b, -correction.scale(wb));
}

fn solve_angle(
    graph: &Graph,
    forces: &mut HashMap<Id, Vec3>,
    (a, vertex, b): (Id, Id, Id),
    target: f32,
    stiffness: f32,
) {
    let (Some(na), Some(nv), Some(nb)) = (graph.node(a), graph.node(vertex), graph.node(b)) else {
        return;
    };
    let arm_a = na.position - nv.position;
    let arm_b = nb.position - nv.position;
    if arm_a.length() < EPSILON || arm_b.length() < EPSILON {
        return;
    }
    let error = target - arm_a.angle_between(arm_b);
    if error.abs() < 1e-3 {
        return;
    }
    let mut axis = arm_a.cross(arm_b);
    if axis.length() < EPSILON {
        axis = arm_a.any_perpendicular();
    }
    // Rotating arm_a by +θ about arm_a × arm_b closes the angle, so each arm
    // turns half the error away from the other.
    let half = error * stiffness / 2.0;
    if !na.is_locked() {
        push(forces, a, arm_a.rotate_about(axis, -half) - arm_a);
    }
    if !nb.is_locked() {
        push(forces, b, arm_b.rotate_about(axis, half) - arm_b);
    }
}

fn solve_cluster(
    graph: &Graph,
    forces: &mut HashMap<Id, Vec3>,
    members: &[Id],
    cohesion: f32,
    separation: f32,
) {
    let present: Vec<(Id, Vec3, bool)> = members
        .iter()
        .filter_map(|id| graph.node(*id).map(|node| (*id, node.position, node.is_locked())))
        .collect();
    if present.len() < 2 {
        return;
    }
    let centroid = present
        .iter()
        .fold(Vec3::ZERO, |sum, (_, position, _)| sum + *position)
        / present.len() as f32;

    for (id, position, locked) in &present {
        if !locked {
            push(forces, *id, (centroid - *position).scale(cohesion));
        }
    }
    for (i, (id_i, p_i, locked_i)) in present.iter().enumerate() {
        for (id_j, p_j, locked_j) in &present[i + 1..] {
            let delta = *p_j - *p_i;
            let distance = delta.length();
            if distance >= separation || distance < EPSILON {
                continue;
            }
            let push_apart = (delta / distance).scale((separation - distance) * 0.5);
            if !locked_i {
                push(forces, *id_i, -push_apart);
            }
            if !locked_j {
                push(forces, *id_j, push_apart);
            }
        }
    }
}

/// Adds pairwise overlap corrections for every pair of unlocked-or-not nodes.
///
/// Overlap beyond `padding` is split by relative mass and pushed apart along
/// the centre line; exactly coincident pairs separate along +x.
pub fn solve_collisions(graph: &Graph, padding: f32, forces: &mut HashMap<Id, Vec3>) {
    let nodes: Vec<_> = graph.nodes().collect();
    for (i, a) in nodes.iter().enumerate() {
        for b in &nodes[i + 1..] {
            let delta = b.position - a.position;
            let distance = delta.length();
            let overlap = a.bounding_radius() + b.bounding_radius() + padding - distance;
            if overlap <= 0.0 {
                continue;
            }
            let Some((wa, wb)) = pair_weights(graph, a.id, b.id) else {
                continue;
            };
            let direction = if distance < EPSILON {
                Vec3::X
            } else {
                delta / distance
            };
            push(forces, a.id, -direction.scale(overlap * wa));
            push(forces, b.id, direction.scale(overlap * wb));
        }
    }
}
