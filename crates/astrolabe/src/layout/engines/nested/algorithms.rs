//! Child placement inside one container.
//!
//! Every algorithm works in the container's normalized space, where the padded
//! container bounds map to `[-1, 1]` on each axis, so none of them needs to
//! know the container's size or position.

use std::{f32::consts::TAU, fmt, str::FromStr};

use astrolabe_core::{
    geometry::{Axis, EPSILON, Vec3},
    identifier::Id,
};

use super::NestedConfig;
use crate::layout::{FromOption, OptionValue, engines::hierarchical::Forest};

/// One child as seen from inside its container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildSlot {
    pub id: Id,
    /// Current position, normalized
    pub position: Vec3,
    /// Full extent, normalized
    pub size: Vec3,
    pub locked: bool,
}

/// Places the children of one container.
///
/// `links` index into `children`. The returned vector holds one normalized
/// position per child, in the same order.
pub trait NestedAlgorithm: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    fn arrange(&mut self, children: &[ChildSlot], links: &[(usize, usize)], config: &NestedConfig) -> Vec<Vec3>;
}

/// Builds the algorithm registered under `name`
pub fn algorithm(name: &str) -> Option<Box<dyn NestedAlgorithm>> {
    let algorithm: Box<dyn NestedAlgorithm> = match name {
        "grid" => Box::new(GridArrangement),
        "circular" => Box::new(CircularArrangement),
        "force" => Box::new(ForceArrangement),
        "hierarchical" => Box::new(LevelArrangement),
        "flow" => Box::new(FlowArrangement),
        _ => return None,
    };
    Some(algorithm)
}

/// Main axis of the flow arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowDirection {
    #[default]
    Row,
    Column,
}

impl FromStr for FlowDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row" => Ok(FlowDirection::Row),
            "column" => Ok(FlowDirection::Column),
            _ => Err(format!("unknown flow direction '{s}'")),
        }
    }
}

impl FromOption for FlowDirection {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(name) => name.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(super) struct GridArrangement;

impl NestedAlgorithm for GridArrangement {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn arrange(&mut self, children: &[ChildSlot], _links: &[(usize, usize)], _config: &NestedConfig) -> Vec<Vec3> {
        let count = children.len().max(1);
        let columns = (count as f32).sqrt().ceil() as usize;
        let rows = count.div_ceil(columns);
        (0..children.len())
            .map(|index| {
                let (row, column) = (index / columns, index % columns);
                Vec3::new(
                    -1.0 + (2 * column + 1) as f32 / columns as f32,
                    1.0 - (2 * row + 1) as f32 / rows as f32,
                    0.0,
                )
            })
            .collect()
    }
}

#[derive(Debug)]
struct CircularArrangement;

impl NestedAlgorithm for CircularArrangement {
    fn name(&self) -> &'static str {
        "circular"
    }

    fn arrange(&mut self, children: &[ChildSlot], _links: &[(usize, usize)], _config: &NestedConfig) -> Vec<Vec3> {
        let count = children.len();
        if count == 1 {
            return vec![Vec3::ZERO];
        }
        (0..count)
            .map(|index| {
                let angle = TAU * index as f32 / count as f32;
                Vec3::new(angle.cos(), angle.sin(), 0.0).scale(0.8)
            })
            .collect()
    }
}

/// Fruchterman-Reingold relaxation with a linearly cooling step limit.
#[derive(Debug)]
struct ForceArrangement;

impl ForceArrangement {
    const BOUND: f32 = 0.9;
    const INITIAL_TEMPERATURE: f32 = 0.2;
}

impl NestedAlgorithm for ForceArrangement {
    fn name(&self) -> &'static str {
        "force"
    }

    fn arrange(&mut self, children: &[ChildSlot], links: &[(usize, usize)], config: &NestedConfig) -> Vec<Vec3> {
        let count = children.len();
        let bound = Vec3::splat(Self::BOUND);
        let mut positions: Vec<Vec3> = children
            .iter()
            .map(|child| child.position.clamp(-bound, bound))
            .collect();

        for i in 1..count {
            if positions[..i]
                .iter()
                .any(|other| other.distance(positions[i]) < EPSILON)
            {
                let angle = TAU * i as f32 / count as f32;
                positions[i] += Vec3::new(angle.cos(), angle.sin(), 0.0).scale(0.1);
            }
        }

        let ideal = 1.0 / (count.max(1) as f32).sqrt();
        let iterations = config.force_iterations.max(1);
        let mut moves = vec![Vec3::ZERO; count];
        for iteration in 0..iterations {
            moves.iter_mut().for_each(|m| *m = Vec3::ZERO);

            for i in 0..count {
                for j in (i + 1)..count {
                    let delta = positions[i] - positions[j];
                    let distance = delta.length().max(0.01);
                    let push = delta.scale(ideal * ideal / (distance * distance));
                    moves[i] += push;
                    moves[j] -= push;
                }
            }
            for &(a, b) in links {
                if a >= count || b >= count || a == b {
                    continue;
                }
                let delta = positions[a] - positions[b];
                let pull = delta.scale(delta.length() / ideal);
                moves[a] -= pull;
                moves[b] += pull;
            }

            let temperature = Self::INITIAL_TEMPERATURE * (1.0 - iteration as f32 / iterations as f32);
            for (index, child) in children.iter().enumerate() {
                if child.locked {
                    continue;
                }
                let step = moves[index].clamp_length(temperature);
                let next = (positions[index] + step).clamp(-bound, bound);
                if next.is_finite() {
                    positions[index] = next;
                }
            }
        }
        positions
    }
}

/// Level-based tree placement over the links between siblings.
#[derive(Debug)]
struct LevelArrangement;

impl NestedAlgorithm for LevelArrangement {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn arrange(&mut self, children: &[ChildSlot], links: &[(usize, usize)], _config: &NestedConfig) -> Vec<Vec3> {
        let nodes: Vec<(Id, bool)> = children.iter().map(|child| (child.id, false)).collect();
        let pairs = links
            .iter()
            .filter(|(a, b)| *a < children.len() && *b < children.len())
            .map(|&(a, b)| (children[a].id, children[b].id));
        let forest = Forest::build(&nodes, pairs);

        let (offsets, width) = forest.lateral_offsets(1.0, 1.0);
        let depth = forest.depth();
        children
            .iter()
            .map(|child| {
                let lateral = offsets.get(&child.id).copied().unwrap_or(0.0);
                let x = if width > EPSILON {
                    0.9 * lateral / (width / 2.0)
                } else {
                    0.0
                };
                let y = match (forest.level(child.id), depth) {
                    (Some(level), depth) if depth > 0 => 0.9 - 1.8 * level as f32 / depth as f32,
                    _ => 0.0,
                };
                Vec3::new(x, y, 0.0)
            })
            .collect()
    }
}

/// Row or column flow that wraps when the next child would overrun the
/// container.
#[derive(Debug)]
struct FlowArrangement;

impl NestedAlgorithm for FlowArrangement {
    fn name(&self) -> &'static str {
        "flow"
    }

    fn arrange(&mut self, children: &[ChildSlot], _links: &[(usize, usize)], config: &NestedConfig) -> Vec<Vec3> {
        // (axis, start, sign) for the main and the cross direction
        let ((main, main_start, main_sign), (cross, cross_start, cross_sign)) = match config.flow_direction {
            FlowDirection::Row => ((Axis::X, -1.0, 1.0), (Axis::Y, 1.0, -1.0)),
            FlowDirection::Column => ((Axis::Y, 1.0, -1.0), (Axis::X, -1.0, 1.0)),
        };
        let gap = config.flow_gap.clamp(0.0, 0.5);
        let limit = 2.0 - 2.0 * gap;

        let mut used = 0.0_f32;
        let mut line = 0.0_f32;
        let mut lines_used = 0.0_f32;
        children
            .iter()
            .map(|child| {
                let along = child.size.get(main).clamp(0.0, limit);
                let across = child.size.get(cross).max(0.0);
                if used > 0.0 && used + gap + along > limit {
                    lines_used += line + gap;
                    used = 0.0;
                    line = 0.0;
                }
                let lead = if used > 0.0 { used + gap } else { 0.0 };
                let main_center = main_start + main_sign * (gap + lead + along / 2.0);
                let cross_center = cross_start + cross_sign * (gap + lines_used + across / 2.0);
                used = lead + along;
                line = line.max(across);
                Vec3::ZERO.with(main, main_center).with(cross, cross_center)
            })
            .collect()
    }
}
