//! Morph transitions between a snapshot of positions and a layout's result.

use std::{str::FromStr, time::Duration};

use indexmap::IndexMap;
use log::trace;
use serde::Deserialize;

use astrolabe_core::{geometry::Vec3, graph::Graph, identifier::Id};

use crate::layout::options::{FromOption, OptionValue};

/// Easing curve applied to transition progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    #[default]
    EaseInOutCubic,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => t * (2.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let f = 2.0 * t - 2.0;
                    0.5 * f * f * f + 1.0
                }
            }
        }
    }
}

impl Easing {
    const ALL: [Easing; 5] = [
        Easing::Linear,
        Easing::EaseInQuad,
        Easing::EaseOutQuad,
        Easing::EaseInOutQuad,
        Easing::EaseInOutCubic,
    ];

    /// Option and config spelling of the curve
    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseInQuad => "ease_in_quad",
            Easing::EaseOutQuad => "ease_out_quad",
            Easing::EaseInOutQuad => "ease_in_out_quad",
            Easing::EaseInOutCubic => "ease_in_out_cubic",
        }
    }
}

impl FromStr for Easing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Easing::ALL
            .into_iter()
            .find(|easing| easing.name() == s)
            .ok_or_else(|| format!("unknown easing '{s}'"))
    }
}

impl FromOption for Easing {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(name) => name.parse().ok(),
            _ => None,
        }
    }
}

/// A running morph from captured positions to layout-assigned targets.
///
/// Creating a transition reads the targets from the graph (where a layout's
/// `init` just wrote them) and rewinds every participating node to its start
/// position. Locked nodes never participate.
#[derive(Debug, Clone)]
pub struct Transition {
    tracks: IndexMap<Id, (Vec3, Vec3)>,
    duration: Duration,
    elapsed: Duration,
    easing: Easing,
}

impl Transition {
    /// Starts a transition from `from` to the positions currently in `graph`.
    ///
    /// A zero duration leaves the targets in place and finishes immediately.
    pub fn start(
        graph: &mut Graph,
        from: &IndexMap<Id, Vec3>,
        duration: Duration,
        easing: Easing,
    ) -> Self {
        let tracks: IndexMap<Id, (Vec3, Vec3)> = graph
            .nodes()
            .filter(|node| !node.is_locked())
            .filter_map(|node| {
                from.get(&node.id)
                    .map(|start| (node.id, (*start, node.position)))
            })
            .filter(|(_, (start, end))| start != end)
            .collect();

        let transition = Self {
            tracks,
            duration,
            elapsed: Duration::ZERO,
            easing,
        };
        if !transition.is_finished() {
            transition.write(graph, 0.0);
        }
        trace!(tracks = transition.tracks.len(), duration:? = duration; "Transition started");
        transition
    }

    /// Advances the clock by `dt` and writes interpolated positions.
    ///
    /// Returns true once the transition has reached its targets.
    pub fn advance(&mut self, graph: &mut Graph, dt: Duration) -> bool {
        self.elapsed = (self.elapsed + dt).min(self.duration);
        self.write(graph, self.easing.apply(self.progress()));
        self.is_finished()
    }

    /// Jumps straight to the targets
    pub fn finish(&mut self, graph: &mut Graph) {
        self.elapsed = self.duration;
        self.write(graph, 1.0);
    }

    /// Linear progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            1.0
        } else {
            self.elapsed.as_secs_f32() / self.duration.as_secs_f32()
        }
    }

    /// True when nothing is left to animate
    pub fn is_finished(&self) -> bool {
        self.tracks.is_empty() || self.elapsed >= self.duration
    }

    /// Target position of a node, if it participates
    pub fn target(&self, id: Id) -> Option<Vec3> {
        self.tracks.get(&id).map(|(_, end)| *end)
    }

    fn write(&self, graph: &mut Graph, eased: f32) {
        for (id, (start, end)) in &self.tracks {
            let position = if eased >= 1.0 {
                *end
            } else {
                start.lerp(*end, eased)
            };
            // Nodes locked mid-transition keep whatever position they were given.
            graph.move_node(*id, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use astrolabe_core::graph::LayoutNode;

    use super::*;

    fn two_nodes() -> Graph {
        let mut graph = Graph::new();
        graph
            .add_node(LayoutNode::new("moving").with_position(Vec3::new(100.0, 0.0, 0.0)))
            .unwrap();
        graph
            .add_node(
                LayoutNode::new("held")
                    .with_position(Vec3::new(5.0, 5.0, 5.0))
                    .pinned(true),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::EaseInQuad,
            Easing::EaseOutQuad,
            Easing::EaseInOutQuad,
            Easing::EaseInOutCubic,
        ] {
            assert_approx_eq!(f32, easing.apply(0.0), 0.0);
            assert_approx_eq!(f32, easing.apply(1.0), 1.0);
        }
        assert_approx_eq!(f32, Easing::EaseInOutCubic.apply(0.5), 0.5);
    }

    #[test]
    fn test_easing_from_str() {
        assert_eq!("ease_out_quad".parse::<Easing>(), Ok(Easing::EaseOutQuad));
        assert!("bouncy".parse::<Easing>().is_err());
    }

    #[test]
    fn test_transition_rewinds_then_reaches_target() {
        let mut graph = two_nodes();
        let from: IndexMap<Id, Vec3> = [(Id::new("moving"), Vec3::ZERO)].into_iter().collect();

        let mut transition =
            Transition::start(&mut graph, &from, Duration::from_millis(100), Easing::Linear);
        let moving = Id::new("moving");
        assert_eq!(graph.node(moving).unwrap().position, Vec3::ZERO);

        assert!(!transition.advance(&mut graph, Duration::from_millis(50)));
        assert_approx_eq!(f32, graph.node(moving).unwrap().position.x(), 50.0, epsilon = 1e-3);

        assert!(transition.advance(&mut graph, Duration::from_millis(80)));
        assert_eq!(graph.node(moving).unwrap().position, Vec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let mut graph = two_nodes();
        let from = [(Id::new("moving"), Vec3::ZERO)].into_iter().collect();
        let transition = Transition::start(&mut graph, &from, Duration::ZERO, Easing::Linear);
        assert!(transition.is_finished());
        assert_eq!(
            graph.node(Id::new("moving")).unwrap().position,
            Vec3::new(100.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_locked_nodes_are_excluded() {
        let mut graph = two_nodes();
        let from = [(Id::new("held"), Vec3::ZERO)].into_iter().collect();
        let transition =
            Transition::start(&mut graph, &from, Duration::from_secs(1), Easing::Linear);
        assert!(transition.target(Id::new("held")).is_none());
        assert_eq!(
            graph.node(Id::new("held")).unwrap().position,
            Vec3::new(5.0, 5.0, 5.0)
        );
    }
}
