//! Ring placement in one of the three coordinate planes.

use std::{f32::consts::TAU, str::FromStr};

use log::debug;

use astrolabe_core::{geometry::Vec3, graph::Graph};

use crate::{
    error::LayoutError,
    layout::{FromOption, Layout, LayoutOptions, OptionValue, place_in_slots},
};

/// Coordinate plane a planar layout draws in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plane {
    #[default]
    Xy,
    Xz,
    Yz,
}

impl Plane {
    /// Maps in-plane coordinates `(u, v)` into 3D
    pub fn point(self, u: f32, v: f32) -> Vec3 {
        match self {
            Plane::Xy => Vec3::new(u, v, 0.0),
            Plane::Xz => Vec3::new(u, 0.0, v),
            Plane::Yz => Vec3::new(0.0, u, v),
        }
    }
}

impl FromStr for Plane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xy" => Ok(Plane::Xy),
            "xz" => Ok(Plane::Xz),
            "yz" => Ok(Plane::Yz),
            _ => Err(format!("unknown plane '{s}'")),
        }
    }
}

impl FromOption for Plane {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(name) => name.parse().ok(),
            _ => None,
        }
    }
}

/// Settings for [`CircularLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct CircularConfig {
    pub radius: f32,
    /// Angle of the first node, in radians
    pub start_angle: f32,
    pub plane: Plane,
    pub center: Vec3,
    pub clockwise: bool,
    /// When positive, the radius grows until neighbours are at least this far apart
    pub min_spacing: f32,
}

impl Default for CircularConfig {
    fn default() -> Self {
        Self {
            radius: 200.0,
            start_angle: 0.0,
            plane: Plane::Xy,
            center: Vec3::ZERO,
            clockwise: false,
            min_spacing: 0.0,
        }
    }
}

impl CircularConfig {
    /// Merges recognised options
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("radius", &mut self.radius);
        options.load("start_angle", &mut self.start_angle);
        options.load("plane", &mut self.plane);
        options.load("center", &mut self.center);
        options.load("clockwise", &mut self.clockwise);
        options.load("min_spacing", &mut self.min_spacing);
    }

    /// Radius used for `count` nodes, honouring `min_spacing`
    pub fn effective_radius(&self, count: usize) -> f32 {
        if self.min_spacing <= 0.0 || count < 2 {
            return self.radius;
        }
        // Chord between neighbours is 2r·sin(π/n).
        let chord_radius = self.min_spacing / (2.0 * (TAU / (2.0 * count as f32)).sin());
        self.radius.max(chord_radius)
    }

    /// Position of slot `index` out of `count`
    pub fn slot(&self, index: usize, count: usize) -> Vec3 {
        let step = TAU / count.max(1) as f32;
        let direction = if self.clockwise { -1.0 } else { 1.0 };
        let angle = self.start_angle + direction * step * index as f32;
        let radius = self.effective_radius(count);
        self.center + self.plane.point(radius * angle.cos(), radius * angle.sin())
    }
}

/// Places nodes evenly on a circle.
#[derive(Debug, Default)]
pub struct CircularLayout {
    config: CircularConfig,
}

impl CircularLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &CircularConfig {
        &self.config
    }
}

impl Layout for CircularLayout {
    fn name(&self) -> &'static str {
        "circular"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        debug!(
            radius = self.config.effective_radius(graph.node_count()),
            node_count = graph.node_count();
            "Circular layout"
        );
        let config = self.config.clone();
        place_in_slots(graph, |index, count| config.slot(index, count));
        Ok(())
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use astrolabe_core::{graph::LayoutNode, identifier::Id};

    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        approx_eq!(f32, a.x(), b.x(), epsilon = 1e-3)
            && approx_eq!(f32, a.y(), b.y(), epsilon = 1e-3)
            && approx_eq!(f32, a.z(), b.z(), epsilon = 1e-3)
    }

    #[test]
    fn test_four_nodes_on_xy_circle() {
        let mut graph = Graph::new();
        for name in ["n0", "n1", "n2", "n3"] {
            graph.add_node(LayoutNode::new(name)).unwrap();
        }
        let mut layout = CircularLayout::new();
        layout
            .init(
                &mut graph,
                &LayoutOptions::new().with("radius", 200.0).with("start_angle", 0.0),
            )
            .unwrap();

        let expected = [
            Vec3::new(200.0, 0.0, 0.0),
            Vec3::new(0.0, 200.0, 0.0),
            Vec3::new(-200.0, 0.0, 0.0),
            Vec3::new(0.0, -200.0, 0.0),
        ];
        for (name, want) in ["n0", "n1", "n2", "n3"].iter().zip(expected) {
            let got = graph.node(Id::new(name)).unwrap().position;
            assert!(close(got, want), "{name}: {got:?} != {want:?}");
        }
    }

    #[test]
    fn test_clockwise_and_plane() {
        let config = CircularConfig {
            clockwise: true,
            plane: Plane::Xz,
            ..CircularConfig::default()
        };
        assert!(close(config.slot(1, 4), Vec3::new(0.0, 0.0, -200.0)));
    }

    #[test]
    fn test_min_spacing_grows_radius() {
        let config = CircularConfig {
            radius: 10.0,
            min_spacing: 100.0,
            ..CircularConfig::default()
        };
        let radius = config.effective_radius(6);
        assert!(approx_eq!(f32, radius, 100.0, epsilon = 1e-3));
        assert!(approx_eq!(
            f32,
            config.slot(0, 6).distance(config.slot(1, 6)),
            100.0,
            epsilon = 1e-2
        ));
    }

    #[test]
    fn test_unknown_plane_is_ignored() {
        let mut config = CircularConfig::default();
        config.apply(&LayoutOptions::new().with("plane", "diagonal"));
        assert_eq!(config.plane, Plane::Xy);
    }
}
