//! Fibonacci-sphere placement.

use std::f32::consts::PI;

use log::debug;

use astrolabe_core::{geometry::Vec3, graph::Graph};

use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions, place_in_slots},
};

/// Settings for [`SphericalLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalConfig {
    pub radius: f32,
    pub center: Vec3,
}

impl Default for SphericalConfig {
    fn default() -> Self {
        Self {
            radius: 300.0,
            center: Vec3::ZERO,
        }
    }
}

impl SphericalConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("radius", &mut self.radius);
        options.load("center", &mut self.center);
    }

    /// Position of slot `index` out of `count` on the sphere surface
    pub fn slot(&self, index: usize, count: usize) -> Vec3 {
        let golden_angle = PI * (3.0 - 5.0_f32.sqrt());
        let count = count.max(1) as f32;
        let y = 1.0 - 2.0 * (index as f32 + 0.5) / count;
        let ring = (1.0 - y * y).max(0.0).sqrt();
        let theta = golden_angle * index as f32;
        self.center + Vec3::new(theta.cos() * ring, y, theta.sin() * ring).scale(self.radius)
    }
}

/// Spreads nodes evenly over a sphere.
#[derive(Debug, Default)]
pub struct SphericalLayout {
    config: SphericalConfig,
}

impl SphericalLayout {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layout for SphericalLayout {
    fn name(&self) -> &'static str {
        "spherical"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        debug!(radius = self.config.radius, node_count = graph.node_count(); "Spherical layout");
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

    use super::*;

    #[test]
    fn test_every_slot_lies_on_sphere() {
        let config = SphericalConfig {
            radius: 50.0,
            center: Vec3::new(10.0, 0.0, -10.0),
        };
        for i in 0..25 {
            let distance = config.slot(i, 25).distance(config.center);
            assert!(approx_eq!(f32, distance, 50.0, epsilon = 1e-3));
        }
    }

    #[test]
    fn test_slots_are_distinct() {
        let config = SphericalConfig::default();
        let points: Vec<Vec3> = (0..12).map(|i| config.slot(i, 12)).collect();
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!(a.distance(*b) > 1.0);
            }
        }
    }
}
