//! Concentric ring placement around a central node.

use std::f32::consts::TAU;

use log::debug;

use astrolabe_core::{geometry::Vec3, graph::Graph};

use super::circular::Plane;
use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions, place_in_slots},
};

/// Settings for [`RadialLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct RadialConfig {
    pub ring_spacing: f32,
    /// Ring `k` holds `k * nodes_per_ring` nodes
    pub nodes_per_ring: usize,
    pub center: Vec3,
    pub plane: Plane,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            ring_spacing: 150.0,
            nodes_per_ring: 6,
            center: Vec3::ZERO,
            plane: Plane::Xy,
        }
    }
}

impl RadialConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("ring_spacing", &mut self.ring_spacing);
        if let Some(per_ring) = options.get_as::<usize>("nodes_per_ring") {
            self.nodes_per_ring = per_ring.max(1);
        }
        options.load("center", &mut self.center);
        options.load("plane", &mut self.plane);
    }

    /// Ring number and position within the ring for `index`.
    ///
    /// Returns `(ring, position, ring_population)`; index 0 is ring 0.
    fn ring_of(&self, index: usize, count: usize) -> (usize, usize, usize) {
        if index == 0 {
            return (0, 0, 1);
        }
        let mut ring = 1;
        let mut first = 1;
        loop {
            let capacity = ring * self.nodes_per_ring;
            if index < first + capacity {
                // The outermost ring spreads whatever is left evenly.
                let population = capacity.min(count.saturating_sub(first)).max(1);
                return (ring, index - first, population);
            }
            first += capacity;
            ring += 1;
        }
    }

    /// Position of slot `index` out of `count`
    pub fn slot(&self, index: usize, count: usize) -> Vec3 {
        let (ring, position, population) = self.ring_of(index, count);
        if ring == 0 {
            return self.center;
        }
        let radius = ring as f32 * self.ring_spacing;
        let angle = TAU * position as f32 / population as f32;
        self.center + self.plane.point(radius * angle.cos(), radius * angle.sin())
    }
}

/// Places the first node at the centre and the rest on growing rings.
#[derive(Debug, Default)]
pub struct RadialLayout {
    config: RadialConfig,
}

impl RadialLayout {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layout for RadialLayout {
    fn name(&self) -> &'static str {
        "radial"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        debug!(node_count = graph.node_count(); "Radial layout");
        let config = self.config.clone();
        place_in_slots(graph, |index, count| config.slot(index, count));
        Ok(())
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }
}
