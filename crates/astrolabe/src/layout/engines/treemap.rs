//! Strip treemap: a flat placeholder that sizes cells by node mass.

use log::debug;

use astrolabe_core::{geometry::Vec3, graph::Graph, identifier::Id};

use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions},
};

/// Settings for [`TreemapLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct TreemapConfig {
    pub width: f32,
    pub height: f32,
    pub center: Vec3,
}

impl Default for TreemapConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            center: Vec3::ZERO,
        }
    }
}

impl TreemapConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("width", &mut self.width);
        options.load("height", &mut self.height);
        options.load("center", &mut self.center);
    }

    /// Cell centres for the given weights, in input order.
    ///
    /// Weights are split into `ceil(sqrt(n))` horizontal strips; a strip's
    /// height follows its total weight and each cell's width its own weight.
    pub fn cells(&self, weights: &[f32]) -> Vec<Vec3> {
        if weights.is_empty() {
            return Vec::new();
        }
        let strips = (weights.len() as f32).sqrt().ceil() as usize;
        let per_strip = weights.len().div_ceil(strips);
        if weights.iter().any(|weight| *weight <= 0.0 || !weight.is_finite()) {
            return self.cells(&vec![1.0; weights.len()]);
        }
        let total: f32 = weights.iter().sum();

        let mut centers = Vec::with_capacity(weights.len());
        let mut top = self.height / 2.0;
        for strip in weights.chunks(per_strip) {
            let strip_total: f32 = strip.iter().sum();
            let strip_height = self.height * strip_total / total;
            let mut left = -self.width / 2.0;
            for weight in strip {
                let cell_width = self.width * weight / strip_total;
                centers.push(
                    self.center
                        + Vec3::new(left + cell_width / 2.0, top - strip_height / 2.0, 0.0),
                );
                left += cell_width;
            }
            top -= strip_height;
        }
        centers
    }
}

/// Places nodes at the centres of mass-weighted treemap cells.
#[derive(Debug, Default)]
pub struct TreemapLayout {
    config: TreemapConfig,
}

impl TreemapLayout {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layout for TreemapLayout {
    fn name(&self) -> &'static str {
        "treemap"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        let (ids, weights): (Vec<Id>, Vec<f32>) = graph
            .nodes()
            .map(|node| (node.id, node.effective_mass()))
            .unzip();
        debug!(node_count = ids.len(); "Treemap layout");
        for (id, center) in ids.into_iter().zip(self.config.cells(&weights)) {
            graph.move_node(id, center);
        }
        Ok(())
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }
}
