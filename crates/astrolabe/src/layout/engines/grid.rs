//! Row-major grid placement, extending into layers along z when both the
//! column and row counts are fixed.

use log::debug;

use astrolabe_core::{geometry::Vec3, graph::Graph};

use crate::{
    error::LayoutError,
    layout::{Layout, LayoutOptions, place_in_slots},
};

/// Settings for [`GridLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Fixed column count; `None` picks `ceil(sqrt(n))`
    pub columns: Option<usize>,
    /// Fixed row count; `None` fits every node in one layer
    pub rows: Option<usize>,
    pub spacing: Vec3,
    pub center: Vec3,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: None,
            rows: None,
            spacing: Vec3::splat(150.0),
            center: Vec3::ZERO,
        }
    }
}

impl GridConfig {
    /// Merges recognised options
    pub fn apply(&mut self, options: &LayoutOptions) {
        if let Some(columns) = options.get_as::<usize>("columns") {
            self.columns = Some(columns.max(1));
        }
        if let Some(rows) = options.get_as::<usize>("rows") {
            self.rows = Some(rows.max(1));
        }
        if let Some(spacing) = options.get_as::<f32>("spacing") {
            self.spacing = Vec3::splat(spacing);
        }
        if let Some(x) = options.get_as::<f32>("spacing_x") {
            self.spacing = self.spacing.with_x(x);
        }
        if let Some(y) = options.get_as::<f32>("spacing_y") {
            self.spacing = self.spacing.with_y(y);
        }
        if let Some(z) = options.get_as::<f32>("spacing_z") {
            self.spacing = self.spacing.with_z(z);
        }
        options.load("center", &mut self.center);
    }

    /// Column, row and layer counts for `count` nodes
    fn dimensions(&self, count: usize) -> (usize, usize, usize) {
        let count = count.max(1);
        let columns = self
            .columns
            .unwrap_or_else(|| (count as f32).sqrt().ceil() as usize)
            .max(1);
        let rows = self.rows.unwrap_or_else(|| count.div_ceil(columns)).max(1);
        let layers = count.div_ceil(columns * rows).max(1);
        (columns, rows, layers)
    }

    /// Position of slot `index` out of `count`
    pub fn slot(&self, index: usize, count: usize) -> Vec3 {
        let (columns, rows, layers) = self.dimensions(count);
        let per_layer = columns * rows;
        let layer = index / per_layer;
        let row = (index % per_layer) / columns;
        let column = index % columns;

        let centered = |i: usize, n: usize| i as f32 - (n as f32 - 1.0) / 2.0;
        self.center
            + Vec3::new(
                centered(column, columns) * self.spacing.x(),
                -centered(row, rows) * self.spacing.y(),
                centered(layer, layers) * self.spacing.z(),
            )
    }
}

/// Places nodes on a regular grid centred on `center`.
#[derive(Debug, Default)]
pub struct GridLayout {
    config: GridConfig,
}

impl GridLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }
}

impl Layout for GridLayout {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);
        let (columns, rows, layers) = self.config.dimensions(graph.node_count());
        debug!(columns, rows, layers, node_count = graph.node_count(); "Grid layout");
        let config = self.config.clone();
        place_in_slots(graph, |index, count| config.slot(index, count));
        Ok(())
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }
}
