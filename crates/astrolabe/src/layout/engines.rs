//! Layout engine factory module
//!
//! Every algorithm lives in its own submodule and is created by name through
//! [`EngineBuilder`]. The builder carries per-algorithm default options and
//! the shared [`LayoutContext`], so composite layouts (adaptive, managers)
//! build their parts the same way callers do.

pub mod adaptive;
pub mod circular;
pub mod constraint;
pub mod force;
pub mod grid;
pub mod hierarchical;
pub mod nested;
pub mod radial;
pub mod spherical;
pub mod treemap;

use std::{collections::HashMap, fmt, str::FromStr};

use log::trace;

use crate::{
    config::AppConfig,
    error::LayoutError,
    layout::{Layout, LayoutContext, LayoutOptions},
};

/// The algorithms the builder knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    Grid,
    Circular,
    Spherical,
    Radial,
    Treemap,
    Force,
    Constraint,
    Hierarchical,
    Nested,
    Adaptive,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 10] = [
        LayoutKind::Grid,
        LayoutKind::Circular,
        LayoutKind::Spherical,
        LayoutKind::Radial,
        LayoutKind::Treemap,
        LayoutKind::Force,
        LayoutKind::Constraint,
        LayoutKind::Hierarchical,
        LayoutKind::Nested,
        LayoutKind::Adaptive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::Grid => "grid",
            LayoutKind::Circular => "circular",
            LayoutKind::Spherical => "spherical",
            LayoutKind::Radial => "radial",
            LayoutKind::Treemap => "treemap",
            LayoutKind::Force => "force",
            LayoutKind::Constraint => "constraint",
            LayoutKind::Hierarchical => "hierarchical",
            LayoutKind::Nested => "nested",
            LayoutKind::Adaptive => "adaptive",
        }
    }
}

impl FromStr for LayoutKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| LayoutError::UnknownLayout(s.to_string()))
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builder for creating and configuring layout engines.
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    options: HashMap<LayoutKind, LayoutOptions>,
    context: LayoutContext,
}

impl EngineBuilder {
    /// Create a new engine builder with default options for every engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder carrying the option tables of `config`
    pub fn from_config(config: &AppConfig) -> Self {
        let mut builder = Self::new();
        for (name, options) in config.layout().options() {
            match name.parse::<LayoutKind>() {
                Ok(kind) => builder = builder.with_options(kind, options.clone()),
                Err(_) => trace!(layout = name.as_str(); "Ignoring options for unknown layout"),
            }
        }
        let adaptive = config.adaptive().to_options();
        let merged = adaptive.merged(&builder.options(LayoutKind::Adaptive));
        builder.with_options(LayoutKind::Adaptive, merged)
    }

    /// Set the context handed to every engine built
    pub fn with_context(mut self, context: LayoutContext) -> Self {
        self.context = context;
        self
    }

    /// Set default options for one engine
    pub fn with_options(mut self, kind: LayoutKind, options: LayoutOptions) -> Self {
        self.options.insert(kind, options);
        self
    }

    pub fn context(&self) -> &LayoutContext {
        &self.context
    }

    /// Default options configured for `kind`
    pub fn options(&self, kind: LayoutKind) -> LayoutOptions {
        self.options.get(&kind).cloned().unwrap_or_default()
    }

    /// Build an engine of `kind` with its default options applied
    pub fn build(&self, kind: LayoutKind) -> Box<dyn Layout> {
        let mut layout: Box<dyn Layout> = match kind {
            LayoutKind::Grid => Box::new(grid::GridLayout::new()),
            LayoutKind::Circular => Box::new(circular::CircularLayout::new()),
            LayoutKind::Spherical => Box::new(spherical::SphericalLayout::new()),
            LayoutKind::Radial => Box::new(radial::RadialLayout::new()),
            LayoutKind::Treemap => Box::new(treemap::TreemapLayout::new()),
            LayoutKind::Force => Box::new(force::ForceLayout::new()),
            LayoutKind::Constraint => Box::new(constraint::ConstraintLayout::new()),
            LayoutKind::Hierarchical => Box::new(hierarchical::HierarchicalLayout::new()),
            LayoutKind::Nested => Box::new(nested::NestedLayout::new()),
            LayoutKind::Adaptive => Box::new(adaptive::AdaptiveLayout::with_builder(self.clone())),
        };
        if let Some(options) = self.options.get(&kind) {
            layout.update_config(options);
        }
        layout.set_context(self.context.clone());
        layout
    }

    /// Build an engine by its registered name
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::UnknownLayout` when `name` is not registered.
    pub fn build_named(&self, name: &str) -> Result<Box<dyn Layout>, LayoutError> {
        Ok(self.build(name.parse()?))
    }
}
