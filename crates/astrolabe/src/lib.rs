//! Astrolabe - interchangeable 3D graph layout algorithms.
//!
//! Layouts assign positions to the nodes of an [`astrolabe_core::graph::Graph`].
//! Primitive layouts (grid, circular, spherical, radial, treemap) place nodes
//! in one pass; force and constraint layouts relax positions over time;
//! hierarchical and nested layouts follow the graph's structure; the adaptive
//! layout picks one of the others from graph metrics and morphs between them.
//! Managers switch layouts with animated transitions, and the connector routes
//! connections between regions of the finished layout.

pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod layout;
pub mod manager;

pub use astrolabe_core::{geometry, graph, identifier};

pub use error::LayoutError;

use std::{thread, time::Duration};

use log::{debug, info};

use astrolabe_core::graph::Graph;

use config::AppConfig;
use connector::LayoutConnector;
use layout::LayoutContext;
use manager::{AdvancedLayoutManager, LayoutMode};

/// Frame length used while settling a layout
const FRAME: Duration = Duration::from_millis(16);

/// What [`LayoutBuilder::layout`] should run.
#[derive(Debug, Clone, Default)]
pub struct LayoutRequest {
    /// Layout name for standard mode; the configured default when `None`
    pub layout: Option<String>,
    /// Forced mode; inferred from the graph when `None`
    pub mode: Option<LayoutMode>,
    /// How long continuous layouts may keep running after the morph
    pub settle: Duration,
}

/// Builder for laying out graphs and routing their connections.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use astrolabe::{LayoutBuilder, LayoutRequest, config::AppConfig};
/// use astrolabe::graph::{Graph, LayoutNode};
///
/// let mut graph = Graph::new();
/// graph.add_node(LayoutNode::new("a")).unwrap();
/// graph.add_node(LayoutNode::new("b")).unwrap();
///
/// let builder = LayoutBuilder::new(AppConfig::default());
/// let request = LayoutRequest {
///     layout: Some("grid".to_string()),
///     ..LayoutRequest::default()
/// };
/// builder.layout(&mut graph, &request).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    config: AppConfig,
    context: LayoutContext,
}

impl LayoutBuilder {
    /// Create a new layout builder with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            context: LayoutContext::default(),
        }
    }

    /// Publish engine events through `context`
    pub fn with_context(mut self, context: LayoutContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Lays out `graph` and returns the mode that ran.
    ///
    /// Blocks until every morph has finished and continuous layouts have run
    /// for `request.settle`; everything is stopped before returning.
    ///
    /// # Errors
    ///
    /// Returns `LayoutError` for unknown layout names and failing layouts.
    pub fn layout(&self, graph: &mut Graph, request: &LayoutRequest) -> Result<LayoutMode, LayoutError> {
        info!(
            node_count = graph.node_count(),
            edge_count = graph.edge_count();
            "Laying out graph"
        );
        let mut manager = AdvancedLayoutManager::new(&self.config, self.context.clone());
        manager.request_mode(request.mode);
        let mode = manager.apply(graph, request.layout.as_deref())?;

        let mut settled = Duration::ZERO;
        let mut frames = 0usize;
        while manager.is_transitioning() || (settled < request.settle && manager.is_running()) {
            manager.tick(graph, FRAME);
            if manager.is_running() {
                thread::sleep(FRAME);
            }
            if !manager.is_transitioning() {
                settled += FRAME;
            }
            frames += 1;
        }
        manager.tick(graph, Duration::ZERO);
        manager.stop(graph);
        manager.dispose();
        debug!(mode = mode.name(), frames; "Layout finished");
        Ok(mode)
    }

    /// Creates a connector carrying the configured routing settings
    pub fn connector(&self) -> LayoutConnector {
        LayoutConnector::new(self.config.connector().clone())
    }
}
