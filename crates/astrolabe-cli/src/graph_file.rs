//! TOML graph files read and written by the CLI.
//!
//! An input file lists nodes, edges, and optionally regions and the
//! connections to route between them:
//!
//! ```toml
//! [[nodes]]
//! id = "api"
//! position = [0.0, 0.0, 0.0]
//!
//! [[nodes]]
//! id = "db"
//! pinned = true
//!
//! [[edges]]
//! source = "api"
//! target = "db"
//! constraint = "rigid"
//! ideal_length = 120.0
//!
//! [[regions]]
//! id = "backend"
//! members = ["api", "db"]
//! ```
//!
//! The output file holds the chosen mode, every node position, and the routed
//! connection paths.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use astrolabe::{
    connector::{LayoutConnector, LayoutRegion, PathType},
    geometry::{Bounds3, Vec3},
    graph::{ConstraintParams, ConstraintType, Graph, LayoutEdge, LayoutNode},
    identifier::Id,
    manager::LayoutMode,
};

use crate::error::CliError;

/// Padding around member bounds for regions without explicit extent
const REGION_PADDING: f32 = 40.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphFile {
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    edges: Vec<EdgeEntry>,
    #[serde(default)]
    regions: Vec<RegionEntry>,
    #[serde(default)]
    connections: Vec<ConnectionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeEntry {
    id: String,
    position: Option<Vec3>,
    mass: Option<f32>,
    radius: Option<f32>,
    #[serde(default)]
    pinned: bool,
    cluster: Option<String>,
    parent: Option<String>,
    /// Extent of a container node
    container: Option<Vec3>,
    child_layout: Option<String>,
    fit_to_children: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeEntry {
    source: String,
    target: String,
    id: Option<String>,
    relation: Option<String>,
    constraint: Option<String>,
    ideal_length: Option<f32>,
    stiffness: Option<f32>,
    min_length: Option<f32>,
    max_length: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionEntry {
    id: String,
    members: Vec<String>,
    center: Option<Vec3>,
    size: Option<Vec3>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionEntry {
    source: String,
    target: String,
    #[serde(default)]
    path: PathType,
}

impl GraphFile {
    /// Parses a graph file, keeping the source for error reports
    pub fn parse(path: &str, src: &str) -> Result<Self, CliError> {
        toml::from_str(src).map_err(|err| CliError::Input {
            path: path.to_string(),
            src: src.to_string(),
            err,
        })
    }

    /// Builds the layout graph described by the nodes and edges
    pub fn build_graph(&self) -> Result<Graph, CliError> {
        let mut graph = Graph::new();
        for entry in &self.nodes {
            graph.add_node(entry.to_node())?;
        }
        for entry in &self.edges {
            graph.add_edge(entry.to_edge()?)?;
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count();
            "Graph file loaded"
        );
        Ok(graph)
    }

    /// Registers the regions on `connector` and routes the connections.
    ///
    /// Regions without an explicit extent wrap their laid-out members.
    pub fn route(&self, graph: &Graph, connector: &mut LayoutConnector) -> Result<(), CliError> {
        for entry in &self.regions {
            let members: Vec<Id> = entry.members.iter().map(|name| Id::new(name)).collect();
            let bounds = match (entry.center, entry.size) {
                (Some(center), Some(size)) => Bounds3::from_center(center, size),
                _ => Bounds3::from_points(
                    members
                        .iter()
                        .filter_map(|id| graph.node(*id).map(|node| node.position)),
                )
                .ok_or_else(|| {
                    CliError::Invalid(format!("region '{}' has no laid-out members", entry.id))
                })?
                .add_padding(REGION_PADDING),
            };
            connector.add_region(graph, LayoutRegion::new(entry.id.as_str(), bounds, members));
        }

        for entry in &self.connections {
            let (source, target) = (Id::new(&entry.source), Id::new(&entry.target));
            if connector
                .add_connection(graph, source, target, entry.path)
                .is_none()
            {
                warn!(source:% = source, target:% = target; "Connection skipped, endpoint outside every region");
            }
        }
        Ok(())
    }
}

impl NodeEntry {
    fn to_node(&self) -> LayoutNode {
        let mut node = LayoutNode::new(self.id.as_str()).pinned(self.pinned);
        if let Some(position) = self.position {
            node = node.with_position(position);
        }
        if let Some(mass) = self.mass {
            node = node.with_mass(mass);
        }
        if let Some(radius) = self.radius {
            node = node.with_radius(radius);
        }
        if let Some(cluster) = &self.cluster {
            node = node.with_cluster(cluster.as_str());
        }
        if let Some(parent) = &self.parent {
            node = node.with_parent(parent.as_str());
        }
        if let Some(size) = self.container {
            node = node.as_container(size);
        }
        if let Some(layout) = &self.child_layout {
            node = node.with_child_layout(layout.as_str());
        }
        if let Some(fit) = self.fit_to_children {
            node.data.fit_to_children = fit;
        }
        node
    }
}

impl EdgeEntry {
    fn to_edge(&self) -> Result<LayoutEdge, CliError> {
        let mut edge = LayoutEdge::new(self.source.as_str(), self.target.as_str());
        if let Some(id) = &self.id {
            edge = edge.with_id(id.as_str());
        }
        if let Some(relation) = &self.relation {
            edge = edge.with_relation(relation.as_str());
        }
        if let Some(name) = &self.constraint {
            let constraint = ConstraintType::from_name(name).ok_or_else(|| {
                CliError::Invalid(format!("unknown constraint '{name}' on edge {}->{}", self.source, self.target))
            })?;
            edge = edge.with_constraint(constraint);
        }
        let params = ConstraintParams {
            ideal_length: self.ideal_length,
            stiffness: self.stiffness,
            min_length: self.min_length,
            max_length: self.max_length,
        };
        if !params.is_empty() {
            edge = edge.with_params(params);
        }
        Ok(edge)
    }
}

/// Serialized result of a CLI run
#[derive(Debug, Serialize)]
pub struct LayoutOutput {
    mode: &'static str,
    nodes: Vec<NodeOutput>,
    connections: Vec<ConnectionOutput>,
}

#[derive(Debug, Serialize)]
struct NodeOutput {
    id: Id,
    position: Vec3,
}

#[derive(Debug, Serialize)]
struct ConnectionOutput {
    id: Id,
    source: Id,
    target: Id,
    path_type: PathType,
    path: Vec<Vec3>,
}

impl LayoutOutput {
    pub fn new(mode: LayoutMode, graph: &Graph, connector: &LayoutConnector) -> Self {
        Self {
            mode: mode.name(),
            nodes: graph
                .nodes()
                .map(|node| NodeOutput {
                    id: node.id,
                    position: node.position,
                })
                .collect(),
            connections: connector
                .connections()
                .map(|connection| ConnectionOutput {
                    id: connection.id,
                    source: connection.source,
                    target: connection.target,
                    path_type: connection.path_type,
                    path: connection.path.clone(),
                })
                .collect(),
        }
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string(self)?)
    }
}
