//! Routing of connections between nodes in named regions.
//!
//! The connector never moves nodes. It keeps a set of [`LayoutRegion`]s,
//! resolves each connection endpoint to the region that owns it and computes
//! a polyline for one of four [`PathType`]s. Curved connections whose
//! straight line is blocked by a member node fall back to an A* search over a
//! visibility graph of region connection points and region-pair midpoints,
//! and to a straight line when no such route exists.

mod region;
mod routing;

pub use region::LayoutRegion;
pub use routing::Obstacle;

use std::str::FromStr;

use indexmap::IndexMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use astrolabe_core::{
    geometry::{Axis, Vec3, dominant_axis},
    graph::Graph,
    identifier::Id,
};

use routing::{RoutingGraph, blocked};

/// Routing settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Other connections on a region pair needed before a bundle forms
    pub bundling_threshold: usize,
    /// Bézier control offset as a fraction of the connection length
    pub curvature: f32,
    pub curve_segments: usize,
    /// Added to each member's bounding radius to form its obstacle
    pub obstacle_padding: f32,
    /// Distance of the bundle point from the line between region centres
    pub bundle_offset: f32,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            bundling_threshold: 3,
            curvature: 0.2,
            curve_segments: 16,
            obstacle_padding: 10.0,
            bundle_offset: 40.0,
        }
    }
}

/// Shape of a routed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    #[default]
    Direct,
    Orthogonal,
    Curved,
    Bundled,
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(PathType::Direct),
            "orthogonal" => Ok(PathType::Orthogonal),
            "curved" => Ok(PathType::Curved),
            "bundled" => Ok(PathType::Bundled),
            _ => Err(format!("unknown path type '{s}'")),
        }
    }
}

/// A routed connection between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: Id,
    pub source: Id,
    pub target: Id,
    pub source_region: String,
    pub target_region: String,
    pub path_type: PathType,
    /// Never empty; starts at the source and ends at the target position
    pub path: Vec<Vec3>,
}

impl Connection {
    /// Region pair key, independent of direction
    fn region_pair(&self) -> (&str, &str) {
        ordered_pair(&self.source_region, &self.target_region)
    }
}

fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

fn owned_pair(connection: &Connection) -> (String, String) {
    let (a, b) = connection.region_pair();
    (a.to_string(), b.to_string())
}

/// Region registry and connection router.
#[derive(Debug, Default)]
pub struct LayoutConnector {
    config: ConnectorConfig,
    regions: IndexMap<String, LayoutRegion>,
    connections: IndexMap<Id, Connection>,
    routing: RoutingGraph,
}

impl LayoutConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Registers (or replaces) a region and rebuilds the routing graph
    pub fn add_region(&mut self, graph: &Graph, mut region: LayoutRegion) {
        region.refresh(graph, self.config.obstacle_padding);
        debug!(region = region.id(), members = region.members().count(); "Region registered");
        self.regions.insert(region.id().to_string(), region);
        self.rebuild_routing();
    }

    /// Removes a region together with every connection that touches it
    pub fn remove_region(&mut self, id: &str) -> Option<LayoutRegion> {
        let region = self.regions.shift_remove(id)?;
        self.connections
            .retain(|_, connection| connection.source_region != id && connection.target_region != id);
        self.rebuild_routing();
        Some(region)
    }

    pub fn region(&self, id: &str) -> Option<&LayoutRegion> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &LayoutRegion> {
        self.regions.values()
    }

    /// The first registered region that owns `node`
    pub fn region_of(&self, node: Id) -> Option<&LayoutRegion> {
        self.regions.values().find(|region| region.contains_member(node))
    }

    pub fn connection(&self, id: Id) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Routes a connection from `source` to `target`.
    ///
    /// Returns the connection id (`"<source>-><target>"`), or `None` when an
    /// endpoint is missing from the graph or belongs to no region; nothing is
    /// stored in that case. Re-adding an existing pair replaces it.
    pub fn add_connection(&mut self, graph: &Graph, source: Id, target: Id, path_type: PathType) -> Option<Id> {
        let Some(source_region) = self.region_of(source).map(|region| region.id().to_string()) else {
            debug!(node:% = source; "Connection rejected, source has no region");
            return None;
        };
        let Some(target_region) = self.region_of(target).map(|region| region.id().to_string()) else {
            debug!(node:% = target; "Connection rejected, target has no region");
            return None;
        };

        let id = Id::pair(source, target);
        let mut connection = Connection {
            id,
            source,
            target,
            source_region,
            target_region,
            path_type,
            path: Vec::new(),
        };
        connection.path = self.compute_path(graph, &connection)?;
        let pair = owned_pair(&connection);
        self.connections.insert(id, connection);

        self.reroute_bundle(graph, &pair);
        Some(id)
    }

    /// Removes a connection; bundled paths on its region pair are recomputed
    pub fn remove_connection(&mut self, graph: &Graph, id: Id) -> Option<Connection> {
        let connection = self.connections.shift_remove(&id)?;
        self.reroute_bundle(graph, &owned_pair(&connection));
        Some(connection)
    }

    /// Refreshes every region's obstacles from current node positions
    pub fn update_regions(&mut self, graph: &Graph) {
        let padding = self.config.obstacle_padding;
        for region in self.regions.values_mut() {
            region.refresh(graph, padding);
        }
        self.rebuild_routing();
    }

    /// Recomputes every path; connections whose endpoints vanished are dropped
    pub fn reroute_all(&mut self, graph: &Graph) {
        let ids: Vec<Id> = self.connections.keys().copied().collect();
        for id in ids {
            let Some(connection) = self.connections.get(&id) else {
                continue;
            };
            let resolved = self
                .region_of(connection.source)
                .zip(self.region_of(connection.target))
                .map(|(source, target)| (source.id().to_string(), target.id().to_string()));
            let mut updated = connection.clone();
            let path = resolved.and_then(|(source_region, target_region)| {
                updated.source_region = source_region;
                updated.target_region = target_region;
                self.compute_path(graph, &updated)
            });
            match path {
                Some(path) => {
                    updated.path = path;
                    self.connections.insert(id, updated);
                }
                None => {
                    debug!(connection:% = id; "Dropping connection with unresolved endpoint");
                    self.connections.shift_remove(&id);
                }
            }
        }
    }

    /// Recomputes the bundled connections on a region pair
    fn reroute_bundle(&mut self, graph: &Graph, pair: &(String, String)) {
        let members: Vec<Id> = self
            .connections
            .values()
            .filter(|connection| connection.path_type == PathType::Bundled)
            .filter(|connection| connection.region_pair() == (pair.0.as_str(), pair.1.as_str()))
            .map(|connection| connection.id)
            .collect();
        for member in members {
            let path = self
                .connections
                .get(&member)
                .and_then(|connection| self.compute_path(graph, connection));
            if let (Some(path), Some(connection)) = (path, self.connections.get_mut(&member)) {
                connection.path = path;
            }
        }
    }

    fn rebuild_routing(&mut self) {
        let mut waypoints: Vec<Vec3> = self
            .regions
            .values()
            .flat_map(LayoutRegion::connection_points)
            .collect();
        let centers: Vec<Vec3> = self.regions.values().map(|region| region.bounds().center()).collect();
        for (i, a) in centers.iter().enumerate() {
            for b in &centers[i + 1..] {
                waypoints.push(a.midpoint(*b));
            }
        }
        let obstacles = self.all_obstacles();
        self.routing = RoutingGraph::build(&waypoints, &obstacles);
        trace!(
            waypoints = self.routing.node_count(),
            edges = self.routing.edge_count();
            "Routing graph rebuilt"
        );
    }

    fn all_obstacles(&self) -> Vec<Obstacle> {
        self.regions
            .values()
            .flat_map(|region| region.obstacles().iter().copied())
            .collect()
    }

    fn compute_path(&self, graph: &Graph, connection: &Connection) -> Option<Vec<Vec3>> {
        let from = graph.node(connection.source)?.position;
        let to = graph.node(connection.target)?.position;
        let source_region = self.regions.get(&connection.source_region)?;
        let target_region = self.regions.get(&connection.target_region)?;

        let path = match connection.path_type {
            PathType::Direct => vec![from, to],
            PathType::Orthogonal => orthogonal_path(from, to, source_region, target_region),
            PathType::Curved => self.curved_path(connection, from, to),
            PathType::Bundled => {
                let pair = connection.region_pair();
                let others = self
                    .connections
                    .values()
                    .filter(|other| other.id != connection.id && other.region_pair() == pair)
                    .count();
                if others >= self.config.bundling_threshold {
                    let bundle = self.bundle_point(source_region, target_region);
                    vec![from, bundle, to]
                } else {
                    self.curved_path(connection, from, to)
                }
            }
        };
        Some(path)
    }

    fn curved_path(&self, connection: &Connection, from: Vec3, to: Vec3) -> Vec<Vec3> {
        let obstacles = self.all_obstacles();
        let endpoints = [connection.source, connection.target];
        if !blocked(&obstacles, from, to, &endpoints) {
            return bezier(from, to, self.config.curvature, self.config.curve_segments);
        }
        match self.routing.route(from, to, &obstacles, &endpoints) {
            Some(path) => path,
            None => {
                debug!(connection:% = connection.id; "No clear route, using a straight line");
                vec![from, to]
            }
        }
    }

    /// Shared point a bundle passes through, offset from the centre line
    fn bundle_point(&self, a: &LayoutRegion, b: &LayoutRegion) -> Vec3 {
        let (first, second) = if a.id() <= b.id() { (a, b) } else { (b, a) };
        let (start, end) = (first.bounds().center(), second.bounds().center());
        let side = (end - start).any_perpendicular().normalize_or_zero();
        start.midpoint(end) + side.scale(self.config.bundle_offset)
    }
}

/// Cubic Bézier sampled into `segments` pieces, bowed sideways by `curvature`
fn bezier(from: Vec3, to: Vec3, curvature: f32, segments: usize) -> Vec<Vec3> {
    let delta = to - from;
    let offset = delta
        .any_perpendicular()
        .normalize_or_zero()
        .scale(delta.length() * curvature);
    let c1 = from + delta.scale(1.0 / 3.0) + offset;
    let c2 = from + delta.scale(2.0 / 3.0) + offset;

    let segments = segments.max(1);
    let mut points: Vec<Vec3> = (0..=segments)
        .map(|i| {
            let t = i as f32 / segments as f32;
            let u = 1.0 - t;
            from.scale(u * u * u) + c1.scale(3.0 * u * u * t) + c2.scale(3.0 * u * t * t) + to.scale(t * t * t)
        })
        .collect();
    points[0] = from;
    points[segments] = to;
    points
}

/// Axis-aligned path leaving `source` through the face that points at the
/// target and entering `target` through the face that points back.
fn orthogonal_path(from: Vec3, to: Vec3, source: &LayoutRegion, target: &LayoutRegion) -> Vec<Vec3> {
    let (exit, entry) = if source.id() == target.id() {
        (from, to)
    } else {
        (
            source.bounds().facing_midpoint(to - from),
            target.bounds().facing_midpoint(from - to),
        )
    };

    let axis = dominant_axis(entry - exit);
    let middle = (exit.get(axis) + entry.get(axis)) / 2.0;
    let mut path = vec![from, exit];
    let mut cursor = exit.with(axis, middle);
    path.push(cursor);
    for other in Axis::ALL.into_iter().filter(|other| *other != axis) {
        cursor = cursor.with(other, entry.get(other));
        path.push(cursor);
    }
    path.push(entry);
    path.push(to);
    path.dedup();
    path
}

#[cfg(test)]
mod tests {
    use astrolabe_core::{geometry::Bounds3, graph::LayoutNode};

    use super::*;

    /// Regions `west`, `middle` and `east` along x, each with one node at its centre
    fn corridor() -> (Graph, LayoutConnector) {
        let mut graph = Graph::new();
        let mut connector = LayoutConnector::default();
        for (name, x) in [("west", -300.0), ("middle", 0.0), ("east", 300.0)] {
            let center = Vec3::new(x, 0.0, 0.0);
            let node = format!("{name}-node");
            graph
                .add_node(LayoutNode::new(node.as_str()).with_position(center))
                .unwrap();
            connector.add_region(
                &graph,
                LayoutRegion::new(name, Bounds3::from_center(center, Vec3::splat(100.0)), [Id::new(&node)]),
            );
        }
        (graph, connector)
    }

    fn is_axis_aligned(a: Vec3, b: Vec3) -> bool {
        Axis::ALL.iter().filter(|axis| a.get(**axis) != b.get(**axis)).count() <= 1
    }

    #[test]
    fn test_direct_path_is_the_two_positions() {
        let (graph, mut connector) = corridor();
        let id = connector
            .add_connection(&graph, Id::new("west-node"), Id::new("middle-node"), PathType::Direct)
            .unwrap();

        assert_eq!(id, "west-node->middle-node");
        let connection = connector.connection(id).unwrap();
        assert_eq!(connection.path, vec![Vec3::new(-300.0, 0.0, 0.0), Vec3::ZERO]);
        assert_eq!(connection.source_region, "west");
        assert_eq!(connection.target_region, "middle");
    }

    #[test]
    fn test_unregistered_endpoint_is_rejected() {
        let (mut graph, mut connector) = corridor();
        graph.add_node(LayoutNode::new("drifter")).unwrap();

        let result = connector.add_connection(&graph, Id::new("west-node"), Id::new("drifter"), PathType::Curved);
        assert!(result.is_none());
        assert_eq!(connector.connections().count(), 0);
    }

    #[test]
    fn test_curved_path_bows_when_clear() {
        let (graph, mut connector) = corridor();
        let id = connector
            .add_connection(&graph, Id::new("west-node"), Id::new("middle-node"), PathType::Curved)
            .unwrap();
        let path = &connector.connection(id).unwrap().path;

        assert_eq!(path.len(), 17);
        assert_eq!(path[0], Vec3::new(-300.0, 0.0, 0.0));
        assert_eq!(path[16], Vec3::ZERO);
        assert!(path[8].y().abs() > 1.0 || path[8].z().abs() > 1.0);
    }

    #[test]
    fn test_curved_path_avoids_obstacle() {
        let (graph, mut connector) = corridor();
        let id = connector
            .add_connection(&graph, Id::new("west-node"), Id::new("east-node"), PathType::Curved)
            .unwrap();
        let path = connector.connection(id).unwrap().path.clone();

        assert!(path.len() > 2);
        assert_eq!(path[0], Vec3::new(-300.0, 0.0, 0.0));
        assert_eq!(*path.last().unwrap(), Vec3::new(300.0, 0.0, 0.0));
        let wall = connector.region("middle").unwrap().obstacles()[0];
        for pair in path.windows(2) {
            assert!(!wall.blocks(pair[0], pair[1]));
        }
    }

    #[test]
    fn test_orthogonal_path_is_axis_aligned() {
        let mut graph = Graph::new();
        let mut connector = LayoutConnector::default();
        for (name, center) in [
            ("low", Vec3::new(-300.0, 0.0, 0.0)),
            ("high", Vec3::new(300.0, 100.0, 0.0)),
        ] {
            graph.add_node(LayoutNode::new(name).with_position(center)).unwrap();
            connector.add_region(
                &graph,
                LayoutRegion::new(name, Bounds3::from_center(center, Vec3::splat(200.0)), [Id::new(name)]),
            );
        }
        let id = connector
            .add_connection(&graph, Id::new("low"), Id::new("high"), PathType::Orthogonal)
            .unwrap();
        let path = &connector.connection(id).unwrap().path;

        assert_eq!(path[1], Vec3::new(-200.0, 0.0, 0.0));
        assert_eq!(path[path.len() - 2], Vec3::new(200.0, 100.0, 0.0));
        for pair in path.windows(2) {
            assert!(is_axis_aligned(pair[0], pair[1]), "{pair:?}");
        }
    }

    /// Regions `west` and `east`, each with four stacked nodes
    fn bundle_pair() -> (Graph, LayoutConnector, Vec<Id>, Vec<Id>) {
        let mut graph = Graph::new();
        let mut connector = LayoutConnector::default();
        let mut west = Vec::new();
        let mut east = Vec::new();
        for i in 0..4 {
            let (w, e) = (format!("w{i}"), format!("e{i}"));
            graph
                .add_node(LayoutNode::new(w.as_str()).with_position(Vec3::new(-300.0, i as f32 * 60.0, 0.0)))
                .unwrap();
            graph
                .add_node(LayoutNode::new(e.as_str()).with_position(Vec3::new(300.0, i as f32 * 60.0, 0.0)))
                .unwrap();
            west.push(Id::new(&w));
            east.push(Id::new(&e));
        }
        connector.add_region(
            &graph,
            LayoutRegion::new("west", Bounds3::new(Vec3::new(-400.0, -50.0, -50.0), Vec3::new(-200.0, 250.0, 50.0)), west.clone()),
        );
        connector.add_region(
            &graph,
            LayoutRegion::new("east", Bounds3::new(Vec3::new(200.0, -50.0, -50.0), Vec3::new(400.0, 250.0, 50.0)), east.clone()),
        );
        (graph, connector, west, east)
    }

    #[test]
    fn test_bundle_forms_past_threshold() {
        let (graph, mut connector, west, east) = bundle_pair();
        let ids: Vec<Id> = (0..4)
            .map(|i| {
                connector
                    .add_connection(&graph, west[i], east[i], PathType::Bundled)
                    .unwrap()
            })
            .collect();

        let bundle = connector.connection(ids[0]).unwrap().path[1];
        for id in &ids {
            let path = &connector.connection(*id).unwrap().path;
            assert_eq!(path.len(), 3);
            assert_eq!(path[1], bundle);
        }
    }

    #[test]
    fn test_bundle_dissolves_after_removal() {
        let (graph, mut connector, west, east) = bundle_pair();
        let ids: Vec<Id> = (0..4)
            .map(|i| {
                connector
                    .add_connection(&graph, west[i], east[i], PathType::Bundled)
                    .unwrap()
            })
            .collect();

        let removed = connector.remove_connection(&graph, ids[3]).unwrap();
        assert_eq!(removed.id, ids[3]);
        assert!(connector.remove_connection(&graph, ids[3]).is_none());

        for id in &ids[..3] {
            let connection = connector.connection(*id).unwrap();
            assert_eq!(connection.path.len(), 17, "{id} kept its bundled path");
            assert_eq!(Some(&connection.path), connector.compute_path(&graph, connection).as_ref());
        }
    }

    #[test]
    fn test_unbundled_connection_completes_a_bundle() {
        let (graph, mut connector, west, east) = bundle_pair();
        let ids: Vec<Id> = (0..3)
            .map(|i| {
                connector
                    .add_connection(&graph, west[i], east[i], PathType::Bundled)
                    .unwrap()
            })
            .collect();
        assert_eq!(connector.connection(ids[0]).unwrap().path.len(), 17);

        connector
            .add_connection(&graph, west[3], east[3], PathType::Direct)
            .unwrap();
        for id in &ids {
            assert_eq!(connector.connection(*id).unwrap().path.len(), 3);
        }
    }

    #[test]
    fn test_remove_region_drops_its_connections() {
        let (graph, mut connector) = corridor();
        connector
            .add_connection(&graph, Id::new("west-node"), Id::new("middle-node"), PathType::Direct)
            .unwrap();
        assert!(connector.remove_region("middle").is_some());
        assert_eq!(connector.connections().count(), 0);
        assert!(connector.remove_region("middle").is_none());
    }

    #[test]
    fn test_reroute_follows_moved_nodes() {
        let (mut graph, mut connector) = corridor();
        let id = connector
            .add_connection(&graph, Id::new("west-node"), Id::new("middle-node"), PathType::Direct)
            .unwrap();
        graph.move_node(Id::new("middle-node"), Vec3::new(0.0, 40.0, 0.0));
        connector.update_regions(&graph);
        connector.reroute_all(&graph);

        assert_eq!(connector.connection(id).unwrap().path[1], Vec3::new(0.0, 40.0, 0.0));

        graph.remove_node(Id::new("middle-node"));
        connector.reroute_all(&graph);
        assert!(connector.connection(id).is_none());
    }
}
