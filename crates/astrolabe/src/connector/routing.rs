//! Visibility graph over region waypoints and A* search across it.

use petgraph::{
    algo::astar,
    graph::{NodeIndex, UnGraph},
};

use astrolabe_core::{
    geometry::{EPSILON, Vec3, segment_intersects_sphere},
    identifier::Id,
};

/// A node's keep-out sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub node: Id,
    pub center: Vec3,
    pub radius: f32,
}

impl Obstacle {
    pub fn blocks(&self, a: Vec3, b: Vec3) -> bool {
        segment_intersects_sphere(a, b, self.center, self.radius)
    }
}

/// True when any obstacle not owned by a node in `ignore` crosses `a`-`b`
pub(crate) fn blocked(obstacles: &[Obstacle], a: Vec3, b: Vec3, ignore: &[Id]) -> bool {
    obstacles
        .iter()
        .any(|obstacle| !ignore.contains(&obstacle.node) && obstacle.blocks(a, b))
}

/// Waypoints joined wherever the straight segment between them is clear.
#[derive(Debug, Clone, Default)]
pub(crate) struct RoutingGraph {
    graph: UnGraph<Vec3, f32>,
}

impl RoutingGraph {
    pub(crate) fn build(waypoints: &[Vec3], obstacles: &[Obstacle]) -> Self {
        let mut graph = UnGraph::with_capacity(waypoints.len(), 0);
        let indices: Vec<NodeIndex> = waypoints.iter().map(|point| graph.add_node(*point)).collect();
        for (i, a) in waypoints.iter().enumerate() {
            for (j, b) in waypoints.iter().enumerate().skip(i + 1) {
                let length = a.distance(*b);
                if length > EPSILON && !blocked(obstacles, *a, *b, &[]) {
                    graph.add_edge(indices[i], indices[j], length);
                }
            }
        }
        Self { graph }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Shortest clear polyline from `from` to `to`, or `None` if none exists.
    ///
    /// Obstacles owned by nodes in `ignore` (normally the two endpoints) do not
    /// block the first and last legs.
    pub(crate) fn route(&self, from: Vec3, to: Vec3, obstacles: &[Obstacle], ignore: &[Id]) -> Option<Vec<Vec3>> {
        let mut graph = self.graph.clone();
        let waypoints: Vec<NodeIndex> = graph.node_indices().collect();
        let start = graph.add_node(from);
        let goal = graph.add_node(to);

        for endpoint in [start, goal] {
            let point = graph[endpoint];
            for waypoint in &waypoints {
                let other = graph[*waypoint];
                if !blocked(obstacles, point, other, ignore) {
                    graph.add_edge(endpoint, *waypoint, point.distance(other));
                }
            }
        }
        if !blocked(obstacles, from, to, ignore) {
            graph.add_edge(start, goal, from.distance(to));
        }

        let (_, nodes) = astar(
            &graph,
            start,
            |node| node == goal,
            |edge| *edge.weight(),
            |node| graph[node].distance(to),
        )?;
        Some(nodes.into_iter().map(|node| graph[node]).collect())
    }
}
