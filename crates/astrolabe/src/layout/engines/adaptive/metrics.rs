//! Graph-shape metrics that drive layout selection.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};

use astrolabe_core::{geometry::EPSILON, graph::Graph, identifier::Id};

/// Shape summary of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    /// Edges over the maximum possible undirected edge count, in `[0, 1]`
    pub density: f32,
    pub avg_degree: f32,
    /// Edges per unit of bounding volume; zero for flat or empty graphs
    pub connection_density: f32,
    /// How tree-like the graph is, in `[0, 1]`
    pub hierarchy_score: f32,
    /// Average local clustering coefficient
    pub clustering: f32,
    pub bounding_volume: f32,
}

impl GraphMetrics {
    pub fn compute(graph: &Graph) -> Self {
        let node_count = graph.node_count();
        let edge_count = graph.edge_count();
        if node_count == 0 {
            return Self::default();
        }

        let n = node_count as f32;
        let e = edge_count as f32;
        let max_edges = n * (n - 1.0) / 2.0;
        let density = if max_edges > 0.0 {
            (e / max_edges).min(1.0)
        } else {
            0.0
        };
        let bounding_volume = graph.bounds().map_or(0.0, |bounds| bounds.volume());
        let connection_density = if bounding_volume > EPSILON {
            e / bounding_volume
        } else {
            0.0
        };

        Self {
            node_count,
            edge_count,
            density,
            avg_degree: 2.0 * e / n,
            connection_density,
            hierarchy_score: hierarchy_score(graph),
            clustering: clustering(graph),
            bounding_volume,
        }
    }
}

/// Blend of three tree signals:
///
/// - 0.5 × share of nodes with at most one incoming edge
/// - 0.3 × share of edges a spanning tree would keep
/// - 0.2 × share of nodes without outgoing edges
///
/// halved when no node lacks incoming edges.
fn hierarchy_score(graph: &Graph) -> f32 {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    if node_count == 0 || edge_count == 0 {
        return 0.0;
    }

    let mut single_parent = 0usize;
    let mut leaves = 0usize;
    let mut has_root = false;
    for node in graph.nodes() {
        let incoming = graph.incoming_edges(node.id).count();
        single_parent += usize::from(incoming <= 1);
        has_root |= incoming == 0;
        leaves += usize::from(graph.outgoing_edges(node.id).next().is_none());
    }

    let n = node_count as f32;
    let tree_edges = (node_count - 1).min(edge_count) as f32 / edge_count as f32;
    let score = 0.5 * single_parent as f32 / n + 0.3 * tree_edges + 0.2 * leaves as f32 / n;
    if has_root { score } else { score * 0.5 }
}

/// Average local clustering coefficient over every node.
///
/// Nodes with fewer than two distinct neighbours contribute zero.
fn clustering(graph: &Graph) -> f32 {
    let mut undirected: UnGraph<Id, ()> = UnGraph::default();
    let indices: HashMap<Id, NodeIndex> = graph
        .nodes()
        .map(|node| (node.id, undirected.add_node(node.id)))
        .collect();
    for edge in graph.edges() {
        let (Some(&a), Some(&b)) = (indices.get(&edge.source), indices.get(&edge.target)) else {
            continue;
        };
        if a != b && undirected.find_edge(a, b).is_none() {
            undirected.add_edge(a, b, ());
        }
    }

    let total: f32 = undirected
        .node_indices()
        .map(|index| {
            let neighbors: Vec<NodeIndex> = undirected
                .neighbors(index)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let k = neighbors.len();
            if k < 2 {
                return 0.0;
            }
            let mut links = 0usize;
            for (i, a) in neighbors.iter().enumerate() {
                for b in &neighbors[i + 1..] {
                    links += usize::from(undirected.find_edge(*a, *b).is_some());
                }
            }
            links as f32 / (k * (k - 1) / 2) as f32
        })
        .sum();

    total / undirected.node_count().max(1) as f32
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use astrolabe_core::{
        geometry::Vec3,
        graph::{LayoutEdge, LayoutNode},
    };

    use super::*;

    fn graph(nodes: usize, edges: &[(usize, usize)]) -> Graph {
        let mut graph = Graph::new();
        for i in 0..nodes {
            graph
                .add_node(LayoutNode::new(format!("m{i}")).with_position(Vec3::splat(i as f32 * 10.0)))
                .unwrap();
        }
        for (s, t) in edges {
            graph
                .add_edge(LayoutEdge::new(format!("m{s}"), format!("m{t}")))
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_empty_graph_is_all_zero() {
        assert_eq!(GraphMetrics::compute(&Graph::new()), GraphMetrics::default());
    }

    #[test]
    fn test_triangle_density_and_clustering() {
        let metrics = GraphMetrics::compute(&graph(3, &[(0, 1), (1, 2), (2, 0)]));
        assert_approx_eq!(f32, metrics.density, 1.0);
        assert_approx_eq!(f32, metrics.avg_degree, 2.0);
        assert_approx_eq!(f32, metrics.clustering, 1.0);
    }

    #[test]
    fn test_chain_scores_as_hierarchy() {
        let metrics = GraphMetrics::compute(&graph(3, &[(0, 1), (1, 2)]));
        // 0.5 * 1 + 0.3 * 1 + 0.2 * 1/3
        assert_approx_eq!(f32, metrics.hierarchy_score, 0.8 + 0.2 / 3.0, epsilon = 1e-5);
        assert_approx_eq!(f32, metrics.clustering, 0.0);
    }

    #[test]
    fn test_cycle_without_root_is_halved() {
        let metrics = GraphMetrics::compute(&graph(3, &[(0, 1), (1, 2), (2, 0)]));
        // 0.5 * 1 + 0.3 * 2/3 + 0.2 * 0, halved
        assert_approx_eq!(f32, metrics.hierarchy_score, 0.35, epsilon = 1e-5);
    }

    #[test]
    fn test_connection_density_uses_bounds() {
        let metrics = GraphMetrics::compute(&graph(2, &[(0, 1)]));
        assert_approx_eq!(f32, metrics.bounding_volume, 1000.0 * 1.0, epsilon = 1e-3);
        assert_approx_eq!(f32, metrics.connection_density, 1.0 / 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_edgeless_graph_has_no_hierarchy() {
        let metrics = GraphMetrics::compute(&graph(4, &[]));
        assert_eq!(metrics.hierarchy_score, 0.0);
        assert_eq!(metrics.density, 0.0);
    }
}
