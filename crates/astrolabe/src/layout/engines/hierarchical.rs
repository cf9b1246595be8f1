//! Layered tree placement.
//!
//! Edges are read as parent → child links. Each subtree is as wide as the sum
//! of its children's subtrees (and never narrower than `node_separation`), and
//! a parent sits centred above the block of its children, so sibling subtrees
//! cannot overlap. Trees of the forest are laid side by side and the whole
//! forest is centred on `origin`.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    str::FromStr,
};

use indexmap::IndexMap;
use log::{debug, warn};

use astrolabe_core::{geometry::Vec3, graph::Graph, identifier::Id};

use crate::{
    error::LayoutError,
    layout::{FromOption, Layout, LayoutOptions, OptionValue},
};

/// Growth direction of the levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    TopDown,
    BottomUp,
    LeftRight,
    RightLeft,
}

impl Direction {
    /// Maps a lateral offset and a level depth into 3D
    fn place(self, lateral: f32, depth: f32) -> Vec3 {
        match self {
            Direction::TopDown => Vec3::new(lateral, -depth, 0.0),
            Direction::BottomUp => Vec3::new(lateral, depth, 0.0),
            Direction::LeftRight => Vec3::new(depth, -lateral, 0.0),
            Direction::RightLeft => Vec3::new(-depth, -lateral, 0.0),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_down" => Ok(Direction::TopDown),
            "bottom_up" => Ok(Direction::BottomUp),
            "left_right" => Ok(Direction::LeftRight),
            "right_left" => Ok(Direction::RightLeft),
            _ => Err(format!("unknown direction '{s}'")),
        }
    }
}

impl FromOption for Direction {
    fn from_option(value: &OptionValue) -> Option<Self> {
        match value {
            OptionValue::Text(name) => name.parse().ok(),
            _ => None,
        }
    }
}

/// Settings for [`HierarchicalLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalConfig {
    pub level_separation: f32,
    pub node_separation: f32,
    pub direction: Direction,
    pub origin: Vec3,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            level_separation: 150.0,
            node_separation: 100.0,
            direction: Direction::TopDown,
            origin: Vec3::ZERO,
        }
    }
}

impl HierarchicalConfig {
    pub fn apply(&mut self, options: &LayoutOptions) {
        options.load("level_separation", &mut self.level_separation);
        options.load("node_separation", &mut self.node_separation);
        options.load("direction", &mut self.direction);
        options.load("origin", &mut self.origin);
    }
}

/// Spanning forest over a node set.
///
/// A node keeps the first parent that claims it; later claims are logged and
/// ignored. Roots are the unpinned nodes without a parent, or the first
/// unpinned node when every node has one. Nodes no root reaches (cycles) start
/// further trees.
#[derive(Debug, Default)]
pub(crate) struct Forest {
    roots: Vec<Id>,
    children: HashMap<Id, Vec<Id>>,
    /// Depth of every reached node, in breadth-first visit order
    levels: IndexMap<Id, usize>,
}

impl Forest {
    /// Builds the forest of `nodes` (id, pinned) linked by `(parent, child)` pairs
    pub(crate) fn build(nodes: &[(Id, bool)], links: impl IntoIterator<Item = (Id, Id)>) -> Self {
        let members: HashSet<Id> = nodes.iter().map(|(id, _)| *id).collect();
        let mut parents: HashMap<Id, Id> = HashMap::new();
        let mut links_from: HashMap<Id, Vec<Id>> = HashMap::new();

        for (source, target) in links {
            if source == target || !members.contains(&source) || !members.contains(&target) {
                continue;
            }
            if let Some(existing) = parents.get(&target) {
                if *existing != source {
                    warn!(
                        node:% = target,
                        kept:% = existing,
                        ignored:% = source;
                        "Node has more than one parent, keeping the first"
                    );
                }
                continue;
            }
            parents.insert(target, source);
            links_from.entry(source).or_default().push(target);
        }

        let mut roots: Vec<Id> = nodes
            .iter()
            .filter(|(id, pinned)| !pinned && !parents.contains_key(id))
            .map(|(id, _)| *id)
            .collect();
        if roots.is_empty() {
            roots.extend(nodes.iter().find(|(_, pinned)| !pinned).map(|(id, _)| *id));
        }

        let mut forest = Self::default();
        for root in roots {
            forest.visit(root, &links_from);
        }
        for (id, pinned) in nodes {
            if !pinned {
                forest.visit(*id, &links_from);
            }
        }
        forest
    }

    fn visit(&mut self, root: Id, links_from: &HashMap<Id, Vec<Id>>) {
        if self.levels.contains_key(&root) {
            return;
        }
        self.roots.push(root);
        self.levels.insert(root, 0);
        let mut queue = VecDeque::from([(root, 0)]);
        while let Some((id, level)) = queue.pop_front() {
            let Some(targets) = links_from.get(&id) else {
                continue;
            };
            for child in targets {
                if self.levels.contains_key(child) {
                    continue;
                }
                self.levels.insert(*child, level + 1);
                self.children.entry(id).or_default().push(*child);
                queue.push_back((*child, level + 1));
            }
        }
    }

    pub(crate) fn roots(&self) -> &[Id] {
        &self.roots
    }

    pub(crate) fn level(&self, id: Id) -> Option<usize> {
        self.levels.get(&id).copied()
    }

    pub(crate) fn depth(&self) -> usize {
        self.levels.values().copied().max().unwrap_or(0)
    }

    pub(crate) fn children(&self, id: Id) -> &[Id] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Subtree widths, each at least `leaf`
    fn widths(&self, leaf: f32) -> HashMap<Id, f32> {
        let mut widths: HashMap<Id, f32> = HashMap::with_capacity(self.levels.len());
        for id in self.levels.keys().rev() {
            let sum: f32 = self
                .children(*id)
                .iter()
                .map(|child| widths.get(child).copied().unwrap_or(leaf))
                .sum();
            widths.insert(*id, sum.max(leaf));
        }
        widths
    }

    /// Lateral coordinate of every reached node, centred on zero.
    ///
    /// Returns the offsets and the total width of the forest.
    pub(crate) fn lateral_offsets(&self, separation: f32, tree_gap: f32) -> (HashMap<Id, f32>, f32) {
        let widths = self.widths(separation);
        let width_of = |id: &Id| widths.get(id).copied().unwrap_or(separation);
        let total = self.roots.iter().map(width_of).sum::<f32>()
            + tree_gap * self.roots.len().saturating_sub(1) as f32;

        let mut offsets = HashMap::with_capacity(self.levels.len());
        let mut cursor = -total / 2.0;
        for root in &self.roots {
            let mut stack = vec![(*root, cursor)];
            while let Some((id, left)) = stack.pop() {
                let center = left + width_of(&id) / 2.0;
                offsets.insert(id, center);

                let children = self.children(id);
                let block: f32 = children.iter().map(width_of).sum();
                let mut start = center - block / 2.0;
                for child in children {
                    stack.push((*child, start));
                    start += width_of(child);
                }
            }
            cursor += width_of(root) + tree_gap;
        }
        (offsets, total)
    }
}

/// Tree layout over the edges of the graph.
#[derive(Debug, Default)]
pub struct HierarchicalLayout {
    config: HierarchicalConfig,
}

impl HierarchicalLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &HierarchicalConfig {
        &self.config
    }
}

impl Layout for HierarchicalLayout {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn init(&mut self, graph: &mut Graph, options: &LayoutOptions) -> Result<(), LayoutError> {
        self.config.apply(options);

        let nodes: Vec<(Id, bool)> = graph.nodes().map(|node| (node.id, node.is_pinned)).collect();
        let links: Vec<(Id, Id)> = graph.edges().map(|edge| (edge.source, edge.target)).collect();
        let forest = Forest::build(&nodes, links);

        let separation = self.config.node_separation;
        let (offsets, width) = forest.lateral_offsets(separation, separation * 2.0);
        debug!(
            roots = forest.roots().len(),
            depth = forest.depth(),
            width;
            "Hierarchical layout"
        );

        for (id, lateral) in offsets {
            let Some(level) = forest.level(id) else {
                continue;
            };
            let depth = level as f32 * self.config.level_separation;
            let position = self.config.origin + self.config.direction.place(lateral, depth);
            graph.move_node(id, position);
        }
        Ok(())
    }

    fn update_config(&mut self, options: &LayoutOptions) {
        self.config.apply(options);
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use astrolabe_core::graph::{LayoutEdge, LayoutNode};

    use super::*;

    fn tree(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for name in nodes {
            graph
                .add_node(LayoutNode::new(*name).with_position(Vec3::new(9.0, 9.0, 9.0)))
                .unwrap();
        }
        for (source, target) in edges {
            graph.add_edge(LayoutEdge::new(*source, *target)).unwrap();
        }
        graph
    }

    fn position(graph: &Graph, id: &str) -> Vec3 {
        graph.node(Id::new(id)).unwrap().position
    }

    #[test]
    fn test_chain_collapses_to_one_column() {
        let mut graph = tree(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        let mut layout = HierarchicalLayout::new();
        layout
            .init(&mut graph, &LayoutOptions::new().with("level_separation", 150.0))
            .unwrap();

        assert_eq!(position(&graph, "A").y(), 0.0);
        assert_eq!(position(&graph, "B").y(), -150.0);
        assert_eq!(position(&graph, "C").y(), -300.0);
        assert_eq!(position(&graph, "A").x(), position(&graph, "B").x());
        assert_eq!(position(&graph, "B").x(), position(&graph, "C").x());
    }

    #[test]
    fn test_parent_centred_over_children() {
        let mut graph = tree(&["r", "a", "b"], &[("r", "a"), ("r", "b")]);
        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();

        let (r, a, b) = (position(&graph, "r"), position(&graph, "a"), position(&graph, "b"));
        assert_approx_eq!(f32, a.x(), -50.0);
        assert_approx_eq!(f32, b.x(), 50.0);
        assert_approx_eq!(f32, r.x(), 0.0);
    }

    #[test]
    fn test_sibling_subtrees_do_not_overlap() {
        let mut graph = tree(
            &["r", "a", "b", "a1", "a2", "a3", "b1"],
            &[
                ("r", "a"),
                ("r", "b"),
                ("a", "a1"),
                ("a", "a2"),
                ("a", "a3"),
                ("b", "b1"),
            ],
        );
        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();

        let rightmost_a = position(&graph, "a3").x();
        let leftmost_b = position(&graph, "b1").x();
        assert!(leftmost_b - rightmost_a >= 100.0 - 1e-3);
    }

    #[test]
    fn test_first_parent_wins() {
        let mut graph = tree(&["p", "q", "c"], &[("p", "c"), ("q", "c")]);
        let nodes: Vec<(Id, bool)> = graph.nodes().map(|n| (n.id, n.is_pinned)).collect();
        let links: Vec<(Id, Id)> = graph.edges().map(|e| (e.source, e.target)).collect();
        let forest = Forest::build(&nodes, links);

        assert_eq!(forest.children(Id::new("p")), &[Id::new("c")]);
        assert!(forest.children(Id::new("q")).is_empty());

        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();
        assert_eq!(position(&graph, "c").x(), position(&graph, "p").x());
    }

    #[test]
    fn test_cycle_gets_synthetic_root() {
        let mut graph = tree(&["x", "y", "z"], &[("x", "y"), ("y", "z"), ("z", "x")]);
        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();

        assert_eq!(position(&graph, "x").y(), 0.0);
        assert_eq!(position(&graph, "y").y(), -150.0);
        assert_eq!(position(&graph, "z").y(), -300.0);
    }

    #[test]
    fn test_forest_is_centred() {
        let mut graph = tree(&["a", "b"], &[]);
        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();

        // Two leaf trees of width 100 with a gap of 200.
        assert_approx_eq!(f32, position(&graph, "a").x(), -150.0);
        assert_approx_eq!(f32, position(&graph, "b").x(), 150.0);
    }

    #[test]
    fn test_left_right_direction() {
        let mut graph = tree(&["a", "b"], &[("a", "b")]);
        HierarchicalLayout::new()
            .init(
                &mut graph,
                &LayoutOptions::new().with("direction", "left_right"),
            )
            .unwrap();

        assert_eq!(position(&graph, "a").x(), 0.0);
        assert_eq!(position(&graph, "b").x(), 150.0);
        assert_eq!(position(&graph, "a").y(), position(&graph, "b").y());
    }

    #[test]
    fn test_pinned_node_keeps_position() {
        let mut graph = tree(&["a", "b"], &[("a", "b")]);
        graph.node_mut(Id::new("b")).unwrap().is_pinned = true;
        HierarchicalLayout::new()
            .init(&mut graph, &LayoutOptions::new())
            .unwrap();

        assert_eq!(position(&graph, "b"), Vec3::new(9.0, 9.0, 9.0));
        assert_eq!(position(&graph, "a"), Vec3::ZERO);
    }
}
