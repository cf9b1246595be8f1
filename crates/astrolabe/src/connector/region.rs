//! Named spatial regions that own nodes.

use indexmap::IndexSet;

use astrolabe_core::{
    geometry::{Bounds3, Vec3},
    graph::Graph,
    identifier::Id,
};

use super::routing::Obstacle;

/// An axis-aligned region with its member nodes.
///
/// Connection points (face midpoints and corners) follow the bounds; obstacles
/// follow the member nodes and are refreshed from the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRegion {
    id: String,
    bounds: Bounds3,
    members: IndexSet<Id>,
    obstacles: Vec<Obstacle>,
}

impl LayoutRegion {
    pub fn new(id: impl Into<String>, bounds: Bounds3, members: impl IntoIterator<Item = Id>) -> Self {
        Self {
            id: id.into(),
            bounds,
            members: members.into_iter().collect(),
            obstacles: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bounds(&self) -> Bounds3 {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Bounds3) {
        self.bounds = bounds;
    }

    pub fn members(&self) -> impl Iterator<Item = Id> + '_ {
        self.members.iter().copied()
    }

    pub fn contains_member(&self, node: Id) -> bool {
        self.members.contains(&node)
    }

    pub fn add_member(&mut self, node: Id) -> bool {
        self.members.insert(node)
    }

    pub fn remove_member(&mut self, node: Id) -> bool {
        self.members.shift_remove(&node)
    }

    /// Face midpoints followed by corners
    pub fn connection_points(&self) -> Vec<Vec3> {
        let mut points = self.bounds.face_midpoints().to_vec();
        points.extend(self.bounds.corners());
        points
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Rebuilds the member obstacles from current node positions.
    ///
    /// Members missing from the graph contribute nothing.
    pub(crate) fn refresh(&mut self, graph: &Graph, padding: f32) {
        self.obstacles = self
            .members
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|node| Obstacle {
                node: node.id,
                center: node.position,
                radius: node.bounding_radius() + padding,
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use astrolabe_core::graph::LayoutNode;

    use super::*;

    #[test]
    fn test_connection_points_cover_faces_and_corners() {
        let region = LayoutRegion::new(
            "west",
            Bounds3::from_center(Vec3::ZERO, Vec3::splat(100.0)),
            [],
        );
        let points = region.connection_points();
        assert_eq!(points.len(), 14);
        assert_eq!(points[0], Vec3::new(-50.0, 0.0, 0.0));
        assert!(points.contains(&Vec3::new(50.0, 50.0, 50.0)));
    }

    #[test]
    fn test_refresh_skips_missing_members() {
        let mut graph = Graph::new();
        graph
            .add_node(LayoutNode::new("inside").with_position(Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        let mut region = LayoutRegion::new(
            "west",
            Bounds3::from_center(Vec3::ZERO, Vec3::splat(100.0)),
            [Id::new("inside"), Id::new("ghost")],
        );
        region.refresh(&graph, 10.0);

        assert_eq!(region.obstacles().len(), 1);
        assert_eq!(region.obstacles()[0].center, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(region.obstacles()[0].radius, 30.0);
    }
}
