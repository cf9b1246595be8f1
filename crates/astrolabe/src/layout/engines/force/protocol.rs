//! Messages exchanged between [`ForceLayout`](super::ForceLayout) and its worker.
//!
//! Both directions are ordered channels. The main side applies worker messages
//! strictly in arrival order, so the latest position update for a node wins,
//! even one that arrives after a `Stop` was sent.

use astrolabe_core::{
    geometry::Vec3,
    graph::{ConstraintParams, ConstraintType, LayoutEdge, LayoutNode},
    identifier::Id,
};

use super::ForceSettings;

/// Node state copied into the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    pub id: Id,
    pub position: Vec3,
    pub mass: f32,
    pub is_fixed: bool,
    pub is_pinned: bool,
    pub radius: f32,
    pub cluster_id: Option<String>,
}

impl From<&LayoutNode> for BodyRecord {
    fn from(node: &LayoutNode) -> Self {
        Self {
            id: node.id,
            position: node.position,
            mass: node.effective_mass(),
            is_fixed: node.is_fixed,
            is_pinned: node.is_pinned,
            radius: node.bounding_radius(),
            cluster_id: node.data.cluster_id.clone(),
        }
    }
}

/// Edge state copied into the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringRecord {
    pub id: Id,
    pub source: Id,
    pub target: Id,
    pub constraint_type: Option<ConstraintType>,
    pub constraint_params: Option<ConstraintParams>,
}

impl From<&LayoutEdge> for SpringRecord {
    fn from(edge: &LayoutEdge) -> Self {
        Self {
            id: edge.id,
            source: edge.source,
            target: edge.target,
            constraint_type: edge.data.constraint_type,
            constraint_params: edge.data.constraint_params,
        }
    }
}

/// Main side → worker.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Init {
        bodies: Vec<BodyRecord>,
        springs: Vec<SpringRecord>,
        settings: ForceSettings,
    },
    Start,
    Stop,
    Kick {
        intensity: f32,
    },
    AddNode(BodyRecord),
    RemoveNode(Id),
    AddEdge(SpringRecord),
    RemoveEdge(Id),
    UpdateNodeState {
        node: Id,
        is_fixed: bool,
        is_pinned: bool,
        position: Option<Vec3>,
    },
    UpdateSettings(ForceSettings),
    /// Ends the worker loop
    Shutdown,
}

/// Worker → main side.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    PositionsUpdate {
        positions: Vec<(Id, Vec3)>,
        energy: f32,
    },
    Stopped {
        energy: f32,
    },
    Error {
        error: String,
    },
}
