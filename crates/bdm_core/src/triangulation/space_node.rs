//! `SpaceNode`: a Delaunay-triangulation vertex carrying a `PhysicalNode`
//! payload.

use super::arena::Id;
use crate::geometry::Vec3;
use hecs::Entity;

pub type SpaceNodeId = Id;
pub type TetraId = Id;

#[derive(Debug, Clone)]
pub struct SpaceNode {
    pub id: SpaceNodeId,
    pub position: Vec3,
    /// The PhysicalNode this site carries. `None` for the bootstrap
    /// super-tetrahedron's corner nodes, which never carry user payload and
    /// are filtered out of every public query.
    pub payload: Option<Entity>,
    pub adjacent_tetrahedra: Vec<TetraId>,
    /// Voronoi-like volume estimate, refreshed whenever the
    /// node's star changes.
    pub volume: f64,
}

impl SpaceNode {
    pub fn new(id: SpaceNodeId, position: Vec3, payload: Option<Entity>) -> Self {
        Self { id, position, payload, adjacent_tetrahedra: Vec::new(), volume: 0.0 }
    }

    pub fn is_super(&self) -> bool {
        self.payload.is_none()
    }
}
