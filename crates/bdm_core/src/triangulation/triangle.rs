//! `Triangle3D`: an unordered-triple face identity, used by the
//! `OpenTriangleOrganizer` to tell "one-sided" (boundary of a cavity) faces
//! from "two-sided" (interior, shared by two cavity tetrahedra) ones.

use super::space_node::SpaceNodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriangleKey([SpaceNodeId; 3]);

impl TriangleKey {
    pub fn new(mut nodes: [SpaceNodeId; 3]) -> Self {
        nodes.sort();
        Self(nodes)
    }

    pub fn nodes(&self) -> [SpaceNodeId; 3] {
        self.0
    }
}

/// An open triangular face awaiting a fourth node to close it back into a
/// tetrahedron, with the node that the new tetrahedron should *not* be
/// oriented toward (the node of the carved-out cavity on this face's
/// far side, kept so the rebuilt tetrahedron's orientation is consistent
/// with its neighbors).
#[derive(Debug, Clone, Copy)]
pub struct Triangle3D {
    pub key: TriangleKey,
    pub nodes: [SpaceNodeId; 3],
}

impl Triangle3D {
    pub fn new(nodes: [SpaceNodeId; 3]) -> Self {
        Self { key: TriangleKey::new(nodes), nodes }
    }
}
