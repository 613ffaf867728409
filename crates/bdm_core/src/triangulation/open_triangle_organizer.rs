//! `OpenTriangleOrganizer`: tracks the boundary of a cavity carved out of
//! the triangulation (by an insert, move, or remove) as it is re-closed
//! into new tetrahedra.
//!
//! A face is "one-sided" (on the boundary of the cavity, awaiting a new
//! tetrahedron) the first time it is reported; reporting the same face
//! twice means both its tetrahedra were carved out, so it is interior to
//! the cavity and is dropped ("two-sided").

use std::collections::HashMap;

use super::space_node::SpaceNodeId;
use super::triangle::{Triangle3D, TriangleKey};

#[derive(Default)]
pub struct OpenTriangleOrganizer {
    faces: HashMap<TriangleKey, Triangle3D>,
}

impl OpenTriangleOrganizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a cavity-boundary face. Toggles one-sided <-> two-sided.
    pub fn report_face(&mut self, nodes: [SpaceNodeId; 3]) {
        let tri = Triangle3D::new(nodes);
        if self.faces.remove(&tri.key).is_some() {
            // Was one-sided, now reported from its other tetrahedron too:
            // it's interior to the cavity, not part of the boundary.
        } else {
            self.faces.insert(tri.key, tri);
        }
    }

    pub fn one_sided_triangles(&self) -> impl Iterator<Item = Triangle3D> + '_ {
        self.faces.values().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn take_one(&mut self) -> Option<Triangle3D> {
        let key = *self.faces.keys().next()?;
        self.faces.remove(&key)
    }

    pub fn remove_face(&mut self, key: TriangleKey) {
        self.faces.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::arena::Id;

    fn id(i: u32) -> SpaceNodeId {
        Id { index: i, generation: 0 }
    }

    #[test]
    fn face_reported_twice_cancels() {
        let mut org = OpenTriangleOrganizer::new();
        org.report_face([id(1), id(2), id(3)]);
        assert_eq!(org.one_sided_triangles().count(), 1);
        org.report_face([id(3), id(1), id(2)]); // same face, different winding
        assert!(org.is_empty());
    }

    #[test]
    fn distinct_faces_both_remain_open() {
        let mut org = OpenTriangleOrganizer::new();
        org.report_face([id(1), id(2), id(3)]);
        org.report_face([id(1), id(2), id(4)]);
        assert_eq!(org.one_sided_triangles().count(), 2);
    }
}
