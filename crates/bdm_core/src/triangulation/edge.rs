//! `Edge`: a pair of adjacent sites. Carries, for a given tetrahedron, the
//! two "cross-opposite" nodes used to walk around the edge's ring of
//! tetrahedra — the basis of the 2-3/3-2 flip moves.

use super::space_node::SpaceNodeId;
use super::tetrahedron::Tetrahedron;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub a: SpaceNodeId,
    pub b: SpaceNodeId,
}

impl Edge {
    pub fn new(a: SpaceNodeId, b: SpaceNodeId) -> Self {
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    /// The two nodes of `tetra` that are *not* this edge's endpoints — the
    /// "cross-opposite" pair used to step to the next tetrahedron in the
    /// edge's ring.
    pub fn opposite_pair(&self, tetra: &Tetrahedron) -> Option<[SpaceNodeId; 2]> {
        let mut out = [SpaceNodeId::default(); 2];
        let mut k = 0;
        for &n in tetra.nodes.iter() {
            if n != self.a && n != self.b {
                if k == 2 {
                    return None;
                }
                out[k] = n;
                k += 1;
            }
        }
        if k == 2 { Some(out) } else { None }
    }
}

/// All six edges of a tetrahedron, as unordered pairs.
pub fn tetra_edges(tetra: &Tetrahedron) -> [Edge; 6] {
    let n = tetra.nodes;
    [
        Edge::new(n[0], n[1]),
        Edge::new(n[0], n[2]),
        Edge::new(n[0], n[3]),
        Edge::new(n[1], n[2]),
        Edge::new(n[1], n[3]),
        Edge::new(n[2], n[3]),
    ]
}
