//! `Triangulation`: an incremental 3D Delaunay tetrahedralization,
//! bootstrapped with a super-tetrahedron so every insertion is
//! a normal Bowyer-Watson cavity fill rather than a special case at the
//! convex hull. The super-tetrahedron's four corner nodes carry no payload
//! and are filtered out of every node-facing query.
//!
//! This module only owns geometry (`Arena<SpaceNode>`/`Arena<Tetrahedron>`).
//! It does not call `MovementListener` hooks itself — see `listener.rs` for
//! why — callers (`Ecm`) are expected to wrap `insert`/`move_node`/`remove`
//! with the documented before/after order.

use std::collections::{HashMap, HashSet};

use hecs::Entity;
use rand::seq::SliceRandom;
use rand::Rng;

use super::arena::{Arena, Id};
use super::edge::tetra_edges;
use super::open_triangle_organizer::OpenTriangleOrganizer;
use super::predicates::{circumsphere, in_sphere, is_degenerate_orientation, orientation};
use super::space_node::{SpaceNode, SpaceNodeId, TetraId};
use super::tetrahedron::Tetrahedron;
use super::triangle::TriangleKey;
use crate::error::{SimError, SimResult};
use crate::geometry::Vec3;

/// How far past the points actually inserted the bootstrap super-tetrahedron
/// reaches, as a multiple of the triangulation's characteristic length.
const SUPER_TETRA_SCALE: f64 = 1_000.0;

pub struct Triangulation {
    nodes: Arena<SpaceNode>,
    tetrahedra: Arena<Tetrahedron>,
    super_nodes: [SpaceNodeId; 4],
    characteristic_length: f64,
    next_checking_index: u64,
}

impl Triangulation {
    pub fn new(characteristic_length: f64) -> Self {
        let mut nodes = Arena::new();
        let mut tetrahedra = Arena::new();

        let r = characteristic_length.max(1e-6) * SUPER_TETRA_SCALE;
        let corners = [
            Vec3::new(r, r, r),
            Vec3::new(r, -r, -r),
            Vec3::new(-r, r, -r),
            Vec3::new(-r, -r, r),
        ];
        let mut super_nodes = [SpaceNodeId::default(); 4];
        for (i, &c) in corners.iter().enumerate() {
            let id = nodes.insert(SpaceNode::new(SpaceNodeId::default(), c, None));
            if let Some(n) = nodes.get_mut(id) {
                n.id = id;
            }
            super_nodes[i] = id;
        }
        let mut ordered = super_nodes;
        if orientation(corners[0], corners[1], corners[2], corners[3]) < 0.0 {
            ordered.swap(0, 1);
        }
        let positions4 = [
            nodes.get(ordered[0]).unwrap().position,
            nodes.get(ordered[1]).unwrap().position,
            nodes.get(ordered[2]).unwrap().position,
            nodes.get(ordered[3]).unwrap().position,
        ];
        let (circumcenter, circumradius_sq) =
            circumsphere(positions4[0], positions4[1], positions4[2], positions4[3])
                .unwrap_or((Vec3::ZERO, f64::INFINITY));
        let tetra_id = tetrahedra.insert(Tetrahedron {
            id: TetraId::default(),
            nodes: ordered,
            neighbors: [None; 4],
            circumcenter,
            circumradius_sq,
            checking_index: 0,
        });
        if let Some(t) = tetrahedra.get_mut(tetra_id) {
            t.id = tetra_id;
        }
        for &n in ordered.iter() {
            if let Some(node) = nodes.get_mut(n) {
                node.adjacent_tetrahedra.push(tetra_id);
            }
        }

        Self { nodes, tetrahedra, super_nodes, characteristic_length, next_checking_index: 1 }
    }

    pub fn characteristic_length(&self) -> f64 {
        self.characteristic_length
    }

    pub fn node(&self, id: SpaceNodeId) -> Option<&SpaceNode> {
        self.nodes.get(id)
    }

    fn is_real(&self, id: SpaceNodeId) -> bool {
        self.nodes.get(id).map(|n| !n.is_super()).unwrap_or(false)
    }

    /// Every real (non-bootstrap) node currently adjacent to `id` through
    /// shared tetrahedra, i.e. its 1-ring in the triangulation's graph.
    pub fn neighbors(&self, id: SpaceNodeId) -> Option<Vec<SpaceNodeId>> {
        let node = self.nodes.get(id)?;
        let mut out: Vec<SpaceNodeId> = Vec::new();
        for &tid in &node.adjacent_tetrahedra {
            let Some(t) = self.tetrahedra.get(tid) else { continue };
            for &n in &t.nodes {
                if n != id && self.is_real(n) && !out.contains(&n) {
                    out.push(n);
                }
            }
        }
        Some(out)
    }

    pub fn payload_of(&self, id: SpaceNodeId) -> Option<Entity> {
        self.nodes.get(id).and_then(|n| n.payload)
    }

    fn positions4(&self, nodes: [SpaceNodeId; 4]) -> SimResult<[Vec3; 4]> {
        let mut out = [Vec3::ZERO; 4];
        for i in 0..4 {
            out[i] = self
                .nodes
                .get(nodes[i])
                .ok_or(SimError::InvariantViolation("dangling space node id".into()))?
                .position;
        }
        Ok(out)
    }

    fn positions3(&self, nodes: [SpaceNodeId; 3]) -> SimResult<[Vec3; 3]> {
        let mut out = [Vec3::ZERO; 3];
        for i in 0..3 {
            out[i] = self
                .nodes
                .get(nodes[i])
                .ok_or(SimError::InvariantViolation("dangling space node id".into()))?
                .position;
        }
        Ok(out)
    }

    fn any_tetra(&self) -> Option<TetraId> {
        self.tetrahedra.iter().next().map(|(id, _)| id)
    }

    /// Stochastic visibility walk: from an arbitrary starting
    /// tetrahedron, repeatedly cross into the neighbor opposite whichever
    /// face (examined in random order, to avoid walk cycles on degenerate
    /// inputs) `p` lies on the far side of, until no face disagrees.
    fn locate(&self, p: Vec3, rng: &mut impl Rng) -> SimResult<TetraId> {
        let mut current = self
            .any_tetra()
            .ok_or(SimError::InvariantViolation("triangulation is empty".into()))?;
        let mut order = [0usize, 1, 2, 3];
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 100_000 {
                return Err(SimError::InvariantViolation("point location did not converge".into()));
            }
            let t = self.tetrahedra.get(current).ok_or(SimError::InvariantViolation(
                "point location stepped onto a freed tetrahedron".into(),
            ))?;
            let positions = self.positions4(t.nodes)?;
            order.shuffle(rng);
            let mut moved = false;
            for &i in order.iter() {
                let face = t.face_opposite(i);
                let face_pos = self.positions3(face)?;
                let inside_sign = orientation(face_pos[0], face_pos[1], face_pos[2], positions[i]);
                let point_sign = orientation(face_pos[0], face_pos[1], face_pos[2], p);
                if point_sign.abs() > 1e-12 && inside_sign.signum() != point_sign.signum() {
                    if let Some(next) = t.neighbors[i] {
                        current = next;
                        moved = true;
                        break;
                    }
                }
            }
            if !moved {
                return Ok(current);
            }
        }
    }

    /// Flood-fill the set of tetrahedra whose circumsphere strictly
    /// contains `p`, starting from `seed` (Bowyer-Watson's "bad" set).
    fn bad_tetrahedra(&self, seed: TetraId, p: Vec3) -> SimResult<HashSet<TetraId>> {
        let mut bad = HashSet::new();
        let mut stack = vec![seed];
        while let Some(id) = stack.pop() {
            if bad.contains(&id) {
                continue;
            }
            let Some(t) = self.tetrahedra.get(id) else { continue };
            let positions = self.positions4(t.nodes)?;
            if in_sphere(positions[0], positions[1], positions[2], positions[3], p) <= 0.0 {
                continue;
            }
            bad.insert(id);
            for n in t.neighbors.iter().flatten() {
                stack.push(*n);
            }
        }
        Ok(bad)
    }

    /// The faces on the boundary of `bad` (i.e. shared with a tetrahedron
    /// outside the set, or the outer void), paired with that outside
    /// neighbor so it can be rewired once the cavity is rebuilt.
    fn cavity_boundary(&self, bad: &HashSet<TetraId>) -> (OpenTriangleOrganizer, HashMap<TriangleKey, Option<TetraId>>) {
        let mut organizer = OpenTriangleOrganizer::new();
        let mut outside_of = HashMap::new();
        for &id in bad {
            let Some(t) = self.tetrahedra.get(id) else { continue };
            for i in 0..4 {
                let neighbor = t.neighbors[i];
                let neighbor_is_bad = neighbor.map(|n| bad.contains(&n)).unwrap_or(false);
                if !neighbor_is_bad {
                    let face = t.face_opposite(i);
                    organizer.report_face(face);
                    outside_of.insert(TriangleKey::new(face), neighbor);
                }
            }
        }
        (organizer, outside_of)
    }

    fn remove_tetrahedra(&mut self, ids: &HashSet<TetraId>) {
        for &id in ids {
            if let Some(t) = self.tetrahedra.remove(id) {
                for n in t.nodes {
                    if let Some(node) = self.nodes.get_mut(n) {
                        node.adjacent_tetrahedra.retain(|&x| x != id);
                    }
                }
            }
        }
    }

    fn push_tetra(&mut self, mut nodes4: [SpaceNodeId; 4]) -> SimResult<TetraId> {
        let positions = self.positions4(nodes4)?;
        if orientation(positions[0], positions[1], positions[2], positions[3]) < 0.0 {
            nodes4.swap(0, 1);
        }
        let positions = self.positions4(nodes4)?;
        let (circumcenter, circumradius_sq) =
            circumsphere(positions[0], positions[1], positions[2], positions[3])
                .unwrap_or((Vec3::ZERO, f64::INFINITY));
        self.next_checking_index += 1;
        let id = self.tetrahedra.insert(Tetrahedron {
            id: TetraId::default(),
            nodes: nodes4,
            neighbors: [None; 4],
            circumcenter,
            circumradius_sq,
            checking_index: self.next_checking_index,
        });
        if let Some(t) = self.tetrahedra.get_mut(id) {
            t.id = id;
        }
        for &n in nodes4.iter() {
            if let Some(node) = self.nodes.get_mut(n) {
                node.adjacent_tetrahedra.push(id);
            }
        }
        Ok(id)
    }

    fn face_local_index(&self, tetra: TetraId, face: [SpaceNodeId; 3]) -> Option<usize> {
        let t = self.tetrahedra.get(tetra)?;
        let mut wanted = face;
        wanted.sort();
        (0..4).find(|&i| {
            let mut f = t.face_opposite(i);
            f.sort();
            f == wanted
        })
    }

    fn link_mutual(&mut self, a: TetraId, face: [SpaceNodeId; 3], b: Option<TetraId>) {
        if let Some(local) = self.face_local_index(a, face) {
            if let Some(t) = self.tetrahedra.get_mut(a) {
                t.neighbors[local] = b;
            }
        }
        if let Some(b_id) = b {
            if let Some(local) = self.face_local_index(b_id, face) {
                if let Some(t) = self.tetrahedra.get_mut(b_id) {
                    t.neighbors[local] = Some(a);
                }
            }
        }
    }

    /// Close a cavity whose boundary is tracked by `boundary`. `pick_apex`
    /// chooses, for each open face, the node the new tetrahedron over that
    /// face should be built on; `outside_of` supplies the tetrahedron (if
    /// any) beyond each *original* boundary face, so it can be reattached.
    fn close_cavity(
        &mut self,
        mut boundary: OpenTriangleOrganizer,
        outside_of: &HashMap<TriangleKey, Option<TetraId>>,
        mut pick_apex: impl FnMut(&Self, [SpaceNodeId; 3]) -> SimResult<SpaceNodeId>,
    ) -> SimResult<Vec<TetraId>> {
        let mut created = Vec::new();
        let mut side_faces: HashMap<TriangleKey, ([SpaceNodeId; 3], TetraId)> = HashMap::new();
        let mut guard = 0usize;

        while let Some(tri) = boundary.take_one() {
            guard += 1;
            if guard > 200_000 {
                return Err(SimError::InvariantViolation("cavity failed to close".into()));
            }
            let apex = pick_apex(self, tri.nodes)?;
            let tetra_id = self.push_tetra([tri.nodes[0], tri.nodes[1], tri.nodes[2], apex])?;
            created.push(tetra_id);

            if let Some(&outside) = outside_of.get(&tri.key) {
                self.link_mutual(tetra_id, tri.nodes, outside);
            }

            for i in 0..3 {
                let side = [apex, tri.nodes[i], tri.nodes[(i + 1) % 3]];
                let key = TriangleKey::new(side);
                if let Some((other_face, other_id)) = side_faces.remove(&key) {
                    self.link_mutual(tetra_id, other_face, Some(other_id));
                } else {
                    side_faces.insert(key, (side, tetra_id));
                }
            }
        }
        Ok(created)
    }

    /// Bowyer-Watson insertion of a new site at `position`, carrying
    /// `payload` as its `PhysicalNode` handle.
    pub fn insert(&mut self, position: Vec3, payload: Entity, rng: &mut impl Rng) -> SimResult<SpaceNodeId> {
        let seed = self.locate(position, rng)?;
        let bad = self.bad_tetrahedra(seed, position)?;
        if bad.is_empty() {
            return Err(SimError::InvariantViolation(
                "no circumsphere contains the new point; point location failed".into(),
            ));
        }
        let (boundary, outside_of) = self.cavity_boundary(&bad);
        self.remove_tetrahedra(&bad);

        let new_id = self.nodes.insert(SpaceNode::new(SpaceNodeId::default(), position, Some(payload)));
        if let Some(n) = self.nodes.get_mut(new_id) {
            n.id = new_id;
        }

        self.close_cavity(boundary, &outside_of, |_, _| Ok(new_id))?;
        self.refresh_volume(new_id);
        if let Some(neighbors) = self.neighbors(new_id) {
            for n in neighbors {
                self.refresh_volume(n);
            }
        }
        Ok(new_id)
    }

    /// Move an existing node to `new_position`, preserving its
    /// `SpaceNodeId` identity: the old star is carved out, then the normal
    /// Bowyer-Watson cavity (seeded from one of the star's outside
    /// neighbors, tested against the *new* position) is closed using the
    /// same node as apex. Returns the node's neighbor set *before* the
    /// move, for the mass-conservation listener.
    pub fn move_node(&mut self, id: SpaceNodeId, new_position: Vec3, rng: &mut impl Rng) -> SimResult<Vec<SpaceNodeId>> {
        let old_neighbors = self.neighbors(id).ok_or(SimError::EntityNotFound)?;
        let star: HashSet<TetraId> = self
            .nodes
            .get(id)
            .ok_or(SimError::EntityNotFound)?
            .adjacent_tetrahedra
            .iter()
            .copied()
            .collect();
        let (boundary, outside_of) = self.cavity_boundary(&star);
        let seed_outside = outside_of.values().find_map(|v| *v);
        self.remove_tetrahedra(&star);

        if let Some(node) = self.nodes.get_mut(id) {
            node.position = new_position;
        }

        // The moved point may now also violate tetrahedra beyond its old
        // star; grow the cavity from a neighboring survivor if one exists.
        let extra_bad = if let Some(seed) = seed_outside {
            self.bad_tetrahedra(seed, new_position)?
        } else {
            HashSet::new()
        };
        let (boundary, outside_of) = if extra_bad.is_empty() {
            (boundary, outside_of)
        } else {
            let (mut b2, mut o2) = self.cavity_boundary(&extra_bad);
            self.remove_tetrahedra(&extra_bad);
            for t in boundary.one_sided_triangles() {
                b2.report_face(t.nodes);
            }
            for (k, v) in outside_of {
                o2.entry(k).or_insert(v);
            }
            (b2, o2)
        };

        self.close_cavity(boundary, &outside_of, |_, _| Ok(id))?;
        self.refresh_volume(id);
        for n in self.neighbors(id).unwrap_or_default() {
            self.refresh_volume(n);
        }
        for n in &old_neighbors {
            self.refresh_volume(*n);
        }
        Ok(old_neighbors)
    }

    /// Remove `id` entirely, re-triangulating the hole left in its star
    /// from the link's own boundary nodes (no replacement point). Returns
    /// the node's former neighbors, to which callers should redistribute
    /// anything the node owned.
    pub fn remove(&mut self, id: SpaceNodeId) -> SimResult<Vec<SpaceNodeId>> {
        if !self.is_real(id) {
            return Err(SimError::InvariantViolation("cannot remove a bootstrap node".into()));
        }
        let old_neighbors = self.neighbors(id).ok_or(SimError::EntityNotFound)?;
        let star: HashSet<TetraId> = self
            .nodes
            .get(id)
            .ok_or(SimError::EntityNotFound)?
            .adjacent_tetrahedra
            .iter()
            .copied()
            .collect();
        let (boundary, outside_of) = self.cavity_boundary(&star);
        let link_nodes: Vec<SpaceNodeId> = boundary
            .one_sided_triangles()
            .flat_map(|t| t.nodes.into_iter())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        self.remove_tetrahedra(&star);
        self.nodes.remove(id);

        self.close_cavity(boundary, &outside_of, |tri, face| {
            tri.pick_apex_for_hole(&link_nodes, face)
        })?;

        for n in &old_neighbors {
            self.refresh_volume(*n);
        }
        Ok(old_neighbors)
    }

    /// Choose the link node (other than `face`'s own three) whose
    /// tetrahedron over `face` has the smallest circumsphere that contains
    /// none of the other link nodes — the empty-circumsphere property a
    /// Delaunay tetrahedralization's faces must satisfy locally. Falls
    /// back to the smallest circumsphere outright if no candidate is
    /// strictly empty (can happen under the cospherical jittering this
    /// engine otherwise relies on).
    fn pick_apex_for_hole(&self, link_nodes: &[SpaceNodeId], face: [SpaceNodeId; 3]) -> SimResult<SpaceNodeId> {
        let face_pos = self.positions3(face)?;
        let mut best_empty: Option<(SpaceNodeId, f64)> = None;
        let mut best_any: Option<(SpaceNodeId, f64)> = None;

        for &c in link_nodes {
            if face.contains(&c) {
                continue;
            }
            let Some(cp) = self.nodes.get(c).map(|n| n.position) else { continue };
            if is_degenerate_orientation(face_pos[0], face_pos[1], face_pos[2], cp) {
                continue;
            }
            let Some((center, r2)) = circumsphere(face_pos[0], face_pos[1], face_pos[2], cp) else { continue };
            if best_any.map(|(_, br)| r2 < br).unwrap_or(true) {
                best_any = Some((c, r2));
            }
            let mut empty = true;
            for &other in link_nodes {
                if other == c || face.contains(&other) {
                    continue;
                }
                if let Some(op) = self.nodes.get(other).map(|n| n.position) {
                    if center.distance_squared(op) < r2 - 1e-9 {
                        empty = false;
                        break;
                    }
                }
            }
            if empty && best_empty.map(|(_, br)| r2 < br).unwrap_or(true) {
                best_empty = Some((c, r2));
            }
        }

        best_empty
            .or(best_any)
            .map(|(c, _)| c)
            .ok_or_else(|| SimError::InvariantViolation("no valid apex to close removal cavity".into()))
    }

    /// Cheap Voronoi-like volume estimate at `id`: a third
    /// of the volume of each adjacent tetrahedron, following the standard
    /// "each tetrahedron contributes 1/4 of its volume to each of its
    /// corners" partition.
    fn refresh_volume(&mut self, id: SpaceNodeId) {
        let Some(node) = self.nodes.get(id) else { return };
        let tetra_ids = node.adjacent_tetrahedra.clone();
        let mut volume = 0.0;
        for tid in tetra_ids {
            if let Some(t) = self.tetrahedra.get(tid) {
                if let Ok(p) = self.positions4(t.nodes) {
                    let v6 = orientation(p[0], p[1], p[2], p[3]).abs();
                    volume += v6 / 6.0 / 4.0;
                }
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.volume = volume.max(1e-9);
        }
    }

    /// The four nodes of the tetrahedron containing `p` (filtering out
    /// none — callers doing physical interpolation need the bootstrap
    /// corners too when `p` is near the domain's edge).
    pub fn vertices_of_containing_tetra(&self, p: Vec3, rng: &mut impl Rng) -> SimResult<[SpaceNodeId; 4]> {
        let tid = self.locate(p, rng)?;
        let t = self.tetrahedra.get(tid).ok_or(SimError::InvariantViolation("located a freed tetrahedron".into()))?;
        Ok(t.nodes)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len() - 4
    }

    pub fn real_node_ids(&self) -> impl Iterator<Item = SpaceNodeId> + '_ {
        self.nodes.iter().filter(|(_, n)| !n.is_super()).map(|(id, _)| id)
    }

    /// All edges currently in the triangulation, used by the restoration
    /// pass when validating local Delaunay-ness around a changed region
    /// (kept available for modules that want to probe flip candidates
    /// directly rather than going through `move_node`).
    pub fn edges_of(&self, tetra: TetraId) -> Option<[super::edge::Edge; 6]> {
        self.tetrahedra.get(tetra).map(tetra_edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn dummy_entity() -> Entity {
        let mut world = hecs::World::new();
        world.spawn(())
    }

    #[test]
    fn insert_several_points_grows_the_mesh() {
        let mut tri = Triangulation::new(10.0);
        let mut r = rng();
        let pts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(2.0, 2.0, 2.0),
        ];
        let mut ids = Vec::new();
        for &p in &pts {
            let e = dummy_entity();
            ids.push(tri.insert(p, e, &mut r).expect("insert"));
        }
        assert_eq!(tri.node_count(), pts.len());
        for id in &ids {
            assert!(tri.neighbors(*id).unwrap().len() >= 1);
        }
    }

    #[test]
    fn inserted_node_position_round_trips() {
        let mut tri = Triangulation::new(10.0);
        let mut r = rng();
        let e = dummy_entity();
        let id = tri.insert(Vec3::new(1.0, 2.0, 3.0), e, &mut r).unwrap();
        assert_eq!(tri.node(id).unwrap().position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn move_preserves_node_identity() {
        let mut tri = Triangulation::new(10.0);
        let mut r = rng();
        let mut ids = Vec::new();
        for p in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(2.0, 2.0, 2.0),
        ] {
            let e = dummy_entity();
            ids.push(tri.insert(p, e, &mut r).unwrap());
        }
        let moved = ids[4];
        tri.move_node(moved, Vec3::new(1.8, 1.9, 2.1), &mut r).expect("move");
        assert_eq!(tri.node(moved).unwrap().position, Vec3::new(1.8, 1.9, 2.1));
        assert_eq!(tri.node_count(), 5);
    }

    #[test]
    fn remove_drops_the_node_and_keeps_others() {
        let mut tri = Triangulation::new(10.0);
        let mut r = rng();
        let mut ids = Vec::new();
        for p in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(-2.0, 1.0, 1.0),
        ] {
            let e = dummy_entity();
            ids.push(tri.insert(p, e, &mut r).unwrap());
        }
        let target = ids[4];
        tri.remove(target).expect("remove");
        assert_eq!(tri.node_count(), 5);
        assert!(tri.node(target).is_none());
        for &id in ids.iter().filter(|&&i| i != target) {
            assert!(tri.node(id).is_some());
        }
    }
}
