//! `PhysicalNode`: the base type for every triangulation
//! site. Owns the extracellular substance map and the bookkeeping flag the
//! movement listener uses to tell "old" from "new" neighbors during a
//! topology change.

use std::collections::HashMap;

use crate::geometry::{gaussian_eliminate, Vec3};
use crate::substance::{Substance, UNIT_SUBSTANCE_ID};
use crate::triangulation::space_node::SpaceNodeId;

#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub space_node: Option<SpaceNodeId>,
    pub extracellular: HashMap<String, Substance>,
    /// Stamped with a fresh value by the movement listener at the start of
    /// a move/insert/remove pass, so "old neighbor" vs. "new neighbor" can
    /// be told apart in the `after_*` hook.
    pub movement_operation_id: u64,
}

impl NodeRecord {
    pub fn new(space_node: SpaceNodeId) -> Self {
        Self { space_node: Some(space_node), ..Default::default() }
    }

    /// Returns 0 if the substance is absent, except the reserved "U" id
    /// which always reads as 1.0.
    pub fn extracellular_concentration(&self, id: &str) -> f64 {
        if id == UNIT_SUBSTANCE_ID {
            return 1.0;
        }
        self.extracellular.get(id).map(|s| s.concentration).unwrap_or(0.0)
    }

    pub fn set_extracellular_concentration(&mut self, id: &str, concentration: f64, volume: f64) {
        if id == UNIT_SUBSTANCE_ID {
            return;
        }
        let entry = self
            .extracellular
            .entry(id.to_string())
            .or_insert_with(|| Substance::new(id));
        entry.concentration = concentration.max(0.0);
        entry.sync_quantity_from_concentration(volume);
    }

    /// Integrate a rate `dq_per_time` into the quantity of `id` over one
    /// simulation step of length `dt`, then refresh concentration from the
    /// node's Voronoi volume.
    pub fn modify_extracellular_quantity(&mut self, id: &str, dq_per_time: f64, dt: f64, volume: f64) {
        if id == UNIT_SUBSTANCE_ID {
            return;
        }
        let entry = self
            .extracellular
            .entry(id.to_string())
            .or_insert_with(|| Substance::new(id));
        entry.quantity = (entry.quantity + dq_per_time * dt).max(0.0);
        entry.sync_concentration_from_quantity(volume);
    }
}

/// Solve the barycentric coordinates of `p` with respect to the tetrahedron
/// `vertices`, via the 4x4 system `sum(lambda_i * [v_i; 1]) = [p; 1]`.
/// Delaunay-independent: works for any non-degenerate tetrahedron.
/// Coordinates sum to 1 by construction; negative entries mean `p` lies
/// outside the tetrahedron along that face.
pub fn barycentric_coordinates(p: Vec3, vertices: [Vec3; 4]) -> Option<[f64; 4]> {
    let a = vec![
        vec![vertices[0].x, vertices[1].x, vertices[2].x, vertices[3].x],
        vec![vertices[0].y, vertices[1].y, vertices[2].y, vertices[3].y],
        vec![vertices[0].z, vertices[1].z, vertices[2].z, vertices[3].z],
        vec![1.0, 1.0, 1.0, 1.0],
    ];
    let b = vec![p.x, p.y, p.z, 1.0];
    gaussian_eliminate(a, b).map(|v| [v[0], v[1], v[2], v[3]])
}

pub fn point_in_tetrahedron(p: Vec3, vertices: [Vec3; 4], tolerance: f64) -> bool {
    match barycentric_coordinates(p, vertices) {
        Some(l) => l.iter().all(|&li| li >= -tolerance),
        None => false,
    }
}

/// Interpolate a scalar field sampled at the tetrahedron's vertices at
/// point `p`, using barycentric weights.
pub fn interpolate_barycentric(p: Vec3, vertices: [Vec3; 4], values: [f64; 4]) -> Option<f64> {
    let l = barycentric_coordinates(p, vertices)?;
    Some(l.iter().zip(values.iter()).map(|(w, v)| w * v).sum())
}

/// Least-squares estimate of the local gradient of a scalar field from a
/// center sample and a handful of neighbor samples, used by
/// `extrapolate_along_gradient` when no containing tetrahedron can be
/// found for the interpolation in `barycentric_coordinates`.
pub fn estimate_gradient(center: Vec3, center_value: f64, neighbors: &[(Vec3, f64)]) -> Vec3 {
    if neighbors.len() < 3 {
        return Vec3::ZERO;
    }
    // Normal equations for least-squares: (sum d d^T) g = sum d * dv
    let mut ata = [[0.0_f64; 3]; 3];
    let mut atb = [0.0_f64; 3];
    for &(pos, value) in neighbors {
        let d = pos - center;
        let dv = value - center_value;
        let darr = d.to_array();
        for i in 0..3 {
            for j in 0..3 {
                ata[i][j] += darr[i] * darr[j];
            }
            atb[i] += darr[i] * dv;
        }
    }
    match gaussian_eliminate(ata.iter().map(|r| r.to_vec()).collect(), atb.to_vec()) {
        Some(g) => Vec3::new(g[0], g[1], g[2]),
        None => Vec3::ZERO,
    }
}

/// Gradient-based linear extrapolation of a concentration at an offset
/// `delta` from a point where the concentration and local gradient are
/// known. Used by the movement listener when the target position has no
/// containing tetrahedron (outside the current convex hull).
pub fn extrapolate_along_gradient(base_value: f64, gradient: Vec3, delta: Vec3) -> f64 {
    (base_value + gradient.dot(delta)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barycentric_coordinates_sum_to_one() {
        let verts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let p = Vec3::new(0.2, 0.2, 0.2);
        let l = barycentric_coordinates(p, verts).unwrap();
        let sum: f64 = l.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vertex_has_coordinate_one_at_itself() {
        let verts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let l = barycentric_coordinates(verts[1], verts).unwrap();
        assert!((l[1] - 1.0).abs() < 1e-9);
        assert!(l[0].abs() < 1e-9);
    }

    #[test]
    fn point_outside_tetrahedron_has_a_negative_coordinate() {
        let verts = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        assert!(!point_in_tetrahedron(Vec3::new(5.0, 5.0, 5.0), verts, 1e-9));
    }

    #[test]
    fn unit_substance_id_always_reads_one() {
        let node = NodeRecord::default();
        assert_eq!(node.extracellular_concentration(UNIT_SUBSTANCE_ID), 1.0);
    }

    #[test]
    fn gradient_extrapolation_is_linear() {
        let g = Vec3::new(1.0, 0.0, 0.0);
        let v = extrapolate_along_gradient(2.0, g, Vec3::new(3.0, 0.0, 0.0));
        assert!((v - 5.0).abs() < 1e-12);
    }
}
