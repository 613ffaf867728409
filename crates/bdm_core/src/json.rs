//! `sim_state_to_json`: a read-only visitor over an `Ecm` that
//! produces a serializable snapshot of positions, morphologies, and
//! chemical fields, for golden-file comparison in end-to-end scenario
//! tests. Kept minimal; this is the one JSON seam the core itself owns.

use serde::Serialize;

use crate::components::{CylinderState, Excrescence, ObjectCore, SphereState};
use crate::ecm::Ecm;
use crate::geometry::Vec3;

#[derive(Debug, Serialize)]
pub struct SphereSnapshot {
    pub position: Vec3,
    pub diameter: f64,
    pub daughters: usize,
}

#[derive(Debug, Serialize)]
pub struct CylinderSnapshot {
    pub proximal: Vec3,
    pub distal: Vec3,
    pub diameter: f64,
    pub actual_length: f64,
    pub tension: f64,
    pub branch_order: u32,
}

#[derive(Debug, Serialize)]
pub struct NodeSnapshot {
    pub position: Vec3,
    pub volume: f64,
    pub substances: Vec<(String, f64)>,
}

#[derive(Debug, Serialize)]
pub struct SimSnapshot {
    pub time: f64,
    pub step: u64,
    pub spheres: Vec<SphereSnapshot>,
    pub cylinders: Vec<CylinderSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
}

/// Visit every registered object and node, producing a snapshot suitable
/// for `serde_json::to_string`/golden-file comparison.
pub fn sim_state_to_json(ecm: &Ecm, step: u64, time: f64) -> SimSnapshot {
    let spheres = ecm
        .world
        .query::<(&ObjectCore, &SphereState)>()
        .iter()
        .map(|(_, (core, state))| SphereSnapshot { position: core.mass_location, diameter: core.diameter, daughters: state.daughters.len() })
        .collect();

    let cylinders = ecm
        .world
        .query::<(&ObjectCore, &CylinderState)>()
        .iter()
        .map(|(_, (core, state))| CylinderSnapshot {
            proximal: core.mass_location - state.spring_axis,
            distal: core.mass_location,
            diameter: core.diameter,
            actual_length: state.actual_length,
            tension: state.tension,
            branch_order: state.branch_order,
        })
        .collect();

    let nodes = ecm
        .world
        .query::<&crate::node::NodeRecord>()
        .iter()
        .filter_map(|(_, record)| {
            let id = record.space_node?;
            let space_node = ecm.triangulation.node(id)?;
            Some(NodeSnapshot {
                position: space_node.position,
                volume: space_node.volume,
                substances: record.extracellular.iter().map(|(id, s)| (id.clone(), s.concentration)).collect(),
            })
        })
        .collect();

    SimSnapshot { time, step, spheres, cylinders, nodes }
}

/// Serialize the snapshot to a pretty-printed JSON string.
pub fn sim_state_to_json_string(ecm: &Ecm, step: u64, time: f64) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&sim_state_to_json(ecm, step, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Color;
    use crate::ecm::BoundingBox;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn snapshot_includes_registered_sphere() {
        let mut ecm = Ecm::new(100.0, BoundingBox { min: Vec3::new(-100.0, -100.0, -100.0), max: Vec3::new(100.0, 100.0, 100.0) });
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let snapshot = sim_state_to_json(&ecm, 0, 0.0);
        assert_eq!(snapshot.spheres.len(), 1);
        assert_eq!(snapshot.nodes.len(), 1);
    }
}
