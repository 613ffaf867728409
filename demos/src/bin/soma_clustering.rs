//! SomaClustering: 60 "yellow" and 60 "violet" somas,
//! each secreting an extracellular substance named after its own color and
//! climbing the local gradient of that substance. After enough steps the
//! two colors should separate into distinct clusters, i.e. the
//! centroid-to-centroid distance should grow relative to its initial value.

use bdm_core::components::{Color, ObjectCore};
use bdm_core::ecm::{BoundingBox, Ecm};
use bdm_core::error::SimError;
use bdm_core::geometry::Vec3;
use bdm_core::node::{estimate_gradient, NodeRecord};
use bdm_core::rng::SimRng;
use hecs::Entity;
use rand::Rng;

const SECRETION_CONCENTRATION: f64 = 1.0;
const CLIMB_SPEED: f64 = 0.3;
const POPULATION: usize = 60;
const STEPS: u32 = 400;

fn centroid(ecm: &Ecm, somas: &[Entity]) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for &e in somas {
        sum += ecm.world.get::<&ObjectCore>(e).map(|c| c.mass_location).unwrap_or(Vec3::ZERO);
    }
    sum * (1.0 / somas.len() as f64)
}

/// Secrete `substance` at every soma's own node, then move each soma a
/// small step along the locally estimated gradient of that same substance.
fn climb_own_gradient(ecm: &mut Ecm, somas: &[Entity], substance: &str, rng: &mut SimRng) -> Result<(), SimError> {
    for &e in somas {
        let id = ecm.world.get::<&NodeRecord>(e).map_err(|_| SimError::EntityNotFound)?.space_node;
        let Some(id) = id else { continue };
        let volume = ecm.triangulation.node(id).map(|n| n.volume).unwrap_or(1.0);
        ecm.world
            .get::<&mut NodeRecord>(e)
            .map_err(|_| SimError::EntityNotFound)?
            .set_extracellular_concentration(substance, SECRETION_CONCENTRATION, volume.max(1e-9));
    }

    for &e in somas {
        let id = ecm.world.get::<&NodeRecord>(e).map_err(|_| SimError::EntityNotFound)?.space_node;
        let Some(id) = id else { continue };
        let Some(center) = ecm.triangulation.node(id).map(|n| n.position) else { continue };
        let center_value = ecm.world.get::<&NodeRecord>(e).map(|r| r.extracellular_concentration(substance)).unwrap_or(0.0);

        let mut neighbor_samples = Vec::new();
        for neighbor_id in ecm.triangulation.neighbors(id).unwrap_or_default() {
            let Some(pos) = ecm.triangulation.node(neighbor_id).map(|n| n.position) else { continue };
            let Some(neighbor_entity) = ecm.entity_of(neighbor_id) else { continue };
            let value = ecm.world.get::<&NodeRecord>(neighbor_entity).map(|r| r.extracellular_concentration(substance)).unwrap_or(0.0);
            neighbor_samples.push((pos, value));
        }
        if neighbor_samples.is_empty() {
            continue;
        }
        let gradient = estimate_gradient(center, center_value, &neighbor_samples);
        let direction = if gradient.norm() > 1e-9 { gradient.normalize() } else { Vec3::ZERO };
        let new_position = center + direction * CLIMB_SPEED + Vec3::new(rng.gen_range(-0.05..0.05), rng.gen_range(-0.05..0.05), rng.gen_range(-0.05..0.05));
        ecm.move_site(e, new_position, rng)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bounding_box = BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) };
    let mut ecm = Ecm::new(100.0, bounding_box);
    let mut rng = SimRng::new(123);

    let mut yellow = Vec::with_capacity(POPULATION);
    let mut violet = Vec::with_capacity(POPULATION);
    for i in 0..POPULATION {
        let angle = i as f64 / POPULATION as f64 * std::f64::consts::TAU;
        let pos = Vec3::new(20.0 * angle.cos(), 20.0 * angle.sin(), -10.0);
        yellow.push(ecm.register_sphere(pos, 10.0, 1.0, 0.1, Color::rgb(1.0, 1.0, 0.0), &mut rng)?);
    }
    for i in 0..POPULATION {
        let angle = i as f64 / POPULATION as f64 * std::f64::consts::TAU;
        let pos = Vec3::new(20.0 * angle.cos(), 20.0 * angle.sin(), 10.0);
        violet.push(ecm.register_sphere(pos, 10.0, 1.0, 0.1, Color::rgb(0.6, 0.0, 0.8), &mut rng)?);
    }

    let initial_distance = centroid(&ecm, &yellow).distance(centroid(&ecm, &violet));

    println!("=== SomaClustering: {STEPS} steps, {POPULATION} + {POPULATION} cells ===");
    for step in 0..STEPS {
        climb_own_gradient(&mut ecm, &yellow, "yellow", &mut rng)?;
        climb_own_gradient(&mut ecm, &violet, "violet", &mut rng)?;
        if step % 100 == 0 {
            let d = centroid(&ecm, &yellow).distance(centroid(&ecm, &violet));
            println!("step {step}: centroid distance = {d:.2}");
        }
    }

    let final_distance = centroid(&ecm, &yellow).distance(centroid(&ecm, &violet));
    println!("initial centroid distance: {initial_distance:.2}");
    println!("final centroid distance: {final_distance:.2}");
    assert!(final_distance > initial_distance, "the two populations should separate over time");
    println!("SomaClustering scenario satisfied: cluster separation grew relative to the initial distance.");
    Ok(())
}
