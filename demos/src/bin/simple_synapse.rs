//! SimpleSynapse: an excitatory soma at (-2.5, 0, -30)
//! extends an axon upward, an inhibitory soma at (2.5, 0, 30) extends a
//! dendrite downward, both at unit speed, until the growth cones pass each
//! other. A bouton is placed at the axon tip and a spine at the dendrite
//! tip, then `synapse_with(bond = true)` pairs them and installs a
//! `PhysicalBond`.

use bdm_core::components::{Color, Excrescence, ExcrescenceKind, ObjectCore, PhysicalBond};
use bdm_core::ecm::{BoundingBox, Ecm};
use bdm_core::error::SimError;
use bdm_core::geometry::Vec3;
use bdm_core::physical_cylinder;
use bdm_core::physical_object::{add_excrescence, synapse_with};
use bdm_core::physical_sphere;
use bdm_core::rng::SimRng;
use hecs::{Entity, World};
use std::f64::consts::PI;

fn mass_location(world: &World, entity: Entity) -> Result<Vec3, SimError> {
    world.get::<&ObjectCore>(entity).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bounding_box = BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) };
    let mut ecm = Ecm::new(100.0, bounding_box);
    let mut rng = SimRng::new(7);

    let axon_soma = ecm.register_sphere(Vec3::new(-2.5, 0.0, -30.0), 10.0, 1.0, 0.1, Color::rgb(1.0, 0.2, 0.2), &mut rng)?;
    let dendrite_soma = ecm.register_sphere(Vec3::new(2.5, 0.0, 30.0), 10.0, 1.0, 0.1, Color::rgb(0.2, 0.2, 1.0), &mut rng)?;

    // phi=0, theta=0 points the local z-axis "up"; theta=PI points it "down".
    let axon = physical_sphere::add_new_physical_cylinder(&mut ecm.world, axon_soma, 2.0, 0.0, 0.0, 1.0, 0.0, 5.0)?;
    let axon_pos = mass_location(&ecm.world, axon)?;
    ecm.insert_into_triangulation(axon, axon_pos, &mut rng)?;
    let dendrite = physical_sphere::add_new_physical_cylinder(&mut ecm.world, dendrite_soma, 2.0, 0.0, PI, 1.0, 0.0, 5.0)?;
    let dendrite_pos = mass_location(&ecm.world, dendrite)?;
    ecm.insert_into_triangulation(dendrite, dendrite_pos, &mut rng)?;

    println!("=== SimpleSynapse ===");
    for step in 0..65 {
        physical_cylinder::extend_cylinder(&mut ecm.world, axon, 1.0, 1.0)?;
        let axon_pos = mass_location(&ecm.world, axon)?;
        ecm.move_site(axon, axon_pos, &mut rng)?;

        physical_cylinder::extend_cylinder(&mut ecm.world, dendrite, 1.0, 1.0)?;
        let dendrite_pos = mass_location(&ecm.world, dendrite)?;
        ecm.move_site(dendrite, dendrite_pos, &mut rng)?;

        if step % 10 == 0 {
            println!("step {step}: axon z = {:.1}, dendrite z = {:.1}", axon_pos.z, dendrite_pos.z);
        }
    }

    let bouton = add_excrescence(&mut ecm.world, axon, ExcrescenceKind::Bouton, 1.0)?;
    let spine = add_excrescence(&mut ecm.world, dendrite, ExcrescenceKind::Spine, 1.0)?;
    let bond = synapse_with(&mut ecm.world, bouton, spine, true)?;

    let is_paired =
        |e: Entity| -> Result<bool, SimError> { Ok(ecm.world.get::<&Excrescence>(e).map_err(|_| SimError::EntityNotFound)?.is_paired()) };
    let paired = is_paired(bouton)? && is_paired(spine)?;
    let bond_count = ecm.world.query::<&PhysicalBond>().iter().count();

    let tip_distance = mass_location(&ecm.world, axon)?.distance(mass_location(&ecm.world, dendrite)?);
    println!("axon and dendrite tip distance: {tip_distance:.2}");
    println!("excrescences paired: {paired}");
    println!("physical bonds registered: {bond_count}");
    assert!(paired, "bouton and spine must be paired after synapse_with");
    assert!(bond.is_some() && bond_count == 1, "synapse_with(bond=true) must install exactly one PhysicalBond");
    println!("SimpleSynapse scenario satisfied: both excrescences pair and one new PhysicalBond exists.");
    Ok(())
}
