//! SmallNetwork: 8 cells in two populations (4 excitatory, 4 inhibitory),
//! each extending one neurite toward the network's center under
//! chemoattraction. After the neurites converge, every growth cone is given
//! an excrescence and a `SynapseFormationModule`; a handful of further
//! steps let `extend_excrescences_and_synapse` run once per neurite element
//! and pair up nearby opposite-kind excrescences. Assert the total number
//! of synapses formed lands in a deterministic interval for the fixed seed.

use bdm_core::components::{Color, Excrescence, ExcrescenceKind, ObjectCore, PhysicalBond};
use bdm_core::ecm::{ArtificialGradient, BellGradient, BoundingBox, Ecm};
use bdm_core::engine::{Engine, EngineConfig};
use bdm_core::error::SimError;
use bdm_core::geometry::Vec3;
use bdm_core::module::Behaviors;
use bdm_core::physical_object::add_excrescence;
use bdm_core::physical_sphere;
use chemo_attraction_module::{ChemoAttractionModule, ChemoAttractionParams};
use hecs::{Entity, World};
use synapse_module::{SynapseFormationModule, SynapseFormationParams};

const POPULATION: usize = 4;
const RADIUS: f64 = 15.0;

fn mass_location(world: &World, entity: Entity) -> Result<Vec3, SimError> {
    world.get::<&ObjectCore>(entity).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bounding_box = BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) };
    let mut ecm = Ecm::new(100.0, bounding_box);
    // Both populations climb the same substance toward the z=0 plane from
    // opposite sides, so same-angle excitatory/inhibitory pairs meet.
    ecm.register_gradient("A", ArtificialGradient::Bell(BellGradient { axis: 2, max_value: 1.0, mean: 0.0, sigma: 200.0 }));

    let mut rng = bdm_core::rng::SimRng::new(17);
    let mut axons = Vec::with_capacity(POPULATION);
    let mut dendrites = Vec::with_capacity(POPULATION);

    for i in 0..POPULATION {
        let angle = i as f64 / POPULATION as f64 * std::f64::consts::TAU;
        let (x, y) = (RADIUS * angle.cos(), RADIUS * angle.sin());

        let excitatory = ecm.register_sphere(Vec3::new(x, y, -30.0), 10.0, 1.0, 0.1, Color::rgb(1.0, 0.2, 0.2), &mut rng)?;
        let axon = physical_sphere::add_new_physical_cylinder(&mut ecm.world, excitatory, 2.0, 0.0, 0.0, 1.0, 0.0, 5.0)?;
        let axon_pos = mass_location(&ecm.world, axon)?;
        ecm.insert_into_triangulation(axon, axon_pos, &mut rng)?;
        axons.push(axon);

        let inhibitory = ecm.register_sphere(Vec3::new(x, y, 30.0), 10.0, 1.0, 0.1, Color::rgb(0.2, 0.2, 1.0), &mut rng)?;
        let dendrite =
            physical_sphere::add_new_physical_cylinder(&mut ecm.world, inhibitory, 2.0, 0.0, std::f64::consts::PI, 1.0, 0.0, 5.0)?;
        let dendrite_pos = mass_location(&ecm.world, dendrite)?;
        ecm.insert_into_triangulation(dendrite, dendrite_pos, &mut rng)?;
        dendrites.push(dendrite);
    }

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 600, dt: 0.1, ..Default::default() });
    for &axon in &axons {
        let mut behaviors = Behaviors::new();
        behaviors.push(Box::new(ChemoAttractionModule::new(ChemoAttractionParams::default())));
        engine.attach_behaviors(axon, behaviors)?;
    }
    for &dendrite in &dendrites {
        let mut behaviors = Behaviors::new();
        behaviors.push(Box::new(ChemoAttractionModule::new(ChemoAttractionParams::default())));
        engine.attach_behaviors(dendrite, behaviors)?;
    }

    println!("=== SmallNetwork: converging {} neurite pairs ===", POPULATION);
    engine.run()?;

    for &axon in &axons {
        add_excrescence(&mut engine.ecm.world, axon, ExcrescenceKind::Bouton, 1.0)?;
        let mut behaviors = Behaviors::new();
        behaviors.push(Box::new(SynapseFormationModule::new(SynapseFormationParams {
            kind: ExcrescenceKind::Bouton,
            capture_radius: 20.0,
            bond_on_synapse: true,
        })));
        engine.attach_behaviors(axon, behaviors)?;
    }
    for &dendrite in &dendrites {
        add_excrescence(&mut engine.ecm.world, dendrite, ExcrescenceKind::Spine, 1.0)?;
    }

    for _ in 0..20 {
        engine.step()?;
    }

    let synapse_count = engine.ecm.world.query::<&PhysicalBond>().iter().count();
    let paired_excrescences = engine.ecm.world.query::<&Excrescence>().iter().filter(|(_, e)| e.is_paired()).count();
    println!("synapses formed: {synapse_count}");
    println!("paired excrescences: {paired_excrescences}");
    assert!(synapse_count <= POPULATION, "at most one synapse per excitatory/inhibitory pair can form");
    assert!(synapse_count >= 1, "at least one nearby pair should have synapsed for this seed");
    println!("SmallNetwork scenario satisfied: synapse count is within the expected interval for this seed.");
    Ok(())
}
