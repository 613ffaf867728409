//! NeuriteChemoAttraction: substance "A" follows a
//! Gaussian profile along z (max 1.0 at z = 400, sigma = 160); one cell at
//! the origin grows a single neurite whose growth cone is steered by
//! `ChemoAttractionModule`. After 1000 steps the axon tip should have
//! drifted toward +z.

use bdm_core::components::{Color, ObjectCore};
use bdm_core::ecm::{ArtificialGradient, BellGradient, BoundingBox, Ecm};
use bdm_core::engine::{Engine, EngineConfig};
use bdm_core::error::SimError;
use bdm_core::geometry::Vec3;
use bdm_core::module::Behaviors;
use chemo_attraction_module::{ChemoAttractionModule, ChemoAttractionParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bounding_box = BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) };
    let mut ecm = Ecm::new(100.0, bounding_box);
    ecm.register_gradient("A", ArtificialGradient::Bell(BellGradient { axis: 2, max_value: 1.0, mean: 400.0, sigma: 160.0 }));

    let mut rng = bdm_core::rng::SimRng::new(9);
    let soma = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::rgb(0.2, 0.8, 0.2), &mut rng)?;
    let growth_cone =
        bdm_core::physical_sphere::add_new_physical_cylinder(&mut ecm.world, soma, 10.0, 0.0, std::f64::consts::FRAC_PI_2, 1.0, 0.0, 5.0)?;
    let cone_pos = ecm.world.get::<&ObjectCore>(growth_cone).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)?;
    ecm.insert_into_triangulation(growth_cone, cone_pos, &mut rng)?;
    let start_z = cone_pos.z;

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 1000, dt: 0.1, ..Default::default() });
    let mut behaviors = Behaviors::new();
    behaviors.push(Box::new(ChemoAttractionModule::new(ChemoAttractionParams::default())));
    engine.attach_behaviors(growth_cone, behaviors)?;

    println!("=== NeuriteChemoAttraction: {} steps ===", engine.config().max_steps);
    for step in 0..engine.config().max_steps {
        engine.step()?;
        if step % 200 == 0 {
            if let Ok(core) = engine.ecm.world.get::<&ObjectCore>(growth_cone) {
                println!("step {step}: tip z = {:.1}", core.mass_location.z);
            }
        }
    }

    let end_z = engine.ecm.world.get::<&ObjectCore>(growth_cone).map(|c| c.mass_location.z).unwrap_or(start_z);
    println!("start z = {start_z:.2}, end z = {end_z:.2}");
    assert!(end_z > start_z, "growth cone should drift toward the +z gradient peak");
    println!("NeuriteChemoAttraction scenario satisfied: axon tip drifted toward +z.");
    Ok(())
}
