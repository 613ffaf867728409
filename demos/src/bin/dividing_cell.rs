//! DividingCell: a single soma at (0, 3, 5) carries a
//! `GrowthDivisionModule` that grows it at a fixed rate until its diameter
//! crosses a threshold, then divides it; both daughters keep the module.
//! Run for 5000 steps and report the resulting cell count.

use bdm_core::components::Color;
use bdm_core::ecm::{BoundingBox, Ecm};
use bdm_core::engine::{Engine, EngineConfig};
use bdm_core::geometry::Vec3;
use bdm_core::module::Behaviors;
use growth_division_module::{GrowthDivisionModule, GrowthDivisionParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bounding_box = BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) };
    let mut ecm = Ecm::new(100.0, bounding_box);
    let mut rng = bdm_core::rng::SimRng::new(42);

    let soma = ecm.register_sphere(Vec3::new(0.0, 3.0, 5.0), 10.0, 1.0, 0.1, Color::rgb(1.0, 0.0, 0.0), &mut rng)?;

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 5000, dt: 0.01, ..Default::default() });
    let mut behaviors = Behaviors::new();
    behaviors.push(Box::new(GrowthDivisionModule::new(GrowthDivisionParams::default())));
    engine.attach_behaviors(soma, behaviors)?;

    println!("=== DividingCell: {} steps ===", engine.config().max_steps);
    engine.run()?;

    let cell_count = engine.ecm.world.query::<&bdm_core::components::SphereState>().iter().count();
    println!("final time: {:.2}", engine.current_time());
    println!("cell count: {}", cell_count);
    for (_, core) in engine.ecm.world.query::<&bdm_core::components::ObjectCore>().iter() {
        assert!(bounding_box.contains(core.mass_location), "cell escaped the bounding box");
    }
    println!("all cells remain inside the bounding box");
    Ok(())
}
