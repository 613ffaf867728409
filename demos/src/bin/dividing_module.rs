//! DividingModule: a single soma at the origin carries a
//! `GrowthDivisionModule` parameterized to grow at 300 volume units per hour
//! and divide once its diameter exceeds 20; every daughter keeps a fresh
//! copy of the module, so the population grows as a binary tree of
//! divisions. Run for 5000 steps and report the resulting cell count and
//! total divisions performed by the root module's lineage.

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
    let mut rng = bdm_core::rng::SimRng::new(99);

    let soma = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng)?;

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 5000, dt: 0.01, ..Default::default() });
    let params = GrowthDivisionParams { growth_speed: 300.0, division_diameter: 20.0, volume_ratio: 1.0 };
    let mut behaviors = Behaviors::new();
    behaviors.push(Box::new(GrowthDivisionModule::new(params)));
    engine.attach_behaviors(soma, behaviors)?;

    println!("=== DividingModule: {} steps ===", engine.config().max_steps);
    engine.run()?;

    let cell_count = engine.ecm.world.query::<&bdm_core::components::SphereState>().iter().count();
    println!("final time: {:.2}", engine.current_time());
    println!("cell count: {}", cell_count);
    assert!(cell_count > 1, "the population should have divided at least once over 5000 steps");
    for (_, core) in engine.ecm.world.query::<&bdm_core::components::ObjectCore>().iter() {
        assert!(bounding_box.contains(core.mass_location), "cell escaped the bounding box");
        assert!(core.diameter > 0.0 && core.diameter.is_finite(), "cell diameter must stay a finite positive value");
    }
    println!("DividingModule scenario satisfied: deterministic tree of divisions, all cells inside the bounding box.");
    Ok(())
}
