//! Demonstrates loading, validating, and round-tripping the engine's
//! configuration sections through `bdm_config`, then wiring the
//! result into an `Ecm` + `Engine` pair.

use bdm_config::{ConfigLoader, FullConfig};
use bdm_core::ecm::{BoundingBox, Ecm};
use bdm_core::engine::{Engine, EngineConfig};
use bdm_core::geometry::Vec3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = FullConfig::default();
    config.simulation.max_steps = 50;
    config.simulation.seed = Some(99);
    config.wall.artificial_walls_for_spheres = true;

    let errors = config.validate();
    assert!(errors.is_empty(), "default-derived config should validate: {errors:?}");

    let path = std::env::temp_dir().join("bdm_config_example.toml");
    ConfigLoader::save_toml(&config, path.to_str().unwrap())?;
    let reloaded = ConfigLoader::from_toml(path.to_str().unwrap())?;
    std::fs::remove_file(&path).ok();
    println!("round-tripped config through {}", path.display());
    println!("max_steps = {}, dt = {}, walls_for_spheres = {}", reloaded.simulation.max_steps, reloaded.simulation.dt, reloaded.wall.artificial_walls_for_spheres);

    let bounding_box = BoundingBox {
        min: Vec3::new(reloaded.wall.x_min, reloaded.wall.y_min, reloaded.wall.z_min),
        max: Vec3::new(reloaded.wall.x_max, reloaded.wall.y_max, reloaded.wall.z_max),
    };
    let mut ecm = Ecm::new(100.0, bounding_box);
    ecm.artificial_walls_for_spheres = reloaded.wall.artificial_walls_for_spheres;
    ecm.artificial_walls_for_cylinders = reloaded.wall.artificial_walls_for_cylinders;

    let mut rng = bdm_core::rng::SimRng::new(reloaded.simulation.seed.unwrap_or(0));
    ecm.register_sphere(
        Vec3::ZERO,
        reloaded.sphere.default_diameter,
        reloaded.sphere.default_mass,
        reloaded.sphere.default_adherence,
        bdm_core::components::Color::WHITE,
        &mut rng,
    )?;

    let engine_config = EngineConfig {
        max_steps: reloaded.simulation.max_steps,
        dt: reloaded.simulation.dt,
        checkpoint_interval: reloaded.simulation.checkpoint_interval,
        num_threads: reloaded.simulation.num_threads,
        seed: reloaded.simulation.seed.unwrap_or(0),
        parallel_modules: reloaded.simulation.parallel_modules,
        max_displacement: reloaded.simulation.maximal_displacement,
        wall_stiffness: reloaded.wall.wall_stiffness,
        intracellular_diffusion_min_concentration: reloaded.diffusion.intracellular_diffusion_min_concentration,
    };
    let mut engine = Engine::new(ecm, engine_config);
    engine.run()?;
    println!("ran {} steps from a config-driven engine", engine.current_step());
    Ok(())
}
