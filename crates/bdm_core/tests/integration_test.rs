use bdm_core::components::{Color, CylinderState, ObjectCore, SphereState};
use bdm_core::ecm::{BoundingBox, Ecm};
use bdm_core::engine::{Engine, EngineConfig};
use bdm_core::geometry::Vec3;
use bdm_core::physical_sphere;
use bdm_core::rng::SimRng;

fn default_box() -> BoundingBox {
    BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
}

#[test]
fn engine_advances_clock_and_step_count_together() {
    let mut ecm = Ecm::new(100.0, default_box());
    let mut rng = SimRng::new(1);
    ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 10, dt: 0.1, ..Default::default() });
    for _ in 0..5 {
        engine.step().unwrap();
    }

    assert_eq!(engine.current_step(), 5);
    assert!((engine.current_time() - 0.5).abs() < 1e-9);
}

#[test]
fn soma_tree_with_neurite_runs_without_invariant_violation() {
    let mut ecm = Ecm::new(100.0, default_box());
    let mut rng = SimRng::new(2);
    let soma = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
    let cylinder =
        physical_sphere::add_new_physical_cylinder(&mut ecm.world, soma, 10.0, 0.0, std::f64::consts::FRAC_PI_2, 1.0, 0.0, 5.0).unwrap();
    let position = ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location;
    ecm.insert_into_triangulation(cylinder, position, &mut rng).unwrap();

    let mut engine = Engine::new(ecm, EngineConfig { max_steps: 50, dt: 0.05, ..Default::default() });
    engine.run().unwrap();

    assert_eq!(engine.current_step(), 50);
    let state = engine.ecm.world.get::<&CylinderState>(cylinder).unwrap();
    let expected_tension = if state.resting_length > 1e-12 {
        state.spring_constant * (state.actual_length - state.resting_length) / state.resting_length
    } else {
        0.0
    };
    assert!((state.tension - expected_tension).abs() < 1e-9, "tension must stay recomputable from L, R, k");
    assert!((state.actual_length - state.spring_axis.norm()).abs() < 1e-9);
}

#[test]
fn growing_sphere_remains_a_single_node_until_it_crosses_division_threshold() {
    let mut ecm = Ecm::new(100.0, default_box());
    let mut rng = SimRng::new(3);
    let soma = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();

    for _ in 0..10 {
        physical_sphere::change_volume(&mut ecm.world, soma, 50.0, 0.1).unwrap();
    }

    assert_eq!(ecm.node_count(), 1);
    let core = ecm.world.get::<&ObjectCore>(soma).unwrap();
    assert!(core.diameter > 10.0, "sphere should have grown past its initial diameter");
    assert!((core.volume - physical_sphere::volume_of_diameter(core.diameter)).abs() < 1e-9, "volume must track diameter");
    assert!(ecm.world.get::<&SphereState>(soma).unwrap().daughters.is_empty());
}
