//! `ChemoAttractionModule`: the growth-cone rule body for the
//! "NeuriteChemoAttraction" scenario — steer a terminal cylinder's elongation along
//! a weighted sum of its previous direction, the local artificial gradient,
//! and noise, and probabilistically bifurcate where the local
//! concentration is high.

use bdm_core::components::{CylinderState, ObjectCore};
use bdm_core::error::{SimError, SimResult};
use bdm_core::module::{Behaviors, BiologicalModule, ModuleContext};
use bdm_core::physical_cylinder;
use hecs::Entity;
use log::debug;
use rand::Rng;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct ChemoAttractionParams {
    pub substance_id: String,
    pub speed: f64,
    /// Weight on the previous spring-axis direction (persistence term).
    pub persistence_weight: f64,
    /// Weight on the normalized local gradient direction.
    pub gradient_weight: f64,
    /// Weight on uniform random noise.
    pub noise_weight: f64,
    pub bifurcation_concentration_threshold: f64,
    pub bifurcation_probability: f64,
    pub min_bifurcation_length: f64,
    pub branch_length: f64,
    pub branch_diameter: f64,
    pub bifurcation_half_angle: f64,
    pub spring_constant: f64,
}

impl Default for ChemoAttractionParams {
    fn default() -> Self {
        Self {
            substance_id: "A".to_string(),
            speed: 1.0,
            persistence_weight: 0.5,
            gradient_weight: 0.3,
            noise_weight: 0.2,
            bifurcation_concentration_threshold: 0.6,
            bifurcation_probability: 0.02,
            min_bifurcation_length: 10.0,
            branch_length: 9.0,
            branch_diameter: 1.0,
            bifurcation_half_angle: std::f64::consts::FRAC_PI_6,
            spring_constant: 5.0,
        }
    }
}

pub struct ChemoAttractionModule {
    params: ChemoAttractionParams,
    cell: Option<Entity>,
}

impl ChemoAttractionModule {
    pub fn new(params: ChemoAttractionParams) -> Self {
        Self { params, cell: None }
    }
}

impl Default for ChemoAttractionModule {
    fn default() -> Self {
        Self::new(ChemoAttractionParams::default())
    }
}

impl BiologicalModule for ChemoAttractionModule {
    fn name(&self) -> &str {
        "chemo_attraction_module"
    }

    fn run(&mut self, ctx: &mut ModuleContext, cell_element: Entity, dt: f64) -> SimResult<()> {
        let terminal = ctx
            .ecm
            .world
            .get::<&CylinderState>(cell_element)
            .map(|s| s.is_terminal())
            .map_err(|_| SimError::EntityNotFound)?;
        if !terminal {
            return Ok(());
        }

        let (tip, axis) = {
            let core = ctx.ecm.world.get::<&ObjectCore>(cell_element).map_err(|_| SimError::EntityNotFound)?;
            let state = ctx.ecm.world.get::<&CylinderState>(cell_element).map_err(|_| SimError::EntityNotFound)?;
            (core.mass_location, state.spring_axis)
        };
        let axis_dir = if axis.norm() > 1e-12 { axis.normalize() } else { axis };

        let gradient = ctx.ecm.get_gradient_artificial_concentration(&self.params.substance_id, tip);
        let gradient_dir = if gradient.norm() > 1e-12 { gradient.normalize() } else { bdm_core::geometry::Vec3::ZERO };
        let concentration = ctx.ecm.get_value_artificial_concentration(&self.params.substance_id, tip);

        let noise = bdm_core::geometry::Vec3::new(
            ctx.rng.gen_range(-1.0..1.0),
            ctx.rng.gen_range(-1.0..1.0),
            ctx.rng.gen_range(-1.0..1.0),
        );
        let combined = axis_dir * self.params.persistence_weight + gradient_dir * self.params.gradient_weight + noise * self.params.noise_weight;
        let direction = if combined.norm() > 1e-9 { combined.normalize() } else { axis_dir };

        physical_cylinder::move_point_mass(&mut ctx.ecm.world, cell_element, direction * (self.params.speed * dt))?;
        physical_cylinder::correct_direction(&mut ctx.ecm.world, cell_element)?;
        let new_position = ctx.ecm.world.get::<&ObjectCore>(cell_element).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)?;
        ctx.ecm.move_site(cell_element, new_position, ctx.rng)?;

        if concentration >= self.params.bifurcation_concentration_threshold && ctx.rng.gen::<f64>() < self.params.bifurcation_probability {
            let length = ctx.ecm.world.get::<&CylinderState>(cell_element).map(|s| s.actual_length).unwrap_or(0.0);
            if length > self.params.min_bifurcation_length {
                let (a, b) = physical_cylinder::bifurcate_cylinder(
                    &mut ctx.ecm.world,
                    cell_element,
                    self.params.branch_length,
                    self.params.bifurcation_half_angle,
                    self.params.branch_diameter,
                    self.params.spring_constant,
                )?;
                for daughter in [a, b] {
                    let position = ctx.ecm.world.get::<&ObjectCore>(daughter).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)?;
                    ctx.ecm.insert_into_triangulation(daughter, position, ctx.rng)?;
                    let mut daughter_behaviors = Behaviors::new();
                    daughter_behaviors.push(self.get_copy());
                    let _ = ctx.ecm.world.insert_one(daughter, daughter_behaviors);
                }
                debug!("growth cone {:?} bifurcated at concentration {:.3}", cell_element, concentration);
            }
        }
        Ok(())
    }

    fn is_copied_when_neurite_branches(&self) -> bool {
        true
    }

    fn is_deleted_after_bifurcation(&self) -> bool {
        true
    }

    fn get_copy(&self) -> Box<dyn BiologicalModule> {
        Box::new(ChemoAttractionModule::new(self.params.clone()))
    }

    fn set_cell_element(&mut self, cell_element: Entity) {
        self.cell = Some(cell_element);
    }

    fn get_cell_element(&self) -> Option<Entity> {
        self.cell
    }

    fn get_params(&self) -> Value {
        json!({
            "substance_id": self.params.substance_id,
            "speed": self.params.speed,
            "persistence_weight": self.params.persistence_weight,
            "gradient_weight": self.params.gradient_weight,
            "noise_weight": self.params.noise_weight,
            "bifurcation_probability": self.params.bifurcation_probability,
        })
    }

    fn set_params(&mut self, params: &Value) -> SimResult<()> {
        if let Some(v) = params.get("speed").and_then(|v| v.as_f64()) {
            self.params.speed = v;
        }
        if let Some(v) = params.get("bifurcation_probability").and_then(|v| v.as_f64()) {
            self.params.bifurcation_probability = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdm_core::components::Color;
    use bdm_core::ecm::{ArtificialGradient, BellGradient, BoundingBox, Ecm};
    use bdm_core::geometry::Vec3;
    use bdm_core::physical_sphere;
    use bdm_core::rng::SimRng;

    fn default_box() -> BoundingBox {
        BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
    }

    fn setup_tip(ecm: &mut Ecm, rng: &mut SimRng) -> Entity {
        let soma = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, rng).unwrap();
        let cylinder =
            physical_sphere::add_new_physical_cylinder(&mut ecm.world, soma, 10.0, 0.0, std::f64::consts::FRAC_PI_2, 1.0, 0.0, 5.0).unwrap();
        let position = ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location;
        ecm.insert_into_triangulation(cylinder, position, rng).unwrap();
        cylinder
    }

    #[test]
    fn growth_cone_drifts_toward_gradient_peak() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(7);
        ecm.register_gradient(
            "A",
            ArtificialGradient::Bell(BellGradient { axis: 2, max_value: 1.0, mean: 400.0, sigma: 160.0 }),
        );
        let cylinder = setup_tip(&mut ecm, &mut rng);
        let mut module = ChemoAttractionModule::new(ChemoAttractionParams { bifurcation_probability: 0.0, ..Default::default() });

        let start_z = ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location.z;
        for _ in 0..200 {
            let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
            module.run(&mut ctx, cylinder, 0.1).unwrap();
        }
        let end_z = ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location.z;
        assert!(end_z > start_z);
    }

    #[test]
    fn non_terminal_cylinder_is_a_no_op() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(3);
        let cylinder = setup_tip(&mut ecm, &mut rng);
        physical_cylinder::bifurcate_cylinder(&mut ecm.world, cylinder, 5.0, 0.3, 1.0, 5.0).unwrap();
        let before = ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location;
        let mut module = ChemoAttractionModule::default();
        let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
        module.run(&mut ctx, cylinder, 0.1).unwrap();
        let after = ctx.ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location;
        assert_eq!(before, after);
    }
}
