//! `GrowthDivisionModule`: the soma growth/division rule body for the
//! "DividingCell" and "DividingModule" scenarios — grow the sphere's volume
//! at a fixed rate until its diameter crosses a threshold, then divide it
//! in two, each daughter carrying a fresh copy of this module.

use bdm_core::components::{Color, ObjectCore};
use bdm_core::error::{SimError, SimResult};
use bdm_core::module::{BiologicalModule, ModuleContext};
use bdm_core::physical_sphere;
use hecs::Entity;
use log::debug;
use rand::Rng;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct GrowthDivisionParams {
    /// Volume added per unit time while below `division_diameter`
    /// (350 \u{b5}m^3/h for a freely growing cell, 300 for one paired with
    /// a division threshold).
    pub growth_speed: f64,
    /// Diameter threshold past which the cell divides instead of growing.
    pub division_diameter: f64,
    /// `r2^3 / r1^3` ratio passed to `PhysicalSphere::divide`.
    pub volume_ratio: f64,
}

impl Default for GrowthDivisionParams {
    fn default() -> Self {
        Self { growth_speed: 350.0, division_diameter: 20.0, volume_ratio: 1.0 }
    }
}

pub struct GrowthDivisionModule {
    params: GrowthDivisionParams,
    cell: Option<Entity>,
    divisions: u32,
}

impl GrowthDivisionModule {
    pub fn new(params: GrowthDivisionParams) -> Self {
        Self { params, cell: None, divisions: 0 }
    }

    pub fn divisions(&self) -> u32 {
        self.divisions
    }
}

impl Default for GrowthDivisionModule {
    fn default() -> Self {
        Self::new(GrowthDivisionParams::default())
    }
}

impl BiologicalModule for GrowthDivisionModule {
    fn name(&self) -> &str {
        "growth_division_module"
    }

    fn run(&mut self, ctx: &mut ModuleContext, cell_element: Entity, dt: f64) -> SimResult<()> {
        let diameter = ctx
            .ecm
            .world
            .get::<&ObjectCore>(cell_element)
            .map(|c| c.diameter)
            .map_err(|_| SimError::EntityNotFound)?;

        if diameter < self.params.division_diameter {
            physical_sphere::change_volume(&mut ctx.ecm.world, cell_element, self.params.growth_speed, dt)?;
            return Ok(());
        }

        let phi = ctx.rng.gen_range(0.0..std::f64::consts::TAU);
        let theta = ctx.rng.gen_range(0.0..std::f64::consts::PI);
        let daughter = physical_sphere::divide(&mut ctx.ecm.world, cell_element, self.params.volume_ratio, phi, theta)?;

        let original_position =
            ctx.ecm.world.get::<&ObjectCore>(cell_element).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)?;
        let daughter_position =
            ctx.ecm.world.get::<&ObjectCore>(daughter).map(|c| c.mass_location).map_err(|_| SimError::EntityNotFound)?;
        ctx.ecm.move_site(cell_element, original_position, ctx.rng)?;
        ctx.ecm.insert_into_triangulation(daughter, daughter_position, ctx.rng)?;
        let color = ctx.ecm.world.get::<&ObjectCore>(cell_element).map(|c| c.color).unwrap_or(Color::WHITE);
        if let Ok(mut core) = ctx.ecm.world.get::<&mut ObjectCore>(daughter) {
            core.color = color;
        }

        let mut daughter_behaviors = bdm_core::module::Behaviors::new();
        daughter_behaviors.push(self.get_copy());
        let _ = ctx.ecm.world.insert_one(daughter, daughter_behaviors);

        self.divisions += 1;
        debug!("cell {:?} divided into {:?} (total divisions so far: {})", cell_element, daughter, self.divisions);
        Ok(())
    }

    fn is_copied_when_soma_divides(&self) -> bool {
        true
    }

    fn get_copy(&self) -> Box<dyn BiologicalModule> {
        Box::new(GrowthDivisionModule::new(self.params))
    }

    fn set_cell_element(&mut self, cell_element: Entity) {
        self.cell = Some(cell_element);
    }

    fn get_cell_element(&self) -> Option<Entity> {
        self.cell
    }

    fn get_params(&self) -> Value {
        json!({
            "growth_speed": self.params.growth_speed,
            "division_diameter": self.params.division_diameter,
            "volume_ratio": self.params.volume_ratio,
            "divisions": self.divisions,
        })
    }

    fn set_params(&mut self, params: &Value) -> SimResult<()> {
        if let Some(v) = params.get("growth_speed").and_then(|v| v.as_f64()) {
            self.params.growth_speed = v;
        }
        if let Some(v) = params.get("division_diameter").and_then(|v| v.as_f64()) {
            self.params.division_diameter = v;
        }
        if let Some(v) = params.get("volume_ratio").and_then(|v| v.as_f64()) {
            self.params.volume_ratio = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdm_core::ecm::{BoundingBox, Ecm};
    use bdm_core::geometry::Vec3;
    use bdm_core::rng::SimRng;

    fn default_box() -> BoundingBox {
        BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
    }

    #[test]
    fn grows_below_threshold() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(1);
        let sphere = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let mut module = GrowthDivisionModule::default();
        let before = ecm.world.get::<&ObjectCore>(sphere).unwrap().diameter;
        {
            let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
            module.run(&mut ctx, sphere, 1.0).unwrap();
        }
        let after = ecm.world.get::<&ObjectCore>(sphere).unwrap().diameter;
        assert!(after > before);
        assert_eq!(module.divisions(), 0);
    }

    #[test]
    fn divides_above_threshold() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(2);
        let sphere = ecm.register_sphere(Vec3::ZERO, 25.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let mut module = GrowthDivisionModule::default();
        {
            let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
            module.run(&mut ctx, sphere, 1.0).unwrap();
        }
        assert_eq!(module.divisions(), 1);
        assert_eq!(ecm.node_count(), 2);
    }
}
