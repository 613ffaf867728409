//! `Engine`: the per-tick driver. Runs a fixed five-phase order — physics,
//! discretization, intracellular diffusion, biological modules,
//! extracellular diffusion/degradation — over an `Ecm` rather than a bare
//! `World`.

use std::collections::HashMap;
use std::time::Instant;

use hecs::Entity;
use log::{debug, info, warn};

use crate::components::{CylinderState, ObjectCore, PhysicalBond, SphereState};
use crate::ecm::Ecm;
use crate::error::{SimError, SimResult};
use crate::force::{CylinderGeometry, DefaultForce, InterObjectForce, SphereGeometry};
use crate::module::{Behaviors, ModuleContext};
use crate::physical_cylinder;
use crate::physical_sphere;
use crate::rng::SimRng;
use crate::substance::UNIT_SUBSTANCE_ID;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_steps: u64,
    pub dt: f64,
    pub checkpoint_interval: u64,
    pub num_threads: Option<usize>,
    pub seed: u64,
    pub parallel_modules: bool,
    pub max_displacement: f64,
    pub wall_stiffness: f64,
    /// Early-exit thresholds below which extracellular and intracellular
    /// diffusion are skipped for a substance: an absolute concentration
    /// difference floor, and a floor on that difference relative to the
    /// larger of the two concentrations.
    pub intracellular_diffusion_min_concentration: f64,
    pub intracellular_diffusion_min_dc_over_c: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            dt: 0.01,
            checkpoint_interval: 100,
            num_threads: None,
            seed: 42,
            parallel_modules: false,
            max_displacement: 3.0,
            wall_stiffness: 1.0,
            intracellular_diffusion_min_concentration: 1e-6,
            intracellular_diffusion_min_dc_over_c: 1e-4,
        }
    }
}

/// The engine itself: an `Ecm` plus the per-cell-element `BiologicalModule`
/// sets and the fixed-order tick driver.
pub struct Engine {
    pub ecm: Ecm,
    config: EngineConfig,
    rng: SimRng,
    current_step: u64,
    current_time: f64,
}

impl Engine {
    pub fn new(ecm: Ecm, config: EngineConfig) -> Self {
        if let Some(num_threads) = config.num_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .unwrap_or_else(|_| warn!("failed to configure the rayon thread pool"));
        }
        info!("engine initialized with seed {}", config.seed);
        let seed = config.seed;
        Self { ecm, config, rng: SimRng::new(seed), current_step: 0, current_time: 0.0 }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Attach a set of biological modules to a cell element, as a `hecs`
    /// component.
    pub fn attach_behaviors(&mut self, cell_element: Entity, behaviors: Behaviors) -> SimResult<()> {
        self.ecm.world.insert_one(cell_element, behaviors).map_err(|_| SimError::EntityNotFound)
    }

    /// Advance one tick through the fixed phase order:
    /// physics -> discretization -> intracellular diffusion -> biological
    /// modules -> extracellular diffusion/degradation -> clock advance.
    pub fn step(&mut self) -> SimResult<()> {
        if self.current_step >= self.config.max_steps {
            return Ok(());
        }
        let dt = self.config.dt;

        self.run_physics_phase(dt)?;
        self.run_discretization_phase(dt)?;
        self.run_intracellular_diffusion_phase(dt)?;
        self.run_biological_modules_phase(dt)?;
        self.run_extracellular_phase(dt)?;

        self.current_step += 1;
        self.current_time += dt;
        if self.config.checkpoint_interval > 0 && self.current_step % self.config.checkpoint_interval == 0 {
            debug!("checkpoint at step {} (t = {})", self.current_step, self.current_time);
        }
        Ok(())
    }

    pub fn run(&mut self) -> SimResult<()> {
        info!("starting run: {} steps, dt = {}", self.config.max_steps, self.config.dt);
        let start = Instant::now();
        while self.current_step < self.config.max_steps {
            self.step()?;
        }
        info!("run completed in {:?}; final time {}", start.elapsed(), self.current_time);
        Ok(())
    }

    /// Phase 1: for every active sphere/cylinder, sum
    /// forces, integrate the point mass, then push the new position through
    /// the triangulation so C's mass-conservation hooks fire.
    fn run_physics_phase(&mut self, dt: f64) -> SimResult<()> {
        let force_policy = DefaultForce::default();

        let spheres: Vec<Entity> = self.ecm.world.query::<&SphereState>().iter().map(|(e, _)| e).collect();
        for sphere in spheres {
            if !self.ecm.world.get::<&ObjectCore>(sphere).map(|c| c.on_scheduler).unwrap_or(false) {
                continue;
            }
            let neighbor_spheres = self.neighbor_sphere_geometries(sphere);
            let wall_force = self.wall_force_for(sphere);
            let bond_force = crate::physical_object::total_bond_force(&self.ecm.world, sphere, crate::geometry::Vec3::ZERO);
            let displacement = physical_sphere::run_physics(
                &mut self.ecm.world,
                sphere,
                crate::geometry::Vec3::ZERO,
                &neighbor_spheres,
                wall_force,
                bond_force,
                dt,
                self.config.max_displacement,
            )?;
            if displacement.norm() > 1e-12 {
                let new_position = self.ecm.world.get::<&ObjectCore>(sphere).unwrap().mass_location;
                self.ecm.move_site(sphere, new_position, &mut self.rng)?;
            }
        }

        let cylinders: Vec<Entity> = self.ecm.world.query::<&CylinderState>().iter().map(|(e, _)| e).collect();

        // Pass 1: evaluate every cylinder's neighbor avoidance force and
        // split it distal/proximal via each pairwise result's
        // `proximal_share`, writing the proximal share into the cylinder's
        // `force_to_transmit_to_proximal_mass` so the mother reads it back
        // through `force_to_mother`. Done as its own pass so every
        // cylinder's split is settled before any displacement runs.
        let mut distal_forces: HashMap<Entity, crate::geometry::Vec3> = HashMap::new();
        for &cylinder in &cylinders {
            if !self.ecm.world.get::<&ObjectCore>(cylinder).map(|c| c.on_scheduler).unwrap_or(false) {
                continue;
            }
            let (distal, proximal) = self.neighbor_cylinder_force(cylinder, &force_policy);
            if let Ok(mut state) = self.ecm.world.get::<&mut CylinderState>(cylinder) {
                state.force_to_transmit_to_proximal_mass = proximal;
            }
            distal_forces.insert(cylinder, distal);
        }

        for cylinder in cylinders {
            if !self.ecm.world.get::<&ObjectCore>(cylinder).map(|c| c.on_scheduler).unwrap_or(false) {
                continue;
            }
            let neighbor_force = distal_forces.get(&cylinder).copied().unwrap_or(crate::geometry::Vec3::ZERO);
            let wall_force = self.wall_force_for(cylinder);
            let bond_force = crate::physical_object::total_bond_force(&self.ecm.world, cylinder, crate::geometry::Vec3::ZERO);
            let displacement = physical_cylinder::run_physics(
                &mut self.ecm.world,
                cylinder,
                neighbor_force,
                wall_force,
                bond_force,
                dt,
                self.config.max_displacement,
            )?;
            if displacement.norm() > 1e-12 {
                let new_position = self.ecm.world.get::<&ObjectCore>(cylinder).unwrap().mass_location;
                self.ecm.move_site(cylinder, new_position, &mut self.rng)?;
            }
            self.update_sliding_bonds(cylinder);
        }
        Ok(())
    }

    /// After a cylinder moves, keep any sliding bond's contact point
    /// current and migrate it to the neighboring cylinder (mother, then
    /// `daughter_left`) once it slides outside `[0, actual_length]`.
    fn update_sliding_bonds(&mut self, cylinder: Entity) {
        let Ok(core) = self.ecm.world.get::<&ObjectCore>(cylinder) else { return };
        let bonds = core.bonds.clone();
        drop(core);
        for bond in bonds {
            let _ = crate::physical_object::update_sliding_bond(&mut self.ecm.world, bond);
        }
    }

    /// True when `neighbor` is already mechanically coupled to `sphere` —
    /// one of its attached daughter cylinders, or the far endpoint of a
    /// `PhysicalBond` — and so must be excluded from avoidance force: a
    /// spring-connected, always-adjacent pair would otherwise fight its
    /// own spring.
    fn sphere_is_related_or_bonded(&self, sphere: Entity, neighbor: Entity) -> bool {
        if neighbor == sphere {
            return true;
        }
        if let Ok(state) = self.ecm.world.get::<&SphereState>(sphere) {
            if state.daughters.contains(&neighbor) {
                return true;
            }
        }
        self.is_bonded_peer(sphere, neighbor)
    }

    /// True when `neighbor` is already mechanically coupled to `cylinder`
    /// — its mother, a daughter, a sibling through the same mother, or the
    /// far endpoint of a `PhysicalBond`.
    fn is_related_or_bonded(&self, cylinder: Entity, neighbor: Entity) -> bool {
        if neighbor == cylinder {
            return true;
        }
        if let Ok(state) = self.ecm.world.get::<&CylinderState>(cylinder) {
            if state.mother == neighbor || state.daughter_left == Some(neighbor) || state.daughter_right == Some(neighbor) {
                return true;
            }
            if let Ok(neighbor_state) = self.ecm.world.get::<&CylinderState>(neighbor) {
                if neighbor_state.mother == state.mother {
                    return true;
                }
            }
        }
        self.is_bonded_peer(cylinder, neighbor)
    }

    fn is_bonded_peer(&self, entity: Entity, neighbor: Entity) -> bool {
        let Ok(core) = self.ecm.world.get::<&ObjectCore>(entity) else { return false };
        core.bonds.iter().any(|&bond| {
            self.ecm.world.get::<&PhysicalBond>(bond).map(|b| b.other(entity) == Some(neighbor)).unwrap_or(false)
        })
    }

    fn neighbor_sphere_geometries(&self, sphere: Entity) -> Vec<(crate::geometry::Vec3, f64)> {
        let Ok(record) = self.ecm.world.get::<&crate::node::NodeRecord>(sphere) else { return Vec::new() };
        let Some(id) = record.space_node else { return Vec::new() };
        drop(record);
        self.ecm
            .triangulation
            .neighbors(id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|n| self.ecm.entity_of(n))
            .filter(|&e| !self.sphere_is_related_or_bonded(sphere, e))
            .filter_map(|e| self.ecm.world.get::<&ObjectCore>(e).ok().map(|c| (c.mass_location, c.diameter * 0.5)))
            .collect()
    }

    /// Sum avoidance force over triangulation neighbors that aren't a
    /// mechanical relative or bond peer, splitting each pairwise result
    /// into a distal share (returned as the first element, applied to the
    /// cylinder's own mass) and a proximal share (the second element, to
    /// be read back by the mother via `force_to_mother`).
    fn neighbor_cylinder_force(&self, cylinder: Entity, force_policy: &DefaultForce) -> (crate::geometry::Vec3, crate::geometry::Vec3) {
        let zero = (crate::geometry::Vec3::ZERO, crate::geometry::Vec3::ZERO);
        let Ok(state) = self.ecm.world.get::<&CylinderState>(cylinder) else { return zero };
        let Ok(core) = self.ecm.world.get::<&ObjectCore>(cylinder) else { return zero };
        let proximal = core.mass_location - state.spring_axis;
        let distal = core.mass_location;
        let radius = core.diameter * 0.5;
        let geometry = CylinderGeometry { proximal, distal, radius };
        drop(state);
        drop(core);

        let Ok(record) = self.ecm.world.get::<&crate::node::NodeRecord>(cylinder) else { return zero };
        let Some(id) = record.space_node else { return zero };
        drop(record);

        let mut distal_total = crate::geometry::Vec3::ZERO;
        let mut proximal_total = crate::geometry::Vec3::ZERO;
        for neighbor_id in self.ecm.triangulation.neighbors(id).unwrap_or_default() {
            let Some(neighbor) = self.ecm.entity_of(neighbor_id) else { continue };
            if self.is_related_or_bonded(cylinder, neighbor) {
                continue;
            }
            let result = if let Ok(neighbor_state) = self.ecm.world.get::<&CylinderState>(neighbor) {
                let Ok(neighbor_core) = self.ecm.world.get::<&ObjectCore>(neighbor) else { continue };
                let other = CylinderGeometry {
                    proximal: neighbor_core.mass_location - neighbor_state.spring_axis,
                    distal: neighbor_core.mass_location,
                    radius: neighbor_core.diameter * 0.5,
                };
                force_policy.cylinder_cylinder(geometry, other)
            } else if let Ok(neighbor_core) = self.ecm.world.get::<&ObjectCore>(neighbor) {
                let other = SphereGeometry { center: neighbor_core.mass_location, radius: neighbor_core.diameter * 0.5 };
                force_policy.cylinder_sphere(geometry, other)
            } else {
                continue;
            };
            proximal_total += result.force * result.proximal_share;
            distal_total += result.force * (1.0 - result.proximal_share);
        }
        (distal_total, proximal_total)
    }

    fn wall_force_for(&self, entity: Entity) -> crate::geometry::Vec3 {
        if !self.config_walls_enabled() {
            return crate::geometry::Vec3::ZERO;
        }
        let Ok(core) = self.ecm.world.get::<&ObjectCore>(entity) else { return crate::geometry::Vec3::ZERO };
        self.ecm.force_from_artificial_wall(core.mass_location, core.diameter * 0.5, self.config.wall_stiffness)
    }

    fn config_walls_enabled(&self) -> bool {
        self.ecm.artificial_walls_for_spheres || self.ecm.artificial_walls_for_cylinders
    }

    /// Phase 2: keep every cylinder's
    /// length within `[L_min, L_max]` via split/merge.
    fn run_discretization_phase(&mut self, _dt: f64) -> SimResult<()> {
        let cylinders: Vec<Entity> = self.ecm.world.query::<&CylinderState>().iter().map(|(e, _)| e).collect();
        for cylinder in cylinders {
            if self.ecm.world.get::<&CylinderState>(cylinder).is_err() {
                continue; // despawned by an earlier merge this phase
            }
            if let Some(new_entity) = physical_cylinder::run_discretization(
                &mut self.ecm.world,
                cylinder,
                physical_cylinder::DEFAULT_LENGTH_MIN,
                physical_cylinder::DEFAULT_LENGTH_MAX,
            )? {
                let position = self.ecm.world.get::<&ObjectCore>(new_entity).unwrap().mass_location;
                self.ecm.insert_into_triangulation(new_entity, position, &mut self.rng)?;
            }
        }
        Ok(())
    }

    /// Phase 3: intracellular diffusion along the tree,
    /// sphere-to-daughter in randomized order.
    fn run_intracellular_diffusion_phase(&mut self, dt: f64) -> SimResult<()> {
        let spheres: Vec<Entity> = self.ecm.world.query::<&SphereState>().iter().map(|(e, _)| e).collect();
        for sphere in spheres {
            let mut sub_rng = self.rng.sub_stream(sphere.to_bits().get());
            physical_sphere::run_intracellular_diffusion(
                &mut self.ecm.world,
                sphere,
                dt,
                self.config.intracellular_diffusion_min_concentration,
                self.config.intracellular_diffusion_min_dc_over_c,
                &mut sub_rng,
            )?;
        }
        Ok(())
    }

    /// Phase 4: run every cell element's attached
    /// `BiologicalModule` set. Each entity's `Behaviors` is removed from
    /// the world for the duration of the call so modules can mutate the
    /// `Ecm` (spawn daughters, grow, diffuse) without a double-borrow of
    /// `self.ecm.world`, then reinserted.
    fn run_biological_modules_phase(&mut self, dt: f64) -> SimResult<()> {
        let entities: Vec<Entity> = self.ecm.world.query::<&Behaviors>().iter().map(|(e, _)| e).collect();
        for entity in entities {
            let Ok(mut behaviors) = self.ecm.world.remove_one::<Behaviors>(entity) else { continue };
            let mut ctx = ModuleContext { ecm: &mut self.ecm, rng: &mut self.rng };
            let result = behaviors.run_all(&mut ctx, entity, dt);
            if self.ecm.world.contains(entity) {
                let _ = self.ecm.world.insert_one(entity, behaviors);
            }
            result?;
        }
        Ok(())
    }

    /// Phase 5: extracellular degradation per node, plus
    /// early-exit-gated diffusion between the engine's own `PhysicalNode`
    /// neighbors (distinct from the tree-structured intracellular pass).
    fn run_extracellular_phase(&mut self, dt: f64) -> SimResult<()> {
        let nodes: Vec<Entity> = self.ecm.world.query::<&crate::node::NodeRecord>().iter().map(|(e, _)| e).collect();
        for entity in &nodes {
            if let Ok(mut record) = self.ecm.world.get::<&mut crate::node::NodeRecord>(*entity) {
                let space_node = record.space_node;
                let volume = space_node.and_then(|id| self.ecm.triangulation.node(id)).map(|n| n.volume).unwrap_or(1.0);
                for (id, substance) in record.extracellular.iter_mut() {
                    if id == UNIT_SUBSTANCE_ID {
                        continue;
                    }
                    substance.degrade(dt, volume.max(1e-9));
                }
            }
        }

        for entity in nodes {
            let Ok(record) = self.ecm.world.get::<&crate::node::NodeRecord>(entity) else { continue };
            let Some(id) = record.space_node else { continue };
            let ids: Vec<String> = record.extracellular.keys().cloned().collect();
            drop(record);
            let Some(neighbors) = self.ecm.triangulation.neighbors(id) else { continue };
            for neighbor_id in neighbors {
                if neighbor_id <= id {
                    continue; // avoid diffusing each undirected pair twice
                }
                let Some(neighbor_entity) = self.ecm.entity_of(neighbor_id) else { continue };
                let distance = {
                    let Some(a) = self.ecm.triangulation.node(id) else { continue };
                    let Some(b) = self.ecm.triangulation.node(neighbor_id) else { continue };
                    a.position.distance(b.position)
                };
                for sub_id in &ids {
                    if sub_id == UNIT_SUBSTANCE_ID {
                        continue;
                    }
                    self.diffuse_extracellular_pair(entity, neighbor_entity, id, neighbor_id, sub_id, distance, dt)?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn diffuse_extracellular_pair(
        &mut self,
        a_entity: Entity,
        b_entity: Entity,
        a_id: crate::triangulation::SpaceNodeId,
        b_id: crate::triangulation::SpaceNodeId,
        substance: &str,
        distance: f64,
        dt: f64,
    ) -> SimResult<()> {
        let (d, q_a, c_a) = {
            let Ok(record) = self.ecm.world.get::<&crate::node::NodeRecord>(a_entity) else { return Ok(()) };
            let Some(s) = record.extracellular.get(substance) else { return Ok(()) };
            if s.concentration < self.config.intracellular_diffusion_min_concentration {
                return Ok(());
            }
            (s.diffusion_constant, s.quantity, s.concentration)
        };
        let _ = c_a;
        let v_a = self.ecm.triangulation.node(a_id).map(|n| n.volume.max(1e-9)).unwrap_or(1.0);
        let v_b = self.ecm.triangulation.node(b_id).map(|n| n.volume.max(1e-9)).unwrap_or(1.0);
        let q_b = self
            .ecm
            .world
            .get::<&crate::node::NodeRecord>(b_entity)
            .ok()
            .and_then(|r| r.extracellular.get(substance).map(|s| s.quantity))
            .unwrap_or(0.0);

        let (new_q_a, new_q_b) = crate::substance::diffuse_two_reservoirs(d, distance, v_a, v_b, q_a, q_b, dt);

        if let Ok(mut record) = self.ecm.world.get::<&mut crate::node::NodeRecord>(a_entity) {
            record.set_extracellular_concentration(substance, new_q_a.max(0.0) / v_a, v_a);
        }
        if let Ok(mut record) = self.ecm.world.get::<&mut crate::node::NodeRecord>(b_entity) {
            record.set_extracellular_concentration(substance, new_q_b.max(0.0) / v_b, v_b);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Color;
    use crate::ecm::BoundingBox;
    use crate::geometry::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn default_box() -> BoundingBox {
        BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
    }

    #[test]
    fn single_sphere_step_does_not_panic() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let mut engine = Engine::new(ecm, EngineConfig { max_steps: 5, ..Default::default() });
        engine.run().unwrap();
        assert_eq!(engine.current_step(), 5);
    }
}
