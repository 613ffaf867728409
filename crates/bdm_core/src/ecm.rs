//! `Ecm`: the process-wide registry of physical objects,
//! the triangulation, the substance template library, and the artificial
//! field/wall configuration. Owns a `hecs::World` and mediates every
//! mutation, since it also owns a `Triangulation` and must keep the two
//! in lockstep via the movement
//! listener protocol.

use std::collections::HashMap;

use hecs::{Entity, World};
use rand::Rng;

use crate::components::{Color, CylinderState, ObjectCore, SphereState};
use crate::error::{SimError, SimResult};
use crate::geometry::Vec3;
use crate::node::NodeRecord;
use crate::substance::{IntracellularSubstance, Substance};
use crate::triangulation::{MassConservationListener, SpaceNodeId, SubstanceStore, Triangulation};

/// Gaussian bell profile along one axis.
#[derive(Debug, Clone, Copy)]
pub struct BellGradient {
    pub axis: usize,
    pub max_value: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl BellGradient {
    fn value_at(&self, p: Vec3) -> f64 {
        let x = p[self.axis];
        let d = x - self.mean;
        self.max_value * (-0.5 * (d / self.sigma).powi(2)).exp()
    }

    fn gradient_at(&self, p: Vec3) -> Vec3 {
        let x = p[self.axis];
        let d = x - self.mean;
        let dv = -d / self.sigma.powi(2) * self.value_at(p);
        let mut g = Vec3::ZERO;
        match self.axis {
            0 => g.x = dv,
            1 => g.y = dv,
            _ => g.z = dv,
        }
        g
    }
}

/// Piecewise-linear profile along one axis.
#[derive(Debug, Clone)]
pub struct LinearGradient {
    pub axis: usize,
    /// Sorted `(position, value)` breakpoints.
    pub breakpoints: Vec<(f64, f64)>,
}

impl LinearGradient {
    fn value_at(&self, p: Vec3) -> f64 {
        let x = p[self.axis];
        if self.breakpoints.is_empty() {
            return 0.0;
        }
        if x <= self.breakpoints[0].0 {
            return self.breakpoints[0].1;
        }
        for w in self.breakpoints.windows(2) {
            let (x0, v0) = w[0];
            let (x1, v1) = w[1];
            if x >= x0 && x <= x1 {
                let t = if (x1 - x0).abs() > 1e-12 { (x - x0) / (x1 - x0) } else { 0.0 };
                return v0 + (v1 - v0) * t;
            }
        }
        self.breakpoints.last().unwrap().1
    }

    fn gradient_at(&self, p: Vec3) -> Vec3 {
        let x = p[self.axis];
        let mut g = Vec3::ZERO;
        let slope = self
            .breakpoints
            .windows(2)
            .find(|w| x >= w[0].0 && x <= w[1].0)
            .map(|w| (w[1].1 - w[0].1) / (w[1].0 - w[0].0).max(1e-12))
            .unwrap_or(0.0);
        match self.axis {
            0 => g.x = slope,
            1 => g.y = slope,
            _ => g.z = slope,
        }
        g
    }
}

#[derive(Debug, Clone)]
pub enum ArtificialGradient {
    Bell(BellGradient),
    Linear(LinearGradient),
}

impl ArtificialGradient {
    fn value_at(&self, p: Vec3) -> f64 {
        match self {
            ArtificialGradient::Bell(b) => b.value_at(p),
            ArtificialGradient::Linear(l) => l.value_at(p),
        }
    }

    fn gradient_at(&self, p: Vec3) -> Vec3 {
        match self {
            ArtificialGradient::Bell(b) => b.gradient_at(p),
            ArtificialGradient::Linear(l) => l.gradient_at(p),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y && p.z >= self.min.z && p.z <= self.max.z
    }
}

/// Bridges `Triangulation`'s `SubstanceStore` contract to `ObjectCore`'s
/// extracellular-visible intracellular substances plus bare `NodeRecord`
/// sites, so the movement listener can be driven without the triangulation
/// module depending on `hecs` (see `triangulation::listener`).
struct WorldSubstanceStore<'a> {
    world: &'a mut World,
    node_entities: &'a HashMap<SpaceNodeId, Entity>,
}

impl<'a> SubstanceStore for WorldSubstanceStore<'a> {
    fn substance_ids(&self, node: SpaceNodeId) -> Vec<String> {
        let Some(&entity) = self.node_entities.get(&node) else { return Vec::new() };
        self.world.get::<&NodeRecord>(entity).map(|r| r.extracellular.keys().cloned().collect()).unwrap_or_default()
    }

    fn concentration(&self, node: SpaceNodeId, substance: &str) -> f64 {
        let Some(&entity) = self.node_entities.get(&node) else { return 0.0 };
        self.world.get::<&NodeRecord>(entity).map(|r| r.extracellular_concentration(substance)).unwrap_or(0.0)
    }

    fn set_concentration(&mut self, node: SpaceNodeId, substance: &str, concentration: f64, volume: f64) {
        if let Some(&entity) = self.node_entities.get(&node) {
            if let Ok(mut record) = self.world.get::<&mut NodeRecord>(entity) {
                record.set_extracellular_concentration(substance, concentration, volume);
            }
        }
    }
}

/// The process-wide registry. Single-threaded owner: callers
/// wrap it in a `Mutex`/`RwLock` when sharing across worker threads.
pub struct Ecm {
    pub world: World,
    pub triangulation: Triangulation,
    node_entities: HashMap<SpaceNodeId, Entity>,
    listener: MassConservationListener,
    pub time: f64,
    pub bounding_box: BoundingBox,
    pub artificial_walls_for_spheres: bool,
    pub artificial_walls_for_cylinders: bool,
    substance_templates: HashMap<String, Substance>,
    intracellular_templates: HashMap<String, IntracellularSubstance>,
    gradients: HashMap<String, ArtificialGradient>,
}

impl Ecm {
    pub fn new(characteristic_length: f64, bounding_box: BoundingBox) -> Self {
        Self {
            world: World::new(),
            triangulation: Triangulation::new(characteristic_length),
            node_entities: HashMap::new(),
            listener: MassConservationListener::default(),
            time: 0.0,
            bounding_box,
            artificial_walls_for_spheres: false,
            artificial_walls_for_cylinders: false,
            substance_templates: HashMap::new(),
            intracellular_templates: HashMap::new(),
            gradients: HashMap::new(),
        }
    }

    /// Explicit teardown: drops every registered
    /// object and resets the triangulation and clock.
    pub fn clear_all(&mut self, characteristic_length: f64) {
        self.world = World::new();
        self.triangulation = Triangulation::new(characteristic_length);
        self.node_entities.clear();
        self.listener = MassConservationListener::default();
        self.time = 0.0;
    }

    pub fn register_substance_template(&mut self, substance: Substance) {
        self.substance_templates.insert(substance.id.clone(), substance);
    }

    pub fn register_intracellular_template(&mut self, substance: IntracellularSubstance) {
        self.intracellular_templates.insert(substance.id().to_string(), substance);
    }

    pub fn register_gradient(&mut self, id: impl Into<String>, gradient: ArtificialGradient) {
        self.gradients.insert(id.into(), gradient);
    }

    pub fn get_value_artificial_concentration(&self, id: &str, p: Vec3) -> f64 {
        self.gradients.get(id).map(|g| g.value_at(p)).unwrap_or(0.0)
    }

    pub fn get_gradient_artificial_concentration(&self, id: &str, p: Vec3) -> Vec3 {
        self.gradients.get(id).map(|g| g.gradient_at(p)).unwrap_or(Vec3::ZERO)
    }

    /// Linear restoring force proportional to out-of-box displacement per
    /// axis.
    pub fn force_from_artificial_wall(&self, p: Vec3, radius: f64, stiffness: f64) -> Vec3 {
        let mut force = Vec3::ZERO;
        let axes = [
            (p.x, self.bounding_box.min.x, self.bounding_box.max.x),
            (p.y, self.bounding_box.min.y, self.bounding_box.max.y),
            (p.z, self.bounding_box.min.z, self.bounding_box.max.z),
        ];
        let mut out = [0.0; 3];
        for (i, &(coord, lo, hi)) in axes.iter().enumerate() {
            if coord - radius < lo {
                out[i] = (lo + radius) - coord;
            } else if coord + radius > hi {
                out[i] = (hi - radius) - coord;
            }
        }
        force.x = stiffness * out[0];
        force.y = stiffness * out[1];
        force.z = stiffness * out[2];
        force
    }

    /// `create_physical_node_instance`: a bare triangulation
    /// site with no `ObjectCore`, used to seed/stabilize the mesh.
    pub fn create_physical_node_instance(&mut self, position: Vec3, rng: &mut impl Rng) -> SimResult<Entity> {
        let entity = self.world.spawn((NodeRecord::default(),));
        self.insert_into_triangulation(entity, position, rng)?;
        Ok(entity)
    }

    /// Inserts `entity` (already spawned, already carrying a `NodeRecord`)
    /// into the triangulation, driving the before/after-add listener hooks
    /// in the documented order.
    pub fn insert_into_triangulation(&mut self, entity: Entity, position: Vec3, rng: &mut impl Rng) -> SimResult<SpaceNodeId> {
        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.before_add(&self.triangulation, &mut store, SpaceNodeId::default(), position);
        }
        let id = self.triangulation.insert(position, entity, rng)?;
        self.node_entities.insert(id, entity);
        if let Ok(mut record) = self.world.get::<&mut NodeRecord>(entity) {
            record.space_node = Some(id);
        }
        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.after_add(&self.triangulation, &mut store, id);
        }
        Ok(id)
    }

    /// Moves `entity`'s triangulation site to `new_position`, driving the
    /// before/after-move listener hooks.
    pub fn move_site(&mut self, entity: Entity, new_position: Vec3, rng: &mut impl Rng) -> SimResult<()> {
        let id = self
            .world
            .get::<&NodeRecord>(entity)
            .map_err(|_| SimError::EntityNotFound)?
            .space_node
            .ok_or(SimError::InvariantViolation("entity has no triangulation site".into()))?;

        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.before_move(&self.triangulation, &mut store, id, new_position);
        }
        let old_neighbors = self.triangulation.move_node(id, new_position, rng)?;
        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.after_move(&self.triangulation, &mut store, id, &old_neighbors);
        }
        Ok(())
    }

    /// Removes `entity`'s triangulation site, driving the before/after-
    /// remove listener hooks, then despawns the entity itself.
    pub fn remove_site(&mut self, entity: Entity) -> SimResult<()> {
        let id = self
            .world
            .get::<&NodeRecord>(entity)
            .map_err(|_| SimError::EntityNotFound)?
            .space_node
            .ok_or(SimError::InvariantViolation("entity has no triangulation site".into()))?;

        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.before_remove(&self.triangulation, &mut store, id);
        }
        let absorbing_neighbors = self.triangulation.remove(id)?;
        self.node_entities.remove(&id);
        {
            let mut store = WorldSubstanceStore { world: &mut self.world, node_entities: &self.node_entities };
            self.listener.after_remove(&self.triangulation, &mut store, id, &absorbing_neighbors);
        }
        self.world.despawn(entity).map_err(|_| SimError::EntityNotFound)?;
        Ok(())
    }

    /// `create_physical_sphere_instance`: convenience registering a fresh
    /// sphere both as a `PhysicalObject` and as a `PhysicalNode` — every
    /// sphere or cylinder added to the `Ecm` is also given a triangulation
    /// site.
    pub fn register_sphere(&mut self, position: Vec3, diameter: f64, mass: f64, adherence: f64, color: Color, rng: &mut impl Rng) -> SimResult<Entity> {
        let entity = crate::physical_sphere::spawn(&mut self.world, position, diameter, mass, adherence);
        if let Ok(mut core) = self.world.get::<&mut ObjectCore>(entity) {
            core.color = color;
        }
        self.insert_into_triangulation(entity, position, rng)?;
        Ok(entity)
    }

    pub fn substance_instance(&self, id: &str) -> Substance {
        self.substance_templates.get(id).cloned().unwrap_or_else(|| Substance::new(id))
    }

    pub fn intracellular_substance_instance(&self, id: &str) -> IntracellularSubstance {
        self.intracellular_templates.get(id).cloned().unwrap_or_else(|| IntracellularSubstance::new(id))
    }

    pub fn entity_of(&self, node: SpaceNodeId) -> Option<Entity> {
        self.node_entities.get(&node).copied()
    }

    pub fn node_count(&self) -> usize {
        self.triangulation.node_count()
    }

    /// Apply `f` to every sphere's core and state. This is the entry point an
    /// external scheduler uses to drive per-object work without reaching into
    /// the `hecs::World` directly.
    pub fn for_each_sphere(&mut self, mut apply: impl FnMut(Entity, &mut ObjectCore, &mut SphereState)) {
        for (entity, (core, state)) in self.world.query_mut::<(&mut ObjectCore, &mut SphereState)>() {
            apply(entity, core, state);
        }
    }

    /// Apply `f` to every cylinder's core and state.
    pub fn for_each_cylinder(&mut self, mut apply: impl FnMut(Entity, &mut ObjectCore, &mut CylinderState)) {
        for (entity, (core, state)) in self.world.query_mut::<(&mut ObjectCore, &mut CylinderState)>() {
            apply(entity, core, state);
        }
    }

    /// Apply `f` to every `PhysicalNode` (the triangulation-side record shared
    /// by every sphere and cylinder).
    pub fn for_each_node(&mut self, mut apply: impl FnMut(Entity, &mut NodeRecord)) {
        for (entity, node) in self.world.query_mut::<&mut NodeRecord>() {
            apply(entity, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn default_box() -> BoundingBox {
        BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
    }

    #[test]
    fn bell_gradient_peaks_at_mean() {
        let g = BellGradient { axis: 2, max_value: 1.0, mean: 400.0, sigma: 160.0 };
        assert!((g.value_at(Vec3::new(0.0, 0.0, 400.0)) - 1.0).abs() < 1e-9);
        assert!(g.value_at(Vec3::new(0.0, 0.0, 400.0)) > g.value_at(Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn create_physical_node_instance_inserts_into_triangulation() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        ecm.create_physical_node_instance(Vec3::new(1.0, 2.0, 3.0), &mut rng).unwrap();
        assert_eq!(ecm.node_count(), 1);
    }

    #[test]
    fn wall_force_pushes_inward_when_outside() {
        let ecm = Ecm::new(100.0, default_box());
        let f = ecm.force_from_artificial_wall(Vec3::new(600.0, 0.0, 0.0), 1.0, 1.0);
        assert!(f.x < 0.0);
    }

    #[test]
    fn register_sphere_is_both_object_and_node() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let e = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        assert!(ecm.world.get::<&ObjectCore>(e).is_ok());
        assert!(ecm.world.get::<&NodeRecord>(e).unwrap().space_node.is_some());
    }

    #[test]
    fn for_each_sphere_visits_every_registered_sphere() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        ecm.register_sphere(Vec3::new(0.0, 0.0, 0.0), 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        ecm.register_sphere(Vec3::new(20.0, 0.0, 0.0), 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();

        let mut visited = 0;
        ecm.for_each_sphere(|_, _, state| {
            state.rotational_inertia += 1.0;
            visited += 1;
        });
        assert_eq!(visited, 2);
        for (_, state) in ecm.world.query::<&crate::components::SphereState>().iter() {
            assert_eq!(state.rotational_inertia, 1.0);
        }
    }

    #[test]
    fn for_each_node_visits_every_node() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        ecm.create_physical_node_instance(Vec3::new(5.0, 5.0, 5.0), &mut rng).unwrap();

        let mut visited = 0;
        ecm.for_each_node(|_, _| visited += 1);
        assert_eq!(visited, 2);
    }
}
