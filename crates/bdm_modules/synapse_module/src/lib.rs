//! `SynapseFormationModule`: the rule body for the "SimpleSynapse" and
//! "SmallNetwork" scenarios — an entity carrying one unpaired
//! excrescence scans its triangulation neighbors for an opposite-kind
//! unpaired excrescence within capture range and, if found, pairs the two
//! into a synapse.

use bdm_core::components::{Excrescence, ExcrescenceKind, ObjectCore};
use bdm_core::error::{SimError, SimResult};
use bdm_core::module::{BiologicalModule, ModuleContext};
use bdm_core::node::NodeRecord;
use bdm_core::physical_object::synapse_with;
use hecs::Entity;
use log::debug;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct SynapseFormationParams {
    pub kind: ExcrescenceKind,
    pub capture_radius: f64,
    pub bond_on_synapse: bool,
}

impl Default for SynapseFormationParams {
    fn default() -> Self {
        Self { kind: ExcrescenceKind::Bouton, capture_radius: 3.0, bond_on_synapse: true }
    }
}

pub struct SynapseFormationModule {
    params: SynapseFormationParams,
    cell: Option<Entity>,
    synapses_formed: u32,
}

impl SynapseFormationModule {
    pub fn new(params: SynapseFormationParams) -> Self {
        Self { params, cell: None, synapses_formed: 0 }
    }

    pub fn synapses_formed(&self) -> u32 {
        self.synapses_formed
    }

    fn opposite_kind(&self) -> ExcrescenceKind {
        match self.params.kind {
            ExcrescenceKind::Bouton => ExcrescenceKind::Spine,
            ExcrescenceKind::Spine => ExcrescenceKind::Bouton,
        }
    }

    /// The first unpaired excrescence of `kind` owned by `owner`, if any.
    fn unpaired_excrescence(world: &hecs::World, owner: Entity, kind: ExcrescenceKind) -> Option<Entity> {
        let excrescences = world.get::<&ObjectCore>(owner).ok()?.excrescences.clone();
        excrescences.into_iter().find(|&ex| {
            world.get::<&Excrescence>(ex).map(|e| e.kind == kind && !e.is_paired()).unwrap_or(false)
        })
    }
}

impl Default for SynapseFormationModule {
    fn default() -> Self {
        Self::new(SynapseFormationParams::default())
    }
}

impl BiologicalModule for SynapseFormationModule {
    fn name(&self) -> &str {
        "synapse_module"
    }

    fn run(&mut self, ctx: &mut ModuleContext, cell_element: Entity, _dt: f64) -> SimResult<()> {
        let Some(own_excrescence) = Self::unpaired_excrescence(&ctx.ecm.world, cell_element, self.params.kind) else {
            return Ok(());
        };

        let (own_position, space_node) = {
            let core = ctx.ecm.world.get::<&ObjectCore>(cell_element).map_err(|_| SimError::EntityNotFound)?;
            let record = ctx.ecm.world.get::<&NodeRecord>(cell_element).map_err(|_| SimError::EntityNotFound)?;
            (core.mass_location, record.space_node)
        };
        let Some(space_node) = space_node else { return Ok(()) };
        let Some(neighbor_ids) = ctx.ecm.triangulation.neighbors(space_node) else { return Ok(()) };

        let opposite = self.opposite_kind();
        let mut best: Option<(Entity, Entity, f64)> = None;
        for neighbor_id in neighbor_ids {
            let Some(neighbor_entity) = ctx.ecm.entity_of(neighbor_id) else { continue };
            if neighbor_entity == cell_element {
                continue;
            }
            let Some(candidate) = Self::unpaired_excrescence(&ctx.ecm.world, neighbor_entity, opposite) else { continue };
            let neighbor_position = match ctx.ecm.world.get::<&ObjectCore>(neighbor_entity) {
                Ok(core) => core.mass_location,
                Err(_) => continue,
            };
            let distance = own_position.distance(neighbor_position);
            if distance > self.params.capture_radius {
                continue;
            }
            if best.as_ref().map(|(_, _, d)| distance < *d).unwrap_or(true) {
                best = Some((neighbor_entity, candidate, distance));
            }
        }

        let Some((peer_owner, peer_excrescence, distance)) = best else { return Ok(()) };
        let (bouton, spine) = match self.params.kind {
            ExcrescenceKind::Bouton => (own_excrescence, peer_excrescence),
            ExcrescenceKind::Spine => (peer_excrescence, own_excrescence),
        };
        synapse_with(&mut ctx.ecm.world, bouton, spine, self.params.bond_on_synapse)?;
        self.synapses_formed += 1;
        debug!("{:?} synapsed with {:?} at distance {:.3}", cell_element, peer_owner, distance);
        Ok(())
    }

    fn get_copy(&self) -> Box<dyn BiologicalModule> {
        Box::new(SynapseFormationModule::new(self.params))
    }

    fn set_cell_element(&mut self, cell_element: Entity) {
        self.cell = Some(cell_element);
    }

    fn get_cell_element(&self) -> Option<Entity> {
        self.cell
    }

    fn get_params(&self) -> Value {
        json!({
            "kind": format!("{:?}", self.params.kind),
            "capture_radius": self.params.capture_radius,
            "bond_on_synapse": self.params.bond_on_synapse,
            "synapses_formed": self.synapses_formed,
        })
    }

    fn set_params(&mut self, params: &Value) -> SimResult<()> {
        if let Some(v) = params.get("capture_radius").and_then(|v| v.as_f64()) {
            self.params.capture_radius = v;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdm_core::components::Color;
    use bdm_core::ecm::{BoundingBox, Ecm};
    use bdm_core::geometry::Vec3;
    use bdm_core::physical_object::add_excrescence;
    use bdm_core::rng::SimRng;

    fn default_box() -> BoundingBox {
        BoundingBox { min: Vec3::new(-500.0, -500.0, -500.0), max: Vec3::new(500.0, 500.0, 500.0) }
    }

    #[test]
    fn nearby_opposite_excrescences_synapse() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(11);
        let axon = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let dendrite = ecm.register_sphere(Vec3::new(2.0, 0.0, 0.0), 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let bouton = add_excrescence(&mut ecm.world, axon, ExcrescenceKind::Bouton, 0.0).unwrap();
        let _spine = add_excrescence(&mut ecm.world, dendrite, ExcrescenceKind::Spine, 0.0).unwrap();

        let mut module = SynapseFormationModule::new(SynapseFormationParams {
            kind: ExcrescenceKind::Bouton,
            capture_radius: 5.0,
            bond_on_synapse: true,
        });
        let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
        module.run(&mut ctx, axon, 0.1).unwrap();

        assert_eq!(module.synapses_formed(), 1);
        assert!(ctx.ecm.world.get::<&Excrescence>(bouton).unwrap().is_paired());
    }

    #[test]
    fn distant_excrescences_do_not_synapse() {
        let mut ecm = Ecm::new(100.0, default_box());
        let mut rng = SimRng::new(12);
        let axon = ecm.register_sphere(Vec3::ZERO, 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        let dendrite = ecm.register_sphere(Vec3::new(300.0, 0.0, 0.0), 10.0, 1.0, 0.1, Color::WHITE, &mut rng).unwrap();
        add_excrescence(&mut ecm.world, axon, ExcrescenceKind::Bouton, 0.0).unwrap();
        add_excrescence(&mut ecm.world, dendrite, ExcrescenceKind::Spine, 0.0).unwrap();

        let mut module = SynapseFormationModule::new(SynapseFormationParams {
            kind: ExcrescenceKind::Bouton,
            capture_radius: 5.0,
            bond_on_synapse: true,
        });
        let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
        module.run(&mut ctx, axon, 0.1).unwrap();
        assert_eq!(module.synapses_formed(), 0);
    }
}
