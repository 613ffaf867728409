//! `BiologicalModule`: the capability the engine calls once per tick for
//! every cell element — per-tick update of one cell element, with
//! copy-on-event semantics for division, branching, and bifurcation.

use hecs::Entity;
use serde_json::Value;

use crate::ecm::Ecm;
use crate::error::SimResult;
use crate::rng::SimRng;

/// Everything a module's rule body may touch: the registry/triangulation
/// (to grow, divide, branch, diffuse) and the single seeded RNG.
pub struct ModuleContext<'a> {
    pub ecm: &'a mut Ecm,
    pub rng: &'a mut SimRng,
}

pub trait BiologicalModule: Send + Sync {
    fn name(&self) -> &str;

    /// Run this module's rule body for `cell_element` for one step of
    /// length `dt`.
    fn run(&mut self, ctx: &mut ModuleContext, cell_element: Entity, dt: f64) -> SimResult<()>;

    fn is_copied_when_neurite_branches(&self) -> bool {
        false
    }
    fn is_copied_when_soma_divides(&self) -> bool {
        false
    }
    fn is_copied_when_neurite_elongates(&self) -> bool {
        false
    }
    fn is_copied_when_neurite_extends_from_soma(&self) -> bool {
        false
    }
    fn is_deleted_after_bifurcation(&self) -> bool {
        false
    }

    /// Produce a fresh instance of this module for a newly created agent
    /// (division, branching, ...), per the copy-on-event flags above.
    fn get_copy(&self) -> Box<dyn BiologicalModule>;

    fn set_cell_element(&mut self, cell_element: Entity);
    fn get_cell_element(&self) -> Option<Entity>;

    fn get_params(&self) -> Value {
        Value::Null
    }
    fn set_params(&mut self, _params: &Value) -> SimResult<()> {
        Ok(())
    }
}

/// The set of modules attached to one cell element, run in registration
/// order every tick.
#[derive(Default)]
pub struct Behaviors {
    pub modules: Vec<Box<dyn BiologicalModule>>,
}

impl Behaviors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: Box<dyn BiologicalModule>) {
        self.modules.push(module);
    }

    pub fn run_all(&mut self, ctx: &mut ModuleContext, cell_element: Entity, dt: f64) -> SimResult<()> {
        for module in &mut self.modules {
            module.run(ctx, cell_element, dt)?;
        }
        Ok(())
    }

    /// Copies drawn from this set for a newly created agent, filtered by
    /// the triggering event's copy-on-event flag.
    pub fn copies_for(&self, event: CopyEvent) -> Vec<Box<dyn BiologicalModule>> {
        self.modules
            .iter()
            .filter(|m| match event {
                CopyEvent::NeuriteBranches => m.is_copied_when_neurite_branches(),
                CopyEvent::SomaDivides => m.is_copied_when_soma_divides(),
                CopyEvent::NeuriteElongates => m.is_copied_when_neurite_elongates(),
                CopyEvent::NeuriteExtendsFromSoma => m.is_copied_when_neurite_extends_from_soma(),
            })
            .map(|m| m.get_copy())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEvent {
    NeuriteBranches,
    SomaDivides,
    NeuriteElongates,
    NeuriteExtendsFromSoma,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingModule {
        cell: Option<Entity>,
        ticks: u32,
    }

    impl BiologicalModule for CountingModule {
        fn name(&self) -> &str {
            "counting"
        }
        fn run(&mut self, _ctx: &mut ModuleContext, cell_element: Entity, _dt: f64) -> SimResult<()> {
            self.cell = Some(cell_element);
            self.ticks += 1;
            Ok(())
        }
        fn is_copied_when_soma_divides(&self) -> bool {
            true
        }
        fn get_copy(&self) -> Box<dyn BiologicalModule> {
            Box::new(CountingModule { cell: None, ticks: 0 })
        }
        fn set_cell_element(&mut self, cell_element: Entity) {
            self.cell = Some(cell_element);
        }
        fn get_cell_element(&self) -> Option<Entity> {
            self.cell
        }
    }

    #[test]
    fn run_all_invokes_every_module() {
        use crate::ecm::BoundingBox;
        use crate::geometry::Vec3;

        let mut ecm = Ecm::new(100.0, BoundingBox { min: Vec3::new(-1.0, -1.0, -1.0), max: Vec3::new(1.0, 1.0, 1.0) });
        let e = ecm.world.spawn(());
        let mut rng = SimRng::new(1);
        let mut ctx = ModuleContext { ecm: &mut ecm, rng: &mut rng };
        let mut behaviors = Behaviors::new();
        behaviors.push(Box::new(CountingModule { cell: None, ticks: 0 }));
        behaviors.run_all(&mut ctx, e, 0.1).unwrap();
        assert_eq!(behaviors.modules[0].get_cell_element(), Some(e));
    }

    #[test]
    fn copies_for_respects_event_flag() {
        let mut behaviors = Behaviors::new();
        behaviors.push(Box::new(CountingModule { cell: None, ticks: 0 }));
        assert_eq!(behaviors.copies_for(CopyEvent::SomaDivides).len(), 1);
        assert_eq!(behaviors.copies_for(CopyEvent::NeuriteBranches).len(), 0);
    }
}
