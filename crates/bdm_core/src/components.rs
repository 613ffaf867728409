//! ECS components for physical objects. A `hecs`
//! entity that is a triangulation site carries a `NodeRecord`
//! (`crate::node::NodeRecord`); one that is additionally a physical object
//! carries `ObjectCore` plus exactly one of `SphereState`/`CylinderState`.

use std::collections::HashMap;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::geometry::{Mat33, Vec3};
use crate::substance::IntracellularSubstance;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Color([r, g, b, 1.0])
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Shared state of every `PhysicalObject`: mass-location,
/// orthonormal local frame, size, and the intracellular bookkeeping common
/// to spheres and cylinders.
#[derive(Debug, Clone)]
pub struct ObjectCore {
    pub mass_location: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub diameter: f64,
    pub volume: f64,
    pub mass: f64,
    pub adherence: f64,
    pub color: Color,
    /// Cleared once an object stops moving under its own force so the
    /// scheduler can skip it until a neighbor nudges it again.
    pub on_scheduler: bool,
    pub still_existing: bool,
    pub last_force: Vec3,
    pub intracellular: HashMap<String, IntracellularSubstance>,
    pub bonds: Vec<Entity>,
    pub excrescences: Vec<Entity>,
}

impl ObjectCore {
    pub fn new(mass_location: Vec3, diameter: f64, mass: f64, adherence: f64) -> Self {
        Self {
            mass_location,
            x_axis: Vec3::new(1.0, 0.0, 0.0),
            y_axis: Vec3::new(0.0, 1.0, 0.0),
            z_axis: Vec3::new(0.0, 0.0, 1.0),
            diameter,
            volume: 0.0,
            mass,
            adherence,
            color: Color::default(),
            on_scheduler: true,
            still_existing: true,
            last_force: Vec3::ZERO,
            intracellular: HashMap::new(),
            bonds: Vec::new(),
            excrescences: Vec::new(),
        }
    }

    pub fn local_axes(&self) -> Mat33 {
        Mat33::from_columns(self.x_axis, self.y_axis, self.z_axis)
    }

    /// Local -> global coordinate transform.
    pub fn local_to_global(&self, local: Vec3) -> Vec3 {
        self.mass_location + self.local_axes().mul_vec(local)
    }

    pub fn global_to_local(&self, global: Vec3) -> Vec3 {
        self.local_axes().transpose().mul_vec(global - self.mass_location)
    }

    /// `(length, phi, theta)` spherical coordinates in the local frame,
    /// the cylinder-attachment convention `add_new_physical_cylinder` uses.
    pub fn local_to_polar(local: Vec3) -> (f64, f64, f64) {
        let r = local.norm();
        if r < 1e-12 {
            return (0.0, 0.0, 0.0);
        }
        let theta = (local.z / r).clamp(-1.0, 1.0).acos();
        let phi = local.y.atan2(local.x);
        (r, phi, theta)
    }

    pub fn polar_to_local(r: f64, phi: f64, theta: f64) -> Vec3 {
        Vec3::new(r * theta.sin() * phi.cos(), r * theta.sin() * phi.sin(), r * theta.cos())
    }
}

/// Subtype state of a `PhysicalSphere`.
#[derive(Debug, Clone, Default)]
pub struct SphereState {
    pub daughters: Vec<Entity>,
    pub daughter_attachment: HashMap<u64, Vec3>,
    pub rotational_inertia: f64,
    pub inter_object_force_coefficient: f64,
}

impl SphereState {
    pub fn attachment_of(&self, daughter: Entity) -> Option<Vec3> {
        self.daughter_attachment.get(&daughter.to_bits().get()).copied()
    }

    pub fn set_attachment(&mut self, daughter: Entity, direction: Vec3) {
        self.daughter_attachment.insert(daughter.to_bits().get(), direction);
    }
}

/// Subtype state of a `PhysicalCylinder`, the hardest
/// subsystem: a spring-coupled tree segment with exactly one mother and
/// 0/1/2 daughters (`daughter_right` only ever set alongside
/// `daughter_left`).
#[derive(Debug, Clone)]
pub struct CylinderState {
    pub mother: Entity,
    pub daughter_left: Option<Entity>,
    pub daughter_right: Option<Entity>,
    pub spring_axis: Vec3,
    pub actual_length: f64,
    pub resting_length: f64,
    pub spring_constant: f64,
    pub tension: f64,
    pub branch_order: u32,
    pub force_to_transmit_to_proximal_mass: Vec3,
}

impl CylinderState {
    pub fn new(mother: Entity, spring_axis: Vec3, resting_length: f64, spring_constant: f64) -> Self {
        let mut s = Self {
            mother,
            daughter_left: None,
            daughter_right: None,
            spring_axis,
            actual_length: spring_axis.norm(),
            resting_length,
            spring_constant,
            tension: 0.0,
            branch_order: 0,
            force_to_transmit_to_proximal_mass: Vec3::ZERO,
        };
        s.recompute_tension();
        s
    }

    /// `tension = k * (L - R) / R`.
    pub fn recompute_tension(&mut self) {
        self.tension = if self.resting_length > 1e-12 {
            self.spring_constant * (self.actual_length - self.resting_length) / self.resting_length
        } else {
            0.0
        };
    }

    pub fn is_terminal(&self) -> bool {
        self.daughter_left.is_none()
    }

    pub fn daughters(&self) -> impl Iterator<Item = Entity> {
        self.daughter_left.into_iter().chain(self.daughter_right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExcrescenceKind {
    Bouton,
    Spine,
}

/// A bouton or spine at an attachment point on a `PhysicalObject`'s
/// surface; pairs of opposite kinds form a synapse.
#[derive(Debug, Clone)]
pub struct Excrescence {
    pub owner: Entity,
    pub kind: ExcrescenceKind,
    /// Position along the owner's local axis (for cylinders) or surface
    /// direction (for spheres), used to keep the attachment point stable
    /// as the owner's geometry changes (split/merge, growth).
    pub local_coord: f64,
    pub peer: Option<Entity>,
}

impl Excrescence {
    pub fn new(owner: Entity, kind: ExcrescenceKind, local_coord: f64) -> Self {
        Self { owner, kind, local_coord, peer: None }
    }

    pub fn is_paired(&self) -> bool {
        self.peer.is_some()
    }
}

/// State needed to keep a bond's contact point sliding along a cylinder's
/// axis as the cylinder deforms.
#[derive(Debug, Clone, Copy)]
pub struct SlidingState {
    pub cylinder: Entity,
    pub coordinate: f64,
}

/// An elastic spring between two `PhysicalObject`s at specified polar
/// attachment points.
#[derive(Debug, Clone)]
pub struct PhysicalBond {
    pub a: Entity,
    pub b: Entity,
    pub origin_on_a: Vec3,
    pub origin_on_b: Vec3,
    pub resting_length: f64,
    pub spring_constant: f64,
    pub damping: f64,
    pub one_sided: bool,
    pub sliding: Option<SlidingState>,
}

impl PhysicalBond {
    pub fn other(&self, one: Entity) -> Option<Entity> {
        if one == self.a {
            Some(self.b)
        } else if one == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tension_matches_spring_formula() {
        let mut c = CylinderState::new(
            Entity::from_bits(1).unwrap(),
            Vec3::new(0.0, 0.0, 10.0),
            8.0,
            5.0,
        );
        c.recompute_tension();
        let expected = 5.0 * (10.0 - 8.0) / 8.0;
        assert!((c.tension - expected).abs() < 1e-9);
    }

    #[test]
    fn local_global_round_trip() {
        let core = ObjectCore::new(Vec3::new(1.0, 2.0, 3.0), 10.0, 1.0, 0.1);
        let local = Vec3::new(0.5, -0.3, 0.1);
        let global = core.local_to_global(local);
        let back = core.global_to_local(global);
        assert!(back.distance(local) < 1e-9);
    }

    #[test]
    fn polar_local_round_trip() {
        let local = Vec3::new(1.0, 2.0, -3.0);
        let (r, phi, theta) = ObjectCore::local_to_polar(local);
        let back = ObjectCore::polar_to_local(r, phi, theta);
        assert!(back.distance(local) < 1e-6);
    }
}
