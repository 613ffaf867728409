//! Core of the agent-based biological simulation engine: Delaunay spatial
//! organization, spring-mass mechanics, and the intracellular/extracellular
//! substance layer.

pub mod components;
pub mod ecm;
pub mod engine;
pub mod error;
pub mod force;
pub mod geometry;
pub mod json;
pub mod module;
pub mod node;
pub mod physical_cylinder;
pub mod physical_object;
pub mod physical_sphere;
pub mod rng;
pub mod substance;
pub mod triangulation;
pub mod world;

pub use components::*;
pub use ecm::*;
pub use engine::*;
pub use error::*;
pub use force::*;
pub use geometry::*;
pub use module::*;
pub use node::{
    barycentric_coordinates, estimate_gradient, extrapolate_along_gradient, interpolate_barycentric, point_in_tetrahedron, NodeRecord,
};
pub use rng::*;
pub use substance::*;
pub use triangulation::*;
pub use world::*;

pub use hecs;
