//! Delaunay spatial organization: an incremental 3D
//! tetrahedralization whose vertices ("space nodes") carry the simulation's
//! `PhysicalNode`s, plus the movement-listener protocol that keeps
//! extracellular substance quantities consistent as the mesh changes.

pub mod arena;
pub mod delaunay;
pub mod edge;
pub mod listener;
pub mod open_triangle_organizer;
pub mod predicates;
pub mod space_node;
pub mod tetrahedron;
pub mod triangle;

pub use delaunay::Triangulation;
pub use listener::{MassConservationListener, MovementListener, SubstanceStore};
pub use space_node::{SpaceNode, SpaceNodeId, TetraId};
