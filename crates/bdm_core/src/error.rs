//! Error kinds per the engine's error-handling policy: `PositionNotAllowed`
//! is recoverable (caller retries with jitter); `InvariantViolation` and
//! `ResourceExhaustion` are fatal and abort the current step; configuration
//! lookups auto-heal (`ConfigurationError` is kept for completeness but the
//! registries that can raise it auto-create a default template instead, so
//! in practice it is rarely constructed). Degenerate-geometry recovery
//! never crosses this boundary: it is always handled locally
//! (see `geometry::Vec3::normalize`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    /// A triangulation insert/move/remove would collapse the mesh or
    /// coincide with an existing node. Recoverable: the caller retries
    /// after jittering the target position.
    #[error("position not allowed: {0}")]
    PositionNotAllowed(String),

    /// A tree relation or Delaunay structure is inconsistent in a way that
    /// cannot be repaired (e.g. `remove_daughter` received a non-child, or
    /// clean-up could not restore the Delaunay property). Fatal.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A referenced template/substance/configuration entry was missing and
    /// could not be auto-created.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// An object count exceeded a configured ceiling.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    #[error("module error: {0}")]
    ModuleError(String),

    #[error("entity not found")]
    EntityNotFound,

    #[error("component not found: {0}")]
    ComponentNotFound(&'static str),
}

pub type SimResult<T> = Result<T, SimError>;
