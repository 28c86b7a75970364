//! Error type for space configuration and handle lookups.

use hecs::Entity;
use thiserror::Error;

/// Errors reported by body, shape and constraint construction and by the
/// [`Space`](super::Space) registration API.
///
/// Solver overload (a joint exceeding its `max_force`) is never an error; the
/// impulse is clamped and callers inspect [`Constraint::impulse`](super::constraint::Constraint::impulse).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("invalid mass {0}: must be positive")]
    InvalidMass(f32),

    #[error("invalid moment of inertia {0}: must be positive")]
    InvalidMoment(f32),

    #[error("constraint connects body {0:?} to itself")]
    SameBody(Entity),

    #[error("invalid radius {0}")]
    InvalidRadius(f32),

    #[error("invalid polygon: {0}")]
    InvalidPolygon(&'static str),

    #[error("invalid gear ratio {0}: must be finite and non-zero")]
    InvalidGearRatio(f32),

    #[error("invalid range [{min}, {max}]: min must not exceed max")]
    InvalidRange { min: f32, max: f32 },

    #[error("invalid constraint parameter: {0}")]
    InvalidParameter(&'static str),

    #[error("no body with handle {0:?}")]
    NoSuchBody(Entity),

    #[error("no shape with handle {0:?}")]
    NoSuchShape(Entity),

    #[error("no constraint with handle {0:?}")]
    NoSuchConstraint(Entity),

    #[error("the static body cannot be removed")]
    StaticBodyRemoval,

    #[error("body {body:?} still has {shapes} shape(s) and {constraints} constraint(s) attached")]
    BodyInUse {
        body: Entity,
        shapes: usize,
        constraints: usize,
    },
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
