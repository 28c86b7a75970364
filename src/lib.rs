//! Rein 2D Physics
//!
//! A 2D rigid body engine with persistent contacts, joints and a
//! sequential impulse solver, built on hecs and glam.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **ecs** - hecs components for bodies and collision shapes
//! 2. **physics** - collision detection, arbiters, constraints and the [`Space`]
//!    that steps them
//!
//! ```no_run
//! use rein_physics2d::{Body, Shape, Space, SpaceConfig};
//! use rein_physics2d::glam::Vec2;
//!
//! let mut space = Space::new(SpaceConfig::default());
//! let ground = space.static_body();
//! let floor = Shape::segment(ground, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0).unwrap();
//! space.add_shape(floor).unwrap();
//!
//! let ball = space.add_body(Body::new(1.0, 0.125).unwrap().with_position(Vec2::new(0.0, 5.0)));
//! space.add_shape(Shape::circle(ball, 0.5, Vec2::ZERO).unwrap()).unwrap();
//!
//! for _ in 0..60 {
//!     space.step(1.0 / 60.0);
//! }
//! ```

pub mod ecs;
pub mod physics;

// Re-export commonly used types
pub use ecs::prelude::*;

pub use physics::arbiter::{Arbiter, ArbiterState};
pub use physics::collider::{Aabb, SegmentQueryInfo};
pub use physics::constraint::{
    Constraint, ConstraintKind, DampedRotarySpring, DampedSpring, GearJoint, GrooveJoint,
    PinJoint, PivotJoint, RatchetJoint, RotaryLimitJoint, SimpleMotor, SlideJoint,
};
pub use physics::contact::Contact;
pub use physics::error::{PhysicsError, Result};
pub use physics::handler::CollisionHandler;
pub use physics::rigid_body::{moment_for_box, moment_for_circle, moment_for_poly, moment_for_segment};
pub use physics::{QueryFilter, Space, SpaceConfig};

// Re-export math and ECS crates for convenience
pub use glam;
pub use hecs;
