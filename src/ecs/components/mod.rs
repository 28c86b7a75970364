//! ECS components (bodies, shapes).

pub mod physics;

pub use physics::*;
