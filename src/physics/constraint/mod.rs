//! Joints, springs and motors between pairs of bodies.
//!
//! A [`Constraint`] holds the two body handles, the shared limits and one
//! [`ConstraintKind`] variant. Each step the solver calls `pre_step` once and
//! `apply_impulse` once per iteration, in registration order.
//!
//! Joints do not warm start: accumulated impulses are reset in `pre_step`.
//! [`Constraint::impulse`] reports the magnitude accumulated during the last
//! step, so `impulse() / dt` approximates the force the joint applied.

mod damped_rotary_spring;
mod damped_spring;
mod gear;
mod groove;
mod pin;
mod pivot;
mod ratchet;
mod rotary_limit;
mod simple_motor;
mod slide;

pub use damped_rotary_spring::DampedRotarySpring;
pub use damped_spring::DampedSpring;
pub use gear::GearJoint;
pub use groove::GrooveJoint;
pub use pin::PinJoint;
pub use pivot::PivotJoint;
pub use ratchet::RatchetJoint;
pub use rotary_limit::RotaryLimitJoint;
pub use simple_motor::SimpleMotor;
pub use slide::SlideJoint;

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::Body;
use crate::physics::error::{PhysicsError, Result};

/// Default fraction of positional error corrected per step.
pub const DEFAULT_BIAS_COEF: f32 = 0.1;

/// Per-step values shared by every constraint variant.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepParams {
    pub dt: f32,
    pub inv_dt: f32,
    pub bias_coef: f32,
    pub max_bias: f32,
    pub max_force: f32,
}

impl StepParams {
    /// Largest impulse the constraint may apply this step.
    pub fn j_max(&self) -> f32 {
        (self.max_force * self.dt).max(0.0)
    }

    /// Correction velocity for a scalar positional error.
    pub fn bias(&self, error: f32) -> f32 {
        clamp_symmetric(-self.bias_coef * self.inv_dt * error, self.max_bias)
    }

    /// Correction velocity for a vector positional error.
    pub fn bias_vec(&self, error: Vec2) -> Vec2 {
        (error * (-self.bias_coef * self.inv_dt)).clamp_length_max(self.max_bias.max(0.0))
    }
}

/// Clamp `x` to `[-limit, limit]`. Negative limits clamp to zero.
#[inline]
pub(crate) fn clamp_symmetric(x: f32, limit: f32) -> f32 {
    let limit = limit.max(0.0);
    x.max(-limit).min(limit)
}

/// Solver contract implemented by every variant.
pub(crate) trait Solve {
    /// Cache anchors, effective masses and bias for this step.
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams);

    /// Apply one iteration's corrective impulse.
    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body);

    /// Magnitude of the impulse accumulated this step.
    fn impulse(&self) -> f32;
}

/// Closed set of constraint behaviors.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    Pin(PinJoint),
    Slide(SlideJoint),
    Pivot(PivotJoint),
    Groove(GrooveJoint),
    DampedSpring(DampedSpring),
    DampedRotarySpring(DampedRotarySpring),
    RotaryLimit(RotaryLimitJoint),
    Ratchet(RatchetJoint),
    Gear(GearJoint),
    SimpleMotor(SimpleMotor),
}

macro_rules! dispatch {
    ($kind:expr, $joint:ident => $body:expr) => {
        match $kind {
            ConstraintKind::Pin($joint) => $body,
            ConstraintKind::Slide($joint) => $body,
            ConstraintKind::Pivot($joint) => $body,
            ConstraintKind::Groove($joint) => $body,
            ConstraintKind::DampedSpring($joint) => $body,
            ConstraintKind::DampedRotarySpring($joint) => $body,
            ConstraintKind::RotaryLimit($joint) => $body,
            ConstraintKind::Ratchet($joint) => $body,
            ConstraintKind::Gear($joint) => $body,
            ConstraintKind::SimpleMotor($joint) => $body,
        }
    };
}

macro_rules! impl_from_joint {
    ($($variant:ident($joint:ty)),* $(,)?) => {
        $(
            impl From<$joint> for ConstraintKind {
                fn from(joint: $joint) -> Self {
                    ConstraintKind::$variant(joint)
                }
            }
        )*
    };
}

impl_from_joint!(
    Pin(PinJoint),
    Slide(SlideJoint),
    Pivot(PivotJoint),
    Groove(GrooveJoint),
    DampedSpring(DampedSpring),
    DampedRotarySpring(DampedRotarySpring),
    RotaryLimit(RotaryLimitJoint),
    Ratchet(RatchetJoint),
    Gear(GearJoint),
    SimpleMotor(SimpleMotor),
);

/// A constraint between two distinct bodies.
#[derive(Debug, Clone)]
pub struct Constraint {
    a: Entity,
    b: Entity,
    /// Largest force the constraint may apply. Default: infinity.
    pub max_force: f32,
    /// Largest correction velocity. Default: infinity.
    pub max_bias: f32,
    /// Fraction of positional error corrected per step. Default: 0.1.
    pub bias_coef: f32,
    collide_bodies: bool,
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Connect bodies `a` and `b`. The two handles must differ.
    pub fn new(a: Entity, b: Entity, kind: impl Into<ConstraintKind>) -> Result<Self> {
        if a == b {
            return Err(PhysicsError::SameBody(a));
        }
        Ok(Self {
            a,
            b,
            max_force: f32::INFINITY,
            max_bias: f32::INFINITY,
            bias_coef: DEFAULT_BIAS_COEF,
            collide_bodies: true,
            kind: kind.into(),
        })
    }

    pub fn with_max_force(mut self, max_force: f32) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_max_bias(mut self, max_bias: f32) -> Self {
        self.max_bias = max_bias;
        self
    }

    pub fn with_bias_coef(mut self, bias_coef: f32) -> Self {
        self.bias_coef = bias_coef;
        self
    }

    /// When false, shapes of the two bodies never collide while the
    /// constraint is registered. Fixed once added to a space.
    pub fn with_collide_bodies(mut self, collide_bodies: bool) -> Self {
        self.collide_bodies = collide_bodies;
        self
    }

    pub fn body_a(&self) -> Entity {
        self.a
    }

    pub fn body_b(&self) -> Entity {
        self.b
    }

    pub fn collide_bodies(&self) -> bool {
        self.collide_bodies
    }

    /// Magnitude of the impulse applied during the last step.
    ///
    /// Springs always report zero.
    pub fn impulse(&self) -> f32 {
        dispatch!(&self.kind, joint => joint.impulse())
    }

    pub(crate) fn pre_step(&mut self, a: &mut Body, b: &mut Body, dt: f32, inv_dt: f32) {
        let params = StepParams {
            dt,
            inv_dt,
            bias_coef: self.bias_coef,
            max_bias: self.max_bias,
            max_force: self.max_force,
        };
        dispatch!(&mut self.kind, joint => joint.pre_step(a, b, &params));
    }

    pub(crate) fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        dispatch!(&mut self.kind, joint => joint.apply_impulse(a, b));
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn test_constraint_rejects_same_body() {
        let (a, _) = handles();
        let err = Constraint::new(a, a, SimpleMotor::new(1.0)).unwrap_err();
        assert_eq!(err, PhysicsError::SameBody(a));
    }

    #[test]
    fn test_constraint_defaults() {
        let (a, b) = handles();
        let c = Constraint::new(a, b, SimpleMotor::new(1.0)).unwrap();
        assert_eq!(c.max_force, f32::INFINITY);
        assert_eq!(c.max_bias, f32::INFINITY);
        assert_eq!(c.bias_coef, 0.1);
        assert!(c.collide_bodies());
        assert_eq!(c.impulse(), 0.0);
    }

    #[test]
    fn test_step_params_clamps() {
        let params = StepParams {
            dt: 0.5,
            inv_dt: 2.0,
            bias_coef: 0.5,
            max_bias: 3.0,
            max_force: -1.0,
        };
        assert_eq!(params.j_max(), 0.0);
        assert_eq!(params.bias(1.0), -1.0);
        assert_eq!(params.bias(-10.0), 3.0);
        assert!((params.bias_vec(Vec2::new(10.0, 0.0)).length() - 3.0).abs() < 1e-6);
    }
}
