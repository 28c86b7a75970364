use glam::Vec2;

use crate::ecs::components::physics::Body;
use crate::physics::error::{PhysicsError, Result};
use crate::physics::rigid_body::{
    apply_impulses, inverse_or_zero, k_scalar, normal_relative_velocity,
};

use super::{Solve, StepParams};

/// Keeps the anchor distance within `[min, max]`, like a rope or a telescoping rod.
#[derive(Debug, Clone)]
pub struct SlideJoint {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    min: f32,
    max: f32,

    r1: Vec2,
    r2: Vec2,
    n: Vec2,
    n_mass: f32,
    bias: f32,
    jn_acc: f32,
    jn_max: f32,
    active: bool,
}

impl SlideJoint {
    pub fn new(anchor_a: Vec2, anchor_b: Vec2, min: f32, max: f32) -> Result<Self> {
        Self::check_range(min, max)?;
        Ok(Self {
            anchor_a,
            anchor_b,
            min,
            max,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            n: Vec2::ZERO,
            n_mass: 0.0,
            bias: 0.0,
            jn_acc: 0.0,
            jn_max: 0.0,
            active: false,
        })
    }

    fn check_range(min: f32, max: f32) -> Result<()> {
        if !(min <= max) {
            return Err(PhysicsError::InvalidRange { min, max });
        }
        Ok(())
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn set_range(&mut self, min: f32, max: f32) -> Result<()> {
        Self::check_range(min, max)?;
        self.min = min;
        self.max = max;
        Ok(())
    }
}

impl Solve for SlideJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        let delta = (b.position + self.r2) - (a.position + self.r1);
        let mut dist = delta.length();
        let mut pdist = 0.0;
        if dist > self.max {
            pdist = dist - self.max;
        } else if dist < self.min {
            pdist = self.min - dist;
            // Flip the normal so a negative impulse pushes the anchors apart.
            dist = -dist;
        }
        self.n = if dist != 0.0 { delta / dist } else { Vec2::ZERO };

        self.n_mass = inverse_or_zero(k_scalar(a, b, self.r1, self.r2, self.n));
        self.bias = params.bias(pdist);
        self.jn_max = params.j_max();
        self.jn_acc = 0.0;
        self.active = pdist > 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if !self.active {
            return;
        }
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = (jn_old + jn).max(-self.jn_max).min(0.0);
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc - jn_old));
    }

    fn impulse(&self) -> f32 {
        self.jn_acc.abs()
    }
}
