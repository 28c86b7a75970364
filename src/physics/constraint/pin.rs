use glam::Vec2;

use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::{
    apply_impulses, inverse_or_zero, k_scalar, normal_relative_velocity,
};

use super::{clamp_symmetric, Solve, StepParams};

/// Keeps two anchor points at a fixed distance, like a massless rod.
#[derive(Debug, Clone)]
pub struct PinJoint {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub distance: f32,

    r1: Vec2,
    r2: Vec2,
    n: Vec2,
    n_mass: f32,
    bias: f32,
    jn_acc: f32,
    jn_max: f32,
}

impl PinJoint {
    /// Anchors are body-local. The distance is measured from the current poses.
    pub fn new(a: &Body, b: &Body, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        let distance = a
            .local_to_world(anchor_a)
            .distance(b.local_to_world(anchor_b));
        Self {
            anchor_a,
            anchor_b,
            distance,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            n: Vec2::ZERO,
            n_mass: 0.0,
            bias: 0.0,
            jn_acc: 0.0,
            jn_max: 0.0,
        }
    }
}

impl Solve for PinJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        let delta = (b.position + self.r2) - (a.position + self.r1);
        let dist = delta.length();
        self.n = delta.normalize_or_zero();

        self.n_mass = inverse_or_zero(k_scalar(a, b, self.r1, self.r2, self.n));
        self.bias = params.bias(dist - self.distance);
        self.jn_max = params.j_max();
        self.jn_acc = 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = clamp_symmetric(jn_old + jn, self.jn_max);
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc - jn_old));
    }

    fn impulse(&self) -> f32 {
        self.jn_acc.abs()
    }
}
