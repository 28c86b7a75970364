use glam::Vec2;

use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::{apply_impulses, k_tensor, mult_k, relative_velocity};

use super::{Solve, StepParams};

/// Lets an anchor on body `b` slide along a groove segment fixed to body `a`.
#[derive(Debug, Clone)]
pub struct GrooveJoint {
    groove_a: Vec2,
    groove_b: Vec2,
    groove_n: Vec2,
    pub anchor_b: Vec2,

    groove_tn: Vec2,
    clamp: f32,
    r1: Vec2,
    r2: Vec2,
    k1: Vec2,
    k2: Vec2,
    j_acc: Vec2,
    j_max_len: f32,
    bias: Vec2,
}

impl GrooveJoint {
    /// `groove_a` and `groove_b` are local to body `a`, `anchor_b` to body `b`.
    pub fn new(groove_a: Vec2, groove_b: Vec2, anchor_b: Vec2) -> Self {
        Self {
            groove_a,
            groove_b,
            groove_n: (groove_b - groove_a).normalize_or_zero().perp(),
            anchor_b,
            groove_tn: Vec2::ZERO,
            clamp: 0.0,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            k1: Vec2::ZERO,
            k2: Vec2::ZERO,
            j_acc: Vec2::ZERO,
            j_max_len: 0.0,
            bias: Vec2::ZERO,
        }
    }

    pub fn groove_a(&self) -> Vec2 {
        self.groove_a
    }

    pub fn groove_b(&self) -> Vec2 {
        self.groove_b
    }

    pub fn set_groove(&mut self, groove_a: Vec2, groove_b: Vec2) {
        *self = Self::new(groove_a, groove_b, self.anchor_b);
    }

    /// Restrict an accumulated impulse to what the groove may apply.
    fn constrain(&self, j: Vec2) -> Vec2 {
        let n = self.groove_tn;
        let j_clamp = if self.clamp * j.perp_dot(n) > 0.0 {
            j
        } else {
            n * j.dot(n)
        };
        j_clamp.clamp_length_max(self.j_max_len)
    }
}

impl Solve for GrooveJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        let ta = a.local_to_world(self.groove_a);
        let tb = a.local_to_world(self.groove_b);

        let n = a.rotation().rotate(self.groove_n);
        let d = ta.dot(n);
        self.groove_tn = n;
        self.r2 = b.rotation().rotate(self.anchor_b);

        // Position of the anchor along the groove.
        let td = (b.position + self.r2).perp_dot(n);
        if td <= ta.perp_dot(n) {
            self.clamp = 1.0;
            self.r1 = ta - a.position;
        } else if td >= tb.perp_dot(n) {
            self.clamp = -1.0;
            self.r1 = tb - a.position;
        } else {
            self.clamp = 0.0;
            self.r1 = n.perp() * -td + n * d - a.position;
        }

        (self.k1, self.k2) = k_tensor(a, b, self.r1, self.r2);
        self.j_max_len = params.j_max();

        let delta = (b.position + self.r2) - (a.position + self.r1);
        self.bias = params.bias_vec(delta);
        self.j_acc = Vec2::ZERO;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vr = relative_velocity(a, b, self.r1, self.r2);
        let j = mult_k(self.bias - vr, self.k1, self.k2);
        let j_old = self.j_acc;
        self.j_acc = self.constrain(j_old + j);
        apply_impulses(a, b, self.r1, self.r2, self.j_acc - j_old);
    }

    fn impulse(&self) -> f32 {
        self.j_acc.length()
    }
}
