use glam::Vec2;

use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::{apply_impulses, k_tensor, mult_k, relative_velocity};

use super::{Solve, StepParams};

/// Pins two anchor points together, letting the bodies rotate about them.
#[derive(Debug, Clone)]
pub struct PivotJoint {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,

    r1: Vec2,
    r2: Vec2,
    k1: Vec2,
    k2: Vec2,
    j_acc: Vec2,
    j_max_len: f32,
    bias: Vec2,
}

impl PivotJoint {
    /// Join body-local anchors.
    pub fn new(anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self {
            anchor_a,
            anchor_b,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            k1: Vec2::ZERO,
            k2: Vec2::ZERO,
            j_acc: Vec2::ZERO,
            j_max_len: 0.0,
            bias: Vec2::ZERO,
        }
    }

    /// Join the bodies at a world-space pivot, using their current poses.
    pub fn from_pivot(a: &Body, b: &Body, pivot: Vec2) -> Self {
        Self::new(a.world_to_local(pivot), b.world_to_local(pivot))
    }
}

impl Solve for PivotJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

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
        self.j_acc = (j_old + j).clamp_length_max(self.j_max_len);
        apply_impulses(a, b, self.r1, self.r2, self.j_acc - j_old);
    }

    fn impulse(&self) -> f32 {
        self.j_acc.length()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::Constraint;
    use super::*;

    #[test]
    fn test_pivot_from_world_point() {
        let a = Body::new_static().with_position(Vec2::new(1.0, 0.0));
        let b = Body::new(1.0, 1.0)
            .unwrap()
            .with_position(Vec2::new(4.0, 0.0))
            .with_angle(std::f32::consts::PI);
        let pivot = PivotJoint::from_pivot(&a, &b, Vec2::new(2.0, 0.0));
        assert!((pivot.anchor_a - Vec2::new(1.0, 0.0)).length() < 1e-6);
        assert!((pivot.anchor_b - Vec2::new(2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_pivot_keeps_anchors_together() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 10.0).unwrap().with_position(Vec2::new(5.0, 0.0));
        let joint = PivotJoint::from_pivot(&a, &b, Vec2::ZERO);
        let mut c = Constraint::new(ha, hb, joint.clone()).unwrap();

        for _ in 0..240 {
            step(&mut c, &mut a, &mut b, Vec2::new(0.0, -10.0));
            let gap = b.local_to_world(joint.anchor_b) - a.local_to_world(joint.anchor_a);
            assert!(gap.length() < 0.1, "gap = {gap}");
        }
        assert!(b.angle().abs() > 0.1, "body should rotate about the pivot");
    }

    #[test]
    fn test_pivot_between_two_static_bodies_is_inert() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new_static().with_position(Vec2::new(1.0, 0.0));
        let mut c = Constraint::new(ha, hb, PivotJoint::new(Vec2::ZERO, Vec2::ZERO)).unwrap();

        step(&mut c, &mut a, &mut b, Vec2::ZERO);
        assert_eq!(c.impulse(), 0.0);
        assert!(b.velocity.is_finite() && b.velocity == Vec2::ZERO);
    }
}
