use glam::Vec2;

use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::{
    apply_impulses, inverse_or_zero, k_scalar, normal_relative_velocity,
};

use super::{clamp_symmetric, Solve, StepParams};

/// Linear spring with velocity damping between two anchors.
///
/// The spring force is applied once per step; the damping is solved
/// implicitly across iterations.
#[derive(Debug, Clone)]
pub struct DampedSpring {
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,

    r1: Vec2,
    r2: Vec2,
    n: Vec2,
    n_mass: f32,
    target_vrn: f32,
    v_coef: f32,
    j_max: f32,
}

impl DampedSpring {
    pub fn new(
        anchor_a: Vec2,
        anchor_b: Vec2,
        rest_length: f32,
        stiffness: f32,
        damping: f32,
    ) -> Self {
        Self {
            anchor_a,
            anchor_b,
            rest_length,
            stiffness,
            damping,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            n: Vec2::ZERO,
            n_mass: 0.0,
            target_vrn: 0.0,
            v_coef: 0.0,
            j_max: 0.0,
        }
    }

    /// Hooke's law force for a given anchor distance.
    pub fn spring_force(&self, dist: f32) -> f32 {
        (self.rest_length - dist) * self.stiffness
    }
}

impl Solve for DampedSpring {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.r1 = a.rotation().rotate(self.anchor_a);
        self.r2 = b.rotation().rotate(self.anchor_b);

        let delta = (b.position + self.r2) - (a.position + self.r1);
        let dist = delta.length();
        self.n = delta.normalize_or_zero();

        let k = k_scalar(a, b, self.r1, self.r2, self.n);
        self.n_mass = inverse_or_zero(k);

        self.target_vrn = 0.0;
        self.v_coef = 1.0 - (-self.damping * params.dt * k).exp();
        self.j_max = params.j_max();

        let f_spring = self.spring_force(dist);
        apply_impulses(a, b, self.r1, self.r2, self.n * (f_spring * params.dt));
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let v_damp = (self.target_vrn - vrn) * self.v_coef;
        self.target_vrn = vrn + v_damp;

        let j_damp = clamp_symmetric(v_damp * self.n_mass, self.j_max);
        apply_impulses(a, b, self.r1, self.r2, self.n * j_damp);
    }

    fn impulse(&self) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::Constraint;
    use super::*;

    #[test]
    fn test_spring_force_sign() {
        let spring = DampedSpring::new(Vec2::ZERO, Vec2::ZERO, 5.0, 10.0, 0.0);
        assert_eq!(spring.spring_force(6.0), -10.0);
        assert_eq!(spring.spring_force(4.0), 10.0);
    }

    #[test]
    fn test_damped_spring_settles_at_rest_length() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap().with_position(Vec2::new(7.0, 0.0));
        let spring = DampedSpring::new(Vec2::ZERO, Vec2::ZERO, 5.0, 100.0, 5.0);
        let mut c = Constraint::new(ha, hb, spring).unwrap();

        step(&mut c, &mut a, &mut b, Vec2::ZERO);
        assert!(b.velocity.x < 0.0, "stretched spring pulls b back");
        assert_eq!(c.impulse(), 0.0);

        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 600);
        assert!((b.position.x - 5.0).abs() < 0.05, "x = {}", b.position.x);
        assert!(b.velocity.length() < 0.05, "v = {}", b.velocity);
    }

    #[test]
    fn test_undamped_spring_keeps_oscillating() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap().with_position(Vec2::new(7.0, 0.0));
        let spring = DampedSpring::new(Vec2::ZERO, Vec2::ZERO, 5.0, 100.0, 0.0);
        let mut c = Constraint::new(ha, hb, spring).unwrap();

        let mut min_x = f32::INFINITY;
        for _ in 0..120 {
            step(&mut c, &mut a, &mut b, Vec2::ZERO);
            min_x = min_x.min(b.position.x);
        }
        assert!(min_x < 3.5, "should swing past rest length: min x = {min_x}");
    }
}
