use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::inverse_or_zero;

use super::{clamp_symmetric, Solve, StepParams};

/// Angular spring with damping, driving `a.angle - b.angle` toward `rest_angle`.
#[derive(Debug, Clone)]
pub struct DampedRotarySpring {
    pub rest_angle: f32,
    pub stiffness: f32,
    pub damping: f32,

    i_sum: f32,
    w_coef: f32,
    target_wrn: f32,
    j_max: f32,
}

impl DampedRotarySpring {
    pub fn new(rest_angle: f32, stiffness: f32, damping: f32) -> Self {
        Self {
            rest_angle,
            stiffness,
            damping,
            i_sum: 0.0,
            w_coef: 0.0,
            target_wrn: 0.0,
            j_max: 0.0,
        }
    }

    /// Spring torque for a relative angle `a.angle - b.angle`.
    pub fn spring_torque(&self, relative_angle: f32) -> f32 {
        (relative_angle - self.rest_angle) * self.stiffness
    }
}

impl Solve for DampedRotarySpring {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        let moment = a.inv_moment() + b.inv_moment();
        self.i_sum = inverse_or_zero(moment);
        self.w_coef = 1.0 - (-self.damping * params.dt * moment).exp();
        self.target_wrn = 0.0;
        self.j_max = params.j_max();

        let j_spring = self.spring_torque(a.angle() - b.angle()) * params.dt;
        a.angular_velocity -= j_spring * a.inv_moment();
        b.angular_velocity += j_spring * b.inv_moment();
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wrn = a.angular_velocity - b.angular_velocity;
        let w_damp = (self.target_wrn - wrn) * self.w_coef;
        self.target_wrn = wrn + w_damp;

        let j_damp = clamp_symmetric(w_damp * self.i_sum, self.j_max);
        a.angular_velocity += j_damp * a.inv_moment();
        b.angular_velocity -= j_damp * b.inv_moment();
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
    use glam::Vec2;

    #[test]
    fn test_rotary_spring_settles_at_rest_angle() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap();
        let spring = DampedRotarySpring::new(1.0, 50.0, 5.0);
        let mut c = Constraint::new(ha, hb, spring).unwrap();

        step(&mut c, &mut a, &mut b, Vec2::ZERO);
        assert!(b.angular_velocity < 0.0, "b turns toward a.angle - rest_angle");

        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 600);
        let relative = a.angle() - b.angle();
        assert!((relative - 1.0).abs() < 0.02, "relative angle = {relative}");
        assert_eq!(c.impulse(), 0.0);
    }
}
