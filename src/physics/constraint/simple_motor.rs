use crate::ecs::components::physics::Body;
use crate::physics::rigid_body::inverse_or_zero;

use super::{clamp_symmetric, Solve, StepParams};

/// Drives `a.angular_velocity - b.angular_velocity` toward `rate`.
///
/// Without a `max_force` the motor is infinitely strong.
#[derive(Debug, Clone)]
pub struct SimpleMotor {
    pub rate: f32,

    i_sum: f32,
    j_acc: f32,
    j_max: f32,
}

impl SimpleMotor {
    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            i_sum: 0.0,
            j_acc: 0.0,
            j_max: 0.0,
        }
    }
}

impl Solve for SimpleMotor {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.i_sum = inverse_or_zero(a.inv_moment() + b.inv_moment());
        self.j_max = params.j_max();
        self.j_acc = 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.angular_velocity - a.angular_velocity + self.rate;
        let j = -wr * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = clamp_symmetric(j_old + j, self.j_max);
        let j = self.j_acc - j_old;

        a.angular_velocity -= j * a.inv_moment();
        b.angular_velocity += j * b.inv_moment();
    }

    fn impulse(&self) -> f32 {
        self.j_acc.abs()
    }
}
