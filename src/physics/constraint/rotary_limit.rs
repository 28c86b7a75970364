use crate::ecs::components::physics::Body;
use crate::physics::error::{PhysicsError, Result};
use crate::physics::rigid_body::inverse_or_zero;

use super::{Solve, StepParams};

/// Keeps `b.angle - a.angle` within `[min, max]`.
#[derive(Debug, Clone)]
pub struct RotaryLimitJoint {
    min: f32,
    max: f32,

    i_sum: f32,
    bias: f32,
    j_acc: f32,
    j_max: f32,
    active: bool,
}

impl RotaryLimitJoint {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        Self::check_range(min, max)?;
        Ok(Self {
            min,
            max,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: 0.0,
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

impl Solve for RotaryLimitJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        let dist = b.angle() - a.angle();
        let pdist = if dist > self.max {
            self.max - dist
        } else if dist < self.min {
            self.min - dist
        } else {
            0.0
        };

        self.i_sum = inverse_or_zero(a.inv_moment() + b.inv_moment());
        self.bias = params.bias(pdist);
        self.j_max = params.j_max();
        self.j_acc = 0.0;
        self.active = pdist != 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if !self.active {
            return;
        }

        let wr = b.angular_velocity - a.angular_velocity;
        let j = -(self.bias + wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = if self.bias < 0.0 {
            (j_old + j).max(0.0).min(self.j_max)
        } else {
            (j_old + j).max(-self.j_max).min(0.0)
        };
        let j = self.j_acc - j_old;

        a.angular_velocity -= j * a.inv_moment();
        b.angular_velocity += j * b.inv_moment();
    }

    fn impulse(&self) -> f32 {
        self.j_acc.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::Constraint;
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_rotary_limit_rejects_inverted_range() {
        assert!(RotaryLimitJoint::new(1.0, -1.0).is_err());
    }

    #[test]
    fn test_rotary_limit_stops_spin_at_max() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap();
        b.angular_velocity = 5.0;
        let mut c = Constraint::new(ha, hb, RotaryLimitJoint::new(-0.5, 0.5).unwrap()).unwrap();

        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 120);
        assert!(b.angle() < 0.55, "angle = {}", b.angle());
        assert!(b.angle() > 0.4, "angle = {}", b.angle());
    }

    #[test]
    fn test_rotary_limit_free_inside_range() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap();
        b.angular_velocity = -1.0;
        let mut c = Constraint::new(ha, hb, RotaryLimitJoint::new(-1.0, 1.0).unwrap()).unwrap();

        step(&mut c, &mut a, &mut b, Vec2::ZERO);
        assert_eq!(b.angular_velocity, -1.0);
        assert_eq!(c.impulse(), 0.0);
    }
}
