use crate::ecs::components::physics::Body;
use crate::physics::error::{PhysicsError, Result};
use crate::physics::rigid_body::inverse_or_zero;

use super::{clamp_symmetric, Solve, StepParams};

/// Keeps `b.angle * ratio - a.angle` equal to `phase`.
#[derive(Debug, Clone)]
pub struct GearJoint {
    pub phase: f32,
    ratio: f32,
    ratio_inv: f32,

    i_sum: f32,
    bias: f32,
    j_acc: f32,
    j_max: f32,
}

impl GearJoint {
    pub fn new(phase: f32, ratio: f32) -> Result<Self> {
        Self::check_ratio(ratio)?;
        Ok(Self {
            phase,
            ratio,
            ratio_inv: 1.0 / ratio,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: 0.0,
        })
    }

    fn check_ratio(ratio: f32) -> Result<()> {
        if ratio == 0.0 || !ratio.is_finite() {
            return Err(PhysicsError::InvalidGearRatio(ratio));
        }
        Ok(())
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) -> Result<()> {
        Self::check_ratio(ratio)?;
        self.ratio = ratio;
        self.ratio_inv = 1.0 / ratio;
        Ok(())
    }
}

impl Solve for GearJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        self.i_sum = inverse_or_zero(a.inv_moment() * self.ratio_inv + self.ratio * b.inv_moment());
        self.bias = params.bias(b.angle() * self.ratio - a.angle() - self.phase);
        self.j_max = params.j_max();
        self.j_acc = 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let wr = b.angular_velocity * self.ratio - a.angular_velocity;
        let j = (self.bias - wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = clamp_symmetric(j_old + j, self.j_max);
        let j = self.j_acc - j_old;

        a.angular_velocity -= j * a.inv_moment() * self.ratio_inv;
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
    fn test_gear_rejects_zero_ratio() {
        assert!(GearJoint::new(0.0, 0.0).is_err());
        assert!(GearJoint::new(0.0, f32::NAN).is_err());
        let mut gear = GearJoint::new(0.0, 2.0).unwrap();
        assert!(gear.set_ratio(0.0).is_err());
        assert_eq!(gear.ratio(), 2.0);
    }

    #[test]
    fn test_gear_couples_angular_velocity() {
        let (ha, hb) = handles();
        let mut a = Body::new(1.0, 1.0).unwrap();
        let mut b = Body::new(1.0, 1.0).unwrap();
        a.angular_velocity = 4.0;
        let mut c = Constraint::new(ha, hb, GearJoint::new(0.0, 2.0).unwrap()).unwrap();

        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 60);
        let wr = b.angular_velocity * 2.0 - a.angular_velocity;
        assert!(wr.abs() < 1e-3, "wr = {wr}");
        let drift = b.angle() * 2.0 - a.angle();
        assert!(drift.abs() < 0.05, "phase drift = {drift}");
    }

    #[test]
    fn test_gear_negative_ratio_counter_rotates() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap();
        b.angular_velocity = 2.0;
        let mut c = Constraint::new(ha, hb, GearJoint::new(0.0, -1.0).unwrap()).unwrap();

        step(&mut c, &mut a, &mut b, Vec2::ZERO);
        assert!(b.angular_velocity.abs() < 1e-4, "w = {}", b.angular_velocity);
    }
}
