use crate::ecs::components::physics::Body;
use crate::physics::error::{PhysicsError, Result};
use crate::physics::rigid_body::inverse_or_zero;

use super::{Solve, StepParams};

/// Lets `b.angle - a.angle` advance freely in the direction of `ratchet`
/// while blocking it from falling back past the last notch.
#[derive(Debug, Clone)]
pub struct RatchetJoint {
    /// Angle of the current notch.
    pub angle: f32,
    pub phase: f32,
    ratchet: f32,

    i_sum: f32,
    bias: f32,
    j_acc: f32,
    j_max: f32,
    active: bool,
}

impl RatchetJoint {
    /// `ratchet` is the notch spacing; its sign picks the free direction.
    pub fn new(a: &Body, b: &Body, phase: f32, ratchet: f32) -> Result<Self> {
        Self::check_ratchet(ratchet)?;
        Ok(Self {
            angle: b.angle() - a.angle(),
            phase,
            ratchet,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: 0.0,
            active: false,
        })
    }

    fn check_ratchet(ratchet: f32) -> Result<()> {
        if ratchet == 0.0 || !ratchet.is_finite() {
            return Err(PhysicsError::InvalidParameter(
                "ratchet spacing must be finite and non-zero",
            ));
        }
        Ok(())
    }

    pub fn ratchet(&self) -> f32 {
        self.ratchet
    }

    pub fn set_ratchet(&mut self, ratchet: f32) -> Result<()> {
        Self::check_ratchet(ratchet)?;
        self.ratchet = ratchet;
        Ok(())
    }
}

impl Solve for RatchetJoint {
    fn pre_step(&mut self, a: &mut Body, b: &mut Body, params: &StepParams) {
        let delta = b.angle() - a.angle();
        let diff = self.angle - delta;

        let pdist = if diff * self.ratchet > 0.0 {
            diff
        } else {
            self.angle = ((delta - self.phase) / self.ratchet).floor() * self.ratchet + self.phase;
            0.0
        };

        self.i_sum = inverse_or_zero(a.inv_moment() + b.inv_moment());
        self.bias = params.bias(pdist);
        self.j_max = params.j_max();
        self.j_acc = 0.0;
        self.active = self.bias != 0.0;
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if !self.active {
            return;
        }

        let wr = b.angular_velocity - a.angular_velocity;
        let ratchet = self.ratchet;
        let j = -(self.bias + wr) * self.i_sum;
        let j_old = self.j_acc;
        self.j_acc = ((j_old + j) * ratchet)
            .max(0.0)
            .min(self.j_max * ratchet.abs())
            / ratchet;
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
    fn test_ratchet_rejects_zero_spacing() {
        let a = Body::new_static();
        assert!(RatchetJoint::new(&a, &a, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_ratchet_turns_forward_and_blocks_backward() {
        let (ha, hb) = handles();
        let mut a = Body::new_static();
        let mut b = Body::new(1.0, 1.0).unwrap();
        let joint = RatchetJoint::new(&a, &b, 0.0, 0.5).unwrap();
        let mut c = Constraint::new(ha, hb, joint).unwrap();

        b.angular_velocity = 3.0;
        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 30);
        let forward = b.angle();
        assert!((forward - 1.5).abs() < 0.05, "free direction: angle = {forward}");

        b.angular_velocity = -3.0;
        simulate(&mut c, &mut a, &mut b, Vec2::ZERO, 60);
        let notch = (forward / 0.5).floor() * 0.5;
        assert!(b.angle() > notch - 0.06, "angle = {}, notch = {notch}", b.angle());
    }
}
