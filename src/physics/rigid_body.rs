//! Rigid body integration, impulse helpers and moment of inertia formulas.

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::Body;

/// Integrate velocities: `v = v * damping^dt + (g + F/m) * dt`.
pub fn integrate_velocities(world: &mut hecs::World, gravity: Vec2, damping: f32, dt: f32) {
    let damping = damping.powf(dt);
    for (_, body) in world.query_mut::<&mut Body>() {
        body.update_velocity(gravity, damping, dt);
    }
}

/// Integrate positions with the solved velocities plus correction velocities.
pub fn integrate_positions(world: &mut hecs::World, dt: f32) {
    for (_, body) in world.query_mut::<&mut Body>() {
        body.update_position(dt);
    }
}

/// Clear force and torque accumulators on all bodies.
pub fn clear_forces(world: &mut hecs::World) {
    for (_, body) in world.query_mut::<&mut Body>() {
        body.reset_forces();
    }
}

impl Body {
    /// Velocity half of the integrator. `damping` is the per-step factor.
    pub fn update_velocity(&mut self, gravity: Vec2, damping: f32, dt: f32) {
        if self.is_static() {
            return;
        }
        self.velocity = self.velocity * damping + (gravity + self.force * self.inv_mass()) * dt;
        self.angular_velocity =
            self.angular_velocity * damping + self.torque * self.inv_moment() * dt;
    }

    /// Position half of the integrator. Resets the correction velocities.
    pub fn update_position(&mut self, dt: f32) {
        if !self.is_static() {
            self.position += (self.velocity + self.v_bias) * dt;
            self.set_angle(self.angle() + (self.angular_velocity + self.w_bias) * dt);
        }
        self.v_bias = Vec2::ZERO;
        self.w_bias = 0.0;
    }
}

/// Run `f` on copies of two bodies and write them back.
///
/// Returns `None` without calling `f` when either handle has no [`Body`].
pub(crate) fn with_bodies<R>(
    world: &hecs::World,
    a: Entity,
    b: Entity,
    f: impl FnOnce(&mut Body, &mut Body) -> R,
) -> Option<R> {
    let mut body_a = *world.get::<&Body>(a).ok()?;
    let mut body_b = *world.get::<&Body>(b).ok()?;
    let out = f(&mut body_a, &mut body_b);
    *world.get::<&mut Body>(a).ok()? = body_a;
    *world.get::<&mut Body>(b).ok()? = body_b;
    Some(out)
}

/// Velocity of `b` relative to `a` at the anchor offsets `r1`, `r2`.
#[inline]
pub(crate) fn relative_velocity(a: &Body, b: &Body, r1: Vec2, r2: Vec2) -> Vec2 {
    b.velocity_at(r2) - a.velocity_at(r1)
}

#[inline]
pub(crate) fn normal_relative_velocity(a: &Body, b: &Body, r1: Vec2, r2: Vec2, n: Vec2) -> f32 {
    relative_velocity(a, b, r1, r2).dot(n)
}

/// Apply `j` to `b` and `-j` to `a`.
#[inline]
pub(crate) fn apply_impulses(a: &mut Body, b: &mut Body, r1: Vec2, r2: Vec2, j: Vec2) {
    a.apply_impulse(-j, r1);
    b.apply_impulse(j, r2);
}

#[inline]
pub(crate) fn apply_bias_impulses(a: &mut Body, b: &mut Body, r1: Vec2, r2: Vec2, j: Vec2) {
    a.apply_bias_impulse(-j, r1);
    b.apply_bias_impulse(j, r2);
}

/// Inverse effective mass of the pair along `n`.
pub(crate) fn k_scalar(a: &Body, b: &Body, r1: Vec2, r2: Vec2, n: Vec2) -> f32 {
    let r1cn = r1.perp_dot(n);
    let r2cn = r2.perp_dot(n);
    a.inv_mass() + b.inv_mass() + a.inv_moment() * r1cn * r1cn + b.inv_moment() * r2cn * r2cn
}

/// `1 / k`, or zero when `k` is zero or not finite.
#[inline]
pub(crate) fn inverse_or_zero(k: f32) -> f32 {
    if k != 0.0 && k.is_finite() {
        1.0 / k
    } else {
        0.0
    }
}

/// Inverse of the 2x2 effective mass matrix, as its two rows.
///
/// A singular matrix yields zero rows, which turns the constraint off.
pub(crate) fn k_tensor(a: &Body, b: &Body, r1: Vec2, r2: Vec2) -> (Vec2, Vec2) {
    let m_sum = a.inv_mass() + b.inv_mass();

    let mut k11 = m_sum;
    let mut k12 = 0.0;
    let mut k21 = 0.0;
    let mut k22 = m_sum;

    for (r, i_inv) in [(r1, a.inv_moment()), (r2, b.inv_moment())] {
        let xx = r.x * r.x * i_inv;
        let yy = r.y * r.y * i_inv;
        let rcross = -r.x * r.y * i_inv;
        k11 += yy;
        k12 += rcross;
        k21 += rcross;
        k22 += xx;
    }

    let det = k11 * k22 - k12 * k21;
    let det_inv = inverse_or_zero(det);
    (
        Vec2::new(k22 * det_inv, -k12 * det_inv),
        Vec2::new(-k21 * det_inv, k11 * det_inv),
    )
}

/// Multiply `v` by the matrix with rows `k1`, `k2` from [`k_tensor`].
#[inline]
pub(crate) fn mult_k(v: Vec2, k1: Vec2, k2: Vec2) -> Vec2 {
    Vec2::new(v.dot(k1), v.dot(k2))
}

/// Moment of inertia of a hollow or solid circle of radii `r1`, `r2`.
pub fn moment_for_circle(mass: f32, r1: f32, r2: f32, offset: Vec2) -> f32 {
    0.5 * mass * (r1 * r1 + r2 * r2) + mass * offset.length_squared()
}

/// Moment of inertia of a thin segment.
pub fn moment_for_segment(mass: f32, a: Vec2, b: Vec2) -> f32 {
    let length = a.distance(b);
    let offset = (a + b) * 0.5;
    mass * length * length / 12.0 + mass * offset.length_squared()
}

/// Moment of inertia of a solid polygon shifted by `offset`.
pub fn moment_for_poly(mass: f32, verts: &[Vec2], offset: Vec2) -> f32 {
    let len = verts.len();
    let mut sum1 = 0.0;
    let mut sum2 = 0.0;
    for i in 0..len {
        let v1 = verts[i] + offset;
        let v2 = verts[(i + 1) % len] + offset;

        let a = v2.perp_dot(v1);
        let b = v1.dot(v1) + v1.dot(v2) + v2.dot(v2);
        sum1 += a * b;
        sum2 += a;
    }
    if sum2 == 0.0 {
        return 0.0;
    }
    (mass * sum1) / (6.0 * sum2)
}

/// Moment of inertia of a solid box centered on the body.
pub fn moment_for_box(mass: f32, width: f32, height: f32) -> f32 {
    mass * (width * width + height * height) / 12.0
}
