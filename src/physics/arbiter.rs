//! Persistent contact state between a pair of shapes.
//!
//! An [`Arbiter`] survives across steps while its shapes keep touching so
//! that accumulated impulses can warm start the next step's solve.

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::{Body, Shape};

use super::contact::Contact;
use super::handler::HandlerKey;
use super::rigid_body::{
    apply_bias_impulses, apply_impulses, inverse_or_zero, k_scalar, relative_velocity,
};

/// Lifecycle of an arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterState {
    /// Shapes started touching this step.
    FirstCollision,
    /// Shapes kept touching.
    Normal,
    /// A `begin` callback rejected the pair; skipped until they separate.
    Ignore,
    /// Shapes are apart; kept for `collision_persistence` steps.
    Cached,
}

/// Solver tuning used while preparing contacts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContactParams {
    pub inv_dt: f32,
    pub slop: f32,
    pub bias_coef: f32,
    pub max_bias: f32,
}

/// Contact set and solver state for one pair of shapes.
#[derive(Debug, Clone)]
pub struct Arbiter {
    shape_a: Entity,
    shape_b: Entity,
    body_a: Entity,
    body_b: Entity,
    contacts: Vec<Contact>,
    /// Combined restitution. Reset from the shapes every step.
    pub elasticity: f32,
    /// Combined friction. Reset from the shapes every step.
    pub friction: f32,
    /// Relative surface velocity. Reset from the shapes every step.
    pub surface_velocity: Vec2,
    pub(crate) stamp: u64,
    pub(crate) state: ArbiterState,
    pub(crate) swapped: bool,
    pub(crate) handler: Option<HandlerKey>,
    pub(crate) solving: bool,
}

impl Arbiter {
    pub(crate) fn new(shape_a: Entity, a: &Shape, shape_b: Entity, b: &Shape, stamp: u64) -> Self {
        Self {
            shape_a,
            shape_b,
            body_a: a.body(),
            body_b: b.body(),
            contacts: Vec::new(),
            elasticity: 0.0,
            friction: 0.0,
            surface_velocity: Vec2::ZERO,
            stamp,
            state: ArbiterState::FirstCollision,
            swapped: false,
            handler: None,
            solving: false,
        }
    }

    /// Replace the contact set, carrying impulses over from matching hashes.
    pub(crate) fn update(&mut self, mut contacts: Vec<Contact>, a: &Shape, b: &Shape, stamp: u64) {
        for new in &mut contacts {
            if let Some(old) = self.contacts.iter().find(|old| old.hash == new.hash) {
                new.jn_acc = old.jn_acc;
                new.jt_acc = old.jt_acc;
                new.j_bias = old.j_bias;
            }
        }
        self.contacts = contacts;

        self.elasticity = a.elasticity * b.elasticity;
        self.friction = a.friction * b.friction;
        self.surface_velocity = b.surface_velocity - a.surface_velocity;

        if self.state == ArbiterState::Cached {
            self.state = ArbiterState::FirstCollision;
        }
        self.stamp = stamp;
    }

    /// Drop the contacts of an arbiter whose shapes stopped touching.
    pub(crate) fn mark_cached(&mut self) {
        self.contacts.clear();
        self.state = ArbiterState::Cached;
        self.solving = false;
    }

    pub(crate) fn pre_step(&mut self, a: &Body, b: &Body, params: &ContactParams) {
        let e = self.elasticity;
        for con in &mut self.contacts {
            con.r1 = con.position - a.position;
            con.r2 = con.position - b.position;

            con.n_mass = inverse_or_zero(k_scalar(a, b, con.r1, con.r2, con.normal));
            con.t_mass = inverse_or_zero(k_scalar(a, b, con.r1, con.r2, con.normal.perp()));

            con.bias = (-params.bias_coef * params.inv_dt * (con.distance + params.slop).min(0.0))
                .min(params.max_bias);
            con.j_bias = 0.0;

            con.bounce = relative_velocity(a, b, con.r1, con.r2).dot(con.normal) * e;
        }
    }

    /// Re-apply last step's impulses.
    pub(crate) fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body) {
        for con in &self.contacts {
            apply_impulses(a, b, con.r1, con.r2, con.impulse());
        }
    }

    /// One solver iteration. `e_coef` scales restitution.
    pub(crate) fn apply_impulse(&mut self, a: &mut Body, b: &mut Body, e_coef: f32) {
        let surface_vr = self.surface_velocity;
        let friction = self.friction;

        for con in &mut self.contacts {
            let n = con.normal;
            let (r1, r2) = (con.r1, con.r2);

            // Position correction on the bias velocities.
            let vb1 = a.v_bias + r1.perp() * a.w_bias;
            let vb2 = b.v_bias + r2.perp() * b.w_bias;
            let vbn = (vb2 - vb1).dot(n);

            let jbn = (con.bias - vbn) * con.n_mass;
            let jbn_old = con.j_bias;
            con.j_bias = (jbn_old + jbn).max(0.0);
            apply_bias_impulses(a, b, r1, r2, n * (con.j_bias - jbn_old));

            let vr = relative_velocity(a, b, r1, r2);
            let vrn = vr.dot(n);

            let jn = -(con.bounce * e_coef + vrn) * con.n_mass;
            let jn_old = con.jn_acc;
            con.jn_acc = (jn_old + jn).max(0.0);
            let jn = con.jn_acc - jn_old;

            let vrt = (vr + surface_vr).dot(n.perp());
            let jt_max = friction * con.jn_acc;
            let jt = -vrt * con.t_mass;
            let jt_old = con.jt_acc;
            con.jt_acc = (jt_old + jt).max(-jt_max).min(jt_max);
            let jt = con.jt_acc - jt_old;

            apply_impulses(a, b, r1, r2, n.rotate(Vec2::new(jn, jt)));
        }
    }

    /// Shapes in the order the collision handler was registered with.
    pub fn shapes(&self) -> (Entity, Entity) {
        if self.swapped {
            (self.shape_b, self.shape_a)
        } else {
            (self.shape_a, self.shape_b)
        }
    }

    /// Bodies in the same order as [`shapes`](Self::shapes).
    pub fn bodies(&self) -> (Entity, Entity) {
        if self.swapped {
            (self.body_b, self.body_a)
        } else {
            (self.body_a, self.body_b)
        }
    }

    /// Shapes in solver order, matching the stored contact normals.
    pub fn solver_shapes(&self) -> (Entity, Entity) {
        (self.shape_a, self.shape_b)
    }

    pub(crate) fn solver_bodies(&self) -> (Entity, Entity) {
        (self.body_a, self.body_b)
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Normal of contact `i`, pointing from the first to the second of [`shapes`](Self::shapes).
    pub fn normal(&self, i: usize) -> Option<Vec2> {
        let n = self.contacts.get(i)?.normal;
        Some(if self.swapped { -n } else { n })
    }

    pub fn state(&self) -> ArbiterState {
        self.state
    }

    pub fn is_first_contact(&self) -> bool {
        self.state == ArbiterState::FirstCollision
    }

    /// Step at which the shapes last touched.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Sum of the accumulated normal impulse magnitudes.
    pub fn impulse(&self) -> f32 {
        self.contacts.iter().map(|con| con.jn_acc).sum()
    }

    /// Sum of normal impulses applied to the second of [`shapes`](Self::shapes).
    pub fn total_impulse(&self) -> Vec2 {
        let sum: Vec2 = self.contacts.iter().map(|con| con.normal * con.jn_acc).sum();
        if self.swapped {
            -sum
        } else {
            sum
        }
    }

    /// Like [`total_impulse`](Self::total_impulse), including friction.
    pub fn total_impulse_with_friction(&self) -> Vec2 {
        let sum: Vec2 = self.contacts.iter().map(Contact::impulse).sum();
        if self.swapped {
            -sum
        } else {
            sum
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn params() -> ContactParams {
        ContactParams {
            inv_dt: 1.0 / DT,
            slop: 0.1,
            bias_coef: 0.1,
            max_bias: f32::INFINITY,
        }
    }

    fn shapes() -> (Entity, Shape, Entity, Shape) {
        let mut world = hecs::World::new();
        let body_a = world.spawn(());
        let body_b = world.spawn(());
        (
            world.spawn(()),
            Shape::new_box(body_a, 10.0, 1.0).with_friction(1.0),
            world.spawn(()),
            Shape::new_box(body_b, 1.0, 1.0).with_friction(0.5).with_elasticity(0.5),
        )
    }

    fn resting_contact(hash: u64) -> Contact {
        Contact::new(Vec2::new(0.0, 0.5), Vec2::Y, -0.2, hash)
    }

    #[test]
    fn test_update_combines_material_properties() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);
        arb.update(vec![resting_contact(1)], &a, &b, 0);

        assert_eq!(arb.friction, 0.5);
        assert_eq!(arb.elasticity, 0.0);
        assert_eq!(arb.state(), ArbiterState::FirstCollision);
        assert_eq!(arb.solver_shapes(), (ea, eb));
    }

    #[test]
    fn test_warm_start_carries_matching_hashes() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);

        let mut first = resting_contact(7);
        first.jn_acc = 3.0;
        first.jt_acc = -1.0;
        first.j_bias = 0.25;
        let mut other = resting_contact(8);
        other.jn_acc = 5.0;
        arb.contacts = vec![first, other];

        arb.update(vec![resting_contact(7), resting_contact(9)], &a, &b, 1);
        assert_eq!(arb.contacts()[0].jn_acc, 3.0);
        assert_eq!(arb.contacts()[0].jt_acc, -1.0);
        assert_eq!(arb.contacts()[0].j_bias, 0.25);
        assert_eq!(arb.contacts()[1].jn_acc, 0.0, "new feature starts cold");
        assert_eq!(arb.contacts()[1].j_bias, 0.0);
    }

    #[test]
    fn test_cached_arbiter_restarts_as_first_collision() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);
        arb.state = ArbiterState::Normal;
        arb.mark_cached();
        assert!(arb.contacts().is_empty());

        arb.update(vec![resting_contact(1)], &a, &b, 5);
        assert_eq!(arb.state(), ArbiterState::FirstCollision);
        assert_eq!(arb.stamp(), 5);
    }

    #[test]
    fn test_impulses_never_pull_and_respect_friction_cone() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);
        arb.update(vec![resting_contact(1), resting_contact(2)], &a, &b, 0);

        let mut ground = Body::new_static();
        // Box moving up and sideways: the contact must not pull it back down.
        let mut block = Body::new(1.0, 1.0)
            .unwrap()
            .with_position(Vec2::new(0.0, 1.0))
            .with_velocity(Vec2::new(4.0, 2.0));

        arb.pre_step(&ground, &block, &params());
        for _ in 0..10 {
            arb.apply_impulse(&mut ground, &mut block, 1.0);
            for con in arb.contacts() {
                assert!(con.jn_acc >= 0.0);
                assert!(con.jt_acc.abs() <= arb.friction * con.jn_acc + 1e-6);
            }
        }
        assert!(block.velocity.y >= 2.0 - 1e-5, "v = {}", block.velocity);
    }

    #[test]
    fn test_impact_stops_normal_velocity() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);
        arb.update(vec![resting_contact(1)], &a, &b, 0);

        let mut ground = Body::new_static();
        let mut block = Body::new(1.0, f32::INFINITY)
            .unwrap()
            .with_position(Vec2::new(0.0, 0.5))
            .with_velocity(Vec2::new(0.0, -3.0));

        arb.pre_step(&ground, &block, &params());
        for _ in 0..10 {
            arb.apply_impulse(&mut ground, &mut block, 1.0);
        }
        assert!(block.velocity.y.abs() < 1e-5, "v = {}", block.velocity);
        assert!(block.v_bias.y > 0.0, "penetration is pushed out");
        assert!((arb.total_impulse().y - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_swapped_accessors() {
        let (ea, a, eb, b) = shapes();
        let mut arb = Arbiter::new(ea, &a, eb, &b, 0);
        let mut con = resting_contact(1);
        con.jn_acc = 2.0;
        arb.contacts = vec![con];
        arb.swapped = true;

        assert_eq!(arb.shapes(), (eb, ea));
        assert_eq!(arb.normal(0), Some(Vec2::NEG_Y));
        assert_eq!(arb.total_impulse(), Vec2::new(0.0, -2.0));
        assert_eq!(arb.normal(3), None);
    }
}
