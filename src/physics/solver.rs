//! Sequential impulse solver over arbiters and constraints.
//!
//! Arbiters are solved before constraints in every pass, each in insertion
//! order. Bodies are copied out of the world per pair and written back, so a
//! handle that no longer carries a [`Body`](crate::ecs::components::Body) is
//! skipped.

use hecs::Entity;

use super::arbiter::{Arbiter, ContactParams};
use super::constraint::Constraint;
use super::rigid_body::with_bodies;

/// Prepare every solving arbiter, then every constraint.
pub(crate) fn pre_step(
    world: &hecs::World,
    arbiters: &mut [Arbiter],
    constraints: &[Entity],
    params: &ContactParams,
    dt: f32,
) {
    for arbiter in arbiters.iter_mut().filter(|arb| arb.solving) {
        let (a, b) = arbiter.solver_bodies();
        with_bodies(world, a, b, |a, b| arbiter.pre_step(a, b, params));
    }

    for &entity in constraints {
        if let Ok(mut constraint) = world.get::<&mut Constraint>(entity) {
            let (a, b) = (constraint.body_a(), constraint.body_b());
            with_bodies(world, a, b, |a, b| constraint.pre_step(a, b, dt, params.inv_dt));
        }
    }
}

/// Re-apply last step's contact impulses.
pub(crate) fn apply_cached_impulses(world: &hecs::World, arbiters: &[Arbiter]) {
    for arbiter in arbiters.iter().filter(|arb| arb.solving) {
        let (a, b) = arbiter.solver_bodies();
        with_bodies(world, a, b, |a, b| arbiter.apply_cached_impulse(a, b));
    }
}

/// Run `iterations` passes over arbiters then constraints.
pub(crate) fn solve(
    world: &hecs::World,
    arbiters: &mut [Arbiter],
    constraints: &[Entity],
    iterations: u32,
) {
    for _ in 0..iterations {
        for arbiter in arbiters.iter_mut().filter(|arb| arb.solving) {
            let (a, b) = arbiter.solver_bodies();
            with_bodies(world, a, b, |a, b| arbiter.apply_impulse(a, b, 1.0));
        }

        for &entity in constraints {
            if let Ok(mut constraint) = world.get::<&mut Constraint>(entity) {
                let (a, b) = (constraint.body_a(), constraint.body_b());
                with_bodies(world, a, b, |a, b| constraint.apply_impulse(a, b));
            }
        }
    }
}
