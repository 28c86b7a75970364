//! 2D rigid body simulation with persistent contacts and joints.
//!
//! # Architecture
//!
//! A [`Space`] owns a `hecs::World` holding bodies, shapes and constraints.
//! Each fixed step runs:
//!
//! 1. Refresh shape bounding boxes
//! 2. Broadphase candidate pairs (sweep and prune)
//! 3. Narrowphase contacts, injected into persistent arbiters
//! 4. Collision handler `begin` / `pre_solve`
//! 5. Cache arbiters whose shapes separated, expire old cached ones
//! 6. Pre-step arbiters, then constraints
//! 7. Integrate velocities, apply cached impulses
//! 8. Sequential impulse iterations
//! 9. Handler `post_solve`, integrate positions, clear forces

pub mod arbiter;
pub mod broadphase;
pub mod collider;
pub mod constraint;
pub mod contact;
pub mod error;
pub mod handler;
pub mod narrowphase;
pub mod query;
pub mod rigid_body;
mod solver;

use std::collections::HashMap;

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::{Body, BodyShapes, CollisionType, Shape};

use self::arbiter::{Arbiter, ArbiterState, ContactParams};
use self::broadphase::SweepAndPrune;
use self::constraint::Constraint;
use self::error::{PhysicsError, Result};
use self::handler::{CollisionHandler, HandlerRegistry};

pub use self::query::QueryFilter;

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct SpaceConfig {
    /// Gravity vector. Default: (0, -9.81).
    pub gravity: Vec2,
    /// Fixed timestep for [`Space::step`] in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per [`Space::step`] call. Default: 4.
    pub max_substeps: u32,
    /// Number of solver iterations per step. Default: 10.
    pub iterations: u32,
    /// Penetration allowed before position correction kicks in. Default: 0.1.
    pub collision_slop: f32,
    /// Fraction of contact overlap corrected per step. Default: 0.1.
    pub collision_bias_coef: f32,
    /// Largest contact correction velocity. Default: infinity.
    pub max_contact_bias: f32,
    /// Steps an arbiter is cached after its shapes separate. Default: 3.
    pub collision_persistence: u64,
    /// Fraction of velocity kept per second. Default: 1.0 (no damping).
    pub damping: f32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            iterations: 10,
            collision_slop: 0.1,
            collision_bias_coef: 0.1,
            max_contact_bias: f32::INFINITY,
            collision_persistence: 3,
            damping: 1.0,
        }
    }
}

/// Normalized key for an unordered pair of handles.
fn pair_key(a: Entity, b: Entity) -> (Entity, Entity) {
    if a.to_bits() <= b.to_bits() {
        (a, b)
    } else {
        (b, a)
    }
}

/// The simulation: bodies, shapes, constraints and contact state.
pub struct Space {
    config: SpaceConfig,
    world: hecs::World,
    static_body: Entity,
    accumulator: f64,
    stamp: u64,
    next_hash_id: u64,
    broadphase: SweepAndPrune,
    constraints: Vec<Entity>,
    no_collide: HashMap<(Entity, Entity), usize>,
    arbiters: Vec<Arbiter>,
    arbiter_lookup: HashMap<(Entity, Entity), usize>,
    handlers: HandlerRegistry,
    sensor_overlaps: Vec<(Entity, Entity)>,
}

impl Default for Space {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl Space {
    /// Create an empty space with its static body.
    pub fn new(config: SpaceConfig) -> Self {
        let mut world = hecs::World::new();
        let static_body = world.spawn((Body::new_static(), BodyShapes::default()));
        Self {
            config,
            world,
            static_body,
            accumulator: 0.0,
            stamp: 0,
            next_hash_id: 0,
            broadphase: SweepAndPrune::new(),
            constraints: Vec::new(),
            no_collide: HashMap::new(),
            arbiters: Vec::new(),
            arbiter_lookup: HashMap::new(),
            handlers: HandlerRegistry::default(),
            sensor_overlaps: Vec::new(),
        }
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SpaceConfig {
        &mut self.config
    }

    /// The underlying world. Attach user components to body or shape entities here.
    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    /// Mutable access to the world.
    ///
    /// Despawning body, shape or constraint entities directly bypasses the
    /// bookkeeping done by the `remove_*` methods; use those instead.
    pub fn world_mut(&mut self) -> &mut hecs::World {
        &mut self.world
    }

    /// The immovable body shared by all static geometry.
    pub fn static_body(&self) -> Entity {
        self.static_body
    }

    /// Number of steps taken so far.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    // -----------------------------------------------------------------------
    // Bodies
    // -----------------------------------------------------------------------

    pub fn add_body(&mut self, body: Body) -> Entity {
        self.world.spawn((body, BodyShapes::default()))
    }

    /// Remove a body with no shapes or constraints attached.
    pub fn remove_body(&mut self, body: Entity) -> Result<Body> {
        if body == self.static_body {
            return Err(PhysicsError::StaticBodyRemoval);
        }
        let shapes = self
            .world
            .get::<&BodyShapes>(body)
            .map_err(|_| PhysicsError::NoSuchBody(body))?
            .0
            .len();
        let constraints = self
            .constraints
            .iter()
            .filter(|&&c| {
                self.world
                    .get::<&Constraint>(c)
                    .map(|c| c.body_a() == body || c.body_b() == body)
                    .unwrap_or(false)
            })
            .count();
        if shapes > 0 || constraints > 0 {
            return Err(PhysicsError::BodyInUse {
                body,
                shapes,
                constraints,
            });
        }

        let removed = self
            .world
            .remove_one::<Body>(body)
            .map_err(|_| PhysicsError::NoSuchBody(body))?;
        // The entity may still carry user components.
        let _ = self.world.despawn(body);
        Ok(removed)
    }

    pub fn body(&self, body: Entity) -> Result<hecs::Ref<'_, Body>> {
        self.world
            .get::<&Body>(body)
            .map_err(|_| PhysicsError::NoSuchBody(body))
    }

    pub fn body_mut(&mut self, body: Entity) -> Result<hecs::RefMut<'_, Body>> {
        self.world
            .get::<&mut Body>(body)
            .map_err(|_| PhysicsError::NoSuchBody(body))
    }

    // -----------------------------------------------------------------------
    // Shapes
    // -----------------------------------------------------------------------

    /// Attach a shape to its body and cache its bounding box.
    pub fn add_shape(&mut self, mut shape: Shape) -> Result<Entity> {
        let body = shape.body();
        {
            let b = self
                .world
                .get::<&Body>(body)
                .map_err(|_| PhysicsError::NoSuchBody(body))?;
            shape.update(&b);
        }
        shape.hash_id = self.next_hash_id;
        self.next_hash_id += 1;

        let entity = self.world.spawn((shape,));
        let listed = match self.world.get::<&mut BodyShapes>(body) {
            Ok(mut shapes) => {
                shapes.0.push(entity);
                true
            }
            Err(_) => false,
        };
        if !listed {
            // Bodies spawned through `world_mut` start without a shape list.
            self.world
                .insert_one(body, BodyShapes(vec![entity]))
                .map_err(|_| PhysicsError::NoSuchBody(body))?;
        }
        tracing::debug!("Added shape {:?} to body {:?}", entity, body);
        Ok(entity)
    }

    /// Detach a shape and drop every arbiter that references it.
    pub fn remove_shape(&mut self, shape: Entity) -> Result<Shape> {
        let body = self.shape(shape)?.body();

        let Self {
            world,
            arbiters,
            handlers,
            ..
        } = self;
        for arb in arbiters.iter() {
            let (sa, sb) = arb.solver_shapes();
            if (sa == shape || sb == shape) && arb.state != ArbiterState::Cached {
                if let Some(handler) = arb.handler.and_then(|key| handlers.get_mut(key)) {
                    handler.separate(arb, world);
                }
            }
        }
        self.arbiters.retain(|arb| {
            let (sa, sb) = arb.solver_shapes();
            sa != shape && sb != shape
        });
        self.rebuild_arbiter_lookup();

        if let Ok(mut shapes) = self.world.get::<&mut BodyShapes>(body) {
            shapes.0.retain(|&s| s != shape);
        }
        let removed = self
            .world
            .remove_one::<Shape>(shape)
            .map_err(|_| PhysicsError::NoSuchShape(shape))?;
        let _ = self.world.despawn(shape);
        tracing::debug!("Removed shape {:?}", shape);
        Ok(removed)
    }

    pub fn shape(&self, shape: Entity) -> Result<hecs::Ref<'_, Shape>> {
        self.world
            .get::<&Shape>(shape)
            .map_err(|_| PhysicsError::NoSuchShape(shape))
    }

    pub fn shape_mut(&mut self, shape: Entity) -> Result<hecs::RefMut<'_, Shape>> {
        self.world
            .get::<&mut Shape>(shape)
            .map_err(|_| PhysicsError::NoSuchShape(shape))
    }

    // -----------------------------------------------------------------------
    // Constraints
    // -----------------------------------------------------------------------

    /// Register a constraint. Both bodies must belong to this space.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<Entity> {
        for body in [constraint.body_a(), constraint.body_b()] {
            if self.world.get::<&Body>(body).is_err() {
                return Err(PhysicsError::NoSuchBody(body));
            }
        }
        if !constraint.collide_bodies() {
            *self
                .no_collide
                .entry(pair_key(constraint.body_a(), constraint.body_b()))
                .or_insert(0) += 1;
        }

        let entity = self.world.spawn((constraint,));
        self.constraints.push(entity);
        tracing::debug!("Added constraint {:?}", entity);
        Ok(entity)
    }

    /// Deregister a constraint. Its handle becomes invalid.
    pub fn remove_constraint(&mut self, constraint: Entity) -> Result<Constraint> {
        let removed = self
            .world
            .remove_one::<Constraint>(constraint)
            .map_err(|_| PhysicsError::NoSuchConstraint(constraint))?;
        let _ = self.world.despawn(constraint);
        self.constraints.retain(|&c| c != constraint);

        if !removed.collide_bodies() {
            let key = pair_key(removed.body_a(), removed.body_b());
            if let Some(count) = self.no_collide.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.no_collide.remove(&key);
                }
            }
        }
        tracing::debug!("Removed constraint {:?}", constraint);
        Ok(removed)
    }

    pub fn constraint(&self, constraint: Entity) -> Result<hecs::Ref<'_, Constraint>> {
        self.world
            .get::<&Constraint>(constraint)
            .map_err(|_| PhysicsError::NoSuchConstraint(constraint))
    }

    /// Mutable constraint access. `collide_bodies` cannot change here.
    pub fn constraint_mut(&mut self, constraint: Entity) -> Result<hecs::RefMut<'_, Constraint>> {
        self.world
            .get::<&mut Constraint>(constraint)
            .map_err(|_| PhysicsError::NoSuchConstraint(constraint))
    }

    /// Registered constraints in solve order.
    pub fn constraints(&self) -> &[Entity] {
        &self.constraints
    }

    // -----------------------------------------------------------------------
    // Arbiters and handlers
    // -----------------------------------------------------------------------

    /// Live and cached arbiters in creation order.
    pub fn arbiters(&self) -> &[Arbiter] {
        &self.arbiters
    }

    /// The arbiter for a pair of shapes, in either order.
    pub fn arbiter(&self, a: Entity, b: Entity) -> Option<&Arbiter> {
        let index = *self.arbiter_lookup.get(&pair_key(a, b))?;
        self.arbiters.get(index)
    }

    /// Register `handler` for shapes of collision types `a` and `b`.
    ///
    /// Replaces any handler registered for the same ordered pair.
    pub fn add_collision_handler(
        &mut self,
        a: CollisionType,
        b: CollisionType,
        handler: impl CollisionHandler + 'static,
    ) {
        self.handlers.insert((a, b), Box::new(handler));
    }

    pub fn remove_collision_handler(
        &mut self,
        a: CollisionType,
        b: CollisionType,
    ) -> Option<Box<dyn CollisionHandler>> {
        let removed = self.handlers.remove((a, b));
        if removed.is_some() {
            for arb in &mut self.arbiters {
                if arb.handler == Some((a, b)) {
                    arb.handler = None;
                }
            }
        }
        removed
    }

    /// Sensor shape pairs found touching during the last step.
    pub fn sensor_overlaps(&self) -> &[(Entity, Entity)] {
        &self.sensor_overlaps
    }

    /// Collision filter between two shapes.
    ///
    /// Shapes never collide when they share a non-zero group, have no layer
    /// in common, share a body, both sit on static bodies, or their bodies
    /// are joined by a constraint that disables collisions.
    pub fn can_collide(&self, a: Entity, b: Entity) -> bool {
        match (self.world.get::<&Shape>(a), self.world.get::<&Shape>(b)) {
            (Ok(sa), Ok(sb)) => self.filter_shapes(&sa, &sb),
            _ => false,
        }
    }

    fn filter_shapes(&self, a: &Shape, b: &Shape) -> bool {
        if !a.can_collide_with(b) || a.body() == b.body() {
            return false;
        }
        let is_static = |body: Entity| {
            self.world
                .get::<&Body>(body)
                .map(|b| b.is_static())
                .unwrap_or(true)
        };
        if is_static(a.body()) && is_static(b.body()) {
            return false;
        }
        !self.no_collide.contains_key(&pair_key(a.body(), b.body()))
    }

    fn rebuild_arbiter_lookup(&mut self) {
        self.arbiter_lookup.clear();
        for (index, arb) in self.arbiters.iter().enumerate() {
            let (a, b) = arb.solver_shapes();
            self.arbiter_lookup.insert(pair_key(a, b), index);
        }
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Step the simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator to keep the simulation deterministic.
    pub fn step(&mut self, delta_time: f64) {
        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.fixed_step(self.config.fixed_timestep as f32);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            tracing::warn!(
                "Physics fell behind by {:.3}s, dropping accumulated time",
                self.accumulator
            );
            self.accumulator = 0.0;
        }
    }

    /// Refresh world-space geometry and bounding boxes of every shape.
    pub fn update_bounding_boxes(&mut self) {
        for (_, shape) in self.world.query::<&mut Shape>().iter() {
            if let Ok(body) = self.world.get::<&Body>(shape.body()) {
                shape.update(&body);
            }
        }
    }

    /// One step of `dt` seconds using the built-in broadphase.
    pub fn fixed_step(&mut self, dt: f32) {
        self.update_bounding_boxes();
        let pairs = self.broadphase.find_pairs(&self.world);
        self.step_pairs(dt, &pairs);
    }

    /// One step of `dt` seconds with externally supplied candidate shape pairs.
    ///
    /// Pairs may be in any order and may include non-overlapping or
    /// filtered shapes; duplicates are ignored.
    pub fn step_with_pairs(&mut self, dt: f32, pairs: &[(Entity, Entity)]) {
        self.update_bounding_boxes();
        self.step_pairs(dt, pairs);
    }

    fn step_pairs(&mut self, dt: f32, pairs: &[(Entity, Entity)]) {
        if !(dt > 0.0) {
            return;
        }
        let inv_dt = 1.0 / dt;
        let stamp = self.stamp;

        // Narrowphase and arbiter injection.
        self.sensor_overlaps.clear();
        for &(a, b) in pairs {
            self.collide_pair(a, b);
        }

        self.run_begin_and_pre_solve();
        self.expire_stale_arbiters();

        let params = ContactParams {
            inv_dt,
            slop: self.config.collision_slop,
            bias_coef: self.config.collision_bias_coef,
            max_bias: self.config.max_contact_bias,
        };
        solver::pre_step(&self.world, &mut self.arbiters, &self.constraints, &params, dt);

        rigid_body::integrate_velocities(
            &mut self.world,
            self.config.gravity,
            self.config.damping,
            dt,
        );

        solver::apply_cached_impulses(&self.world, &self.arbiters);
        solver::solve(
            &self.world,
            &mut self.arbiters,
            &self.constraints,
            self.config.iterations,
        );

        self.run_post_solve();

        rigid_body::integrate_positions(&mut self.world, dt);
        rigid_body::clear_forces(&mut self.world);

        for arb in &mut self.arbiters {
            if arb.stamp == stamp && arb.state == ArbiterState::FirstCollision {
                arb.state = ArbiterState::Normal;
            }
            arb.solving = false;
        }

        tracing::trace!(
            "Step {}: {} pairs, {} arbiters, {} constraints",
            stamp,
            pairs.len(),
            self.arbiters.len(),
            self.constraints.len()
        );
        self.stamp += 1;
    }

    /// Narrowphase for one candidate pair. Creates or refreshes its arbiter.
    fn collide_pair(&mut self, a: Entity, b: Entity) {
        let (Ok(sa), Ok(sb)) = (self.world.get::<&Shape>(a), self.world.get::<&Shape>(b)) else {
            return;
        };
        if a == b || !self.filter_shapes(&sa, &sb) || !sa.bb().overlaps(&sb.bb()) {
            return;
        }

        // Canonical order keeps contact normals and hashes stable across steps.
        let ((ea, sa), (eb, sb)) = if (sa.kind().rank(), sa.hash_id) <= (sb.kind().rank(), sb.hash_id)
        {
            ((a, sa), (b, sb))
        } else {
            ((b, sb), (a, sa))
        };

        let contacts = narrowphase::collide(&sa, &sb, self.config.collision_slop);
        if contacts.is_empty() {
            return;
        }
        if sa.sensor || sb.sensor {
            let key = pair_key(ea, eb);
            if !self
                .sensor_overlaps
                .iter()
                .any(|&(x, y)| pair_key(x, y) == key)
            {
                self.sensor_overlaps.push((ea, eb));
            }
            return;
        }

        let stamp = self.stamp;
        let key = pair_key(ea, eb);
        let index = match self.arbiter_lookup.get(&key) {
            Some(&index) => index,
            None => {
                tracing::debug!("New arbiter for shapes {:?} and {:?}", ea, eb);
                self.arbiters.push(Arbiter::new(ea, &sa, eb, &sb, stamp));
                self.arbiter_lookup.insert(key, self.arbiters.len() - 1);
                self.arbiters.len() - 1
            }
        };

        let arb = &mut self.arbiters[index];
        if arb.stamp == stamp && arb.solving {
            // Duplicate candidate pair this step.
            return;
        }
        arb.update(contacts, &sa, &sb, stamp);
        match self.handlers.resolve(sa.collision_type, sb.collision_type) {
            Some((handler, swapped)) => {
                arb.handler = Some(handler);
                arb.swapped = swapped;
            }
            None => {
                arb.handler = None;
                arb.swapped = false;
            }
        }
        arb.solving = true;
    }

    fn run_begin_and_pre_solve(&mut self) {
        let stamp = self.stamp;
        let Self {
            world,
            arbiters,
            handlers,
            ..
        } = self;

        for arb in arbiters.iter_mut().filter(|arb| arb.stamp == stamp && arb.solving) {
            let mut handler = arb.handler.and_then(|key| handlers.get_mut(key));

            if arb.state == ArbiterState::FirstCollision {
                if let Some(h) = handler.as_deref_mut() {
                    if !h.begin(arb, world) {
                        arb.state = ArbiterState::Ignore;
                    }
                }
            }

            arb.solving = arb.state != ArbiterState::Ignore
                && handler.map_or(true, |h| h.pre_solve(arb, world));
        }
    }

    fn run_post_solve(&mut self) {
        let Self {
            world,
            arbiters,
            handlers,
            ..
        } = self;

        for arb in arbiters.iter().filter(|arb| arb.solving) {
            if let Some(handler) = arb.handler.and_then(|key| handlers.get_mut(key)) {
                handler.post_solve(arb, world);
            }
        }
    }

    /// Cache arbiters whose shapes stopped touching and drop expired ones.
    fn expire_stale_arbiters(&mut self) {
        let stamp = self.stamp;
        let persistence = self.config.collision_persistence;
        let Self {
            world,
            arbiters,
            handlers,
            ..
        } = self;

        for arb in arbiters.iter_mut() {
            if arb.stamp != stamp && arb.state != ArbiterState::Cached {
                if let Some(handler) = arb.handler.and_then(|key| handlers.get_mut(key)) {
                    handler.separate(arb, world);
                }
                arb.mark_cached();
            }
        }

        let before = arbiters.len();
        arbiters.retain(|arb| {
            arb.state != ArbiterState::Cached || stamp.saturating_sub(arb.stamp) < persistence
        });
        if arbiters.len() != before {
            tracing::debug!("Expired {} arbiter(s)", before - arbiters.len());
            self.rebuild_arbiter_lookup();
        }
    }
}
