//! Collision callbacks keyed by ordered pairs of collision types.

use std::collections::HashMap;

use crate::ecs::components::physics::CollisionType;

use super::arbiter::Arbiter;

/// Ordered pair of collision types a handler was registered for.
pub type HandlerKey = (CollisionType, CollisionType);

/// Callbacks invoked for arbiters whose shapes match a registered type pair.
///
/// Arbiters passed to a handler present their shapes in registration order:
/// [`Arbiter::shapes`] returns the shape of the first type first, and
/// normals and impulse sums are oriented to match. The world is read-only
/// during callbacks; record changes and apply them after the step.
pub trait CollisionHandler: Send {
    /// First step the shapes touch. Returning false ignores the pair until
    /// they separate.
    fn begin(&mut self, _arbiter: &mut Arbiter, _world: &hecs::World) -> bool {
        true
    }

    /// Every touching step before solving. Returning false skips the
    /// contacts for this step only. Elasticity, friction and surface
    /// velocity may be overridden here.
    fn pre_solve(&mut self, _arbiter: &mut Arbiter, _world: &hecs::World) -> bool {
        true
    }

    /// After solving, with impulses available.
    fn post_solve(&mut self, _arbiter: &Arbiter, _world: &hecs::World) {}

    /// First step the shapes no longer touch.
    fn separate(&mut self, _arbiter: &Arbiter, _world: &hecs::World) {}
}

/// Registered handlers.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Box<dyn CollisionHandler>>,
}

impl HandlerRegistry {
    pub fn insert(&mut self, key: HandlerKey, handler: Box<dyn CollisionHandler>) {
        if self.handlers.insert(key, handler).is_some() {
            tracing::debug!("Replaced collision handler for {:?}", key);
        }
    }

    pub fn remove(&mut self, key: HandlerKey) -> Option<Box<dyn CollisionHandler>> {
        self.handlers.remove(&key)
    }

    /// Key and orientation for a pair of types in solver order.
    ///
    /// Returns `(key, swapped)` where `swapped` is true when the handler was
    /// registered for the reversed pair.
    pub fn resolve(&self, a: CollisionType, b: CollisionType) -> Option<(HandlerKey, bool)> {
        if self.handlers.contains_key(&(a, b)) {
            Some(((a, b), false))
        } else if self.handlers.contains_key(&(b, a)) {
            Some(((b, a), true))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, key: HandlerKey) -> Option<&mut (dyn CollisionHandler + 'static)> {
        self.handlers.get_mut(&key).map(|h| h.as_mut())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}
