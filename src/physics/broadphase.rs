//! Broadphase collision detection using AABB overlap tests.

use hecs::Entity;

use crate::ecs::components::physics::{Body, Shape};

use super::collider::Aabb;

/// Sweep-and-prune broadphase along the x axis.
///
/// Reads the bounding boxes cached on each [`Shape`]; refresh them with
/// [`Space::update_bounding_boxes`](super::Space::update_bounding_boxes)
/// before calling [`find_pairs`](Self::find_pairs).
pub struct SweepAndPrune {
    entries: Vec<(Entity, Aabb, bool)>,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Find all pairs of shapes whose AABBs overlap.
    ///
    /// Pairs whose bodies are both static are skipped. Sensors are included.
    /// The result order only depends on the shapes' positions and handles.
    pub fn find_pairs(&mut self, world: &hecs::World) -> Vec<(Entity, Entity)> {
        self.entries.clear();
        for (entity, shape) in world.query::<&Shape>().iter() {
            let is_static = world
                .get::<&Body>(shape.body())
                .map(|body| body.is_static())
                .unwrap_or(true);
            self.entries.push((entity, shape.bb(), is_static));
        }

        self.entries.sort_by(|(ea, a, _), (eb, b, _)| {
            a.min
                .x
                .total_cmp(&b.min.x)
                .then_with(|| ea.to_bits().cmp(&eb.to_bits()))
        });

        let mut pairs = Vec::new();
        for (i, (entity_a, aabb_a, static_a)) in self.entries.iter().enumerate() {
            for (entity_b, aabb_b, static_b) in &self.entries[i + 1..] {
                if aabb_b.min.x > aabb_a.max.x {
                    break;
                }
                // Skip static-static pairs
                if *static_a && *static_b {
                    continue;
                }
                if aabb_a.overlaps(aabb_b) {
                    pairs.push((*entity_a, *entity_b));
                }
            }
        }

        tracing::trace!("Broadphase: {} shapes, {} pairs", self.entries.len(), pairs.len());
        pairs
    }
}
