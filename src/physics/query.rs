//! Point and segment queries against the shapes of a [`Space`].
//!
//! Queries read the geometry cached at the last step or
//! [`Space::update_bounding_boxes`] call. Sensors are included.

use glam::Vec2;
use hecs::Entity;

use crate::ecs::components::physics::{Group, Layers, Shape, ALL_LAYERS, NO_GROUP};

use super::collider::SegmentQueryInfo;
use super::Space;

/// Which shapes a query may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFilter {
    /// Only shapes sharing at least one layer bit match.
    pub layers: Layers,
    /// Shapes in this group are skipped. [`NO_GROUP`] skips nothing.
    pub group: Group,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            layers: ALL_LAYERS,
            group: NO_GROUP,
        }
    }
}

impl QueryFilter {
    pub fn matches(&self, shape: &Shape) -> bool {
        shape.layers & self.layers != 0 && (self.group == NO_GROUP || shape.group != self.group)
    }
}

impl Space {
    /// Every shape containing `point`.
    pub fn point_query(&self, point: Vec2, filter: QueryFilter) -> Vec<Entity> {
        self.world
            .query::<&Shape>()
            .iter()
            .filter(|(_, shape)| filter.matches(shape) && shape.point_query(point))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// The shape containing `point` most deeply.
    pub fn point_query_first(&self, point: Vec2, filter: QueryFilter) -> Option<Entity> {
        let mut best: Option<(Entity, f32)> = None;
        for (entity, shape) in self.world.query::<&Shape>().iter() {
            if !filter.matches(shape) {
                continue;
            }
            if let Some(depth) = shape.point_depth(point) {
                if best.map_or(true, |(_, d)| depth > d) {
                    best = Some((entity, depth));
                }
            }
        }
        best.map(|(entity, _)| entity)
    }

    /// Every shape hit by the segment from `start` to `end`, in no particular order.
    pub fn segment_query(
        &self,
        start: Vec2,
        end: Vec2,
        filter: QueryFilter,
    ) -> Vec<(Entity, SegmentQueryInfo)> {
        self.world
            .query::<&Shape>()
            .iter()
            .filter(|(_, shape)| filter.matches(shape))
            .filter_map(|(entity, shape)| Some((entity, shape.segment_query(start, end)?)))
            .collect()
    }

    /// The first shape hit travelling from `start` to `end`.
    pub fn segment_query_first(
        &self,
        start: Vec2,
        end: Vec2,
        filter: QueryFilter,
    ) -> Option<(Entity, SegmentQueryInfo)> {
        let mut best: Option<(Entity, SegmentQueryInfo)> = None;
        for (entity, shape) in self.world.query::<&Shape>().iter() {
            if !filter.matches(shape) {
                continue;
            }
            if let Some(info) = shape.segment_query(start, end) {
                if best.as_ref().map_or(true, |(_, b)| info.t < b.t) {
                    best = Some((entity, info));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::physics::Body;
    use crate::physics::SpaceConfig;

    fn space_with_shapes() -> (Space, Entity, Entity, Entity) {
        let mut space = Space::new(SpaceConfig::default());
        let ground = space.static_body();
        let floor = space
            .add_shape(
                Shape::segment(ground, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0).unwrap(),
            )
            .unwrap();

        let ball_body = space.add_body(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(0.0, 3.0)),
        );
        let ball = space
            .add_shape(Shape::circle(ball_body, 1.0, Vec2::ZERO).unwrap().with_layers(0b01))
            .unwrap();

        let box_body = space.add_body(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(2.0, 3.0)),
        );
        let block = space
            .add_shape(Shape::new_box(box_body, 4.0, 4.0).with_group(7))
            .unwrap();
        (space, floor, ball, block)
    }

    #[test]
    fn test_point_query_finds_all_containing_shapes() {
        let (space, _, ball, block) = space_with_shapes();
        let mut hits = space.point_query(Vec2::new(0.2, 3.0), QueryFilter::default());
        hits.sort_by_key(|e| e.to_bits());
        let mut expected = vec![ball, block];
        expected.sort_by_key(|e| e.to_bits());
        assert_eq!(hits, expected);

        assert!(space
            .point_query(Vec2::new(50.0, 50.0), QueryFilter::default())
            .is_empty());
    }

    #[test]
    fn test_point_query_first_prefers_deepest() {
        let (space, _, ball, block) = space_with_shapes();
        // Box spans x in [0, 4], ball is centered on its left edge.
        assert_eq!(
            space.point_query_first(Vec2::new(0.8, 3.0), QueryFilter::default()),
            Some(block)
        );
        assert_eq!(
            space.point_query_first(Vec2::new(0.1, 3.0), QueryFilter::default()),
            Some(ball)
        );
    }

    #[test]
    fn test_point_query_filter() {
        let (space, _, ball, _) = space_with_shapes();
        let skip_group = QueryFilter {
            group: 7,
            ..QueryFilter::default()
        };
        assert_eq!(space.point_query(Vec2::new(0.0, 3.0), skip_group), vec![ball]);

        let other_layer = QueryFilter {
            layers: 0b10,
            ..QueryFilter::default()
        };
        let hits = space.point_query(Vec2::new(0.0, 3.0), other_layer);
        assert!(!hits.contains(&ball));
    }

    #[test]
    fn test_segment_query_first_returns_closest() {
        let (space, floor, _, block) = space_with_shapes();
        let start = Vec2::new(0.5, 10.0);
        let end = Vec2::new(0.5, -10.0);

        let (hit, info) = space
            .segment_query_first(start, end, QueryFilter::default())
            .unwrap();
        assert_eq!(hit, block);
        // Box top at y = 5.
        assert!((info.hit_point(start, end).y - 5.0).abs() < 1e-4);
        assert!((info.normal - Vec2::Y).length() < 1e-5);
        assert!((info.hit_distance(start, end) - 5.0).abs() < 1e-4);

        let all = space.segment_query(start, end, QueryFilter::default());
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|(e, _)| *e == floor));
    }

    #[test]
    fn test_segment_query_miss() {
        let (space, _, _, _) = space_with_shapes();
        assert!(space
            .segment_query_first(
                Vec2::new(20.0, 1.0),
                Vec2::new(30.0, 1.0),
                QueryFilter::default()
            )
            .is_none());
    }
}
