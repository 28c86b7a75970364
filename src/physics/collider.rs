//! Shape geometry caching, bounding boxes and point/segment queries.

use glam::Vec2;

use crate::ecs::components::physics::{Body, PolyAxis, Shape, ShapeKind, NO_GROUP};

/// Axis-aligned bounding box for broadphase collision detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box of half-size `r` around `center`.
    pub fn around(center: Vec2, r: f32) -> Self {
        Self {
            min: center - Vec2::splat(r),
            max: center + Vec2::splat(r),
        }
    }

    /// Smallest box enclosing `points`, or an empty box at the origin.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        points.iter().skip(1).fold(Self::new(*first, *first), |bb, p| Self {
            min: bb.min.min(*p),
            max: bb.max.max(*p),
        })
    }

    /// Test whether two boxes overlap. Touching boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// Box grown by `r` on every side.
    pub fn expand(&self, r: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(r),
            max: self.max + Vec2::splat(r),
        }
    }
}

/// Result of a segment query against a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentQueryInfo {
    /// Fraction along the query segment, in `[0, 1]`.
    pub t: f32,
    /// Surface normal at the hit point.
    pub normal: Vec2,
}

impl SegmentQueryInfo {
    /// World-space hit point on the segment `start..end`.
    pub fn hit_point(&self, start: Vec2, end: Vec2) -> Vec2 {
        start.lerp(end, self.t)
    }

    /// Distance from `start` to the hit point.
    pub fn hit_distance(&self, start: Vec2, end: Vec2) -> f32 {
        start.distance(end) * self.t
    }
}

impl Shape {
    /// Recompute world-space geometry and the bounding box from `body`.
    pub fn update(&mut self, body: &Body) -> Aabb {
        self.cache_bb(body.position, body.rotation())
    }

    /// Recompute world-space geometry for a body at `position` with unit `rotation`.
    pub fn cache_bb(&mut self, position: Vec2, rotation: Vec2) -> Aabb {
        let bb = match self.kind_mut() {
            ShapeKind::Circle(circle) => {
                circle.world_center = position + rotation.rotate(circle.center());
                Aabb::around(circle.world_center, circle.radius())
            }
            ShapeKind::Segment(seg) => {
                seg.world_a = position + rotation.rotate(seg.a());
                seg.world_b = position + rotation.rotate(seg.b());
                seg.world_normal = rotation.rotate(seg.normal());
                Aabb::new(seg.world_a.min(seg.world_b), seg.world_a.max(seg.world_b))
                    .expand(seg.radius())
            }
            ShapeKind::Polygon(poly) => {
                let world_verts: Vec<Vec2> = poly
                    .verts()
                    .iter()
                    .map(|v| position + rotation.rotate(*v))
                    .collect();
                let world_axes = poly
                    .axes()
                    .iter()
                    .map(|axis| {
                        let n = rotation.rotate(axis.n);
                        PolyAxis {
                            n,
                            d: position.dot(n) + axis.d,
                        }
                    })
                    .collect();
                let bb = Aabb::from_points(&world_verts);
                poly.world_verts = world_verts;
                poly.world_axes = world_axes;
                bb
            }
        };
        self.bb = bb;
        bb
    }

    /// Group and layer filtering between two shapes. Symmetric.
    pub fn can_collide_with(&self, other: &Shape) -> bool {
        let same_group = self.group != NO_GROUP && self.group == other.group;
        !same_group && self.layers & other.layers != 0
    }

    /// True when `p` lies inside or on the boundary of the shape.
    pub fn point_query(&self, p: Vec2) -> bool {
        self.point_depth(p).is_some()
    }

    /// Penetration depth of `p` into the shape, `None` when outside.
    pub fn point_depth(&self, p: Vec2) -> Option<f32> {
        match self.kind() {
            ShapeKind::Circle(circle) => {
                let dist = p.distance(circle.world_center());
                (dist <= circle.radius()).then(|| circle.radius() - dist)
            }
            ShapeKind::Segment(seg) => {
                let closest = closest_point_on_segment(p, seg.world_a(), seg.world_b());
                let dist = p.distance(closest);
                (dist <= seg.radius()).then(|| seg.radius() - dist)
            }
            ShapeKind::Polygon(poly) => {
                if !self.bb.contains_point(p) {
                    return None;
                }
                let max_dist = poly
                    .world_axes()
                    .iter()
                    .map(|axis| axis.n.dot(p) - axis.d)
                    .fold(f32::NEG_INFINITY, f32::max);
                (max_dist <= 0.0).then_some(-max_dist)
            }
        }
    }

    /// First intersection of the segment `a..b` with the shape.
    pub fn segment_query(&self, a: Vec2, b: Vec2) -> Option<SegmentQueryInfo> {
        match self.kind() {
            ShapeKind::Circle(circle) => {
                circle_segment_query(circle.world_center(), circle.radius(), a, b)
            }
            ShapeKind::Segment(seg) => segment_segment_query(
                seg.world_a(),
                seg.world_b(),
                seg.world_normal(),
                seg.radius(),
                a,
                b,
            ),
            ShapeKind::Polygon(poly) => {
                let verts = poly.world_verts();
                let mut best: Option<SegmentQueryInfo> = None;
                for (i, axis) in poly.world_axes().iter().enumerate() {
                    let an = a.dot(axis.n);
                    // Start point behind this edge.
                    if axis.d > an {
                        continue;
                    }
                    let bn = b.dot(axis.n);
                    let t = (axis.d - an) / (bn - an);
                    if !(0.0..=1.0).contains(&t) {
                        continue;
                    }

                    let point = a.lerp(b, t);
                    let tangent = -axis.n.perp();
                    let dt = tangent.dot(point);
                    let dt_min = tangent.dot(verts[i]);
                    let dt_max = tangent.dot(verts[(i + 1) % verts.len()]);
                    if dt_min <= dt && dt <= dt_max && best.map_or(true, |info| t < info.t) {
                        best = Some(SegmentQueryInfo { t, normal: axis.n });
                    }
                }
                best
            }
        }
    }
}

/// Closest point to `p` on the segment `a..b`.
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let delta = b - a;
    let len_sq = delta.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(delta) / len_sq).clamp(0.0, 1.0);
    a + delta * t
}

fn circle_segment_query(
    center: Vec2,
    r: f32,
    a: Vec2,
    b: Vec2,
) -> Option<SegmentQueryInfo> {
    let a = a - center;
    let b = b - center;

    let qa = a.dot(a) - 2.0 * a.dot(b) + b.dot(b);
    let qb = -2.0 * a.dot(a) + 2.0 * a.dot(b);
    let qc = a.dot(a) - r * r;

    // Degenerate query segment.
    if qa == 0.0 {
        return None;
    }

    let det = qb * qb - 4.0 * qa * qc;
    if det < 0.0 {
        return None;
    }

    let t = (-qb - det.sqrt()) / (2.0 * qa);
    (0.0..=1.0).contains(&t).then(|| SegmentQueryInfo {
        t,
        normal: a.lerp(b, t).normalize_or_zero(),
    })
}

fn segment_segment_query(
    ta: Vec2,
    tb: Vec2,
    tn: Vec2,
    r: f32,
    a: Vec2,
    b: Vec2,
) -> Option<SegmentQueryInfo> {
    // Face the normal toward the query start.
    let n = if a.dot(tn) < ta.dot(tn) { -tn } else { tn };

    let an = a.dot(n);
    let bn = b.dot(n);
    if an != bn {
        let d = ta.dot(n) + r;
        let t = (d - an) / (bn - an);
        if (0.0..=1.0).contains(&t) {
            let point = a.lerp(b, t);
            let tangent = -tn.perp();
            let dt = tangent.dot(point);
            if tangent.dot(ta) <= dt && dt <= tangent.dot(tb) {
                return Some(SegmentQueryInfo { t, normal: n });
            }
        }
    }

    if r == 0.0 {
        return None;
    }
    match (
        circle_segment_query(ta, r, a, b),
        circle_segment_query(tb, r, a, b),
    ) {
        (Some(cap_a), Some(cap_b)) => Some(if cap_a.t <= cap_b.t { cap_a } else { cap_b }),
        (cap_a, cap_b) => cap_a.or(cap_b),
    }
}
