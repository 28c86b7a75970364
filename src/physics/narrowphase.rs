//! Narrowphase collision detection.
//!
//! [`collide`] dispatches on the pair of shape kinds. Every routine reports
//! normals pointing from the first shape toward the second and a negative
//! distance for penetrating contacts.

use glam::Vec2;

use crate::ecs::components::physics::{Circle, PolyAxis, Polygon, Segment, Shape, ShapeKind};

use super::contact::{hash_pair, Contact};

/// Upper bound on contacts produced for one shape pair.
pub const MAX_CONTACTS_PER_ARBITER: usize = 6;

/// Generate contacts between two shapes with up to date world geometry.
///
/// Shapes may be given in any order; normals always point from `a` to `b`.
pub fn collide(a: &Shape, b: &Shape, slop: f32) -> Vec<Contact> {
    let mut contacts = Vec::new();
    match (a.kind(), b.kind()) {
        (ShapeKind::Circle(c1), ShapeKind::Circle(c2)) => contacts.extend(circle_circle_query(
            c1.world_center(),
            c2.world_center(),
            c1.radius(),
            c2.radius(),
            0,
        )),
        (ShapeKind::Circle(circle), ShapeKind::Segment(seg)) => {
            contacts.extend(circle_segment(circle, seg))
        }
        (ShapeKind::Circle(circle), ShapeKind::Polygon(poly)) => {
            contacts.extend(circle_polygon(circle, poly))
        }
        (ShapeKind::Segment(s1), ShapeKind::Segment(s2)) => {
            contacts.extend(segment_segment(s1, s2))
        }
        (ShapeKind::Segment(seg), ShapeKind::Polygon(poly)) => {
            segment_polygon(seg, a.hash_id, poly, b.hash_id, slop, &mut contacts)
        }
        (ShapeKind::Polygon(p1), ShapeKind::Polygon(p2)) => {
            polygon_polygon(p1, a.hash_id, p2, b.hash_id, &mut contacts)
        }
        (ShapeKind::Segment(_), ShapeKind::Circle(_))
        | (ShapeKind::Polygon(_), ShapeKind::Circle(_))
        | (ShapeKind::Polygon(_), ShapeKind::Segment(_)) => {
            contacts = collide(b, a, slop);
            for contact in &mut contacts {
                contact.normal = -contact.normal;
            }
        }
    }
    contacts.truncate(MAX_CONTACTS_PER_ARBITER);
    contacts
}

fn circle_circle_query(p1: Vec2, p2: Vec2, r1: f32, r2: f32, hash: u64) -> Option<Contact> {
    let min_dist = r1 + r2;
    let delta = p2 - p1;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let (normal, position) = if dist > 0.0 {
        let n = delta / dist;
        (n, p1 + delta * (0.5 + (r1 - 0.5 * min_dist) / dist))
    } else {
        (Vec2::X, p1)
    };
    Some(Contact::new(position, normal, dist - min_dist, hash))
}

fn circle_segment(circle: &Circle, seg: &Segment) -> Option<Contact> {
    let center = circle.world_center();
    let (ta, tb, tn) = (seg.world_a(), seg.world_b(), seg.world_normal());
    let r_sum = circle.radius() + seg.radius();

    let dn = tn.dot(center) - tn.dot(ta);
    let dist = dn.abs() - r_sum;
    if dist > 0.0 {
        return None;
    }

    let tangent = -tn.perp();
    let dt = tangent.dot(center);
    let dt_min = tangent.dot(ta);
    let dt_max = tangent.dot(tb);

    if dt < dt_min {
        if dt < dt_min - r_sum {
            return None;
        }
        circle_circle_query(center, ta, circle.radius(), seg.radius(), 0)
    } else if dt < dt_max {
        let n = if dn < 0.0 { tn } else { -tn };
        Some(Contact::new(
            center + n * (circle.radius() + dist * 0.5),
            n,
            dist,
            0,
        ))
    } else {
        if dt > dt_max + r_sum {
            return None;
        }
        circle_circle_query(center, tb, circle.radius(), seg.radius(), 0)
    }
}

fn circle_polygon(circle: &Circle, poly: &Polygon) -> Option<Contact> {
    let center = circle.world_center();
    let r = circle.radius();
    let axes = poly.world_axes();
    let verts = poly.world_verts();

    let mut min_index = 0;
    let mut min = f32::NEG_INFINITY;
    for (i, axis) in axes.iter().enumerate() {
        let dist = axis.n.dot(center) - axis.d - r;
        if dist > 0.0 {
            return None;
        }
        if dist > min {
            min = dist;
            min_index = i;
        }
    }

    let n = axes[min_index].n;
    let a = verts[min_index];
    let b = verts[(min_index + 1) % verts.len()];
    let tangent = -n.perp();
    let dt = tangent.dot(center);

    if dt > tangent.dot(b) {
        circle_circle_query(center, b, r, 0.0, 0)
    } else if dt > tangent.dot(a) {
        Some(Contact::new(center - n * (r + min * 0.5), -n, min, 0))
    } else {
        circle_circle_query(center, a, r, 0.0, 0)
    }
}

/// Closest points between segments `p1..q1` and `p2..q2`.
fn closest_points(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> (Vec2, Vec2) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= f32::EPSILON && e <= f32::EPSILON {
        (0.0, 0.0)
    } else if a <= f32::EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= f32::EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s = if denom != 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };

    (p1 + d1 * s, p2 + d2 * t)
}

fn segment_segment(s1: &Segment, s2: &Segment) -> Option<Contact> {
    let (c1, c2) = closest_points(s1.world_a(), s1.world_b(), s2.world_a(), s2.world_b());
    circle_circle_query(c1, c2, s1.radius(), s2.radius(), 0)
}

/// Smallest signed distance of the polygon's vertices past the plane `n.dot(p) = d`.
fn poly_value_on_axis(poly: &Polygon, n: Vec2, d: f32) -> f32 {
    poly.world_verts()
        .iter()
        .map(|v| n.dot(*v))
        .fold(f32::INFINITY, f32::min)
        - d
}

fn poly_contains_vert(poly: &Polygon, v: Vec2) -> bool {
    poly.world_axes().iter().all(|axis| axis.n.dot(v) - axis.d <= 0.0)
}

/// Like [`poly_contains_vert`], ignoring axes facing away from `n`.
fn poly_contains_vert_partial(poly: &Polygon, v: Vec2, n: Vec2) -> bool {
    poly.world_axes()
        .iter()
        .filter(|axis| axis.n.dot(n) >= 0.0)
        .all(|axis| axis.n.dot(v) - axis.d <= 0.0)
}

/// Axis of minimum separation, or `None` when the polygon is separated.
fn find_min_separating_axis(poly: &Polygon, axes: &[PolyAxis]) -> Option<(usize, f32)> {
    let mut min_index = 0;
    let mut min = f32::NEG_INFINITY;
    for (i, axis) in axes.iter().enumerate() {
        let dist = poly_value_on_axis(poly, axis.n, axis.d);
        if dist > 0.0 {
            return None;
        }
        if dist > min {
            min = dist;
            min_index = i;
        }
    }
    Some((min_index, min))
}

#[allow(clippy::too_many_arguments)]
fn find_verts(
    p1: &Polygon,
    hash1: u64,
    p2: &Polygon,
    hash2: u64,
    n: Vec2,
    dist: f32,
    partial: bool,
    out: &mut Vec<Contact>,
) {
    let contains = |poly: &Polygon, v: Vec2, n: Vec2| {
        if partial {
            poly_contains_vert_partial(poly, v, n)
        } else {
            poly_contains_vert(poly, v)
        }
    };

    for (i, v) in p1.world_verts().iter().enumerate() {
        if contains(p2, *v, -n) {
            out.push(Contact::new(*v, n, dist, hash_pair(hash1, i as u64)));
        }
    }
    for (i, v) in p2.world_verts().iter().enumerate() {
        if contains(p1, *v, n) {
            out.push(Contact::new(*v, n, dist, hash_pair(hash2, i as u64)));
        }
    }
}

fn polygon_polygon(p1: &Polygon, hash1: u64, p2: &Polygon, hash2: u64, out: &mut Vec<Contact>) {
    let Some((min1_index, min1)) = find_min_separating_axis(p2, p1.world_axes()) else {
        return;
    };
    let Some((min2_index, min2)) = find_min_separating_axis(p1, p2.world_axes()) else {
        return;
    };

    let (n, dist) = if min1 > min2 {
        (p1.world_axes()[min1_index].n, min1)
    } else {
        (-p2.world_axes()[min2_index].n, min2)
    };

    find_verts(p1, hash1, p2, hash2, n, dist, true, out);
    if out.is_empty() {
        find_verts(p1, hash1, p2, hash2, n, dist, false, out);
    }
}

/// Smallest signed distance of the thick segment past the plane `n.dot(p) = d`.
fn segment_value_on_axis(seg: &Segment, n: Vec2, d: f32) -> f32 {
    let a = n.dot(seg.world_a()) - seg.radius();
    let b = n.dot(seg.world_b()) - seg.radius();
    a.min(b) - d
}

fn find_points_behind_segment(
    seg: &Segment,
    poly: &Polygon,
    poly_hash: u64,
    dist: f32,
    coef: f32,
    out: &mut Vec<Contact>,
) {
    let tn = seg.world_normal();
    let tangent = -tn.perp();
    let dt_a = tangent.dot(seg.world_a());
    let dt_b = tangent.dot(seg.world_b());
    let n = tn * coef;
    let limit = tn.dot(seg.world_a()) * coef + seg.radius();

    for (i, v) in poly.world_verts().iter().enumerate() {
        if v.dot(n) < limit {
            let dt = tangent.dot(*v);
            if dt_a <= dt && dt <= dt_b {
                out.push(Contact::new(*v, n, dist, hash_pair(poly_hash, i as u64)));
            }
        }
    }
}

fn segment_polygon(
    seg: &Segment,
    seg_hash: u64,
    poly: &Polygon,
    poly_hash: u64,
    slop: f32,
    out: &mut Vec<Contact>,
) {
    let tn = seg.world_normal();
    let seg_d = tn.dot(seg.world_a());
    let min_norm = poly_value_on_axis(poly, tn, seg_d) - seg.radius();
    let min_neg = poly_value_on_axis(poly, -tn, -seg_d) - seg.radius();
    if min_neg > 0.0 || min_norm > 0.0 {
        return;
    }

    let axes = poly.world_axes();
    let mut min_index = 0;
    let mut poly_min = f32::NEG_INFINITY;
    for (i, axis) in axes.iter().enumerate() {
        let dist = segment_value_on_axis(seg, axis.n, axis.d);
        if dist > 0.0 {
            return;
        }
        if dist > poly_min {
            poly_min = dist;
            min_index = i;
        }
    }

    let poly_n = -axes[min_index].n;
    let va = seg.world_a() + poly_n * seg.radius();
    let vb = seg.world_b() + poly_n * seg.radius();
    if poly_contains_vert(poly, va) {
        out.push(Contact::new(va, poly_n, poly_min, hash_pair(seg_hash, 0)));
    }
    if poly_contains_vert(poly, vb) {
        out.push(Contact::new(vb, poly_n, poly_min, hash_pair(seg_hash, 1)));
    }

    // Accept the segment's own axis when it is nearly as shallow as the polygon's.
    let poly_min = poly_min - slop;
    if min_norm >= poly_min || min_neg >= poly_min {
        if min_norm > min_neg {
            find_points_behind_segment(seg, poly, poly_hash, min_norm, 1.0, out);
        } else {
            find_points_behind_segment(seg, poly, poly_hash, min_neg, -1.0, out);
        }
    }

    if out.is_empty() {
        let verts = poly.world_verts();
        let poly_a = verts[min_index];
        let poly_b = verts[(min_index + 1) % verts.len()];
        let r = seg.radius();
        let fallback = circle_circle_query(seg.world_a(), poly_a, r, 0.0, 0)
            .or_else(|| circle_circle_query(seg.world_b(), poly_a, r, 0.0, 0))
            .or_else(|| circle_circle_query(seg.world_a(), poly_b, r, 0.0, 0))
            .or_else(|| circle_circle_query(seg.world_b(), poly_b, r, 0.0, 0));
        out.extend(fallback);
    }
}
