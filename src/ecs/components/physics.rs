//! Physics components for ECS entities.
//!
//! A [`Space`](crate::physics::Space) stores bodies, shapes and constraints as
//! entities of its `hecs::World`. Bodies carry [`Body`] and [`BodyShapes`],
//! shapes carry [`Shape`]. User data is attached by inserting extra components
//! on the same entity.

use glam::Vec2;
use hecs::Entity;

use crate::physics::collider::Aabb;
use crate::physics::error::{PhysicsError, Result};

/// User-defined collision category used to select a collision handler.
pub type CollisionType = u32;

/// Shapes sharing a non-zero group never collide with each other.
pub type Group = u32;

/// Bitmask of layers; shapes collide only when their masks intersect.
pub type Layers = u32;

/// Group value meaning "no group".
pub const NO_GROUP: Group = 0;

/// Layer mask covering every layer.
pub const ALL_LAYERS: Layers = u32::MAX;

/// Rigid body component.
///
/// Mass and moment are kept together with their inverses. A body whose
/// inverse mass and inverse moment are both zero is static: impulses and
/// integration leave it in place.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    mass: f32,
    inv_mass: f32,
    moment: f32,
    inv_moment: f32,
    pub position: Vec2,
    /// Rotation in radians. Not wrapped, rotary joints rely on the raw value.
    angle: f32,
    /// Unit vector `(cos angle, sin angle)`.
    rotation: Vec2,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    /// Position correction velocities, reset every step.
    pub(crate) v_bias: Vec2,
    pub(crate) w_bias: f32,
}

impl Body {
    /// Create a dynamic body. Mass and moment must both be positive.
    ///
    /// `f32::INFINITY` is accepted for either and yields a zero inverse.
    pub fn new(mass: f32, moment: f32) -> Result<Self> {
        let mut body = Self::new_static();
        body.set_mass(mass)?;
        body.set_moment(moment)?;
        Ok(body)
    }

    /// Create a static body with infinite mass and moment.
    pub fn new_static() -> Self {
        Self {
            mass: f32::INFINITY,
            inv_mass: 0.0,
            moment: f32::INFINITY,
            inv_moment: 0.0,
            position: Vec2::ZERO,
            angle: 0.0,
            rotation: Vec2::X,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            v_bias: Vec2::ZERO,
            w_bias: 0.0,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.set_angle(angle);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn moment(&self) -> f32 {
        self.moment
    }

    pub fn inv_moment(&self) -> f32 {
        self.inv_moment
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Unit rotation vector matching [`angle`](Self::angle).
    pub fn rotation(&self) -> Vec2 {
        self.rotation
    }

    /// True when neither impulses nor integration can move this body.
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0 && self.inv_moment == 0.0
    }

    pub fn set_mass(&mut self, mass: f32) -> Result<()> {
        // `!(x > 0)` also rejects NaN.
        if !(mass > 0.0) {
            return Err(PhysicsError::InvalidMass(mass));
        }
        self.mass = mass;
        self.inv_mass = 1.0 / mass;
        Ok(())
    }

    pub fn set_moment(&mut self, moment: f32) -> Result<()> {
        if !(moment > 0.0) {
            return Err(PhysicsError::InvalidMoment(moment));
        }
        self.moment = moment;
        self.inv_moment = 1.0 / moment;
        Ok(())
    }

    /// Set the angle and recompute the rotation vector.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
        self.rotation = Vec2::from_angle(angle);
    }

    /// Convert a body-local point to world coordinates.
    pub fn local_to_world(&self, point: Vec2) -> Vec2 {
        self.position + self.rotation.rotate(point)
    }

    /// Convert a world point to body-local coordinates.
    pub fn world_to_local(&self, point: Vec2) -> Vec2 {
        unrotate(point - self.position, self.rotation)
    }

    /// Velocity of a point at world-space offset `r` from the center of mass.
    pub fn velocity_at(&self, r: Vec2) -> Vec2 {
        self.velocity + r.perp() * self.angular_velocity
    }

    /// Accumulate a force applied at world-space offset `r`.
    pub fn apply_force(&mut self, force: Vec2, r: Vec2) {
        self.force += force;
        self.torque += r.perp_dot(force);
    }

    /// Apply an instantaneous impulse at world-space offset `r`.
    pub fn apply_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_moment * r.perp_dot(impulse);
    }

    pub(crate) fn apply_bias_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.v_bias += impulse * self.inv_mass;
        self.w_bias += self.inv_moment * r.perp_dot(impulse);
    }

    /// Zero the force and torque accumulators.
    pub fn reset_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    /// Kinetic energy, used by tests and debug logging.
    pub fn kinetic_energy(&self) -> f32 {
        let linear = if self.inv_mass == 0.0 {
            0.0
        } else {
            self.velocity.length_squared() * self.mass
        };
        let angular = if self.inv_moment == 0.0 {
            0.0
        } else {
            self.angular_velocity * self.angular_velocity * self.moment
        };
        0.5 * (linear + angular)
    }
}

/// Inverse of [`Vec2::rotate`] for a unit rotation vector.
pub(crate) fn unrotate(v: Vec2, rotation: Vec2) -> Vec2 {
    v.rotate(Vec2::new(rotation.x, -rotation.y))
}

/// Shapes attached to a body, in attachment order.
#[derive(Debug, Clone, Default)]
pub struct BodyShapes(pub Vec<Entity>);

/// Circle geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    center: Vec2,
    radius: f32,
    pub(crate) world_center: Vec2,
}

impl Circle {
    /// `radius` must be finite and positive.
    pub fn new(radius: f32, offset: Vec2) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidRadius(radius));
        }
        Ok(Self {
            center: offset,
            radius,
            world_center: offset,
        })
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Center in world space as of the last bounding box update.
    pub fn world_center(&self) -> Vec2 {
        self.world_center
    }
}

/// Line segment with thickness `radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    a: Vec2,
    b: Vec2,
    normal: Vec2,
    radius: f32,
    pub(crate) world_a: Vec2,
    pub(crate) world_b: Vec2,
    pub(crate) world_normal: Vec2,
}

impl Segment {
    /// `radius` is the thickness and must be finite and non-negative.
    pub fn new(a: Vec2, b: Vec2, radius: f32) -> Result<Self> {
        if !(radius >= 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidRadius(radius));
        }
        let normal = (b - a).normalize_or_zero().perp();
        Ok(Self {
            a,
            b,
            normal,
            radius,
            world_a: a,
            world_b: b,
            world_normal: normal,
        })
    }

    pub fn a(&self) -> Vec2 {
        self.a
    }

    pub fn b(&self) -> Vec2 {
        self.b
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Unit normal of `b - a`, rotated a quarter turn counter-clockwise.
    pub fn normal(&self) -> Vec2 {
        self.normal
    }

    pub fn world_a(&self) -> Vec2 {
        self.world_a
    }

    pub fn world_b(&self) -> Vec2 {
        self.world_b
    }

    pub fn world_normal(&self) -> Vec2 {
        self.world_normal
    }
}

/// Edge half-plane of a polygon: points `p` with `n.dot(p) <= d` lie behind it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyAxis {
    pub n: Vec2,
    pub d: f32,
}

/// Convex polygon with clockwise winding.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    verts: Vec<Vec2>,
    axes: Vec<PolyAxis>,
    pub(crate) world_verts: Vec<Vec2>,
    pub(crate) world_axes: Vec<PolyAxis>,
}

impl Polygon {
    /// Build a polygon from clockwise, convex vertices shifted by `offset`.
    pub fn new(verts: &[Vec2], offset: Vec2) -> Result<Self> {
        if verts.len() < 3 {
            return Err(PhysicsError::InvalidPolygon(
                "at least three vertices are required",
            ));
        }
        if !verts.iter().all(|v| v.is_finite()) {
            return Err(PhysicsError::InvalidPolygon("vertices must be finite"));
        }
        if !Self::is_convex_clockwise(verts) {
            return Err(PhysicsError::InvalidPolygon(
                "vertices must be strictly convex and wound clockwise",
            ));
        }

        let verts: Vec<Vec2> = verts.iter().map(|v| *v + offset).collect();
        let mut axes = Vec::with_capacity(verts.len());
        for (i, a) in verts.iter().enumerate() {
            let b = verts[(i + 1) % verts.len()];
            let edge = b - *a;
            if edge.length_squared() == 0.0 {
                return Err(PhysicsError::InvalidPolygon("duplicate consecutive vertices"));
            }
            let n = edge.perp().normalize();
            axes.push(PolyAxis { n, d: n.dot(*a) });
        }

        Ok(Self {
            world_verts: verts.clone(),
            world_axes: axes.clone(),
            verts,
            axes,
        })
    }

    /// Axis-aligned box centered on the body origin.
    pub fn new_box(width: f32, height: f32) -> Self {
        let hw = width.abs() * 0.5;
        let hh = height.abs() * 0.5;
        let verts = vec![
            Vec2::new(-hw, -hh),
            Vec2::new(-hw, hh),
            Vec2::new(hw, hh),
            Vec2::new(hw, -hh),
        ];
        let axes = vec![
            PolyAxis { n: Vec2::NEG_X, d: hw },
            PolyAxis { n: Vec2::Y, d: hh },
            PolyAxis { n: Vec2::X, d: hw },
            PolyAxis { n: Vec2::NEG_Y, d: hh },
        ];
        Self {
            world_verts: verts.clone(),
            world_axes: axes.clone(),
            verts,
            axes,
        }
    }

    /// Check that every corner turns clockwise.
    ///
    /// Collinear or repeated vertices fail, as does a ring with fewer than three vertices.
    pub fn is_convex_clockwise(verts: &[Vec2]) -> bool {
        let len = verts.len();
        len >= 3
            && (0..len).all(|i| {
                let a = verts[i];
                let b = verts[(i + 1) % len];
                let c = verts[(i + 2) % len];
                (b - a).perp_dot(c - b) < 0.0
            })
    }

    pub fn verts(&self) -> &[Vec2] {
        &self.verts
    }

    pub fn axes(&self) -> &[PolyAxis] {
        &self.axes
    }

    pub fn world_verts(&self) -> &[Vec2] {
        &self.world_verts
    }

    pub fn world_axes(&self) -> &[PolyAxis] {
        &self.world_axes
    }
}

/// Collision geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Circle(Circle),
    Segment(Segment),
    Polygon(Polygon),
}

impl ShapeKind {
    /// Dispatch order: circles before segments before polygons.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ShapeKind::Circle(_) => 0,
            ShapeKind::Segment(_) => 1,
            ShapeKind::Polygon(_) => 2,
        }
    }
}

/// Collision shape component, attached to exactly one body.
#[derive(Debug, Clone)]
pub struct Shape {
    body: Entity,
    kind: ShapeKind,
    pub(crate) bb: Aabb,
    /// Sensors report overlaps but never generate a collision response.
    pub sensor: bool,
    /// Coefficient of restitution, combined multiplicatively.
    pub elasticity: f32,
    /// Coulomb friction coefficient, combined multiplicatively.
    pub friction: f32,
    /// Tangential velocity of the surface, for conveyor belts.
    pub surface_velocity: Vec2,
    pub collision_type: CollisionType,
    pub group: Group,
    pub layers: Layers,
    /// Unique id assigned by the space, seeds contact feature hashes.
    pub(crate) hash_id: u64,
}

impl Shape {
    pub fn new(body: Entity, kind: ShapeKind) -> Self {
        Self {
            body,
            kind,
            bb: Aabb::default(),
            sensor: false,
            elasticity: 0.0,
            friction: 0.0,
            surface_velocity: Vec2::ZERO,
            collision_type: 0,
            group: NO_GROUP,
            layers: ALL_LAYERS,
            hash_id: 0,
        }
    }

    pub fn circle(body: Entity, radius: f32, offset: Vec2) -> Result<Self> {
        Ok(Self::new(
            body,
            ShapeKind::Circle(Circle::new(radius, offset)?),
        ))
    }

    pub fn segment(body: Entity, a: Vec2, b: Vec2, radius: f32) -> Result<Self> {
        Ok(Self::new(
            body,
            ShapeKind::Segment(Segment::new(a, b, radius)?),
        ))
    }

    pub fn polygon(body: Entity, verts: &[Vec2], offset: Vec2) -> Result<Self> {
        Ok(Self::new(
            body,
            ShapeKind::Polygon(Polygon::new(verts, offset)?),
        ))
    }

    pub fn new_box(body: Entity, width: f32, height: f32) -> Self {
        Self::new(body, ShapeKind::Polygon(Polygon::new_box(width, height)))
    }

    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_surface_velocity(mut self, surface_velocity: Vec2) -> Self {
        self.surface_velocity = surface_velocity;
        self
    }

    pub fn with_collision_type(mut self, collision_type: CollisionType) -> Self {
        self.collision_type = collision_type;
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    pub fn with_layers(mut self, layers: Layers) -> Self {
        self.layers = layers;
        self
    }

    /// Owning body.
    pub fn body(&self) -> Entity {
        self.body
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Bounding box as of the last update.
    pub fn bb(&self) -> Aabb {
        self.bb
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ShapeKind {
        &mut self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_rejects_non_positive_mass() {
        assert_eq!(Body::new(0.0, 1.0).unwrap_err(), PhysicsError::InvalidMass(0.0));
        assert_eq!(
            Body::new(1.0, -2.0).unwrap_err(),
            PhysicsError::InvalidMoment(-2.0)
        );
        assert!(Body::new(f32::NAN, 1.0).is_err());
    }

    #[test]
    fn test_body_inverse_values() {
        let body = Body::new(4.0, 8.0).unwrap();
        assert_eq!(body.inv_mass(), 0.25);
        assert_eq!(body.inv_moment(), 0.125);
        assert!(!body.is_static());

        let infinite = Body::new(f32::INFINITY, f32::INFINITY).unwrap();
        assert_eq!(infinite.inv_mass(), 0.0);
        assert!(infinite.is_static());
        assert!(Body::new_static().is_static());
    }

    #[test]
    fn test_body_local_world_conversion() {
        let body = Body::new(1.0, 1.0)
            .unwrap()
            .with_position(Vec2::new(3.0, 4.0))
            .with_angle(std::f32::consts::FRAC_PI_2);

        let world = body.local_to_world(Vec2::new(1.0, 0.0));
        assert!((world - Vec2::new(3.0, 5.0)).length() < 1e-5, "{world}");

        let local = body.world_to_local(world);
        assert!((local - Vec2::new(1.0, 0.0)).length() < 1e-5, "{local}");
    }

    #[test]
    fn test_body_apply_impulse_off_center() {
        let mut body = Body::new(2.0, 4.0).unwrap();
        body.apply_impulse(Vec2::new(0.0, 2.0), Vec2::new(1.0, 0.0));
        assert_eq!(body.velocity, Vec2::new(0.0, 1.0));
        assert_eq!(body.angular_velocity, 0.5);
    }

    #[test]
    fn test_static_body_ignores_impulses() {
        let mut body = Body::new_static();
        body.apply_impulse(Vec2::new(100.0, 50.0), Vec2::new(1.0, 1.0));
        assert_eq!(body.velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);
    }

    #[test]
    fn test_polygon_rejects_counter_clockwise() {
        let ccw = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!(Polygon::new(&ccw, Vec2::ZERO).is_err());

        let cw: Vec<Vec2> = ccw.iter().rev().copied().collect();
        assert!(Polygon::new(&cw, Vec2::ZERO).is_ok());
    }

    #[test]
    fn test_polygon_rejects_concave_and_degenerate() {
        let concave = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
        ];
        assert!(Polygon::new(&concave, Vec2::ZERO).is_err());
        assert!(Polygon::new(&[Vec2::ZERO, Vec2::X], Vec2::ZERO).is_err());
    }

    #[test]
    fn test_box_axes_point_outward() {
        let poly = Polygon::new_box(2.0, 4.0);
        for axis in poly.axes() {
            // Every vertex lies on or behind every edge.
            for v in poly.verts() {
                assert!(axis.n.dot(*v) - axis.d <= 1e-6);
            }
        }
        let built = Polygon::new(poly.verts(), Vec2::ZERO).unwrap();
        for (a, b) in built.axes().iter().zip(poly.axes()) {
            assert!((a.n - b.n).length() < 1e-6 && (a.d - b.d).abs() < 1e-6);
        }
    }

    #[test]
    fn test_segment_normal() {
        let seg = Segment::new(Vec2::ZERO, Vec2::new(10.0, 0.0), 1.0).unwrap();
        assert_eq!(seg.normal(), Vec2::Y);
    }

    #[test]
    fn test_shapes_reject_invalid_radius() {
        let body = hecs::World::new().spawn(());
        assert_eq!(
            Shape::circle(body, -1.0, Vec2::ZERO).unwrap_err(),
            PhysicsError::InvalidRadius(-1.0)
        );
        assert!(Shape::circle(body, 0.0, Vec2::ZERO).is_err());
        assert!(Shape::circle(body, f32::NAN, Vec2::ZERO).is_err());
        assert!(Shape::circle(body, f32::INFINITY, Vec2::ZERO).is_err());

        let (a, b) = (Vec2::ZERO, Vec2::X);
        assert!(Shape::segment(body, a, b, 0.0).is_ok(), "thin segments are allowed");
        assert_eq!(
            Shape::segment(body, a, b, -0.5).unwrap_err(),
            PhysicsError::InvalidRadius(-0.5)
        );
        assert!(Shape::segment(body, a, b, f32::NAN).is_err());
    }

    #[test]
    fn test_polygon_rejects_collinear_and_non_finite() {
        // Clockwise square with an extra vertex in the middle of the left edge.
        let collinear = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 0.5),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
        ];
        assert!(!Polygon::is_convex_clockwise(&collinear));
        assert!(Polygon::new(&collinear, Vec2::ZERO).is_err());

        let flat = [Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)];
        assert!(Polygon::new(&flat, Vec2::ZERO).is_err());

        let repeated = [Vec2::ZERO, Vec2::ZERO, Vec2::Y, Vec2::ONE, Vec2::X];
        assert!(Polygon::new(&repeated, Vec2::ZERO).is_err());

        let nan = [Vec2::ZERO, Vec2::new(f32::NAN, 1.0), Vec2::ONE, Vec2::X];
        assert!(Polygon::new(&nan, Vec2::ZERO).is_err());
    }
}
