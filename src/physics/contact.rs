//! Contact data structures for collision response.

use glam::Vec2;

const SHAPE_HASH_COEF: u64 = 3_344_921_057;
const FEATURE_HASH_COEF: u64 = 0x9E37_79B9_7F4A_7C15;

/// Combine a shape's hash id and one of its feature indices into a contact hash.
///
/// Order dependent: `hash_pair(a, b) != hash_pair(b, a)` for `a != b`, so vertex `j`
/// of shape `i` never aliases vertex `i` of shape `j`.
#[inline]
pub fn hash_pair(shape: u64, feature: u64) -> u64 {
    shape.wrapping_mul(SHAPE_HASH_COEF) ^ feature.wrapping_mul(FEATURE_HASH_COEF)
}

/// A single contact point with accumulated impulse data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Contact position in world space.
    pub position: Vec2,
    /// Contact normal (from shape A to shape B).
    pub normal: Vec2,
    /// Signed separation, negative when penetrating.
    pub distance: f32,
    /// Feature hash identifying this contact across steps.
    pub hash: u64,

    /// Accumulated normal impulse. Never negative after solving.
    pub jn_acc: f32,
    /// Accumulated friction impulse.
    pub jt_acc: f32,
    /// Accumulated position correction impulse.
    pub(crate) j_bias: f32,

    pub(crate) r1: Vec2,
    pub(crate) r2: Vec2,
    pub(crate) n_mass: f32,
    pub(crate) t_mass: f32,
    pub(crate) bounce: f32,
    pub(crate) bias: f32,
}

impl Contact {
    pub fn new(position: Vec2, normal: Vec2, distance: f32, hash: u64) -> Self {
        Self {
            position,
            normal,
            distance,
            hash,
            jn_acc: 0.0,
            jt_acc: 0.0,
            j_bias: 0.0,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            n_mass: 0.0,
            t_mass: 0.0,
            bounce: 0.0,
            bias: 0.0,
        }
    }

    /// Total impulse applied at this contact, in world space.
    pub fn impulse(&self) -> Vec2 {
        self.normal.rotate(Vec2::new(self.jn_acc, self.jt_acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair_is_order_dependent() {
        assert_ne!(hash_pair(3, 17), hash_pair(17, 3));
        assert_ne!(hash_pair(0, 2), hash_pair(2, 0));
        assert_ne!(hash_pair(3, 17), hash_pair(3, 18));
    }

    #[test]
    fn test_hash_pair_unique_for_small_ids() {
        let mut seen = std::collections::HashSet::new();
        for shape in 0..64 {
            for feature in 0..16 {
                assert!(seen.insert(hash_pair(shape, feature)), "({shape}, {feature})");
            }
        }
    }

    #[test]
    fn test_contact_impulse_rotates_into_normal_frame() {
        let mut contact = Contact::new(Vec2::ZERO, Vec2::Y, -0.1, 0);
        contact.jn_acc = 2.0;
        contact.jt_acc = 1.0;
        // Tangent is the normal's left perpendicular.
        assert_eq!(contact.impulse(), Vec2::new(-1.0, 2.0));
    }
}
