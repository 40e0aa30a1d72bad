//! Fixed-Point 2D Vector
//!
//! Arena coordinates: +X to the right, +Y downward, origin at the top-left
//! corner of the arena. A player position is the top-left corner of its box.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_ONE, FIXED_SCALE,
    fixed_mul, fixed_div, fixed_clamp, from_float, to_float,
    wide_square, wide_sqrt, snap_to_grid,
};

/// 2D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// X component (Q16.16 fixed-point)
    pub x: Fixed,
    /// Y component (Q16.16 fixed-point)
    pub y: Fixed,
}

impl FixedVec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer world units.
    #[inline]
    pub const fn from_ints(x: i32, y: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
        }
    }

    /// Create a vector from float world units (config and wire boundary only).
    #[inline]
    pub fn from_floats(x: f64, y: f64) -> Self {
        Self {
            x: from_float(x),
            y: from_float(y),
        }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
        }
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
        }
    }

    /// Squared length as raw Q32.32.
    #[inline]
    pub fn length_squared(self) -> i64 {
        wide_square(self.x) + wide_square(self.y)
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> Fixed {
        wide_sqrt(self.length_squared())
    }

    /// Squared distance to another point as raw Q32.32.
    #[inline]
    pub fn distance_squared(self, other: Self) -> i64 {
        self.sub(other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        wide_sqrt(self.distance_squared(other))
    }

    /// True when `other` is at most `radius` away (inclusive).
    #[inline]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= wide_square(radius)
    }

    /// True when `other` is strictly closer than `radius`.
    #[inline]
    pub fn strictly_within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) < wide_square(radius)
    }

    /// Normalize to unit length. Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0 {
            return Self::ZERO;
        }
        Self {
            x: fixed_div(self.x, len),
            y: fixed_div(self.y, len),
        }
    }

    /// Unit vector toward `target` scaled to `speed`.
    #[inline]
    pub fn step_toward(self, target: Self, speed: Fixed) -> Self {
        target.sub(self).normalize().scale(speed)
    }

    /// Clamp each component into `[min, max]`.
    #[inline]
    pub fn clamp_box(self, min: Self, max: Self) -> Self {
        Self {
            x: fixed_clamp(self.x, min.x, max.x),
            y: fixed_clamp(self.y, min.y, max.y),
        }
    }

    /// Snap both components to the nearest grid line.
    #[inline]
    pub fn snap(self, cell: Fixed) -> Self {
        Self {
            x: snap_to_grid(self.x, cell),
            y: snap_to_grid(self.y, cell),
        }
    }

    /// Negate both components.
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            x: self.x.wrapping_neg(),
            y: self.y.wrapping_neg(),
        }
    }

    /// Convert to float world units for the wire.
    #[inline]
    pub fn to_floats(self) -> (f64, f64) {
        (to_float(self.x), to_float(self.y))
    }

    /// Whole-unit grid index of this position for the given cell size.
    #[inline]
    pub fn cell_index(self, cell: Fixed) -> (i32, i32) {
        let cell = cell.max(FIXED_ONE);
        (self.x.div_euclid(cell), self.y.div_euclid(cell))
    }
}

impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec2::add(self, rhs)
    }
}

impl Sub for FixedVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec2::sub(self, rhs)
    }
}

impl Neg for FixedVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.negate()
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "Vec2({:.2}, {:.2})", fx, fy)
    }
}

impl fmt::Display for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy) = self.to_floats();
        write!(f, "({:.1}, {:.1})", fx, fy)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{to_fixed, DEFAULT_CELL_SIZE};

    #[test]
    fn test_vec2_add_sub() {
        let a = FixedVec2::from_ints(30, 40);
        let b = FixedVec2::from_ints(10, 20);
        assert_eq!(a + b, FixedVec2::from_ints(40, 60));
        assert_eq!(a - b, FixedVec2::from_ints(20, 20));
        assert_eq!(-b, FixedVec2::from_ints(-10, -20));
    }

    #[test]
    fn test_vec2_arena_scale_distance() {
        // Would overflow a 32-bit squared distance.
        let den = FixedVec2::from_ints(450, 250);
        let corner = FixedVec2::from_ints(50, 50);
        let dist = den.distance(corner);
        // sqrt(400^2 + 200^2) = 447.21
        assert!((dist - to_fixed(447.2136)).abs() < 16);
    }

    #[test]
    fn test_vec2_within_is_inclusive() {
        let a = FixedVec2::from_ints(0, 0);
        let b = FixedVec2::from_ints(30, 0);
        assert!(a.within(b, to_fixed(30.0)));
        assert!(!a.strictly_within(b, to_fixed(30.0)));
        assert!(!a.within(b, to_fixed(29.9)));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = FixedVec2::from_ints(300, 400);
        let norm = v.normalize();
        assert!((norm.length() - FIXED_ONE).abs() < 8);
        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);
    }

    #[test]
    fn test_vec2_step_toward() {
        let from = FixedVec2::from_ints(0, 0);
        let to = FixedVec2::from_ints(0, 100);
        let step = from.step_toward(to, to_fixed(2.0));
        assert_eq!(step, FixedVec2::new(0, to_fixed(2.0)));
    }

    #[test]
    fn test_vec2_snap_and_cell_index() {
        let p = FixedVec2::from_floats(449.0, 251.0);
        assert_eq!(p.snap(DEFAULT_CELL_SIZE), FixedVec2::from_ints(440, 260));
        assert_eq!(FixedVec2::from_ints(40, 60).cell_index(DEFAULT_CELL_SIZE), (2, 3));
    }

    #[test]
    fn test_vec2_clamp_box() {
        let min = FixedVec2::ZERO;
        let max = FixedVec2::from_ints(480, 280);
        let p = FixedVec2::from_ints(-5, 300);
        assert_eq!(p.clamp_box(min, max), FixedVec2::from_ints(0, 280));
    }
}
