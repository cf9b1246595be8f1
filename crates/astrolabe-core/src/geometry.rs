//! Geometric primitives for graph layout in 3D space.
//!
//! This module provides the fundamental geometric types used throughout
//! Astrolabe for calculating node positions, extents and bounding volumes.
//!
//! # Overview
//!
//! - [`Vec3`] - A 3D vector used both as a position and as a direction/force
//! - [`Bounds3`] - An axis-aligned bounding box defined by minimum and maximum corners
//! - [`Axis`] - One of the three coordinate axes
//!
//! # Coordinate System
//!
//! Astrolabe uses a right-handed coordinate system:
//!
//! ```text
//!        +Y
//!         │
//!         │
//!         └──────► +X
//!        ╱
//!       ╱
//!     +Z
//! ```
//!
//! Layouts that are inherently planar (grid, circular, hierarchical) default to
//! the XY plane with Y increasing upward, so "deeper" tree levels have more
//! negative Y values.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Lengths below this value are treated as zero by normalizing operations.
pub const EPSILON: f32 = 1e-6;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in `x, y, z` order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// A 3D vector representing a position, offset or force.
///
/// Vectors use `f32` components and provide both operator overloads and named
/// methods for the vector math used by the layout algorithms.
///
/// # Examples
///
/// ```
/// # use astrolabe_core::geometry::Vec3;
/// let a = Vec3::new(1.0, 2.0, 3.0);
/// let b = Vec3::new(4.0, 6.0, 3.0);
///
/// let delta = b - a;
/// assert_eq!(delta, Vec3::new(3.0, 4.0, 0.0));
/// assert_eq!(delta.length(), 5.0);
/// assert_eq!(a.distance(b), 5.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    x: f32,
    y: f32,
    z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    /// The vector with all components set to one.
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
    /// Unit vector along +X.
    pub const X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    /// Unit vector along +Y.
    pub const Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    /// Unit vector along +Z.
    pub const Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    /// Creates a new vector with the specified components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Creates a vector with all three components set to `value`
    pub const fn splat(value: f32) -> Self {
        Self::new(value, value, value)
    }

    /// Returns the x component
    pub fn x(self) -> f32 {
        self.x
    }

    /// Returns the y component
    pub fn y(self) -> f32 {
        self.y
    }

    /// Returns the z component
    pub fn z(self) -> f32 {
        self.z
    }

    /// Returns the component along `axis`
    pub fn get(self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Returns a copy with the component along `axis` replaced
    pub fn with(mut self, axis: Axis, value: f32) -> Self {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
        self
    }

    /// Returns a copy with the x component replaced
    pub fn with_x(self, x: f32) -> Self {
        self.with(Axis::X, x)
    }

    /// Returns a copy with the y component replaced
    pub fn with_y(self, y: f32) -> Self {
        self.with(Axis::Y, y)
    }

    /// Returns a copy with the z component replaced
    pub fn with_z(self, z: f32) -> Self {
        self.with(Axis::Z, z)
    }

    /// Checks if all components are exactly zero
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Checks that no component is NaN or infinite
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Dot product
    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product (right-handed)
    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared Euclidean length
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Euclidean length
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    /// Multiplies every component by `factor`
    pub fn scale(self, factor: f32) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Component-wise product
    pub fn mul_components(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Returns the unit vector in the same direction, or [`Vec3::ZERO`] when
    /// the length is below [`EPSILON`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use astrolabe_core::geometry::Vec3;
    /// assert_eq!(Vec3::new(0.0, 3.0, 0.0).normalize_or_zero(), Vec3::Y);
    /// assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
    /// ```
    pub fn normalize_or_zero(self) -> Vec3 {
        let length = self.length();
        if length < EPSILON {
            Vec3::ZERO
        } else {
            self.scale(1.0 / length)
        }
    }

    /// Returns a copy whose length does not exceed `max`
    pub fn clamp_length(self, max: f32) -> Vec3 {
        let length = self.length();
        if length > max && length > EPSILON {
            self.scale(max / length)
        } else {
            self
        }
    }

    /// Component-wise clamp into `[min, max]`
    pub fn clamp(self, min: Vec3, max: Vec3) -> Vec3 {
        Vec3::new(
            self.x.clamp(min.x, max.x.max(min.x)),
            self.y.clamp(min.y, max.y.max(min.y)),
            self.z.clamp(min.z, max.z.max(min.z)),
        )
    }

    /// Component-wise minimum
    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum
    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Linear interpolation: `t = 0` yields `self`, `t = 1` yields `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use astrolabe_core::geometry::Vec3;
    /// let from = Vec3::new(0.0, 0.0, 0.0);
    /// let to = Vec3::new(10.0, -10.0, 4.0);
    /// assert_eq!(from.lerp(to, 0.5), Vec3::new(5.0, -5.0, 2.0));
    /// ```
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        self + (other - self).scale(t)
    }

    /// Calculates the midpoint between this point and another point
    pub fn midpoint(self, other: Vec3) -> Vec3 {
        self.lerp(other, 0.5)
    }

    /// Angle in radians between this vector and `other`, or `0.0` if either
    /// vector is degenerate.
    pub fn angle_between(self, other: Vec3) -> f32 {
        let denominator = self.length() * other.length();
        if denominator < EPSILON {
            return 0.0;
        }
        (self.dot(other) / denominator).clamp(-1.0, 1.0).acos()
    }

    /// Rotates this vector by `angle` radians about `axis` (Rodrigues' formula).
    ///
    /// A degenerate axis leaves the vector unchanged.
    pub fn rotate_about(self, axis: Vec3, angle: f32) -> Vec3 {
        let k = axis.normalize_or_zero();
        if k.is_zero() {
            return self;
        }
        let (sin, cos) = angle.sin_cos();
        self.scale(cos) + k.cross(self).scale(sin) + k.scale(k.dot(self) * (1.0 - cos))
    }

    /// Returns some unit vector perpendicular to `self`.
    ///
    /// Prefers the direction in the XY plane so planar layouts bend within
    /// their plane; falls back to another axis for vectors parallel to Z.
    pub fn any_perpendicular(self) -> Vec3 {
        let candidate = self.cross(Vec3::Z);
        if candidate.length_squared() > EPSILON {
            return candidate.normalize_or_zero();
        }
        self.cross(Vec3::Y).normalize_or_zero()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vec3::new(x, y, z)
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Vec3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        self.scale(rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f32) -> Vec3 {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// An axis-aligned bounding box defined by its minimum and maximum corners.
///
/// # Examples
///
/// ```
/// # use astrolabe_core::geometry::{Bounds3, Vec3};
/// let bounds = Bounds3::from_center(Vec3::ZERO, Vec3::new(100.0, 50.0, 20.0));
/// assert_eq!(bounds.min(), Vec3::new(-50.0, -25.0, -10.0));
/// assert_eq!(bounds.max(), Vec3::new(50.0, 25.0, 10.0));
/// assert!(bounds.contains(Vec3::new(10.0, 10.0, 0.0)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    min: Vec3,
    max: Vec3,
}

impl Bounds3 {
    /// Creates bounds from two corners; the corners are sorted per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates bounds centred on `center` with the full extent `size`
    pub fn from_center(center: Vec3, size: Vec3) -> Self {
        let half = size.scale(0.5);
        Self::new(center - half, center + half)
    }

    /// Smallest bounds containing every point, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, p| {
            bounds.expand_to_include(p)
        }))
    }

    /// Returns the minimum corner
    pub fn min(self) -> Vec3 {
        self.min
    }

    /// Returns the maximum corner
    pub fn max(self) -> Vec3 {
        self.max
    }

    /// Returns the center point of the bounds
    pub fn center(self) -> Vec3 {
        self.min.midpoint(self.max)
    }

    /// Returns the full extent along each axis
    pub fn size(self) -> Vec3 {
        self.max - self.min
    }

    /// Volume of the box; degenerate axes contribute a factor of zero
    pub fn volume(self) -> f32 {
        let size = self.size();
        size.x() * size.y() * size.z()
    }

    /// Checks if the point lies inside or on the boundary
    pub fn contains(self, point: Vec3) -> bool {
        Axis::ALL
            .iter()
            .all(|&axis| point.get(axis) >= self.min.get(axis) && point.get(axis) <= self.max.get(axis))
    }

    /// Checks if two boxes overlap (touching faces count as overlapping)
    pub fn intersects(self, other: Bounds3) -> bool {
        Axis::ALL.iter().all(|&axis| {
            self.min.get(axis) <= other.max.get(axis) && self.max.get(axis) >= other.min.get(axis)
        })
    }

    /// Returns bounds grown to include `point`
    pub fn expand_to_include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Merges two bounds to create a larger bounds that contains both.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Moves the bounds by the specified offset
    pub fn translate(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Grows the bounds by `padding` on every side.
    ///
    /// Negative padding shrinks the box; each axis is clamped so the box never
    /// inverts and collapses onto its center instead.
    pub fn add_padding(&self, padding: f32) -> Self {
        let center = self.center();
        let min = self.min - Vec3::splat(padding);
        let max = self.max + Vec3::splat(padding);
        Self {
            min: min.min(center),
            max: max.max(center),
        }
    }

    /// The eight corners, ordered by the binary pattern of (x, y, z) being max
    pub fn corners(self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// The six face midpoints in `-x, +x, -y, +y, -z, +z` order
    pub fn face_midpoints(self) -> [Vec3; 6] {
        let c = self.center();
        [
            c.with_x(self.min.x),
            c.with_x(self.max.x),
            c.with_y(self.min.y),
            c.with_y(self.max.y),
            c.with_z(self.min.z),
            c.with_z(self.max.z),
        ]
    }

    /// Midpoint of the face that points along `direction`'s dominant axis
    pub fn facing_midpoint(self, direction: Vec3) -> Vec3 {
        let axis = dominant_axis(direction);
        let c = self.center();
        if direction.get(axis) >= 0.0 {
            c.with(axis, self.max.get(axis))
        } else {
            c.with(axis, self.min.get(axis))
        }
    }

    /// Maps a world-space point into the box's normalized space, where the box
    /// spans `[-1, 1]` on every axis.
    ///
    /// Degenerate (zero-extent) axes are treated as having unit half-extent so
    /// that [`Bounds3::denormalize`] remains an exact inverse.
    pub fn normalize(self, point: Vec3) -> Vec3 {
        let center = self.center();
        let half = self.safe_half_extent();
        let offset = point - center;
        Vec3::new(offset.x / half.x, offset.y / half.y, offset.z / half.z)
    }

    /// Maps a normalized point back into world space; inverse of [`Bounds3::normalize`]
    pub fn denormalize(self, point: Vec3) -> Vec3 {
        self.center() + point.mul_components(self.safe_half_extent())
    }

    fn safe_half_extent(self) -> Vec3 {
        let half = self.size().scale(0.5);
        let fix = |v: f32| if v.abs() < EPSILON { 1.0 } else { v };
        Vec3::new(fix(half.x), fix(half.y), fix(half.z))
    }
}

/// Returns the axis along which `v` has the largest absolute component.
///
/// Ties resolve in `x, y, z` order.
pub fn dominant_axis(v: Vec3) -> Axis {
    let (ax, ay, az) = (v.x.abs(), v.y.abs(), v.z.abs());
    if ax >= ay && ax >= az {
        Axis::X
    } else if ay >= az {
        Axis::Y
    } else {
        Axis::Z
    }
}

/// Checks whether the segment `a -> b` passes within `radius` of `center`.
pub fn segment_intersects_sphere(a: Vec3, b: Vec3, center: Vec3, radius: f32) -> bool {
    distance_to_segment(center, a, b) < radius
}

/// Shortest distance from `point` to the segment `a -> b`
pub fn distance_to_segment(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab.scale(t))
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    fn vec3_strategy() -> impl Strategy<Value = Vec3> {
        (-1000.0f32..1000.0, -1000.0f32..1000.0, -1000.0f32..1000.0)
            .prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn bounds_strategy() -> impl Strategy<Value = Bounds3> {
        (vec3_strategy(), 1.0f32..500.0, 1.0f32..500.0, 0.0f32..500.0)
            .prop_map(|(c, w, h, d)| Bounds3::from_center(c, Vec3::new(w, h, d)))
    }

    // ===================
    // Property Checks
    // ===================

    /// Normalizing then denormalizing should return the original point.
    fn check_normalize_roundtrip(bounds: Bounds3, p: Vec3) -> Result<(), TestCaseError> {
        let roundtrip = bounds.denormalize(bounds.normalize(p));
        prop_assert!(approx_eq!(f32, roundtrip.x(), p.x(), epsilon = 0.01));
        prop_assert!(approx_eq!(f32, roundtrip.y(), p.y(), epsilon = 0.01));
        prop_assert!(approx_eq!(f32, roundtrip.z(), p.z(), epsilon = 0.01));
        Ok(())
    }

    /// Merged bounds should contain both original bounds.
    fn check_merge_contains_both(b1: Bounds3, b2: Bounds3) -> Result<(), TestCaseError> {
        let merged = b1.merge(&b2);
        for corner in b1.corners().into_iter().chain(b2.corners()) {
            prop_assert!(merged.contains(corner));
        }
        Ok(())
    }

    /// Normalized vectors have unit length unless degenerate.
    fn check_normalize_unit_length(v: Vec3) -> Result<(), TestCaseError> {
        let n = v.normalize_or_zero();
        if v.length() > 1e-3 {
            prop_assert!(approx_eq!(f32, n.length(), 1.0, epsilon = 1e-4));
        }
        Ok(())
    }

    /// Rotation preserves length.
    fn check_rotation_preserves_length(
        v: Vec3,
        axis: Vec3,
        angle: f32,
    ) -> Result<(), TestCaseError> {
        let rotated = v.rotate_about(axis, angle);
        prop_assert!(approx_eq!(
            f32,
            rotated.length(),
            v.length(),
            epsilon = v.length() * 1e-4 + 1e-3
        ));
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn normalize_roundtrip(bounds in bounds_strategy(), p in vec3_strategy()) {
            check_normalize_roundtrip(bounds, p)?;
        }

        #[test]
        fn merge_contains_both(b1 in bounds_strategy(), b2 in bounds_strategy()) {
            check_merge_contains_both(b1, b2)?;
        }

        #[test]
        fn normalize_unit_length(v in vec3_strategy()) {
            check_normalize_unit_length(v)?;
        }

        #[test]
        fn rotation_preserves_length(v in vec3_strategy(), axis in vec3_strategy(), angle in -6.3f32..6.3) {
            check_rotation_preserves_length(v, axis, angle)?;
        }
    }
}
