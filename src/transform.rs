//! Affine viewing transform between screen space and volume space.
//!
//! A [`Transform`] maps a screen point `(column, row, depth)` to a point in
//! voxel space. Its matrix columns double as step vectors: column 0 is the
//! increment for one pixel along an output row, column 2 is the increment for
//! one sample into the screen.

use glam::{Mat3, Vec3};
use std::ops::Mul;
use thiserror::Error;

const DEGENERATE_EPSILON: f32 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("Transform is degenerate (determinant {0})")]
    Degenerate(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: Mat3,
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Mat3::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Pure translation
    pub fn shifter(dx: f32, dy: f32, dz: f32) -> Self {
        Self {
            matrix: Mat3::IDENTITY,
            translation: Vec3::new(dx, dy, dz),
        }
    }

    /// Pure uniform scale about the origin
    pub fn scaler(factor: f32) -> Self {
        Self {
            matrix: Mat3::from_diagonal(Vec3::splat(factor)),
            translation: Vec3::ZERO,
        }
    }

    #[inline]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.matrix * point + self.translation
    }

    /// Column `axis` of the linear part (0 = row step, 1 = column step, 2 = depth step)
    #[inline]
    pub fn column(&self, axis: usize) -> Vec3 {
        self.matrix.col(axis)
    }

    pub fn inverse(&self) -> Result<Self, TransformError> {
        let det = self.matrix.determinant();
        if det.abs() < DEGENERATE_EPSILON || !det.is_finite() {
            return Err(TransformError::Degenerate(det));
        }
        let matrix = self.matrix.inverse();
        Ok(Self {
            matrix,
            translation: -(matrix * self.translation),
        })
    }

    /// Move the view by a screen-space offset.
    pub fn shift(&mut self, dx: f32, dy: f32, dz: f32) {
        *self = *self * Self::shifter(dx, dy, dz);
    }

    /// Scale about a pivot on the screen plane. The pivot keeps mapping to
    /// the same voxel.
    pub fn scale(&mut self, factor: f32, pivot_x: f32, pivot_y: f32) {
        *self = *self
            * Self::shifter(pivot_x, pivot_y, 0.0)
            * Self::scaler(factor)
            * Self::shifter(-pivot_x, -pivot_y, 0.0);
    }

    /// Orbit about a screen pivot: `angle_x` turns around the vertical screen
    /// axis (horizontal drag), `angle_y` around the horizontal one.
    pub fn rotate(&mut self, angle_x: f32, angle_y: f32, pivot_x: f32, pivot_y: f32) {
        let rotation = Self {
            matrix: Mat3::from_rotation_x(angle_y) * Mat3::from_rotation_y(angle_x),
            translation: Vec3::ZERO,
        };
        *self = *self
            * Self::shifter(pivot_x, pivot_y, 0.0)
            * rotation
            * Self::shifter(-pivot_x, -pivot_y, 0.0);
    }

    /// Voxels covered by one screen pixel along the row direction.
    pub fn scale_factor(&self) -> f32 {
        self.column(0).length()
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            matrix: self.matrix * rhs.matrix,
            translation: self.matrix * rhs.translation + self.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn test_composition_order() {
        let a = Transform::scaler(2.0);
        let b = Transform::shifter(1.0, 0.0, 0.0);
        // shift first, then scale
        assert_vec_eq((a * b).apply(Vec3::ZERO), Vec3::new(2.0, 0.0, 0.0));
        // scale first, then shift
        assert_vec_eq((b * a).apply(Vec3::ZERO), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut t = Transform::shifter(10.0, -4.0, 3.0);
        t.scale(1.7, 20.0, 30.0);
        t.rotate(0.3, -0.2, 5.0, 5.0);
        let inv = t.inverse().unwrap();
        let p = Vec3::new(3.0, 7.5, -2.0);
        assert_vec_eq(inv.apply(t.apply(p)), p);
        assert_vec_eq(t.apply(inv.apply(p)), p);
    }

    #[test]
    fn test_degenerate_inverse() {
        let t = Transform::scaler(0.0);
        assert!(matches!(t.inverse(), Err(TransformError::Degenerate(_))));
    }

    #[test]
    fn test_scale_keeps_pivot() {
        let mut t = Transform::shifter(50.0, 60.0, 7.0);
        let pivot = Vec3::new(12.0, 8.0, 0.0);
        let before = t.apply(pivot);
        t.scale(0.5f32.exp(), pivot.x, pivot.y);
        assert_vec_eq(t.apply(pivot), before);
        assert_relative_eq!(t.scale_factor(), 0.5f32.exp(), epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_keeps_pivot() {
        let mut t = Transform::shifter(5.0, 5.0, 5.0);
        let before = t.apply(Vec3::new(3.0, 4.0, 0.0));
        t.rotate(0.25, 0.1, 3.0, 4.0);
        assert_vec_eq(t.apply(Vec3::new(3.0, 4.0, 0.0)), before);
    }

    #[test]
    fn test_shift_is_screen_space() {
        let mut t = Transform::scaler(2.0);
        t.shift(1.0, 2.0, 3.0);
        assert_vec_eq(t.apply(Vec3::ZERO), Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_columns_are_step_vectors() {
        let mut t = Transform::scaler(3.0);
        t.shift(4.0, 0.0, 0.0);
        let p0 = t.apply(Vec3::new(0.0, 1.0, 0.0));
        let p1 = t.apply(Vec3::new(1.0, 1.0, 0.0));
        assert_vec_eq(p1 - p0, t.column(0));
        let d1 = t.apply(Vec3::new(0.0, 1.0, 1.0));
        assert_vec_eq(d1 - p0, t.column(2));
    }
}
