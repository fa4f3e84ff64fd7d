//! Model, rotation and projection matrices for one viewer

use crate::math::{orthonormalize, uniform_scale, Mat4};
use crate::projection::Projection;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("Perspective distance must be finite and positive, got {0}")]
    InvalidPerspectiveDistance(f32),
}

/// Transform state: `rotation` accumulates user drags and survives reloads,
/// `model` is rebuilt every frame, `projection` only when its controls change.
#[derive(Debug, Clone)]
pub struct TransformStack {
    rotation: Mat4,
    model: Mat4,
    projection: Projection,
    projection_matrix: Mat4,
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            rotation: Mat4::identity(),
            model: Mat4::identity(),
            projection: Projection::Orthographic,
            projection_matrix: Mat4::identity(),
        }
    }

    pub fn rotation(&self) -> &Mat4 {
        &self.rotation
    }

    pub fn model(&self) -> &Mat4 {
        &self.model
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// `model = scale(zoom) * rotation`
    pub fn update_model(&mut self, zoom: f32) {
        self.model = uniform_scale(zoom) * self.rotation;
    }

    /// Rebuild the projection. On error the previous projection stays active.
    pub fn set_projection(&mut self, projection: Projection) -> Result<(), TransformError> {
        self.projection_matrix = projection.matrix()?;
        self.projection = projection;
        Ok(())
    }

    /// Apply a world-space rotation delta ahead of the accumulated rotation.
    ///
    /// Callers pass matrices from `math::axis_angle`. The product is
    /// re-orthonormalized so f32 rounding does not accumulate over long drags.
    pub fn rotate(&mut self, delta: &Mat4) {
        self.rotation = orthonormalize(&(delta * self.rotation));
    }

    pub fn reset_rotation(&mut self) {
        self.rotation = Mat4::identity();
    }

    /// Per-vertex transform for rendering: `projection * model`
    pub fn combined(&self) -> Mat4 {
        self.projection_matrix * self.model
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{axis_angle, is_proper_rotation, Vec3, Vec4};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_rotation() {
        let mut stack = TransformStack::new();
        stack.update_model(1.0);
        assert!((stack.combined() - Mat4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_model_scales_rotation() {
        let mut stack = TransformStack::new();
        stack.rotate(&axis_angle(FRAC_PI_2, &Vec3::z()).unwrap());
        stack.update_model(0.5);
        let p = stack.model() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p - Vec4::new(0.0, 0.5, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_rotate_applies_delta_on_the_left() {
        let a = axis_angle(FRAC_PI_2, &Vec3::x()).unwrap();
        let b = axis_angle(FRAC_PI_2, &Vec3::y()).unwrap();
        let mut stack = TransformStack::new();
        stack.rotate(&a);
        stack.rotate(&b);
        assert!((stack.rotation() - b * a).norm() < 1e-5);
        assert!(is_proper_rotation(stack.rotation(), 1e-5));
    }

    #[test]
    fn test_rejected_projection_keeps_previous() {
        let mut stack = TransformStack::new();
        stack
            .set_projection(Projection::Perspective { distance: 3.0 })
            .unwrap();
        let before = *stack.projection_matrix();

        let result = stack.set_projection(Projection::Perspective { distance: 0.0 });
        assert!(result.is_err());
        assert_eq!(stack.projection(), Projection::Perspective { distance: 3.0 });
        assert_eq!(*stack.projection_matrix(), before);
    }

    #[test]
    fn test_combined_applies_projection_last() {
        let mut stack = TransformStack::new();
        stack
            .set_projection(Projection::Perspective { distance: 2.0 })
            .unwrap();
        stack.update_model(2.0);
        let p = stack.combined() * Vec4::new(0.0, 0.0, 0.5, 1.0);
        // z scaled to 1.0 first, then w = 1 - 1/2
        assert!((p - Vec4::new(0.0, 0.0, 1.0, 0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_long_rotation_stays_proper() {
        let mut stack = TransformStack::new();
        // Deterministic spread of axes and small angles
        for i in 0..50_000u32 {
            let t = i as f32 * 0.618_034;
            let axis = Vec3::new(t.sin(), (t * 1.7).cos(), (t * 0.3).sin() + 0.1);
            if let Some(delta) = axis_angle(0.01 + (t * 2.3).sin().abs() * 0.05, &axis) {
                stack.rotate(&delta);
            }
        }
        assert!(is_proper_rotation(stack.rotation(), 1e-5));
    }
}
