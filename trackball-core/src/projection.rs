//! Projection matrices and the fixed world-to-screen mapping

use crate::math::Mat4;
use crate::transform::TransformError;

/// Projection applied after the model matrix
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Projection {
    #[default]
    Orthographic,
    /// Perspective with the eye `distance` units up the z axis
    Perspective { distance: f32 },
}

impl Projection {
    /// Build the projection matrix.
    ///
    /// Orthographic is the identity (z only feeds sorting and culling).
    /// Perspective puts `-1/d` in the fourth row so `w = 1 - z/d`.
    pub fn matrix(&self) -> Result<Mat4, TransformError> {
        match *self {
            Projection::Orthographic => Ok(Mat4::identity()),
            Projection::Perspective { distance } => {
                if !(distance > 0.0 && distance.is_finite()) {
                    return Err(TransformError::InvalidPerspectiveDistance(distance));
                }
                let mut m = Mat4::identity();
                m[(3, 2)] = -1.0 / distance;
                Ok(m)
            }
        }
    }
}

/// Affine mapping between world units and host pixels: origin at the
/// viewport center, `radius` pixels per unit, y up in world space.
///
/// `aspect` stretches x for hosts with non-square pixels (terminal cells
/// are roughly twice as tall as wide).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub aspect: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, radius: f32) -> Self {
        Self {
            width,
            height,
            radius,
            aspect: 1.0,
        }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// World (x, y) to pixel coordinates.
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        let (cx, cy) = self.center();
        (cx + x * self.radius * self.aspect, cy - y * self.radius)
    }

    /// Pixel coordinates to trackball-normalized coordinates.
    ///
    /// Unlike `to_screen` this keeps the pixel y direction; the arcball's
    /// rotation handedness is defined in this space.
    pub fn trackball_coords(&self, sx: f32, sy: f32) -> (f32, f32) {
        let (cx, cy) = self.center();
        (
            (sx - cx) / (self.radius * self.aspect),
            (sy - cy) / self.radius,
        )
    }
}

impl Default for Viewport {
    /// Canvas size of the classic page layout
    fn default() -> Self {
        Self::new(450.0, 342.0, 150.0)
    }
}
