//! Virtual trackball: turns pointer drags into rotations of the model.
//!
//! A pointer position is lifted onto a unit sphere centered on the viewport.
//! Each drag step rotates by the angle between the previous and current
//! sphere points about `current x previous`. That axis order is reversed from
//! the textbook `previous x current` and sets the rotation direction users
//! see, so it is kept as is.

use crate::math::{angle_between, axis_angle, cross, Mat4, Vec3};
use crate::projection::Viewport;
use crate::transform::TransformStack;

/// Lift normalized trackball coordinates onto the unit sphere. Points outside
/// the silhouette land on the rim (z = 0).
pub fn sphere_point(x: f32, y: f32) -> Vec3 {
    let d2 = x * x + y * y;
    let z = if d2 <= 1.0 { (1.0 - d2).sqrt() } else { 0.0 };
    Vec3::new(x, y, z)
}

/// One drag step's rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationDelta {
    pub axis: Vec3,
    pub angle: f32,
}

impl RotationDelta {
    pub fn matrix(&self) -> Option<Mat4> {
        axis_angle(self.angle, &self.axis)
    }
}

/// Rotation taking the drag from `previous` to `current`, `None` when the
/// step is degenerate (no movement, or parallel points).
pub fn rotation_delta(previous: &Vec3, current: &Vec3) -> Option<RotationDelta> {
    let axis = cross(current, previous);
    if axis == Vec3::zeros() {
        return None;
    }
    let angle = angle_between(previous, current)?;
    if angle == 0.0 || !angle.is_finite() {
        return None;
    }
    Some(RotationDelta { axis, angle })
}

/// Transient state between pointer down and up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub last: Vec3,
}

#[derive(Debug, Clone)]
pub struct ArcballController {
    viewport: Viewport,
    session: Option<DragSession>,
}

impl ArcballController {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            session: None,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    fn project(&self, sx: f32, sy: f32) -> Vec3 {
        let (x, y) = self.viewport.trackball_coords(sx, sy);
        sphere_point(x, y)
    }

    /// Pointer down at pixel (sx, sy)
    pub fn begin(&mut self, sx: f32, sy: f32) {
        self.session = Some(DragSession {
            last: self.project(sx, sy),
        });
    }

    /// Pointer move at pixel (sx, sy). Composes the step's rotation onto
    /// `transform` and returns it; does nothing outside a drag.
    pub fn drag(
        &mut self,
        sx: f32,
        sy: f32,
        transform: &mut TransformStack,
    ) -> Option<RotationDelta> {
        let current = self.project(sx, sy);
        let session = self.session.as_mut()?;
        let previous = std::mem::replace(&mut session.last, current);

        let step = rotation_delta(&previous, &current).and_then(|delta| {
            let matrix = delta.matrix()?;
            transform.rotate(&matrix);
            Some(delta)
        });
        if step.is_none() {
            tracing::trace!("Skipped degenerate drag step at ({sx}, {sy})");
        }
        step
    }

    /// Pointer up. The accumulated rotation is left untouched.
    pub fn end(&mut self) {
        self.session = None;
    }
}
