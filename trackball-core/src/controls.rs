//! User-facing viewer settings, sampled whenever they are used

use serde::{Deserialize, Serialize};

use crate::projection::Projection;
use crate::render::RenderOptions;

/// Zoom slider range, as a fraction of the normalized mesh size
pub const ZOOM_RANGE: (f32, f32) = (0.05, 3.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub zoom: f32,
    pub perspective: bool,
    pub perspective_distance: f32,
    pub depth_sort: bool,
    pub cull_back: bool,
    pub cull_front: bool,
    pub lighting: bool,
    pub fill: bool,
    pub stroke: bool,
    pub debug_log: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            perspective: false,
            perspective_distance: 5.0,
            depth_sort: true,
            cull_back: false,
            cull_front: false,
            lighting: true,
            fill: true,
            stroke: true,
            debug_log: false,
        }
    }
}

impl Controls {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn projection(&self) -> Projection {
        if self.perspective {
            Projection::Perspective {
                distance: self.perspective_distance,
            }
        } else {
            Projection::Orthographic
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            depth_sort: self.depth_sort,
            cull_back: self.cull_back,
            cull_front: self.cull_front,
            lighting: self.lighting,
            fill: self.fill,
            stroke: self.stroke,
        }
    }

    /// Step the zoom, staying inside `ZOOM_RANGE`.
    pub fn nudge_zoom(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_render_options() {
        assert_eq!(Controls::default().render_options(), RenderOptions::default());
        assert_eq!(Controls::default().projection(), Projection::Orthographic);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let controls = Controls::from_json(r#"{"perspective": true, "perspective_distance": 2.5}"#).unwrap();
        assert_eq!(controls.projection(), Projection::Perspective { distance: 2.5 });
        assert_eq!(controls.zoom, 1.0);
        assert!(controls.fill);
    }

    #[test]
    fn test_nudge_zoom_clamps() {
        let mut controls = Controls::default();
        controls.nudge_zoom(10.0);
        assert_eq!(controls.zoom, ZOOM_RANGE.1);
        controls.nudge_zoom(-10.0);
        assert_eq!(controls.zoom, ZOOM_RANGE.0);
    }
}
