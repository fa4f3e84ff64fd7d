//! Viewer context: everything one trackball view mutates.
//!
//! All methods take `&mut self` and are meant to be called from a single
//! control thread (render ticks, pointer events, control changes and load
//! completions interleave but never overlap). Hosts that load meshes in the
//! background send the result back to that thread and apply it with
//! [`Viewer::complete_load`].

use std::collections::VecDeque;

use crate::arcball::{ArcballController, RotationDelta};
use crate::controls::Controls;
use crate::geometry::Mesh;
use crate::loader::{Bounds, LoadError, MeshDocument};
use crate::projection::{Projection, Viewport};
use crate::render::{FrameStats, Renderer};
use crate::surface::DrawingSurface;
use crate::transform::{TransformError, TransformStack};

const DEBUG_LOG_LINES: usize = 64;

/// Identifies one requested load; only the most recent ticket is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was requested after this one; the result was dropped
    Stale,
    /// The previous mesh is still displayed
    Failed(LoadError),
}

pub struct Viewer {
    mesh: Mesh,
    transform: TransformStack,
    controls: Controls,
    arcball: ArcballController,
    renderer: Renderer,
    generation: u64,
    status: Option<String>,
    debug_log: VecDeque<String>,
}

impl Viewer {
    pub fn new(viewport: Viewport, controls: Controls) -> Self {
        let mut viewer = Self {
            mesh: Mesh::default(),
            transform: TransformStack::new(),
            controls,
            arcball: ArcballController::new(viewport),
            renderer: Renderer::new(),
            generation: 0,
            status: None,
            debug_log: VecDeque::new(),
        };
        viewer.apply_projection();
        viewer
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn transform(&self) -> &TransformStack {
        &self.transform
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn viewport(&self) -> &Viewport {
        self.arcball.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.arcball.set_viewport(viewport);
    }

    /// Last load status, for display next to the view
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Advisory messages collected while `debug_log` is on, oldest first
    pub fn debug_messages(&self) -> impl Iterator<Item = &str> {
        self.debug_log.iter().map(String::as_str)
    }

    fn log(&mut self, message: String) {
        tracing::debug!("{message}");
        if !self.controls.debug_log {
            return;
        }
        if self.debug_log.len() == DEBUG_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(message);
    }

    fn apply_projection(&mut self) {
        let projection = self.controls.projection();
        if let Err(e) = self.transform.set_projection(projection) {
            self.reject_projection(&e);
        }
    }

    /// Point the projection fields of `controls` back at the projection still
    /// in use, so hosts never display a setting that is not rendered.
    fn reject_projection(&mut self, error: &TransformError) {
        tracing::warn!("Keeping previous projection: {}", error);
        self.status = Some(error.to_string());
        match self.transform.projection() {
            Projection::Orthographic => self.controls.perspective = false,
            Projection::Perspective { distance } => {
                self.controls.perspective = true;
                self.controls.perspective_distance = distance;
            }
        }
    }

    /// Replace the controls. The projection is rebuilt only when the
    /// projection settings changed; an invalid one leaves the old matrix and
    /// the old projection settings.
    pub fn set_controls(&mut self, controls: Controls) -> Result<(), TransformError> {
        let projection = controls.projection();
        self.controls = controls;
        if projection == self.transform.projection() {
            return Ok(());
        }
        match self.transform.set_projection(projection) {
            Ok(()) => {
                self.status = None;
                Ok(())
            }
            Err(e) => {
                self.reject_projection(&e);
                Err(e)
            }
        }
    }

    pub fn update_controls(
        &mut self,
        change: impl FnOnce(&mut Controls),
    ) -> Result<(), TransformError> {
        let mut controls = self.controls.clone();
        change(&mut controls);
        self.set_controls(controls)
    }

    /// Start a load of `source`, superseding any load still in flight.
    pub fn begin_load(&mut self, source: &str) -> LoadTicket {
        self.generation += 1;
        self.log(format!("Loading {source}"));
        LoadTicket(self.generation)
    }

    /// Apply a finished load if it is still the latest one requested.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<MeshDocument, LoadError>,
    ) -> LoadOutcome {
        if ticket.0 != self.generation {
            tracing::debug!(
                "Dropping stale load {} (latest is {})",
                ticket.0,
                self.generation
            );
            return LoadOutcome::Stale;
        }

        if let Ok(doc) = &result {
            if let Some(bounds) = Bounds::of(&doc.vertex_positions) {
                for (axis, i) in [("x", 0), ("y", 1), ("z", 2)] {
                    self.log(format!(
                        "{axis}: {} .. {}",
                        bounds.min[i], bounds.max[i]
                    ));
                }
            }
        }

        match result.and_then(|doc| Mesh::from_document(&doc)) {
            Ok(mesh) => {
                self.log(format!(
                    "{} vertices, {} faces",
                    mesh.vertices.len(),
                    mesh.faces.len()
                ));
                tracing::info!("Loaded mesh with {} faces", mesh.faces.len());
                self.mesh = mesh;
                self.status = None;
                LoadOutcome::Applied
            }
            Err(e) => {
                tracing::warn!("Failed to load mesh: {}", e);
                self.status = Some(format!("Load failed: {e}"));
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Load a document that is already in hand.
    pub fn load(&mut self, source: &str, doc: MeshDocument) -> LoadOutcome {
        let ticket = self.begin_load(source);
        self.complete_load(ticket, Ok(doc))
    }

    pub fn pointer_down(&mut self, sx: f32, sy: f32) {
        self.arcball.begin(sx, sy);
    }

    pub fn pointer_move(&mut self, sx: f32, sy: f32) -> Option<RotationDelta> {
        self.arcball.drag(sx, sy, &mut self.transform)
    }

    pub fn pointer_up(&mut self) {
        self.arcball.end();
    }

    pub fn is_dragging(&self) -> bool {
        self.arcball.is_dragging()
    }

    /// Orientation back to identity and projection rebuilt from controls.
    /// The mesh is kept.
    pub fn reset(&mut self) {
        self.arcball.end();
        self.transform.reset_rotation();
        self.apply_projection();
        self.log("Reset view".to_string());
    }

    /// One frame: rebuild the model matrix from zoom and rotation, then render.
    pub fn tick<S: DrawingSurface + ?Sized>(&mut self, surface: &mut S) -> FrameStats {
        self.transform.update_model(self.controls.zoom);
        let options = self.controls.render_options();
        self.renderer
            .render(&self.mesh, &self.transform, &options, surface)
    }
}
