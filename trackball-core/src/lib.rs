//! Trackball Core Library - software mesh viewer pipeline
//!
//! Loads and normalizes meshes, keeps the model/rotation/projection transform
//! state, turns pointer drags into arcball rotations and renders flat-shaded,
//! depth-sorted faces onto any `DrawingSurface`. Hosts (terminal, web) only
//! supply the surface, the input events and the frame timer.

pub mod arcball;
pub mod controls;
pub mod driver;
pub mod geometry;
pub mod loader;
pub mod math;
pub mod projection;
pub mod render;
pub mod stl;
pub mod surface;
pub mod transform;
pub mod viewer;

// Re-export commonly used types
pub use arcball::{ArcballController, RotationDelta};
pub use controls::Controls;
pub use driver::FrameDriver;
pub use geometry::{Face, Mesh, Reflectivity};
pub use loader::{LoadError, MeshDocument, MeshFormat};
pub use projection::{Projection, Viewport};
pub use render::{FrameStats, RenderOptions, Renderer};
pub use surface::{DrawingSurface, RecordingSurface, Rgb};
pub use transform::{TransformError, TransformStack};
pub use viewer::{LoadOutcome, LoadTicket, Viewer};
