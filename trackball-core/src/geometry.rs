//! Normalized mesh primitives consumed by the render pipeline

use crate::loader::{GroupDocument, LoadError, MeshDocument};
use crate::math::Vec4;

/// Diffuse reflectivity of a face, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflectivity {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Reflectivity {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl From<[f32; 3]> for Reflectivity {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Self { r, g, b }
    }
}

/// A planar polygon over vertex indices, drawn closed
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub indices: Vec<usize>,
    pub kd: Reflectivity,
}

impl Face {
    pub fn new(indices: Vec<usize>, kd: Reflectivity) -> Self {
        Self { indices, kd }
    }
}

/// A loaded object: homogeneous vertices (w = 1) inside the unit sphere and a
/// flat face list. Replaced wholesale on every load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec4>,
    pub faces: Vec<Face>,
}

impl Mesh {
    /// Validate and normalize a parsed document.
    pub fn from_document(doc: &MeshDocument) -> Result<Self, LoadError> {
        crate::loader::normalize(doc)
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Built-in demo cube with one colored group per side
    pub fn cube() -> Self {
        // A hand-built cube always has extent, so normalization cannot fail
        crate::loader::normalize(&cube_document()).unwrap_or_default()
    }
}

/// Document for a 2x2x2 cube.
///
/// Sides are wound clockwise seen from outside, so `(v2 - v1) x (v3 - v2)`
/// points inward and a side facing the eye has a negative facing value.
pub fn cube_document() -> MeshDocument {
    #[rustfmt::skip]
    let vertex_positions = vec![
        -1.0, -1.0, -1.0,
         1.0, -1.0, -1.0,
         1.0,  1.0, -1.0,
        -1.0,  1.0, -1.0,
        -1.0, -1.0,  1.0,
         1.0, -1.0,  1.0,
         1.0,  1.0,  1.0,
        -1.0,  1.0,  1.0,
    ];

    let side = |name: &str, face: [usize; 4], kd: [f32; 3]| GroupDocument {
        name: Some(name.to_string()),
        faces: vec![face.to_vec()],
        kd,
    };

    MeshDocument {
        vertex_positions,
        groups: vec![
            side("front", [4, 7, 6, 5], [1.0, 0.2, 0.2]),
            side("back", [0, 1, 2, 3], [0.2, 1.0, 0.2]),
            side("top", [3, 2, 6, 7], [0.2, 0.2, 1.0]),
            side("bottom", [4, 5, 1, 0], [1.0, 1.0, 0.2]),
            side("right", [5, 6, 2, 1], [0.2, 1.0, 1.0]),
            side("left", [0, 3, 7, 4], [1.0, 0.2, 1.0]),
        ],
    }
}
