//! Mesh document parsing, validation and unit-sphere normalization

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::{Face, Mesh, Reflectivity};
use crate::math::{Vec3, Vec4};

/// Meshes are scaled to 1/0.85 of a unit box so they sit inside the
/// trackball circle with some margin.
pub const FIT_FACTOR: f32 = 0.85;

/// Parsed mesh file, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDocument {
    #[serde(rename = "vertexPositions")]
    pub vertex_positions: Vec<f32>,
    pub groups: Vec<GroupDocument>,
}

/// Faces sharing one reflectivity. Only lives until flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub faces: Vec<Vec<usize>>,
    #[serde(rename = "Kd")]
    pub kd: [f32; 3],
}

/// Mesh loading errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Vertex position count {0} is not a multiple of 3")]
    PositionCount(usize),
    #[error("Vertex coordinate {0} is not finite")]
    NonFiniteCoordinate(usize),
    #[error("Empty mesh: no vertices found")]
    EmptyMesh,
    #[error("Group {group} face {face} has {count} vertices, need at least 3")]
    FaceTooSmall {
        group: usize,
        face: usize,
        count: usize,
    },
    #[error("Group {group} face {face} references vertex {index}, mesh has {vertex_count}")]
    IndexOutOfRange {
        group: usize,
        face: usize,
        index: usize,
        vertex_count: usize,
    },
    #[error("Group {0} has a non-finite Kd component")]
    NonFiniteKd(usize),
    #[error("Degenerate mesh: bounding box has zero extent")]
    Degenerate,
}

impl MeshDocument {
    /// Parse and validate a JSON mesh document.
    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        let doc: MeshDocument =
            serde_json::from_str(text).map_err(|e| LoadError::Parse(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_positions.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.groups.iter().map(|g| g.faces.len()).sum()
    }

    /// Check the structural invariants the normalizer relies on.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.vertex_positions.len() % 3 != 0 {
            return Err(LoadError::PositionCount(self.vertex_positions.len()));
        }
        if let Some(i) = self.vertex_positions.iter().position(|c| !c.is_finite()) {
            return Err(LoadError::NonFiniteCoordinate(i));
        }
        let vertex_count = self.vertex_count();
        if vertex_count == 0 {
            return Err(LoadError::EmptyMesh);
        }

        for (g, group) in self.groups.iter().enumerate() {
            if !group.kd.iter().all(|c| c.is_finite()) {
                return Err(LoadError::NonFiniteKd(g));
            }
            for (f, face) in group.faces.iter().enumerate() {
                if face.len() < 3 {
                    return Err(LoadError::FaceTooSmall {
                        group: g,
                        face: f,
                        count: face.len(),
                    });
                }
                if let Some(&index) = face.iter().find(|&&i| i >= vertex_count) {
                    return Err(LoadError::IndexOutOfRange {
                        group: g,
                        face: f,
                        index,
                        vertex_count,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Axis-aligned bounds of the raw positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Bounds of a flat xyz position list, `None` if it has no complete triple.
    pub fn of(positions: &[f32]) -> Option<Self> {
        let mut chunks = positions.chunks_exact(3);
        let first = chunks.next()?;
        let start = Vec3::new(first[0], first[1], first[2]);
        let (min, max) = chunks.fold((start, start), |(min, max), c| {
            let p = Vec3::new(c[0], c[1], c[2]);
            (min.inf(&p), max.sup(&p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    pub fn max_extent(&self) -> f32 {
        (self.max - self.min).max()
    }
}

/// Validate `doc`, then recenter and rescale it into the unit sphere and
/// flatten its groups into one face list.
pub fn normalize(doc: &MeshDocument) -> Result<Mesh, LoadError> {
    doc.validate()?;

    let bounds = Bounds::of(&doc.vertex_positions).ok_or(LoadError::EmptyMesh)?;
    for axis in 0..3 {
        tracing::debug!(
            "mins[{axis}]: {} maxes[{axis}]: {}",
            bounds.min[axis],
            bounds.max[axis]
        );
    }

    let center = bounds.center();
    let scale_factor = bounds.max_extent() * FIT_FACTOR;
    if scale_factor == 0.0 || !scale_factor.is_finite() {
        return Err(LoadError::Degenerate);
    }

    let vertices: Vec<Vec4> = doc
        .vertex_positions
        .chunks_exact(3)
        .map(|c| {
            let p = (Vec3::new(c[0], c[1], c[2]) - center) / scale_factor;
            p.push(1.0)
        })
        .collect();

    let faces: Vec<Face> = doc
        .groups
        .iter()
        .flat_map(|group| {
            let kd = Reflectivity::from(group.kd);
            group
                .faces
                .iter()
                .map(move |indices| Face::new(indices.clone(), kd))
        })
        .collect();

    tracing::info!(
        "Normalized mesh: {} vertices, {} faces",
        vertices.len(),
        faces.len()
    );

    Ok(Mesh { vertices, faces })
}

/// Mesh file formats accepted from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Json,
    Stl,
    Unknown,
}

impl MeshFormat {
    /// Detect format from file path
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("json") => MeshFormat::Json,
            Some("stl") => MeshFormat::Stl,
            _ => MeshFormat::Unknown,
        }
    }
}

/// Decode the bytes of a mesh file already in memory.
pub fn decode_document(format: MeshFormat, data: &[u8]) -> Result<MeshDocument, LoadError> {
    match format {
        MeshFormat::Json => {
            let text = std::str::from_utf8(data).map_err(|e| LoadError::Parse(e.to_string()))?;
            MeshDocument::from_json(text)
        }
        MeshFormat::Stl => {
            let doc = crate::stl::parse_stl(data)?;
            doc.validate()?;
            Ok(doc)
        }
        MeshFormat::Unknown => Err(LoadError::UnsupportedFormat("unknown".to_string())),
    }
}

/// Read a mesh document from a `.json` or `.stl` file.
pub fn load_document(path: impl AsRef<Path>) -> Result<MeshDocument, LoadError> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path);
    if format == MeshFormat::Unknown {
        return Err(LoadError::UnsupportedFormat(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        ));
    }
    let data = std::fs::read(path).map_err(|e| LoadError::Io(e.to_string()))?;
    decode_document(format, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRIANGLE: &str = r#"{
        "vertexPositions": [-1, -1, 0,  1, -1, 0,  0, 1, 0],
        "groups": [{ "faces": [[0, 1, 2]], "Kd": [1, 0, 0] }]
    }"#;

    fn tetra() -> MeshDocument {
        MeshDocument {
            vertex_positions: vec![
                10.0, 4.0, -2.0, 14.0, 4.0, -2.0, 10.0, 7.0, -2.0, 10.0, 4.0, 0.0,
            ],
            groups: vec![
                GroupDocument {
                    name: Some("base".into()),
                    faces: vec![vec![0, 1, 2], vec![0, 3, 1]],
                    kd: [0.5, 0.5, 0.5],
                },
                GroupDocument {
                    name: None,
                    faces: vec![vec![0, 2, 3], vec![1, 3, 2]],
                    kd: [0.0, 1.0, 0.0],
                },
            ],
        }
    }

    #[test]
    fn test_parse_triangle_json() {
        let doc = MeshDocument::from_json(TRIANGLE).unwrap();
        assert_eq!(doc.vertex_count(), 3);
        assert_eq!(doc.face_count(), 1);
        assert_eq!(doc.groups[0].kd, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalized_extent() {
        let mesh = normalize(&tetra()).unwrap();
        let flat: Vec<f32> = mesh.vertices.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        let bounds = Bounds::of(&flat).unwrap();

        assert!((bounds.max_extent() - 1.0 / FIT_FACTOR).abs() < 1e-5);
        for axis in 0..3 {
            assert!((bounds.min[axis] + bounds.max[axis]).abs() < 1e-5);
            assert!(bounds.max[axis] <= 0.5 / FIT_FACTOR + 1e-5);
        }
        assert!(mesh.vertices.iter().all(|v| v.w == 1.0));
    }

    #[test]
    fn test_faces_flatten_in_group_order() {
        let mesh = normalize(&tetra()).unwrap();
        let order: Vec<&[usize]> = mesh.faces.iter().map(|f| f.indices.as_slice()).collect();
        assert_eq!(order, vec![&[0, 1, 2][..], &[0, 3, 1], &[0, 2, 3], &[1, 3, 2]]);
        assert_eq!(mesh.faces[1].kd, Reflectivity::new(0.5, 0.5, 0.5));
        assert_eq!(mesh.faces[2].kd, Reflectivity::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let doc = tetra();
        assert_eq!(normalize(&doc).unwrap(), normalize(&doc).unwrap());
    }

    #[test]
    fn test_flat_mesh_is_not_degenerate() {
        let doc = MeshDocument::from_json(TRIANGLE).unwrap();
        let mesh = normalize(&doc).unwrap();
        assert!((mesh.vertices[0].x - (-1.0 / 1.7)).abs() < 1e-6);
        assert_eq!(mesh.vertices[0].z, 0.0);
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let doc = MeshDocument {
            vertex_positions: vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0],
            groups: vec![GroupDocument {
                name: None,
                faces: vec![vec![0, 1, 2]],
                kd: [1.0, 1.0, 1.0],
            }],
        };
        assert_eq!(normalize(&doc), Err(LoadError::Degenerate));
    }

    #[test]
    fn test_rejects_malformed_documents() {
        let cases = [
            (r#"{"vertexPositions": [0, 0], "groups": []}"#, LoadError::PositionCount(2)),
            (r#"{"vertexPositions": [], "groups": []}"#, LoadError::EmptyMesh),
            (
                r#"{"vertexPositions": [0,0,0, 1,0,0, 0,1,0], "groups": [{"faces": [[0, 1]], "Kd": [1,1,1]}]}"#,
                LoadError::FaceTooSmall { group: 0, face: 0, count: 2 },
            ),
            (
                r#"{"vertexPositions": [0,0,0, 1,0,0, 0,1,0], "groups": [{"faces": [[0, 1, 3]], "Kd": [1,1,1]}]}"#,
                LoadError::IndexOutOfRange { group: 0, face: 0, index: 3, vertex_count: 3 },
            ),
        ];
        for (json, expected) in cases {
            assert_eq!(MeshDocument::from_json(json), Err(expected));
        }
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        for json in [
            "not json",
            r#"{"vertexPositions": [0, 0, 0]}"#,
            r#"{"vertexPositions": [0,0,0], "groups": [{"faces": [], "Kd": [1, 1]}]}"#,
            r#"{"vertexPositions": [0,0,0], "groups": [{"faces": [[0, -1, 0]], "Kd": [1, 1, 1]}]}"#,
        ] {
            assert!(matches!(MeshDocument::from_json(json), Err(LoadError::Parse(_))), "{json}");
        }
    }

    #[test]
    fn test_decode_document_from_bytes() {
        let doc = decode_document(MeshFormat::Json, TRIANGLE.as_bytes()).unwrap();
        assert_eq!(doc.face_count(), 1);
        assert!(matches!(
            decode_document(MeshFormat::Json, &[0xff, 0xfe]),
            Err(LoadError::Parse(_))
        ));
        assert!(matches!(
            decode_document(MeshFormat::Unknown, b"{}"),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_document_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(TRIANGLE.as_bytes()).unwrap();
        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.vertex_count(), 3);

        let other = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        assert_eq!(
            load_document(other.path()),
            Err(LoadError::UnsupportedFormat("obj".into()))
        );
        assert!(matches!(
            load_document("/nonexistent/mesh.json"),
            Err(LoadError::Io(_))
        ));
    }
}
