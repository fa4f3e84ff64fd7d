//! STL import (binary and ASCII) into a single-group mesh document

use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::loader::{GroupDocument, LoadError, MeshDocument};

/// STL carries no material, so every facet gets this neutral gray
pub const STL_REFLECTIVITY: [f32; 3] = [0.8, 0.8, 0.8];

type Facet = [[f32; 3]; 3];

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<MeshDocument, LoadError> {
    if data.len() < 84 {
        return Err(LoadError::Parse("File too small to be a valid STL".to_string()));
    }

    // Skip 80-byte header
    let data = &data[80..];
    let triangle_count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let body = &data[4..];

    let needed = triangle_count
        .checked_mul(50)
        .ok_or_else(|| LoadError::Parse(format!("Triangle count {triangle_count} is too large")))?;
    if body.len() < needed {
        return Err(LoadError::Parse("Unexpected end of file".to_string()));
    }

    let facets = body.chunks_exact(50).take(triangle_count).map(|record| {
        // 12 bytes of normal precede the vertices, 2 attribute bytes follow them
        let mut facet = [[0.0; 3]; 3];
        for (v, vertex) in facet.iter_mut().enumerate() {
            for (c, coord) in vertex.iter_mut().enumerate() {
                let at = 12 + v * 12 + c * 4;
                *coord = f32::from_le_bytes([
                    record[at],
                    record[at + 1],
                    record[at + 2],
                    record[at + 3],
                ]);
            }
        }
        facet
    });

    Ok(facets_to_document(facets))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<MeshDocument, LoadError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, facets)) => Ok(facets_to_document(facets)),
        Err(e) => Err(LoadError::Parse(format!("Failed to parse ASCII STL: {:?}", e))),
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Vec<Facet>> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // Optional name
    let (input, facets) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    Ok((input, facets))
}

fn parse_facet(input: &str) -> IResult<&str, Facet> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, _normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input)?;
    let (input, v2) = parse_vertex(input)?;
    let (input, v3) = parse_vertex(input)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, [v1, v2, v3]))
}

fn parse_vertex(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    parse_vector3(input)
}

fn parse_vector3(input: &str) -> IResult<&str, [f32; 3]> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, [x, y, z]))
}

/// Every facet contributes three fresh vertices and one face.
fn facets_to_document(facets: impl IntoIterator<Item = Facet>) -> MeshDocument {
    let mut vertex_positions: Vec<f32> = Vec::new();
    let mut faces = Vec::new();
    for facet in facets {
        let first = vertex_positions.len() / 3;
        vertex_positions.extend(facet.iter().flatten());
        faces.push(vec![first, first + 1, first + 2]);
    }

    MeshDocument {
        vertex_positions,
        groups: vec![GroupDocument {
            name: Some("stl".to_string()),
            faces,
            kd: STL_REFLECTIVITY,
        }],
    }
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<MeshDocument, LoadError> {
    // Binary files may also start with "solid", so fall back on failure
    if data.len() > 5 && &data[0..5] == b"solid" {
        if let Ok(text) = std::str::from_utf8(data) {
            if let Ok(doc) = parse_ascii_stl(text) {
                return Ok(doc);
            }
        }
    }

    parse_binary_stl(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII: &str = "solid tri
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1.5 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 1 0 0
      vertex 1 1 0
      vertex 0 1.5 -2e-1
    endloop
  endfacet
endsolid tri
";

    fn binary(facets: &[Facet]) -> Vec<u8> {
        let mut data = vec![0u8; 80];
        data.extend((facets.len() as u32).to_le_bytes());
        for facet in facets {
            data.extend([0u8; 12]);
            for c in facet.iter().flatten() {
                data.extend(c.to_le_bytes());
            }
            data.extend([0u8; 2]);
        }
        data
    }

    #[test]
    fn test_parse_binary_header() {
        let doc = parse_binary_stl(&binary(&[])).unwrap();
        assert_eq!(doc.face_count(), 0);
        assert_eq!(doc.vertex_count(), 0);
    }

    #[test]
    fn test_parse_binary_facets() {
        let facet = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 1.0]];
        let doc = parse_stl(&binary(&[facet, facet])).unwrap();
        assert_eq!(doc.vertex_count(), 6);
        assert_eq!(doc.groups[0].faces, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(&doc.vertex_positions[3..9], &[2.0, 0.0, 0.0, 0.0, 3.0, 1.0]);
        assert_eq!(doc.groups[0].kd, STL_REFLECTIVITY);
    }

    #[test]
    fn test_parse_binary_truncated() {
        let mut data = binary(&[[[0.0; 3]; 3]]);
        data.truncate(100);
        assert!(matches!(parse_binary_stl(&data), Err(LoadError::Parse(_))));
        assert!(parse_binary_stl(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_parse_ascii_with_name() {
        let doc = parse_stl(ASCII.as_bytes()).unwrap();
        assert_eq!(doc.face_count(), 2);
        assert_eq!(doc.vertex_count(), 6);
        assert!((doc.vertex_positions[17] - -0.2).abs() < 1e-6);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_parse_binary_rejects_huge_count() {
        // One real facet behind a header claiming u32::MAX
        let mut data = binary(&[[[0.0; 3]; 3]]);
        data[80..84].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(parse_binary_stl(&data), Err(LoadError::Parse(_))));
    }
}
