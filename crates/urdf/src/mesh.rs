//! Mesh file loading: binary and ASCII STL, Wavefront OBJ.
//!
//! Meshes are returned as flat-shaded [`TriMesh`]es in link-local meters,
//! with the URDF `scale` already applied.

use std::path::Path;

use nalgebra::Vector3;
use robovis_core::TriMesh;
use thiserror::Error;

type Triangle = [Vector3<f32>; 3];

#[derive(Debug, Error)]
pub enum MeshError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unsupported mesh format '{0}'")]
    UnsupportedFormat(String),

    #[error("STL file truncated: expected {expected} bytes for {triangles} triangles, got {got}")]
    Truncated {
        triangles: usize,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("mesh has no triangles")]
    Empty,
}

/// Load a mesh file, choosing the parser by extension.
pub fn load_mesh(path: &Path, scale: Vector3<f64>) -> Result<TriMesh, MeshError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let triangles = match ext.as_str() {
        "stl" => parse_stl(&std::fs::read(path)?)?,
        "obj" => parse_obj(&std::fs::read_to_string(path)?)?,
        _ => return Err(MeshError::UnsupportedFormat(ext)),
    };
    if triangles.is_empty() {
        return Err(MeshError::Empty);
    }

    Ok(TriMesh::from_triangles(&scale_triangles(triangles, scale)))
}

/// Apply a per-axis scale. A mirroring scale flips the winding back so the
/// recomputed normals still face outward.
fn scale_triangles(mut triangles: Vec<Triangle>, scale: Vector3<f64>) -> Vec<Triangle> {
    let s = scale.cast::<f32>();
    let mirrored = s.x * s.y * s.z < 0.0;
    for tri in &mut triangles {
        for v in tri.iter_mut() {
            *v = v.component_mul(&s);
        }
        if mirrored {
            tri.swap(1, 2);
        }
    }
    triangles
}

/// Parse STL bytes. Files starting with `solid` are ASCII unless their size
/// matches the binary layout exactly (some exporters write `solid` into the
/// binary header).
pub fn parse_stl(data: &[u8]) -> Result<Vec<Triangle>, MeshError> {
    let looks_ascii = data.starts_with(b"solid") && !binary_size_matches(data);
    if looks_ascii {
        let text = String::from_utf8_lossy(data);
        parse_ascii_stl(&text)
    } else {
        parse_binary_stl(data)
    }
}

fn binary_size_matches(data: &[u8]) -> bool {
    data.len() >= 84 && data.len() == 84 + binary_triangle_count(data) * 50
}

fn binary_triangle_count(data: &[u8]) -> usize {
    u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize
}

fn parse_binary_stl(data: &[u8]) -> Result<Vec<Triangle>, MeshError> {
    if data.len() < 84 {
        return Err(MeshError::Truncated {
            triangles: 0,
            expected: 84,
            got: data.len(),
        });
    }

    // Skip 80-byte header
    let num_triangles = binary_triangle_count(data);
    let expected = 84 + num_triangles * 50; // 50 bytes per triangle
    if data.len() < expected {
        return Err(MeshError::Truncated {
            triangles: num_triangles,
            expected,
            got: data.len(),
        });
    }

    let mut triangles = Vec::with_capacity(num_triangles);
    let mut offset = 84;
    for _ in 0..num_triangles {
        offset += 12; // facet normal, recomputed from winding
        let a = read_vec3(data, offset);
        let b = read_vec3(data, offset + 12);
        let c = read_vec3(data, offset + 24);
        triangles.push([a, b, c]);
        offset += 36 + 2; // vertices + attribute byte count
    }
    Ok(triangles)
}

fn parse_ascii_stl(text: &str) -> Result<Vec<Triangle>, MeshError> {
    let mut triangles = Vec::new();
    let mut corners: Vec<Vector3<f32>> = Vec::with_capacity(3);

    for (i, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let v = parse_coords(&mut tokens, i + 1)?;
                corners.push(v);
            }
            Some("endloop") => {
                if corners.len() != 3 {
                    return Err(MeshError::Malformed {
                        line: i + 1,
                        message: format!("facet has {} vertices", corners.len()),
                    });
                }
                triangles.push([corners[0], corners[1], corners[2]]);
                corners.clear();
            }
            _ => {}
        }
    }
    Ok(triangles)
}

/// Parse Wavefront OBJ. Only `v` and `f` records are used; polygons are
/// fan-triangulated and negative (relative) indices are supported.
pub fn parse_obj(text: &str) -> Result<Vec<Triangle>, MeshError> {
    let mut positions: Vec<Vector3<f32>> = Vec::new();
    let mut triangles = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => positions.push(parse_coords(&mut tokens, line_no)?),
            Some("f") => {
                let face = tokens
                    .map(|t| resolve_obj_index(t, positions.len(), line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if face.len() < 3 {
                    return Err(MeshError::Malformed {
                        line: line_no,
                        message: "face needs at least 3 vertices".into(),
                    });
                }
                for k in 1..face.len() - 1 {
                    triangles.push([positions[face[0]], positions[face[k]], positions[face[k + 1]]]);
                }
            }
            _ => {}
        }
    }
    Ok(triangles)
}

/// Resolve a face token like `7`, `7/2/3` or `-1` to a 0-based vertex index.
fn resolve_obj_index(token: &str, count: usize, line: usize) -> Result<usize, MeshError> {
    let malformed = |message: String| MeshError::Malformed { line, message };
    let raw = token.split('/').next().unwrap_or_default();
    let idx: i64 = raw
        .parse()
        .map_err(|_| malformed(format!("invalid face index '{token}'")))?;
    let resolved = match idx {
        i if i > 0 => i - 1,
        i if i < 0 => count as i64 + i,
        _ => return Err(malformed("face index 0 is invalid".into())),
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(malformed(format!("face index {idx} out of range")));
    }
    Ok(resolved as usize)
}

fn parse_coords<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<Vector3<f32>, MeshError> {
    let mut v = [0.0f32; 3];
    for c in &mut v {
        *c = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| MeshError::Malformed {
                line,
                message: "expected three coordinates".into(),
            })?;
    }
    Ok(Vector3::new(v[0], v[1], v[2]))
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> Vector3<f32> {
    Vector3::new(
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    )
}
