//! OBJ file loader for triangulated models
//!
//! Reads `v`, `vt`, `vn` and `f v/t/n v/t/n v/t/n` lines. Every face corner
//! becomes its own vertex (no deduplication), so the resulting mesh always
//! has three vertices and three sequential indices per face line.
//!
//! Bad input never fails the load. Malformed lines and out-of-range face
//! indices are logged, counted in an [`ObjParseReport`] and replaced with
//! default vertices so the face count stays intact.

use std::path::Path;

use crate::render::primitives::{Mesh, Vertex};

/// Slots added to a scratch attribute array when it fills up
const SCRATCH_INCREMENT: usize = 2048;

/// Errors that prevent an OBJ file from being read at all
#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not text
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Counts gathered while parsing one OBJ source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjParseReport {
    /// `v` lines
    pub positions: usize,
    /// `vt` lines
    pub tex_coords: usize,
    /// `vn` lines
    pub normals: usize,
    /// `f` lines
    pub faces: usize,
    /// Lines that could not be parsed
    pub malformed_lines: usize,
    /// Face corners whose indices fell outside the parsed attributes
    pub out_of_bounds_corners: usize,
}

impl ObjParseReport {
    /// Whether the source parsed without any problem
    pub fn is_clean(&self) -> bool {
        self.malformed_lines == 0 && self.out_of_bounds_corners == 0
    }
}

/// Attribute arrays collected in the first pass
#[derive(Debug, Default)]
struct Scratch {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

impl Scratch {
    fn new() -> Self {
        Self {
            positions: Vec::with_capacity(SCRATCH_INCREMENT),
            tex_coords: Vec::with_capacity(SCRATCH_INCREMENT),
            normals: Vec::with_capacity(SCRATCH_INCREMENT),
        }
    }
}

fn push_grow<T>(buffer: &mut Vec<T>, value: T) {
    if buffer.len() == buffer.capacity() {
        buffer.reserve_exact(SCRATCH_INCREMENT);
    }
    buffer.push(value);
}

/// Parse the first `N` tokens as floats, ignoring any extra components
fn parse_floats<'a, const N: usize>(mut tokens: impl Iterator<Item = &'a str>) -> Option<[f32; N]> {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        *value = tokens.next()?.parse().ok()?;
    }
    Some(values)
}

/// Parse one `v/t/n` face corner
fn parse_corner(token: &str) -> Option<[i64; 3]> {
    let mut parts = token.split('/');
    let mut corner = [0; 3];
    for value in corner.iter_mut() {
        *value = parts.next()?.parse().ok()?;
    }
    match parts.next() {
        Some(_) => None,
        None => Some(corner),
    }
}

/// Resolve a 1-based OBJ index against `items`
fn resolve<T: Copy>(items: &[T], index: i64) -> Option<T> {
    let index = usize::try_from(index).ok()?.checked_sub(1)?;
    items.get(index).copied()
}

/// Loader for Wavefront OBJ meshes
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and return a mesh
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, ObjError> {
        Self::load_obj_with_report(path).map(|(mesh, _)| mesh)
    }

    /// Load an OBJ file, also returning what the parser encountered
    pub fn load_obj_with_report<P: AsRef<Path>>(path: P) -> Result<(Mesh, ObjParseReport), ObjError> {
        let path = path.as_ref();
        log::debug!("Parsing OBJ file: {:?}", path);

        let bytes = std::fs::read(path)?;
        let source = String::from_utf8(bytes)
            .map_err(|e| ObjError::InvalidFormat(format!("{:?} is not UTF-8 text: {}", path, e)))?;

        let (mesh, report) = Self::parse(&source);
        if !report.is_clean() {
            log::warn!(
                "{:?}: {} malformed lines, {} out-of-bounds face corners",
                path, report.malformed_lines, report.out_of_bounds_corners
            );
        }
        log::info!("Loaded OBJ {:?}: {} vertices, {} indices", path, mesh.vertex_count(), mesh.index_count());
        Ok((mesh, report))
    }

    /// Parse OBJ source text
    ///
    /// The first pass collects positions, texture coordinates and normals
    /// and counts faces; the second pass expands every face into three
    /// fresh vertices.
    pub fn parse(source: &str) -> (Mesh, ObjParseReport) {
        let mut report = ObjParseReport::default();
        let mut scratch = Scratch::new();

        for (line_number, line) in source.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            match keyword {
                "v" => {
                    report.positions += 1;
                    let position = parse_floats::<3>(tokens).unwrap_or_else(|| {
                        log::warn!("Malformed vertex on line {}: {}", line_number + 1, line);
                        report.malformed_lines += 1;
                        [0.0; 3]
                    });
                    push_grow(&mut scratch.positions, position);
                }
                "vt" => {
                    report.tex_coords += 1;
                    let tex_coord = parse_floats::<2>(tokens).unwrap_or_else(|| {
                        log::warn!("Malformed texture coordinate on line {}: {}", line_number + 1, line);
                        report.malformed_lines += 1;
                        [0.0; 2]
                    });
                    push_grow(&mut scratch.tex_coords, tex_coord);
                }
                "vn" => {
                    report.normals += 1;
                    let normal = parse_floats::<3>(tokens).unwrap_or_else(|| {
                        log::warn!("Malformed normal on line {}: {}", line_number + 1, line);
                        report.malformed_lines += 1;
                        [0.0; 3]
                    });
                    push_grow(&mut scratch.normals, normal);
                }
                "f" => report.faces += 1,
                _ => {}
            }
        }

        log::debug!(
            "Parsed {} vertices, {} texture coords, {} normals, {} faces",
            report.positions, report.tex_coords, report.normals, report.faces
        );

        let mut vertices = Vec::with_capacity(report.faces * 3);
        let mut indices = Vec::with_capacity(report.faces * 3);

        for (line_number, line) in source.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            if tokens.next() != Some("f") {
                continue;
            }

            let corners: Option<Vec<[i64; 3]>> = tokens.map(parse_corner).collect();
            let face = match corners {
                Some(corners) if corners.len() == 3 => {
                    let mut face = [Vertex::default(); 3];
                    for (vertex, [v, t, n]) in face.iter_mut().zip(corners) {
                        match (
                            resolve(&scratch.positions, v),
                            resolve(&scratch.tex_coords, t),
                            resolve(&scratch.normals, n),
                        ) {
                            (Some(position), Some(tex_coord), Some(normal)) => {
                                *vertex = Vertex::new(position, normal, tex_coord);
                            }
                            _ => {
                                log::warn!("Face index out of bounds on line {}: {}", line_number + 1, line);
                                report.out_of_bounds_corners += 1;
                            }
                        }
                    }
                    face
                }
                _ => {
                    log::warn!("Malformed face on line {}: {}", line_number + 1, line);
                    report.malformed_lines += 1;
                    [Vertex::default(); 3]
                }
            };

            let base = vertices.len() as u32;
            vertices.extend_from_slice(&face);
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }

        (Mesh::new(vertices, indices), report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# single triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1

f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_parse_triangle() {
        let (mesh, report) = ObjLoader::parse(TRIANGLE);

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [0.0, 1.0]);
        assert_eq!(mesh.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[0].color, [1.0, 1.0, 1.0]);
        assert!(mesh.vertices.iter().all(|v| v.is_3d() && v.texture_layer == 0));

        assert_eq!(report.positions, 3);
        assert_eq!(report.normals, 3);
        assert_eq!(report.faces, 1);
        assert!(report.is_clean());
    }

    #[test]
    fn test_faces_do_not_share_vertices() {
        let source = format!("{}f 1/1/1 2/2/1 3/3/1\n", TRIANGLE);
        let (mesh, _) = ObjLoader::parse(&source);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertices[3], mesh.vertices[0]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_out_of_bounds_corner_is_default() {
        let source = format!("{}f 1/1/1 9/2/1 3/3/0\n", TRIANGLE);
        let (mesh, report) = ObjLoader::parse(&source);

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(report.out_of_bounds_corners, 2);
        assert_eq!(mesh.vertices[3].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[4], Vertex::default());
        assert_eq!(mesh.vertices[5], Vertex::default());
    }

    #[test]
    fn test_malformed_face_keeps_face_count() {
        let source = format!("{}f 1/1/1 2/2/1 3/3/1 1/1/1\nf 1 2 3\n", TRIANGLE);
        let (mesh, report) = ObjLoader::parse(&source);

        assert_eq!(report.faces, 3);
        assert_eq!(report.malformed_lines, 2);
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.index_count(), 9);
        assert!(mesh.vertices[3..].iter().all(|v| *v == Vertex::default()));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_malformed_attribute_keeps_numbering() {
        let source = "v 1 1 1\nv oops\nv 2 2 2\nvt 0 0\nvn 0 1 0\nf 1/1/1 2/1/1 3/1/1\n";
        let (mesh, report) = ObjLoader::parse(source);

        assert_eq!(report.malformed_lines, 1);
        assert_eq!(mesh.vertices[1].position, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].position, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_scratch_grows_past_increment() {
        let mut source = String::new();
        for i in 0..SCRATCH_INCREMENT + 10 {
            source.push_str(&format!("v {} 0 0\n", i));
        }
        source.push_str("vt 0 0\nvn 0 0 1\n");
        source.push_str(&format!("f {0}/1/1 {0}/1/1 {0}/1/1\n", SCRATCH_INCREMENT + 10));

        let (mesh, report) = ObjLoader::parse(&source);
        assert_eq!(report.positions, SCRATCH_INCREMENT + 10);
        assert_eq!(mesh.vertices[0].position[0], (SCRATCH_INCREMENT + 9) as f32);
    }

    #[test]
    fn test_load_obj_from_file() {
        let path = std::env::temp_dir().join(format!("batch_engine_triangle_{}.obj", std::process::id()));
        std::fs::write(&path, TRIANGLE).unwrap();

        let mesh = ObjLoader::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.index_count(), 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ObjLoader::load_obj("does/not/exist.obj");
        assert!(matches!(result, Err(ObjError::Io(_))));
    }
}
