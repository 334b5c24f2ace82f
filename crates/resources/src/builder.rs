//! Wavefront OBJ ingestion with vertex deduplication.
//!
//! Every face corner of the source becomes one index. Corners that resolve
//! to a bitwise identical [`Vertex`] share a single entry in the vertex
//! array, which keeps first-seen order across all objects in the file.
//!
//! Missing attributes resolve to fixed defaults:
//! - color: the file's per-vertex color when present, else white
//! - normal: zero
//! - uv: zero

use std::collections::HashMap;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use tracing::{debug, warn};

use kiln_rhi::vertex::{Vertex, VertexKey};

use crate::error::{ResourceError, ResourceResult};

/// Color used when the source has no per-vertex colors.
pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;

/// CPU-side mesh produced by [`MeshBuilder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Unique vertices in first-seen order.
    pub vertices: Vec<Vertex>,
    /// One index per face corner; every value is `< vertices.len()`.
    pub indices: Vec<u32>,
    /// Non-fatal parser diagnostics.
    pub warnings: Vec<String>,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds of all vertex positions, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.min(v.position), max.max(v.position))
        }))
    }
}

/// Accumulates face corners into deduplicated vertex and index arrays.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    unique: HashMap<VertexKey, u32>,
    warnings: Vec<String>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and deduplicates an OBJ file.
    ///
    /// Material libraries are resolved next to the file; failing to load one
    /// is reported in [`MeshData::warnings`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Io`] if the file cannot be opened, and the
    /// other [`ResourceError`] load variants for malformed or empty content.
    pub fn load(path: impl AsRef<Path>) -> ResourceResult<MeshData> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(path, &source, |mtl| tobj::load_mtl(base.join(mtl)))
    }

    /// Parses OBJ text from any buffered reader.
    ///
    /// `label` names the source in errors and logs. Material libraries cannot
    /// be resolved from a reader, so any `mtllib` line produces a warning.
    ///
    /// # Errors
    ///
    /// Same as [`MeshBuilder::load`], with `label` as the path.
    pub fn from_reader<R: BufRead>(mut reader: R, label: &str) -> ResourceResult<MeshData> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| ResourceError::Io {
                path: PathBuf::from(label),
                source: e,
            })?;

        Self::parse(Path::new(label), &source, |_| {
            Err(tobj::LoadError::OpenFileFailed)
        })
    }

    fn parse<ML>(path: &Path, source: &str, material_loader: ML) -> ResourceResult<MeshData>
    where
        ML: Fn(&Path) -> tobj::MTLLoadResult,
    {
        let mut bytes = source.as_bytes();
        let (models, materials) = tobj::load_obj_buf(&mut bytes, &load_options(), material_loader)
            .map_err(|source| ResourceError::ObjLoad {
                path: path.to_path_buf(),
                source,
            })?;

        // tobj fills normal and texcoord indices for corners that name none,
        // so absence is taken from the face lines themselves.
        let corners = scan_face_corners(source);
        let parsed: usize = models.iter().map(|m| m.mesh.indices.len()).sum();
        if corners.len() != parsed {
            return Err(ResourceError::CornerMismatch {
                path: path.to_path_buf(),
                scanned: corners.len(),
                parsed,
            });
        }

        let mut builder = Self::new();

        if let Err(e) = materials {
            builder.warn(format!(
                "'{}': material library not loaded: {}",
                path.display(),
                e
            ));
        }

        for model in &models {
            builder.add_obj_mesh(path, &model.mesh, &corners)?;
        }

        if builder.indices.is_empty() {
            return Err(ResourceError::EmptyMesh(path.to_path_buf()));
        }

        debug!(
            "Parsed '{}': {} object(s), {} corners, {} unique vertices",
            path.display(),
            models.len(),
            builder.indices.len(),
            builder.vertices.len()
        );

        Ok(builder.finish())
    }

    /// Appends one face corner and returns the index it resolved to.
    pub fn push_corner(&mut self, vertex: Vertex) -> u32 {
        let next = self.vertices.len() as u32;
        let index = *self.unique.entry(vertex.key()).or_insert_with(|| {
            self.vertices.push(vertex);
            next
        });
        self.indices.push(index);
        index
    }

    /// Records a non-fatal diagnostic.
    pub fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn finish(self) -> MeshData {
        MeshData {
            vertices: self.vertices,
            indices: self.indices,
            warnings: self.warnings,
        }
    }

    /// `corners` covers the whole file; this mesh's corners start at the
    /// number of indices pushed so far.
    fn add_obj_mesh(
        &mut self,
        path: &Path,
        mesh: &tobj::Mesh,
        corners: &[CornerAttributes],
    ) -> ResourceResult<()> {
        let count = mesh.indices.len();
        check_coverage(path, "normal", mesh.normal_indices.len(), count)?;
        check_coverage(path, "texcoord", mesh.texcoord_indices.len(), count)?;

        let has_colors = !mesh.vertex_color.is_empty();

        for (local, &position_index) in mesh.indices.iter().enumerate() {
            let corner = self.indices.len();
            let named = corners[corner];
            let out_of_bounds = |attribute, index, available| ResourceError::FaceOutOfBounds {
                path: path.to_path_buf(),
                corner,
                attribute,
                index,
                available,
            };
            let missing = |attribute| ResourceError::MissingAttribute {
                path: path.to_path_buf(),
                attribute,
                found: 0,
                expected: count,
            };

            let position = fetch_vec3(&mesh.positions, position_index).ok_or_else(|| {
                out_of_bounds("position", position_index, mesh.positions.len() / 3)
            })?;

            let color = if has_colors {
                fetch_vec3(&mesh.vertex_color, position_index).unwrap_or(DEFAULT_COLOR)
            } else {
                DEFAULT_COLOR
            };

            let normal = if named.normal {
                let n = *mesh
                    .normal_indices
                    .get(local)
                    .ok_or_else(|| missing("normal"))?;
                fetch_vec3(&mesh.normals, n)
                    .ok_or_else(|| out_of_bounds("normal", n, mesh.normals.len() / 3))?
            } else {
                Vec3::ZERO
            };

            let uv = if named.texcoord {
                let t = *mesh
                    .texcoord_indices
                    .get(local)
                    .ok_or_else(|| missing("texcoord"))?;
                fetch_vec2(&mesh.texcoords, t)
                    .ok_or_else(|| out_of_bounds("texcoord", t, mesh.texcoords.len() / 2))?
            } else {
                Vec2::ZERO
            };

            self.push_corner(Vertex::new(position, color, normal, uv));
        }

        Ok(())
    }
}

/// Optional attributes a face corner names in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CornerAttributes {
    texcoord: bool,
    normal: bool,
}

impl CornerAttributes {
    /// Reads a `v`, `v/t`, `v//n` or `v/t/n` corner token.
    fn from_token(token: &str) -> Self {
        let mut parts = token.split('/').skip(1);
        let texcoord = parts.next().is_some_and(|t| !t.is_empty());
        let normal = parts.next().is_some_and(|n| !n.is_empty());
        Self { texcoord, normal }
    }
}

/// Lists every face corner in the order tobj emits them: faces in file
/// order, polygons fanned around their first corner.
fn scan_face_corners(source: &str) -> Vec<CornerAttributes> {
    let mut corners = Vec::new();
    let mut line = String::new();

    for raw in source.lines() {
        if let Some(continued) = raw.strip_suffix('\\') {
            line.push_str(continued);
            line.push(' ');
            continue;
        }
        line.push_str(raw);

        let mut tokens = line.split_whitespace();
        if tokens.next() == Some("f") {
            let face: Vec<_> = tokens.map(CornerAttributes::from_token).collect();
            for i in 1..face.len().saturating_sub(1) {
                corners.extend([face[0], face[i], face[i + 1]]);
            }
        }
        line.clear();
    }

    corners
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// An attribute index array must be absent or cover every corner.
fn check_coverage(
    path: &Path,
    attribute: &'static str,
    found: usize,
    expected: usize,
) -> ResourceResult<()> {
    if found == 0 || found == expected {
        Ok(())
    } else {
        Err(ResourceError::MissingAttribute {
            path: PathBuf::from(path),
            attribute,
            found,
            expected,
        })
    }
}

fn fetch_vec3(data: &[f32], index: u32) -> Option<Vec3> {
    let start = index as usize * 3;
    data.get(start..start + 3).map(Vec3::from_slice)
}

fn fetch_vec2(data: &[f32], index: u32) -> Option<Vec2> {
    let start = index as usize * 2;
    data.get(start..start + 2).map(Vec2::from_slice)
}
