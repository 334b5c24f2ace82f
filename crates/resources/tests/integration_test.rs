//! Integration tests for OBJ ingestion.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use kiln_resources::{MeshBuilder, ResourceError};

/// Writes `contents` to a per-test directory under the system temp dir.
fn write_asset(test: &str, name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kiln_resources_{}_{}", test, std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write asset");
    path
}

const CUBE: &str = "\
o cube
v -1 -1  1
v  1 -1  1
v  1  1  1
v -1  1  1
v -1 -1 -1
v  1 -1 -1
v  1  1 -1
v -1  1 -1
f 1 2 3 4
f 6 5 8 7
f 5 1 4 8
f 2 6 7 3
f 4 3 7 8
f 5 6 2 1
";

#[test]
fn test_load_cube_from_file() {
    let path = write_asset("cube", "cube.obj", CUBE);

    let data = MeshBuilder::load(&path).expect("Failed to load cube");

    // Six quads, two triangles each
    assert_eq!(data.triangle_count(), 12);
    assert_eq!(data.index_count(), 36);
    // Positions only, so corners collapse to the eight cube vertices
    assert_eq!(data.vertex_count(), 8);

    for &index in &data.indices {
        assert!(
            (index as usize) < data.vertex_count(),
            "Index {} out of range",
            index
        );
    }

    let (min, max) = data.bounds().expect("Cube should have bounds");
    assert_eq!(min.to_array(), [-1.0, -1.0, -1.0]);
    assert_eq!(max.to_array(), [1.0, 1.0, 1.0]);
}

#[test]
fn test_multiple_objects_share_one_vertex_list() {
    let source = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 5 0 0
v 6 0 0
v 5 1 0
f 4 5 6
";
    let path = write_asset("multi", "two.obj", source);

    let data = MeshBuilder::load(&path).expect("Failed to load");

    assert_eq!(data.vertex_count(), 6);
    assert_eq!(data.indices, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_vertices_are_unique() {
    let path = write_asset("unique", "cube.obj", CUBE);
    let data = MeshBuilder::load(&path).expect("Failed to load cube");

    let keys: HashSet<_> = data.vertices.iter().map(|v| v.key()).collect();
    assert_eq!(keys.len(), data.vertices.len());
}

#[test]
fn test_missing_file_is_io_error() {
    let path = std::env::temp_dir().join("kiln_resources_definitely_missing.obj");

    match MeshBuilder::load(&path) {
        Err(ResourceError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Io error, got {:?}", other.map(|d| d.vertex_count())),
    }
}

#[test]
fn test_missing_material_library_is_a_warning() {
    let source = "\
mtllib missing.mtl
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";
    let path = write_asset("mtl", "tri.obj", source);

    let data = MeshBuilder::load(&path).expect("Geometry should still load");

    assert_eq!(data.vertex_count(), 3);
    assert!(!data.warnings.is_empty());
}
