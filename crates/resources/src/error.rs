//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

use kiln_rhi::RhiError;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The OBJ parser rejected the file.
    #[error("Failed to load OBJ file '{path}': {source}")]
    ObjLoad {
        /// Path (or label) of the source that failed to load.
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    /// A face corner references an attribute element that does not exist.
    #[error("'{path}': face corner {corner} references {attribute} {index}, but only {available} exist")]
    FaceOutOfBounds {
        path: PathBuf,
        corner: usize,
        attribute: &'static str,
        index: u32,
        available: usize,
    },

    /// Some, but not all, face corners carry an attribute index.
    #[error("'{path}': {attribute} indices cover {found} of {expected} face corners")]
    MissingAttribute {
        path: PathBuf,
        attribute: &'static str,
        found: usize,
        expected: usize,
    },

    /// The face lines and the parsed meshes disagree on the corner count.
    #[error("'{path}': face lines describe {scanned} corners, but {parsed} were parsed")]
    CornerMismatch {
        path: PathBuf,
        scanned: usize,
        parsed: usize,
    },

    /// The source contains no faces, or a mesh was created without vertices.
    #[error("Mesh '{0}' has no vertices")]
    EmptyMesh(PathBuf),

    /// No mesh is registered under the requested id.
    #[error("No mesh registered as '{0}'")]
    UnknownMesh(String),

    /// IO error while opening a source file.
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Uploading mesh data to the GPU failed.
    #[error("Upload failed: {0}")]
    Upload(#[from] RhiError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
