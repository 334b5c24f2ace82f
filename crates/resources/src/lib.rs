//! Resource loading and management.
//!
//! This crate turns mesh files into GPU-resident meshes:
//! - [`MeshBuilder`] parses Wavefront OBJ and deduplicates face corners
//! - [`Mesh`] owns the device-local vertex and optional index buffers
//! - [`Model`] is the drawable that binds and draws a shared mesh
//! - [`MeshRegistry`] caches meshes by id

mod error;

pub mod builder;
pub mod mesh;
pub mod model;
pub mod registry;

pub use builder::{MeshBuilder, MeshData};
pub use error::{ResourceError, ResourceResult};
pub use mesh::{DrawCall, Mesh};
pub use model::Model;
pub use registry::MeshRegistry;
