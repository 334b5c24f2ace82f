//! Drawable models.

use std::sync::Arc;

use kiln_rhi::command::CommandBuffer;

use crate::error::ResourceResult;
use crate::mesh::Mesh;
use crate::registry::MeshRegistry;

/// A drawable that shares a [`Mesh`].
///
/// Several models may reference the same mesh; the mesh is released when
/// the last reference goes away.
#[derive(Debug, Clone)]
pub struct Model {
    mesh: Arc<Mesh>,
}

impl Model {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh }
    }

    /// Looks up `mesh_id` in the registry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ResourceError::UnknownMesh`] if the id is not registered.
    pub fn from_registry(registry: &MeshRegistry, mesh_id: &str) -> ResourceResult<Self> {
        Ok(Self::new(registry.get_mesh(mesh_id)?))
    }

    #[inline]
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn bind(&self, cmd: &CommandBuffer) {
        self.mesh.bind(cmd);
    }

    pub fn draw(&self, cmd: &CommandBuffer) {
        self.mesh.draw(cmd);
    }
}
