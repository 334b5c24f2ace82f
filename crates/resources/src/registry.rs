//! String-keyed mesh cache.
//!
//! The renderer only ever looks meshes up; loading happens at startup or
//! from tooling. Relative paths are resolved against the configured asset
//! root.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use kiln_core::RendererConfig;
use kiln_rhi::device::Device;
use kiln_rhi::upload::Uploader;

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::Mesh;

/// Meshes by id.
#[derive(Debug)]
pub struct MeshRegistry {
    config: RendererConfig,
    meshes: HashMap<String, Arc<Mesh>>,
}

impl MeshRegistry {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            config: config.clone(),
            meshes: HashMap::new(),
        }
    }

    /// Registers `mesh` under `id`, returning the mesh it replaced.
    pub fn insert(&mut self, id: impl Into<String>, mesh: Arc<Mesh>) -> Option<Arc<Mesh>> {
        let id = id.into();
        debug!("Registered mesh '{}'", id);
        self.meshes.insert(id, mesh)
    }

    /// Loads an OBJ file and registers it under `id`.
    ///
    /// # Errors
    ///
    /// Propagates load and upload errors; the registry is unchanged on error.
    pub fn load(
        &mut self,
        uploader: &Uploader,
        id: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> ResourceResult<Arc<Mesh>> {
        let path = self.config.resolve_asset(path.into());
        let mesh = Arc::new(Mesh::from_file(uploader, &path)?);
        self.insert(id, Arc::clone(&mesh));
        Ok(mesh)
    }

    /// Looks up a mesh.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnknownMesh`] if nothing is registered as `id`.
    pub fn get_mesh(&self, id: &str) -> ResourceResult<Arc<Mesh>> {
        self.meshes
            .get(id)
            .cloned()
            .ok_or_else(|| ResourceError::UnknownMesh(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.meshes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Drops every registered mesh once the device is idle.
    ///
    /// Meshes still referenced elsewhere stay alive until those references go.
    pub fn clear(&mut self, device: &Device) -> ResourceResult<()> {
        device.wait_idle()?;
        let count = self.meshes.len();
        self.meshes.clear();
        info!("Mesh registry cleared ({} mesh(es))", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_miss_is_unknown_mesh() {
        let registry = MeshRegistry::new(&RendererConfig::default());
        assert!(registry.is_empty());
        assert!(!registry.contains("cube"));

        match registry.get_mesh("cube") {
            Err(ResourceError::UnknownMesh(id)) => assert_eq!(id, "cube"),
            other => panic!("expected UnknownMesh, got {:?}", other),
        }
    }
}
