//! GPU-resident meshes.
//!
//! A [`Mesh`] owns a device-local vertex buffer and, when it was built with
//! indices, a device-local `u32` index buffer. Both are filled through a
//! staged upload and never change afterwards.
//!
//! # Example
//!
//! ```no_run
//! use kiln_resources::Mesh;
//! use kiln_rhi::command::CommandBuffer;
//! use kiln_rhi::upload::Uploader;
//!
//! # fn example(uploader: &Uploader, cmd: &CommandBuffer) -> kiln_resources::ResourceResult<()> {
//! let mesh = Mesh::from_file(uploader, "assets/models/cube.obj")?;
//! mesh.bind(cmd);
//! mesh.draw(cmd);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use ash::vk;
use tracing::debug;

use kiln_rhi::buffer::{Buffer, BufferUsage};
use kiln_rhi::command::CommandBuffer;
use kiln_rhi::upload::Uploader;
use kiln_rhi::vertex::Vertex;

use crate::builder::{MeshBuilder, MeshData};
use crate::error::{ResourceError, ResourceResult};

/// The draw command a mesh issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Indexed draw over `index_count` indices.
    Indexed { index_count: u32 },
    /// Non-indexed draw over `vertex_count` vertices.
    Vertices { vertex_count: u32 },
}

impl DrawCall {
    /// Indexed when there are indices, otherwise a plain vertex draw.
    pub fn for_counts(vertex_count: u32, index_count: u32) -> Self {
        if index_count > 0 {
            DrawCall::Indexed { index_count }
        } else {
            DrawCall::Vertices { vertex_count }
        }
    }

    /// Records this draw, one instance.
    pub fn record(self, cmd: &CommandBuffer) {
        match self {
            DrawCall::Indexed { index_count } => cmd.draw_indexed(index_count, 1, 0, 0, 0),
            DrawCall::Vertices { vertex_count } => cmd.draw(vertex_count, 1, 0, 0),
        }
    }
}

/// Immutable GPU mesh.
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Uploads `vertices` and, if non-empty, `indices` into device-local buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::EmptyMesh`] if `vertices` is empty, and
    /// [`ResourceError::Upload`] if an allocation or the copy fails.
    pub fn new(uploader: &Uploader, vertices: &[Vertex], indices: &[u32]) -> ResourceResult<Self> {
        if vertices.is_empty() {
            return Err(ResourceError::EmptyMesh(PathBuf::from("<memory>")));
        }

        let vertex_count = u32::try_from(vertices.len()).map_err(|_| {
            kiln_rhi::RhiError::InvalidAllocation(format!("{} vertices exceed u32", vertices.len()))
        })?;
        let index_count = u32::try_from(indices.len()).map_err(|_| {
            kiln_rhi::RhiError::InvalidAllocation(format!("{} indices exceed u32", indices.len()))
        })?;

        let vertex_buffer = uploader.upload_slice(BufferUsage::Vertex, vertices)?;
        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(uploader.upload_slice(BufferUsage::Index, indices)?)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count,
            index_count,
        })
    }

    /// Uploads the output of a [`MeshBuilder`].
    pub fn from_data(uploader: &Uploader, data: &MeshData) -> ResourceResult<Self> {
        Self::new(uploader, &data.vertices, &data.indices)
    }

    /// Loads an OBJ file and uploads it.
    pub fn from_file(uploader: &Uploader, path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        let data = MeshBuilder::load(path)?;

        debug!(
            "Loaded mesh: {} -- Vertex count: {}",
            path.display(),
            data.vertex_count()
        );

        Self::from_data(uploader, &data)
    }

    /// Binds the vertex buffer at binding 0 and the index buffer, if any.
    pub fn bind(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        if let Some(index_buffer) = &self.index_buffer {
            cmd.bind_index_buffer(index_buffer.handle(), 0, vk::IndexType::UINT32);
        }
    }

    /// Issues the draw. [`Mesh::bind`] must have been recorded first.
    pub fn draw(&self, cmd: &CommandBuffer) {
        self.draw_call().record(cmd);
    }

    #[inline]
    pub fn draw_call(&self) -> DrawCall {
        DrawCall::for_counts(self.vertex_count, self.index_count)
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    #[inline]
    pub fn has_index_buffer(&self) -> bool {
        self.index_count > 0
    }

    #[inline]
    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> Option<&Buffer> {
        self.index_buffer.as_ref()
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertex_count", &self.vertex_count)
            .field("index_count", &self.index_count)
            .finish()
    }
}
