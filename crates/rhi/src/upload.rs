//! Staged uploads into device-local memory.
//!
//! Device-only memory cannot be written by the host. [`Uploader`] fills a
//! host-visible staging buffer, records a single buffer copy into the
//! device-only destination, submits it on the graphics queue and waits for
//! the copy to finish before returning. The staging buffer is dropped on
//! every path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_rhi::buffer::BufferUsage;
//! use kiln_rhi::device::Device;
//! use kiln_rhi::upload::Uploader;
//!
//! # fn example(device: Arc<Device>) -> Result<(), kiln_rhi::RhiError> {
//! let uploader = Uploader::new(device)?;
//! let indices: [u32; 3] = [0, 1, 2];
//! let index_buffer = uploader.upload_slice(BufferUsage::Index, &indices)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use tracing::debug;

use crate::buffer::{Buffer, BufferDesc, BufferLayout, BufferUsage, MappedRange, MemoryClass};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::Fence;

/// Copies host data into device-only buffers.
///
/// Owns a transient command pool and a fence on the graphics queue family.
/// Uploads are serialized: each call blocks until its copy has completed.
pub struct Uploader {
    device: Arc<Device>,
    command_pool: CommandPool,
    fence: Fence,
}

impl Uploader {
    /// Creates an uploader on the device's graphics queue family.
    ///
    /// # Errors
    ///
    /// Returns an error if the command pool or fence cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let command_pool =
            CommandPool::new_transient(device.clone(), device.queue_families().graphics)?;
        let fence = Fence::new(device.clone(), false)?;

        Ok(Self {
            device,
            command_pool,
            fence,
        })
    }

    /// Uploads `count` elements of `stride` bytes into a new device-only buffer.
    ///
    /// # Arguments
    ///
    /// * `usage` - Functional usage of the destination (vertex, index, ...)
    /// * `stride` - Size of one element in bytes
    /// * `data` - Packed element data; its length must be a multiple of `stride`
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] for empty or misaligned input,
    /// and any allocation, submission or wait failure.
    pub fn upload(&self, usage: BufferUsage, stride: vk::DeviceSize, data: &[u8]) -> RhiResult<Buffer> {
        if data.is_empty() || stride == 0 {
            return Err(RhiError::InvalidAllocation(format!(
                "nothing to upload into {} buffer",
                usage.name()
            )));
        }
        let len = data.len() as vk::DeviceSize;
        if len % stride != 0 {
            return Err(RhiError::InvalidAllocation(format!(
                "{} bytes is not a whole number of {}-byte elements",
                len, stride
            )));
        }
        let count = u32::try_from(len / stride).map_err(|_| {
            RhiError::InvalidAllocation(format!("{} elements exceed u32", len / stride))
        })?;

        let layout = BufferLayout::new(stride, count, 1)?;

        let mut staging = Buffer::new(
            self.device.clone(),
            BufferDesc {
                layout,
                usage: BufferUsage::Staging,
                memory: MemoryClass::HostUpload,
                name: format!("{} staging", usage.name()),
            },
        )?;
        staging.map()?;
        staging.write_all(data)?;
        staging.flush(MappedRange::Whole)?;
        staging.unmap();

        let destination = Buffer::new(
            self.device.clone(),
            BufferDesc {
                layout,
                usage,
                memory: MemoryClass::DeviceOnly,
                name: usage.name().to_string(),
            },
        )?;

        self.copy(&staging, &destination, layout.size())?;

        debug!(
            "Uploaded {} bytes into {} buffer ({} element(s))",
            len,
            usage.name(),
            count
        );

        Ok(destination)
    }

    /// Typed convenience over [`Uploader::upload`].
    pub fn upload_slice<T: Pod>(&self, usage: BufferUsage, items: &[T]) -> RhiResult<Buffer> {
        self.upload(
            usage,
            std::mem::size_of::<T>() as vk::DeviceSize,
            bytemuck::cast_slice(items),
        )
    }

    /// Records, submits and waits for a full-range copy.
    fn copy(&self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> RhiResult<()> {
        let cmd = CommandBuffer::new(self.device.clone(), &self.command_pool)?;
        let result = self.submit_copy(&cmd, src, dst, size);
        self.command_pool
            .free_command_buffers(std::slice::from_ref(&cmd));
        result
    }

    fn submit_copy(
        &self,
        cmd: &CommandBuffer,
        src: &Buffer,
        dst: &Buffer,
        size: vk::DeviceSize,
    ) -> RhiResult<()> {
        cmd.begin()?;
        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(0)
            .size(size);
        cmd.copy_buffer(src.handle(), dst.handle(), &[region]);
        cmd.end()?;

        let command_buffers = [cmd.handle()];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        self.fence.reset()?;
        unsafe {
            self.device
                .submit_graphics(&[submit_info], self.fence.handle())?;
        }
        self.fence.wait(u64::MAX)
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}
