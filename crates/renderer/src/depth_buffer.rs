//! Depth target for the frame's render pass.
//!
//! The depth image is size-dependent: the Vulkan backend drops and recreates
//! it on every surface rebuild.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use kiln_rhi::device::{AllocationTicket, Device};
use kiln_rhi::{RhiError, RhiResult};

pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Device-local depth image and view, counted in the device's live
/// allocations like any buffer.
pub struct DepthBuffer {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    memory: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
    _ticket: AllocationTicket,
}

impl DepthBuffer {
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] for a zero dimension, or the
    /// failing Vulkan/allocator call. Nothing is leaked on failure.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidAllocation(format!(
                "depth buffer of {width}x{height} has a zero dimension"
            )));
        }

        let (image, memory) = allocate_image(&device, width, height, format)?;

        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::DEPTH)
            .level_count(1)
            .layer_count(1);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(range);

        let view = match unsafe { device.handle().create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                release(&device, image, memory);
                return Err(e.into());
            }
        };

        debug!(width, height, ?format, "Created depth buffer");

        Ok(Self {
            _ticket: device.live_allocations().track(),
            device,
            image,
            view,
            memory: Some(memory),
            format,
            extent: vk::Extent2D { width, height },
        })
    }

    /// Creates a depth buffer in [`DEFAULT_DEPTH_FORMAT`].
    ///
    /// # Errors
    ///
    /// See [`DepthBuffer::new`].
    pub fn with_default_format(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        Self::new(device, width, height, DEFAULT_DEPTH_FORMAT)
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_image_view(self.view, None) };
        if let Some(memory) = self.memory.take() {
            release(&self.device, self.image, memory);
        }
        debug!(
            width = self.extent.width,
            height = self.extent.height,
            "Destroyed depth buffer"
        );
    }
}

/// Creates an optimal-tiling depth image and binds fresh GPU-only memory to it.
fn allocate_image(
    device: &Device,
    width: u32,
    height: u32,
    format: vk::Format,
) -> RhiResult<(vk::Image, Allocation)> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    let image = unsafe { device.handle().create_image(&image_info, None)? };
    let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

    let allocated = device
        .allocator()
        .lock()
        .unwrap()
        .allocate(&AllocationCreateDesc {
            name: "depth",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
    let memory = match allocated {
        Ok(memory) => memory,
        Err(e) => {
            unsafe { device.handle().destroy_image(image, None) };
            return Err(e.into());
        }
    };

    let bound = unsafe {
        device
            .handle()
            .bind_image_memory(image, memory.memory(), memory.offset())
    };
    match bound {
        Ok(()) => Ok((image, memory)),
        Err(e) => {
            release(device, image, memory);
            Err(e.into())
        }
    }
}

fn release(device: &Device, image: vk::Image, memory: Allocation) {
    unsafe { device.handle().destroy_image(image, None) };
    if let Err(e) = device.allocator().lock().unwrap().free(memory) {
        error!("Failed to free depth image memory: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_format_is_d32() {
        assert_eq!(DEFAULT_DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_depth_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DepthBuffer>();
    }
}
