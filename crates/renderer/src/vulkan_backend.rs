//! Vulkan presentation backend.
//!
//! Per in-flight frame: a command buffer, an image-available semaphore and an
//! in-flight fence. Per swapchain image: a render-finished semaphore, since
//! presentation may still be waiting on it when the frame slot comes around.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. Wait on the slot's in_flight_fence (host stays at most N frames ahead)
//! 2. Acquire an image (signals image_available_semaphore)
//! 3. Record into the slot's command buffer
//! 4. Reset in_flight_fence, then submit: wait image_available,
//!    signal render_finished[image] and the fence
//! 5. Present (waits on render_finished[image])
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use kiln_core::RendererConfig;
use kiln_rhi::RhiResult;
use kiln_rhi::command::{CommandBuffer, CommandPool};
use kiln_rhi::device::Device;
use kiln_rhi::swapchain::{Recreate, Swapchain};
use kiln_rhi::sync::{FrameSync, Semaphore};

use crate::backend::{AcquireOutcome, PresentBackend, PresentOutcome};
use crate::depth_buffer::DepthBuffer;

/// [`PresentBackend`] over a Vulkan swapchain with dynamic rendering.
///
/// The surface passed to [`VulkanBackend::new`] must outlive the backend.
pub struct VulkanBackend {
    device: Arc<Device>,
    swapchain: Swapchain,
    depth_buffer: DepthBuffer,
    command_pool: CommandPool,
    command_buffers: Vec<CommandBuffer>,
    frame_sync: Vec<FrameSync>,
    render_finished: Vec<Semaphore>,
    clear_color: [f32; 4],
    acquire_timeout: u64,
}

impl VulkanBackend {
    /// Creates the swapchain and all per-frame and per-image objects.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object or allocation cannot be created.
    pub fn new(
        device: Arc<Device>,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        config: &RendererConfig,
        extent: (u32, u32),
    ) -> RhiResult<Self> {
        let frames_in_flight = config.frames_in_flight();

        let swapchain = Swapchain::new(device.clone(), surface_loader, surface, extent.0, extent.1)?;
        let depth_buffer = Self::create_depth_buffer(&device, &swapchain)?;

        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;

        let frame_sync = (0..frames_in_flight)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        let render_finished = Self::create_render_finished(&device, swapchain.image_count())?;

        info!(
            images = swapchain.image_count(),
            frames_in_flight, "Vulkan backend ready"
        );

        Ok(Self {
            device,
            swapchain,
            depth_buffer,
            command_pool,
            command_buffers,
            frame_sync,
            render_finished,
            clear_color: config.clear_color,
            acquire_timeout: config.acquire_timeout_ns(),
        })
    }

    fn create_depth_buffer(device: &Arc<Device>, swapchain: &Swapchain) -> RhiResult<DepthBuffer> {
        let extent = swapchain.extent();
        DepthBuffer::with_default_format(device.clone(), extent.width, extent.height)
    }

    fn create_render_finished(device: &Arc<Device>, count: u32) -> RhiResult<Vec<Semaphore>> {
        (0..count)
            .map(|_| Semaphore::new(device.clone()))
            .collect()
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    #[inline]
    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth_buffer
    }
}

/// Layout changes recorded around a frame's render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    ColorAttachment,
    DepthAttachment,
    Present,
}

impl Transition {
    fn layouts(self) -> (vk::ImageLayout, vk::ImageLayout) {
        match self {
            Self::ColorAttachment => (
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ),
            Self::DepthAttachment => (
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            ),
            Self::Present => (
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            ),
        }
    }

    /// `(src_stage, src_access, dst_stage, dst_access)`
    fn scopes(
        self,
    ) -> (
        vk::PipelineStageFlags,
        vk::AccessFlags,
        vk::PipelineStageFlags,
        vk::AccessFlags,
    ) {
        let color = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let depth = vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        match self {
            Self::ColorAttachment => (
                color,
                vk::AccessFlags::empty(),
                color,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            // The previous frame's depth writes must land before this clear.
            Self::DepthAttachment => (
                depth,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                depth,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            Self::Present => (
                color,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::AccessFlags::empty(),
            ),
        }
    }

    fn aspect(self) -> vk::ImageAspectFlags {
        match self {
            Self::DepthAttachment => vk::ImageAspectFlags::DEPTH,
            Self::ColorAttachment | Self::Present => vk::ImageAspectFlags::COLOR,
        }
    }

    fn record(self, cmd: &CommandBuffer, image: vk::Image) {
        let (old_layout, new_layout) = self.layouts();
        let (src_stage, src_access, dst_stage, dst_access) = self.scopes();
        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(self.aspect())
            .level_count(1)
            .layer_count(1);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(range);

        cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]);
    }
}

impl PresentBackend for VulkanBackend {
    type Target = CommandBuffer;

    fn acquire(&mut self, frame_index: usize) -> RhiResult<AcquireOutcome> {
        let sync = &self.frame_sync[frame_index];

        // Wait for this slot's previous submission
        sync.in_flight_fence().wait(u64::MAX)?;

        let acquired = self
            .swapchain
            .acquire_next_image(sync.image_available_semaphore().handle(), self.acquire_timeout);

        match acquired {
            Ok((image_index, suboptimal)) => {
                // The fence stays signaled until submit_and_present resets it.
                Ok(AcquireOutcome::Ready {
                    image_index,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireOutcome::Timeout),
            Err(e) => Err(e.into()),
        }
    }

    fn begin_recording(&mut self, frame_index: usize) -> RhiResult<CommandBuffer> {
        let cmd = &self.command_buffers[frame_index];
        cmd.reset()?;
        cmd.begin()?;
        Ok(cmd.clone())
    }

    fn begin_render_pass(&mut self, cmd: &CommandBuffer, image_index: u32) {
        let image_index = image_index as usize;
        let extent = self.swapchain.extent();

        Transition::ColorAttachment.record(cmd, self.swapchain.image(image_index));
        Transition::DepthAttachment.record(cmd, self.depth_buffer.image());

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.swapchain.image_view(image_index))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.depth_buffer.image_view())
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        let rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment))
            .depth_attachment(&depth_attachment);

        cmd.begin_rendering(&rendering_info);

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&render_area);
    }

    fn end_render_pass(&mut self, cmd: &CommandBuffer, image_index: u32) {
        cmd.end_rendering();

        Transition::Present.record(cmd, self.swapchain.image(image_index as usize));
    }

    fn submit_and_present(
        &mut self,
        frame_index: usize,
        image_index: u32,
    ) -> RhiResult<PresentOutcome> {
        let cmd = &self.command_buffers[frame_index];
        let sync = &self.frame_sync[frame_index];
        let render_finished = self.render_finished[image_index as usize].handle();

        cmd.end()?;

        let wait_semaphores = [sync.image_available_semaphore().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [cmd.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let fence = sync.in_flight_fence();
        fence.reset()?;
        if let Err(e) = unsafe { self.device.submit_graphics(&[submit_info], fence.handle()) } {
            // An empty submit signals the fence again, so the slot's next
            // acquire does not wait forever.
            if let Err(signal) = unsafe { self.device.submit_graphics(&[], fence.handle()) } {
                error!("Failed to re-signal in-flight fence: {signal}");
            }
            return Err(e);
        }

        match self
            .swapchain
            .present(self.device.present_queue(), image_index, render_finished)
        {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Present returned suboptimal");
                Ok(PresentOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Present returned ERROR_OUT_OF_DATE_KHR");
                Ok(PresentOutcome::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn rebuild(&mut self, extent: (u32, u32)) -> RhiResult<bool> {
        // Waits for device idle before touching the old images
        if self.swapchain.recreate(extent.0, extent.1)? == Recreate::SurfaceDegenerate {
            return Ok(false);
        }

        self.depth_buffer = Self::create_depth_buffer(&self.device, &self.swapchain)?;
        self.render_finished =
            Self::create_render_finished(&self.device, self.swapchain.image_count())?;

        debug!(
            "Recreated depth buffer and {} render-finished semaphores",
            self.render_finished.len()
        );

        Ok(true)
    }

    fn extent(&self) -> (u32, u32) {
        let extent = self.swapchain.extent();
        (extent.width, extent.height)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Device did not go idle before backend teardown: {e}");
        }

        self.command_pool.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();

        info!("Vulkan backend torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_end_in_attachment_or_present_layouts() {
        assert_eq!(
            Transition::ColorAttachment.layouts().1,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(
            Transition::DepthAttachment.layouts().1,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
        );
        assert_eq!(Transition::Present.layouts().0, Transition::ColorAttachment.layouts().1);
        assert_eq!(Transition::Present.layouts().1, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_depth_transition_uses_depth_aspect() {
        assert_eq!(Transition::DepthAttachment.aspect(), vk::ImageAspectFlags::DEPTH);
        assert_eq!(Transition::Present.aspect(), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_vulkan_backend_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<VulkanBackend>();
    }
}
