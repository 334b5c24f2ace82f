//! Semaphores, fences and the per-frame pair the renderer waits on.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// GPU-to-GPU ordering between queue operations.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_semaphore(self.semaphore, None) };
    }
}

/// Host-side wait on GPU work.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled so the first wait returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let fence = unsafe {
            device
                .handle()
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails, including `vk::Result::TIMEOUT`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    /// Like [`Fence::wait`], but an expired timeout is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than a timeout.
    pub fn wait_timeout(&self, timeout: u64) -> RhiResult<bool> {
        match self.wait(timeout) {
            Ok(()) => Ok(true),
            Err(RhiError::VulkanError(vk::Result::TIMEOUT)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Unsignals the fence. It must not be pending on any queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }

    pub fn is_signaled(&self) -> bool {
        matches!(
            unsafe { self.device.handle().get_fence_status(self.fence) },
            Ok(true)
        )
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_fence(self.fence, None) };
    }
}

/// Synchronization for one in-flight frame slot.
///
/// The fence starts signaled so the slot's first wait does not block.
/// Render-finished semaphores are per swapchain image and live with the
/// presentation backend instead.
pub struct FrameSync {
    image_available_semaphore: Semaphore,
    in_flight_fence: Fence,
}

impl FrameSync {
    /// # Errors
    ///
    /// Returns an error if the semaphore or fence cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            image_available_semaphore: Semaphore::new(device.clone())?,
            in_flight_fence: Fence::new(device, true)?,
        })
    }

    /// Signaled when the acquired image is ready to be rendered to.
    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available_semaphore
    }

    /// Signaled when the slot's last submission has completed.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }
}
