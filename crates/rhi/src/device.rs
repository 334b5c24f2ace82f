//! Vulkan logical device, queue and memory allocator context.
//!
//! # Overview
//!
//! The [`Device`] wraps a logical device created by the application together
//! with the process-wide gpu-allocator [`Allocator`]. Every buffer holds an
//! `Arc<Device>`, so the allocator cannot be torn down while a buffer is
//! still alive.
//!
//! On drop the device reports any buffer that was never released through
//! its [`LiveAllocations`] counter.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use kiln_rhi::device::{Device, QueueFamilies};
//!
//! # fn example(
//! #     instance: &ash::Instance,
//! #     physical_device: vk::PhysicalDevice,
//! #     logical: ash::Device,
//! # ) -> Result<(), kiln_rhi::RhiError> {
//! let device = Device::from_raw(
//!     instance,
//!     physical_device,
//!     logical,
//!     QueueFamilies { graphics: 0, present: 0 },
//! )?;
//!
//! let graphics_queue = device.graphics_queue();
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::RhiError;

/// Queue family indices used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Family used for graphics and transfer work.
    pub graphics: u32,
    /// Family used for presentation.
    pub present: u32,
}

impl QueueFamilies {
    /// Returns true when graphics and present share a family.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Device limits that buffer layout and flushing depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferLimits {
    pub min_uniform_buffer_offset_alignment: vk::DeviceSize,
    pub min_storage_buffer_offset_alignment: vk::DeviceSize,
    pub non_coherent_atom_size: vk::DeviceSize,
}

impl BufferLimits {
    fn from_properties(limits: &vk::PhysicalDeviceLimits) -> Self {
        Self {
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment,
            non_coherent_atom_size: limits.non_coherent_atom_size,
        }
    }
}

/// Shared count of buffers that are currently allocated.
///
/// Buffers take an [`AllocationTicket`] on creation; dropping the ticket
/// decrements the count.
#[derive(Debug, Default, Clone)]
pub struct LiveAllocations {
    count: Arc<AtomicUsize>,
}

impl LiveAllocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one live allocation.
    pub fn track(&self) -> AllocationTicket {
        self.count.fetch_add(1, Ordering::AcqRel);
        AllocationTicket {
            count: Arc::clone(&self.count),
        }
    }

    /// Number of allocations not yet released.
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// RAII registration in a [`LiveAllocations`] counter.
#[derive(Debug)]
pub struct AllocationTicket {
    count: Arc<AtomicUsize>,
}

impl Drop for AllocationTicket {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Shared logical device, queues and allocator.
///
/// Held as `Arc<Device>` by everything that owns GPU objects; the allocator
/// is locked per allocation.
pub struct Device {
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    // Dropped before the logical device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilies,
    limits: BufferLimits,
    live_allocations: LiveAllocations,
}

impl Device {
    /// Wraps an externally created logical device.
    ///
    /// Ownership of `device` moves into the returned context; it is destroyed
    /// when the last `Arc<Device>` is dropped. The device limits are queried
    /// once and the gpu-allocator is initialized.
    ///
    /// Queue 0 of each family in `queue_families` is used.
    ///
    /// # Errors
    ///
    /// Returns an error if allocator initialization fails.
    pub fn from_raw(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue_families: QueueFamilies,
    ) -> Result<Arc<Self>, RhiError> {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let limits = BufferLimits::from_properties(&properties.limits);
        debug!("Device buffer limits: {:?}", limits);

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };

        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        debug!(
            graphics = queue_families.graphics,
            present = queue_families.present,
            "Retrieved device queues"
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            instance: instance.clone(),
            device,
            physical_device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            limits,
            live_allocations: LiveAllocations::new(),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the instance the device was created from.
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilies {
        &self.queue_families
    }

    /// Returns the limits relevant to buffer layout and flushing.
    #[inline]
    pub fn limits(&self) -> &BufferLimits {
        &self.limits
    }

    /// Returns a reference to the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Returns the live buffer counter.
    #[inline]
    pub fn live_allocations(&self) -> &LiveAllocations {
        &self.live_allocations
    }

    /// Blocks until every queue on the device has drained.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is lost.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// # Safety
    ///
    /// Every command buffer in `submit_infos` must be fully recorded, and
    /// `fence` must be unsignaled and not pending on another submission.
    ///
    /// # Errors
    ///
    /// Returns the queue submission failure.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Device did not go idle before destruction: {e}");
            }
        }

        match self.live_allocations.count() {
            0 => debug!("Buffer allocations match deallocations"),
            live => error!("Buffer alloc/dealloc mismatch: {} buffer(s) still live", live),
        }

        unsafe {
            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Destroyed logical device");
    }
}

// SAFETY: the raw handles are plain values, ash's dispatch tables are
// immutable after load and the allocator sits behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
