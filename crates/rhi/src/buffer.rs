//! GPU buffer management.
//!
//! This module owns every GPU buffer the renderer allocates: vertex, index,
//! uniform, storage and staging buffers. Memory comes from the gpu-allocator
//! owned by [`Device`].
//!
//! # Overview
//!
//! - [`BufferUsage`] defines how a buffer will be used (vertex, index, uniform, etc.)
//! - [`MemoryClass`] selects host-visible or device-only memory
//! - [`BufferLayout`] computes aligned element strides and the total size
//! - [`Buffer`] wraps VkBuffer with gpu-allocator managed memory
//!
//! A buffer is laid out as `count` elements of `stride` bytes, each padded to
//! `aligned_stride`. Host writes go through [`Buffer::map`]; writing an
//! unmapped buffer or mapping device-only memory is a programming error and
//! panics.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_rhi::device::Device;
//! use kiln_rhi::buffer::{Buffer, BufferDesc, BufferLayout, BufferUsage, MemoryClass, MappedRange};
//!
//! # fn example(device: Arc<Device>) -> Result<(), kiln_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let desc = BufferDesc {
//!     layout: BufferLayout::new(8, 3, 1)?,
//!     usage: BufferUsage::Staging,
//!     memory: MemoryClass::HostUpload,
//!     name: "triangle staging".into(),
//! };
//! let mut staging = Buffer::new(device, desc)?;
//! staging.map()?;
//! staging.write_all(bytemuck::cast_slice(&vertices))?;
//! staging.flush(MappedRange::Whole)?;
//! staging.unmap();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, trace};

use crate::device::{AllocationTicket, BufferLimits, Device};
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
///
/// Defines the intended use of the buffer, which affects
/// Vulkan usage flags and the element alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - stores shader uniform data
    Uniform,
    /// Storage buffer - general-purpose GPU storage
    Storage,
    /// Staging buffer - source of a transfer
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    ///
    /// Every functional usage can be the destination of a staged upload.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => {
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Storage => {
                vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Minimum per-element alignment for this usage on the given device.
    pub fn min_alignment(self, limits: &BufferLimits) -> vk::DeviceSize {
        match self {
            BufferUsage::Uniform => limits.min_uniform_buffer_offset_alignment,
            BufferUsage::Storage => limits.min_storage_buffer_offset_alignment,
            BufferUsage::Vertex | BufferUsage::Index | BufferUsage::Staging => 1,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
            BufferUsage::Staging => "staging",
        }
    }
}

/// Memory class a buffer is allocated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryClass {
    /// Host-visible memory written by the CPU and read by the GPU.
    HostUpload,
    /// Device-local memory the CPU cannot access.
    DeviceOnly,
    /// Host-visible memory written by the GPU and read back by the CPU.
    HostReadback,
}

impl MemoryClass {
    /// Returns the gpu-allocator location for this class.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            MemoryClass::HostUpload => MemoryLocation::CpuToGpu,
            MemoryClass::DeviceOnly => MemoryLocation::GpuOnly,
            MemoryClass::HostReadback => MemoryLocation::GpuToCpu,
        }
    }

    /// Returns true if the CPU can map memory of this class.
    #[inline]
    pub fn is_host_visible(self) -> bool {
        !matches!(self, MemoryClass::DeviceOnly)
    }
}

/// Element layout of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLayout {
    stride: vk::DeviceSize,
    count: u32,
    aligned_stride: vk::DeviceSize,
    size: vk::DeviceSize,
}

impl BufferLayout {
    /// Computes the layout of `count` elements of `stride` bytes, each
    /// padded to a multiple of `min_alignment`.
    ///
    /// A `min_alignment` of 0 means no padding.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] if `stride` or `count` is zero,
    /// or if the total size overflows.
    pub fn new(stride: vk::DeviceSize, count: u32, min_alignment: vk::DeviceSize) -> RhiResult<Self> {
        if stride == 0 || count == 0 {
            return Err(RhiError::InvalidAllocation(format!(
                "buffer layout needs a non-zero stride and count (stride {}, count {})",
                stride, count
            )));
        }

        let aligned_stride = Self::align(stride, min_alignment).ok_or_else(|| {
            RhiError::InvalidAllocation(format!(
                "stride {} overflows when aligned to {}",
                stride, min_alignment
            ))
        })?;

        let size = aligned_stride
            .checked_mul(vk::DeviceSize::from(count))
            .ok_or_else(|| {
                RhiError::InvalidAllocation(format!(
                    "buffer of {} x {} bytes overflows",
                    count, aligned_stride
                ))
            })?;

        Ok(Self {
            stride,
            count,
            aligned_stride,
            size,
        })
    }

    /// Rounds `stride` up to the next multiple of `min_alignment`.
    ///
    /// Returns `None` on overflow.
    pub fn align(stride: vk::DeviceSize, min_alignment: vk::DeviceSize) -> Option<vk::DeviceSize> {
        if min_alignment == 0 {
            return Some(stride);
        }
        stride.div_ceil(min_alignment).checked_mul(min_alignment)
    }

    #[inline]
    pub fn stride(&self) -> vk::DeviceSize {
        self.stride
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn aligned_stride(&self) -> vk::DeviceSize {
        self.aligned_stride
    }

    /// Total size in bytes: `aligned_stride * count`.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Byte offset of element `index`.
    #[inline]
    pub fn offset_of(&self, index: u32) -> vk::DeviceSize {
        self.aligned_stride * vk::DeviceSize::from(index)
    }

    /// The aligned byte range occupied by element `index`.
    pub fn region(&self, index: u32) -> MappedRange {
        MappedRange::Bytes {
            offset: self.offset_of(index),
            size: self.aligned_stride,
        }
    }
}

/// A byte range of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappedRange {
    /// The whole buffer.
    Whole,
    /// `size` bytes starting at `offset`.
    Bytes {
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
}

impl MappedRange {
    /// Resolves to `(offset, size)` within a buffer of `buffer_size` bytes.
    fn resolve(self, buffer_size: vk::DeviceSize) -> (vk::DeviceSize, vk::DeviceSize) {
        match self {
            MappedRange::Whole => (0, buffer_size),
            MappedRange::Bytes { offset, size } => (offset, size),
        }
    }
}

/// Expands `offset..offset + size` outward to multiples of `atom` and clamps
/// the end to `limit`.
///
/// Used for flushing and invalidating non-coherent memory, whose ranges must
/// start and end on `nonCoherentAtomSize` boundaries.
pub fn atom_aligned_range(
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    limit: vk::DeviceSize,
    atom: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let atom = atom.max(1);
    let start = (offset / atom) * atom;
    let end = offset
        .saturating_add(size)
        .div_ceil(atom)
        .saturating_mul(atom)
        .min(limit);
    (start.min(end), end.saturating_sub(start))
}

/// Everything needed to create a [`Buffer`].
#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub layout: BufferLayout,
    pub usage: BufferUsage,
    pub memory: MemoryClass,
    /// Debug name passed to the allocator.
    pub name: String,
}

impl BufferDesc {
    /// Rejects usage and memory combinations that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] for a staging buffer in
    /// device-only memory.
    pub fn validate(&self) -> RhiResult<()> {
        if self.usage == BufferUsage::Staging && !self.memory.is_host_visible() {
            return Err(RhiError::InvalidAllocation(format!(
                "staging buffer '{}' must be host-visible",
                self.name
            )));
        }
        Ok(())
    }
}

/// GPU buffer wrapper with managed memory.
///
/// This struct wraps a Vulkan buffer and its associated memory allocation.
/// Memory is managed by gpu-allocator, which handles suballocation and
/// memory type selection. The buffer is released exactly once, on drop.
///
/// # Thread Safety
///
/// Host access requires `&mut self`. Share read-only via `Arc`.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    layout: BufferLayout,
    usage: BufferUsage,
    memory: MemoryClass,
    name: String,
    /// Whether host writes are currently allowed.
    mapped: bool,
    /// Whether the backing memory is HOST_COHERENT.
    coherent: bool,
    ticket: Option<AllocationTicket>,
}

impl Buffer {
    /// Creates a new buffer sized by `desc.layout`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `desc` - Layout, usage, memory class and debug name
    ///
    /// # Errors
    ///
    /// Returns an error if the description is invalid or buffer or memory
    /// allocation fails. Nothing is retried.
    pub fn new(device: Arc<Device>, desc: BufferDesc) -> RhiResult<Self> {
        desc.validate()?;

        let BufferDesc {
            layout,
            usage,
            memory,
            name,
        } = desc;

        let buffer_info = vk::BufferCreateInfo::default()
            .size(layout.size())
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let mut requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };
        if memory.is_host_visible() {
            // Keep whole atoms inside the allocation so flush ranges never
            // reach into a neighbouring suballocation.
            let atom = device.limits().non_coherent_atom_size.max(1);
            requirements.alignment = requirements.alignment.max(atom);
            requirements.size = requirements.size.div_ceil(atom) * atom;
        }

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: &name,
                requirements,
                location: memory.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
        };

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            let mut allocator = device.allocator().lock().unwrap();
            if let Err(free_err) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", free_err);
            }
            unsafe { device.handle().destroy_buffer(buffer, None) };
            return Err(e.into());
        }

        let coherent = allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        let ticket = device.live_allocations().track();

        debug!(
            "Created {} buffer '{}': {} x {} bytes ({} total, coherent: {})",
            usage.name(),
            name,
            layout.count(),
            layout.aligned_stride(),
            layout.size(),
            coherent
        );

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            layout,
            usage,
            memory,
            name,
            mapped: false,
            coherent,
            ticket: Some(ticket),
        })
    }

    /// Enables host writes.
    ///
    /// Mapping an already mapped buffer does nothing.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lives in device-only memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator did not provide a host pointer.
    pub fn map(&mut self) -> RhiResult<()> {
        assert!(
            self.memory.is_host_visible(),
            "Can't map device-only buffer '{}'",
            self.name
        );
        if self.mapped {
            return Ok(());
        }

        let has_pointer = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .is_some();
        if !has_pointer {
            return Err(RhiError::InvalidAllocation(format!(
                "buffer '{}' has no host mapping",
                self.name
            )));
        }

        self.mapped = true;
        trace!("Mapped buffer '{}'", self.name);
        Ok(())
    }

    /// Disables host writes. Does nothing if the buffer is not mapped.
    pub fn unmap(&mut self) {
        if self.mapped {
            self.mapped = false;
            trace!("Unmapped buffer '{}'", self.name);
        }
    }

    /// Writes `data` at byte `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not mapped.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] if the write would exceed the
    /// buffer size.
    pub fn write(&mut self, data: &[u8], offset: vk::DeviceSize) -> RhiResult<()> {
        assert!(self.mapped, "Can't write to unmapped buffer '{}'", self.name);

        if data.is_empty() {
            return Ok(());
        }

        let end = offset
            .checked_add(data.len() as vk::DeviceSize)
            .filter(|&end| end <= self.layout.size())
            .ok_or_else(|| {
                RhiError::InvalidAllocation(format!(
                    "write exceeds buffer '{}': offset {} + data {} > buffer {}",
                    self.name,
                    offset,
                    data.len(),
                    self.layout.size()
                ))
            })?;

        let dst = self
            .allocation
            .as_mut()
            .and_then(Allocation::mapped_slice_mut)
            .ok_or_else(|| {
                RhiError::InvalidAllocation(format!("buffer '{}' has no host mapping", self.name))
            })?;

        dst[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    /// Writes `data` from the start of the buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not mapped.
    pub fn write_all(&mut self, data: &[u8]) -> RhiResult<()> {
        self.write(data, 0)
    }

    /// Writes one element at `index * aligned_stride`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidAllocation`] if `index` is out of range or
    /// `data` is longer than the element stride.
    pub fn write_at_index(&mut self, data: &[u8], index: u32) -> RhiResult<()> {
        self.check_index(index)?;
        if data.len() as vk::DeviceSize > self.layout.stride() {
            return Err(RhiError::InvalidAllocation(format!(
                "element of {} bytes does not fit stride {} of buffer '{}'",
                data.len(),
                self.layout.stride(),
                self.name
            )));
        }
        self.write(data, self.layout.offset_of(index))
    }

    /// Makes host writes in `range` visible to the device.
    ///
    /// Does nothing for HOST_COHERENT memory.
    pub fn flush(&self, range: MappedRange) -> RhiResult<()> {
        if let Some(mapped_range) = self.non_coherent_range(range) {
            unsafe {
                self.device
                    .handle()
                    .flush_mapped_memory_ranges(&[mapped_range])?;
            }
        }
        Ok(())
    }

    /// Makes device writes in `range` visible to the host.
    ///
    /// Does nothing for HOST_COHERENT memory.
    pub fn invalidate(&self, range: MappedRange) -> RhiResult<()> {
        if let Some(mapped_range) = self.non_coherent_range(range) {
            unsafe {
                self.device
                    .handle()
                    .invalidate_mapped_memory_ranges(&[mapped_range])?;
            }
        }
        Ok(())
    }

    /// Flushes the element at `index`.
    pub fn flush_index(&self, index: u32) -> RhiResult<()> {
        self.check_index(index)?;
        self.flush(self.layout.region(index))
    }

    /// Invalidates the element at `index`.
    pub fn invalidate_index(&self, index: u32) -> RhiResult<()> {
        self.check_index(index)?;
        self.invalidate(self.layout.region(index))
    }

    /// Descriptor info covering `range`.
    pub fn descriptor_info(&self, range: MappedRange) -> vk::DescriptorBufferInfo {
        let (offset, size) = match range {
            MappedRange::Whole => (0, vk::WHOLE_SIZE),
            MappedRange::Bytes { offset, size } => (offset, size),
        };
        vk::DescriptorBufferInfo::default()
            .buffer(self.buffer)
            .offset(offset)
            .range(size)
    }

    /// Descriptor info covering the element at `index`.
    pub fn descriptor_for_index(&self, index: u32) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.layout.region(index))
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.layout.size()
    }

    #[inline]
    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[inline]
    pub fn memory(&self) -> MemoryClass {
        self.memory
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn check_index(&self, index: u32) -> RhiResult<()> {
        if index >= self.layout.count() {
            return Err(RhiError::InvalidAllocation(format!(
                "index {} out of range for buffer '{}' with {} element(s)",
                index,
                self.name,
                self.layout.count()
            )));
        }
        Ok(())
    }

    fn non_coherent_range(&self, range: MappedRange) -> Option<vk::MappedMemoryRange<'static>> {
        if self.coherent || !self.memory.is_host_visible() {
            return None;
        }
        let allocation = self.allocation.as_ref()?;

        let (offset, size) = range.resolve(self.layout.size());
        let (offset, size) = atom_aligned_range(
            offset,
            size,
            allocation.size(),
            self.device.limits().non_coherent_atom_size,
        );

        Some(
            vk::MappedMemoryRange::default()
                .memory(unsafe { allocation.memory() })
                .offset(allocation.offset() + offset)
                .size(size),
        )
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();

        // Free allocation first, then destroy buffer
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free buffer allocation: {:?}", e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        self.ticket.take();
        debug!("Destroyed {} buffer '{}'", self.usage.name(), self.name);
        trace!(
            "{} buffer(s) still live",
            self.device.live_allocations().count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Uniform
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Storage
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::STORAGE_BUFFER)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_memory_class_location() {
        assert_eq!(
            MemoryClass::HostUpload.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            MemoryClass::DeviceOnly.memory_location(),
            MemoryLocation::GpuOnly
        );
        assert_eq!(
            MemoryClass::HostReadback.memory_location(),
            MemoryLocation::GpuToCpu
        );
        assert!(MemoryClass::HostUpload.is_host_visible());
        assert!(MemoryClass::HostReadback.is_host_visible());
        assert!(!MemoryClass::DeviceOnly.is_host_visible());
    }

    #[test]
    fn test_min_alignment_per_usage() {
        let limits = BufferLimits {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 64,
            non_coherent_atom_size: 128,
        };
        assert_eq!(BufferUsage::Uniform.min_alignment(&limits), 256);
        assert_eq!(BufferUsage::Storage.min_alignment(&limits), 64);
        assert_eq!(BufferUsage::Vertex.min_alignment(&limits), 1);
    }

    #[test]
    fn test_align() {
        assert_eq!(BufferLayout::align(44, 0), Some(44));
        assert_eq!(BufferLayout::align(44, 1), Some(44));
        assert_eq!(BufferLayout::align(44, 16), Some(48));
        assert_eq!(BufferLayout::align(64, 64), Some(64));
        assert_eq!(BufferLayout::align(65, 64), Some(128));
        // Non power of two alignments still round up to a multiple.
        assert_eq!(BufferLayout::align(10, 12), Some(12));
        assert_eq!(BufferLayout::align(u64::MAX, 256), None);
    }

    #[test]
    fn test_layout_size_covers_data_and_is_aligned() {
        for stride in [1u64, 3, 4, 12, 44, 100, 255, 256, 257] {
            for alignment in [1u64, 4, 16, 64, 256] {
                for count in [1u32, 2, 7, 100] {
                    let layout = BufferLayout::new(stride, count, alignment).unwrap();
                    assert!(layout.size() >= stride * u64::from(count));
                    assert_eq!(layout.aligned_stride() % alignment, 0);
                    assert_eq!(layout.size() % alignment, 0);
                    assert_eq!(layout.size(), layout.aligned_stride() * u64::from(count));
                }
            }
        }
    }

    #[test]
    fn test_layout_offsets() {
        let layout = BufferLayout::new(40, 3, 256).unwrap();
        assert_eq!(layout.aligned_stride(), 256);
        assert_eq!(layout.offset_of(0), 0);
        assert_eq!(layout.offset_of(2), 512);
        assert_eq!(
            layout.region(1),
            MappedRange::Bytes {
                offset: 256,
                size: 256
            }
        );
    }

    #[test]
    fn test_layout_rejects_empty_and_overflow() {
        assert!(matches!(
            BufferLayout::new(0, 4, 1),
            Err(RhiError::InvalidAllocation(_))
        ));
        assert!(matches!(
            BufferLayout::new(4, 0, 1),
            Err(RhiError::InvalidAllocation(_))
        ));
        assert!(matches!(
            BufferLayout::new(u64::MAX / 2, u32::MAX, 1),
            Err(RhiError::InvalidAllocation(_))
        ));
    }

    #[test]
    fn test_desc_validation() {
        let layout = BufferLayout::new(4, 4, 1).unwrap();
        let staging_on_device = BufferDesc {
            layout,
            usage: BufferUsage::Staging,
            memory: MemoryClass::DeviceOnly,
            name: "bad".into(),
        };
        assert!(matches!(
            staging_on_device.validate(),
            Err(RhiError::InvalidAllocation(_))
        ));

        let vertex_on_device = BufferDesc {
            layout,
            usage: BufferUsage::Vertex,
            memory: MemoryClass::DeviceOnly,
            name: "ok".into(),
        };
        assert!(vertex_on_device.validate().is_ok());
    }

    #[test]
    fn test_atom_aligned_range() {
        // Already aligned
        assert_eq!(atom_aligned_range(0, 256, 1024, 64), (0, 256));
        // Expanded outward on both ends
        assert_eq!(atom_aligned_range(10, 20, 1024, 64), (0, 64));
        assert_eq!(atom_aligned_range(70, 100, 1024, 64), (64, 128));
        // Clamped to the allocation end
        assert_eq!(atom_aligned_range(1000, 100, 1024, 64), (960, 64));
        // Zero atom behaves as byte granularity
        assert_eq!(atom_aligned_range(3, 5, 1024, 0), (3, 5));
    }

    #[test]
    fn test_buffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Buffer>();
    }
}
