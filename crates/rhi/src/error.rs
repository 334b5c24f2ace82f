//! Errors from the GPU layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    /// A Vulkan call returned a failure code.
    #[error("Vulkan call failed: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// gpu-allocator could not satisfy a request.
    #[error("Device memory allocation failed: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// A buffer or image request was rejected before reaching the driver,
    /// e.g. a zero size or an out-of-range write.
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// The surface cannot currently be presented to.
    #[error("Surface unusable: {0}")]
    SurfaceError(String),

    /// The surface offers nothing a swapchain can be built from.
    #[error("Swapchain unsupported: {0}")]
    SwapchainError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
