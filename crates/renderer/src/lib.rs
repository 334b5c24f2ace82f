//! Frame execution for kiln.
//!
//! - [`FrameRenderer`]: the per-frame state machine and surface rebuild policy
//! - [`PresentBackend`]: the device operations it drives
//! - [`VulkanBackend`]: swapchain, depth target and frame synchronization

pub mod backend;
pub mod depth_buffer;
pub mod frame_renderer;
pub mod vulkan_backend;

pub use backend::{AcquireOutcome, PresentBackend, PresentOutcome};
pub use frame_renderer::FrameRenderer;
pub use vulkan_backend::VulkanBackend;
