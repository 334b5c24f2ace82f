//! Thin Vulkan layer over `ash` and `gpu-allocator`.
//!
//! [`device::Device`] wraps a logical device created elsewhere together with
//! its allocator and a count of live GPU allocations. On top of it sit
//! device-local buffers ([`buffer`]), staged uploads ([`upload`]), command
//! recording ([`command`]), sync objects ([`sync`]) and the swapchain.

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod swapchain;
pub mod sync;
pub mod upload;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
