//! Platform abstraction layer for the kiln renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and ownership
//! - [`DrawableSurface`], the view of a window the frame renderer needs

mod surface;
mod window;

pub use surface::{DrawableSurface, ResizeTracker};
pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::{Event, WindowEvent};
pub use winit::event_loop::EventLoop;
