//! winit window plus the Vulkan surface created for it.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use kiln_core::{Error, RendererConfig, Result};

use crate::surface::{DrawableSurface, ResizeTracker};

/// Owned `VkSurfaceKHR`, destroyed on drop.
///
/// The instance it was created from must still be alive at that point.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Instance-level surface functions. Swapchains clone this for their
    /// capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface against the same
        // instance the loader wraps, and destroyed nowhere else.
        unsafe { self.loader.destroy_surface(self.handle, None) };
        tracing::debug!("Destroyed Vulkan surface");
    }
}

/// Resizable application window.
///
/// The event loop forwards resize events through [`Window::resize`]; the frame
/// renderer reads them back through [`DrawableSurface`].
pub struct Window {
    inner: Arc<WinitWindow>,
    tracker: ResizeTracker,
}

impl Window {
    /// # Errors
    ///
    /// Returns [`Error::Window`] if winit cannot create the window.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let inner = event_loop
            .create_window(attributes)
            .map_err(|e| Error::Window(e.to_string()))?;

        // Tiling window managers and HiDPI scaling can hand back another size.
        let PhysicalSize { width, height } = inner.inner_size();
        tracing::info!(width, height, "Opened window");

        Ok(Self {
            inner: Arc::new(inner),
            tracker: ResizeTracker::new(width, height),
        })
    }

    /// Opens a window using the size and title from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration fails validation, or
    /// [`Error::Window`] if the window cannot be created.
    pub fn from_config(event_loop: &ActiveEventLoop, config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            event_loop,
            config.window_width,
            config.window_height,
            &config.window_title,
        )
    }

    pub fn inner(&self) -> &WinitWindow {
        &self.inner
    }

    pub fn width(&self) -> u32 {
        self.tracker.width()
    }

    pub fn height(&self) -> u32 {
        self.tracker.height()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.tracker.aspect_ratio()
    }

    /// Stores the size from a `WindowEvent::Resized` and requests a rebuild.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.tracker.resize(width, height);
        tracing::debug!(width, height, "Window resized");
    }

    pub fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// `instance` must outlive the returned [`Surface`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the raw handles are unavailable and
    /// [`Error::Surface`] if the driver rejects them.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self
            .inner
            .display_handle()
            .map_err(|e| Error::Window(format!("no display handle: {e}")))?
            .as_raw();
        let window = self
            .inner
            .window_handle()
            .map_err(|e| Error::Window(format!("no window handle: {e}")))?
            .as_raw();

        // SAFETY: both raw handles come from a live winit window, and the
        // caller keeps `instance` alive for as long as the surface exists.
        let handle = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| Error::Surface(e.to_string()))?;

        tracing::info!("Created Vulkan surface");

        Ok(Surface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}

impl DrawableSurface for Window {
    fn drawable_extent(&self) -> (u32, u32) {
        self.tracker.drawable_extent()
    }

    fn take_resize_request(&mut self) -> bool {
        self.tracker.take_resize_request()
    }
}
