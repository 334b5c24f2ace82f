//! Swapchain creation, acquisition, presentation and rebuilds.
//!
//! The surface-dependent decisions (format, present mode, extent, image
//! count) are made by [`SwapchainSupportDetails::choose`] from queried
//! capabilities alone, so they can be checked without a device.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use kiln_rhi::device::Device;
//! use kiln_rhi::swapchain::Swapchain;
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     surface_loader: ash::khr::surface::Instance,
//! #     surface: vk::SurfaceKHR,
//! #     semaphore: vk::Semaphore,
//! # ) -> Result<(), kiln_rhi::RhiError> {
//! let mut swapchain = Swapchain::new(device, surface_loader, surface, 800, 600)?;
//!
//! match swapchain.acquire_next_image(semaphore, 1_000_000_000) {
//!     Ok((image_index, suboptimal)) => { /* record and present */ }
//!     Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
//!         swapchain.recreate(1024, 768)?;
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

const FALLBACK_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// What a surface supports, as reported by the physical device.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Swapchain parameters picked for one (re)creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceChoice {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainSupportDetails {
    /// Queries support details for `surface` on `physical_device`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the surface queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        debug!(
            "Surface support: {} formats, {} present modes, {}..{} images",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count,
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Picks swapchain parameters for a drawable of `width` x `height`.
    ///
    /// Format: B8G8R8A8_SRGB, then B8G8R8A8_UNORM, then whatever comes first.
    /// Present mode: MAILBOX if offered, else FIFO. Image count: one above the
    /// minimum, capped by the maximum when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] when no format or present mode is
    /// offered, and [`RhiError::SurfaceError`] when the resulting extent has a
    /// zero side.
    pub fn choose(&self, width: u32, height: u32) -> RhiResult<SurfaceChoice> {
        let Some(&first_format) = self.formats.first() else {
            return Err(RhiError::SwapchainError(
                "Surface offers no formats".to_string(),
            ));
        };
        if self.present_modes.is_empty() {
            return Err(RhiError::SwapchainError(
                "Surface offers no present modes".to_string(),
            ));
        }

        let format = if self.formats.contains(&PREFERRED_FORMAT) {
            PREFERRED_FORMAT
        } else if self.formats.contains(&FALLBACK_FORMAT) {
            warn!("B8G8R8A8_SRGB unavailable, using B8G8R8A8_UNORM");
            FALLBACK_FORMAT
        } else {
            warn!("Using first offered surface format {:?}", first_format.format);
            first_format
        };

        let present_mode = if self.present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        };

        let caps = &self.capabilities;
        // u32::MAX means the surface lets the swapchain decide
        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };

        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SurfaceError(format!(
                "surface extent {}x{} is degenerate",
                extent.width, extent.height
            )));
        }

        let image_count = match caps.max_image_count {
            0 => caps.min_image_count + 1,
            max => (caps.min_image_count + 1).min(max),
        };

        Ok(SurfaceChoice {
            format,
            present_mode,
            extent,
            image_count,
        })
    }
}

/// Result of [`Swapchain::recreate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recreate {
    Rebuilt { format_changed: bool },
    /// The surface currently has a zero-sized extent; nothing was replaced.
    SurfaceDegenerate,
}

/// Swapchain plus the image views of its images.
///
/// Keeps the surface it presents to, so [`Swapchain::recreate`] only needs
/// the new drawable size. The surface itself is owned by the caller.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    choice: SurfaceChoice,
}

impl Swapchain {
    /// Creates a swapchain for `surface` sized to `width` x `height` where the
    /// surface leaves the size open.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface queries fail, the surface is unusable
    /// (see [`SwapchainSupportDetails::choose`]), or swapchain or image view
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        surface_loader: ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(device.instance(), device.handle());

        let mut swapchain = Self {
            device,
            loader,
            surface_loader,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            choice: SurfaceChoice {
                format: PREFERRED_FORMAT,
                present_mode: vk::PresentModeKHR::FIFO,
                extent: vk::Extent2D::default(),
                image_count: 0,
            },
        };
        swapchain.build(width, height)?;

        Ok(swapchain)
    }

    /// Recreates the swapchain for a new drawable size.
    ///
    /// Waits for the device to go idle first. When the surface reports a
    /// zero-sized extent the current swapchain is kept and
    /// [`Recreate::SurfaceDegenerate`] is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait or the recreation fails. On failure the
    /// previous swapchain is kept.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<Recreate> {
        self.device.wait_idle()?;

        debug!("Recreating swapchain for {}x{}", width, height);

        let old_format = self.choice.format.format;
        match self.build(width, height) {
            Ok(()) => {}
            Err(RhiError::SurfaceError(reason)) => {
                debug!("Keeping current swapchain: {}", reason);
                return Ok(Recreate::SurfaceDegenerate);
            }
            Err(e) => return Err(e),
        }

        let format_changed = self.choice.format.format != old_format;
        if format_changed {
            warn!(
                "Swapchain format changed from {:?} to {:?}",
                old_format, self.choice.format.format
            );
        }

        Ok(Recreate::Rebuilt { format_changed })
    }

    /// Creates a new swapchain (retiring the current one, if any) and swaps
    /// it in. State is untouched on error.
    fn build(&mut self, width: u32, height: u32) -> RhiResult<()> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;
        let choice = support.choose(width, height)?;

        let families = self.device.queue_families();
        let family_indices = [families.graphics, families.present];
        let (sharing_mode, family_indices) = if families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, &family_indices[..0])
        } else {
            (vk::SharingMode::CONCURRENT, &family_indices[..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(choice.image_count)
            .image_format(choice.format.format)
            .image_color_space(choice.format.color_space)
            .image_extent(choice.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(choice.present_mode)
            .clipped(true)
            .old_swapchain(self.swapchain);

        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None)? };

        let views = unsafe { self.loader.get_swapchain_images(swapchain) }
            .map_err(RhiError::from)
            .and_then(|images| {
                let views = create_image_views(&self.device, &images, choice.format.format)?;
                Ok((images, views))
            });
        let (images, image_views) = match views {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { self.loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        self.destroy();
        self.swapchain = swapchain;
        self.images = images;
        self.image_views = image_views;
        self.choice = choice;

        debug!(
            "Swapchain ready: {}x{}, {:?}, {:?}, {} images",
            choice.extent.width,
            choice.extent.height,
            choice.format.format,
            choice.present_mode,
            self.images.len()
        );

        Ok(())
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// Returns `(image_index, suboptimal)`.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result so callers can tell
    /// `ERROR_OUT_OF_DATE_KHR`, `TIMEOUT` and `NOT_READY` from real failures.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    /// Queues image `image_index` for presentation after `wait_semaphore`.
    ///
    /// Returns true if the swapchain is suboptimal.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result, including `ERROR_OUT_OF_DATE_KHR`.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.choice.format.format
    }

    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.choice.format.color_space
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.choice.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.choice.present_mode
    }

    /// Number of images actually created, which may exceed the requested count.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    fn destroy(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.handle().destroy_image_view(view, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let extent = self.choice.extent;
        self.destroy();
        info!("Swapchain destroyed (was {}x{})", extent.width, extent.height);
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for view in views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn support(
        formats: Vec<vk::SurfaceFormatKHR>,
        modes: Vec<vk::PresentModeKHR>,
    ) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR {
                current_extent: extent(u32::MAX, u32::MAX),
                min_image_extent: extent(1, 1),
                max_image_extent: extent(4096, 4096),
                min_image_count: 2,
                max_image_count: 0,
                ..Default::default()
            },
            formats,
            present_modes: modes,
        }
    }

    fn fifo_only() -> SwapchainSupportDetails {
        support(vec![PREFERRED_FORMAT], vec![vk::PresentModeKHR::FIFO])
    }

    #[test]
    fn test_choose_prefers_srgb_then_unorm() {
        let unorm_rgba = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let all = support(
            vec![unorm_rgba, FALLBACK_FORMAT, PREFERRED_FORMAT],
            vec![vk::PresentModeKHR::FIFO],
        );
        assert_eq!(all.choose(800, 600).unwrap().format, PREFERRED_FORMAT);

        let no_srgb = support(vec![unorm_rgba, FALLBACK_FORMAT], vec![vk::PresentModeKHR::FIFO]);
        assert_eq!(no_srgb.choose(800, 600).unwrap().format, FALLBACK_FORMAT);

        let other = support(vec![unorm_rgba], vec![vk::PresentModeKHR::FIFO]);
        assert_eq!(other.choose(800, 600).unwrap().format, unorm_rgba);
    }

    #[test]
    fn test_choose_prefers_mailbox() {
        let details = support(
            vec![PREFERRED_FORMAT],
            vec![
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::IMMEDIATE,
            ],
        );
        assert_eq!(
            details.choose(800, 600).unwrap().present_mode,
            vk::PresentModeKHR::MAILBOX
        );

        let details = support(
            vec![PREFERRED_FORMAT],
            vec![vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO],
        );
        assert_eq!(
            details.choose(800, 600).unwrap().present_mode,
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_uses_fixed_surface_extent() {
        let mut details = fifo_only();
        details.capabilities.current_extent = extent(1920, 1080);

        assert_eq!(details.choose(800, 600).unwrap().extent, extent(1920, 1080));
    }

    #[test]
    fn test_choose_clamps_requested_extent() {
        let mut details = fifo_only();
        details.capabilities.min_image_extent = extent(100, 100);
        details.capabilities.max_image_extent = extent(2000, 2000);

        assert_eq!(details.choose(3000, 3000).unwrap().extent, extent(2000, 2000));
        assert_eq!(details.choose(50, 50).unwrap().extent, extent(100, 100));
        assert_eq!(details.choose(800, 600).unwrap().extent, extent(800, 600));
    }

    #[test]
    fn test_choose_rejects_degenerate_extent() {
        // A minimized window on some platforms reports a fixed 0x0 extent
        let mut details = fifo_only();
        details.capabilities.current_extent = extent(0, 0);

        assert!(matches!(
            details.choose(800, 600),
            Err(RhiError::SurfaceError(_))
        ));
    }

    #[test]
    fn test_choose_image_count() {
        let mut details = fifo_only();
        assert_eq!(details.choose(800, 600).unwrap().image_count, 3);

        details.capabilities.max_image_count = 2;
        assert_eq!(details.choose(800, 600).unwrap().image_count, 2);

        details.capabilities.max_image_count = 8;
        assert_eq!(details.choose(800, 600).unwrap().image_count, 3);
    }

    #[test]
    fn test_choose_requires_formats_and_modes() {
        let no_formats = support(vec![], vec![vk::PresentModeKHR::FIFO]);
        assert!(matches!(
            no_formats.choose(800, 600),
            Err(RhiError::SwapchainError(_))
        ));

        let no_modes = support(vec![PREFERRED_FORMAT], vec![]);
        assert!(matches!(
            no_modes.choose(800, 600),
            Err(RhiError::SwapchainError(_))
        ));
    }
}
