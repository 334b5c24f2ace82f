//! The seam between the frame state machine and the device.
//!
//! [`crate::FrameRenderer`] owns the frame ordering rules and decides when the
//! presentation surface must be rebuilt. A [`PresentBackend`] does the device
//! work for each step. [`crate::VulkanBackend`] is the production backend.

use std::fmt;

use kiln_rhi::RhiResult;

/// Result of acquiring the next presentation image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready. `suboptimal` means it can be used but the surface
    /// should be rebuilt after this frame is presented.
    Ready { image_index: u32, suboptimal: bool },
    /// The surface no longer matches the drawable.
    OutOfDate,
    /// No image became available within the acquire timeout.
    Timeout,
}

/// Result of presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Returns true if the surface should be rebuilt.
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Device operations driven by the frame renderer.
///
/// Frame-indexed calls receive the in-flight slot (`0..frames_in_flight`);
/// image-indexed calls receive the swapchain image returned by
/// [`PresentBackend::acquire`].
pub trait PresentBackend {
    /// The command-recording target handed to callers for one frame.
    type Target: Clone + PartialEq + fmt::Debug;

    /// Waits until slot `frame_index` is free, then acquires the next image.
    fn acquire(&mut self, frame_index: usize) -> RhiResult<AcquireOutcome>;

    /// Resets and begins the slot's recording target.
    fn begin_recording(&mut self, frame_index: usize) -> RhiResult<Self::Target>;

    /// Starts rendering into `image_index` (clears color and depth).
    fn begin_render_pass(&mut self, target: &Self::Target, image_index: u32);

    /// Ends rendering and prepares `image_index` for presentation.
    fn end_render_pass(&mut self, target: &Self::Target, image_index: u32);

    /// Finishes recording, submits slot `frame_index` and presents `image_index`.
    fn submit_and_present(&mut self, frame_index: usize, image_index: u32)
    -> RhiResult<PresentOutcome>;

    /// Rebuilds the surface and its size-dependent resources for `extent`.
    ///
    /// Implementations wait for the device to go idle before releasing
    /// anything in-flight work may still reference. Returns `false`, leaving
    /// the old resources in place, when the surface itself currently reports
    /// a zero-sized extent.
    fn rebuild(&mut self, extent: (u32, u32)) -> RhiResult<bool>;

    /// Current surface extent in pixels.
    fn extent(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_presented_skips_rebuild() {
        assert!(!PresentOutcome::Presented.needs_rebuild());
        assert!(PresentOutcome::Suboptimal.needs_rebuild());
        assert!(PresentOutcome::OutOfDate.needs_rebuild());
    }
}
