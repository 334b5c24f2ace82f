//! Drawable size tracking.

/// What the frame renderer needs to know about the surface it presents to.
pub trait DrawableSurface {
    /// Current drawable size in pixels. Either side may be zero while the
    /// window is minimized.
    fn drawable_extent(&self) -> (u32, u32);

    /// Returns true once per resize notification and clears it.
    fn take_resize_request(&mut self) -> bool;

    /// Returns true when nothing can be presented at the current size.
    fn is_degenerate(&self) -> bool {
        let (width, height) = self.drawable_extent();
        width == 0 || height == 0
    }
}

/// Drawable size plus a pending-resize flag.
///
/// Resize events set the flag; the renderer clears it when it rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeTracker {
    width: u32,
    height: u32,
    resized: bool,
}

impl ResizeTracker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resized: false,
        }
    }

    /// Records a new size and marks a resize as pending.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resized = true;
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height, or 1.0 while the height is zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl DrawableSurface for ResizeTracker {
    fn drawable_extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }
}
