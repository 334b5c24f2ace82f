//! Renderer configuration.
//!
//! [`RendererConfig`] collects the knobs the frame renderer and the asset
//! loaders read at startup. Every field has a usable default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Upper bound for [`RendererConfig::frames_in_flight`].
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 4;

/// Default number of frames the host may record ahead of the GPU.
const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Configuration for the renderer and its asset loaders.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Number of frames recorded ahead of the GPU, in `1..=4`.
    pub frames_in_flight: usize,
    /// Maximum time to wait for a presentable image.
    pub acquire_timeout: Duration,
    /// Color the color attachment is cleared to at render pass begin.
    pub clear_color: [f32; 4],
    /// Directory relative mesh paths are resolved against.
    pub asset_root: PathBuf,
    /// Initial window width in pixels.
    pub window_width: u32,
    /// Initial window height in pixels.
    pub window_height: u32,
    /// Window title.
    pub window_title: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            acquire_timeout: Duration::from_secs(1),
            clear_color: [0.63, 0.4, 0.0, 1.0],
            asset_root: PathBuf::from("assets"),
            window_width: 1280,
            window_height: 720,
            window_title: String::from("kiln"),
        }
    }
}

impl RendererConfig {
    /// Sets the frames-in-flight count, clamped to `1..=MAX_FRAMES_IN_FLIGHT_LIMIT`.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames.clamp(1, MAX_FRAMES_IN_FLIGHT_LIMIT);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    /// Frames-in-flight count, clamped even if the field was set directly.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT_LIMIT)
    }

    /// Acquire timeout in nanoseconds, saturating at `u64::MAX`.
    pub fn acquire_timeout_ns(&self) -> u64 {
        u64::try_from(self.acquire_timeout.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Checks values the renderer cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero window dimension, a zero acquire
    /// timeout or a non-finite clear color component.
    pub fn validate(&self) -> Result<()> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(Error::Config(format!(
                "window size {}x{} has a zero dimension",
                self.window_width, self.window_height
            )));
        }
        if self.acquire_timeout.is_zero() {
            return Err(Error::Config("acquire timeout must be non-zero".into()));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(Error::Config(format!(
                "clear color {:?} is not finite",
                self.clear_color
            )));
        }
        Ok(())
    }

    /// Resolves a mesh path against the asset root.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_asset(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight(), 2);
        assert_eq!(config.clear_color, [0.63, 0.4, 0.0, 1.0]);
        assert_eq!(config.acquire_timeout_ns(), 1_000_000_000);
    }

    #[test]
    fn test_frames_in_flight_is_clamped() {
        assert_eq!(RendererConfig::default().with_frames_in_flight(0).frames_in_flight, 1);
        assert_eq!(RendererConfig::default().with_frames_in_flight(3).frames_in_flight, 3);
        assert_eq!(
            RendererConfig::default().with_frames_in_flight(16).frames_in_flight,
            MAX_FRAMES_IN_FLIGHT_LIMIT
        );

        let mut config = RendererConfig::default();
        config.frames_in_flight = 0;
        assert_eq!(config.frames_in_flight(), 1);
    }

    #[test]
    fn test_acquire_timeout_saturates() {
        let config = RendererConfig::default().with_acquire_timeout(Duration::MAX);
        assert_eq!(config.acquire_timeout_ns(), u64::MAX);
    }

    #[test]
    fn test_resolve_asset() {
        let config = RendererConfig::default().with_asset_root("/data/kiln");
        assert_eq!(
            config.resolve_asset("models/cube.obj"),
            PathBuf::from("/data/kiln/models/cube.obj")
        );

        let absolute = std::env::temp_dir().join("cube.obj");
        assert_eq!(config.resolve_asset(&absolute), absolute);
    }

    #[test]
    fn test_validate() {
        assert!(RendererConfig::default().validate().is_ok());

        let config = RendererConfig::default().with_window_size(0, 600);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = RendererConfig::default().with_acquire_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = RendererConfig::default().with_clear_color([f32::NAN, 0.0, 0.0, 1.0]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_methods() {
        let config = RendererConfig::default()
            .with_window_size(800, 600)
            .with_window_title("viewer")
            .with_clear_color([0.0, 0.0, 0.0, 1.0]);
        assert_eq!((config.window_width, config.window_height), (800, 600));
        assert_eq!(config.window_title, "viewer");
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }
}
