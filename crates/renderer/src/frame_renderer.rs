//! Frame lifecycle and surface rebuilds.
//!
//! [`FrameRenderer`] enforces the per-frame call order and cycles through
//! `frames_in_flight` slots:
//!
//! ```text
//! Idle --begin_frame--> FrameStarted --begin_render_pass--> RenderPassActive
//!  ^                      |    ^                                 |
//!  +-------end_frame------+    +---------end_render_pass---------+
//! ```
//!
//! Calling an operation out of order is a programming error and panics.
//!
//! An out-of-date or timed out acquire, a suboptimal acquire or present, and a
//! resize notification from the surface all lead to a surface rebuild. While
//! the drawable is zero-sized the rebuild is deferred and `begin_frame`
//! returns `Ok(None)`.
//!
//! # Example
//!
//! ```no_run
//! use kiln_platform::DrawableSurface;
//! use kiln_renderer::{FrameRenderer, PresentBackend};
//!
//! # fn example<B: PresentBackend, S: DrawableSurface>(
//! #     renderer: &mut FrameRenderer<B, S>,
//! # ) -> kiln_rhi::RhiResult<()> {
//! if let Some(target) = renderer.begin_frame()? {
//!     renderer.begin_render_pass(&target);
//!     // record draws into `target`
//!     renderer.end_render_pass(&target);
//!     renderer.end_frame()?;
//! }
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info};

use kiln_core::RendererConfig;
use kiln_platform::DrawableSurface;
use kiln_rhi::RhiResult;

use crate::backend::{AcquireOutcome, PresentBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    FrameStarted,
    RenderPassActive,
}

/// Drives acquire, record, submit and present over `N` in-flight frames.
pub struct FrameRenderer<B: PresentBackend, S: DrawableSurface> {
    backend: B,
    surface: S,
    frames_in_flight: usize,
    current_frame_index: usize,
    image_index: u32,
    state: FrameState,
    current_target: Option<B::Target>,
    /// A rebuild was requested but has not happened yet.
    rebuild_pending: bool,
    /// The acquired image was suboptimal; rebuild once it is presented.
    rebuild_after_present: bool,
    rebuild_count: u64,
}

impl<B: PresentBackend, S: DrawableSurface> FrameRenderer<B, S> {
    pub fn new(backend: B, surface: S, config: &RendererConfig) -> Self {
        let frames_in_flight = config.frames_in_flight();

        info!(
            "Frame renderer created with {} frames in flight",
            frames_in_flight
        );

        Self {
            backend,
            surface,
            frames_in_flight,
            current_frame_index: 0,
            image_index: 0,
            state: FrameState::Idle,
            current_target: None,
            rebuild_pending: false,
            rebuild_after_present: false,
            rebuild_count: 0,
        }
    }

    /// Starts a frame and returns its recording target.
    ///
    /// Returns `Ok(None)` when no frame can be rendered this call: the surface
    /// was out of date, acquisition timed out, or the drawable is zero-sized.
    /// The caller simply tries again next iteration.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    ///
    /// # Errors
    ///
    /// Returns any acquire, recording or rebuild failure other than the
    /// surface invalidation cases above.
    pub fn begin_frame(&mut self) -> RhiResult<Option<B::Target>> {
        assert!(
            self.state == FrameState::Idle,
            "Can't call begin_frame while already in progress"
        );

        if self.surface.is_degenerate() {
            self.rebuild_pending = true;
            return Ok(None);
        }

        if self.rebuild_pending && !self.rebuild()? {
            return Ok(None);
        }

        let image_index = match self.backend.acquire(self.current_frame_index)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    debug!("Acquired suboptimal image {}", image_index);
                    self.rebuild_after_present = true;
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                debug!("Surface out of date during acquire");
                self.request_rebuild()?;
                return Ok(None);
            }
            AcquireOutcome::Timeout => {
                debug!("Timed out acquiring an image");
                self.request_rebuild()?;
                return Ok(None);
            }
        };

        let target = self.backend.begin_recording(self.current_frame_index)?;

        self.image_index = image_index;
        self.current_target = Some(target.clone());
        self.state = FrameState::FrameStarted;

        Ok(Some(target))
    }

    /// Begins the frame's render pass into the acquired image.
    ///
    /// # Panics
    ///
    /// Panics outside a frame, inside an active render pass, or if `target`
    /// is not the current frame's target.
    pub fn begin_render_pass(&mut self, target: &B::Target) {
        assert!(
            self.state != FrameState::Idle,
            "Can't call begin_render_pass if frame is not in progress"
        );
        assert!(
            self.state != FrameState::RenderPassActive,
            "Can't call begin_render_pass while a render pass is active"
        );
        self.assert_current_target(target, "begin");

        self.backend.begin_render_pass(target, self.image_index);
        self.state = FrameState::RenderPassActive;
    }

    /// Ends the render pass started by [`FrameRenderer::begin_render_pass`].
    ///
    /// # Panics
    ///
    /// Panics if no render pass is active or if `target` is not the current
    /// frame's target.
    pub fn end_render_pass(&mut self, target: &B::Target) {
        assert!(
            self.state == FrameState::RenderPassActive,
            "Can't call end_render_pass without an active render pass"
        );
        self.assert_current_target(target, "end");

        self.backend.end_render_pass(target, self.image_index);
        self.state = FrameState::FrameStarted;
    }

    /// Submits and presents the frame, then advances to the next slot.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or a render pass is still active.
    ///
    /// # Errors
    ///
    /// Returns submit or present failures other than out-of-date and
    /// suboptimal, and any rebuild failure. The frame is finished either way.
    pub fn end_frame(&mut self) -> RhiResult<()> {
        assert!(
            self.state != FrameState::Idle,
            "Can't call end_frame while frame is not in progress"
        );
        assert!(
            self.state != FrameState::RenderPassActive,
            "Can't call end_frame while a render pass is active"
        );

        let outcome = self
            .backend
            .submit_and_present(self.current_frame_index, self.image_index);

        self.state = FrameState::Idle;
        self.current_target = None;
        self.current_frame_index = (self.current_frame_index + 1) % self.frames_in_flight;

        let outcome = outcome?;
        let scheduled = std::mem::take(&mut self.rebuild_after_present);
        let resized = self.surface.take_resize_request();

        if outcome.needs_rebuild() || scheduled || resized {
            debug!(
                "Rebuild after present (outcome: {:?}, scheduled: {}, resized: {})",
                outcome, scheduled, resized
            );
            self.request_rebuild()?;
        }

        Ok(())
    }

    fn assert_current_target(&self, target: &B::Target, action: &str) {
        assert!(
            self.current_target.as_ref() == Some(target),
            "Can't {} a render pass on a target that isn't the current frame's",
            action
        );
    }

    fn request_rebuild(&mut self) -> RhiResult<()> {
        self.rebuild_pending = true;
        self.rebuild()?;
        Ok(())
    }

    /// Rebuilds at the current drawable size, or defers while it is degenerate.
    ///
    /// Returns true if the rebuild happened.
    fn rebuild(&mut self) -> RhiResult<bool> {
        let (width, height) = self.surface.drawable_extent();
        if width == 0 || height == 0 {
            debug!("Deferring surface rebuild until drawable size is valid");
            self.rebuild_pending = true;
            return Ok(false);
        }

        if !self.backend.rebuild((width, height))? {
            // The window can still report its old size while minimizing.
            debug!("Surface extent is degenerate, deferring rebuild");
            self.rebuild_pending = true;
            return Ok(false);
        }

        // The rebuild already used the latest size.
        self.surface.take_resize_request();
        self.rebuild_pending = false;
        self.rebuild_count += 1;

        info!(
            "Surface rebuilt at {}x{} (rebuild #{})",
            width, height, self.rebuild_count
        );

        Ok(true)
    }

    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.state != FrameState::Idle
    }

    /// Slot index of the frame in progress.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(
            self.is_frame_in_progress(),
            "Can't get frame index when frame is not in progress"
        );
        self.current_frame_index
    }

    /// Image index of the most recent successful acquire.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    #[inline]
    pub fn current_target(&self) -> Option<&B::Target> {
        self.current_target.as_ref()
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Surface width over height, or 1.0 while the height is zero.
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.backend.extent();
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        self.backend.extent()
    }

    /// Number of surface rebuilds performed so far.
    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use kiln_platform::ResizeTracker;
    use kiln_rhi::{RhiError, vk};

    use super::*;
    use crate::backend::PresentOutcome;

    /// Backend that replays scripted outcomes and records every call.
    #[derive(Default)]
    struct ScriptedBackend {
        acquires: VecDeque<RhiResult<AcquireOutcome>>,
        presents: VecDeque<PresentOutcome>,
        calls: Vec<String>,
        rebuilds: Vec<(u32, u32)>,
        extent: (u32, u32),
        image_count: u32,
        next_image: u32,
        degenerate_rebuilds: usize,
        failing_recordings: usize,
    }

    impl ScriptedBackend {
        fn new(extent: (u32, u32)) -> Self {
            Self {
                extent,
                image_count: 3,
                ..Default::default()
            }
        }

        fn acquire_calls(&self) -> usize {
            self.calls.iter().filter(|c| c.starts_with("acquire")).count()
        }
    }

    impl PresentBackend for ScriptedBackend {
        type Target = usize;

        fn acquire(&mut self, frame_index: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(format!("acquire {}", frame_index));
            self.acquires.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                Ok(AcquireOutcome::Ready {
                    image_index,
                    suboptimal: false,
                })
            })
        }

        fn begin_recording(&mut self, frame_index: usize) -> RhiResult<usize> {
            self.calls.push(format!("record {}", frame_index));
            if self.failing_recordings > 0 {
                self.failing_recordings -= 1;
                return Err(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
            }
            Ok(frame_index)
        }

        fn begin_render_pass(&mut self, target: &usize, image_index: u32) {
            self.calls.push(format!("begin_pass {} {}", target, image_index));
        }

        fn end_render_pass(&mut self, target: &usize, image_index: u32) {
            self.calls.push(format!("end_pass {} {}", target, image_index));
        }

        fn submit_and_present(
            &mut self,
            frame_index: usize,
            image_index: u32,
        ) -> RhiResult<PresentOutcome> {
            self.calls
                .push(format!("present {} {}", frame_index, image_index));
            Ok(self
                .presents
                .pop_front()
                .unwrap_or(PresentOutcome::Presented))
        }

        fn rebuild(&mut self, extent: (u32, u32)) -> RhiResult<bool> {
            self.calls.push(format!("rebuild {}x{}", extent.0, extent.1));
            if self.degenerate_rebuilds > 0 {
                self.degenerate_rebuilds -= 1;
                return Ok(false);
            }
            self.rebuilds.push(extent);
            self.extent = extent;
            Ok(true)
        }

        fn extent(&self) -> (u32, u32) {
            self.extent
        }
    }

    type TestRenderer = FrameRenderer<ScriptedBackend, ResizeTracker>;

    fn renderer(frames_in_flight: usize) -> TestRenderer {
        let config = RendererConfig::default().with_frames_in_flight(frames_in_flight);
        FrameRenderer::new(
            ScriptedBackend::new((800, 600)),
            ResizeTracker::new(800, 600),
            &config,
        )
    }

    /// Runs one complete frame and returns its slot index.
    fn run_frame(renderer: &mut TestRenderer) -> usize {
        let target = renderer
            .begin_frame()
            .expect("begin_frame failed")
            .expect("expected a frame");
        let index = renderer.frame_index();
        renderer.begin_render_pass(&target);
        renderer.end_render_pass(&target);
        renderer.end_frame().expect("end_frame failed");
        index
    }

    #[test]
    fn test_frame_calls_reach_backend_in_order() {
        let mut renderer = renderer(2);
        run_frame(&mut renderer);

        assert_eq!(
            renderer.backend().calls,
            vec![
                "acquire 0",
                "record 0",
                "begin_pass 0 0",
                "end_pass 0 0",
                "present 0 0"
            ]
        );
        assert!(!renderer.is_frame_in_progress());
        assert_eq!(renderer.rebuild_count(), 0);
    }

    #[test]
    fn test_frame_index_cycles_with_two_frames() {
        let mut renderer = renderer(2);
        let indices: Vec<_> = (0..5).map(|_| run_frame(&mut renderer)).collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_frame_index_cycles_with_three_frames() {
        let mut renderer = renderer(3);
        let indices: Vec<_> = (0..7).map(|_| run_frame(&mut renderer)).collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_frames_in_flight_is_clamped() {
        assert_eq!(renderer(0).frames_in_flight(), 1);
        assert_eq!(renderer(9).frames_in_flight(), 4);
    }

    #[test]
    fn test_target_is_exposed_during_frame() {
        let mut renderer = renderer(2);
        assert!(renderer.current_target().is_none());

        let target = renderer.begin_frame().unwrap().unwrap();
        assert_eq!(renderer.current_target(), Some(&target));

        renderer.end_frame().unwrap();
        assert!(renderer.current_target().is_none());
    }

    #[test]
    fn test_frame_without_render_pass_can_end() {
        let mut renderer = renderer(2);
        renderer.begin_frame().unwrap().unwrap();
        renderer.end_frame().unwrap();
        assert_eq!(renderer.backend().calls.last().unwrap(), "present 0 0");
    }

    #[test]
    #[should_panic(expected = "Can't call begin_frame while already in progress")]
    fn test_begin_frame_twice_panics() {
        let mut renderer = renderer(2);
        renderer.begin_frame().unwrap();
        let _ = renderer.begin_frame();
    }

    #[test]
    #[should_panic(expected = "Can't call end_frame while frame is not in progress")]
    fn test_end_frame_without_begin_panics() {
        let mut renderer = renderer(2);
        let _ = renderer.end_frame();
    }

    #[test]
    #[should_panic(expected = "Can't call end_frame while a render pass is active")]
    fn test_end_frame_inside_render_pass_panics() {
        let mut renderer = renderer(2);
        let target = renderer.begin_frame().unwrap().unwrap();
        renderer.begin_render_pass(&target);
        let _ = renderer.end_frame();
    }

    #[test]
    #[should_panic(expected = "Can't call begin_render_pass if frame is not in progress")]
    fn test_render_pass_outside_frame_panics() {
        let mut renderer = renderer(2);
        renderer.begin_render_pass(&0);
    }

    #[test]
    #[should_panic(expected = "Can't begin a render pass on a target that isn't the current frame's")]
    fn test_render_pass_on_other_target_panics() {
        let mut renderer = renderer(2);
        let target = renderer.begin_frame().unwrap().unwrap();
        renderer.begin_render_pass(&(target + 1));
    }

    #[test]
    #[should_panic(expected = "Can't call end_render_pass without an active render pass")]
    fn test_end_render_pass_without_begin_panics() {
        let mut renderer = renderer(2);
        let target = renderer.begin_frame().unwrap().unwrap();
        renderer.end_render_pass(&target);
    }

    #[test]
    #[should_panic(expected = "Can't get frame index when frame is not in progress")]
    fn test_frame_index_outside_frame_panics() {
        let renderer = renderer(2);
        renderer.frame_index();
    }

    #[test]
    fn test_out_of_date_acquire_rebuilds_and_skips_frame() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .acquires
            .push_back(Ok(AcquireOutcome::OutOfDate));

        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(!renderer.is_frame_in_progress());
        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(renderer.backend().rebuilds, vec![(800, 600)]);

        // Retrying uses the same slot
        assert_eq!(run_frame(&mut renderer), 0);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_degenerate_surface_extent_defers_rebuild() {
        // The drawable still reports 800x600, but the surface is already 0x0.
        let mut renderer = renderer(2);
        renderer.backend_mut().degenerate_rebuilds = 2;
        renderer
            .backend_mut()
            .acquires
            .push_back(Ok(AcquireOutcome::OutOfDate));

        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(!renderer.is_frame_in_progress());
        assert_eq!(renderer.rebuild_count(), 0);
        assert_eq!(renderer.backend().acquire_calls(), 1);

        // Once the surface recovers the pending rebuild runs, then the frame.
        assert_eq!(run_frame(&mut renderer), 0);
        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(renderer.backend().rebuilds, vec![(800, 600)]);
    }

    #[test]
    fn test_degenerate_surface_extent_after_present_is_not_an_error() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .presents
            .push_back(PresentOutcome::OutOfDate);
        renderer.backend_mut().degenerate_rebuilds = 1;

        let target = renderer.begin_frame().unwrap().unwrap();
        renderer.begin_render_pass(&target);
        renderer.end_render_pass(&target);
        assert!(renderer.end_frame().is_ok());
        assert_eq!(renderer.rebuild_count(), 0);

        assert_eq!(run_frame(&mut renderer), 1);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_rebuild_logs_once_at_info() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::{Context, Layer};
        use tracing_subscriber::prelude::*;

        struct InfoCounter(Arc<AtomicUsize>);

        impl<S: Subscriber> Layer<S> for InfoCounter {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                if *event.metadata().level() == Level::INFO {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let infos = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(InfoCounter(infos.clone()));

        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .acquires
            .push_back(Ok(AcquireOutcome::OutOfDate));

        tracing::subscriber::with_default(subscriber, || {
            assert!(renderer.begin_frame().unwrap().is_none());
            assert_eq!(renderer.rebuild_count(), 1);
        });

        assert_eq!(infos.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recording_failure_leaves_slot_reusable() {
        let mut renderer = renderer(2);
        renderer.backend_mut().failing_recordings = 1;

        assert!(renderer.begin_frame().is_err());
        assert!(!renderer.is_frame_in_progress());

        // The same slot is acquired again instead of being skipped or stuck.
        assert_eq!(run_frame(&mut renderer), 0);
        assert_eq!(renderer.backend().acquire_calls(), 2);
    }

    #[test]
    fn test_acquire_timeout_is_treated_as_invalid_surface() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .acquires
            .push_back(Ok(AcquireOutcome::Timeout));

        assert!(renderer.begin_frame().unwrap().is_none());
        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(run_frame(&mut renderer), 0);
    }

    #[test]
    fn test_suboptimal_acquire_rebuilds_after_present() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .acquires
            .push_back(Ok(AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: true,
            }));

        let target = renderer.begin_frame().unwrap().unwrap();
        assert_eq!(renderer.image_index(), 2);
        assert_eq!(renderer.rebuild_count(), 0);

        renderer.begin_render_pass(&target);
        renderer.end_render_pass(&target);
        renderer.end_frame().unwrap();

        assert_eq!(renderer.rebuild_count(), 1);
        let calls = &renderer.backend().calls;
        assert_eq!(calls[calls.len() - 2], "present 0 2");
        assert_eq!(calls[calls.len() - 1], "rebuild 800x600");

        // Only once
        run_frame(&mut renderer);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_out_of_date_present_rebuilds_and_advances() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .presents
            .push_back(PresentOutcome::OutOfDate);

        assert_eq!(run_frame(&mut renderer), 0);
        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(run_frame(&mut renderer), 1);
    }

    #[test]
    fn test_suboptimal_present_rebuilds() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .presents
            .push_back(PresentOutcome::Suboptimal);

        run_frame(&mut renderer);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_resize_notification_rebuilds_at_new_size() {
        let mut renderer = renderer(2);
        run_frame(&mut renderer);

        renderer.surface_mut().resize(1024, 768);
        run_frame(&mut renderer);

        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(renderer.backend().rebuilds, vec![(1024, 768)]);
        assert_eq!(renderer.extent(), (1024, 768));
        assert!((renderer.aspect_ratio() - 4.0 / 3.0).abs() < f32::EPSILON);

        run_frame(&mut renderer);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_zero_size_waits_then_rebuilds_once() {
        let mut renderer = renderer(2);
        run_frame(&mut renderer);

        // Minimized mid-frame
        renderer.begin_frame().unwrap().unwrap();
        renderer.surface_mut().resize(0, 600);
        renderer.end_frame().unwrap();
        assert_eq!(renderer.rebuild_count(), 0);

        let acquires = renderer.backend().acquire_calls();
        for _ in 0..3 {
            assert!(renderer.begin_frame().unwrap().is_none());
        }
        assert_eq!(renderer.backend().acquire_calls(), acquires);
        assert!(renderer.backend().rebuilds.is_empty());

        renderer.surface_mut().resize(640, 480);
        let indices: Vec<_> = (0..3).map(|_| run_frame(&mut renderer)).collect();

        assert_eq!(renderer.rebuild_count(), 1);
        assert_eq!(renderer.backend().rebuilds, vec![(640, 480)]);
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_minimized_before_first_frame_waits() {
        let config = RendererConfig::default();
        let mut renderer = FrameRenderer::new(
            ScriptedBackend::new((800, 600)),
            ResizeTracker::new(0, 0),
            &config,
        );

        assert!(renderer.begin_frame().unwrap().is_none());
        assert_eq!(renderer.backend().acquire_calls(), 0);

        renderer.surface_mut().resize(800, 600);
        run_frame(&mut renderer);
        assert_eq!(renderer.rebuild_count(), 1);
    }

    #[test]
    fn test_acquire_failure_is_returned() {
        let mut renderer = renderer(2);
        renderer
            .backend_mut()
            .acquires
            .push_back(Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)));

        match renderer.begin_frame() {
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)) => {}
            other => panic!("expected device lost, got {:?}", other),
        }
        assert!(!renderer.is_frame_in_progress());
        assert_eq!(renderer.rebuild_count(), 0);
    }

    #[test]
    fn test_aspect_ratio_with_zero_height() {
        let config = RendererConfig::default();
        let renderer = FrameRenderer::new(
            ScriptedBackend::new((800, 0)),
            ResizeTracker::new(800, 0),
            &config,
        );
        assert_eq!(renderer.aspect_ratio(), 1.0);
    }
}
