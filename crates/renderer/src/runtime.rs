//! Frame scheduling.
//!
//! [`FrameScheduler`] owns the [`RenderState`] and turns each frame callback
//! into exactly one [`FrameSubmission`] for a [`RenderBackend`]. Time comes
//! from a [`TimeSource`] so tests can drive frames without a display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::geometry::QUAD_VERTEX_COUNT;
use crate::pointer::{ActiveTouches, PointerDevice, PointerTracker, TouchPoint};
use crate::uniforms::{UniformChannel, UniformSet};
use crate::viewport::{ViewportChange, ViewportDimensions, ViewportManager, WindowMetrics};

/// Snapshot of the time state supplied to a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// High-resolution timestamp in milliseconds since the loop started.
    pub millis: f64,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(millis: f64, frame_index: u64) -> Self {
        Self {
            millis,
            frame_index,
        }
    }

    pub fn seconds(&self) -> f32 {
        (self.millis / 1000.0) as f32
    }
}

/// Abstraction over where frame timestamps originate from.
pub trait TimeSource {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
///
/// The first sample after a reset reports exactly zero.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Option<Instant>,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: None,
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = None;
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let millis = match self.origin {
            Some(origin) => origin.elapsed().as_secs_f64() * 1000.0,
            None => {
                self.origin = Some(Instant::now());
                0.0
            }
        };
        let sample = TimeSample::new(millis, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Shared flag that ends the render loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder of the token to stop after the current frame.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::stop`] has been called since the last start.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn rearm(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A single non-indexed triangle-list draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub first_vertex: u32,
    pub vertex_count: u32,
}

impl DrawCall {
    pub fn fullscreen_quad() -> Self {
        Self {
            first_vertex: 0,
            vertex_count: QUAD_VERTEX_COUNT,
        }
    }
}

/// Everything a backend needs to produce one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmission<'a> {
    pub frame_index: u64,
    pub clear_color: [f64; 4],
    pub viewport: ViewportDimensions,
    pub uniforms: &'a [u8],
    /// `None` when no linked program is available; the frame is only cleared.
    pub draw: Option<DrawCall>,
}

/// Consumer of frame submissions, implemented by the GPU state.
pub trait RenderBackend {
    /// Resizes the backing surface.
    fn resize(&mut self, viewport: ViewportDimensions);
    /// Clears, draws, and presents one frame.
    fn submit(&mut self, frame: &FrameSubmission<'_>) -> Result<()>;
}

/// All mutable rendering state, owned by the scheduler.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub viewport: ViewportManager,
    pub pointers: PointerTracker,
    pub touches: ActiveTouches,
    pub uniforms: UniformChannel,
    pub program_ready: bool,
}

impl RenderState {
    pub fn new(
        uniforms: UniformChannel,
        program_ready: bool,
        pointer_device: PointerDevice,
    ) -> Self {
        Self {
            viewport: ViewportManager::new(),
            pointers: PointerTracker::new(pointer_device),
            touches: ActiveTouches::new(),
            uniforms,
            program_ready,
        }
    }

    /// Recomputes the viewport and resizes the backend when it changed.
    pub fn resize(
        &mut self,
        metrics: WindowMetrics,
        backend: &mut dyn RenderBackend,
    ) -> ViewportChange {
        let change = self.viewport.resize(metrics);
        if let ViewportChange::Resized(dimensions) = change {
            backend.resize(dimensions);
        }
        change
    }

    /// A finger touched down or moved.
    pub fn touch_moved(&mut self, id: u64, point: TouchPoint) {
        let touches = self.touches.update(id, point);
        self.pointers
            .set_from_touches(&touches, &self.viewport.dimensions());
    }

    /// A finger lifted or its touch was cancelled.
    pub fn touch_ended(&mut self, id: u64) {
        self.touches.remove(id);
        self.pointers.handle_touch_end();
    }

    pub fn cursor_moved(&mut self, point: TouchPoint) {
        let viewport = self.viewport.dimensions();
        self.pointers.handle_mouse_move(point, &viewport);
    }

    pub fn cursor_left(&mut self) {
        let viewport = self.viewport.dimensions();
        self.pointers.handle_mouse_leave(&viewport);
    }
}

/// Outcome of one frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub time: f32,
    pub drew: bool,
}

/// Counts frames per second of animation time for debug logging.
#[derive(Debug, Clone, Default)]
struct FrameStats {
    window_start_ms: f64,
    frames: u32,
}

impl FrameStats {
    fn record(&mut self, millis: f64) -> Option<f64> {
        self.frames += 1;
        let elapsed = millis - self.window_start_ms;
        if elapsed < 1000.0 {
            return None;
        }
        let fps = f64::from(self.frames) * 1000.0 / elapsed;
        self.frames = 0;
        self.window_start_ms = millis;
        Some(fps)
    }
}

/// Run loop that turns timestamps from `T` into one submission per frame.
///
/// Cancellation goes through a [`CancelToken`] so the host can stop the loop
/// from an event handler.
pub struct FrameScheduler<T: TimeSource = SystemTimeSource> {
    state: RenderState,
    time_source: T,
    cancel: CancelToken,
    frames: u64,
    last_time: f32,
    stats: FrameStats,
}

impl<T: TimeSource> FrameScheduler<T> {
    pub fn new(state: RenderState, time_source: T) -> Self {
        Self {
            state,
            time_source,
            cancel: CancelToken::new(),
            frames: 0,
            last_time: 0.0,
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Begins a fresh sequence of frames starting at timestamp zero.
    pub fn start(&mut self) {
        self.time_source.reset();
        self.cancel.rearm();
        self.frames = 0;
        self.last_time = 0.0;
        self.stats = FrameStats::default();
        tracing::debug!("frame scheduler started");
    }

    pub fn stop(&self) {
        self.cancel.stop();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_stopped()
    }

    /// Whether the host should schedule another frame callback.
    ///
    /// An empty viewport (a minimized window) presents nothing, so nothing
    /// paces the loop; the host waits for a resize instead.
    pub fn wants_frame(&self) -> bool {
        self.is_running() && !self.state.viewport.dimensions().is_empty()
    }

    /// Runs one frame callback: push uniforms, then clear and draw once.
    pub fn frame(&mut self, backend: &mut dyn RenderBackend) -> Result<FrameOutcome> {
        let sample = self.time_source.sample();
        let time = sample.seconds().max(self.last_time);
        self.last_time = time;

        let viewport = self.state.viewport.dimensions();
        let set = UniformSet {
            time,
            resolution: viewport.resolution(),
            pointers: self.state.pointers.slots(),
        };
        self.state.uniforms.push_frame(&set);

        let draw = self.state.program_ready.then(DrawCall::fullscreen_quad);
        let submission = FrameSubmission {
            frame_index: self.frames,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            viewport,
            uniforms: self.state.uniforms.block().as_bytes(),
            draw,
        };
        backend.submit(&submission)?;

        let outcome = FrameOutcome {
            frame_index: self.frames,
            time,
            drew: draw.is_some(),
        };
        self.frames += 1;
        if let Some(fps) = self.stats.record(sample.millis) {
            tracing::debug!(
                fps = fps.round(),
                frame_count = self.frames,
                time,
                pointers = self.state.pointers.active().len(),
                "render stats"
            );
        }
        tracing::trace!(frame = outcome.frame_index, time, "frame submitted");
        Ok(outcome)
    }

    /// Drives frames back to back until the cancel token is stopped.
    ///
    /// Returns the number of frames produced.
    pub fn run(&mut self, backend: &mut dyn RenderBackend) -> Result<u64> {
        self.start();
        while self.is_running() {
            self.frame(backend)?;
        }
        tracing::debug!(frames = self.frames, "frame scheduler stopped");
        Ok(self.frames)
    }
}
