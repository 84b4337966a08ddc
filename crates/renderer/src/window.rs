use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{error, info};
use winit::dpi::{LogicalPosition, LogicalSize, PhysicalPosition};
use winit::event::{Event, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::gpu::GpuState;
use crate::pointer::TouchPoint;
use crate::program::BuildReport;
use crate::runtime::{FrameScheduler, RenderState, SystemTimeSource};
use crate::types::RendererConfig;
use crate::viewport::{ViewportDimensions, WindowMetrics};

/// Window, GPU backend, and scheduler for the interactive path.
struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
    scheduler: FrameScheduler<SystemTimeSource>,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig, report: BuildReport) -> Result<Self> {
        let metrics = WindowMetrics::from_physical(window.inner_size(), window.scale_factor());
        let viewport = ViewportDimensions::from_metrics(metrics);

        let BuildReport {
            program, uniforms, ..
        } = report;
        let (mut gpu, pipeline_error) = GpuState::new(
            window.clone(),
            viewport,
            program.as_ref(),
            uniforms.block().len(),
            config.antialiasing,
            config.color_space,
        )?;
        if pipeline_error.is_some() {
            error!("GPU rejected the program; frames will only be cleared");
        }

        let program_ready = program.is_some() && gpu.has_pipeline();
        let state = RenderState::new(uniforms, program_ready, config.pointer_device);
        let mut scheduler = FrameScheduler::new(state, SystemTimeSource::new());
        scheduler.state_mut().resize(metrics, &mut gpu);

        Ok(Self {
            window,
            gpu,
            scheduler,
        })
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    fn logical(&self, position: PhysicalPosition<f64>) -> TouchPoint {
        let LogicalPosition { x, y } = position.to_logical::<f64>(self.window.scale_factor());
        TouchPoint::new(x, y)
    }

    fn sync_viewport(&mut self) {
        let metrics =
            WindowMetrics::from_physical(self.window.inner_size(), self.window.scale_factor());
        self.scheduler.state_mut().resize(metrics, &mut self.gpu);
    }

    fn handle_touch(&mut self, touch: Touch) {
        let point = self.logical(touch.location);
        let state = self.scheduler.state_mut();
        match touch.phase {
            TouchPhase::Started | TouchPhase::Moved => state.touch_moved(touch.id, point),
            TouchPhase::Ended | TouchPhase::Cancelled => state.touch_ended(touch.id),
        }
    }
}

/// Opens the window and renders until it closes.
pub(crate) fn run_window(config: &RendererConfig, report: BuildReport) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(LogicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config, report)
        .map_err(|err| anyhow!("failed to initialise window renderer: {err}"))?;
    info!(
        width = state.window().inner_size().width,
        height = state.window().inner_size().height,
        scale_factor = state.window().scale_factor(),
        "window ready"
    );

    let cancel = state.scheduler.cancel_token();
    state.scheduler.start();
    state.window().request_redraw();

    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        cancel.stop();
                        elwt.exit();
                    }
                    WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                        state.sync_viewport();
                        if state.scheduler.wants_frame() {
                            state.window().request_redraw();
                        }
                    }
                    WindowEvent::Touch(touch) => state.handle_touch(touch),
                    WindowEvent::CursorMoved { position, .. } => {
                        let point = state.logical(position);
                        state.scheduler.state_mut().cursor_moved(point);
                    }
                    WindowEvent::CursorLeft { .. } => {
                        state.scheduler.state_mut().cursor_left();
                    }
                    WindowEvent::RedrawRequested => {
                        if !state.scheduler.wants_frame() {
                            return;
                        }
                        if let Err(err) = state.scheduler.frame(&mut state.gpu) {
                            error!("rendering stopped: {err:#}");
                            result = Err(err);
                            cancel.stop();
                            elwt.exit();
                            return;
                        }
                        if state.scheduler.wants_frame() {
                            state.window().request_redraw();
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    });

    if let Err(err) = run_result {
        result = Err(anyhow!("window event loop error: {err}"));
    }
    info!(frames = state.scheduler.frames(), "window closed");
    result
}
