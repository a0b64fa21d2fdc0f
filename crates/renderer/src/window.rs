use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use tracing::{debug, error, info, warn};

use crate::gpu::GpuState;
use crate::types::RendererConfig;

/// A window plus the GPU state drawing into it.
pub(crate) struct WindowState {
    window: Arc<Window>,
    gpu: GpuState,
}

impl WindowState {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(window.as_ref(), size, config)?;
        Ok(Self { window, gpu })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.gpu
            .pointer_mut()
            .handle_cursor_moved(position.x, position.y);
    }

    fn handle_mouse_button(&mut self, state: ElementState) {
        self.gpu
            .pointer_mut()
            .handle_button(state == ElementState::Pressed);
    }
}

/// Opens the window and drives one frame per display refresh until closed.
pub(crate) fn run_window(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window, config)?;
    state.window().request_redraw();

    let mut exit_error: Option<anyhow::Error> = None;
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);

        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        state.handle_cursor_moved(position);
                    }
                    WindowEvent::MouseInput {
                        state: button_state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        state.handle_mouse_button(button_state);
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                    }
                    WindowEvent::RedrawRequested => match state.gpu.render() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            debug!("surface lost or outdated; reconfiguring");
                            state.gpu.reconfigure();
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting");
                            exit_error = Some(anyhow!("surface out of memory"));
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            debug!("surface timeout; skipping frame");
                        }
                        Err(other) => {
                            warn!("surface error: {other:?}; skipping frame");
                        }
                    },
                    _ => {}
                }
            }
            // Vsync paces presentation, so asking for the next frame here
            // yields one redraw per display refresh.
            Event::AboutToWait => {
                state.window().request_redraw();
            }
            Event::LoopExiting => {
                info!(frames = state.gpu.frames_submitted(), "render loop finished");
            }
            _ => {}
        }
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match exit_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
