//! Per-refresh bookkeeping that does not need a GPU.
//!
//! [`FrameDriver::begin_frame`] turns "a drawable of this size is available"
//! into a [`FramePlan`]: whether the depth buffer must be rebuilt, the uniform
//! values for this frame, and the work to encode. `GpuState` executes the plan
//! and reports back through [`FrameDriver::finish_frame`].

use crate::gpu::FrameUniforms;

/// Animation clock advanced by a fixed step per refresh.
///
/// Animation speed therefore follows the achieved frame rate rather than wall
/// time.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: f64,
    elapsed: f64,
    ticks: u64,
}

impl FrameClock {
    pub fn new(refresh_rate: u32) -> Self {
        Self {
            step: 1.0 / f64::from(refresh_rate.max(1)),
            elapsed: 0.0,
            ticks: 0,
        }
    }

    /// Advances one refresh and returns the new time in seconds.
    pub fn advance(&mut self) -> f32 {
        self.ticks += 1;
        self.elapsed = self.ticks as f64 * self.step;
        self.elapsed as f32
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Pointer position fed to the shaders, in window coordinates.
///
/// Only a press or a drag with the button held moves it; hovering does not.
#[derive(Debug, Clone)]
pub struct PointerState {
    position: [f32; 2],
    cursor: Option<[f32; 2]>,
    pressed: bool,
}

impl PointerState {
    pub fn new(initial: [f32; 2]) -> Self {
        Self {
            position: initial,
            cursor: None,
            pressed: false,
        }
    }

    /// Starts at the centre of a surface of `size`.
    pub fn centred(size: (u32, u32)) -> Self {
        Self::new([size.0 as f32 * 0.5, size.1 as f32 * 0.5])
    }

    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        let point = [x as f32, y as f32];
        self.cursor = Some(point);
        if self.pressed {
            self.position = point;
        }
    }

    pub fn handle_button(&mut self, pressed: bool) {
        self.pressed = pressed;
        if pressed {
            if let Some(point) = self.cursor {
                self.position = point;
            }
        }
    }

    /// Press at an explicit location.
    pub fn press_at(&mut self, x: f64, y: f64) {
        self.cursor = Some([x as f32, y as f32]);
        self.handle_button(true);
    }

    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// Device limits that bound the compute workgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeLimits {
    pub max_invocations: u32,
    pub max_size_x: u32,
    pub max_size_y: u32,
}

impl From<&wgpu::Limits> for ComputeLimits {
    fn from(limits: &wgpu::Limits) -> Self {
        Self {
            max_invocations: limits.max_compute_invocations_per_workgroup,
            max_size_x: limits.max_compute_workgroup_size_x,
            max_size_y: limits.max_compute_workgroup_size_y,
        }
    }
}

impl Default for ComputeLimits {
    fn default() -> Self {
        Self::from(&wgpu::Limits::default())
    }
}

/// Two-dimensional compute workgroup size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Width is the execution width, height fills the remaining invocations.
    pub fn from_limits(execution_width: u32, limits: ComputeLimits) -> Self {
        let max_invocations = limits.max_invocations.max(1);
        let x = execution_width
            .max(1)
            .min(limits.max_size_x.max(1))
            .min(max_invocations);
        let y = (max_invocations / x).clamp(1, limits.max_size_y.max(1));
        Self { x, y }
    }

    /// Workgroups covering a `width` x `height` grid, rounded up.
    pub fn dispatch(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.x), height.div_ceil(self.y))
    }

    /// `#define`s consumed by the compute shader's `local_size` layout.
    pub fn defines(&self) -> [(&'static str, String); 2] {
        [
            ("CROSSMAP_WORKGROUP_X", self.x.to_string()),
            ("CROSSMAP_WORKGROUP_Y", self.y.to_string()),
        ]
    }
}

/// How each frame reaches the drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPath {
    Compute(WorkgroupSize),
    Raster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWork {
    Dispatch { workgroups: (u32, u32) },
    /// Full-screen triangle strip.
    Draw { vertex_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub size: (u32, u32),
    /// The drawable size changed since the last frame.
    pub rebuild_depth: bool,
    pub uniforms: FrameUniforms,
    pub work: FrameWork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    InFlight,
}

#[derive(Debug, Clone)]
pub struct FrameDriver {
    clock: FrameClock,
    pointer: PointerState,
    path: DrawPath,
    depth_size: Option<(u32, u32)>,
    phase: FramePhase,
    submitted: u64,
}

impl FrameDriver {
    pub fn new(refresh_rate: u32, pointer: PointerState, path: DrawPath) -> Self {
        Self {
            clock: FrameClock::new(refresh_rate),
            pointer,
            path,
            depth_size: None,
            phase: FramePhase::Idle,
            submitted: 0,
        }
    }

    /// Plans a frame for a drawable of `drawable` size.
    ///
    /// Returns `None` and leaves every piece of state untouched when there is
    /// no drawable, when it has a zero dimension, or while a frame is in flight.
    pub fn begin_frame(&mut self, drawable: Option<(u32, u32)>) -> Option<FramePlan> {
        let size = drawable.filter(|(width, height)| *width > 0 && *height > 0)?;
        if self.phase == FramePhase::InFlight {
            tracing::warn!("frame requested while the previous one is still in flight");
            return None;
        }

        let rebuild_depth = self.depth_size != Some(size);
        if rebuild_depth {
            tracing::debug!(width = size.0, height = size.1, "drawable size changed");
            self.depth_size = Some(size);
        }

        let time = self.clock.advance();
        let uniforms = FrameUniforms::new(size, self.pointer.position(), time);
        let work = match self.path {
            DrawPath::Compute(workgroup) => FrameWork::Dispatch {
                workgroups: workgroup.dispatch(size.0, size.1),
            },
            DrawPath::Raster => FrameWork::Draw { vertex_count: 4 },
        };

        self.phase = FramePhase::InFlight;
        Some(FramePlan {
            size,
            rebuild_depth,
            uniforms,
            work,
        })
    }

    /// Marks the planned frame as submitted and presented.
    pub fn finish_frame(&mut self) {
        if self.phase == FramePhase::InFlight {
            self.phase = FramePhase::Idle;
            self.submitted += 1;
        }
    }

    pub fn frames_submitted(&self) -> u64 {
        self.submitted
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn pointer_mut(&mut self) -> &mut PointerState {
        &mut self.pointer
    }

    pub fn depth_size(&self) -> Option<(u32, u32)> {
        self.depth_size
    }
}
