//! Cubemap renderer built on `wgpu` and `winit`.
//!
//! Six face images are loaded, turned into a cube texture, and drawn every
//! display refresh by one of three variants:
//!
//! ```text
//!   RendererConfig
//!        │
//!        ▼
//!   assets::load_source ──▶ PipelineBuilder ──▶ compositor (once, blocking)
//!                                                     │
//!                                                     ▼
//!                       winit loop ──▶ FrameDriver::begin_frame ──▶ GpuState::render
//! ```
//!
//! The compute variant writes every pixel from a compute shader, the raster
//! variants draw a full-screen quad that samples the cube. Only the skybox
//! variant skips the compositing pass and uploads the faces directly.
//! [`check`] runs the same loading and shader compilation steps without a
//! window or GPU.

pub mod assets;
pub mod compile;
pub mod frame;
mod gpu;
mod types;
mod window;

use anyhow::{Context, Result};

pub use assets::{
    default_face_names, load_faces, load_source, load_strip, AssetError, CubeFace, FaceFormat,
    FaceImage, FaceSet, LoadOptions,
};
pub use compile::{GlslVersion, PreparedShader, ShaderError, ShaderLibrary};
pub use frame::{
    ComputeLimits, FrameClock, FrameDriver, FramePlan, FrameWork, PointerState, WorkgroupSize,
};
pub use gpu::FrameUniforms;
pub use types::{
    CubeSource, RenderVariant, RendererConfig, ShaderNames, DEFAULT_EXECUTION_WIDTH,
    DEFAULT_REFRESH_RATE, DEFAULT_SHADING_LANGUAGE,
};

/// Entry point that owns the configuration and opens the window.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Blocks until the window is closed or a fatal error occurs.
    pub fn run(&self) -> Result<()> {
        tracing::info!(
            variant = %self.config.variant,
            source = %self.config.cube_source,
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            "starting renderer"
        );
        window::run_window(&self.config)
    }
}

/// Outcome of a successful [`check`].
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub edge: u32,
    pub format: FaceFormat,
    pub version: GlslVersion,
    pub shaders: Vec<String>,
}

/// Loads the faces and compiles every shader the variant needs, GPU-free.
///
/// Compute shaders are compiled with the workgroup size derived from
/// `wgpu`'s default limits, which every adapter meets.
pub fn check(config: &RendererConfig) -> Result<CheckReport> {
    let faces = load_source(
        &config.cube_source,
        LoadOptions {
            flip_vertical: config.flip_vertical,
        },
    )
    .with_context(|| format!("failed to load cubemap ({})", config.cube_source))?;

    let library = ShaderLibrary::new(config.shader_directory.clone(), &config.shading_language)
        .context("invalid shader configuration")?;
    let workgroup = WorkgroupSize::from_limits(config.execution_width, ComputeLimits::default());
    let workgroup_defines = workgroup.defines();

    let mut shaders = Vec::new();
    for name in config.shader_names.required_by(config.variant) {
        let defines: &[(&str, String)] = if name == config.shader_names.compute {
            &workgroup_defines
        } else {
            &[]
        };
        let prepared = library
            .prepare(name, defines)
            .with_context(|| format!("failed to prepare shader '{name}'"))?;
        compile::validate(&prepared)?;
        tracing::debug!(shader = name, stage = ?prepared.stage, "shader validated");
        shaders.push(name.to_string());
    }

    Ok(CheckReport {
        edge: faces.edge(),
        format: faces.format(),
        version: library.version(),
        shaders,
    })
}
