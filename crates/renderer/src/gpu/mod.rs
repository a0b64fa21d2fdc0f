//! GPU side of the renderer.
//!
//! - `context` owns the wgpu instance, device and surface and reconfigures the
//!   swapchain on resize.
//! - `cubemap` creates the cube texture, either as a render target or straight
//!   from decoded faces, and the 2D-array texture holding the source faces.
//! - `pipeline` compiles named GLSL shaders into the offscreen, onscreen,
//!   compute and blit pipelines inside validation error scopes.
//! - `compositor` runs the one-time layered pass that fills the cube.
//! - `targets` holds the depth buffer and intermediate compute output that
//!   follow the drawable size.
//! - `state` is the composition root: it builds all of the above at startup
//!   and executes one `FramePlan` per refresh.

mod compositor;
mod context;
mod cubemap;
mod pipeline;
mod state;
mod targets;
mod uniforms;

pub(crate) use state::GpuState;
pub use uniforms::FrameUniforms;
