use anyhow::{Context, Result};

use crate::compile::{create_module, ShaderLibrary};
use crate::frame::WorkgroupSize;
use crate::types::ShaderNames;

use super::targets::{DEPTH_FORMAT, STORAGE_FORMAT};

/// Writes all six cube faces, one instance per face.
pub(crate) struct OffscreenPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub faces_layout: wgpu::BindGroupLayout,
}

/// Full-screen quad sampling the cube, depth-tested against the far plane.
pub(crate) struct OnscreenPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub cube_layout: wgpu::BindGroupLayout,
}

/// Per-pixel compute pass writing into a storage texture.
pub(crate) struct ComputeStage {
    pub pipeline: wgpu::ComputePipeline,
    pub io_layout: wgpu::BindGroupLayout,
    pub workgroup: WorkgroupSize,
}

/// Copies the intermediate compute output onto the surface.
pub(crate) struct BlitPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub source_layout: wgpu::BindGroupLayout,
}

/// Compiles named shaders into pipelines, failing on the first error.
///
/// Every module and pipeline is created inside a validation error scope so a
/// bad shader surfaces here as an `Err` instead of a deferred device error.
pub(crate) struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    library: &'a ShaderLibrary,
    names: &'a ShaderNames,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(device: &'a wgpu::Device, library: &'a ShaderLibrary, names: &'a ShaderNames) -> Self {
        Self {
            device,
            library,
            names,
        }
    }

    pub(crate) fn checked<T>(&self, label: &str, build: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build();
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::error!(label, "GPU validation failed");
            anyhow::bail!("{label} failed validation: {err}");
        }
        Ok(value)
    }

    fn module(&self, name: &str, defines: &[(&str, String)]) -> Result<wgpu::ShaderModule> {
        let prepared = self
            .library
            .prepare(name, defines)
            .with_context(|| format!("failed to prepare shader '{name}'"))?;
        let module = self.checked(&format!("shader '{name}'"), || {
            create_module(self.device, &prepared)
        })?;
        tracing::debug!(shader = name, stage = ?prepared.stage, "compiled shader");
        Ok(module)
    }

    /// Layout shared by every stage that reads `FrameUniforms`.
    pub fn uniform_layout(&self) -> wgpu::BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frame uniforms layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT
                        | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            })
    }

    pub fn offscreen(&self, format: wgpu::TextureFormat) -> Result<OffscreenPipeline> {
        let vertex = self.module(&self.names.offscreen_vertex, &[])?;
        let fragment = self.module(&self.names.offscreen_fragment, &[])?;
        let faces_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cube faces layout"),
                entries: &[
                    texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2Array,
                    ),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("offscreen pipeline layout"),
                bind_group_layouts: &[&faces_layout],
                push_constant_ranges: &[],
            });
        let pipeline = self.checked("offscreen pipeline", || {
            self.quad_pipeline("offscreen pipeline", &layout, &vertex, &fragment, format, None)
        })?;
        Ok(OffscreenPipeline {
            pipeline,
            faces_layout,
        })
    }

    pub fn onscreen(
        &self,
        surface_format: wgpu::TextureFormat,
        uniform_layout: &wgpu::BindGroupLayout,
    ) -> Result<OnscreenPipeline> {
        let vertex = self.module(&self.names.onscreen_vertex, &[])?;
        let fragment = self.module(&self.names.onscreen_fragment, &[])?;
        let cube_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("cube sample layout"),
                entries: &[
                    texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::Cube,
                    ),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("onscreen pipeline layout"),
                bind_group_layouts: &[uniform_layout, &cube_layout],
                push_constant_ranges: &[],
            });
        let depth = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };
        let pipeline = self.checked("onscreen pipeline", || {
            self.quad_pipeline(
                "onscreen pipeline",
                &layout,
                &vertex,
                &fragment,
                surface_format,
                Some(depth),
            )
        })?;
        Ok(OnscreenPipeline {
            pipeline,
            cube_layout,
        })
    }

    pub fn compute(
        &self,
        workgroup: WorkgroupSize,
        uniform_layout: &wgpu::BindGroupLayout,
    ) -> Result<ComputeStage> {
        let module = self.module(&self.names.compute, &workgroup.defines())?;
        let io_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("compute io layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: STORAGE_FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                    texture_entry(
                        1,
                        wgpu::ShaderStages::COMPUTE,
                        wgpu::TextureViewDimension::Cube,
                    ),
                    sampler_entry(2, wgpu::ShaderStages::COMPUTE),
                ],
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("compute pipeline layout"),
                bind_group_layouts: &[uniform_layout, &io_layout],
                push_constant_ranges: &[],
            });
        let pipeline = self.checked("compute pipeline", || {
            self.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("compute pipeline"),
                    layout: Some(&layout),
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                })
        })?;
        tracing::debug!(x = workgroup.x, y = workgroup.y, "compute workgroup size");
        Ok(ComputeStage {
            pipeline,
            io_layout,
            workgroup,
        })
    }

    pub fn blit(&self, surface_format: wgpu::TextureFormat) -> Result<BlitPipeline> {
        let vertex = self.module(&self.names.onscreen_vertex, &[])?;
        let fragment = self.module(&self.names.blit_fragment, &[])?;
        let source_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("blit source layout"),
                entries: &[
                    texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2,
                    ),
                    sampler_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blit pipeline layout"),
                bind_group_layouts: &[&source_layout],
                push_constant_ranges: &[],
            });
        let pipeline = self.checked("blit pipeline", || {
            self.quad_pipeline(
                "blit pipeline",
                &layout,
                &vertex,
                &fragment,
                surface_format,
                None,
            )
        })?;
        Ok(BlitPipeline {
            pipeline,
            source_layout,
        })
    }

    fn quad_pipeline(
        &self,
        label: &str,
        layout: &wgpu::PipelineLayout,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        depth_stencil: Option<wgpu::DepthStencilState>,
    ) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
    }
}

fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
