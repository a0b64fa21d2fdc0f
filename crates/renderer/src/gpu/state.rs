use std::iter;

use anyhow::{Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};
use winit::dpi::PhysicalSize;

use crate::assets::{load_source, LoadOptions};
use crate::compile::ShaderLibrary;
use crate::frame::{DrawPath, FrameDriver, FramePlan, FrameWork, PointerState, WorkgroupSize};
use crate::types::{RenderVariant, RendererConfig};

use super::compositor::composite;
use super::context::GpuContext;
use super::cubemap::{ensure_edge_fits, CubeTexture};
use super::pipeline::{BlitPipeline, ComputeStage, OnscreenPipeline, PipelineBuilder};
use super::targets::{DepthBuffer, StorageTarget};
use super::uniforms::FrameUniforms;

enum FramePipeline {
    Raster {
        pipeline: OnscreenPipeline,
        cube_bind_group: wgpu::BindGroup,
    },
    Compute {
        stage: ComputeStage,
        /// Present when the surface cannot be written from compute.
        blit: Option<BlitPipeline>,
    },
}

/// Owns every GPU resource for one window and executes frame plans.
pub(crate) struct GpuState {
    context: GpuContext,
    cube: CubeTexture,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    frame_pipeline: FramePipeline,
    depth: Option<DepthBuffer>,
    storage: Option<StorageTarget>,
    driver: FrameDriver,
}

impl GpuState {
    /// Loads the faces, builds every pipeline and the cube texture.
    ///
    /// All of this happens before the first frame; any failure aborts startup.
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        config: &RendererConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let variant = config.variant;
        let library = ShaderLibrary::new(config.shader_directory.clone(), &config.shading_language)
            .context("invalid shader configuration")?;
        let faces = load_source(
            &config.cube_source,
            LoadOptions {
                flip_vertical: config.flip_vertical,
            },
        )
        .with_context(|| format!("failed to load cubemap ({})", config.cube_source))?;

        let context = GpuContext::new(target, size, variant.uses_compute())?;
        let builder = PipelineBuilder::new(&context.device, &library, &config.shader_names);
        let uniform_layout = builder.uniform_layout();

        ensure_edge_fits(faces.edge(), &context.device.limits())?;
        let cube = if variant.composites() {
            let offscreen = builder.offscreen(faces.format().texture_format())?;
            builder.checked("cube composite", || {
                composite(&context.device, &context.queue, &offscreen, &faces)
            })??
        } else {
            let cube = builder.checked("cube upload", || {
                CubeTexture::upload(&context.device, &context.queue, &faces)
            })?;
            info!(edge = cube.edge, format = ?cube.format, "cube texture uploaded");
            cube
        };

        let frame_pipeline = match variant {
            RenderVariant::ComputePostProcess => {
                let workgroup =
                    WorkgroupSize::from_limits(config.execution_width, context.compute_limits);
                let stage = builder.compute(workgroup, &uniform_layout)?;
                let blit = if context.storage_output {
                    None
                } else {
                    Some(builder.blit(context.surface_format)?)
                };
                FramePipeline::Compute { stage, blit }
            }
            RenderVariant::RasterCubeSample | RenderVariant::RasterSkybox => {
                let pipeline = builder.onscreen(context.surface_format, &uniform_layout)?;
                let cube_bind_group =
                    context
                        .device
                        .create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some("cube sample bind group"),
                            layout: &pipeline.cube_layout,
                            entries: &[
                                wgpu::BindGroupEntry {
                                    binding: 0,
                                    resource: wgpu::BindingResource::TextureView(&cube.view),
                                },
                                wgpu::BindGroupEntry {
                                    binding: 1,
                                    resource: wgpu::BindingResource::Sampler(&cube.sampler),
                                },
                            ],
                        });
                FramePipeline::Raster {
                    pipeline,
                    cube_bind_group,
                }
            }
        };

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: FrameUniforms::size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame uniforms bind group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let path = match &frame_pipeline {
            FramePipeline::Compute { stage, .. } => DrawPath::Compute(stage.workgroup),
            FramePipeline::Raster { .. } => DrawPath::Raster,
        };
        let driver = FrameDriver::new(
            config.refresh_rate,
            PointerState::centred((context.size.width, context.size.height)),
            path,
        );
        info!(%variant, refresh_rate = config.refresh_rate, "renderer ready");

        Ok(Self {
            context,
            cube,
            uniform_buffer,
            uniform_bind_group,
            frame_pipeline,
            depth: None,
            storage: None,
            driver,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    pub(crate) fn pointer_mut(&mut self) -> &mut PointerState {
        self.driver.pointer_mut()
    }

    pub(crate) fn frames_submitted(&self) -> u64 {
        self.driver.frames_submitted()
    }

    /// Renders one frame if a drawable is available.
    ///
    /// Surface errors are returned before any state changes so the caller can
    /// skip the refresh.
    pub(crate) fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let size = (frame.texture.width(), frame.texture.height());
        let Some(plan) = self.driver.begin_frame(Some(size)) else {
            return Ok(());
        };

        if plan.rebuild_depth {
            self.rebuild_targets(plan.size);
        }
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&plan.uniforms),
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        self.encode(&mut encoder, &view, &plan);

        self.context.queue.submit(iter::once(encoder.finish()));
        frame.present();
        self.driver.finish_frame();
        Ok(())
    }

    fn rebuild_targets(&mut self, size: (u32, u32)) {
        match &self.frame_pipeline {
            FramePipeline::Raster { .. } => {
                self.depth = Some(DepthBuffer::new(&self.context.device, size));
            }
            FramePipeline::Compute { blit: Some(_), .. } => {
                self.storage = Some(StorageTarget::new(&self.context.device, size));
            }
            FramePipeline::Compute { blit: None, .. } => {}
        }
        debug!(width = size.0, height = size.1, "rebuilt size-dependent targets");
    }

    fn encode(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, plan: &FramePlan) {
        match (&self.frame_pipeline, plan.work) {
            (
                FramePipeline::Raster {
                    pipeline,
                    cube_bind_group,
                },
                FrameWork::Draw { vertex_count },
            ) => {
                let Some(depth) = self.depth.as_ref() else {
                    warn!("depth buffer missing; skipping draw");
                    return;
                };
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("onscreen pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Discard,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&pipeline.pipeline);
                pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                pass.set_bind_group(1, cube_bind_group, &[]);
                pass.draw(0..vertex_count, 0..1);
            }
            (FramePipeline::Compute { stage, blit }, FrameWork::Dispatch { workgroups }) => {
                let output = match (blit, self.storage.as_ref()) {
                    (None, _) => view,
                    (Some(_), Some(storage)) => &storage.view,
                    (Some(_), None) => {
                        warn!("compute output target missing; skipping dispatch");
                        return;
                    }
                };
                let io_bind_group =
                    self.context
                        .device
                        .create_bind_group(&wgpu::BindGroupDescriptor {
                            label: Some("compute io bind group"),
                            layout: &stage.io_layout,
                            entries: &[
                                wgpu::BindGroupEntry {
                                    binding: 0,
                                    resource: wgpu::BindingResource::TextureView(output),
                                },
                                wgpu::BindGroupEntry {
                                    binding: 1,
                                    resource: wgpu::BindingResource::TextureView(&self.cube.view),
                                },
                                wgpu::BindGroupEntry {
                                    binding: 2,
                                    resource: wgpu::BindingResource::Sampler(&self.cube.sampler),
                                },
                            ],
                        });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("compute pass"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&stage.pipeline);
                    pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                    pass.set_bind_group(1, &io_bind_group, &[]);
                    pass.dispatch_workgroups(workgroups.0, workgroups.1, 1);
                }

                if let (Some(blit), Some(storage)) = (blit, self.storage.as_ref()) {
                    self.encode_blit(encoder, view, blit, storage);
                }
            }
            (_, work) => {
                warn!(?work, "frame work does not match the active pipeline");
            }
        }
    }

    fn encode_blit(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        blit: &BlitPipeline,
        storage: &StorageTarget,
    ) {
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blit bind group"),
                layout: &blit.source_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&storage.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.cube.sampler),
                    },
                ],
            });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("blit pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&blit.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..4, 0..1);
    }
}
