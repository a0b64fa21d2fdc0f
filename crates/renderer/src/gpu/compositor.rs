use std::iter;

use anyhow::{Context, Result};

use crate::assets::{CubeFace, FaceSet};

use super::cubemap::{CubeTexture, FaceArray};
use super::pipeline::OffscreenPipeline;

/// Renders the six source faces into a fresh cube texture and waits for it.
///
/// One encoder records a pass per face. Pass `i` targets layer `i` of the cube
/// and draws instance `i` of the strip, so the shaders pick the source layer
/// from the instance index. The single submission is awaited before returning.
pub(crate) fn composite(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &OffscreenPipeline,
    faces: &FaceSet,
) -> Result<CubeTexture> {
    let sources = FaceArray::upload(device, queue, faces);
    let cube = CubeTexture::render_target(device, faces.edge(), faces.format().texture_format());

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("cube faces bind group"),
        layout: &pipeline.faces_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&sources.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sources.sampler),
            },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("cube composite encoder"),
    });
    for face in CubeFace::ALL {
        let layer = face.layer();
        let target = cube.layer_view(layer);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("cube face pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..4, layer..layer + 1);
    }

    queue.submit(iter::once(encoder.finish()));
    device
        .poll(wgpu::PollType::Wait)
        .context("failed waiting for the cube composite pass")?;

    tracing::info!(
        edge = cube.edge,
        format = ?cube.format,
        "cube texture composited"
    );
    Ok(cube)
}
