use wgpu::util::{DeviceExt, TextureDataOrder};

use anyhow::Result;

use crate::assets::{cube_extent, FaceSet};

/// A six-layer texture viewed as a cube, plus the sampler used to read it.
pub(crate) struct CubeTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub edge: u32,
    pub format: wgpu::TextureFormat,
}

impl CubeTexture {
    /// Empty cube that the offscreen pass renders into.
    pub(crate) fn render_target(
        device: &wgpu::Device,
        edge: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&cube_descriptor(
            "composited cube texture",
            edge,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        ));
        Self::from_texture(device, texture, edge, format)
    }

    /// Cube filled straight from decoded faces, without compositing.
    pub(crate) fn upload(device: &wgpu::Device, queue: &wgpu::Queue, faces: &FaceSet) -> Self {
        let format = faces.format().texture_format();
        let texture = device.create_texture_with_data(
            queue,
            &cube_descriptor(
                "packaged cube texture",
                faces.edge(),
                format,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
            TextureDataOrder::LayerMajor,
            &faces.layer_major_bytes(),
        );
        Self::from_texture(device, texture, faces.edge(), format)
    }

    fn from_texture(
        device: &wgpu::Device,
        texture: wgpu::Texture,
        edge: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler: linear_clamp_sampler(device, "cube sampler"),
            edge,
            format,
        }
    }

    /// Single-layer 2D view used as a colour attachment.
    pub(crate) fn layer_view(&self, layer: u32) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube face attachment"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }
}

/// The six source faces as a 2D array, read by the offscreen pass.
pub(crate) struct FaceArray {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl FaceArray {
    pub(crate) fn upload(device: &wgpu::Device, queue: &wgpu::Queue, faces: &FaceSet) -> Self {
        let texture = device.create_texture_with_data(
            queue,
            &cube_descriptor(
                "cube face sources",
                faces.edge(),
                faces.format().texture_format(),
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
            TextureDataOrder::LayerMajor,
            &faces.layer_major_bytes(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("cube face sources view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(6),
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
            sampler: linear_clamp_sampler(device, "cube face sampler"),
        }
    }
}

/// Rejects faces the adapter cannot hold in a cube texture.
pub(crate) fn ensure_edge_fits(edge: u32, limits: &wgpu::Limits) -> Result<()> {
    let max_dimension = limits.max_texture_dimension_2d;
    if edge > max_dimension {
        anyhow::bail!(
            "cubemap faces are {edge}x{edge}, but the GPU supports at most {max_dimension}x{max_dimension}"
        );
    }
    if limits.max_texture_array_layers < 6 {
        anyhow::bail!(
            "GPU supports {} texture array layers; a cube needs 6",
            limits.max_texture_array_layers
        );
    }
    Ok(())
}

fn cube_descriptor<'a>(
    label: &'a str,
    edge: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: cube_extent(edge),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    }
}

pub(crate) fn linear_clamp_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_has_six_layers_of_edge() {
        let extent = cube_extent(256);
        assert_eq!(extent.width, 256);
        assert_eq!(extent.height, 256);
        assert_eq!(extent.depth_or_array_layers, 6);
    }

    #[test]
    fn descriptor_is_single_mip_2d() {
        let descriptor = cube_descriptor(
            "test",
            64,
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::TEXTURE_BINDING,
        );
        assert_eq!(descriptor.dimension, wgpu::TextureDimension::D2);
        assert_eq!(descriptor.mip_level_count, 1);
        assert_eq!(descriptor.size, cube_extent(64));
    }

    #[test]
    fn faces_larger_than_the_adapter_limit_are_rejected() {
        let limits = wgpu::Limits {
            max_texture_dimension_2d: 8192,
            ..wgpu::Limits::downlevel_defaults()
        };
        assert!(ensure_edge_fits(8192, &limits).is_ok());
        let err = ensure_edge_fits(16384, &limits).unwrap_err();
        assert!(err.to_string().contains("16384x16384"));
    }

    #[test]
    fn cube_needs_six_array_layers() {
        let limits = wgpu::Limits {
            max_texture_array_layers: 1,
            ..wgpu::Limits::default()
        };
        assert!(ensure_edge_fits(64, &limits).is_err());
    }
}
