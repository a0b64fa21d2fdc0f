use bytemuck::{Pod, Zeroable};

/// Per-frame values shared by the onscreen fragment and compute shaders.
///
/// Matches the std140 `FrameUniforms` block declared in the bundled shaders:
/// two `vec2`s at offsets 0 and 8, a `float` at 16, padded to 32 bytes.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub resolution: [f32; 2],
    pub mouse: [f32; 2],
    pub time: f32,
    pub _padding: [f32; 3],
}

unsafe impl Zeroable for FrameUniforms {}
unsafe impl Pod for FrameUniforms {}

impl FrameUniforms {
    pub fn new(size: (u32, u32), mouse: [f32; 2], time: f32) -> Self {
        Self {
            resolution: [size.0 as f32, size.1 as f32],
            mouse,
            time,
            _padding: [0.0; 3],
        }
    }

    pub(crate) fn size() -> wgpu::BufferAddress {
        std::mem::size_of::<Self>() as wgpu::BufferAddress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 32);
        assert_eq!(std::mem::align_of::<FrameUniforms>(), 16);
        assert_eq!(std::mem::offset_of!(FrameUniforms, mouse), 8);
        assert_eq!(std::mem::offset_of!(FrameUniforms, time), 16);
    }

    #[test]
    fn bytes_start_with_resolution() {
        let uniforms = FrameUniforms::new((640, 480), [10.0, 20.0], 0.5);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(&floats[..5], &[640.0, 480.0, 10.0, 20.0, 0.5]);
    }
}
