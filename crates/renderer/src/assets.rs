//! Cube face loading.
//!
//! Faces are decoded on the CPU into tightly packed RGBA rows so the GPU side
//! can upload them with a single `create_texture_with_data` call. Radiance HDR
//! input keeps its range as `Rgba16Float`; every other format is expanded to
//! `Rgba8Unorm`.

use std::fmt;
use std::path::{Path, PathBuf};

use half::f16;
use image::imageops::flip_vertical_in_place;
use image::{ColorType, DynamicImage, GenericImageView};

use crate::types::CubeSource;

/// Cube faces in the layer order the GPU expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// File stem used by the default naming scheme.
    pub fn suffix(self) -> &'static str {
        match self {
            CubeFace::PositiveX => "px",
            CubeFace::NegativeX => "nx",
            CubeFace::PositiveY => "py",
            CubeFace::NegativeY => "ny",
            CubeFace::PositiveZ => "pz",
            CubeFace::NegativeZ => "nz",
        }
    }

    /// Array layer of this face inside a cube texture.
    pub fn layer(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for CubeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CubeFace::PositiveX => "+X",
            CubeFace::NegativeX => "-X",
            CubeFace::PositiveY => "+Y",
            CubeFace::NegativeY => "-Y",
            CubeFace::PositiveZ => "+Z",
            CubeFace::NegativeZ => "-Z",
        };
        f.write_str(label)
    }
}

/// `px.<ext>`, `nx.<ext>`, ... in face order.
pub fn default_face_names(extension: &str) -> [String; 6] {
    let extension = extension.trim_start_matches('.');
    CubeFace::ALL.map(|face| format!("{}.{extension}", face.suffix()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceFormat {
    Rgba8Unorm,
    Rgba16Float,
}

impl FaceFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FaceFormat::Rgba8Unorm => 4,
            FaceFormat::Rgba16Float => 8,
        }
    }

    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            FaceFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            FaceFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("a cube needs exactly 6 faces, got {0}")]
    FaceCount(usize),
    #[error("cubemap face {face} not found at {path}")]
    Missing { face: CubeFace, path: PathBuf },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cubemap face {face} is not square ({width}x{height})")]
    NotSquare {
        face: CubeFace,
        width: u32,
        height: u32,
    },
    #[error(
        "cubemap face {face} is {width}x{height} {format:?}, expected {expected_edge}x{expected_edge} {expected_format:?}"
    )]
    Mismatch {
        face: CubeFace,
        width: u32,
        height: u32,
        format: FaceFormat,
        expected_edge: u32,
        expected_format: FaceFormat,
    },
    #[error("cubemap strip {path} must be six square faces stacked vertically, found {width}x{height}")]
    BadStrip {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub flip_vertical: bool,
}

/// One decoded face, rows top to bottom.
#[derive(Clone)]
pub struct FaceImage {
    pub width: u32,
    pub height: u32,
    pub format: FaceFormat,
    pub data: Vec<u8>,
}

impl fmt::Debug for FaceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaceImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FaceImage {
    /// Converts a decoded image, keeping float range for float sources.
    pub fn from_image(image: &DynamicImage, options: LoadOptions) -> Self {
        let (width, height) = image.dimensions();
        if matches!(image.color(), ColorType::Rgb32F | ColorType::Rgba32F) {
            let mut rgba = image.to_rgba32f();
            if options.flip_vertical {
                flip_vertical_in_place(&mut rgba);
            }
            let mut data = Vec::with_capacity(rgba.as_raw().len() * 2);
            for channel in rgba.as_raw() {
                data.extend_from_slice(&to_half(*channel).to_le_bytes());
            }
            Self {
                width,
                height,
                format: FaceFormat::Rgba16Float,
                data,
            }
        } else {
            let mut rgba = image.to_rgba8();
            if options.flip_vertical {
                flip_vertical_in_place(&mut rgba);
            }
            Self {
                width,
                height,
                format: FaceFormat::Rgba8Unorm,
                data: rgba.into_raw(),
            }
        }
    }
}

/// Saturates instead of overflowing to infinity, so bright HDR texels such as
/// a sun disc stay finite.
fn to_half(value: f32) -> f16 {
    let limit = f16::MAX.to_f32();
    f16::from_f32(value.clamp(-limit, limit))
}

/// Extent of a cube texture with `edge`-sized faces.
pub fn cube_extent(edge: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: edge,
        height: edge,
        depth_or_array_layers: 6,
    }
}

/// Six validated faces sharing one edge length and pixel format.
#[derive(Debug, Clone)]
pub struct FaceSet {
    faces: Vec<FaceImage>,
    edge: u32,
    format: FaceFormat,
}

impl FaceSet {
    pub fn new(faces: Vec<FaceImage>) -> Result<Self, AssetError> {
        if faces.len() != CubeFace::ALL.len() {
            return Err(AssetError::FaceCount(faces.len()));
        }
        let first = &faces[0];
        if first.width != first.height {
            return Err(AssetError::NotSquare {
                face: CubeFace::PositiveX,
                width: first.width,
                height: first.height,
            });
        }
        let edge = first.width;
        let format = first.format;

        for (face, image) in CubeFace::ALL.into_iter().zip(faces.iter()).skip(1) {
            if image.width != edge || image.height != edge || image.format != format {
                if image.width != image.height {
                    return Err(AssetError::NotSquare {
                        face,
                        width: image.width,
                        height: image.height,
                    });
                }
                return Err(AssetError::Mismatch {
                    face,
                    width: image.width,
                    height: image.height,
                    format: image.format,
                    expected_edge: edge,
                    expected_format: format,
                });
            }
        }

        Ok(Self {
            faces,
            edge,
            format,
        })
    }

    pub fn edge(&self) -> u32 {
        self.edge
    }

    pub fn format(&self) -> FaceFormat {
        self.format
    }

    pub fn face(&self, face: CubeFace) -> &FaceImage {
        &self.faces[face.layer() as usize]
    }

    /// Size of the cube texture built from these faces.
    pub fn extent(&self) -> wgpu::Extent3d {
        cube_extent(self.edge)
    }

    /// All faces concatenated layer after layer.
    pub fn layer_major_bytes(&self) -> Vec<u8> {
        let face_bytes = (self.edge as usize).pow(2) * self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(face_bytes * 6);
        for face in &self.faces {
            data.extend_from_slice(&face.data);
        }
        data
    }
}

/// Loads six face files from `directory`, names given in face order.
pub fn load_faces(
    directory: &Path,
    names: &[String; 6],
    options: LoadOptions,
) -> Result<FaceSet, AssetError> {
    let mut decoded = Vec::with_capacity(6);
    for (face, name) in CubeFace::ALL.into_iter().zip(names.iter()) {
        let path = directory.join(name);
        if !path.is_file() {
            return Err(AssetError::Missing { face, path });
        }
        let image = decode(&path)?;
        let face_image = FaceImage::from_image(&image, options);
        tracing::debug!(
            %face,
            path = %path.display(),
            width = face_image.width,
            height = face_image.height,
            format = ?face_image.format,
            "decoded cubemap face"
        );
        decoded.push(face_image);
    }

    let set = FaceSet::new(decoded)?;
    tracing::info!(
        directory = %directory.display(),
        edge = set.edge(),
        format = ?set.format(),
        "loaded cubemap faces"
    );
    Ok(set)
}

/// Loads a packaged cube: one image six faces tall.
pub fn load_strip(path: &Path, options: LoadOptions) -> Result<FaceSet, AssetError> {
    if !path.is_file() {
        return Err(AssetError::Missing {
            face: CubeFace::PositiveX,
            path: path.to_path_buf(),
        });
    }
    let image = decode(path)?;
    let (width, height) = image.dimensions();
    if width == 0 || height != width * 6 {
        return Err(AssetError::BadStrip {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let faces = CubeFace::ALL.map(|face| {
        let slice = image.crop_imm(0, face.layer() * width, width, width);
        FaceImage::from_image(&slice, options)
    });
    let set = FaceSet::new(faces.into())?;
    tracing::info!(
        path = %path.display(),
        edge = set.edge(),
        format = ?set.format(),
        "loaded packaged cubemap"
    );
    Ok(set)
}

/// Loads whichever kind of source the configuration names.
pub fn load_source(source: &CubeSource, options: LoadOptions) -> Result<FaceSet, AssetError> {
    match source {
        CubeSource::Faces { directory, names } => load_faces(directory, names, options),
        CubeSource::Strip { path } => load_strip(path, options),
    }
}

fn decode(path: &Path) -> Result<DynamicImage, AssetError> {
    image::open(path).map_err(|source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgb32FImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_face(dir: &Path, name: &str, edge: u32, colour: [u8; 4]) {
        RgbaImage::from_pixel(edge, edge, Rgba(colour))
            .save(dir.join(name))
            .expect("write face");
    }

    fn write_faces(dir: &Path, edge: u32) -> [String; 6] {
        let names = default_face_names("png");
        for (index, name) in names.iter().enumerate() {
            write_face(dir, name, edge, [index as u8 * 40, 0, 0, 255]);
        }
        names
    }

    #[test]
    fn default_names_follow_face_order() {
        assert_eq!(
            default_face_names(".hdr"),
            ["px.hdr", "nx.hdr", "py.hdr", "ny.hdr", "pz.hdr", "nz.hdr"].map(String::from)
        );
    }

    #[test]
    fn equal_square_faces_produce_matching_extent() {
        let dir = TempDir::new().unwrap();
        let names = write_faces(dir.path(), 8);

        let set = load_faces(dir.path(), &names, LoadOptions::default()).expect("load faces");
        assert_eq!(set.edge(), 8);
        assert_eq!(set.format(), FaceFormat::Rgba8Unorm);
        assert_eq!(
            set.extent(),
            wgpu::Extent3d {
                width: 8,
                height: 8,
                depth_or_array_layers: 6
            }
        );
        assert_eq!(set.layer_major_bytes().len(), 8 * 8 * 4 * 6);
        assert_eq!(set.face(CubeFace::NegativeX).data[0], 40);
        assert_eq!(set.face(CubeFace::NegativeZ).data[0], 200);
    }

    #[test]
    fn missing_face_aborts_loading() {
        let dir = TempDir::new().unwrap();
        let names = write_faces(dir.path(), 4);
        std::fs::remove_file(dir.path().join("py.png")).unwrap();

        let err = load_faces(dir.path(), &names, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::Missing { face: CubeFace::PositiveY, .. }));
    }

    #[test]
    fn face_names_are_case_sensitive() {
        let dir = TempDir::new().unwrap();
        let mut names = write_faces(dir.path(), 4);
        names[2] = "PY.png".into();

        let err = load_faces(dir.path(), &names, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::Missing { .. }));
    }

    #[test]
    fn unreadable_face_reports_decode_error() {
        let dir = TempDir::new().unwrap();
        let names = write_faces(dir.path(), 4);
        std::fs::write(dir.path().join("nz.png"), b"not an image").unwrap();

        let err = load_faces(dir.path(), &names, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[test]
    fn mismatched_face_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let names = write_faces(dir.path(), 4);
        write_face(dir.path(), "pz.png", 8, [0, 0, 0, 255]);

        let err = load_faces(dir.path(), &names, LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            AssetError::Mismatch {
                face: CubeFace::PositiveZ,
                width: 8,
                expected_edge: 4,
                ..
            }
        ));
    }

    #[test]
    fn non_square_face_is_rejected() {
        let dir = TempDir::new().unwrap();
        let names = write_faces(dir.path(), 4);
        RgbaImage::new(4, 2).save(dir.path().join("px.png")).unwrap();

        let err = load_faces(dir.path(), &names, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::NotSquare { face: CubeFace::PositiveX, .. }));
    }

    #[test]
    fn strip_is_split_in_face_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.png");
        let strip = RgbaImage::from_fn(2, 12, |_, y| Rgba([(y / 2) as u8, 0, 0, 255]));
        strip.save(&path).unwrap();

        let set = load_strip(&path, LoadOptions::default()).expect("load strip");
        assert_eq!(set.edge(), 2);
        for face in CubeFace::ALL {
            assert_eq!(set.face(face).data[0], face.layer() as u8);
        }
    }

    #[test]
    fn strip_with_wrong_aspect_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.png");
        RgbaImage::new(4, 12).save(&path).unwrap();

        let err = load_strip(&path, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, AssetError::BadStrip { width: 4, height: 12, .. }));
    }

    #[test]
    fn flip_reverses_rows() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(1, 2, |_, y| {
            Rgba([y as u8 * 255, 0, 0, 255])
        }));
        let upright = FaceImage::from_image(&image, LoadOptions::default());
        let flipped = FaceImage::from_image(&image, LoadOptions { flip_vertical: true });
        assert_eq!(upright.data[0], 0);
        assert_eq!(flipped.data[0], 255);
    }

    #[test]
    fn float_images_become_half_floats_with_opaque_alpha() {
        let image = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(1, 1, Rgb([2.5, 0.0, 1.0])));
        let face = FaceImage::from_image(&image, LoadOptions::default());
        assert_eq!(face.format, FaceFormat::Rgba16Float);
        assert_eq!(face.data.len(), 8);

        let channel = |index: usize| {
            f16::from_le_bytes([face.data[index * 2], face.data[index * 2 + 1]]).to_f32()
        };
        assert_eq!(channel(0), 2.5);
        assert_eq!(channel(2), 1.0);
        assert_eq!(channel(3), 1.0);
    }

    #[test]
    fn radiance_beyond_half_range_saturates() {
        let image = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(
            1,
            1,
            Rgb([1.0e6, 70000.0, 3.0]),
        ));
        let face = FaceImage::from_image(&image, LoadOptions::default());
        let channel = |index: usize| {
            f16::from_le_bytes([face.data[index * 2], face.data[index * 2 + 1]])
        };
        assert_eq!(channel(0), f16::MAX);
        assert_eq!(channel(1), f16::MAX);
        assert!(channel(0).is_finite());
        assert_eq!(channel(2).to_f32(), 3.0);
    }
}
