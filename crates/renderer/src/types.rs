use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::assets::default_face_names;

/// Refresh rate assumed when the caller does not supply one.
pub const DEFAULT_REFRESH_RATE: u32 = 60;
/// SIMD width used for the compute workgroup's X dimension.
pub const DEFAULT_EXECUTION_WIDTH: u32 = 32;
/// Shading-language version reported to the shader library when unset.
pub const DEFAULT_SHADING_LANGUAGE: &str = "4.50";

/// The three ways a frame can be produced.
///
/// Both raster variants draw the same full-screen quad; they differ only in
/// how the cube texture is built. The compute variant writes every drawable
/// pixel from a compute shader instead of rasterising.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderVariant {
    /// Composite the faces, then run a compute shader per pixel each frame.
    ComputePostProcess,
    /// Composite the faces, then sample the cube from a full-screen quad.
    RasterCubeSample,
    /// Upload the faces directly as the cube, then draw the full-screen quad.
    RasterSkybox,
}

impl RenderVariant {
    pub const ALL: [RenderVariant; 3] = [
        RenderVariant::ComputePostProcess,
        RenderVariant::RasterCubeSample,
        RenderVariant::RasterSkybox,
    ];

    /// Whether the cube texture is produced by the offscreen layered pass.
    pub fn composites(self) -> bool {
        !matches!(self, RenderVariant::RasterSkybox)
    }

    pub fn uses_compute(self) -> bool {
        matches!(self, RenderVariant::ComputePostProcess)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RenderVariant::ComputePostProcess => "compute-post-process",
            RenderVariant::RasterCubeSample => "raster-with-cube-sample",
            RenderVariant::RasterSkybox => "raster-skybox-only",
        }
    }
}

impl Default for RenderVariant {
    fn default() -> Self {
        RenderVariant::RasterCubeSample
    }
}

impl fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "compute-post-process" | "compute" => Ok(RenderVariant::ComputePostProcess),
            "raster-with-cube-sample" | "raster" => Ok(RenderVariant::RasterCubeSample),
            "raster-skybox-only" | "skybox" => Ok(RenderVariant::RasterSkybox),
            _ => Err(format!(
                "unknown render variant '{}' (expected compute-post-process, raster-with-cube-sample or raster-skybox-only)",
                value.trim()
            )),
        }
    }
}

/// Where the six cube faces come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CubeSource {
    /// Six files inside `directory`, named in +X, -X, +Y, -Y, +Z, -Z order.
    Faces {
        directory: PathBuf,
        names: [String; 6],
    },
    /// One packaged image with the faces stacked top to bottom.
    Strip { path: PathBuf },
}

impl CubeSource {
    /// Faces named `px.<ext>` .. `nz.<ext>` inside `directory`.
    pub fn directory(directory: impl Into<PathBuf>, extension: &str) -> Self {
        CubeSource::Faces {
            directory: directory.into(),
            names: default_face_names(extension),
        }
    }
}

impl fmt::Display for CubeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CubeSource::Faces { directory, .. } => write!(f, "faces in {}", directory.display()),
            CubeSource::Strip { path } => write!(f, "strip {}", path.display()),
        }
    }
}

/// Shader names looked up in the [`ShaderLibrary`](crate::ShaderLibrary).
///
/// The file extension selects the pipeline stage (`.vert`, `.frag`, `.comp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderNames {
    pub offscreen_vertex: String,
    pub offscreen_fragment: String,
    pub compute: String,
    pub onscreen_vertex: String,
    pub onscreen_fragment: String,
    pub blit_fragment: String,
}

impl Default for ShaderNames {
    fn default() -> Self {
        Self {
            offscreen_vertex: "offscreen.vert".into(),
            offscreen_fragment: "offscreen.frag".into(),
            compute: "raymarch.comp".into(),
            onscreen_vertex: "fullscreen.vert".into(),
            onscreen_fragment: "skybox.frag".into(),
            blit_fragment: "blit.frag".into(),
        }
    }
}

impl ShaderNames {
    /// Every shader a variant compiles at startup, in build order.
    ///
    /// The compute variant lists the blit pair as well since the surface may
    /// not accept storage writes; the caller decides whether it is used.
    pub fn required_by(&self, variant: RenderVariant) -> Vec<&str> {
        let mut names = Vec::with_capacity(5);
        if variant.composites() {
            names.push(self.offscreen_vertex.as_str());
            names.push(self.offscreen_fragment.as_str());
        }
        if variant.uses_compute() {
            names.push(self.compute.as_str());
            names.push(self.onscreen_vertex.as_str());
            names.push(self.blit_fragment.as_str());
        } else {
            names.push(self.onscreen_vertex.as_str());
            names.push(self.onscreen_fragment.as_str());
        }
        names
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the CLI flags and scene file: which variant to
/// run, where the cube faces live, and how shaders are resolved and compiled.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    pub title: String,
    pub variant: RenderVariant,
    pub cube_source: CubeSource,
    /// Flip every face vertically while decoding.
    pub flip_vertical: bool,
    /// Directory searched before the bundled shaders.
    pub shader_directory: Option<PathBuf>,
    pub shader_names: ShaderNames,
    /// Shading-language version string, e.g. `4.50` or `OpenGL ES GLSL ES 3.00`.
    pub shading_language: String,
    /// Refreshes per second; the animation clock advances `1 / refresh_rate`
    /// per frame.
    pub refresh_rate: u32,
    /// Preferred compute workgroup width.
    pub execution_width: u32,
}

impl Default for RendererConfig {
    /// A 1280x720 window sampling `px.png` .. `nz.png` from the working
    /// directory.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "Crossmap".into(),
            variant: RenderVariant::default(),
            cube_source: CubeSource::directory(".", "png"),
            flip_vertical: false,
            shader_directory: None,
            shader_names: ShaderNames::default(),
            shading_language: DEFAULT_SHADING_LANGUAGE.into(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            execution_width: DEFAULT_EXECUTION_WIDTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_parses_names_and_aliases() {
        for variant in RenderVariant::ALL {
            assert_eq!(variant.as_str().parse::<RenderVariant>(), Ok(variant));
        }
        assert_eq!(
            "Compute".parse::<RenderVariant>(),
            Ok(RenderVariant::ComputePostProcess)
        );
        assert_eq!(
            " skybox ".parse::<RenderVariant>(),
            Ok(RenderVariant::RasterSkybox)
        );
        assert!("metal".parse::<RenderVariant>().is_err());
    }

    #[test]
    fn only_skybox_skips_compositing() {
        assert!(RenderVariant::ComputePostProcess.composites());
        assert!(RenderVariant::RasterCubeSample.composites());
        assert!(!RenderVariant::RasterSkybox.composites());
    }

    #[test]
    fn required_shaders_follow_variant() {
        let names = ShaderNames::default();
        assert_eq!(
            names.required_by(RenderVariant::RasterSkybox),
            vec!["fullscreen.vert", "skybox.frag"]
        );
        assert_eq!(
            names.required_by(RenderVariant::RasterCubeSample),
            vec!["offscreen.vert", "offscreen.frag", "fullscreen.vert", "skybox.frag"]
        );
        assert_eq!(
            names.required_by(RenderVariant::ComputePostProcess),
            vec![
                "offscreen.vert",
                "offscreen.frag",
                "raymarch.comp",
                "fullscreen.vert",
                "blit.frag"
            ]
        );
    }

    #[test]
    fn default_source_uses_png_faces() {
        let config = RendererConfig::default();
        match config.cube_source {
            CubeSource::Faces { names, .. } => {
                assert_eq!(names[0], "px.png");
                assert_eq!(names[5], "nz.png");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}
