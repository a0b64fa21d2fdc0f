//! Scene files for the `crossmap` binary.
//!
//! A scene names the cubemap source, the render variant, and optional shader
//! overrides. Everything is optional apart from `version`, so a scene can be as
//! small as `version = 1` plus a `[cubemap]` directory. Relative paths are
//! resolved against the directory that holds the scene file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scene: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid scene: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantSetting {
    #[serde(alias = "compute")]
    ComputePostProcess,
    #[serde(alias = "raster")]
    RasterWithCubeSample,
    #[serde(alias = "skybox")]
    RasterSkyboxOnly,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SceneConfig {
    pub version: u32,
    #[serde(default)]
    pub variant: Option<VariantSetting>,
    #[serde(default)]
    pub refresh_rate: Option<u32>,
    #[serde(default)]
    pub cubemap: CubemapSection,
    #[serde(default)]
    pub shaders: ShaderSection,
    #[serde(default)]
    pub window: WindowSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CubemapSection {
    pub directory: Option<PathBuf>,
    /// Explicit face file names in +X, -X, +Y, -Y, +Z, -Z order.
    pub faces: Option<Vec<String>>,
    /// Extension for the default `px/nx/py/ny/pz/nz` names.
    pub extension: Option<String>,
    /// A single image holding all six faces stacked vertically.
    pub strip: Option<PathBuf>,
    #[serde(default)]
    pub flip_vertical: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShaderSection {
    pub directory: Option<PathBuf>,
    pub shading_language: Option<String>,
    pub execution_width: Option<u32>,
    pub offscreen_vertex: Option<String>,
    pub offscreen_fragment: Option<String>,
    pub compute: Option<String>,
    pub onscreen_vertex: Option<String>,
    pub onscreen_fragment: Option<String>,
    pub blit_fragment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default, deserialize_with = "deserialize_size_opt")]
    pub size: Option<(u32, u32)>,
    pub title: Option<String>,
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Pair([i64; 2]),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_size(&raw).map_err(de::Error::custom)?),
        Some(Helper::Pair([width, height])) => {
            let width = u32::try_from(width)
                .map_err(|_| de::Error::custom("window width must fit in u32"))?;
            let height = u32::try_from(height)
                .map_err(|_| de::Error::custom("window height must fit in u32"))?;
            Some((width, height))
        }
    };
    Ok(result)
}

/// Parses a `WIDTHxHEIGHT` size such as `1280x720`.
pub fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let trimmed = raw.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH size, found '{trimmed}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in size '{trimmed}'"))?;
    Ok((width, height))
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a scene file, resolving relative paths against its
    /// parent directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scene = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            scene.rebase(base);
        }
        Ok(scene)
    }

    pub fn rebase(&mut self, base: &Path) {
        rebase_path(&mut self.cubemap.directory, base);
        rebase_path(&mut self.cubemap.strip, base);
        rebase_path(&mut self.shaders.directory, base);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported scene version {}; expected 1",
                self.version
            )));
        }

        if self.refresh_rate == Some(0) {
            return Err(ConfigError::Invalid(
                "refresh_rate must be greater than zero".into(),
            ));
        }

        let cubemap = &self.cubemap;
        if cubemap.strip.is_some() && (cubemap.faces.is_some() || cubemap.extension.is_some()) {
            return Err(ConfigError::Invalid(
                "cubemap.strip cannot be combined with cubemap.faces or cubemap.extension".into(),
            ));
        }
        if cubemap.faces.is_some() && cubemap.extension.is_some() {
            return Err(ConfigError::Invalid(
                "cubemap.faces and cubemap.extension are mutually exclusive".into(),
            ));
        }
        if let Some(faces) = &cubemap.faces {
            if faces.len() != 6 {
                return Err(ConfigError::Invalid(format!(
                    "cubemap.faces must list exactly 6 names, found {}",
                    faces.len()
                )));
            }
            if let Some(name) = faces.iter().find(|name| name.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "cubemap.faces contains an empty name ('{name}')"
                )));
            }
        }
        if let Some(extension) = &cubemap.extension {
            if extension.trim_start_matches('.').is_empty() {
                return Err(ConfigError::Invalid(
                    "cubemap.extension must not be empty".into(),
                ));
            }
        }

        if self.shaders.execution_width == Some(0) {
            return Err(ConfigError::Invalid(
                "shaders.execution_width must be greater than zero".into(),
            ));
        }
        if let Some(version) = &self.shaders.shading_language {
            if version.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "shaders.shading_language must not be empty".into(),
                ));
            }
        }
        let names = [
            ("offscreen_vertex", &self.shaders.offscreen_vertex),
            ("offscreen_fragment", &self.shaders.offscreen_fragment),
            ("compute", &self.shaders.compute),
            ("onscreen_vertex", &self.shaders.onscreen_vertex),
            ("onscreen_fragment", &self.shaders.onscreen_fragment),
            ("blit_fragment", &self.shaders.blit_fragment),
        ];
        for (key, name) in names {
            if name.as_deref().is_some_and(|name| name.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "shaders.{key} must not be empty"
                )));
            }
        }

        if let Some((width, height)) = self.window.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(
                    "window.size dimensions must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

fn rebase_path(path: &mut Option<PathBuf>, base: &Path) {
    if let Some(current) = path.as_mut() {
        if current.is_relative() {
            *current = base.join(&*current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
variant = "raster-with-cube-sample"
refresh_rate = 120

[cubemap]
directory = "assets/park"
extension = "hdr"
flip_vertical = true

[shaders]
directory = "shaders"
shading_language = "4.60"
execution_width = 64
onscreen_fragment = "tinted.frag"

[window]
size = "1280x720"
title = "Park"
"#;

    #[test]
    fn parses_sample_scene() {
        let scene = SceneConfig::from_toml_str(SAMPLE).expect("parse scene");
        assert_eq!(scene.version, 1);
        assert_eq!(scene.variant, Some(VariantSetting::RasterWithCubeSample));
        assert_eq!(scene.refresh_rate, Some(120));
        assert_eq!(scene.cubemap.extension.as_deref(), Some("hdr"));
        assert!(scene.cubemap.flip_vertical);
        assert_eq!(scene.shaders.execution_width, Some(64));
        assert_eq!(
            scene.shaders.onscreen_fragment.as_deref(),
            Some("tinted.frag")
        );
        assert_eq!(scene.window.size, Some((1280, 720)));
    }

    #[test]
    fn minimal_scene_uses_defaults() {
        let scene = SceneConfig::from_toml_str("version = 1").expect("parse scene");
        assert!(scene.variant.is_none());
        assert!(scene.cubemap.directory.is_none());
        assert!(!scene.cubemap.flip_vertical);
        assert!(scene.window.size.is_none());
    }

    #[test]
    fn accepts_variant_aliases_and_size_pairs() {
        let scene = SceneConfig::from_toml_str(
            r#"
version = 1
variant = "skybox"

[window]
size = [640, 480]
"#,
        )
        .expect("parse scene");
        assert_eq!(scene.variant, Some(VariantSetting::RasterSkyboxOnly));
        assert_eq!(scene.window.size, Some((640, 480)));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = SceneConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_variant() {
        let err = SceneConfig::from_toml_str("version = 1\nvariant = \"metal\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_wrong_face_count() {
        let config = r#"
version = 1

[cubemap]
directory = "faces"
faces = ["a.png", "b.png"]
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("exactly 6")));
    }

    #[test]
    fn rejects_strip_combined_with_faces() {
        let config = r#"
version = 1

[cubemap]
strip = "cube.png"
extension = "png"
"#;
        let err = SceneConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_refresh_rate_and_width() {
        let err = SceneConfig::from_toml_str("version = 1\nrefresh_rate = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SceneConfig::from_toml_str("version = 1\n[shaders]\nexecution_width = 0")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_size() {
        let err = SceneConfig::from_toml_str("version = 1\n[window]\nsize = \"wide\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rebases_relative_paths() {
        let mut scene = SceneConfig::from_toml_str(SAMPLE).expect("parse scene");
        scene.cubemap.strip = Some(PathBuf::from("/abs/cube.png"));
        scene.rebase(Path::new("/scenes"));
        assert_eq!(
            scene.cubemap.directory.as_deref(),
            Some(Path::new("/scenes/assets/park"))
        );
        assert_eq!(
            scene.shaders.directory.as_deref(),
            Some(Path::new("/scenes/shaders"))
        );
        assert_eq!(scene.cubemap.strip.as_deref(), Some(Path::new("/abs/cube.png")));
    }

    #[test]
    fn parse_size_requires_both_dimensions() {
        assert_eq!(parse_size("800x600"), Ok((800, 600)));
        assert_eq!(parse_size(" 32 X 16 "), Ok((32, 16)));
        assert!(parse_size("800").is_err());
        assert!(parse_size("x600").is_err());
    }
}
