//! GLSL source resolution and compilation.
//!
//! Shaders are looked up by name, first in an optional directory and then in
//! the set bundled with the crate. Before compilation the source's own
//! `#version` line is replaced with one derived from the reported
//! shading-language version, followed by any `#define`s the pipeline needs.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use wgpu::naga::{self, ShaderStage};

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("unrecognised shading language version '{0}'")]
    UnknownVersion(String),
    #[error("GLSL {0} cannot be compiled here; use 4.40, 4.50 or 4.60")]
    UnsupportedVersion(GlslVersion),
    #[error("cannot infer the stage of shader '{0}' (expected .vert, .frag or .comp)")]
    UnknownStage(String),
    #[error("shader '{name}' not found{}", searched_suffix(.searched))]
    NotFound {
        name: String,
        searched: Option<PathBuf>,
    },
    #[error("failed to read shader {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader '{name}' failed to compile:\n{message}")]
    Compile { name: String, message: String },
}

fn searched_suffix(searched: &Option<PathBuf>) -> String {
    match searched {
        Some(dir) => format!(" in {} or the bundled shaders", dir.display()),
        None => " among the bundled shaders".to_string(),
    }
}

/// A GLSL version as it appears in a `#version` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlslVersion {
    pub number: u32,
    pub es: bool,
}

impl GlslVersion {
    /// Parses a reported version such as `4.50`, `4.1`, `450` or
    /// `OpenGL ES GLSL ES 3.00`.
    ///
    /// The first numeric token wins; the fractional part contributes two
    /// digits, so `4.1` and `4.10` both map to `410`.
    pub fn parse(reported: &str) -> Result<Self, ShaderError> {
        let unknown = || ShaderError::UnknownVersion(reported.trim().to_string());
        let token = reported
            .split_whitespace()
            .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
            .ok_or_else(unknown)?;
        let es = reported
            .split_whitespace()
            .any(|word| word.eq_ignore_ascii_case("es"));

        let number = match token.split_once('.') {
            Some((major, minor)) => {
                let major: u32 = major.parse().map_err(|_| unknown())?;
                let digits: String = minor
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .chain(std::iter::repeat('0'))
                    .take(2)
                    .collect();
                let minor: u32 = digits.parse().map_err(|_| unknown())?;
                major
                    .checked_mul(100)
                    .and_then(|number| number.checked_add(minor))
                    .ok_or_else(unknown)?
            }
            None => {
                let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
                let value: u32 = digits.parse().map_err(|_| unknown())?;
                if value < 100 {
                    value.checked_mul(100).ok_or_else(unknown)?
                } else {
                    value
                }
            }
        };

        if number == 0 {
            return Err(unknown());
        }
        Ok(Self { number, es })
    }

    /// The `#version` line for this version.
    pub fn directive(&self) -> String {
        if self.es {
            format!("#version {} es", self.number)
        } else {
            format!("#version {}", self.number)
        }
    }

    /// Versions the naga GLSL front end accepts.
    pub fn is_compilable(&self) -> bool {
        !self.es && matches!(self.number, 440 | 450 | 460)
    }
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.number / 100, self.number % 100)?;
        if self.es {
            f.write_str(" ES")?;
        }
        Ok(())
    }
}

/// Replaces the first `#version` line and injects `defines` ahead of the body.
pub fn assemble_source(body: &str, version: GlslVersion, defines: &[(&str, String)]) -> String {
    let mut assembled = version.directive();
    assembled.push('\n');
    for (name, value) in defines {
        assembled.push_str(&format!("#define {name} {value}\n"));
    }

    let mut skipped_version = false;
    for line in body.lines() {
        if !skipped_version && line.trim_start().starts_with("#version") {
            skipped_version = true;
            continue;
        }
        assembled.push_str(line);
        assembled.push('\n');
    }
    assembled
}

/// Infers the pipeline stage from a shader name's extension.
pub fn stage_for(name: &str) -> Result<ShaderStage, ShaderError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match extension {
        "vert" => Ok(ShaderStage::Vertex),
        "frag" => Ok(ShaderStage::Fragment),
        "comp" => Ok(ShaderStage::Compute),
        _ => Err(ShaderError::UnknownStage(name.to_string())),
    }
}

const BUNDLED: &[(&str, &str)] = &[
    ("offscreen.vert", include_str!("../shaders/offscreen.vert")),
    ("offscreen.frag", include_str!("../shaders/offscreen.frag")),
    ("raymarch.comp", include_str!("../shaders/raymarch.comp")),
    ("fullscreen.vert", include_str!("../shaders/fullscreen.vert")),
    ("skybox.frag", include_str!("../shaders/skybox.frag")),
    ("blit.frag", include_str!("../shaders/blit.frag")),
];

/// Source ready to hand to the compiler.
#[derive(Debug, Clone)]
pub struct PreparedShader {
    pub name: String,
    pub stage: ShaderStage,
    pub source: String,
}

/// Resolves shader names and prepares their sources for one GLSL version.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    directory: Option<PathBuf>,
    version: GlslVersion,
}

impl ShaderLibrary {
    pub fn new(directory: Option<PathBuf>, shading_language: &str) -> Result<Self, ShaderError> {
        let version = GlslVersion::parse(shading_language)?;
        if !version.is_compilable() {
            return Err(ShaderError::UnsupportedVersion(version));
        }
        tracing::debug!(
            directory = ?directory,
            version = %version,
            "shader library ready"
        );
        Ok(Self { directory, version })
    }

    pub fn version(&self) -> GlslVersion {
        self.version
    }

    /// Raw source for `name`, preferring the library directory.
    pub fn source(&self, name: &str) -> Result<Cow<'static, str>, ShaderError> {
        if let Some(dir) = &self.directory {
            let path = dir.join(name);
            if path.is_file() {
                let text = fs::read_to_string(&path)
                    .map_err(|source| ShaderError::Read { path, source })?;
                return Ok(Cow::Owned(text));
            }
        }

        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, source)| Cow::Borrowed(*source))
            .ok_or_else(|| ShaderError::NotFound {
                name: name.to_string(),
                searched: self.directory.clone(),
            })
    }

    pub fn prepare(
        &self,
        name: &str,
        defines: &[(&str, String)],
    ) -> Result<PreparedShader, ShaderError> {
        let stage = stage_for(name)?;
        let body = self.source(name)?;
        Ok(PreparedShader {
            name: name.to_string(),
            stage,
            source: assemble_source(&body, self.version, defines),
        })
    }
}

/// Parses and validates a prepared shader without touching a GPU.
pub fn validate(shader: &PreparedShader) -> Result<(), ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(
            &naga::front::glsl::Options::from(shader.stage),
            &shader.source,
        )
        .map_err(|err| ShaderError::Compile {
            name: shader.name.clone(),
            message: err.to_string(),
        })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| ShaderError::Compile {
        name: shader.name.clone(),
        message: err.to_string(),
    })?;
    Ok(())
}

/// Creates the wgpu module for a prepared shader.
pub(crate) fn create_module(device: &wgpu::Device, shader: &PreparedShader) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(shader.name.as_str()),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(shader.source.as_str()),
            stage: shader.stage,
            defines: &[],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn version(number: u32, es: bool) -> GlslVersion {
        GlslVersion { number, es }
    }

    #[test]
    fn parses_desktop_versions() {
        assert_eq!(GlslVersion::parse("4.50").unwrap(), version(450, false));
        assert_eq!(GlslVersion::parse("4.1").unwrap(), version(410, false));
        assert_eq!(GlslVersion::parse("460").unwrap(), version(460, false));
        assert_eq!(
            GlslVersion::parse("4.60 NVIDIA via Cg compiler").unwrap(),
            version(460, false)
        );
    }

    #[test]
    fn parses_es_versions() {
        let parsed = GlslVersion::parse("OpenGL ES GLSL ES 3.00").unwrap();
        assert_eq!(parsed, version(300, true));
        assert_eq!(parsed.directive(), "#version 300 es");
        assert_eq!(parsed.to_string(), "3.00 ES");
    }

    #[test]
    fn rejects_unparseable_versions() {
        assert!(matches!(
            GlslVersion::parse("unknown"),
            Err(ShaderError::UnknownVersion(_))
        ));
        assert!(GlslVersion::parse("").is_err());
    }

    #[test]
    fn oversized_versions_are_unknown() {
        assert!(matches!(
            GlslVersion::parse("42949673.0"),
            Err(ShaderError::UnknownVersion(_))
        ));
        assert!(matches!(
            GlslVersion::parse("99999999999"),
            Err(ShaderError::UnknownVersion(_))
        ));
    }

    #[test]
    fn directive_matches_version() {
        assert_eq!(GlslVersion::parse("4.50").unwrap().directive(), "#version 450");
    }

    #[test]
    fn library_refuses_versions_naga_cannot_read() {
        let err = ShaderLibrary::new(None, "3.30").unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedVersion(v) if v.number == 330));
        let err = ShaderLibrary::new(None, "OpenGL ES GLSL ES 3.00").unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedVersion(_)));
    }

    #[test]
    fn assembly_replaces_version_and_injects_defines() {
        let body = "#version 330\nvoid main() {}\n";
        let assembled = assemble_source(
            body,
            version(450, false),
            &[("WORKGROUP_X", "32".to_string())],
        );
        let lines: Vec<&str> = assembled.lines().collect();
        assert_eq!(lines[0], "#version 450");
        assert_eq!(lines[1], "#define WORKGROUP_X 32");
        assert_eq!(lines[2], "void main() {}");
        assert_eq!(assembled.matches("#version").count(), 1);
    }

    #[test]
    fn assembly_without_version_keeps_body() {
        let assembled = assemble_source("void main() {}", version(460, false), &[]);
        assert_eq!(assembled, "#version 460\nvoid main() {}\n");
    }

    #[test]
    fn stage_follows_extension() {
        assert_eq!(stage_for("a.vert").unwrap(), ShaderStage::Vertex);
        assert_eq!(stage_for("a.frag").unwrap(), ShaderStage::Fragment);
        assert_eq!(stage_for("a.comp").unwrap(), ShaderStage::Compute);
        assert!(matches!(stage_for("a.glsl"), Err(ShaderError::UnknownStage(_))));
    }

    #[test]
    fn directory_overrides_bundled_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("skybox.frag"), "// custom\n").unwrap();
        let library = ShaderLibrary::new(Some(dir.path().to_path_buf()), "4.50").unwrap();

        assert_eq!(library.source("skybox.frag").unwrap(), "// custom\n");
        assert!(library.source("blit.frag").unwrap().contains("void main"));
        assert!(matches!(
            library.source("missing.frag"),
            Err(ShaderError::NotFound { searched: Some(_), .. })
        ));
    }

    #[test]
    fn bundled_shaders_compile_with_naga() {
        let library = ShaderLibrary::new(None, "4.50").unwrap();
        let workgroup = [
            ("CROSSMAP_WORKGROUP_X", "32".to_string()),
            ("CROSSMAP_WORKGROUP_Y", "8".to_string()),
        ];
        for (name, _) in BUNDLED {
            let defines: &[(&str, String)] = if name.ends_with(".comp") {
                &workgroup
            } else {
                &[]
            };
            let prepared = library.prepare(name, defines).unwrap();
            if let Err(err) = validate(&prepared) {
                panic!("{err}\n{}", prepared.source);
            }
        }
    }

    #[test]
    fn broken_shader_reports_compile_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("broken.frag"),
            "#version 450\nvoid main() { undefined_call(); }\n",
        )
        .unwrap();
        let library = ShaderLibrary::new(Some(dir.path().to_path_buf()), "4.50").unwrap();
        let prepared = library.prepare("broken.frag", &[]).unwrap();
        assert!(matches!(
            validate(&prepared),
            Err(ShaderError::Compile { name, .. }) if name == "broken.frag"
        ));
    }
}
