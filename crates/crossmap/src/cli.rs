use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::RenderVariant;

#[derive(Parser, Debug)]
#[command(
    name = "crossmap",
    author,
    version,
    about = "Render a six-face cubemap with compute or raster pipelines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window and render the cubemap every display refresh.
    Run(SceneArgs),
    /// Load the faces and compile every shader without opening a window.
    Check(SceneArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct SceneArgs {
    /// Scene file (TOML); command-line flags override its values.
    #[arg(long, value_name = "FILE")]
    pub scene: Option<PathBuf>,

    /// Render variant: `compute-post-process`, `raster-with-cube-sample` or `raster-skybox-only`.
    #[arg(long, value_name = "VARIANT", value_parser = parse_variant)]
    pub variant: Option<RenderVariant>,

    /// Directory holding `px/nx/py/ny/pz/nz` face images.
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Face image extension (detected from the directory when omitted).
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Single image with the six faces stacked vertically.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["assets", "extension"])]
    pub strip: Option<PathBuf>,

    /// Flip every face vertically while loading.
    #[arg(long)]
    pub flip_vertical: bool,

    /// Directory searched for shaders before the bundled ones.
    #[arg(long, value_name = "DIR")]
    pub shaders: Option<PathBuf>,

    /// Reported shading-language version, e.g. `4.50`.
    #[arg(long, value_name = "VERSION")]
    pub shading_language: Option<String>,

    /// Preferred compute workgroup width.
    #[arg(long, value_name = "THREADS", value_parser = clap::value_parser!(u32).range(1..))]
    pub execution_width: Option<u32>,

    /// Window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Display refresh rate driving the animation clock.
    #[arg(long, value_name = "FPS", value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: Option<u32>,

    /// Window title.
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_variant(value: &str) -> Result<RenderVariant, String> {
    if value.trim().is_empty() {
        return Err("render variant must not be empty".to_string());
    }
    value.parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = sceneconfig::parse_size(value)?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "crossmap",
            "run",
            "--variant",
            "compute",
            "--assets",
            "faces",
            "--size",
            "640x480",
            "--fps",
            "120",
            "--flip-vertical",
        ])
        .expect("parse run");
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.variant, Some(RenderVariant::ComputePostProcess));
        assert_eq!(args.assets, Some(PathBuf::from("faces")));
        assert_eq!(args.size, Some((640, 480)));
        assert_eq!(args.fps, Some(120));
        assert!(args.flip_vertical);
    }

    #[test]
    fn strip_conflicts_with_assets() {
        let result = Cli::try_parse_from([
            "crossmap", "check", "--strip", "cube.png", "--assets", "faces",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_variant("").is_err());
        assert!(parse_variant("vulkan").is_err());
        assert!(parse_surface_size("0x10").is_err());
        assert!(parse_surface_size("10").is_err());
        assert!(Cli::try_parse_from(["crossmap", "run", "--fps", "0"]).is_err());
    }
}
