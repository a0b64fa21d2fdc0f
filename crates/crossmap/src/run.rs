use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use renderer::{
    default_face_names, CubeSource, RenderVariant, Renderer, RendererConfig, ShaderNames,
    DEFAULT_EXECUTION_WIDTH, DEFAULT_REFRESH_RATE, DEFAULT_SHADING_LANGUAGE,
};
use sceneconfig::{SceneConfig, ShaderSection, VariantSetting};
use tracing_subscriber::EnvFilter;

use crate::cli::SceneArgs;

/// Extensions probed, in order, when neither the CLI nor the scene names one.
const FACE_EXTENSIONS: [&str; 5] = ["hdr", "png", "jpg", "jpeg", "bmp"];

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: SceneArgs) -> Result<()> {
    let config = build_config(&args)?;
    Renderer::new(config).run()
}

pub fn check(args: SceneArgs) -> Result<()> {
    let config = build_config(&args)?;
    let report = renderer::check(&config)?;
    println!("variant:  {}", config.variant);
    println!(
        "cubemap:  {} ({edge}x{edge} {:?})",
        config.cube_source,
        report.format,
        edge = report.edge
    );
    println!("glsl:     {}", report.version);
    for shader in &report.shaders {
        println!("shader:   {shader}");
    }
    println!("ok");
    Ok(())
}

/// Merges the optional scene file with command-line overrides.
pub fn build_config(args: &SceneArgs) -> Result<RendererConfig> {
    let scene = match &args.scene {
        Some(path) => SceneConfig::from_path(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => SceneConfig::default(),
    };

    let defaults = RendererConfig::default();
    let variant = args
        .variant
        .or_else(|| scene.variant.map(map_variant))
        .unwrap_or(defaults.variant);

    let config = RendererConfig {
        surface_size: args
            .size
            .or(scene.window.size)
            .unwrap_or(defaults.surface_size),
        title: args
            .title
            .clone()
            .or_else(|| scene.window.title.clone())
            .unwrap_or(defaults.title),
        variant,
        cube_source: resolve_cube_source(args, &scene)?,
        flip_vertical: args.flip_vertical || scene.cubemap.flip_vertical,
        shader_directory: args
            .shaders
            .clone()
            .or_else(|| scene.shaders.directory.clone()),
        shader_names: shader_names(&scene.shaders),
        shading_language: args
            .shading_language
            .clone()
            .or_else(|| scene.shaders.shading_language.clone())
            .unwrap_or_else(|| DEFAULT_SHADING_LANGUAGE.to_string()),
        refresh_rate: args
            .fps
            .or(scene.refresh_rate)
            .unwrap_or(DEFAULT_REFRESH_RATE),
        execution_width: args
            .execution_width
            .or(scene.shaders.execution_width)
            .unwrap_or(DEFAULT_EXECUTION_WIDTH),
    };
    tracing::debug!(?config, "resolved renderer configuration");
    Ok(config)
}

fn map_variant(setting: VariantSetting) -> RenderVariant {
    match setting {
        VariantSetting::ComputePostProcess => RenderVariant::ComputePostProcess,
        VariantSetting::RasterWithCubeSample => RenderVariant::RasterCubeSample,
        VariantSetting::RasterSkyboxOnly => RenderVariant::RasterSkybox,
    }
}

/// CLI strip, then CLI directory, then the scene's strip or directory.
fn resolve_cube_source(args: &SceneArgs, scene: &SceneConfig) -> Result<CubeSource> {
    if let Some(path) = &args.strip {
        return Ok(CubeSource::Strip { path: path.clone() });
    }
    if args.assets.is_none() {
        if let Some(path) = &scene.cubemap.strip {
            return Ok(CubeSource::Strip { path: path.clone() });
        }
    }

    let directory = args
        .assets
        .clone()
        .or_else(|| scene.cubemap.directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    if let Some(extension) = &args.extension {
        return Ok(CubeSource::directory(directory, extension));
    }
    if let Some(faces) = &scene.cubemap.faces {
        let names: [String; 6] = faces
            .clone()
            .try_into()
            .map_err(|faces: Vec<String>| {
                anyhow!("cubemap.faces must list 6 names, found {}", faces.len())
            })?;
        return Ok(CubeSource::Faces { directory, names });
    }
    let extension = match &scene.cubemap.extension {
        Some(extension) => extension.clone(),
        None => detect_extension(&directory),
    };
    Ok(CubeSource::directory(directory, &extension))
}

fn detect_extension(directory: &Path) -> String {
    FACE_EXTENSIONS
        .iter()
        .find(|extension| {
            default_face_names(extension)
                .iter()
                .all(|name| directory.join(name).is_file())
        })
        .unwrap_or(&"png")
        .to_string()
}

fn shader_names(section: &ShaderSection) -> ShaderNames {
    let defaults = ShaderNames::default();
    let pick = |value: &Option<String>, fallback: String| value.clone().unwrap_or(fallback);
    ShaderNames {
        offscreen_vertex: pick(&section.offscreen_vertex, defaults.offscreen_vertex),
        offscreen_fragment: pick(&section.offscreen_fragment, defaults.offscreen_fragment),
        compute: pick(&section.compute, defaults.compute),
        onscreen_vertex: pick(&section.onscreen_vertex, defaults.onscreen_vertex),
        onscreen_fragment: pick(&section.onscreen_fragment, defaults.onscreen_fragment),
        blit_fragment: pick(&section.blit_fragment, defaults.blit_fragment),
    }
}
