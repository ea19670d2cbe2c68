use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use lumen_bvh::{FlattenConfig, SbvhConfig};
use lumen_core::{load_obj, Camera};
use lumen_gpu::{to_rgba8, Backend, RenderConfig, Renderer, SceneUpdate};
use lumen_math::{Aabb, Vec3};
use serde::Deserialize;

const USAGE: &str = "usage: lumen <scene.obj> [--config cfg.json] [--out out.png] \
[--width W] [--height H] [--samples N] [--host]";

/// Command line options
#[derive(Debug, Clone, PartialEq)]
struct Args {
    scene: PathBuf,
    config: Option<PathBuf>,
    out: PathBuf,
    width: u32,
    height: u32,
    samples: Option<u32>,
    host: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut scene = None;
    let mut parsed = Args {
        scene: PathBuf::new(),
        config: None,
        out: PathBuf::from("render.png"),
        width: 640,
        height: 480,
        samples: None,
        host: false,
    };

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--out" => parsed.out = PathBuf::from(value("--out")?),
            "--width" => parsed.width = value("--width")?.parse().context("--width expects an integer")?,
            "--height" => parsed.height = value("--height")?.parse().context("--height expects an integer")?,
            "--samples" => parsed.samples = Some(value("--samples")?.parse().context("--samples expects an integer")?),
            "--host" => parsed.host = true,
            flag if flag.starts_with("--") => bail!("unknown option '{flag}'\n{USAGE}"),
            path if scene.is_none() => scene = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument '{extra}'\n{USAGE}"),
        }
    }

    if parsed.width == 0 || parsed.height == 0 {
        bail!("image size must be non-zero");
    }
    parsed.scene = scene.with_context(|| format!("missing scene path\n{USAGE}"))?;
    Ok(parsed)
}

/// Optional JSON overrides, every section may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    render: RenderConfig,
    sbvh: SbvhConfig,
    flatten: FlattenConfig,
    camera: Option<Camera>,
}

fn load_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Place the camera on +Z looking down -Z so the whole scene fits the
/// horizontal field of view.
fn frame_camera(bounds: &Aabb, width: u32, height: u32) -> Camera {
    let aspect = height as f32 / width.max(1) as f32;
    let lens = Camera::default().with_lens(1.0, aspect, 60.0);
    if bounds.is_empty() {
        return Camera::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z).with_lens(lens.width, lens.height, lens.hfov);
    }

    let center = bounds.centroid();
    let extent = bounds.extent();
    let radius = 0.5 * extent.x.max(extent.y / aspect.max(1e-3));
    let distance = radius / (lens.hfov.to_radians() / 2.0).tan() + 0.5 * extent.z;

    // The view plane sits behind the focus by the focal distance
    let position = center + Vec3::Z * (distance * 1.1 + lens.focal_distance());
    Camera::new(position, -Vec3::Z).with_lens(lens.width, lens.height, lens.hfov)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let mut render_config = file.render;
    if let Some(samples) = args.samples {
        render_config.samples = samples;
    }
    if args.host {
        render_config.backend = Backend::Host;
    }

    let start = Instant::now();
    let scene = load_obj(&args.scene)
        .with_context(|| format!("failed to load {}", args.scene.display()))?;
    let camera = file
        .camera
        .unwrap_or_else(|| frame_camera(&scene.bounds(), args.width, args.height));
    log::info!("Loaded '{}' in {:.2?}", scene.name, start.elapsed());

    let mut renderer = Renderer::new(render_config).context("failed to set up compute devices")?;
    renderer
        .set_scene(scene, &file.sbvh, &file.flatten)
        .context("failed to prepare scene")?;

    let pixels = renderer
        .render(&camera, args.width, args.height, render_config.samples, SceneUpdate::Reuse)
        .context("render failed")?;

    let rgba = to_rgba8(&pixels);
    image::save_buffer(&args.out, &rgba, args.width, args.height, image::ColorType::Rgba8)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    log::info!("Wrote {} in {:.2?} total", args.out.display(), start.elapsed());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = args(&["scene.obj"]).unwrap();
        assert_eq!(parsed.scene, PathBuf::from("scene.obj"));
        assert_eq!(parsed.out, PathBuf::from("render.png"));
        assert_eq!((parsed.width, parsed.height), (640, 480));
        assert_eq!(parsed.samples, None);
        assert!(!parsed.host);
    }

    #[test]
    fn test_parse_all_options() {
        let parsed = args(&[
            "--width", "32", "cube.obj", "--height", "16", "--samples", "8", "--host", "--out", "a.png",
            "--config", "c.json",
        ])
        .unwrap();
        assert_eq!(parsed.scene, PathBuf::from("cube.obj"));
        assert_eq!((parsed.width, parsed.height), (32, 16));
        assert_eq!(parsed.samples, Some(8));
        assert!(parsed.host);
        assert_eq!(parsed.out, PathBuf::from("a.png"));
        assert_eq!(parsed.config, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.obj", "b.obj"]).is_err());
        assert!(args(&["a.obj", "--width"]).is_err());
        assert!(args(&["a.obj", "--width", "wide"]).is_err());
        assert!(args(&["a.obj", "--width", "0"]).is_err());
        assert!(args(&["a.obj", "--fast"]).is_err());
    }

    #[test]
    fn test_file_config_sections_are_optional() {
        let config: FileConfig = serde_json::from_str(r#"{ "render": { "samples": 3 } }"#).unwrap();
        assert_eq!(config.render.samples, 3);
        assert_eq!(config.sbvh, SbvhConfig::default());
        assert!(config.camera.is_none());
    }

    #[test]
    fn test_frame_camera_sees_whole_scene() {
        let bounds = Aabb::from_points(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let camera = frame_camera(&bounds, 200, 100);
        let params = camera.params(200, 100);

        // Rays through the view-plane corners bracket the scene's front face
        let left = (params.focus - params.origin).normalize();
        let t = (params.focus.z - 1.0) / -left.z;
        let hit = params.focus + left * t;
        assert!(hit.x.abs() >= 2.0);
        assert!(camera.position.z > 1.0);
    }
}
