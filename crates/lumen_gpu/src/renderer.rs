//! High-level renderer: owns the scene, its packed snapshot and the
//! platforms it runs on.

use lumen_bvh::{flatten, flatten_faces, FlatBvh, FlattenConfig, SbvhBuilder, SbvhConfig};
use lumen_core::{Camera, Scene};
use lumen_math::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::compositor::composite_devices;
use crate::config::{Backend, RenderConfig};
use crate::device::{ComputePlatform, FrameParams};
use crate::error::{GpuError, GpuResult};
use crate::graph::StageGraph;
use crate::host::HostPlatform;
use crate::packer::{GpuCamera, GpuScene, SeedLayout};
use crate::scheduler::{run_wavefront, CancelToken};

/// What to refresh before a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneUpdate {
    /// Keep the uploaded scene and seeds unless the image size changed
    #[default]
    Reuse,
    /// Draw a fresh seed pool, keeping the geometry
    Reseed,
    /// Rebuild the BVH and repack the whole scene
    Rebuild,
}

/// Find the platforms the configured backend offers.
pub fn discover_platforms(config: &RenderConfig) -> GpuResult<Vec<Box<dyn ComputePlatform>>> {
    let host = || -> Vec<Box<dyn ComputePlatform>> {
        vec![Box::new(HostPlatform::new(
            config.host_devices,
            config.workgroup_size as usize,
        ))]
    };

    match config.backend {
        Backend::Host => Ok(host()),
        Backend::Wgpu => {
            let platforms = wgpu_platforms(config)?;
            if platforms.is_empty() {
                return Err(GpuError::NoDevices);
            }
            Ok(platforms)
        }
        Backend::Auto => match wgpu_platforms(config) {
            Ok(platforms) if !platforms.is_empty() => Ok(platforms),
            Ok(_) => {
                log::warn!("No GPU adapters found, rendering on the host");
                Ok(host())
            }
            Err(e) => {
                log::warn!("GPU backend unavailable ({e}), rendering on the host");
                Ok(host())
            }
        },
    }
}

#[cfg(feature = "wgpu")]
fn wgpu_platforms(config: &RenderConfig) -> GpuResult<Vec<Box<dyn ComputePlatform>>> {
    let platforms = crate::wgpu_backend::WgpuPlatform::discover(config.workgroup_size)?;
    Ok(platforms
        .into_iter()
        .map(|p| Box::new(p) as Box<dyn ComputePlatform>)
        .collect())
}

#[cfg(not(feature = "wgpu"))]
fn wgpu_platforms(_config: &RenderConfig) -> GpuResult<Vec<Box<dyn ComputePlatform>>> {
    Err(GpuError::BackendUnavailable("wgpu"))
}

/// Scene as last built and uploaded.
struct Prepared {
    bvh: FlatBvh,
    packed: GpuScene,
}

pub struct Renderer {
    config: RenderConfig,
    platforms: Vec<Box<dyn ComputePlatform>>,
    rng: StdRng,
    cancel: Option<CancelToken>,
    scene: Option<Scene>,
    sbvh_config: SbvhConfig,
    flatten_config: FlattenConfig,
    prepared: Option<Prepared>,
    layout: SeedLayout,
}

impl Renderer {
    /// Create a renderer on the platforms `config.backend` selects.
    pub fn new(config: RenderConfig) -> GpuResult<Self> {
        let platforms = discover_platforms(&config)?;
        Self::with_platforms(config, platforms)
    }

    pub fn with_platforms(
        config: RenderConfig,
        platforms: Vec<Box<dyn ComputePlatform>>,
    ) -> GpuResult<Self> {
        let devices: usize = platforms.iter().map(|p| p.device_count()).sum();
        if devices == 0 {
            return Err(GpuError::NoDevices);
        }
        for platform in &platforms {
            log::info!("Platform '{}': {} devices", platform.name(), platform.device_count());
        }

        Ok(Self {
            config,
            platforms,
            rng: StdRng::from_entropy(),
            cancel: None,
            scene: None,
            sbvh_config: SbvhConfig::default(),
            flatten_config: FlattenConfig::default(),
            prepared: None,
            layout: SeedLayout::default(),
        })
    }

    /// Fix the seed stream for reproducible renders.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn device_count(&self) -> usize {
        self.platforms.iter().map(|p| p.device_count()).sum()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Edit the scene in place; call `render` with
    /// [`SceneUpdate::Rebuild`] for the change to take effect.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    /// The flattened hierarchy and packed arrays currently uploaded.
    pub fn packed(&self) -> Option<(&FlatBvh, &GpuScene)> {
        self.prepared.as_ref().map(|p| (&p.bvh, &p.packed))
    }

    /// Validate, build and upload a scene.
    pub fn set_scene(
        &mut self,
        scene: Scene,
        sbvh: &SbvhConfig,
        flatten: &FlattenConfig,
    ) -> GpuResult<()> {
        scene.validate()?;
        self.scene = Some(scene);
        self.sbvh_config = *sbvh;
        self.flatten_config = *flatten;
        self.rebuild(self.layout)
    }

    fn rebuild(&mut self, layout: SeedLayout) -> GpuResult<()> {
        let scene = self.scene.as_ref().ok_or(GpuError::NoScene)?;
        scene.validate()?;

        let sbvh = SbvhBuilder::new(self.sbvh_config).build(&scene.faces);
        let bvh = flatten(&sbvh, &self.flatten_config);

        let mut ordered = scene.clone();
        flatten_faces(&mut ordered, &bvh);
        let packed = GpuScene::pack(&ordered, &bvh, layout, &mut self.rng)?;

        for platform in &mut self.platforms {
            platform.upload_scene(&packed)?;
        }
        self.prepared = Some(Prepared { bvh, packed });
        self.layout = layout;
        Ok(())
    }

    /// Render `samples` paths per pixel, returning linear radiance with
    /// row 0 at the top.
    pub fn render(
        &mut self,
        camera: &Camera,
        width: u32,
        height: u32,
        samples: u32,
        update: SceneUpdate,
    ) -> GpuResult<Vec<Vec3>> {
        if self.scene.is_none() {
            return Err(GpuError::NoScene);
        }

        let pixels = width as usize * height as usize;
        let max_devices = self.platforms.iter().map(|p| p.device_count()).max().unwrap_or(0);
        let layout = SeedLayout::new(pixels, max_devices, self.platforms.len());

        match update {
            SceneUpdate::Rebuild => self.rebuild(layout)?,
            SceneUpdate::Reseed => self.reseed(layout)?,
            SceneUpdate::Reuse if layout != self.layout || self.prepared.is_none() => {
                self.reseed(layout)?
            }
            SceneUpdate::Reuse => {}
        }

        let prepared = self.prepared.as_ref().ok_or(GpuError::NoScene)?;
        let packed = &prepared.packed;
        let params = FrameParams {
            camera: GpuCamera::new(&camera.params(width, height), width, height),
            background: self.config.background.to_array(),
            sample_max: samples,
            max_depth: self.config.max_depth,
            rr_depth: self.config.russian_roulette_depth,
            boost_count: packed.boost.len() as u32,
            face_count: packed.face_count() as u32,
        };

        let per_device = layout.per_device();
        let mut devices = Vec::with_capacity(self.device_count());
        for (p, platform) in self.platforms.iter_mut().enumerate() {
            let offset = p * layout.devices * per_device;
            let len = platform.device_count() * per_device;
            let seeds = packed.seeds.get(offset..offset + len).ok_or(GpuError::SeedPool {
                expected: offset + len,
                found: packed.seeds.len(),
            })?;
            devices.extend(platform.begin_frame(&params, seeds)?);
        }

        let graph = StageGraph::wavefront(self.config.iterations(samples) as usize);
        log::info!(
            "Rendering {}x{} at {} spp on {} devices ({} iterations)",
            width,
            height,
            samples,
            devices.len(),
            graph.iterations()
        );

        let outputs = run_wavefront(devices, &graph, self.cancel.as_ref())?;
        Ok(composite_devices(&outputs))
    }

    fn reseed(&mut self, layout: SeedLayout) -> GpuResult<()> {
        match self.prepared.as_mut() {
            Some(prepared) => {
                prepared.packed.reseed(layout, &mut self.rng);
                self.layout = layout;
                Ok(())
            }
            None => self.rebuild(layout),
        }
    }
}
