//! wgpu platform running the WGSL wavefront kernels.
//!
//! Adapters are grouped by graphics backend, one platform per backend.
//! Every adapter gets its own device, pipelines and copy of the scene.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::device::{ComputeDevice, ComputePlatform, DeviceOutput, FrameParams};
use crate::error::{GpuError, GpuResult};
use crate::graph::Stage;
use crate::packer::{GpuScene, SEEDS_PER_PIXEL};
use crate::ray::GpuRay;

const SHADER: &str = include_str!("shaders/wavefront.wgsl");

/// Storage bindings smaller than this are zero-padded so every runtime
/// array holds at least one element.
const MIN_BUFFER_SIZE: usize = 256;

/// Dispatch limit per grid dimension.
const MAX_GROUPS_X: u32 = 65_535;

const BINDING_FRAME: u32 = 0;
const BINDING_RAYS: u32 = 1;
const BINDING_SEEDS: u32 = 2;
const BINDING_OUTPUT: u32 = 3;
const BINDING_COUNTS: u32 = 4;
const BINDING_BOXES: u32 = 5;
const BINDING_BOOST: u32 = 6;
const BINDING_VERTS: u32 = 7;
const BINDING_UVS: u32 = 8;
const BINDING_NORMS: u32 = 9;
const BINDING_FRAMES: u32 = 10;
const BINDING_MATS: u32 = 11;
const BINDING_MAT_IND: u32 = 12;
const BINDING_TEX: u32 = 13;

/// Bindings each entry point reads or writes.
fn stage_bindings(stage: Stage) -> &'static [u32] {
    match stage {
        Stage::Collect => &[BINDING_FRAME, BINDING_RAYS, BINDING_SEEDS, BINDING_COUNTS],
        Stage::Traverse => &[BINDING_FRAME, BINDING_RAYS, BINDING_BOXES, BINDING_BOOST, BINDING_VERTS],
        Stage::Fetch => &[
            BINDING_RAYS,
            BINDING_VERTS,
            BINDING_UVS,
            BINDING_NORMS,
            BINDING_FRAMES,
            BINDING_MATS,
            BINDING_MAT_IND,
            BINDING_TEX,
        ],
        Stage::Bounce => &[
            BINDING_FRAME,
            BINDING_RAYS,
            BINDING_SEEDS,
            BINDING_OUTPUT,
            BINDING_COUNTS,
            BINDING_MATS,
            BINDING_MAT_IND,
        ],
    }
}

fn binding_type(binding: u32) -> wgpu::BindingType {
    match binding {
        BINDING_FRAME => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        _ => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage {
                read_only: binding > BINDING_COUNTS,
            },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    }
}

fn storage_buffer(device: &wgpu::Device, label: &str, bytes: &[u8], usage: wgpu::BufferUsages) -> wgpu::Buffer {
    let contents = if bytes.len() < MIN_BUFFER_SIZE {
        let mut padded = bytes.to_vec();
        padded.resize(MIN_BUFFER_SIZE, 0);
        std::borrow::Cow::Owned(padded)
    } else {
        std::borrow::Cow::Borrowed(bytes)
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &contents,
        usage: wgpu::BufferUsages::STORAGE | usage,
    })
}

/// Device, queue and the four stage pipelines for one adapter.
struct DeviceContext {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    layouts: Vec<wgpu::BindGroupLayout>,
    pipelines: Vec<wgpu::ComputePipeline>,
    workgroup_size: u32,
}

impl DeviceContext {
    fn new(adapter: &wgpu::Adapter, workgroup_size: u32) -> GpuResult<Self> {
        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Lumen Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let source = format!("const WORKGROUP_SIZE: u32 = {workgroup_size}u;\n{SHADER}");
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wavefront"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::ProgramBuild {
                platform: info.name.clone(),
                log: err.to_string(),
            });
        }

        let mut layouts = Vec::with_capacity(Stage::ALL.len());
        let mut pipelines = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = stage_bindings(stage)
                .iter()
                .map(|&binding| wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: binding_type(binding),
                    count: None,
                })
                .collect();

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(stage.entry_point()),
                entries: &entries,
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(stage.entry_point()),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(stage.entry_point()),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: stage.entry_point(),
                compilation_options: Default::default(),
                cache: None,
            });
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(GpuError::MissingEntryPoint {
                    stage,
                    message: err.to_string(),
                });
            }

            layouts.push(layout);
            pipelines.push(pipeline);
        }

        log::info!(
            "Initialized {} ({:?}, {:?}) with workgroup size {}",
            info.name,
            info.backend,
            info.device_type,
            workgroup_size
        );

        Ok(Self {
            name: info.name,
            device,
            queue,
            layouts,
            pipelines,
            workgroup_size,
        })
    }
}

/// Scene arrays resident on one device.
struct SceneBuffers {
    boxes: wgpu::Buffer,
    boost: wgpu::Buffer,
    verts: wgpu::Buffer,
    uvs: wgpu::Buffer,
    norms: wgpu::Buffer,
    frames: wgpu::Buffer,
    mats: wgpu::Buffer,
    mat_ind: wgpu::Buffer,
    tex: wgpu::Buffer,
}

impl SceneBuffers {
    fn upload(device: &wgpu::Device, scene: &GpuScene) -> Self {
        let read = wgpu::BufferUsages::empty();
        Self {
            boxes: storage_buffer(device, "boxes", bytemuck::cast_slice(&scene.boxes), read),
            boost: storage_buffer(device, "boost", bytemuck::cast_slice(&scene.boost), read),
            verts: storage_buffer(device, "vertices", bytemuck::cast_slice(&scene.vertices), read),
            uvs: storage_buffer(device, "tex_coords", bytemuck::cast_slice(&scene.tex_coords), read),
            norms: storage_buffer(device, "normals", bytemuck::cast_slice(&scene.normals), read),
            frames: storage_buffer(device, "frames", bytemuck::cast_slice(&scene.frames()), read),
            mats: storage_buffer(device, "materials", bytemuck::cast_slice(&scene.materials), read),
            mat_ind: storage_buffer(device, "material_indices", bytemuck::cast_slice(&scene.material_indices), read),
            tex: storage_buffer(device, "textures", &scene.textures, read),
        }
    }
}

/// All adapters of one graphics backend.
pub struct WgpuPlatform {
    name: String,
    contexts: Vec<Arc<DeviceContext>>,
    scenes: Vec<Option<Arc<SceneBuffers>>>,
}

impl WgpuPlatform {
    /// Enumerate hardware adapters, one platform per backend that has any.
    pub fn discover(workgroup_size: u32) -> GpuResult<Vec<WgpuPlatform>> {
        let workgroup_size = workgroup_size.max(1);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let mut platforms = Vec::new();
        for (name, backend) in [
            ("Vulkan", wgpu::Backends::VULKAN),
            ("Metal", wgpu::Backends::METAL),
            ("DX12", wgpu::Backends::DX12),
        ] {
            let adapters: Vec<wgpu::Adapter> = instance
                .enumerate_adapters(backend)
                .into_iter()
                .filter(|a| a.get_info().device_type != wgpu::DeviceType::Cpu)
                .collect();
            if adapters.is_empty() {
                continue;
            }

            let contexts = adapters
                .iter()
                .map(|adapter| DeviceContext::new(adapter, workgroup_size).map(Arc::new))
                .collect::<GpuResult<Vec<_>>>()?;
            log::info!("Platform {}: {} devices", name, contexts.len());

            platforms.push(WgpuPlatform {
                name: name.to_string(),
                scenes: vec![None; contexts.len()],
                contexts,
            });
        }
        Ok(platforms)
    }
}

impl ComputePlatform for WgpuPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_count(&self) -> usize {
        self.contexts.len()
    }

    fn upload_scene(&mut self, scene: &GpuScene) -> GpuResult<()> {
        for (ctx, slot) in self.contexts.iter().zip(&mut self.scenes) {
            *slot = Some(Arc::new(SceneBuffers::upload(&ctx.device, scene)));
            log::debug!("Uploaded {} faces to {}", scene.face_count(), ctx.name);
        }
        Ok(())
    }

    fn begin_frame(
        &mut self,
        params: &FrameParams,
        seeds: &[u32],
    ) -> GpuResult<Vec<Box<dyn ComputeDevice>>> {
        let pixels = params.pixels();
        let per_device = pixels * SEEDS_PER_PIXEL;
        let expected = per_device * self.contexts.len();
        if seeds.len() < expected {
            return Err(GpuError::SeedPool {
                expected,
                found: seeds.len(),
            });
        }

        let mut devices: Vec<Box<dyn ComputeDevice>> = Vec::with_capacity(self.contexts.len());
        for (d, (ctx, scene)) in self.contexts.iter().zip(&self.scenes).enumerate() {
            let scene = scene.clone().ok_or(GpuError::NoScene)?;
            let chunk = &seeds[d * per_device..(d + 1) * per_device];
            devices.push(Box::new(WgpuDevice::new(Arc::clone(ctx), &scene, params, chunk)));
        }
        Ok(devices)
    }
}

/// One adapter prepared for a frame.
struct WgpuDevice {
    ctx: Arc<DeviceContext>,
    bind_groups: Vec<wgpu::BindGroup>,
    output: wgpu::Buffer,
    counts: wgpu::Buffer,
    pixels: usize,
    groups: (u32, u32),
}

impl WgpuDevice {
    fn new(ctx: Arc<DeviceContext>, scene: &SceneBuffers, params: &FrameParams, seeds: &[u32]) -> Self {
        let device = &ctx.device;
        let pixels = params.pixels();
        let copy_src = wgpu::BufferUsages::COPY_SRC;

        let frame = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let rays = storage_buffer(
            device,
            "rays",
            bytemuck::cast_slice(&vec![GpuRay::default(); pixels]),
            wgpu::BufferUsages::empty(),
        );
        let seeds = storage_buffer(device, "seeds", bytemuck::cast_slice(seeds), wgpu::BufferUsages::empty());
        let output = storage_buffer(device, "output", &vec![0u8; pixels * 16], copy_src);
        let counts = storage_buffer(device, "counts", &vec![0u8; pixels * 4], copy_src);

        let buffer_for = |binding: u32| {
            match binding {
                BINDING_FRAME => &frame,
                BINDING_RAYS => &rays,
                BINDING_SEEDS => &seeds,
                BINDING_OUTPUT => &output,
                BINDING_COUNTS => &counts,
                BINDING_BOXES => &scene.boxes,
                BINDING_BOOST => &scene.boost,
                BINDING_VERTS => &scene.verts,
                BINDING_UVS => &scene.uvs,
                BINDING_NORMS => &scene.norms,
                BINDING_FRAMES => &scene.frames,
                BINDING_MATS => &scene.mats,
                BINDING_MAT_IND => &scene.mat_ind,
                _ => &scene.tex,
            }
        };

        let bind_groups = Stage::ALL
            .iter()
            .map(|&stage| {
                let entries: Vec<wgpu::BindGroupEntry> = stage_bindings(stage)
                    .iter()
                    .map(|&binding| wgpu::BindGroupEntry {
                        binding,
                        resource: buffer_for(binding).as_entire_binding(),
                    })
                    .collect();
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(stage.entry_point()),
                    layout: &ctx.layouts[stage.index()],
                    entries: &entries,
                })
            })
            .collect();

        let total = (pixels as u32).div_ceil(ctx.workgroup_size).max(1);
        let groups_x = total.min(MAX_GROUPS_X);
        let groups_y = total.div_ceil(groups_x);

        Self {
            bind_groups,
            output,
            counts,
            pixels,
            groups: (groups_x, groups_y),
            ctx,
        }
    }

    fn read_buffer(&self, source: &wgpu::Buffer, size: u64) -> GpuResult<Vec<u8>> {
        let device = &self.ctx.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| GpuError::Readback("map_async channel closed".into()))??;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.ctx.name
    }

    fn dispatch(&mut self, stage: Stage) -> GpuResult<()> {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(stage.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(stage.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.ctx.pipelines[stage.index()]);
            pass.set_bind_group(0, &self.bind_groups[stage.index()], &[]);
            pass.dispatch_workgroups(self.groups.0, self.groups.1, 1);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Poll);
        Ok(())
    }

    fn drain(&mut self) -> GpuResult<DeviceOutput> {
        let output_bytes = self.read_buffer(&self.output, self.output.size())?;
        let count_bytes = self.read_buffer(&self.counts, self.counts.size())?;

        Ok(DeviceOutput {
            output: output_bytes
                .chunks_exact(16)
                .take(self.pixels)
                .map(|c| {
                    let [r, g, b, _]: [f32; 4] = bytemuck::pod_read_unaligned(c);
                    lumen_math::Vec3::new(r, g, b)
                })
                .collect(),
            counts: count_bytes
                .chunks_exact(4)
                .take(self.pixels)
                .map(bytemuck::pod_read_unaligned::<u32>)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_bindings_fit_default_limits() {
        let limits = wgpu::Limits::default();
        for stage in Stage::ALL {
            let storage = stage_bindings(stage)
                .iter()
                .filter(|&&b| b != BINDING_FRAME)
                .count() as u32;
            assert!(storage <= limits.max_storage_buffers_per_shader_stage, "{stage}");
        }
    }

    #[test]
    fn test_shader_declares_every_entry_point() {
        for stage in Stage::ALL {
            let decl = format!("fn {}(", stage.entry_point());
            assert!(SHADER.contains(&decl), "missing {decl}");
        }
        assert!(!SHADER.contains("const WORKGROUP_SIZE"));
    }

    #[test]
    fn test_writable_bindings() {
        let writable = |b: u32| {
            matches!(
                binding_type(b),
                wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    ..
                }
            )
        };
        for b in [BINDING_RAYS, BINDING_SEEDS, BINDING_OUTPUT, BINDING_COUNTS] {
            assert!(writable(b));
        }
        for b in BINDING_BOXES..=BINDING_TEX {
            assert!(!writable(b));
        }
    }
}
