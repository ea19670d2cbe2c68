//! Lumen GPU - scene packing and the wavefront path tracing scheduler.
//!
//! This crate provides:
//!
//! - **Packing**: [`GpuScene`] turns a scene and its flattened BVH into
//!   structure-of-arrays buffers ready for device upload
//! - **Scheduling**: a [`StageGraph`] of collect, traverse, fetch and bounce
//!   stages driven on every [`ComputeDevice`] in parallel
//! - **Backends**: [`HostPlatform`] (rayon, always available) and, with the
//!   `wgpu` feature, `WgpuPlatform` running WGSL kernels
//! - **Compositing**: [`composite`] merges per-device accumulators
//!
//! # Example
//!
//! ```ignore
//! use lumen_gpu::{Renderer, RenderConfig, SceneUpdate};
//!
//! let mut renderer = Renderer::new(RenderConfig::default())?;
//! renderer.set_scene(scene, &SbvhConfig::default(), &FlattenConfig::default())?;
//! let pixels = renderer.render(&camera, 640, 480, 64, SceneUpdate::Reseed)?;
//! ```

pub mod compositor;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod host;
pub mod packer;
pub mod ray;
pub mod renderer;
pub mod scheduler;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use compositor::{composite, composite_devices, to_rgba8};
pub use config::{Backend, RenderConfig};
pub use device::{ComputeDevice, ComputePlatform, DeviceOutput, FrameParams};
pub use error::{GpuError, GpuResult};
pub use graph::{Stage, StageGraph, StageNode};
pub use host::HostPlatform;
pub use packer::{GpuCamera, GpuMap, GpuMaterial, GpuScene, SeedLayout, SEEDS_PER_PIXEL};
pub use ray::GpuRay;
pub use renderer::{discover_platforms, Renderer, SceneUpdate};
pub use scheduler::{run_wavefront, CancelToken};
#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuPlatform;
