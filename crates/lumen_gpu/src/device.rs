//! Backend-neutral device and platform traits.
//!
//! A platform owns the scene upload shared by its devices. Each frame it
//! hands out one [`ComputeDevice`] per device, which the scheduler drives
//! on its own thread until the graph is exhausted and then drains.

use bytemuck::{Pod, Zeroable};
use lumen_math::Vec3;

use crate::error::GpuResult;
use crate::graph::Stage;
use crate::packer::{GpuCamera, GpuScene};

/// Per-frame uniforms shared by every kernel, 96 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FrameParams {
    pub camera: GpuCamera,
    pub background: [f32; 3],
    /// Completed paths per pixel after which collect stops respawning
    pub sample_max: u32,
    pub max_depth: u32,
    pub rr_depth: u32,
    /// Length of the boost prefix
    pub boost_count: u32,
    pub face_count: u32,
}

impl FrameParams {
    pub fn pixels(&self) -> usize {
        self.camera.width as usize * self.camera.height as usize
    }

    pub fn background(&self) -> Vec3 {
        Vec3::from_array(self.background)
    }
}

/// Accumulators read back from one device after a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceOutput {
    /// Summed radiance per pixel
    pub output: Vec<Vec3>,
    /// Completed paths per pixel
    pub counts: Vec<u32>,
}

impl DeviceOutput {
    pub fn zeroed(pixels: usize) -> Self {
        Self {
            output: vec![Vec3::ZERO; pixels],
            counts: vec![0; pixels],
        }
    }

    pub fn total_samples(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }
}

/// One device prepared for a frame.
pub trait ComputeDevice: Send {
    fn name(&self) -> &str;

    /// Run one stage over every slot. Stages on a device run in call order.
    fn dispatch(&mut self, stage: Stage) -> GpuResult<()>;

    /// Wait for outstanding work and read back the accumulators.
    fn drain(&mut self) -> GpuResult<DeviceOutput>;
}

/// A group of devices sharing one scene upload.
pub trait ComputePlatform: Send {
    fn name(&self) -> &str;

    fn device_count(&self) -> usize;

    /// Copy a packed scene to every device, replacing any previous upload.
    fn upload_scene(&mut self, scene: &GpuScene) -> GpuResult<()>;

    /// Prepare every device for a frame. `seeds` holds
    /// `device_count()` consecutive per-device chunks.
    fn begin_frame(
        &mut self,
        params: &FrameParams,
        seeds: &[u32],
    ) -> GpuResult<Vec<Box<dyn ComputeDevice>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_params_layout() {
        assert_eq!(std::mem::size_of::<FrameParams>(), 96);
    }

    #[test]
    fn test_device_output_totals() {
        let mut out = DeviceOutput::zeroed(3);
        out.counts = vec![1, 0, 4];
        assert_eq!(out.total_samples(), 5);
        assert_eq!(out.output.len(), 3);
    }
}
