//! Render settings.

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

/// Which compute backend the renderer discovers devices on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// wgpu adapters when available, otherwise the host
    #[default]
    Auto,
    /// rayon kernels on the CPU
    Host,
    /// WGSL kernels on every wgpu adapter
    Wgpu,
}

/// Configuration for wavefront rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Completed paths wanted per pixel
    pub samples: u32,
    /// Stage iterations scheduled per requested sample
    pub bounces_per_sample: u32,
    /// Paths end after this many bounces
    pub max_depth: u32,
    /// Russian roulette starts at this bounce
    pub russian_roulette_depth: u32,
    /// Threads per workgroup (device) or rayon chunk size (host)
    pub workgroup_size: u32,
    /// Radiance of rays that leave the scene
    pub background: Vec3,
    pub backend: Backend,
    /// Logical devices exposed by the host platform
    pub host_devices: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            samples: 16,
            bounces_per_sample: 4,
            max_depth: 8,
            russian_roulette_depth: 3,
            workgroup_size: 64,
            background: Vec3::ONE,
            backend: Backend::Auto,
            host_devices: 1,
        }
    }
}

impl RenderConfig {
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_bounces_per_sample(mut self, bounces: u32) -> Self {
        self.bounces_per_sample = bounces;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_russian_roulette_depth(mut self, depth: u32) -> Self {
        self.russian_roulette_depth = depth;
        self
    }

    pub fn with_workgroup_size(mut self, size: u32) -> Self {
        self.workgroup_size = size;
        self
    }

    pub fn with_background(mut self, background: Vec3) -> Self {
        self.background = background;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_host_devices(mut self, devices: usize) -> Self {
        self.host_devices = devices;
        self
    }

    /// Total stage iterations for `samples` requested samples.
    pub fn iterations(&self, samples: u32) -> u32 {
        samples.saturating_mul(self.bounces_per_sample.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterations() {
        let config = RenderConfig::default().with_bounces_per_sample(5);
        assert_eq!(config.iterations(3), 15);
        assert_eq!(config.with_bounces_per_sample(0).iterations(3), 3);
    }

    #[test]
    fn test_json_overrides_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "samples": 4, "backend": "host", "background": [0.0, 0.0, 0.0] }"#).unwrap();
        assert_eq!(config.samples, 4);
        assert_eq!(config.backend, Backend::Host);
        assert_eq!(config.background, Vec3::ZERO);
        assert_eq!(config.max_depth, RenderConfig::default().max_depth);
    }
}
