//! Per-slot path state carried between wavefront stages.

use bytemuck::{Pod, Zeroable};
use lumen_math::Vec3;

/// Slot has no live path and may be respawned by collect.
pub const STATUS_IDLE: u32 = 0;
/// Slot carries a path that still needs tracing.
pub const STATUS_TRACE: u32 = 1;

/// `hit_ind` value for a ray that escaped the scene.
pub const NO_HIT: i32 = -1;

/// One path slot, 160 bytes, shared verbatim with the WGSL kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuRay {
    pub origin: [f32; 3],
    /// Closest hit distance
    pub t: f32,
    pub direction: [f32; 3],
    /// First barycentric coordinate of the hit
    pub u: f32,
    pub inv_dir: [f32; 3],
    /// Second barycentric coordinate of the hit
    pub v: f32,
    /// Diffuse color fetched at the hit
    pub diff: [f32; 3],
    /// Face slot hit, [`NO_HIT`] on a miss
    pub hit_ind: i32,
    pub spec: [f32; 3],
    pub pixel_id: i32,
    pub trans: [f32; 3],
    pub bounce_count: i32,
    /// Shading normal at the hit
    pub normal: [f32; 3],
    pub status: u32,
    /// Radiance gathered so far
    pub color: [f32; 3],
    pub model: u32,
    /// Path throughput
    pub mask: [f32; 3],
    pub ior: f32,
    pub emission: [f32; 3],
    pub alpha: f32,
}

impl Default for GpuRay {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuRay {
    pub fn origin(&self) -> Vec3 {
        Vec3::from_array(self.origin)
    }

    pub fn direction(&self) -> Vec3 {
        Vec3::from_array(self.direction)
    }

    /// Point the ray along `direction` from `origin`, keeping the inverse
    /// direction in sync.
    pub fn aim(&mut self, origin: Vec3, direction: Vec3) {
        self.origin = origin.to_array();
        self.direction = direction.to_array();
        self.inv_dir = direction.recip().to_array();
        self.t = f32::INFINITY;
        self.hit_ind = NO_HIT;
    }

    pub fn is_idle(&self) -> bool {
        self.status == STATUS_IDLE
    }
}

/// Multiply-with-carry generator over a two-word seed slot.
///
/// The same recurrence runs in the WGSL kernels, so host and device
/// produce identical streams for identical seeds.
pub struct Mwc<'a> {
    seeds: &'a mut [u32],
}

impl<'a> Mwc<'a> {
    /// Wrap a slot of at least two seeds.
    pub fn new(seeds: &'a mut [u32]) -> Self {
        debug_assert!(seeds.len() >= 2);
        Self { seeds }
    }

    pub fn next_u32(&mut self) -> u32 {
        let s0 = self.seeds[0];
        let s1 = self.seeds[1];
        let s0 = 36969u32.wrapping_mul(s0 & 65535).wrapping_add(s0 >> 16);
        let s1 = 18000u32.wrapping_mul(s1 & 65535).wrapping_add(s1 >> 16);
        self.seeds[0] = s0;
        self.seeds[1] = s1;
        (s0 << 16).wrapping_add(s1)
    }

    /// Uniform float in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_layout() {
        assert_eq!(std::mem::size_of::<GpuRay>(), 160);
        assert_eq!(std::mem::align_of::<GpuRay>(), 4);
    }

    #[test]
    fn test_aim_resets_hit() {
        let mut ray = GpuRay {
            hit_ind: 7,
            t: 2.0,
            ..Default::default()
        };
        ray.aim(Vec3::ZERO, Vec3::new(0.0, 2.0, -4.0));
        assert_eq!(ray.hit_ind, NO_HIT);
        assert!(ray.t.is_infinite());
        assert_eq!(ray.inv_dir[1], 0.5);
        assert_eq!(ray.inv_dir[2], -0.25);
        assert!(ray.inv_dir[0].is_infinite());
    }

    #[test]
    fn test_mwc_range_and_determinism() {
        let mut a = [12345u32, 67890];
        let mut b = a;
        let xs: Vec<f32> = {
            let mut rng = Mwc::new(&mut a);
            (0..1000).map(|_| rng.next_f32()).collect()
        };
        let ys: Vec<f32> = {
            let mut rng = Mwc::new(&mut b);
            (0..1000).map(|_| rng.next_f32()).collect()
        };
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&x| (0.0..1.0).contains(&x)));

        let mean = xs.iter().sum::<f32>() / xs.len() as f32;
        assert!((mean - 0.5).abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_mwc_advances_seeds() {
        let mut seeds = [1u32, 1];
        let first = Mwc::new(&mut seeds).next_u32();
        assert_eq!(seeds, [36969, 18000]);
        assert_eq!(first, (36969u32 << 16).wrapping_add(18000));
    }
}
