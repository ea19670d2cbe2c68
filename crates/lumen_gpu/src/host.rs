//! CPU implementation of the wavefront kernels.
//!
//! Each logical host device owns a full set of ray slots and runs every
//! stage as a rayon pass over them. The kernels mirror the WGSL entry
//! points one for one, so the host platform doubles as a reference for
//! the device backend.

use std::sync::Arc;

use lumen_bvh::FlatBox;
use lumen_core::MaterialModel;
use lumen_math::{cosine_hemisphere, intersect_triangle, reflect, Aabb, Interval, Ray, Vec3};
use rayon::prelude::*;

use crate::device::{ComputeDevice, ComputePlatform, DeviceOutput, FrameParams};
use crate::error::{GpuError, GpuResult};
use crate::graph::Stage;
use crate::packer::{GpuMap, GpuMaterial, GpuScene, MAP_ALPHA, MAP_BUMP, MAP_DIFFUSE, MAP_SPECULAR, SEEDS_PER_PIXEL};
use crate::ray::{GpuRay, Mwc, NO_HIT, STATUS_IDLE, STATUS_TRACE};

/// Offset applied to scattered ray origins along the normal.
const SURFACE_OFFSET: f32 = 1e-4;

/// Rayon-backed platform with a configurable number of logical devices.
pub struct HostPlatform {
    devices: usize,
    chunk: usize,
    scene: Option<Arc<GpuScene>>,
}

impl HostPlatform {
    /// `chunk` is the smallest run of slots a rayon task processes.
    pub fn new(devices: usize, chunk: usize) -> Self {
        Self {
            devices: devices.max(1),
            chunk: chunk.max(1),
            scene: None,
        }
    }
}

impl ComputePlatform for HostPlatform {
    fn name(&self) -> &str {
        "host"
    }

    fn device_count(&self) -> usize {
        self.devices
    }

    fn upload_scene(&mut self, scene: &GpuScene) -> GpuResult<()> {
        self.scene = Some(Arc::new(scene.clone()));
        log::debug!("Host platform holds {} faces", scene.face_count());
        Ok(())
    }

    fn begin_frame(
        &mut self,
        params: &FrameParams,
        seeds: &[u32],
    ) -> GpuResult<Vec<Box<dyn ComputeDevice>>> {
        let scene = self.scene.clone().ok_or(GpuError::NoScene)?;
        let pixels = params.pixels();
        let per_device = pixels * SEEDS_PER_PIXEL;
        let expected = per_device * self.devices;
        if seeds.len() < expected {
            return Err(GpuError::SeedPool {
                expected,
                found: seeds.len(),
            });
        }

        let devices = (0..self.devices)
            .map(|d| {
                let device = HostDevice {
                    name: format!("host:{d}"),
                    scene: Arc::clone(&scene),
                    params: *params,
                    rays: vec![GpuRay::default(); pixels],
                    seeds: seeds[d * per_device..(d + 1) * per_device].to_vec(),
                    output: DeviceOutput::zeroed(pixels),
                    chunk: self.chunk,
                };
                Box::new(device) as Box<dyn ComputeDevice>
            })
            .collect();
        Ok(devices)
    }
}

struct HostDevice {
    name: String,
    scene: Arc<GpuScene>,
    params: FrameParams,
    rays: Vec<GpuRay>,
    seeds: Vec<u32>,
    output: DeviceOutput,
    chunk: usize,
}

impl ComputeDevice for HostDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&mut self, stage: Stage) -> GpuResult<()> {
        let params = &self.params;
        let scene = &*self.scene;
        let chunk = self.chunk;

        match stage {
            Stage::Collect => self
                .rays
                .par_iter_mut()
                .zip(self.seeds.par_chunks_mut(SEEDS_PER_PIXEL))
                .zip(self.output.counts.par_iter())
                .enumerate()
                .with_min_len(chunk)
                .for_each(|(i, ((ray, seeds), &count))| collect(params, i, ray, seeds, count)),
            Stage::Traverse => self
                .rays
                .par_iter_mut()
                .with_min_len(chunk)
                .for_each(|ray| traverse(params, scene, ray)),
            Stage::Fetch => self
                .rays
                .par_iter_mut()
                .with_min_len(chunk)
                .for_each(|ray| fetch(scene, ray)),
            Stage::Bounce => self
                .rays
                .par_iter_mut()
                .zip(self.seeds.par_chunks_mut(SEEDS_PER_PIXEL))
                .zip(self.output.output.par_iter_mut())
                .zip(self.output.counts.par_iter_mut())
                .with_min_len(chunk)
                .for_each(|(((ray, seeds), output), count)| {
                    bounce(params, scene, ray, seeds, output, count)
                }),
        }
        Ok(())
    }

    fn drain(&mut self) -> GpuResult<DeviceOutput> {
        let pixels = self.rays.len();
        Ok(std::mem::replace(&mut self.output, DeviceOutput::zeroed(pixels)))
    }
}

/// Respawn an idle slot as a jittered camera ray while its pixel still
/// needs samples.
fn collect(params: &FrameParams, index: usize, ray: &mut GpuRay, seeds: &mut [u32], count: u32) {
    if !ray.is_idle() || count >= params.sample_max {
        return;
    }

    let cam = &params.camera;
    let width = cam.width.max(1) as usize;
    let x = (index % width) as f32;
    let y = (index / width) as f32;

    let mut rng = Mwc::new(seeds);
    let jx = rng.next_f32();
    let jy = rng.next_f32();

    let origin = Vec3::from_array(cam.origin);
    let focus = Vec3::from_array(cam.focus);
    let plane = origin + Vec3::from_array(cam.d_x) * (x + jx) + Vec3::from_array(cam.d_y) * (y + jy);

    *ray = GpuRay {
        pixel_id: index as i32,
        status: STATUS_TRACE,
        mask: [1.0; 3],
        ..GpuRay::default()
    };
    ray.aim(focus, (focus - plane).normalize_or_zero());
}

fn box_bounds(b: &FlatBox) -> Aabb {
    Aabb {
        min: Vec3::from_array(b.min),
        max: Vec3::from_array(b.max),
    }
}

/// Closest hit through the flattened hierarchy.
fn traverse(params: &FrameParams, scene: &GpuScene, ray: &mut GpuRay) {
    if ray.status != STATUS_TRACE {
        return;
    }

    let r = Ray::new(ray.origin(), ray.direction());
    let boost_count = params.boost_count as usize;
    let face_count = scene.face_count();
    // The boost tier is a contiguous copy of the top levels, kept in its own
    // small buffer so the boxes every ray visits stay cache resident. Indices
    // are shared with `boxes`, so below the tier the walk falls through.
    let fetch_box = |i: usize| {
        if i < boost_count {
            scene.boost.get(i)
        } else {
            scene.boxes.get(i)
        }
    };

    let mut range = Interval::FORWARD;
    let mut hit = (NO_HIT, 0.0, 0.0);

    // Reject against the root before touching the rest of the tree
    let root_hit = fetch_box(0).and_then(|root| box_bounds(root).hit(&r, range));
    if root_hit.is_some() {
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            let Some(b) = fetch_box(i) else { continue };
            if box_bounds(b).hit(&r, range).is_none() {
                continue;
            }
            if b.is_leaf() {
                let slots = b.face_range();
                for slot in slots.start..slots.end.min(face_count) {
                    if let Some(h) = intersect_triangle(&r, &scene.face_vertices(slot), range) {
                        range = range.with_max(h.t);
                        hit = (slot as i32, h.u, h.v);
                    }
                }
            } else {
                stack.extend(b.child_indices());
            }
        }
    }

    ray.hit_ind = hit.0;
    ray.u = hit.1;
    ray.v = hit.2;
    ray.t = if hit.0 == NO_HIT { f32::INFINITY } else { range.max };
}

/// Bilinear lookup into the atlas; coordinates wrap.
fn sample_map(atlas: &[u8], map: &GpuMap, u: f32, v: f32) -> Vec3 {
    let (w, h) = (map.width.max(1) as u32, map.height.max(1) as u32);
    let x = u.rem_euclid(1.0) * (w as f32 - 1.0);
    let y = (1.0 - v.rem_euclid(1.0)) * (h as f32 - 1.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let texel = |tx: u32, ty: u32| -> Vec3 {
        let idx = map.offset as usize + (ty.min(h - 1) * w + tx.min(w - 1)) as usize * 3;
        match atlas.get(idx..idx + 3) {
            Some(p) => Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0,
            None => Vec3::ZERO,
        }
    };

    let top = texel(x0, y0).lerp(texel(x1, y0), x.fract());
    let bottom = texel(x0, y1).lerp(texel(x1, y1), x.fract());
    top.lerp(bottom, y.fract())
}

fn material_of<'a>(scene: &'a GpuScene, slot: usize) -> Option<&'a GpuMaterial> {
    let index = *scene.material_indices.get(slot)?;
    scene.materials.get(usize::try_from(index).ok()?)
}

/// Load shading data at the hit into the ray.
fn fetch(scene: &GpuScene, ray: &mut GpuRay) {
    if ray.status != STATUS_TRACE || ray.hit_ind < 0 {
        return;
    }
    let slot = ray.hit_ind as usize;
    let Some(material) = material_of(scene, slot) else {
        ray.hit_ind = NO_HIT;
        return;
    };

    let (u, v) = (ray.u, ray.v);
    let w = 1.0 - u - v;
    let base = slot * 3;
    let lerp3 = |attr: &[lumen_math::Float4]| -> Vec3 {
        attr[base].xyz() * w + attr[base + 1].xyz() * u + attr[base + 2].xyz() * v
    };

    let verts = scene.face_vertices(slot);
    let geometric = (verts[1] - verts[0]).cross(verts[2] - verts[0]).normalize_or_zero();
    let mut normal = lerp3(scene.normals.as_slice()).normalize_or_zero();
    if normal == Vec3::ZERO {
        normal = geometric;
    }
    let uv = lerp3(scene.tex_coords.as_slice());

    let sample = |slot: usize| -> Option<Vec3> {
        let map = &material.maps[slot];
        map.is_present().then(|| sample_map(&scene.textures, map, uv.x, uv.y))
    };

    let mut diff = Vec3::from_array(material.kd);
    if let Some(c) = sample(MAP_DIFFUSE) {
        diff *= c;
    }
    let mut spec = Vec3::from_array(material.ks);
    if let Some(c) = sample(MAP_SPECULAR) {
        spec *= c;
    }
    if let Some(c) = sample(MAP_BUMP) {
        let b = c * 2.0 - Vec3::ONE;
        let tangent = scene.tangents[slot].xyz();
        let bitangent = scene.bitangents[slot].xyz();
        let bumped = (tangent * b.x + bitangent * b.y + normal * b.z).normalize_or_zero();
        if bumped != Vec3::ZERO {
            normal = bumped;
        }
    }
    let alpha = match sample(MAP_ALPHA) {
        Some(c) => material.d * c.x,
        None => 1.0,
    };

    ray.diff = diff.to_array();
    ray.spec = spec.to_array();
    ray.trans = material.tf;
    ray.emission = material.ke;
    ray.normal = normal.to_array();
    ray.model = material.model;
    ray.ior = material.ni;
    ray.alpha = alpha;
}

fn finish(ray: &mut GpuRay, color: Vec3, output: &mut Vec3, count: &mut u32) {
    *output += color;
    *count += 1;
    ray.color = color.to_array();
    ray.status = STATUS_IDLE;
}

/// Accumulate radiance at the hit and scatter the path.
fn bounce(
    params: &FrameParams,
    scene: &GpuScene,
    ray: &mut GpuRay,
    seeds: &mut [u32],
    output: &mut Vec3,
    count: &mut u32,
) {
    if ray.status != STATUS_TRACE {
        return;
    }

    let mut rng = Mwc::new(seeds);
    let mut color = Vec3::from_array(ray.color);
    let mut mask = Vec3::from_array(ray.mask);

    if ray.hit_ind < 0 {
        color += mask * params.background();
        finish(ray, color, output, count);
        return;
    }

    color += mask * Vec3::from_array(ray.emission);
    let model = match ray.model {
        0 => MaterialModel::Diffuse,
        1 => MaterialModel::Specular,
        2 => MaterialModel::Refractive,
        _ => MaterialModel::Emissive,
    };
    if model == MaterialModel::Emissive {
        finish(ray, color, output, count);
        return;
    }

    let dir = ray.direction();
    let hit_point = ray.origin() + dir * ray.t;

    // Cutout: continue straight through without counting a bounce
    if ray.alpha < 1.0 && rng.next_f32() >= ray.alpha {
        ray.color = color.to_array();
        ray.aim(hit_point + dir * SURFACE_OFFSET, dir);
        return;
    }

    let mut normal = Vec3::from_array(ray.normal);
    let entering = normal.dot(dir) < 0.0;
    if !entering {
        normal = -normal;
    }

    ray.bounce_count += 1;
    if ray.bounce_count as u32 >= params.max_depth {
        finish(ray, color, output, count);
        return;
    }

    let diff = Vec3::from_array(ray.diff);
    let diffuse_dir = |rng: &mut Mwc| cosine_hemisphere(normal, rng.next_f32(), rng.next_f32());

    let new_dir = match model {
        MaterialModel::Specular => {
            let spec = Vec3::from_array(ray.spec);
            let total = spec.max_element() + diff.max_element();
            if total <= 0.0 {
                finish(ray, color, output, count);
                return;
            }
            let p = spec.max_element() / total;
            if rng.next_f32() < p {
                let ns = material_of(scene, ray.hit_ind as usize).map_or(0.0, |m| m.ns);
                let mirror = reflect(dir, normal);
                let lobe = cosine_hemisphere(mirror, rng.next_f32(), rng.next_f32());
                let glossy = (mirror + (lobe - mirror) / (1.0 + ns.max(0.0))).normalize_or_zero();
                mask *= spec / p;
                if glossy.dot(normal) > 0.0 {
                    glossy
                } else {
                    mirror
                }
            } else {
                mask *= diff / (1.0 - p);
                diffuse_dir(&mut rng)
            }
        }
        MaterialModel::Refractive => {
            let ior = if ray.ior > 0.0 { ray.ior } else { 1.0 };
            let eta = if entering { 1.0 / ior } else { ior };
            let cos_i = (-dir.dot(normal)).clamp(0.0, 1.0);
            let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
            let fresnel = r0 + (1.0 - r0) * (1.0 - cos_i).powi(5);
            let sin2_t = eta * eta * (1.0 - cos_i * cos_i);

            if sin2_t > 1.0 || rng.next_f32() < fresnel {
                reflect(dir, normal)
            } else {
                mask *= Vec3::from_array(ray.trans);
                (dir * eta + normal * (eta * cos_i - (1.0 - sin2_t).sqrt())).normalize_or_zero()
            }
        }
        _ => {
            mask *= diff;
            diffuse_dir(&mut rng)
        }
    };

    if ray.bounce_count as u32 >= params.rr_depth {
        let q = mask.max_element().clamp(0.05, 0.95);
        if rng.next_f32() >= q {
            finish(ray, color, output, count);
            return;
        }
        mask /= q;
    }

    let side = if new_dir.dot(normal) >= 0.0 { 1.0 } else { -1.0 };
    ray.color = color.to_array();
    ray.mask = mask.to_array();
    ray.aim(hit_point + normal * (SURFACE_OFFSET * side), new_dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::{GpuCamera, SeedLayout};
    use lumen_bvh::{flatten, flatten_faces, FlattenConfig, SbvhBuilder, SbvhConfig};
    use lumen_core::{Camera, Face, Material, Scene};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn packed(scene: &mut Scene, pixels: usize) -> GpuScene {
        let sbvh = SbvhBuilder::new(SbvhConfig::default()).build(&scene.faces);
        let flat = flatten(&sbvh, &FlattenConfig::default());
        flatten_faces(scene, &flat);
        GpuScene::pack(scene, &flat, SeedLayout::new(pixels, 1, 1), &mut StdRng::seed_from_u64(9)).unwrap()
    }

    fn params(scene: &GpuScene, camera: &Camera, w: u32, h: u32) -> FrameParams {
        FrameParams {
            camera: GpuCamera::new(&camera.params(w, h), w, h),
            background: [1.0; 3],
            sample_max: 1,
            max_depth: 8,
            rr_depth: 3,
            boost_count: scene.boost.len() as u32,
            face_count: scene.face_count() as u32,
        }
    }

    fn traced(origin: Vec3, dir: Vec3) -> GpuRay {
        let mut ray = GpuRay {
            status: STATUS_TRACE,
            mask: [1.0; 3],
            ..GpuRay::default()
        };
        ray.aim(origin, dir);
        ray
    }

    #[test]
    fn test_traverse_finds_closest_cube_face() {
        let mut scene = Scene::new("cube");
        let mat = scene.add_material(Material::default());
        for face in Scene::cube(Vec3::ZERO, 1.0, mat) {
            scene.add_face(face);
        }
        let gpu = packed(&mut scene, 1);
        let p = params(&gpu, &Camera::default(), 1, 1);

        let mut ray = traced(Vec3::new(0.2, 0.3, 5.0), -Vec3::Z);
        traverse(&p, &gpu, &mut ray);
        assert!(ray.hit_ind >= 0);
        assert!((ray.t - 4.0).abs() < 1e-4, "t = {}", ray.t);

        let mut miss = traced(Vec3::new(3.0, 0.0, 5.0), -Vec3::Z);
        traverse(&p, &gpu, &mut miss);
        assert_eq!(miss.hit_ind, NO_HIT);
    }

    #[test]
    fn test_traverse_reads_top_levels_from_boost() {
        let mut scene = Scene::new("cube");
        let mat = scene.add_material(Material::default());
        for face in Scene::cube(Vec3::ZERO, 1.0, mat) {
            scene.add_face(face);
        }
        let mut gpu = packed(&mut scene, 1);
        assert!(!gpu.boost.is_empty());
        let p = params(&gpu, &Camera::default(), 1, 1);

        // Shrink the root in the full array only; the boosted copy still covers the cube
        gpu.boxes[0].min = [100.0; 3];
        gpu.boxes[0].max = [101.0; 3];

        let mut ray = traced(Vec3::new(0.2, 0.3, 5.0), -Vec3::Z);
        traverse(&p, &gpu, &mut ray);
        assert!((ray.t - 4.0).abs() < 1e-4, "t = {}", ray.t);

        // Without the tier the shrunken root rejects the ray up front
        let unboosted = FrameParams { boost_count: 0, ..p };
        let mut ray = traced(Vec3::new(0.2, 0.3, 5.0), -Vec3::Z);
        traverse(&unboosted, &gpu, &mut ray);
        assert_eq!(ray.hit_ind, NO_HIT);
        assert_eq!(ray.t, f32::INFINITY);
    }

    #[test]
    fn test_traverse_matches_brute_force() {
        let mut scene = Scene::new("stack");
        let mat = scene.add_material(Material::default());
        for i in 0..40 {
            let z = i as f32 * 0.25;
            let x = (i % 5) as f32 * 0.3;
            scene.add_face(Face::flat(
                [Vec3::new(x - 1.0, -1.0, z), Vec3::new(x + 1.0, -1.0, z), Vec3::new(x, 1.0, z)],
                mat,
            ));
        }
        let gpu = packed(&mut scene, 1);
        let p = params(&gpu, &Camera::default(), 1, 1);

        for k in 0..25 {
            let origin = Vec3::new(k as f32 * 0.1 - 1.0, (k % 7) as f32 * 0.2 - 0.6, -3.0);
            let mut ray = traced(origin, Vec3::new(0.05, 0.01, 1.0).normalize());
            traverse(&p, &gpu, &mut ray);

            let r = Ray::new(ray.origin(), ray.direction());
            let brute = (0..gpu.face_count())
                .filter_map(|s| intersect_triangle(&r, &gpu.face_vertices(s), Interval::FORWARD))
                .map(|h| h.t)
                .fold(f32::INFINITY, f32::min);

            if brute.is_finite() {
                assert!(ray.hit_ind >= 0);
                assert!((ray.t - brute).abs() < 1e-4);
            } else {
                assert_eq!(ray.hit_ind, NO_HIT);
            }
        }
    }

    #[test]
    fn test_collect_respects_sample_max() {
        let mut scene = Scene::new("empty");
        let mat = scene.add_material(Material::default());
        scene.add_face(Face::flat([Vec3::X, Vec3::Y, Vec3::Z], mat));
        let gpu = packed(&mut scene, 4);
        let p = params(&gpu, &Camera::new(Vec3::new(0.0, 0.0, 5.0), -Vec3::Z), 2, 2);

        let mut seeds = [7u32, 11];
        let mut ray = GpuRay::default();
        collect(&p, 3, &mut ray, &mut seeds, 1);
        assert!(ray.is_idle());

        collect(&p, 3, &mut ray, &mut seeds, 0);
        assert_eq!(ray.status, STATUS_TRACE);
        assert_eq!(ray.pixel_id, 3);
        assert_eq!(ray.mask, [1.0; 3]);
        assert!((ray.direction().length() - 1.0).abs() < 1e-5);
        assert!(ray.direction().z < 0.0);
    }

    #[test]
    fn test_bounce_miss_adds_background() {
        let gpu = GpuScene::default();
        let mut p = params(&gpu, &Camera::default(), 1, 1);
        p.background = [0.25, 0.5, 1.0];

        let mut ray = traced(Vec3::ZERO, Vec3::Z);
        ray.mask = [0.5; 3];
        ray.hit_ind = NO_HIT;
        let mut seeds = [3u32, 5];
        let mut out = Vec3::ZERO;
        let mut count = 0;
        bounce(&p, &gpu, &mut ray, &mut seeds, &mut out, &mut count);

        assert_eq!(out, Vec3::new(0.125, 0.25, 0.5));
        assert_eq!(count, 1);
        assert!(ray.is_idle());
    }

    #[test]
    fn test_bounce_terminates_at_max_depth() {
        let gpu = GpuScene::default();
        let mut p = params(&gpu, &Camera::default(), 1, 1);
        p.max_depth = 2;

        let mut ray = traced(Vec3::ZERO, Vec3::Z);
        ray.hit_ind = 0;
        ray.t = 1.0;
        ray.normal = [0.0, 0.0, -1.0];
        ray.diff = [0.5; 3];
        ray.alpha = 1.0;
        ray.bounce_count = 1;
        let mut seeds = [3u32, 5];
        let mut out = Vec3::ZERO;
        let mut count = 0;
        bounce(&p, &gpu, &mut ray, &mut seeds, &mut out, &mut count);

        assert_eq!(count, 1);
        assert_eq!(out, Vec3::ZERO);
        assert!(ray.is_idle());
    }

    #[test]
    fn test_diffuse_bounce_scatters_to_hit_side() {
        let gpu = GpuScene::default();
        let p = params(&gpu, &Camera::default(), 1, 1);

        for seed in 1..50u32 {
            let mut ray = traced(Vec3::ZERO, Vec3::Z);
            ray.hit_ind = 0;
            ray.t = 2.0;
            ray.normal = [0.0, 0.0, 1.0];
            ray.diff = [0.5; 3];
            ray.alpha = 1.0;
            let mut seeds = [seed, seed * 7 + 1];
            let mut out = Vec3::ZERO;
            let mut count = 0;
            bounce(&p, &gpu, &mut ray, &mut seeds, &mut out, &mut count);

            assert_eq!(count, 0);
            assert_eq!(ray.status, STATUS_TRACE);
            assert_eq!(ray.bounce_count, 1);
            assert_eq!(ray.mask, [0.5; 3]);
            // The normal faced away from the ray, so it was flipped
            assert!(ray.direction().z < 0.0);
            assert!(ray.origin().z < 2.0);
        }
    }

    #[test]
    fn test_sample_map_matches_texture_map() {
        let map = lumen_core::TextureMap::new(2, 2, vec![0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        let mut atlas = vec![9u8; 5];
        atlas.extend_from_slice(&map.pixels);
        let gpu_map = GpuMap {
            offset: 5,
            width: 2,
            height: 2,
            _pad: 0,
        };

        for &(u, v) in &[(0.0, 0.0), (0.25, 0.75), (0.5, 0.5), (0.9, 0.1), (1.3, -0.2)] {
            let host = sample_map(&atlas, &gpu_map, u, v);
            assert!((host - map.sample(u, v)).length() < 1e-5, "uv ({u}, {v})");
        }
    }
}
