//! Packing of a scene and its flattened BVH into device-ready arrays.
//!
//! Every array holds fixed-size `Pod` elements and no array references
//! another by pointer, so the whole snapshot can be copied verbatim into
//! device memory.

use bytemuck::{Pod, Zeroable};
use lumen_bvh::{FlatBox, FlatBvh};
use lumen_core::{CameraParams, Face, Material, Scene};
use lumen_math::{Float4, Vec3};
use rand::Rng;

use crate::error::{GpuError, GpuResult};

/// Random seeds reserved per pixel and device.
pub const SEEDS_PER_PIXEL: usize = 2;

/// Map slots inside [`GpuMaterial::maps`].
pub const MAP_DIFFUSE: usize = 0;
pub const MAP_SPECULAR: usize = 1;
pub const MAP_BUMP: usize = 2;
pub const MAP_ALPHA: usize = 3;

/// Location of one texture map inside the atlas.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuMap {
    /// Byte offset into the atlas, `-1` when the map is absent
    pub offset: i32,
    pub width: i32,
    pub height: i32,
    pub _pad: i32,
}

impl GpuMap {
    pub const NONE: GpuMap = GpuMap {
        offset: -1,
        width: 0,
        height: 0,
        _pad: 0,
    };

    pub fn is_present(&self) -> bool {
        self.offset >= 0
    }
}

/// Device material record, 144 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub ka: [f32; 3],
    pub ns: f32,
    pub kd: [f32; 3],
    pub ni: f32,
    pub ks: [f32; 3],
    pub d: f32,
    pub ke: [f32; 3],
    /// `MaterialModel` discriminant
    pub model: u32,
    pub tf: [f32; 3],
    pub tr: f32,
    /// Diffuse, specular, bump and alpha maps
    pub maps: [GpuMap; 4],
}

impl GpuMaterial {
    fn from_material(material: &Material) -> Self {
        Self {
            ka: material.ka.to_array(),
            ns: material.ns,
            kd: material.kd.to_array(),
            ni: material.ni,
            ks: material.ks.to_array(),
            d: material.d,
            ke: material.ke.to_array(),
            model: material.model() as u32,
            tf: material.tf.to_array(),
            tr: material.tr,
            maps: [GpuMap::NONE; 4],
        }
    }
}

/// View-plane record as the kernels read it, 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuCamera {
    pub origin: [f32; 3],
    /// Image width in pixels
    pub width: u32,
    pub focus: [f32; 3],
    /// Image height in pixels
    pub height: u32,
    pub d_x: [f32; 3],
    pub _pad0: u32,
    pub d_y: [f32; 3],
    pub _pad1: u32,
}

impl GpuCamera {
    pub fn new(params: &CameraParams, width: u32, height: u32) -> Self {
        Self {
            origin: params.origin.to_array(),
            width,
            focus: params.focus.to_array(),
            height,
            d_x: params.d_x.to_array(),
            _pad0: 0,
            d_y: params.d_y.to_array(),
            _pad1: 0,
        }
    }
}

/// Shape of the seed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedLayout {
    pub pixels: usize,
    /// Devices across all platforms
    pub devices: usize,
    pub platforms: usize,
}

impl SeedLayout {
    pub fn new(pixels: usize, devices: usize, platforms: usize) -> Self {
        Self {
            pixels,
            devices,
            platforms,
        }
    }

    /// Seeds consumed by one device.
    pub fn per_device(&self) -> usize {
        self.pixels * SEEDS_PER_PIXEL
    }

    /// Size of the whole pool.
    pub fn seed_count(&self) -> usize {
        self.per_device() * self.devices.max(1) * self.platforms.max(1)
    }
}

/// Structure-of-arrays snapshot of a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuScene {
    /// Three positions per face
    pub vertices: Vec<Float4>,
    /// Three texture coordinates per face
    pub tex_coords: Vec<Float4>,
    /// Three shading normals per face
    pub normals: Vec<Float4>,
    /// One tangent per face, zero unless the face's material has a bump map
    pub tangents: Vec<Float4>,
    /// One bitangent per face, zero unless the face's material has a bump map
    pub bitangents: Vec<Float4>,
    /// One material index per face
    pub material_indices: Vec<i32>,
    pub materials: Vec<GpuMaterial>,
    pub boxes: Vec<FlatBox>,
    pub boost: Vec<FlatBox>,
    /// Every texture map back to back, padded to a multiple of four bytes
    pub textures: Vec<u8>,
    pub seeds: Vec<u32>,
}

impl GpuScene {
    /// Pack a scene whose faces are already in flattened order.
    ///
    /// Fails when the texture atlas outgrows the 32-bit offsets the kernels
    /// address it with.
    pub fn pack<R: Rng>(scene: &Scene, bvh: &FlatBvh, layout: SeedLayout, rng: &mut R) -> GpuResult<Self> {
        let (materials, textures) = pack_materials(&scene.materials)?;

        let face_count = scene.faces.len();
        let mut packed = GpuScene {
            vertices: Vec::with_capacity(face_count * 3),
            tex_coords: Vec::with_capacity(face_count * 3),
            normals: Vec::with_capacity(face_count * 3),
            tangents: Vec::with_capacity(face_count),
            bitangents: Vec::with_capacity(face_count),
            material_indices: Vec::with_capacity(face_count),
            materials,
            boxes: bvh.boxes.clone(),
            boost: bvh.boost().to_vec(),
            textures,
            seeds: Vec::new(),
        };

        for face in &scene.faces {
            packed.vertices.extend(face.verts.iter().map(|&v| Float4::from(v)));
            packed.tex_coords.extend(face.tex.iter().map(|&t| Float4::from(t)));
            packed.normals.extend(face.norms.iter().map(|&n| Float4::from(n)));
            packed.material_indices.push(face.mat_ind as i32);

            let has_bump = packed
                .materials
                .get(face.mat_ind)
                .is_some_and(|m| m.maps[MAP_BUMP].is_present());
            let (tangent, bitangent) = if has_bump {
                tangent_frame(face)
            } else {
                (Vec3::ZERO, Vec3::ZERO)
            };
            packed.tangents.push(tangent.into());
            packed.bitangents.push(bitangent.into());
        }

        packed.reseed(layout, rng);

        log::info!(
            "Packed scene: {} faces, {} materials, {} boxes ({} boosted), {:.1} KB textures, {} seeds",
            face_count,
            packed.materials.len(),
            packed.boxes.len(),
            packed.boost.len(),
            packed.textures.len() as f32 / 1024.0,
            packed.seeds.len()
        );

        Ok(packed)
    }

    /// Replace the seed pool, leaving every other array untouched.
    pub fn reseed<R: Rng>(&mut self, layout: SeedLayout, rng: &mut R) {
        // Zero seeds would lock the generator at zero
        self.seeds = (0..layout.seed_count())
            .map(|_| rng.gen_range(1..=u32::MAX))
            .collect();
    }

    pub fn face_count(&self) -> usize {
        self.material_indices.len()
    }

    /// Tangents and bitangents interleaved, two entries per face.
    pub fn frames(&self) -> Vec<Float4> {
        self.tangents
            .iter()
            .zip(&self.bitangents)
            .flat_map(|(&t, &b)| [t, b])
            .collect()
    }

    /// Positions of face `index`.
    pub fn face_vertices(&self, index: usize) -> [Vec3; 3] {
        let base = index * 3;
        [
            self.vertices[base].xyz(),
            self.vertices[base + 1].xyz(),
            self.vertices[base + 2].xyz(),
        ]
    }
}

/// Byte offset of the next map, as the kernels' signed 32-bit index.
fn atlas_offset(len: usize) -> GpuResult<i32> {
    i32::try_from(len).map_err(|_| GpuError::AtlasOverflow { bytes: len })
}

fn pack_materials(materials: &[Material]) -> GpuResult<(Vec<GpuMaterial>, Vec<u8>)> {
    let total: usize = materials
        .iter()
        .flat_map(|m| m.maps())
        .flatten()
        .map(|map| map.byte_len())
        .sum();

    let mut atlas = Vec::with_capacity(total + 3);
    let mut packed = Vec::with_capacity(materials.len());

    for material in materials {
        let mut gpu = GpuMaterial::from_material(material);
        for (slot, map) in material.maps().into_iter().enumerate() {
            let Some(map) = map else { continue };
            gpu.maps[slot] = GpuMap {
                offset: atlas_offset(atlas.len())?,
                width: map.width as i32,
                height: map.height as i32,
                _pad: 0,
            };
            atlas.extend_from_slice(&map.pixels);
        }
        log::debug!(
            "Material '{}': model {:?}, {} maps",
            material.name,
            material.model(),
            gpu.maps.iter().filter(|m| m.is_present()).count()
        );
        packed.push(gpu);
    }

    // Kernels read the atlas as 32-bit words
    atlas.resize(atlas.len().next_multiple_of(4), 0);
    atlas_offset(atlas.len())?;
    Ok((packed, atlas))
}

/// Per-face tangent and bitangent from the UV gradients.
fn tangent_frame(face: &Face) -> (Vec3, Vec3) {
    let dp1 = face.verts[1] - face.verts[0];
    let dp2 = face.verts[2] - face.verts[0];
    let duv1 = face.tex[1] - face.tex[0];
    let duv2 = face.tex[2] - face.tex[0];

    let det = duv1.x * duv2.y - duv1.y * duv2.x;
    let r = if det == 0.0 { 1.0 } else { 1.0 / det };

    let tangent = ((dp1 * duv2.y - dp2 * duv1.y) * r).normalize_or_zero();
    let bitangent = tangent.cross(dp1.cross(dp2)).normalize_or_zero();
    (tangent, bitangent)
}
