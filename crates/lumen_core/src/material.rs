//! Surface materials in the MTL parameterisation.

use std::sync::Arc;

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

use crate::texture::TextureMap;

/// Scattering model a material resolves to on the device.
///
/// Every shading path matches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum MaterialModel {
    Diffuse = 0,
    Specular = 1,
    Refractive = 2,
    Emissive = 3,
}

/// A material as described by an MTL block.
#[derive(Clone, Debug)]
pub struct Material {
    /// Name used by `usemtl`
    pub name: String,

    /// Specular exponent
    pub ns: f32,

    /// Index of refraction
    pub ni: f32,

    /// Opacity
    pub d: f32,

    /// Transparency (1 - d in most files)
    pub tr: f32,

    /// Transmission filter color
    pub tf: Vec3,

    /// Illumination model flag from the MTL file
    pub illum: i32,

    pub ka: Vec3,
    pub kd: Vec3,
    pub ks: Vec3,
    pub ke: Vec3,

    /// Diffuse color map
    pub map_kd: Option<Arc<TextureMap>>,

    /// Specular color map
    pub map_ks: Option<Arc<TextureMap>>,

    /// Tangent-space normal map
    pub map_bump: Option<Arc<TextureMap>>,

    /// Alpha (cutout) map
    pub map_d: Option<Arc<TextureMap>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            ns: 0.0,
            ni: 1.0,
            d: 1.0,
            tr: 0.0,
            tf: Vec3::ONE,
            illum: 2,
            ka: Vec3::ZERO,
            kd: Vec3::splat(0.5),
            ks: Vec3::ZERO,
            ke: Vec3::ZERO,
            map_kd: None,
            map_ks: None,
            map_bump: None,
            map_d: None,
        }
    }
}

impl Material {
    /// Create a diffuse material with just a name and color.
    pub fn new(name: impl Into<String>, kd: Vec3) -> Self {
        Self {
            name: name.into(),
            kd,
            ..Default::default()
        }
    }

    /// Create an emitter. Emitters still scatter with `kd`.
    pub fn emissive(name: impl Into<String>, ke: Vec3) -> Self {
        Self {
            name: name.into(),
            kd: Vec3::ZERO,
            ke,
            ..Default::default()
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.ke.max_element() > 0.0
    }

    pub fn has_textures(&self) -> bool {
        self.maps().iter().any(Option::is_some)
    }

    /// Maps in atlas order: diffuse, specular, bump, alpha.
    pub fn maps(&self) -> [Option<&TextureMap>; 4] {
        [
            self.map_kd.as_deref(),
            self.map_ks.as_deref(),
            self.map_bump.as_deref(),
            self.map_d.as_deref(),
        ]
    }

    /// Classify the MTL parameters into a scattering model.
    pub fn model(&self) -> MaterialModel {
        if self.is_emissive() {
            MaterialModel::Emissive
        } else if self.d < 1.0 || self.tr > 0.0 || matches!(self.illum, 4 | 6 | 7 | 9) {
            MaterialModel::Refractive
        } else if self.ks.max_element() > 0.0 && (self.ns > 0.0 || matches!(self.illum, 3 | 5)) {
            MaterialModel::Specular
        } else {
            MaterialModel::Diffuse
        }
    }
}
