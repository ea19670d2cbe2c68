//! Texture maps and a path-keyed cache for materials.
//!
//! Maps keep their pixels as tightly packed 8-bit RGB so they can be
//! concatenated verbatim into the device texture atlas.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_math::Vec3;
use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to load texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Texture is {width}x{height} but has {len} bytes of pixel data")]
    SizeMismatch { width: u32, height: u32, len: usize },

    #[error("Texture has zero width or height")]
    Empty,
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A width x height x 3 channel pixel buffer, row-major, first row at v = 1.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureMap {
    /// Wrap raw RGB bytes, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> TextureResult<Self> {
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }
        if pixels.len() != width as usize * height as usize * 3 {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A 1x1 map of a single color.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgb.to_vec(),
        }
    }

    /// Decode any format the `image` crate understands (TGA, BMP, PNG, ...).
    pub fn load(path: &Path) -> TextureResult<Self> {
        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(width, height, rgb.into_raw())
    }

    /// Size of the pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// Sample the map at UV coordinates with bilinear filtering.
    ///
    /// Coordinates wrap; the result is in [0, 1] per channel.
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);

        let x = u * (self.width as f32 - 1.0);
        let y = (1.0 - v) * (self.height as f32 - 1.0);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x.fract();
        let fy = y.fract();

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), fx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }

    fn texel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize * 3;
        match self.pixels.get(idx..idx + 3) {
            Some(p) => Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32) / 255.0,
            None => Vec3::ZERO,
        }
    }
}

/// Cache of decoded maps so that materials sharing a file share one buffer.
#[derive(Default)]
pub struct TextureCache {
    maps: HashMap<PathBuf, Arc<TextureMap>>,
    base_dir: Option<PathBuf>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that resolves relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            maps: HashMap::new(),
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load a map, using the cached copy if this path was seen before.
    pub fn load(&mut self, path: &str) -> TextureResult<Arc<TextureMap>> {
        let full_path = self.resolve_path(path);
        if let Some(map) = self.maps.get(&full_path) {
            return Ok(map.clone());
        }

        let map = Arc::new(TextureMap::load(&full_path)?);
        log::debug!(
            "Loaded texture: {} ({}x{}, {:.1} KB)",
            full_path.display(),
            map.width,
            map.height,
            map.byte_len() as f32 / 1024.0
        );
        self.maps.insert(full_path, map.clone());
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Total bytes held by cached maps.
    pub fn total_size_bytes(&self) -> usize {
        self.maps.values().map(|m| m.byte_len()).sum()
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        // MTL files written on Windows use backslashes
        let normalized = path.replace('\\', "/");
        let path = Path::new(&normalized);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
