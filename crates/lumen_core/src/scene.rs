//! The flat scene handed from the importers to the acceleration builder.

use lumen_math::{Aabb, Vec3};
use thiserror::Error;

use crate::face::Face;
use crate::material::Material;
use crate::texture::TextureError;

/// Errors raised while constructing or validating a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ load failed: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error("Face {face} references material {material}, but only {count} materials exist")]
    MaterialIndex {
        face: usize,
        material: usize,
        count: usize,
    },

    #[error("Scene contains no faces")]
    Empty,
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Triangles plus the material table they index.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Scene name (usually from filename)
    pub name: String,

    /// Faces in import order until the BVH flattener rewrites them
    pub faces: Vec<Face>,

    /// Materials referenced by `Face::mat_ind`
    pub materials: Vec<Material>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a material to the scene and return its index.
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_face(&mut self, face: Face) {
        self.faces.push(face);
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Bounds of every face.
    pub fn bounds(&self) -> Aabb {
        self.faces.iter().fold(Aabb::EMPTY, |mut acc, f| {
            acc.grow(&f.bounds());
            acc
        })
    }

    /// Check that every face indexes an existing material.
    ///
    /// An empty scene is reported so that callers can refuse to render it;
    /// the BVH builder itself accepts empty input.
    pub fn validate(&self) -> SceneResult<()> {
        if self.faces.is_empty() {
            return Err(SceneError::Empty);
        }
        let count = self.materials.len();
        if let Some((face, f)) = self.faces.iter().enumerate().find(|(_, f)| f.mat_ind >= count) {
            return Err(SceneError::MaterialIndex {
                face,
                material: f.mat_ind,
                count,
            });
        }
        Ok(())
    }

    /// A 12-triangle axis-aligned cube, handy for tests and demos.
    pub fn cube(center: Vec3, half: f32, mat_ind: usize) -> Vec<Face> {
        let c = |x: f32, y: f32, z: f32| center + Vec3::new(x, y, z) * half;
        let quads = [
            [c(-1., -1., -1.), c(-1., 1., -1.), c(1., 1., -1.), c(1., -1., -1.)],
            [c(-1., -1., 1.), c(1., -1., 1.), c(1., 1., 1.), c(-1., 1., 1.)],
            [c(-1., -1., -1.), c(-1., -1., 1.), c(-1., 1., 1.), c(-1., 1., -1.)],
            [c(1., -1., -1.), c(1., 1., -1.), c(1., 1., 1.), c(1., -1., 1.)],
            [c(-1., -1., -1.), c(1., -1., -1.), c(1., -1., 1.), c(-1., -1., 1.)],
            [c(-1., 1., -1.), c(-1., 1., 1.), c(1., 1., 1.), c(1., 1., -1.)],
        ];
        quads
            .iter()
            .flat_map(|q| {
                [
                    Face::flat([q[0], q[1], q[2]], mat_ind),
                    Face::flat([q[0], q[2], q[3]], mat_ind),
                ]
            })
            .collect()
    }
}
