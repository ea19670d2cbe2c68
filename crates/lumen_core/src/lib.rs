//! Lumen Core - scene model for the wavefront path tracer.
//!
//! This crate provides:
//!
//! - **Scene types**: `Face`, `Material`, `TextureMap`, `Scene`
//! - **Camera**: view-plane parameters consumed by the ray generator
//! - **OBJ/MTL import**: triangulated meshes and their texture maps
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::obj::load_obj;
//!
//! let scene = load_obj("sponza/sponza.obj")?;
//! println!("{} faces, {} materials", scene.face_count(), scene.material_count());
//! ```

pub mod camera;
pub mod face;
pub mod material;
pub mod obj;
pub mod scene;
pub mod texture;

pub use camera::{Camera, CameraParams};
pub use face::Face;
pub use material::{Material, MaterialModel};
pub use obj::load_obj;
pub use scene::{Scene, SceneError, SceneResult};
pub use texture::{TextureCache, TextureError, TextureMap};
