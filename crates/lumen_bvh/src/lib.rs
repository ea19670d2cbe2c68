//! Lumen BVH - spatial-split BVH construction and flattening.
//!
//! The builder produces a binary tree in an index arena together with a
//! reference list in which spatially split triangles may appear more than
//! once. The flattener collapses that tree into up-to-8-wide boxes stored
//! breadth-first, the layout the traversal kernels read.
//!
//! # Example
//!
//! ```ignore
//! use lumen_bvh::{flatten, flatten_faces, FlattenConfig, SbvhBuilder, SbvhConfig};
//!
//! let sbvh = SbvhBuilder::new(SbvhConfig::default()).build(&scene.faces);
//! let flat = flatten(&sbvh, &FlattenConfig::default());
//! flatten_faces(&mut scene, &flat);
//! ```

pub mod flatten;
pub mod sbvh;

pub use flatten::{flatten, flatten_faces, FlatBox, FlatBvh, FlattenConfig, MAX_CHILDREN};
pub use sbvh::{BuildNode, BuildStats, FaceRef, Sbvh, SbvhBuilder, SbvhConfig};
