//! Triangle faces as produced by the scene importers.

use lumen_math::{Aabb, Vec3};

/// One triangle of the scene.
///
/// Texture coordinates are stored as `Vec3` (u, v, w) to keep every
/// per-vertex attribute the same width on the device side.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// Vertex positions
    pub verts: [Vec3; 3],

    /// Per-vertex shading normals
    pub norms: [Vec3; 3],

    /// Per-vertex texture coordinates
    pub tex: [Vec3; 3],

    /// Index into `Scene::materials`
    pub mat_ind: usize,

    /// Whether shading interpolates the vertex normals
    pub smoothing: bool,

    /// Geometric normal, oriented to agree with the vertex normals
    pub normal: Vec3,
}

impl Face {
    /// Create a face with explicit vertex normals and texture coordinates.
    ///
    /// Zero-length vertex normals are replaced by the geometric normal.
    pub fn new(verts: [Vec3; 3], norms: [Vec3; 3], tex: [Vec3; 3], mat_ind: usize) -> Self {
        let mut normal = geometric_normal(&verts);
        let summed: Vec3 = norms.iter().copied().sum();
        if normal.dot(summed) < 0.0 {
            normal = -normal;
        }

        let mut norms = norms;
        for n in norms.iter_mut() {
            if n.length_squared() == 0.0 {
                *n = normal;
            }
        }

        Self {
            verts,
            norms,
            tex,
            mat_ind,
            smoothing: true,
            normal,
        }
    }

    /// Create a flat-shaded face without texture coordinates.
    pub fn flat(verts: [Vec3; 3], mat_ind: usize) -> Self {
        let mut face = Self::new(verts, [Vec3::ZERO; 3], [Vec3::ZERO; 3], mat_ind);
        face.smoothing = false;
        face
    }

    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Tight bounds of the three vertices (never NaN).
    pub fn bounds(&self) -> Aabb {
        Aabb::from_triangle(&self.verts)
    }

    pub fn centroid(&self) -> Vec3 {
        (self.verts[0] + self.verts[1] + self.verts[2]) / 3.0
    }

    pub fn area(&self) -> f32 {
        0.5 * (self.verts[1] - self.verts[0])
            .cross(self.verts[2] - self.verts[0])
            .length()
    }

    /// Zero-area triangles are kept but never produce a meaningful normal.
    pub fn is_degenerate(&self) -> bool {
        let area = self.area();
        area.is_nan() || area <= 0.0
    }
}

/// Unit normal from the winding order, or zero for degenerate triangles.
fn geometric_normal(verts: &[Vec3; 3]) -> Vec3 {
    (verts[1] - verts[0])
        .cross(verts[2] - verts[0])
        .normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ccw_triangle() -> [Vec3; 3] {
        [Vec3::ZERO, Vec3::X, Vec3::Y]
    }

    #[test]
    fn test_normal_follows_winding() {
        let face = Face::flat(ccw_triangle(), 0);
        assert_eq!(face.normal, Vec3::Z);
        assert_eq!(face.norms, [Vec3::Z; 3]);
        assert!(!face.smoothing);
    }

    #[test]
    fn test_normal_flips_to_agree_with_vertex_normals() {
        let face = Face::new(ccw_triangle(), [-Vec3::Z, -Vec3::Z, Vec3::Z], [Vec3::ZERO; 3], 0);
        assert_eq!(face.normal, -Vec3::Z);
    }

    #[test]
    fn test_degenerate_face() {
        let face = Face::flat([Vec3::ONE, Vec3::ONE, Vec3::ONE], 0);
        assert!(face.is_degenerate());
        assert_eq!(face.normal, Vec3::ZERO);
        let bounds = face.bounds();
        assert_eq!(bounds.min, Vec3::ONE);
        assert_eq!(bounds.max, Vec3::ONE);
    }

    #[test]
    fn test_centroid_and_area() {
        let face = Face::flat([Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0)], 0);
        assert_eq!(face.centroid(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(face.area(), 4.5);
    }
}
