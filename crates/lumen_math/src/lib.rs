// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;
mod triangle;
mod vector;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use triangle::{intersect_triangle, split_triangle, TriangleHit, INTERSECT_EPSILON};
pub use vector::{cosine_hemisphere, orthonormal_basis, reflect, Float4};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glam_reexport() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.cross(b), Vec3::new(-3.0, 6.0, -3.0));
        assert_eq!(a.dot(b), 32.0);
    }
}
