//! Triangle intersection and plane clipping.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::{Aabb, Interval, Ray, Vec3};

/// Determinant threshold below which a ray counts as parallel to the triangle.
pub const INTERSECT_EPSILON: f32 = 1e-4;

/// Distance and barycentrics of a ray-triangle hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// Möller-Trumbore intersection; hits outside `ray_t` are rejected.
pub fn intersect_triangle(ray: &Ray, verts: &[Vec3; 3], ray_t: Interval) -> Option<TriangleHit> {
    let edge1 = verts[1] - verts[0];
    let edge2 = verts[2] - verts[0];

    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < INTERSECT_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - verts[0];
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if !ray_t.surrounds(t) {
        return None;
    }
    Some(TriangleHit { t, u, v })
}

/// Split a triangle by the plane `p[axis] == position`.
///
/// Returns the tight bounds of the part on each side. Points on an edge
/// that crosses the plane are added to both halves. Either half may be
/// empty when the triangle lies entirely on one side.
pub fn split_triangle(verts: &[Vec3; 3], axis: usize, position: f32) -> (Aabb, Aabb) {
    let mut left = Aabb::EMPTY;
    let mut right = Aabb::EMPTY;

    for i in 0..3 {
        let a = verts[i];
        let b = verts[(i + 1) % 3];
        let (da, db) = (a[axis], b[axis]);

        if da <= position {
            left.grow_point(a);
        }
        if da >= position {
            right.grow_point(a);
        }

        if (da < position && db > position) || (da > position && db < position) {
            let t = (position - da) / (db - da);
            let mut crossing = a + (b - a) * t;
            crossing[axis] = position;
            left.grow_point(crossing);
            right.grow_point(crossing);
        }
    }

    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> [Vec3; 3] {
        [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
        ]
    }

    #[test]
    fn test_triangle_hit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let hit = intersect_triangle(&ray, &unit_triangle(), Interval::FORWARD).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_miss() {
        let away = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        assert!(intersect_triangle(&away, &unit_triangle(), Interval::FORWARD).is_none());

        let beside = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(intersect_triangle(&beside, &unit_triangle(), Interval::FORWARD).is_none());
    }

    #[test]
    fn test_hit_respects_interval() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(intersect_triangle(&ray, &unit_triangle(), Interval::new(1e-4, 0.5)).is_none());
    }

    #[test]
    fn test_split_straddling_triangle() {
        let verts = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0)];
        let (left, right) = split_triangle(&verts, 0, 2.0);

        assert_eq!(left.min, Vec3::ZERO);
        assert_eq!(left.max, Vec3::new(2.0, 4.0, 0.0));
        assert_eq!(right.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(right.max, Vec3::new(4.0, 2.0, 0.0));
    }

    #[test]
    fn test_split_one_sided_triangle() {
        let verts = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let (left, right) = split_triangle(&verts, 0, 5.0);
        assert_eq!(left, Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)));
        assert!(right.is_empty());
    }
}
