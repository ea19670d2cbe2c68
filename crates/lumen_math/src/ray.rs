use crate::Vec3;

/// A ray with its reciprocal direction cached for slab tests.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_dir: Vec3,
}

impl Ray {
    /// Create a new ray. The direction is used as given (not normalized).
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_dir: direction.recip(),
        }
    }

    /// Get the point along the ray at parameter t.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_inverse_direction() {
        let ray = Ray::new(Vec3::ONE, Vec3::new(2.0, -4.0, 0.0));
        assert_eq!(ray.inv_dir.x, 0.5);
        assert_eq!(ray.inv_dir.y, -0.25);
        assert!(ray.inv_dir.z.is_infinite());
    }
}
