//! Pinhole camera description and the view-plane record the ray generator
//! consumes.

use lumen_math::Vec3;
use serde::{Deserialize, Serialize};

/// View-plane parameters for one render.
///
/// Primary rays start at `focus` and pass through
/// `origin + d_x * px + d_y * py` on the view plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Bottom corner of the view plane
    pub origin: Vec3,
    /// Pinhole in front of the view plane
    pub focus: Vec3,
    /// Step between horizontally adjacent pixels
    pub d_x: Vec3,
    /// Step between vertically adjacent pixels
    pub d_y: Vec3,
}

/// User-facing camera placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Center of the view plane
    pub position: Vec3,
    /// Viewing direction (normalized on use)
    pub direction: Vec3,
    /// View-plane width in world units
    pub width: f32,
    /// View-plane height in world units
    pub height: f32,
    /// Horizontal field of view in degrees
    pub hfov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: -Vec3::X,
            width: 1.0,
            height: 1.0,
            hfov: 60.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction,
            ..Default::default()
        }
    }

    /// Set lens settings.
    pub fn with_lens(mut self, width: f32, height: f32, hfov: f32) -> Self {
        self.width = width;
        self.height = height;
        self.hfov = hfov;
        self
    }

    /// Distance from the view plane to the focus point such that the
    /// edge-focus-edge angle equals the horizontal FOV.
    pub fn focal_distance(&self) -> f32 {
        (self.width / 2.0) / (self.hfov.to_radians() / 2.0).tan()
    }

    /// Compute the view-plane record for an image of `xdim` x `ydim` pixels.
    pub fn params(&self, xdim: u32, ydim: u32) -> CameraParams {
        let dir = self.direction.normalize_or_zero();
        let focus = self.position + dir * self.focal_distance();

        // Horizontal reference from the direction's projection onto XZ
        let camera_x = if dir.x.abs() < 1e-5 {
            if dir.z > 0.0 {
                Vec3::X
            } else {
                -Vec3::X
            }
        } else {
            Vec3::new(dir.x, 0.0, dir.z).cross(-Vec3::Y).normalize()
        };

        let camera_y = if dir.y.abs() < 1e-5 {
            Vec3::Y
        } else {
            dir.cross(camera_x).normalize()
        };

        let d_x = camera_x * (self.width / xdim.max(1) as f32);
        let d_y = camera_y * (self.height / ydim.max(1) as f32);
        let origin = self.position - camera_x * (self.width / 2.0) - camera_y * (self.height / 2.0);

        CameraParams {
            origin,
            focus,
            d_x,
            d_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focal_distance_matches_fov() {
        let cam = Camera::default().with_lens(2.0, 2.0, 90.0);
        assert!((cam.focal_distance() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_center_ray_follows_direction() {
        let cam = Camera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let p = cam.params(100, 100);

        let center = p.origin + p.d_x * 50.0 + p.d_y * 50.0;
        assert!((center - cam.position).length() < 1e-4);

        let ray_dir = (p.focus - center).normalize();
        assert!((ray_dir - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn test_pixel_steps_span_view_plane() {
        let cam = Camera::new(Vec3::ZERO, Vec3::X).with_lens(2.0, 1.0, 60.0);
        let p = cam.params(200, 100);
        assert!((p.d_x.length() * 200.0 - 2.0).abs() < 1e-4);
        assert!((p.d_y.length() * 100.0 - 1.0).abs() < 1e-4);
        assert!(p.d_x.dot(p.d_y).abs() < 1e-6);
    }
}
