//! Small vector helpers shared by the scene packer and the host kernels.

use bytemuck::{Pod, Zeroable};

use crate::Vec3;

/// A 16-byte vector slot matching the device-side `float3` layout.
///
/// The fourth lane is padding unless a buffer documents otherwise.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Float4(pub [f32; 4]);

impl Float4 {
    pub const ZERO: Float4 = Float4([0.0; 4]);

    pub fn from_vec3(v: Vec3) -> Self {
        Float4([v.x, v.y, v.z, 0.0])
    }

    pub fn with_w(v: Vec3, w: f32) -> Self {
        Float4([v.x, v.y, v.z, w])
    }

    pub fn xyz(&self) -> Vec3 {
        Vec3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn w(&self) -> f32 {
        self.0[3]
    }
}

impl From<Vec3> for Float4 {
    fn from(v: Vec3) -> Self {
        Float4::from_vec3(v)
    }
}

/// Reflect `v` about the normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Build two tangents that complete `n` to a right-handed basis.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let helper = if n.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    let tangent = helper.cross(n).normalize();
    let bitangent = n.cross(tangent);
    (tangent, bitangent)
}

/// Cosine-weighted direction on the hemisphere around `n` from two
/// uniform numbers in [0, 1).
pub fn cosine_hemisphere(n: Vec3, u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let phi = 2.0 * std::f32::consts::PI * u2;
    let (tangent, bitangent) = orthonormal_basis(n);
    let local = tangent * (r * phi.cos()) + bitangent * (r * phi.sin());
    (local + n * (1.0 - u1).max(0.0).sqrt()).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect() {
        let v = Vec3::new(1.0, -1.0, 0.0);
        assert_eq!(reflect(v, Vec3::Y), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_orthonormal_basis() {
        for n in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 2.0, -3.0).normalize()] {
            let (t, b) = orthonormal_basis(n);
            assert!(t.dot(n).abs() < 1e-5);
            assert!(b.dot(n).abs() < 1e-5);
            assert!(t.dot(b).abs() < 1e-5);
            assert!((t.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cosine_hemisphere_stays_above_surface() {
        let n = Vec3::new(0.0, 0.0, 1.0);
        for i in 0..16 {
            for j in 0..16 {
                let d = cosine_hemisphere(n, i as f32 / 16.0, j as f32 / 16.0);
                assert!(d.dot(n) >= 0.0);
                assert!((d.length() - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_float4_layout() {
        assert_eq!(std::mem::size_of::<Float4>(), 16);
        let f = Float4::with_w(Vec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(f.xyz(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(f.w(), 4.0);
    }
}
