use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box used by the SBVH builder and traversal.
///
/// An empty box has `min > max` on every axis so that growing it by any
/// point or box yields exactly that point or box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create an AABB from two corner points in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Tight bounds of a triangle.
    ///
    /// Non-finite vertex components are ignored; an axis left without any
    /// finite value collapses to zero so the box never carries NaN.
    pub fn from_triangle(verts: &[Vec3; 3]) -> Self {
        let mut bounds = Aabb::EMPTY;
        for v in verts {
            bounds.grow_point(*v);
        }
        bounds.sanitized()
    }

    /// Expand to include a point. NaN components leave the box unchanged.
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand to include another box.
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Smallest box that surrounds both inputs.
    pub fn union(a: &Aabb, b: &Aabb) -> Aabb {
        Aabb {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Overlap of two boxes. The result is empty if they are disjoint.
    pub fn intersection(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Replace inverted or non-finite axes with a zero-width slab at the origin.
    pub fn sanitized(mut self) -> Aabb {
        for axis in 0..3 {
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                self.min[axis] = 0.0;
                self.max[axis] = 0.0;
            }
        }
        self
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Full surface area; zero for empty or flat-and-thin boxes.
    pub fn surface_area(&self) -> f32 {
        2.0 * self.half_area()
    }

    /// Half the surface area, the quantity the SAH actually compares.
    pub fn half_area(&self) -> f32 {
        let d = self.extent();
        d.x * d.y + d.y * d.z + d.z * d.x
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.extent();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// True if `other` lies inside this box, allowing `eps` of slack.
    pub fn contains(&self, other: &Aabb, eps: f32) -> bool {
        other.is_empty()
            || (other.min.cmpge(self.min - Vec3::splat(eps)).all()
                && other.max.cmple(self.max + Vec3::splat(eps)).all())
    }

    /// Restrict one axis of the box to `[lo, hi]`.
    pub fn clip_axis(&self, axis: usize, lo: f32, hi: f32) -> Aabb {
        let mut clipped = *self;
        clipped.min[axis] = clipped.min[axis].max(lo);
        clipped.max[axis] = clipped.max[axis].min(hi);
        clipped
    }

    /// Grow thin axes to at least `delta` so slab tests never see a
    /// zero-width box.
    pub fn padded(&self, delta: f32) -> Aabb {
        let mut out = *self;
        for axis in 0..3 {
            if out.max[axis] - out.min[axis] < delta {
                out.min[axis] -= delta * 0.5;
                out.max[axis] += delta * 0.5;
            }
        }
        out
    }

    /// Slab test. Returns the entry distance when the ray overlaps the box
    /// within `ray_t`.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let t0 = (self.min - ray.origin) * ray.inv_dir;
        let t1 = (self.max - ray.origin) * ray.inv_dir;
        let near = t0.min(t1).max_element().max(ray_t.min);
        let far = t0.max(t1).min_element().min(ray_t.max);
        if near <= far {
            Some(near)
        } else {
            None
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}
