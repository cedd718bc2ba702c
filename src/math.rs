//! Shared geometry math: AABB and view frustum.
//!
//! Arvo's method for transforming an AABB by a matrix, and Gribb & Hartmann
//! plane extraction with a p-vertex intersection test for the frustum. The
//! CPU-side `Frustum::intersects_aabb` below is the reference
//! implementation the culling compute shader (spec §4.5) mirrors on the
//! GPU; keeping both in lockstep is why this logic lives in one place
//! instead of being inlined into the culling engine.

use glam::{Mat4, Vec3, Vec4};

/// Axis-aligned bounding box in local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb { min: Vec3::splat(f32::MAX), max: Vec3::splat(f32::MIN) };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Unit cube centered at the origin, the default AABB for attachments
    /// that have no inherent geometric extent (emitters, point lights).
    pub fn unit() -> Self {
        Self { min: Vec3::splat(-0.5), max: Vec3::splat(0.5) }
    }

    /// Transform this local-space AABB by `matrix`, returning a new AABB.
    ///
    /// Uses Arvo's method: project each matrix axis onto the AABB extents
    /// instead of transforming all 8 corners, giving an exact (tight)
    /// result in O(1) per axis.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        Aabb { min: new_min, max: new_max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }
}

/// Six oriented half-space planes describing a camera's visible volume.
///
/// Each plane is `(A, B, C, D)` with `(A, B, C)` the inward-pointing unit
/// normal; a point `P` is inside iff `dot(normal, P) + D >= 0` for every
/// plane.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix via
    /// the Gribb & Hartmann method. Works for perspective and orthographic
    /// projections alike.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let m = vp.to_cols_array_2d();

        let mut planes = [
            Vec4::new(m[0][3] + m[0][0], m[1][3] + m[1][0], m[2][3] + m[2][0], m[3][3] + m[3][0]),
            Vec4::new(m[0][3] - m[0][0], m[1][3] - m[1][0], m[2][3] - m[2][0], m[3][3] - m[3][0]),
            Vec4::new(m[0][3] + m[0][1], m[1][3] + m[1][1], m[2][3] + m[2][1], m[3][3] + m[3][1]),
            Vec4::new(m[0][3] - m[0][1], m[1][3] - m[1][1], m[2][3] - m[2][1], m[3][3] - m[3][1]),
            Vec4::new(m[0][3] + m[0][2], m[1][3] + m[1][2], m[2][3] + m[2][2], m[3][3] + m[3][2]),
            Vec4::new(m[0][3] - m[0][2], m[1][3] - m[1][2], m[2][3] - m[2][2], m[3][3] - m[3][2]),
        ];

        for plane in &mut planes {
            let normal_len = Vec3::new(plane.x, plane.y, plane.z).length();
            if normal_len > 0.0 {
                *plane /= normal_len;
            }
        }

        Self { planes }
    }

    /// Positive-vertex AABB-vs-frustum test (spec §4.5 / §8 soundness
    /// invariant): for each plane, test the AABB corner farthest along the
    /// plane's positive normal. If that corner is outside, the whole box
    /// is outside. Over-approximates (conservative inclusion is allowed,
    /// false negatives are not).
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = Vec3::new(plane.x, plane.y, plane.z);
            let p_vertex = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if normal.dot(p_vertex) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "math_tests.rs"]
mod tests;
