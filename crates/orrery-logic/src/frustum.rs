//! View frustum as six inward-facing planes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Plane `normal · p + d = 0`; points with a non-negative signed distance
/// are on the inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Build from raw `[a, b, c, d]` coefficients, normalized so `|n| = 1`.
    pub fn from_coefficients(c: [f32; 4]) -> Self {
        let normal = Vec3::new(c[0], c[1], c[2]);
        let len = normal.length();
        if len > 0.0 {
            Self::new(normal / len, c[3] / len)
        } else {
            Self::new(normal, c[3])
        }
    }

    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    pub fn is_finite(&self) -> bool {
        self.normal.is_finite() && self.d.is_finite()
    }
}

/// Left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract planes from a column-major 4×4 view-projection matrix
    /// (`m[col * 4 + row]`), Gribb–Hartmann style.
    pub fn from_view_projection(m: &[f32; 16]) -> Self {
        let row = |r: usize| -> [f32; 4] { [m[r], m[4 + r], m[8 + r], m[12 + r]] };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let add = |a: [f32; 4], b: [f32; 4]| [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]];
        let sub = |a: [f32; 4], b: [f32; 4]| [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]];
        Self::new([
            Plane::from_coefficients(add(r3, r0)),
            Plane::from_coefficients(sub(r3, r0)),
            Plane::from_coefficients(add(r3, r1)),
            Plane::from_coefficients(sub(r3, r1)),
            Plane::from_coefficients(add(r3, r2)),
            Plane::from_coefficients(sub(r3, r2)),
        ])
    }

    /// Axis-aligned box `[min, max]` as a frustum. Handy for tests and
    /// orthographic overviews.
    pub fn from_aabb(min: Vec3, max: Vec3) -> Self {
        Self::new([
            Plane::new(Vec3::X, -min.x),
            Plane::new(Vec3::NEG_X, max.x),
            Plane::new(Vec3::Y, -min.y),
            Plane::new(Vec3::NEG_Y, max.y),
            Plane::new(Vec3::Z, -min.z),
            Plane::new(Vec3::NEG_Z, max.z),
        ])
    }

    /// True unless the sphere lies entirely behind some plane.
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(center) >= -radius)
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.contains_sphere(p, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.planes.iter().all(Plane::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn identity_matrix_is_unit_clip_cube() {
        let f = Frustum::from_view_projection(&IDENTITY);
        assert!(f.contains_point(Vec3::ZERO));
        assert!(f.contains_point(Vec3::new(0.9, -0.9, 0.5)));
        assert!(!f.contains_point(Vec3::new(1.5, 0.0, 0.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -2.0)));
    }

    #[test]
    fn planes_are_normalized() {
        let mut m = IDENTITY;
        m[0] = 4.0;
        let f = Frustum::from_view_projection(&m);
        for p in &f.planes {
            assert!((p.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_straddling_a_plane_is_inside() {
        let f = Frustum::from_aabb(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(!f.contains_point(Vec3::new(1.5, 0.0, 0.0)));
        assert!(f.contains_sphere(Vec3::new(1.5, 0.0, 0.0), 0.6));
        assert!(!f.contains_sphere(Vec3::new(3.0, 0.0, 0.0), 0.6));
    }

    #[test]
    fn non_finite_detected() {
        let mut f = Frustum::from_aabb(Vec3::ZERO, Vec3::ONE);
        assert!(f.is_finite());
        f.planes[2].d = f32::NAN;
        assert!(!f.is_finite());
    }
}
