//! Geometric susceptibility sources
//!
//! Each source is a closed shape placed at a physical position (mm) with a
//! susceptibility value. Membership is tested on the offset from the source
//! centre, one function per shape.

use serde::{Deserialize, Serialize};

/// Closed set of supported source geometries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    /// Ball of the given radius (mm)
    Sphere { radius: f64 },
    /// Cube with half side length (mm), rotated by intrinsic Z-Y-X Euler
    /// angles in degrees
    Cube {
        half_extent: f64,
        #[serde(default)]
        euler_deg: [f64; 3],
    },
    /// Finite cylinder along `axis` (need not be normalized)
    Cylinder { axis: [f64; 3], half_length: f64, radius: f64 },
    /// Axis-aligned ellipsoid with per-axis semi-axes (mm)
    Ellipsoid { semi_axes: [f64; 3] },
}

/// A single source in the phantom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SusceptibilitySource {
    /// Centre position in mm, origin at the grid centre
    pub position: [f64; 3],
    #[serde(flatten)]
    pub shape: Shape,
    /// Susceptibility value (arbitrary units, e.g. ppm)
    pub susceptibility: f64,
}

impl SusceptibilitySource {
    pub fn sphere(position: [f64; 3], radius: f64, susceptibility: f64) -> Self {
        Self { position, shape: Shape::Sphere { radius }, susceptibility }
    }

    pub fn cube(
        position: [f64; 3],
        half_extent: f64,
        euler_deg: [f64; 3],
        susceptibility: f64,
    ) -> Self {
        Self { position, shape: Shape::Cube { half_extent, euler_deg }, susceptibility }
    }

    pub fn cylinder(
        position: [f64; 3],
        axis: [f64; 3],
        half_length: f64,
        radius: f64,
        susceptibility: f64,
    ) -> Self {
        Self { position, shape: Shape::Cylinder { axis, half_length, radius }, susceptibility }
    }

    pub fn ellipsoid(position: [f64; 3], semi_axes: [f64; 3], susceptibility: f64) -> Self {
        Self { position, shape: Shape::Ellipsoid { semi_axes }, susceptibility }
    }

    /// Sources that contribute nothing: zero or non-finite value, or
    /// non-positive / non-finite geometry
    pub fn is_degenerate(&self) -> bool {
        if self.susceptibility == 0.0 || !self.susceptibility.is_finite() {
            return true;
        }
        if !self.position.iter().all(|v| v.is_finite()) {
            return true;
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        match &self.shape {
            Shape::Sphere { radius } => !positive(*radius),
            Shape::Cube { half_extent, euler_deg } => {
                !positive(*half_extent) || !euler_deg.iter().all(|a| a.is_finite())
            }
            Shape::Cylinder { axis, half_length, radius } => {
                !positive(*half_length) || !positive(*radius) || !positive(norm(*axis))
            }
            Shape::Ellipsoid { semi_axes } => !semi_axes.iter().all(|&a| positive(a)),
        }
    }

    /// Radius (mm) of a ball around the centre that encloses the shape
    pub fn bounding_radius(&self) -> f64 {
        match &self.shape {
            Shape::Sphere { radius } => *radius,
            Shape::Cube { half_extent, .. } => half_extent * 3f64.sqrt(),
            Shape::Cylinder { half_length, radius, .. } => half_length.hypot(*radius),
            Shape::Ellipsoid { semi_axes } => semi_axes.iter().cloned().fold(0.0, f64::max),
        }
    }

    /// Does the point at `offset` (mm, relative to the centre) lie inside?
    pub fn contains(&self, offset: [f64; 3]) -> bool {
        match &self.shape {
            Shape::Sphere { radius } => sphere_contains(offset, *radius),
            Shape::Cube { half_extent, euler_deg } => {
                cube_contains(offset, *half_extent, *euler_deg)
            }
            Shape::Cylinder { axis, half_length, radius } => {
                cylinder_contains(offset, *axis, *half_length, *radius)
            }
            Shape::Ellipsoid { semi_axes } => ellipsoid_contains(offset, *semi_axes),
        }
    }
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn sphere_contains(d: [f64; 3], radius: f64) -> bool {
    dot(d, d) <= radius * radius
}

fn ellipsoid_contains(d: [f64; 3], semi_axes: [f64; 3]) -> bool {
    let q: f64 = (0..3).map(|i| (d[i] / semi_axes[i]).powi(2)).sum();
    q <= 1.0
}

fn cube_contains(d: [f64; 3], half_extent: f64, euler_deg: [f64; 3]) -> bool {
    let local = rotate_inverse(euler_matrix(euler_deg), d);
    local.iter().all(|c| c.abs() <= half_extent)
}

fn cylinder_contains(d: [f64; 3], axis: [f64; 3], half_length: f64, radius: f64) -> bool {
    let len = norm(axis);
    let a = [axis[0] / len, axis[1] / len, axis[2] / len];

    let along = dot(d, a);
    if along.abs() > half_length {
        return false;
    }
    let radial = [d[0] - along * a[0], d[1] - along * a[1], d[2] - along * a[2]];
    dot(radial, radial) <= radius * radius
}

/// Rotation matrix R = Rz(α) · Ry(β) · Rx(γ) for Euler angles [α, β, γ] in degrees
pub fn euler_matrix(euler_deg: [f64; 3]) -> [[f64; 3]; 3] {
    let (sa, ca) = euler_deg[0].to_radians().sin_cos();
    let (sb, cb) = euler_deg[1].to_radians().sin_cos();
    let (sg, cg) = euler_deg[2].to_radians().sin_cos();

    [
        [ca * cb, ca * sb * sg - sa * cg, ca * sb * cg + sa * sg],
        [sa * cb, sa * sb * sg + ca * cg, sa * sb * cg - ca * sg],
        [-sb, cb * sg, cb * cg],
    ]
}

/// Apply Rᵀ (the inverse of an orthonormal rotation) to `v`
fn rotate_inverse(r: [[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        r[0][0] * v[0] + r[1][0] * v[1] + r[2][0] * v[2],
        r[0][1] * v[0] + r[1][1] * v[1] + r[2][1] * v[2],
        r[0][2] * v[0] + r[1][2] * v[1] + r[2][2] * v[2],
    ]
}
