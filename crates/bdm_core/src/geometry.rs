//! 3D vector/matrix value types and the small set of numerical kernels the
//! rest of the engine is built on: orientation-ish arithmetic, rotations,
//! linear solves. Everything here is plain floating point; there are no
//! exact geometric predicates, matching the source this engine descends
//! from (degenerate configurations are broken with random jitter instead).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Index, Mul, Neg, Sub};

/// A point or free vector in R^3. Double precision throughout: the
/// triangulation's in-sphere/orientation arithmetic is the most
/// round-off-sensitive part of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm_squared(self) -> f64 {
        self.dot(self)
    }

    pub fn norm(self) -> f64 {
        self.norm_squared().sqrt()
    }

    pub fn distance(self, other: Vec3) -> f64 {
        (self - other).norm()
    }

    pub fn distance_squared(self, other: Vec3) -> f64 {
        (self - other).norm_squared()
    }

    /// Normalized copy of this vector. If the vector is (numerically) zero,
    /// a random unit vector is substituted rather than producing NaNs —
    /// degenerate-direction cases are always recovered locally, never
    /// propagated as an error.
    pub fn normalize(self) -> Vec3 {
        let n = self.norm();
        if n < 1e-14 {
            random_unit_vector(&mut rand::thread_rng())
        } else {
            self * (1.0 / n)
        }
    }

    pub fn scaled(self, factor: f64) -> Vec3 {
        self * factor
    }

    /// Rodrigues' rotation formula: rotate `self` around unit axis `axis`
    /// by `angle` radians.
    pub fn rotate_around_axis(self, axis: Vec3, angle: f64) -> Vec3 {
        let k = axis.normalize();
        let cos_a = angle.cos();
        let sin_a = angle.sin();
        self * cos_a + k.cross(self) * sin_a + k * (k.dot(self) * (1.0 - cos_a))
    }

    /// Unsigned angle between two vectors, in [0, pi].
    pub fn angle(self, other: Vec3) -> f64 {
        let denom = self.norm() * other.norm();
        if denom < 1e-14 {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos()
    }

    /// Orthogonal projection of `self` onto `onto`.
    pub fn project_onto(self, onto: Vec3) -> Vec3 {
        let n2 = onto.norm_squared();
        if n2 < 1e-14 {
            return Vec3::ZERO;
        }
        onto * (self.dot(onto) / n2)
    }

    /// Component of `self` perpendicular to `axis`.
    pub fn project_onto_plane(self, axis: Vec3) -> Vec3 {
        self - self.project_onto(axis)
    }

    /// A unit vector perpendicular to `self`, with a random phase around
    /// `self` — used whenever the source calls for "some" perpendicular
    /// direction (e.g. seeding local coordinate axes, side-branch jitter).
    pub fn random_perpendicular(self, rng: &mut impl Rng) -> Vec3 {
        let base = if self.x.abs() < 0.9 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        let perp = base.cross(self).normalize();
        let phase = rng.gen_range(0.0..std::f64::consts::TAU);
        perp.rotate_around_axis(self.normalize(), phase)
    }

    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        self + (other - self) * t
    }
}

pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let n2 = v.norm_squared();
        if n2 > 1e-6 && n2 <= 1.0 {
            return v * (1.0 / n2.sqrt());
        }
    }
}

/// Jitter a position by up to `fraction` of `scale` along a random
/// direction. Used to break degenerate (coplanar/cospherical) Delaunay
/// configurations, as the source does.
pub fn jitter(position: Vec3, scale: f64, fraction: f64, rng: &mut impl Rng) -> Vec3 {
    let magnitude = scale * fraction * rng.gen_range(0.0..1.0);
    position + random_unit_vector(rng) * magnitude
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Index<usize> for Vec3 {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3 index out of range: {i}"),
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Vec3::ZERO
    }
}

/// A 3x3 matrix in row-major order, used for the local orthonormal frames
/// of physical objects and for small linear solves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat33 {
    pub rows: [[f64; 3]; 3],
}

impl Mat33 {
    pub const IDENTITY: Mat33 = Mat33 {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Self {
        Self { rows: [r0.to_array(), r1.to_array(), r2.to_array()] }
    }

    /// Matrix with the given vectors as columns (e.g. a local frame's
    /// change-of-basis matrix).
    pub fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Mat33 {
            rows: [
                [c0.x, c1.x, c2.x],
                [c0.y, c1.y, c2.y],
                [c0.z, c1.z, c2.z],
            ],
        }
    }

    pub fn transpose(self) -> Mat33 {
        let r = self.rows;
        Mat33 {
            rows: [
                [r[0][0], r[1][0], r[2][0]],
                [r[0][1], r[1][1], r[2][1]],
                [r[0][2], r[1][2], r[2][2]],
            ],
        }
    }

    pub fn mul_vec(self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.rows[0][0] * v.x + self.rows[0][1] * v.y + self.rows[0][2] * v.z,
            self.rows[1][0] * v.x + self.rows[1][1] * v.y + self.rows[1][2] * v.z,
            self.rows[2][0] * v.x + self.rows[2][1] * v.y + self.rows[2][2] * v.z,
        )
    }

    pub fn determinant(&self) -> f64 {
        let r = self.rows;
        r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
    }
}

pub fn det2(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a * d - b * c
}

pub fn det3(m: [[f64; 3]; 3]) -> f64 {
    Mat33 { rows: m }.determinant()
}

/// Solve the 2x2 linear system `a*x = b` via Cramer's rule. Returns `None`
/// if the system is singular within tolerance (caller falls back to a
/// perpendicular/degenerate-case default).
pub fn cramer2(a: [[f64; 2]; 2], b: [f64; 2]) -> Option<[f64; 2]> {
    let d = det2(a[0][0], a[0][1], a[1][0], a[1][1]);
    if d.abs() < 1e-14 {
        return None;
    }
    let x = det2(b[0], a[0][1], b[1], a[1][1]) / d;
    let y = det2(a[0][0], b[0], a[1][0], b[1]) / d;
    Some([x, y])
}

/// Solve the 3x3 linear system `a*x = b` via Cramer's rule.
pub fn cramer3(a: [[f64; 3]; 3], b: [f64; 3]) -> Option<[f64; 3]> {
    let d = det3(a);
    if d.abs() < 1e-14 {
        return None;
    }
    let mut replace_col = |col: usize| -> f64 {
        let mut m = a;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        det3(m)
    };
    Some([replace_col(0) / d, replace_col(1) / d, replace_col(2) / d])
}

/// Gaussian elimination with partial pivoting for small dense systems
/// (this engine only ever needs up to n=4, for the barycentric-coordinate
/// solve of §4.D). `a` is row-major n*n, `b` has n entries.
pub fn gaussian_eliminate(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    debug_assert_eq!(a.len(), n);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            a[r1][col].abs().partial_cmp(&a[r2][col].abs()).unwrap()
        })?;
        if a[pivot_row][col].abs() < 1e-14 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_cross_basic() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(a.dot(b), 0.0);
        assert_eq!(a.cross(b), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn normalize_unit_length() {
        let v = Vec3::new(3.0, 4.0, 0.0).normalize();
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotate_around_axis_preserves_length_and_is_additive() {
        let v = Vec3::new(1.0, 0.0, 0.0);
        let axis = Vec3::new(0.0, 0.0, 1.0);
        let once = v.rotate_around_axis(axis, std::f64::consts::FRAC_PI_2);
        assert!((once.norm() - 1.0).abs() < 1e-9);
        assert!((once.x).abs() < 1e-9);
        assert!((once.y - 1.0).abs() < 1e-9);

        let composed = v
            .rotate_around_axis(axis, 0.4)
            .rotate_around_axis(axis, 0.6);
        let direct = v.rotate_around_axis(axis, 1.0);
        assert!(composed.distance(direct) < 1e-9);
    }

    #[test]
    fn projection_onto_plane_is_orthogonal() {
        let axis = Vec3::new(0.0, 0.0, 2.0);
        let v = Vec3::new(1.0, 1.0, 1.0);
        let proj = v.project_onto_plane(axis);
        assert!(proj.dot(axis).abs() < 1e-12);
    }

    #[test]
    fn cramer2_solves_simple_system() {
        // x + y = 3, x - y = 1 -> x=2, y=1
        let sol = cramer2([[1.0, 1.0], [1.0, -1.0]], [3.0, 1.0]).unwrap();
        assert!((sol[0] - 2.0).abs() < 1e-12);
        assert!((sol[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_eliminate_matches_cramer3() {
        let a = [[2.0, 1.0, -1.0], [-3.0, -1.0, 2.0], [-2.0, 1.0, 2.0]];
        let b = [8.0, -11.0, -3.0];
        let via_cramer = cramer3(a, b).unwrap();
        let via_gauss = gaussian_eliminate(
            a.iter().map(|r| r.to_vec()).collect(),
            b.to_vec(),
        )
        .unwrap();
        for i in 0..3 {
            assert!((via_cramer[i] - via_gauss[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn singular_system_returns_none() {
        assert!(cramer2([[1.0, 2.0], [2.0, 4.0]], [1.0, 2.0]).is_none());
    }
}
