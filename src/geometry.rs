//! Vector, quaternion and rotation-matrix primitives shared by the ligand
//! model, the evaluator and the optimizer.
//!
//! These are hand-rolled rather than pulled from a linear-algebra crate: the
//! conformation vector and gradient are flat `Vec<f64>` buffers indexed by
//! the caller, and the hot loops in `evaluate` want plain `[f64; 3]` math
//! with no trait-object or generic overhead.

use std::ops;

fn float_equals(x: f64, y: f64) -> bool {
    (x - y).abs() < f64::EPSILON
}

/// A three-component vector in either world or frame-local coordinates,
/// depending on context.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm2(&self) -> f64 {
        self.dot(*self)
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn normalized(&self) -> Vec3 {
        *self / self.norm()
    }

    pub fn scale(&self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl ops::Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl ops::Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        self.scale(s)
    }
}

impl ops::Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, s: f64) -> Vec3 {
        Vec3::new(self.x / s, self.y / s, self.z / s)
    }
}

impl ops::AddAssign for Vec3 {
    fn add_assign(&mut self, other: Vec3) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Vec3) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

/// A unit (or near-unit) quaternion, scalar-first: `w + x*i + y*j + z*k`.
///
/// The encoding is scalar-first everywhere in this crate: random
/// initialization, the evaluator's forward kinematics, the BFGS line
/// search's orientation update and `compose_result` all agree on this
/// convention (see DESIGN.md).
#[derive(Debug, Copy, Clone)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Quaternion {
        Quaternion { w, x, y, z }
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(&self, other: Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm2(&self) -> f64 {
        self.dot(*self)
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn normalize(&mut self) {
        let norm = self.norm();
        self.w /= norm;
        self.x /= norm;
        self.y /= norm;
        self.z /= norm;
    }

    pub fn normalized(&self) -> Quaternion {
        let mut q = *self;
        q.normalize();
        q
    }

    /// Rotates `v` by this quaternion: `q * (0, v) * q^-1`, assuming `self`
    /// is unit norm (so `q^-1 == conjugate()`).
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let p = Quaternion::new(0.0, v.x, v.y, v.z);
        let r = *self * p * self.conjugate();
        Vec3::new(r.x, r.y, r.z)
    }

    /// Converts to the equivalent 3x3 rotation matrix.
    pub fn to_mat3(&self) -> Mat3 {
        let Quaternion { w, x, y, z } = self.normalized();
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Mat3::new(
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy)],
            [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx)],
            [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy)],
        )
    }
}

impl Default for Quaternion {
    fn default() -> Quaternion {
        Quaternion::new(1.0, 0.0, 0.0, 0.0)
    }
}

impl PartialEq for Quaternion {
    fn eq(&self, other: &Self) -> bool {
        float_equals(self.w, other.w)
            && float_equals(self.x, other.x)
            && float_equals(self.y, other.y)
            && float_equals(self.z, other.z)
    }
}

impl ops::Mul for Quaternion {
    type Output = Quaternion;

    /// Non-commutative: the right operand is applied first, i.e.
    /// `(p * q).rotate(v) == p.rotate(q.rotate(v))`.
    fn mul(self, other: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }
}

impl ops::Mul<f64> for Quaternion {
    type Output = Quaternion;
    fn mul(self, s: f64) -> Quaternion {
        Quaternion::new(s * self.w, s * self.x, s * self.y, s * self.z)
    }
}

/// Builds a unit quaternion rotating by `angle` radians about `axis`
/// (assumed unit norm). `angle` is the raw torsion parameter: this crate
/// resolves the radians-vs-normalized-cycle open question in favor of
/// plain radians with no 2*pi wrap.
pub fn axis_angle_to_quat(axis: Vec3, angle: f64) -> Quaternion {
    let half = angle * 0.5;
    let s = half.sin();
    Quaternion::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
}

/// Builds a small-rotation quaternion from a rotation vector `v`, whose
/// norm is the rotation angle in radians and whose direction is the axis.
/// Used by the BFGS line search to turn a continuous orientation step
/// `alpha * p[3..6]` into a quaternion update.
pub fn vec3_to_quat(v: Vec3) -> Quaternion {
    let angle = v.norm();
    if angle < f64::EPSILON {
        return Quaternion::default();
    }
    axis_angle_to_quat(v / angle, angle)
}

/// A 3x3 matrix stored row-major.
#[derive(Debug, Copy, Clone)]
pub struct Mat3 {
    pub rows: [[f64; 3]; 3],
}

impl Mat3 {
    pub fn new(r0: [f64; 3], r1: [f64; 3], r2: [f64; 3]) -> Mat3 {
        Mat3 { rows: [r0, r1, r2] }
    }

    pub const IDENTITY: Mat3 = Mat3 {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn apply(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            self.rows[0][0] * v.x + self.rows[0][1] * v.y + self.rows[0][2] * v.z,
            self.rows[1][0] * v.x + self.rows[1][1] * v.y + self.rows[1][2] * v.z,
            self.rows[2][0] * v.x + self.rows[2][1] * v.y + self.rows[2][2] * v.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn vec3_cross_is_right_handed() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn quaternion_identity_is_no_op() {
        let q = Quaternion::default();
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(q.rotate(v).x, v.x);
        assert_relative_eq!(q.rotate(v).y, v.y);
        assert_relative_eq!(q.rotate(v).z, v.z);
    }

    #[test]
    fn quaternion_mul_is_noncommutative_and_applies_right_first() {
        let p = axis_angle_to_quat(Vec3::new(0.0, 0.0, 1.0), PI / 2.0);
        let q = axis_angle_to_quat(Vec3::new(1.0, 0.0, 0.0), PI / 2.0);
        let v = Vec3::new(1.0, 0.0, 0.0);
        let composed = (p * q).rotate(v);
        let sequential = p.rotate(q.rotate(v));
        assert_relative_eq!(composed.x, sequential.x, epsilon = 1e-12);
        assert_relative_eq!(composed.y, sequential.y, epsilon = 1e-12);
        assert_relative_eq!(composed.z, sequential.z, epsilon = 1e-12);
    }

    #[test]
    fn axis_angle_full_turn_is_identity_rotation() {
        let axis = Vec3::new(0.0, 1.0, 0.0).normalized();
        let q = axis_angle_to_quat(axis, 2.0 * PI);
        let v = Vec3::new(1.0, 0.3, -0.4);
        let rotated = q.rotate(v);
        assert_relative_eq!(rotated.x, v.x, epsilon = 1e-9);
        assert_relative_eq!(rotated.y, v.y, epsilon = 1e-9);
        assert_relative_eq!(rotated.z, v.z, epsilon = 1e-9);
    }

    #[test]
    fn to_mat3_matches_rotate() {
        let q = axis_angle_to_quat(Vec3::new(0.2, 0.4, 0.9).normalized(), 1.234);
        let m = q.to_mat3();
        let v = Vec3::new(0.5, -1.2, 2.0);
        let by_quat = q.rotate(v);
        let by_mat = m.apply(v);
        assert_relative_eq!(by_quat.x, by_mat.x, epsilon = 1e-9);
        assert_relative_eq!(by_quat.y, by_mat.y, epsilon = 1e-9);
        assert_relative_eq!(by_quat.z, by_mat.z, epsilon = 1e-9);
    }

    #[test]
    fn vec3_to_quat_zero_vector_is_identity() {
        let q = vec3_to_quat(Vec3::ZERO);
        assert_eq!(q, Quaternion::default());
    }
}
