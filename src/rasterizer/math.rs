//! Vector, quaternion and matrix math for the pipeline
//!
//! Everything here is a small `Copy` value type. Operations return new values
//! on the stack or mutate `self` in place; nothing allocates.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Homogeneous 4-component vector. `w = 1` for points, `w = 0` for directions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const ZERO: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };
    pub const ORIGIN: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Position (w = 1)
    pub const fn point(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, w: 1.0 }
    }

    /// Direction (w = 0)
    pub const fn direction(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, w: 0.0 }
    }

    pub fn dot(self, other: Vec4) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// 3D cross product. `w` of both inputs is ignored and the result is a direction.
    pub fn cross(self, other: Vec4) -> Vec4 {
        Vec4 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
            w: 0.0,
        }
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit-length copy, or `None` when the magnitude is zero or not finite.
    pub fn try_normalize(self) -> Option<Vec4> {
        let len = self.length();
        if len == 0.0 || !len.is_finite() {
            return None;
        }
        Some(self.scale(1.0 / len))
    }

    /// Unit-length copy. A zero vector stays zero instead of turning into NaN.
    pub fn normalize(self) -> Vec4 {
        self.try_normalize().unwrap_or(Vec4::ZERO)
    }

    pub fn scale(self, s: f32) -> Vec4 {
        Vec4 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
            w: self.w * s,
        }
    }

    pub fn lerp(self, other: Vec4, t: f32) -> Vec4 {
        self + (other - self).scale(t)
    }

    /// Full projective transform: `m * self`, including the w row.
    pub fn transform(self, m: &Matrix4) -> Vec4 {
        let r = &m.m;
        Vec4 {
            x: r[0][0] * self.x + r[0][1] * self.y + r[0][2] * self.z + r[0][3] * self.w,
            y: r[1][0] * self.x + r[1][1] * self.y + r[1][2] * self.z + r[1][3] * self.w,
            z: r[2][0] * self.x + r[2][1] * self.y + r[2][2] * self.z + r[2][3] * self.w,
            w: r[3][0] * self.x + r[3][1] * self.y + r[3][2] * self.z + r[3][3] * self.w,
        }
    }

    /// Affine transform treating `self` as a point. The bottom row of `m` is
    /// ignored and the result always has `w = 1`.
    pub fn transform_affine(self, m: &Matrix4) -> Vec4 {
        let r = &m.m;
        Vec4 {
            x: r[0][0] * self.x + r[0][1] * self.y + r[0][2] * self.z + r[0][3],
            y: r[1][0] * self.x + r[1][1] * self.y + r[1][2] * self.z + r[1][3],
            z: r[2][0] * self.x + r[2][1] * self.y + r[2][2] * self.z + r[2][3],
            w: 1.0,
        }
    }
}

impl Add for Vec4 {
    type Output = Vec4;
    fn add(self, other: Vec4) -> Vec4 {
        Vec4 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
            w: self.w + other.w,
        }
    }
}

impl Sub for Vec4 {
    type Output = Vec4;
    fn sub(self, other: Vec4) -> Vec4 {
        Vec4 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
            w: self.w - other.w,
        }
    }
}

impl Mul<f32> for Vec4 {
    type Output = Vec4;
    fn mul(self, s: f32) -> Vec4 {
        self.scale(s)
    }
}

impl Neg for Vec4 {
    type Output = Vec4;
    fn neg(self) -> Vec4 {
        self.scale(-1.0)
    }
}

impl fmt::Display for Vec4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3}, {:.3})", self.x, self.y, self.z, self.w)
    }
}

/// Rotation quaternion `w + i·x + j·y + k·z`.
///
/// Composition is `self * other`: the result applies `other` first, then `self`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub i: f32,
    pub j: f32,
    pub k: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { w: 1.0, i: 0.0, j: 0.0, k: 0.0 };

    pub const fn new(w: f32, i: f32, j: f32, k: f32) -> Self {
        Self { w, i, j, k }
    }

    /// Rotation of `radians` around `axis` (normalized internally).
    pub fn from_axis_angle(axis: Vec4, radians: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (radians * 0.5).sin_cos();
        let mut q = Self::new(c, axis.x * s, axis.y * s, axis.z * s);
        q.normalize();
        q
    }

    pub fn norm_squared(self) -> f32 {
        self.w * self.w + self.i * self.i + self.j * self.j + self.k * self.k
    }

    /// Renormalize in place. Degenerates to identity below 1e-10 squared magnitude.
    pub fn normalize(&mut self) {
        let sq = self.norm_squared();
        if sq < 1e-10 {
            *self = Self::IDENTITY;
            return;
        }

        let inv = 1.0 / sq.sqrt();
        self.w *= inv;
        self.i *= inv;
        self.j *= inv;
        self.k *= inv;
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.i, -self.j, -self.k)
    }

    /// Rotate a direction (w is carried through unchanged).
    pub fn rotate_vector(self, v: Vec4) -> Vec4 {
        let p = Quaternion::new(0.0, v.x, v.y, v.z);
        let r = self * p * self.conjugate();
        Vec4::new(r.i, r.j, r.k, v.w)
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product
    fn mul(self, o: Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * o.w - self.i * o.i - self.j * o.j - self.k * o.k,
            i: self.w * o.i + self.i * o.w + self.j * o.k - self.k * o.j,
            j: self.w * o.j - self.i * o.k + self.j * o.w + self.k * o.i,
            k: self.w * o.k + self.i * o.j - self.j * o.i + self.k * o.w,
        }
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} + {:.3}i + {:.3}j + {:.3}k", self.w, self.i, self.j, self.k)
    }
}

/// Row-major 4x4 matrix. `m[row][col]`, column vectors on the right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    pub m: [[f32; 4]; 4],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn from_rows(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    /// Pure translation by the xyz of `offset`.
    pub fn translation(offset: Vec4) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][3] = offset.x;
        out.m[1][3] = offset.y;
        out.m[2][3] = offset.z;
        out
    }

    /// Pure rotation. Takes oriented space back to world space.
    pub fn rotation(q: Quaternion) -> Self {
        let mut out = Self::IDENTITY;
        write_rotation(&mut out, q.i, q.j, q.k, q.w);
        out
    }

    /// Inverse of `translation(pos) * rotation(rot)`, built directly from the
    /// conjugate rotation and the rotated, negated position.
    pub fn view(pos: Vec4, rot: Quaternion) -> Self {
        let mut out = Self::IDENTITY;
        write_rotation(&mut out, -rot.i, -rot.j, -rot.k, rot.w);

        let r = out.m;
        out.m[0][3] = -(r[0][0] * pos.x + r[0][1] * pos.y + r[0][2] * pos.z);
        out.m[1][3] = -(r[1][0] * pos.x + r[1][1] * pos.y + r[1][2] * pos.z);
        out.m[2][3] = -(r[2][0] * pos.x + r[2][1] * pos.y + r[2][2] * pos.z);
        out
    }

    /// Perspective projection with the far plane at infinity.
    ///
    /// Clip-space `w` equals the view-space distance in front of the camera
    /// (`-z_view`).
    pub fn perspective_infinite(fov_y_degrees: f32, aspect: f32, z_near: f32) -> Self {
        let f = 1.0 / (fov_y_degrees.to_radians() * 0.5).tan();
        Self {
            m: [
                [f / aspect, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, -1.0, -2.0 * z_near],
                [0.0, 0.0, -1.0, 0.0],
            ],
        }
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::IDENTITY;
        for r in 0..4 {
            for c in 0..4 {
                out.m[r][c] = self.m[c][r];
            }
        }
        out
    }

    /// Largest absolute element-wise difference, for tolerance checks.
    pub fn max_abs_diff(&self, other: &Matrix4) -> f32 {
        let mut worst = 0.0f32;
        for r in 0..4 {
            for c in 0..4 {
                worst = worst.max((self.m[r][c] - other.m[r][c]).abs());
            }
        }
        worst
    }
}

fn write_rotation(out: &mut Matrix4, x: f32, y: f32, z: f32, w: f32) {
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);

    out.m[0][0] = 1.0 - (yy + zz);
    out.m[0][1] = xy - wz;
    out.m[0][2] = xz + wy;

    out.m[1][0] = xy + wz;
    out.m[1][1] = 1.0 - (xx + zz);
    out.m[1][2] = yz - wx;

    out.m[2][0] = xz - wy;
    out.m[2][1] = yz + wx;
    out.m[2][2] = 1.0 - (xx + yy);
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, r: Matrix4) -> Matrix4 {
        let mut out = Matrix4 { m: [[0.0; 4]; 4] };
        for row in 0..4 {
            for col in 0..4 {
                out.m[row][col] = self.m[row][0] * r.m[0][col]
                    + self.m[row][1] * r.m[1][col]
                    + self.m[row][2] * r.m[2][col]
                    + self.m[row][3] * r.m[3][col];
            }
        }
        out
    }
}

impl fmt::Display for Matrix4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.m {
            writeln!(
                f,
                "[{:.4}, {:.4}, {:.4}, {:.4}]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}

/// Barycentric weights `(w_a, w_b, w_c)` of pixel `p` in the integer triangle
/// `a, b, c`, using signed areas in 64-bit to stay exact on large triangles.
///
/// Returns `None` for zero-area (collinear or coincident) triangles.
pub fn barycentric(p: (i32, i32), a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> Option<[f32; 3]> {
    let area = signed_area(a, b, c);
    if area == 0 {
        return None;
    }

    let inv_area = 1.0 / area as f64;
    let w_b = signed_area(a, p, c) as f64 * inv_area;
    let w_c = signed_area(a, b, p) as f64 * inv_area;
    let w_a = 1.0 - w_b - w_c;

    Some([w_a as f32, w_b as f32, w_c as f32])
}

/// Twice the signed area of `a, b, c`: `(b - a) x (c - a)`.
pub fn signed_area(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> i64 {
    let (ax, ay) = (a.0 as i64, a.1 as i64);
    (b.0 as i64 - ax) * (c.1 as i64 - ay) - (c.0 as i64 - ax) * (b.1 as i64 - ay)
}

/// Ray-triangle intersection using the Möller–Trumbore algorithm.
///
/// `ray_dir` should be normalized. Returns `Some(t)` for hits in front of the
/// origin, where `t` is the distance along the ray.
pub fn ray_triangle_intersect(
    ray_origin: Vec4,
    ray_dir: Vec4,
    v0: Vec4,
    v1: Vec4,
    v2: Vec4,
) -> Option<f32> {
    const EPSILON: f32 = 0.00001;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray_dir.cross(edge2);
    let a = dot3(edge1, h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray_origin - v0;
    let u = f * dot3(s, h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * dot3(ray_dir, q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * dot3(edge2, q);
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

#[inline]
fn dot3(a: Vec4, b: Vec4) -> f32 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_vec4_dot_and_cross() {
        let a = Vec4::direction(1.0, 2.0, 3.0);
        let b = Vec4::direction(4.0, 5.0, 6.0);
        assert_abs_diff_eq!(a.dot(b), 32.0, epsilon = 0.001);

        let c = Vec4::direction(1.0, 0.0, 0.0).cross(Vec4::direction(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(c.z, 1.0, epsilon = 0.001);
        assert_eq!(c.w, 0.0);
    }

    #[test]
    fn test_normalize_zero_is_guarded() {
        assert!(Vec4::ZERO.try_normalize().is_none());
        let n = Vec4::ZERO.normalize();
        assert!(!n.x.is_nan() && !n.y.is_nan() && !n.z.is_nan());
    }

    #[test]
    fn test_quaternion_normalize_idempotent() {
        let mut q = Quaternion::new(0.577, 0.577, 0.577, 0.0).normalized();
        let before = q;
        q.normalize();
        assert_abs_diff_eq!(q.w, before.w, epsilon = 1e-6);
        assert_abs_diff_eq!(q.i, before.i, epsilon = 1e-6);
        assert_abs_diff_eq!(q.j, before.j, epsilon = 1e-6);
        assert_abs_diff_eq!(q.k, before.k, epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_degenerate_becomes_identity() {
        let mut q = Quaternion::new(0.0, 1e-7, 0.0, 0.0);
        q.normalize();
        assert_eq!(q, Quaternion::IDENTITY);
    }

    #[test]
    fn test_rotation_matrix_matches_quaternion() {
        let q = Quaternion::from_axis_angle(Vec4::direction(0.0, 1.0, 0.0), FRAC_PI_2);
        let v = Vec4::direction(1.0, 0.0, 0.0);

        let by_matrix = v.transform(&Matrix4::rotation(q));
        let by_quat = q.rotate_vector(v);

        // +X rotated a quarter turn around +Y lands on -Z
        assert_abs_diff_eq!(by_matrix.z, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(by_matrix.x, by_quat.x, epsilon = 1e-5);
        assert_abs_diff_eq!(by_matrix.z, by_quat.z, epsilon = 1e-5);
    }

    #[test]
    fn test_view_inverts_model_transform() {
        let pos = Vec4::point(3.0, -2.0, 7.5);
        let rot = Quaternion::new(0.9, 0.1, -0.3, 0.2).normalized();

        let model = Matrix4::translation(pos) * Matrix4::rotation(rot);
        let view = Matrix4::view(pos, rot);

        assert!((view * model).max_abs_diff(&Matrix4::IDENTITY) < 1e-5);

        let p = Vec4::point(1.0, 2.0, 3.0);
        let back = p.transform(&model).transform(&view);
        assert_abs_diff_eq!(back.x, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(back.y, 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(back.z, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn test_perspective_layout() {
        let p = Matrix4::perspective_infinite(90.0, 2.0, 0.5);
        assert_abs_diff_eq!(p.m[1][1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.m[0][0], 0.5, epsilon = 1e-6);
        assert_eq!(p.m[2][2], -1.0);
        assert_eq!(p.m[2][3], -1.0);
        assert_eq!(p.m[3][2], -1.0);
        assert_eq!(p.m[3][3], 0.0);

        let clip = Vec4::point(0.0, 0.0, -4.0).transform(&p);
        assert_abs_diff_eq!(clip.w, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_barycentric_inside_and_outside() {
        let (a, b, c) = ((0, 0), (10, 0), (5, 10));

        let inside = barycentric((5, 3), a, b, c).unwrap();
        assert!(inside.iter().all(|&w| w >= 0.0));
        assert_abs_diff_eq!(inside.iter().sum::<f32>(), 1.0, epsilon = 1e-4);

        let outside = barycentric((20, 20), a, b, c).unwrap();
        assert!(outside.iter().any(|&w| w < 0.0));

        assert_eq!(barycentric((5, 3), a, a, c), None);
        assert_eq!(barycentric((1, 1), (0, 0), (2, 2), (4, 4)), None);
    }

    #[test]
    fn test_barycentric_large_coordinates_do_not_overflow() {
        let (a, b, c) = ((-60_000, -60_000), (60_000, -60_000), (0, 60_000));
        let w = barycentric((0, 0), a, b, c).unwrap();
        assert!(w.iter().all(|&x| x > 0.0));
        assert_abs_diff_eq!(w.iter().sum::<f32>(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_triangle_hit_and_miss() {
        let v0 = Vec4::point(-1.0, -1.0, -5.0);
        let v1 = Vec4::point(1.0, -1.0, -5.0);
        let v2 = Vec4::point(0.0, 1.0, -5.0);
        let dir = Vec4::direction(0.0, 0.0, -1.0);

        let t = ray_triangle_intersect(Vec4::ORIGIN, dir, v0, v1, v2).unwrap();
        assert_abs_diff_eq!(t, 5.0, epsilon = 1e-4);

        let away = Vec4::direction(0.0, 0.0, 1.0);
        assert!(ray_triangle_intersect(Vec4::ORIGIN, away, v0, v1, v2).is_none());
    }
}
