//! Rigid-body math on top of glam: rotations, transforms, sweeps and the
//! small linear solves used by the joint constraints.

use glam::{Mat3, Vec2, Vec3};

/// 2D rotation stored as sine/cosine so transforms never re-evaluate
/// trigonometry in the hot loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: 0.0, c: 1.0 };

    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Rot { s, c }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// The rotated x axis (1, 0).
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// The rotated y axis (0, 1).
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Compose rotations: q * r.
    pub fn mul(self, r: Rot) -> Rot {
        Rot {
            s: self.s * r.c + self.c * r.s,
            c: self.c * r.c - self.s * r.s,
        }
    }

    /// Compose with the inverse of self: q^T * r.
    pub fn mul_t(self, r: Rot) -> Rot {
        Rot {
            s: self.c * r.s - self.s * r.c,
            c: self.c * r.c + self.s * r.s,
        }
    }

    /// Rotate a vector.
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector.
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Default for Rot {
    fn default() -> Self {
        Rot::IDENTITY
    }
}

/// A rigid transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform2 {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform2 {
    pub const IDENTITY: Transform2 = Transform2 {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    pub fn new(position: Vec2, angle: f32) -> Self {
        Transform2 {
            p: position,
            q: Rot::new(angle),
        }
    }

    /// Map a local point into world space.
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Map a world point into local space.
    pub fn apply_inv(&self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// v2 = A.q.Rot(B.q.Rot(v1) + B.p) + A.p = (A * B).q.Rot(v1) + (A * B).p
    pub fn mul(&self, b: &Transform2) -> Transform2 {
        Transform2 {
            q: self.q.mul(b.q),
            p: self.q.rotate(b.p) + self.p,
        }
    }

    /// v2 = A.q' * (B.q * v1 + B.p - A.p) = A.q' * B.q * v1 + A.q' * (B.p - A.p)
    pub fn mul_t(&self, b: &Transform2) -> Transform2 {
        Transform2 {
            q: self.q.mul_t(b.q),
            p: self.q.inv_rotate(b.p - self.p),
        }
    }
}

/// Describes the motion of a body origin over a step interval. Shapes are
/// attached relative to the body origin while the sweep interpolates the
/// center of mass, which simplifies the solver but makes TOI queries
/// interpolate through here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sweep {
    /// Local center of mass.
    pub local_center: Vec2,
    /// Center world position at the start of the interval.
    pub c0: Vec2,
    /// Center world position at the end of the interval.
    pub c: Vec2,
    /// Angle at the start of the interval.
    pub a0: f32,
    /// Angle at the end of the interval.
    pub a: f32,
    /// Fraction of the current step already advanced, in [0,1).
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated transform at `beta` in [0,1] across the remaining
    /// interval.
    pub fn transform(&self, beta: f32) -> Transform2 {
        let p = (1.0 - beta) * self.c0 + beta * self.c;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(angle);
        // Shift to the body origin.
        Transform2 {
            p: p - q.rotate(self.local_center),
            q,
        }
    }

    /// Advance the sweep start to `alpha`, which must not rewind.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Normalize the angles to keep them near zero. Large rotations make the
    /// TOI root finder fail.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// 2D cross product, a scalar.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross of a scalar (z axis) with a vector.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Cross of a vector with a scalar (z axis).
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Solve A * x = b for a 2x2 system without computing the inverse. Returns
/// zero when the system is singular, which the solver treats as "no
/// correction".
pub fn solve22(a11: f32, a12: f32, a21: f32, a22: f32, b: Vec2) -> Vec2 {
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Solve A * x = b for a symmetric-positive-definite-ish 3x3 system via
/// Cramer's rule. Returns zero on a singular system.
pub fn solve33(a: &Mat3, b: Vec3) -> Vec3 {
    let (ex, ey, ez) = (a.x_axis, a.y_axis, a.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec3::new(
        det * b.dot(ey.cross(ez)),
        det * ex.dot(b.cross(ez)),
        det * ex.dot(ey.cross(b)),
    )
}

/// Solve the upper-left 2x2 block of a 3x3 system.
pub fn solve33_22(a: &Mat3, b: Vec2) -> Vec2 {
    solve22(a.x_axis.x, a.y_axis.x, a.x_axis.y, a.y_axis.y, b)
}

/// Inverse of the upper-left 2x2 block, written back as a Mat3 with a zero
/// third row/column.
pub fn inverse22(a: &Mat3) -> Mat3 {
    let (a11, a12) = (a.x_axis.x, a.y_axis.x);
    let (a21, a22) = (a.x_axis.y, a.y_axis.y);
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Mat3::from_cols(
        Vec3::new(det * a22, -det * a21, 0.0),
        Vec3::new(-det * a12, det * a11, 0.0),
        Vec3::ZERO,
    )
}

/// Symmetric inverse of a full 3x3 effective-mass matrix. Singular blocks
/// collapse to zero so the corresponding constraint rows are skipped.
pub fn sym_inverse33(a: &Mat3) -> Mat3 {
    let (ex, ey, ez) = (a.x_axis, a.y_axis, a.z_axis);
    let mut det = ex.dot(ey.cross(ez));
    if det != 0.0 {
        det = 1.0 / det;
    }
    let a11 = ex.x;
    let a12 = ey.x;
    let a13 = ez.x;
    let a22 = ey.y;
    let a23 = ez.y;
    let a33 = ez.z;

    let col1 = Vec3::new(
        det * (a22 * a33 - a23 * a23),
        det * (a13 * a23 - a12 * a33),
        det * (a12 * a23 - a13 * a22),
    );
    let col2 = Vec3::new(
        col1.y,
        det * (a11 * a33 - a13 * a13),
        det * (a13 * a12 - a11 * a23),
    );
    let col3 = Vec3::new(col1.z, col2.z, det * (a11 * a22 - a12 * a12));
    Mat3::from_cols(col1, col2, col3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn rotation_round_trip() {
        let q = Rot::new(0.73);
        let v = Vec2::new(3.0, -2.0);
        let back = q.inv_rotate(q.rotate(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-5);
    }

    #[test]
    fn quarter_turn_maps_axes() {
        let q = Rot::new(FRAC_PI_2);
        let r = q.rotate(Vec2::X);
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(r.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn transform_inverse_round_trip() {
        let xf = Transform2::new(Vec2::new(1.0, 2.0), 0.4);
        let p = Vec2::new(-5.0, 0.5);
        let back = xf.apply_inv(xf.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn transform_composition_matches_sequential_application() {
        let a = Transform2::new(Vec2::new(1.0, 0.0), 0.3);
        let b = Transform2::new(Vec2::new(0.0, -2.0), -0.7);
        let p = Vec2::new(0.25, 0.5);
        let composed = a.mul(&b).apply(p);
        let sequential = a.apply(b.apply(p));
        assert_relative_eq!(composed.x, sequential.x, epsilon = 1e-5);
        assert_relative_eq!(composed.y, sequential.y, epsilon = 1e-5);
    }

    #[test]
    fn sweep_interpolates_linearly() {
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        let xf = sweep.transform(0.5);
        assert_relative_eq!(xf.p.x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(xf.q.angle(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn sweep_advance_preserves_endpoint() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(4.0, 0.0),
            a0: 0.0,
            a: 2.0,
            alpha0: 0.0,
        };
        sweep.advance(0.25);
        assert_relative_eq!(sweep.c0.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(sweep.c.x, 4.0, epsilon = 1e-6);
        assert_relative_eq!(sweep.alpha0, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn sweep_normalize_wraps_angles_together() {
        let mut sweep = Sweep {
            a0: 5.0 * PI,
            a: 5.0 * PI + 0.5,
            ..Default::default()
        };
        sweep.normalize();
        assert!(sweep.a0 >= 0.0 && sweep.a0 < 2.0 * PI);
        assert_relative_eq!(sweep.a - sweep.a0, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn solve22_recovers_solution() {
        // [2 1; 1 3] x = [5; 10] -> x = [1; 3]
        let x = solve22(2.0, 1.0, 1.0, 3.0, Vec2::new(5.0, 10.0));
        assert_relative_eq!(x.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(x.y, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn solve33_recovers_solution() {
        let a = Mat3::from_cols(
            Vec3::new(2.0, 0.0, 1.0),
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(1.0, 0.0, 2.0),
        );
        let b = Vec3::new(4.0, 6.0, 5.0);
        let x = solve33(&a, b);
        let check = a * x;
        assert_relative_eq!(check.x, b.x, epsilon = 1e-4);
        assert_relative_eq!(check.y, b.y, epsilon = 1e-4);
        assert_relative_eq!(check.z, b.z, epsilon = 1e-4);
    }

    #[test]
    fn cross_helpers_are_consistent() {
        let v = Vec2::new(2.0, 3.0);
        let s = 1.5;
        // s x v rotated back: v x s = -(s x v)
        assert_eq!(cross_vs(v, s), -cross_sv(s, v));
        assert_relative_eq!(cross(Vec2::X, Vec2::Y), 1.0);
    }
}
