//! Minimal absolute pose for a square marker: given three marker corners and the bearings the
//! camera observed them at, recover the marker pose relative to the camera.
//!
//! This is the three-point case of ["Perspective-n-Point" (PnP)][pnp], which is the minimal number
//! of points with a finite number of solutions (up to four). A fourth correspondence is needed to
//! pick between them, which is what the sample consensus in `marker-pose` does with this estimator.
//!
//! The solver implemented is:
//!
//!  - Lambda Twist: An Accurate Fast Robust Perspective Three Point (P3P) Solver.
//!    Mikael Persson, Klas Nordberg. ECCV 2018. ([paper][lambda-twist])
//!
//! [pnp]: https://en.wikipedia.org/wiki/Perspective-n-Point
//! [lambda-twist]: http://openaccess.thecvf.com/content_ECCV_2018/html/Mikael_Persson_Lambda_Twist_An_ECCV_2018_paper.html
#![warn(missing_docs)]

// Copyright (c) 2018 Michael Persson
// Adapted to openMVG by Romain Janvier and Pierre Moulon
// Adapted to Rust by Matthieu Pizenberg

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use arrayvec::ArrayVec;
use marker_core::{
    nalgebra::{Matrix3, Rotation3, Vector3},
    sample_consensus::Estimator,
    CameraFromObject, CornerMatch,
};

type Mat3 = Matrix3<f64>;
type Vec3 = Vector3<f64>;

/// Up to four candidate marker poses for one minimal sample.
pub type Candidates = ArrayVec<CameraFromObject, 4>;

/// The Lambda Twist P3P solver.
///
/// Solves `lambda_i * y_i = R * x_i + t` for `i in 1..=3`, where `x_i` are marker points,
/// `y_i` are unit bearings and `lambda_i` the (positive) distances along them.
///
/// This struct is marked as `#[non_exhaustive]` to allow the backwards-compatible addition of new fields.
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct LambdaTwist {
    /// Gauss-Newton iterations spent refining the depths. The paper notes that it rarely
    /// improves after two iterations.
    pub gauss_newton_iterations: usize,
    /// Iterations spent converging on a proper rotation matrix.
    pub rotation_convergence_iterations: usize,
    /// The epsilon at which the rotation is considered converged.
    pub rotation_convergence_epsilon: f64,
}

impl LambdaTwist {
    /// Creates a default lambda twist with 5 iterations of Gauss-Newton.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the [`LambdaTwist::gauss_newton_iterations`].
    #[must_use]
    pub fn gauss_newton_iterations(self, gauss_newton_iterations: usize) -> Self {
        Self {
            gauss_newton_iterations,
            ..self
        }
    }

    /// Sets the [`LambdaTwist::rotation_convergence_iterations`].
    #[must_use]
    pub fn rotation_convergence_iterations(self, rotation_convergence_iterations: usize) -> Self {
        Self {
            rotation_convergence_iterations,
            ..self
        }
    }

    /// Sets the [`LambdaTwist::rotation_convergence_epsilon`].
    #[must_use]
    pub fn rotation_convergence_epsilon(self, rotation_convergence_epsilon: f64) -> Self {
        Self {
            rotation_convergence_epsilon,
            ..self
        }
    }

    /// Computes every marker pose consistent with three corner correspondences.
    pub fn solve(&self, samples: [CornerMatch; 3]) -> Candidates {
        let points = samples.map(|m| m.object.coords);
        let bearings = samples.map(|m| m.bearing.into_inner());

        let d12 = points[0] - points[1];
        let d13 = points[0] - points[2];
        let d23 = points[1] - points[2];

        // Squared side lengths of the marker triangle.
        let a12 = d12.norm_squared();
        let a13 = d13.norm_squared();
        let a23 = d23.norm_squared();

        // Cosines between bearings.
        let c12 = bearings[0].dot(&bearings[1]);
        let c23 = bearings[1].dot(&bearings[2]);
        let c31 = bearings[2].dot(&bearings[0]);

        let cosines = Cosines::new(c12, c23, c31);
        let sides = Sides { a12, a13, a23 };

        // Sharpest real root of the cubic, equation (10) of the paper.
        let [k3, k2, k1, k0] = cubic_coefficients(&sides, &cosines);
        let gamma = cube_root(k2 / k3, k1 / k3, k0 / k3);

        let (eig_vectors, eig_values) = eigen_decomposition_singular(d0_matrix(&sides, &cosines, gamma));
        let ratio = 0.0_f64.max(-eig_values[1] / eig_values[0]).sqrt();

        let mut depths: ArrayVec<Vec3, 4> = ArrayVec::new();
        for ratio in [ratio, -ratio] {
            collect_depths(&mut depths, ratio, &eig_vectors, &sides, &cosines);
        }

        // Recover R and t such that lambda_i * y_i = R * x_i + t.
        let Some(x_inv) = triangle_frame(d12, d13).try_inverse() else {
            return Candidates::new();
        };

        depths
            .iter()
            .map(|&lambda| {
                let lambda = gauss_newton_refine_lambda(
                    lambda,
                    self.gauss_newton_iterations,
                    &sides,
                    &cosines,
                );
                let ry1 = lambda[0] * bearings[0];
                let ry2 = lambda[1] * bearings[1];
                let ry3 = lambda[2] * bearings[2];

                let rotation = triangle_frame(ry1 - ry2, ry1 - ry3) * x_inv;
                let translation = ry1 - rotation * points[0];
                (rotation, translation)
            })
            .map(|(rotation, translation)| {
                CameraFromObject::from_parts(
                    translation,
                    Rotation3::from_matrix_eps(
                        &rotation,
                        self.rotation_convergence_epsilon,
                        self.rotation_convergence_iterations,
                        Rotation3::identity(),
                    ),
                )
            })
            .filter(CameraFromObject::is_finite)
            .collect()
    }
}

impl Default for LambdaTwist {
    fn default() -> Self {
        Self {
            gauss_newton_iterations: 5,
            rotation_convergence_iterations: 100,
            rotation_convergence_epsilon: 1e-12,
        }
    }
}

impl Estimator<CornerMatch> for LambdaTwist {
    type Model = CameraFromObject;
    type ModelIter = Candidates;
    const MIN_SAMPLES: usize = 3;

    fn estimate<I>(&self, mut data: I) -> Self::ModelIter
    where
        I: Iterator<Item = CornerMatch> + Clone,
    {
        match (data.next(), data.next(), data.next()) {
            (Some(a), Some(b), Some(c)) => self.solve([a, b, c]),
            _ => Candidates::new(),
        }
    }
}

/// Squared distances between the three marker points.
struct Sides {
    a12: f64,
    a13: f64,
    a23: f64,
}

/// Bearing cosines and the derived `b` terms (`-2 cos`) of the paper.
struct Cosines {
    c12: f64,
    c23: f64,
    c31: f64,
    b12: f64,
    b13: f64,
    b23: f64,
}

impl Cosines {
    fn new(c12: f64, c23: f64, c31: f64) -> Self {
        Self {
            c12,
            c23,
            c31,
            b12: -2.0 * c12,
            b13: -2.0 * c31,
            b23: -2.0 * c23,
        }
    }
}

/// The coefficients `[k3, k2, k1, k0]` of the cubic in gamma.
fn cubic_coefficients(sides: &Sides, cosines: &Cosines) -> [f64; 4] {
    let Sides { a12, a13, a23 } = *sides;
    let Cosines { c12, c23, c31, .. } = *cosines;
    let blob = c12 * c23 * c31 - 1.0;
    let s12_sqr = 1.0 - c12 * c12;
    let s23_sqr = 1.0 - c23 * c23;
    let s31_sqr = 1.0 - c31 * c31;

    let k3 = a13 * (a23 * s31_sqr - a13 * s23_sqr);
    let k2 = 2.0 * blob * a23 * a13 + a13 * (2.0 * a12 + a13) * s23_sqr + a23 * (a23 - a12) * s31_sqr;
    let k1 = a23 * (a13 - a23) * s12_sqr - a12 * a12 * s23_sqr - 2.0 * a12 * (blob * a23 + a13 * s23_sqr);
    let k0 = a12 * (a12 * s23_sqr - a23 * s12_sqr);
    [k3, k2, k1, k0]
}

/// The singular symmetric matrix called D0 in the paper.
fn d0_matrix(sides: &Sides, cosines: &Cosines, g: f64) -> Mat3 {
    let Sides { a12, a13, a23 } = *sides;
    let Cosines { c12, c23, c31, .. } = *cosines;
    let m00 = a23 * (1.0 - g);
    let m01 = -(a23 * c12);
    let m02 = a23 * c31 * g;
    let m11 = a23 - a12 + a13 * g;
    let m12 = -c23 * (a13 * g - a12);
    let m22 = g * (a13 - a23) - a12;
    #[rustfmt::skip]
    let d0 = Mat3::new(
        m00, m01, m02,
        m01, m11, m12,
        m02, m12, m22,
    );
    d0
}

/// Pushes the (up to two) positive depth triplets for one eigenvalue ratio, equations (15)-(16).
fn collect_depths(
    depths: &mut ArrayVec<Vec3, 4>,
    ratio: f64,
    eig_vectors: &Mat3,
    sides: &Sides,
    cosines: &Cosines,
) {
    let Sides { a12, a13, a23 } = *sides;
    let Cosines { b12, b13, b23, .. } = *cosines;

    let w2 = 1.0 / (ratio * eig_vectors.m12 - eig_vectors.m11);
    let w0 = w2 * (eig_vectors.m21 - ratio * eig_vectors.m22);
    let w1 = w2 * (eig_vectors.m31 - ratio * eig_vectors.m32);

    let a = 1.0 / ((a13 - a12) * w1 * w1 - a12 * b13 * w1 - a12);
    let b = a * (a13 * b12 * w1 - a12 * b13 * w0 - 2.0 * w0 * w1 * (a12 - a13));
    let c = a * ((a13 - a12) * w0 * w0 + a13 * b12 * w0 + a13);

    let Some((tau1, tau2)) = real_quadratic_roots(b, c) else {
        return;
    };
    for tau in [tau1, tau2] {
        if tau <= 0.0 {
            continue;
        }
        let d = a23 / (tau * (b23 + tau) + 1.0);
        if d <= 0.0 {
            continue;
        }
        let l2 = d.sqrt();
        let l3 = tau * l2;
        let l1 = w0 * l2 + w1 * l3;
        if l1 >= 0.0 && !depths.is_full() {
            depths.push(Vec3::new(l1, l2, l3));
        }
    }
}

/// The matrix with columns `(u, v, u x v)`, an (unnormalized) frame spanned by a triangle.
fn triangle_frame(u: Vec3, v: Vec3) -> Mat3 {
    Mat3::from_columns(&[u, v, u.cross(&v)])
}

/// Refines the depth triplet with Gauss-Newton on the three law-of-cosines residuals.
fn gauss_newton_refine_lambda(
    lambda: Vec3,
    iterations: usize,
    sides: &Sides,
    cosines: &Cosines,
) -> Vec3 {
    let Sides { a12, a13, a23 } = *sides;
    let Cosines { b12, b13, b23, .. } = *cosines;
    let residual = |l: &Vec3| {
        Vec3::new(
            l.x * l.x + l.y * l.y + b12 * l.x * l.y - a12,
            l.x * l.x + l.z * l.z + b13 * l.x * l.z - a13,
            l.y * l.y + l.z * l.z + b23 * l.y * l.z - a23,
        )
    };

    let mut current = lambda;
    let mut res = residual(&current);
    for _ in 0..iterations {
        if l1_norm(res) < 1e-10 {
            break;
        }
        let (l1, l2, l3) = (current.x, current.y, current.z);
        let dr1dl1 = 2.0 * l1 + b12 * l2;
        let dr1dl2 = 2.0 * l2 + b12 * l1;
        let dr2dl1 = 2.0 * l1 + b13 * l3;
        let dr2dl3 = 2.0 * l3 + b13 * l1;
        let dr3dl2 = 2.0 * l2 + b23 * l3;
        let dr3dl3 = 2.0 * l3 + b23 * l2;
        let det = 1.0 / (-dr1dl1 * dr2dl3 * dr3dl2 - dr1dl2 * dr2dl1 * dr3dl3);

        // Adjugate of the sparse jacobian.
        #[rustfmt::skip]
        let adjugate = Mat3::new(
            -dr2dl3 * dr3dl2, -dr1dl2 * dr3dl3,  dr1dl2 * dr2dl3,
            -dr2dl1 * dr3dl3,  dr1dl1 * dr3dl3, -dr1dl1 * dr2dl3,
             dr2dl1 * dr3dl2, -dr1dl1 * dr3dl2, -dr1dl2 * dr2dl1,
        );
        let next = current - det * (adjugate * res);
        let next_res = residual(&next);
        if l1_norm(next_res) > l1_norm(res) {
            break;
        }
        current = next;
        res = next_res;
    }
    current
}

#[inline]
fn l1_norm(v: Vec3) -> f64 {
    v.x.abs() + v.y.abs() + v.z.abs()
}

/// The real roots of `r^2 + b*r + c = 0`, computed without cancellation.
fn real_quadratic_roots(b: f64, c: f64) -> Option<(f64, f64)> {
    let discriminant = b * b - 4.0 * c;
    if discriminant < 0.0 {
        return None;
    }
    let y = discriminant.sqrt();
    if b < 0.0 {
        Some((0.5 * (-b + y), 0.5 * (-b - y)))
    } else {
        Some((2.0 * c / (-b + y), 2.0 * c / (-b - y)))
    }
}

/// A single root of `r^3 + b*r^2 + c*r + d = 0`, the one with the largest derivative.
///
/// Newton-Raphson is started from the leftmost or rightmost root of a second-order
/// approximation around the stationary points, when there are any, and from the inflection
/// point otherwise.
#[allow(clippy::many_single_char_names)]
fn cube_root(b: f64, c: f64, d: f64) -> f64 {
    let h = |r: f64| ((r + b) * r + c) * r + d;
    let dh = |r: f64| (3.0 * r + 2.0 * b) * r + c;

    let mut r0 = if b * b >= 3.0 * c {
        let v = (b * b - 3.0 * c).sqrt();
        let t1 = (-b - v) / 3.0;
        let k1 = h(t1);
        if k1 > 0.0 {
            t1 - (-k1 / (3.0 * t1 + b)).sqrt()
        } else {
            let t2 = (-b + v) / 3.0;
            t2 + (-h(t2) / (3.0 * t2 + b)).sqrt()
        }
    } else {
        let inflection = -b / 3.0;
        if dh(inflection).abs() < 1e-4 {
            inflection + 1.0
        } else {
            inflection
        }
    };

    // At least 7 iterations, at most 50, stopping once the residual is tiny.
    for _ in 0..7 {
        r0 -= h(r0) / dh(r0);
    }
    for _ in 0..43 {
        let fx = h(r0);
        if fx.abs() <= 1e-13 {
            break;
        }
        r0 -= fx / dh(r0);
    }
    r0
}

/// Eigen decomposition of a singular symmetric matrix. Returns the eigenvectors as columns and
/// the eigenvalues, with the two non-zero ones first, sorted by decreasing magnitude.
fn eigen_decomposition_singular(x: Mat3) -> (Mat3, Vec3) {
    #[rustfmt::skip]
    let v3 = Vec3::new(
        x[1] * x[5] - x[2] * x[4],
        x[2] * x[3] - x[5] * x[0],
        x[4] * x[0] - x[1] * x[3],
    )
    .normalize();

    let x12_sqr = x.m12 * x.m12;
    let b = -x.m11 - x.m22 - x.m33;
    let c = -x12_sqr - x.m13 * x.m13 - x.m23 * x.m23 + x.m11 * (x.m22 + x.m33) + x.m22 * x.m33;
    let (mut e1, mut e2) = real_quadratic_roots(b, c).unwrap_or((0.5 * b, 0.5 * b));
    if e1.abs() < e2.abs() {
        core::mem::swap(&mut e1, &mut e2);
    }

    let mx0011 = -x.m11 * x.m22;
    let prec_0 = x.m12 * x.m23 - x.m13 * x.m22;
    let prec_1 = x.m12 * x.m13 - x.m11 * x.m23;
    let eigen_vector = |e: f64| {
        let tmp = 1.0 / (e * (x.m11 + x.m22) + mx0011 - e * e + x12_sqr);
        let a1 = -(e * x.m13 + prec_0) * tmp;
        let a2 = -(e * x.m23 + prec_1) * tmp;
        let rnorm = 1.0 / (a1 * a1 + a2 * a2 + 1.0).sqrt();
        Vec3::new(a1 * rnorm, a2 * rnorm, rnorm)
    };

    let eigenvectors = Mat3::from_columns(&[eigen_vector(e1), eigen_vector(e2), v3]);
    (eigenvectors, Vec3::new(e1, e2, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_roots() {
        let (r1, r2) = real_quadratic_roots(-3.0, 2.0).unwrap();
        assert!((r1 - 2.0).abs() < 1e-12);
        assert!((r2 - 1.0).abs() < 1e-12);
        assert!(real_quadratic_roots(0.0, 1.0).is_none());
    }

    #[test]
    fn cubic_root_is_a_root() {
        // (r - 1)(r - 2)(r + 3) = r^3 - 7r + 6
        let r = cube_root(0.0, -7.0, 6.0);
        let value = r * r * r - 7.0 * r + 6.0;
        assert!(value.abs() < 1e-9, "residual {}", value);
    }

    #[test]
    fn too_few_samples_estimates_nothing() {
        let m = CornerMatch::new(Vector3::z_axis(), marker_core::nalgebra::Point3::origin());
        let models = LambdaTwist::new().estimate([m, m].into_iter());
        assert!(models.is_empty());
    }
}
