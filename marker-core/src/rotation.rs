use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Converts a rotation matrix into a unit quaternion.
///
/// The branch is selected on the trace and then on the largest diagonal entry so that the square
/// root taken is always of a quantity bounded away from zero. This keeps the conversion stable for
/// rotations near 180 degrees about any axis, where the trace approaches `-1`.
///
/// The input is expected to be orthonormal with determinant `+1`. The output is normalized.
pub fn quaternion_from_rotation_matrix(m: &Matrix3<f64>) -> UnitQuaternion<f64> {
    let (r00, r01, r02) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (r10, r11, r12) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let (r20, r21, r22) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);
    let trace = r00 + r11 + r22;

    // Quaternion::new takes (w, x, y, z).
    let q = if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        Quaternion::new(
            0.25 * s,
            (r21 - r12) / s,
            (r02 - r20) / s,
            (r10 - r01) / s,
        )
    } else if r00 > r11 && r00 > r22 {
        let s = (1.0 + r00 - r11 - r22).sqrt() * 2.0;
        Quaternion::new(
            (r21 - r12) / s,
            0.25 * s,
            (r01 + r10) / s,
            (r02 + r20) / s,
        )
    } else if r11 > r22 {
        let s = (1.0 + r11 - r00 - r22).sqrt() * 2.0;
        Quaternion::new(
            (r02 - r20) / s,
            (r01 + r10) / s,
            0.25 * s,
            (r12 + r21) / s,
        )
    } else {
        let s = (1.0 + r22 - r00 - r11).sqrt() * 2.0;
        Quaternion::new(
            (r10 - r01) / s,
            (r02 + r20) / s,
            (r12 + r21) / s,
            0.25 * s,
        )
    };
    UnitQuaternion::from_quaternion(q)
}

pub fn rotation_matrix_from_quaternion(q: &UnitQuaternion<f64>) -> Matrix3<f64> {
    q.to_rotation_matrix().into_inner()
}

/// The shortest-arc angle in radians between two orientations, `2 acos(|q1 . q2|)`.
///
/// The absolute value makes `q` and `-q` (which encode the same rotation) zero distance apart.
pub fn quaternion_angle(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) -> f64 {
    let dot = a.coords.dot(&b.coords).abs().min(1.0);
    2.0 * dot.acos()
}

/// Checks that a matrix is a proper rotation: orthonormal with determinant `+1`.
pub fn is_rotation(m: &Matrix3<f64>, epsilon: f64) -> bool {
    let orthonormal = (m.transpose() * m - Matrix3::identity())
        .iter()
        .all(|n| n.abs() <= epsilon);
    orthonormal && (m.determinant() - 1.0).abs() <= epsilon
}

/// The world up direction in the AR engine convention.
pub fn world_up() -> Vector3<f64> {
    Vector3::y()
}
