//! Conversion from the computer-vision camera convention into the AR engine's.

use marker_core::nalgebra::{Matrix3, Vector3};
use marker_core::{quaternion_from_rotation_matrix, CameraFromObject, Pose};

/// `diag(1, -1, -1)`: flips `+Y down, +Z forwards` into `+Y up, +Z backwards`.
pub fn axis_flip() -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0))
}

/// Converts a solver pose into a pose in the AR camera's frame.
///
/// The solver's `R`, `t` are first inverted into `R^T`, `-R^T t`, then both the rotation and the
/// translation are conjugated by [`axis_flip`]. The rotation stays a proper rotation.
pub fn cv_to_ar(pose: &CameraFromObject) -> Pose {
    let (rotation, translation) = cv_to_ar_parts(pose.rotation(), &pose.translation());
    Pose::new(translation, quaternion_from_rotation_matrix(&rotation))
}

/// The matrix form of [`cv_to_ar`].
pub fn cv_to_ar_parts(
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
) -> (Matrix3<f64>, Vector3<f64>) {
    let inverse_rotation = rotation.transpose();
    let inverse_translation = -(inverse_rotation * translation);
    let flip = axis_flip();
    (flip * inverse_rotation * flip, flip * inverse_translation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marker_core::is_rotation;
    use marker_core::nalgebra::Rotation3;
    use quickcheck_macros::quickcheck;

    #[test]
    fn identity_rotation_flips_depth() {
        let pose = CameraFromObject::from_parts(Vector3::new(-0.0376, -0.0376, 0.6), Rotation3::identity());
        let ar = cv_to_ar(&pose);
        assert_relative_eq!(ar.translation, Vector3::new(0.0376, -0.0376, 0.6), epsilon = 1e-12);
        assert_relative_eq!(ar.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flip_is_involution() {
        assert_eq!(axis_flip() * axis_flip(), Matrix3::identity());
    }

    #[quickcheck]
    fn rotation_stays_proper(roll: i16, pitch: i16, yaw: i16) -> bool {
        let angle = |n: i16| f64::from(n) / 1000.0;
        let rotation = Rotation3::from_euler_angles(angle(roll), angle(pitch), angle(yaw));
        let (converted, _) = cv_to_ar_parts(rotation.matrix(), &Vector3::new(0.1, 0.2, 0.5));
        is_rotation(&converted, 1e-9)
    }
}
