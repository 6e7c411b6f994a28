use marker_core::nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use marker_core::{world_up, Pose};

const PARALLEL_EPSILON: f64 = 1e-6;

/// The smallest rotation taking `forward` onto world up.
///
/// When `forward` already points up this is the identity. When it points straight down any
/// axis perpendicular to it works, so a half turn about `forward x X` (or `forward x Y` when
/// `forward` is close to `X`) is used. Returns `None` if `forward` has no direction.
pub fn upright_alignment(forward: &Vector3<f64>) -> Option<UnitQuaternion<f64>> {
    if !forward.iter().all(|n| n.is_finite()) {
        return None;
    }
    let forward = forward.try_normalize(PARALLEL_EPSILON)?;
    let up = world_up();
    let dot = forward.dot(&up);

    if dot > 1.0 - PARALLEL_EPSILON {
        return Some(UnitQuaternion::identity());
    }
    if dot < -1.0 + PARALLEL_EPSILON {
        let arbitrary = if forward.x.abs() < 0.1 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let axis = Unit::try_new(forward.cross(&arbitrary), PARALLEL_EPSILON)?;
        return Some(UnitQuaternion::from_axis_angle(&axis, std::f64::consts::PI));
    }

    let cross = forward.cross(&up);
    Some(UnitQuaternion::from_quaternion(Quaternion::new(
        1.0 + dot,
        cross.x,
        cross.y,
        cross.z,
    )))
}

/// Rotates a marker pose so that its local `+Z` points at world up, keeping its position.
///
/// A marker printed on a wall faces the camera; the upright pose instead stands content on top of
/// it. `None` when the marker's `+Z` axis cannot be normalized.
pub fn upright_pose(marker: &Pose) -> Option<Pose> {
    let forward = marker.rotate_vector(&Vector3::z());
    let alignment = upright_alignment(&forward)?;
    Some(marker.with_rotation(alignment * marker.rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn already_up_is_identity() {
        let q = upright_alignment(&Vector3::new(0.0, 2.0, 0.0)).unwrap();
        assert_eq!(q, UnitQuaternion::identity());
    }

    #[test]
    fn facing_camera_tips_back() {
        let q = upright_alignment(&Vector3::z()).unwrap();
        assert_relative_eq!(q * Vector3::z(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(q.angle(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn upside_down_is_half_turn() {
        let q = upright_alignment(&-Vector3::y()).unwrap();
        assert_relative_eq!(q * -Vector3::y(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(q.angle(), std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_forward() {
        assert!(upright_alignment(&Vector3::zeros()).is_none());
        assert!(upright_alignment(&Vector3::new(f64::NAN, 1.0, 0.0)).is_none());
    }

    #[test]
    fn upright_pose_keeps_position() {
        let marker = Pose::new(
            Vector3::new(0.3, 1.2, -0.8),
            UnitQuaternion::from_euler_angles(0.4, -0.7, 0.2),
        );
        let upright = upright_pose(&marker).unwrap();
        assert_eq!(upright.translation, marker.translation);
        assert_relative_eq!(upright.rotate_vector(&Vector3::z()), Vector3::y(), epsilon = 1e-9);
    }

    #[quickcheck]
    fn any_direction_points_up(x: i16, y: i16, z: i16) -> bool {
        let forward = Vector3::new(f64::from(x), f64::from(y), f64::from(z));
        match upright_alignment(&forward) {
            Some(q) => (q * forward.normalize() - Vector3::y()).norm() < 2e-3,
            None => forward.norm() < PARALLEL_EPSILON,
        }
    }
}
