use marker_core::nalgebra::Vector3;
use marker_core::Pose;

/// Moves `base` by `delta` expressed in the local frame of `axes`.
///
/// The translation becomes `base.t + axes.R * delta` and the rotation of `base` is kept. Using the
/// marker's own axes means the shift follows the marker however it is oriented, even when `base`
/// has been rotated upright.
pub fn offset_pose_using_axes(axes: &Pose, base: &Pose, delta: &Vector3<f64>) -> Pose {
    base.with_translation(base.translation + axes.rotate_vector(delta))
}
