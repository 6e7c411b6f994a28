use crate::Pose;
use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};

/// Euclidean distance between the translations of two poses.
pub fn position_distance(a: &Pose, b: &Pose) -> f64 {
    (a.translation - b.translation).norm()
}

/// Averages a set of poses.
///
/// Positions are averaged arithmetically. Orientations are averaged component-wise after
/// hemisphere alignment: each quaternion whose dot product with the first one is negative is
/// negated before summing, so that `q` and `-q` reinforce instead of cancelling. The sum is then
/// normalized.
///
/// Returns `None` for an empty set.
pub fn average_poses<'a, I>(poses: I) -> Option<Pose>
where
    I: IntoIterator<Item = &'a Pose>,
{
    let mut poses = poses.into_iter();
    let first = poses.next()?;
    let reference = first.rotation.coords;

    let mut count = 1.0;
    let mut position = first.translation;
    let mut orientation = reference;
    for pose in poses {
        count += 1.0;
        position += pose.translation;
        orientation += aligned(reference, pose.rotation.coords);
    }

    let position: Vector3<f64> = position / count;
    let orientation = Quaternion::from(orientation / count);
    let rotation = UnitQuaternion::try_new(orientation, f64::EPSILON)
        .unwrap_or_else(UnitQuaternion::identity);
    Some(Pose::new(position, rotation))
}

fn aligned(reference: Vector4<f64>, coords: Vector4<f64>) -> Vector4<f64> {
    if reference.dot(&coords) < 0.0 {
        -coords
    } else {
        coords
    }
}
