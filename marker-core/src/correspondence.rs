use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Matrix3, Point3, Rotation3, UnitVector3, Vector3};
use sample_consensus::Model;

/// A bearing observed by the camera matched to a point on the marker.
///
/// The bearing is in the computer-vision camera convention (`+Z` forwards, `+Y` down) and the
/// point is in the marker's own frame, where the marker lies in the `z = 0` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerMatch {
    pub bearing: UnitVector3<f64>,
    pub object: Point3<f64>,
}

impl CornerMatch {
    pub fn new(bearing: UnitVector3<f64>, object: Point3<f64>) -> Self {
        Self { bearing, object }
    }
}

/// The pose of the marker relative to the camera, in the computer-vision convention.
///
/// This maps points in the marker frame into camera points: `p_camera = R * p_marker + t`. It is
/// what a perspective-n-point solver produces.
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
pub struct CameraFromObject(pub IsometryMatrix3<f64>);

impl CameraFromObject {
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        self.0.rotation.matrix()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    pub fn transform(&self, point: &Point3<f64>) -> Point3<f64> {
        self.0 * point
    }

    pub fn is_finite(&self) -> bool {
        self.rotation().iter().all(|n| n.is_finite())
            && self.translation().iter().all(|n| n.is_finite())
    }
}

impl Model<CornerMatch> for CameraFromObject {
    /// Cosine distance between the observed bearing and the bearing of the transformed point.
    fn residual(&self, data: &CornerMatch) -> f64 {
        let camera_point = self.transform(&data.object);
        match camera_point.coords.try_normalize(f64::EPSILON) {
            Some(observation) => 1.0 - data.bearing.dot(&observation),
            None => 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn exact_match_has_zero_residual() {
        let pose = CameraFromObject::from_parts(
            Vector3::new(0.1, -0.2, 1.5),
            Rotation3::from_euler_angles(0.1, 0.2, 0.3),
        );
        let object = Point3::new(0.05, 0.05, 0.0);
        let bearing = UnitVector3::new_normalize(pose.transform(&object).coords);
        let residual = pose.residual(&CornerMatch::new(bearing, object));
        assert_relative_eq!(residual, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn opposite_bearing_is_maximal() {
        let pose = CameraFromObject::from_parts(Vector3::new(0.0, 0.0, 1.0), Rotation3::identity());
        let bearing = UnitVector3::new_unchecked(-Vector3::z());
        let residual = pose.residual(&CornerMatch::new(bearing, Point3::origin()));
        assert_relative_eq!(residual, 2.0, epsilon = 1e-12);
    }
}
