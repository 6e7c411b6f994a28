use marker_core::nalgebra::Point3;
use marker_core::{CameraFromObject, CornerMatch, ImagePoint};
use marker_pinhole::{CameraIntrinsics, NormalizedKeyPoint};

/// The corners of a square marker of side `size`, in the marker frame.
///
/// The marker lies in the `z = 0` plane with its top-left corner at the origin, `+X` along the top
/// edge and `+Y` down the left edge, matching the order produced by [`order_quad`](crate::order_quad).
pub fn square_object_points(size: f64) -> [Point3<f64>; 4] {
    [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(size, 0.0, 0.0),
        Point3::new(size, size, 0.0),
        Point3::new(0.0, size, 0.0),
    ]
}

/// Four ordered marker corners observed through a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareProblem {
    pub corners: [ImagePoint; 4],
    pub intrinsics: CameraIntrinsics,
    pub marker_size: f64,
}

impl SquareProblem {
    pub fn new(corners: [ImagePoint; 4], intrinsics: CameraIntrinsics, marker_size: f64) -> Self {
        Self {
            corners,
            intrinsics,
            marker_size,
        }
    }

    pub fn object_points(&self) -> [Point3<f64>; 4] {
        square_object_points(self.marker_size)
    }

    pub fn normalized(&self) -> [NormalizedKeyPoint; 4] {
        self.corners.map(|corner| self.intrinsics.calibrate(corner))
    }

    pub fn matches(&self) -> [CornerMatch; 4] {
        let objects = self.object_points();
        [0, 1, 2, 3].map(|ix| CornerMatch::new(self.intrinsics.bearing(self.corners[ix]), objects[ix]))
    }

    /// Whether every corner lies strictly in front of the camera under `pose`.
    pub fn in_front(&self, pose: &CameraFromObject) -> bool {
        self.object_points()
            .iter()
            .all(|p| pose.transform(p).z > 0.0)
    }

    /// Root-mean-square distance in pixels between the observed corners and the marker corners
    /// projected through `pose`. `None` if any corner falls behind the camera.
    pub fn reprojection_rmse(&self, pose: &CameraFromObject) -> Option<f64> {
        let mut sum = 0.0;
        for (object, observed) in self.object_points().iter().zip(&self.corners) {
            let projected = self.intrinsics.project(&pose.transform(object))?;
            sum += (projected.0 - observed.0).norm_squared();
        }
        Some((sum / 4.0).sqrt())
    }

    /// Converts a pixel threshold into the cosine distance used by bearing residuals.
    pub fn cosine_threshold(&self, pixels: f64) -> f64 {
        let focal = 0.5 * (self.intrinsics.focals.x + self.intrinsics.focals.y);
        1.0 - (pixels / focal).atan().cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marker_core::nalgebra::{Rotation3, Vector3};

    fn problem() -> SquareProblem {
        SquareProblem::new(
            [
                ImagePoint::new(100.0, 100.0),
                ImagePoint::new(200.0, 100.0),
                ImagePoint::new(200.0, 200.0),
                ImagePoint::new(100.0, 200.0),
            ],
            CameraIntrinsics::from_arrays([800.0, 800.0], [150.0, 150.0]),
            0.075184,
        )
    }

    #[test]
    fn exact_pose_has_no_reprojection_error() {
        let problem = problem();
        let depth = 800.0 * problem.marker_size / 100.0;
        let pose = CameraFromObject::from_parts(
            Vector3::new(-problem.marker_size / 2.0, -problem.marker_size / 2.0, depth),
            Rotation3::identity(),
        );
        assert!(problem.in_front(&pose));
        assert_relative_eq!(problem.reprojection_rmse(&pose).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn pose_behind_camera_cannot_be_measured() {
        let problem = problem();
        let pose = CameraFromObject::from_parts(Vector3::new(0.0, 0.0, -0.6), Rotation3::identity());
        assert!(!problem.in_front(&pose));
        assert!(problem.reprojection_rmse(&pose).is_none());
    }

    #[test]
    fn matches_pair_corners_in_order() {
        let matches = problem().matches();
        assert_eq!(matches[2].object, Point3::new(0.075184, 0.075184, 0.0));
        assert!(matches[0].bearing.x < 0.0 && matches[0].bearing.y < 0.0);
    }

    #[test]
    fn one_pixel_threshold() {
        let threshold = problem().cosine_threshold(1.0);
        assert_relative_eq!(threshold, 1.0 - (1.0f64 / 800.0).atan().cos(), epsilon = 1e-15);
        assert!(threshold > 0.0 && threshold < 1e-5);
    }
}
