use crate::SquareProblem;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::trace;
use marker_core::nalgebra::{
    storage::Owned, Matrix2x3, Matrix3, Point3, Rotation3, SMatrix, SVector, Vector3, Vector6, U6,
    U8,
};
use marker_core::{CameraFromObject, ImagePoint};
use marker_pinhole::CameraIntrinsics;

/// Pixel reprojection of the four marker corners as a least-squares problem over a pose.
///
/// The parameters are `[t, w]`, where `t` is the translation and `w` is a rotation vector applied
/// on the left of the starting rotation. Starting at `w = 0` keeps the linearization accurate.
#[derive(Clone)]
struct CornerReprojection {
    base: Rotation3<f64>,
    params: Vector6<f64>,
    objects: [Point3<f64>; 4],
    corners: [ImagePoint; 4],
    intrinsics: CameraIntrinsics,
}

impl CornerReprojection {
    fn new(problem: &SquareProblem, pose: &CameraFromObject) -> Self {
        let translation = pose.translation();
        Self {
            base: pose.0.rotation,
            params: Vector6::new(translation.x, translation.y, translation.z, 0.0, 0.0, 0.0),
            objects: problem.object_points(),
            corners: problem.corners,
            intrinsics: problem.intrinsics,
        }
    }

    fn pose(&self) -> CameraFromObject {
        let translation = self.params.fixed_rows::<3>(0).into_owned();
        let rotation = Rotation3::new(self.params.fixed_rows::<3>(3).into_owned()) * self.base;
        CameraFromObject::from_parts(translation, rotation)
    }

    /// Camera-space corners, or `None` when one is too close to the camera plane to project.
    fn camera_points(&self) -> Option<[Point3<f64>; 4]> {
        let pose = self.pose();
        let points = self.objects.map(|p| pose.transform(&p));
        points.iter().all(|p| p.z > f64::EPSILON).then(|| points)
    }
}

impl LeastSquaresProblem<f64, U8, U6> for CornerReprojection {
    type ResidualStorage = Owned<f64, U8>;
    type JacobianStorage = Owned<f64, U8, U6>;
    type ParameterStorage = Owned<f64, U6>;

    fn set_params(&mut self, x: &Vector6<f64>) {
        self.params = *x;
    }

    fn params(&self) -> Vector6<f64> {
        self.params
    }

    fn residuals(&self) -> Option<SVector<f64, 8>> {
        let points = self.camera_points()?;
        let mut residuals = SVector::<f64, 8>::zeros();
        for (ix, (point, corner)) in points.iter().zip(&self.corners).enumerate() {
            let projected = self.intrinsics.project(point)?;
            residuals
                .fixed_rows_mut::<2>(2 * ix)
                .copy_from(&(projected.0 - corner.0));
        }
        Some(residuals)
    }

    fn jacobian(&self) -> Option<SMatrix<f64, 8, 6>> {
        let points = self.camera_points()?;
        let translation = self.params.fixed_rows::<3>(0).into_owned();
        let mut jacobian = SMatrix::<f64, 8, 6>::zeros();
        for (ix, point) in points.iter().enumerate() {
            let p = point.coords;
            let (fx, fy) = (self.intrinsics.focals.x, self.intrinsics.focals.y);
            let z2 = p.z * p.z;
            #[rustfmt::skip]
            let projection = Matrix2x3::new(
                fx / p.z, 0.0,      -fx * p.x / z2,
                0.0,      fy / p.z, -fy * p.y / z2,
            );
            // A left rotation perturbation moves the rotated point, not the translation.
            let rotated: Vector3<f64> = p - translation;
            let rotation = -Matrix3::new(
                0.0, -rotated.z, rotated.y, rotated.z, 0.0, -rotated.x, -rotated.y, rotated.x, 0.0,
            );
            jacobian
                .fixed_view_mut::<2, 3>(2 * ix, 0)
                .copy_from(&projection);
            jacobian
                .fixed_view_mut::<2, 3>(2 * ix, 3)
                .copy_from(&(projection * rotation));
        }
        Some(jacobian)
    }
}

/// Polishes a pose by minimizing the pixel reprojection error of all four corners.
///
/// Returns whichever of the starting pose and the polished pose reprojects better, so refining
/// never makes a solution worse.
pub fn refine_pose(problem: &SquareProblem, pose: CameraFromObject, patience: usize) -> CameraFromObject {
    let start = CornerReprojection::new(problem, &pose);
    let (refined, report) = LevenbergMarquardt::new()
        .with_patience(patience)
        .minimize(start);
    let refined = refined.pose();
    trace!(
        "refinement finished after {} evaluations: {:?}",
        report.number_of_evaluations,
        report.termination
    );

    let before = problem.reprojection_rmse(&pose);
    let after = problem.reprojection_rmse(&refined);
    match (before, after) {
        (Some(before), Some(after)) if after.is_finite() && after <= before => refined,
        (None, Some(after)) if after.is_finite() => refined,
        _ => pose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Central differences with a step small enough to keep every corner in front of the camera.
    fn central_difference(problem: &mut CornerReprojection, step: f64) -> SMatrix<f64, 8, 6> {
        let params = problem.params();
        let mut jacobian = SMatrix::<f64, 8, 6>::zeros();
        for column in 0..6 {
            let mut forward = params;
            forward[column] += step;
            problem.set_params(&forward);
            let ahead = problem.residuals().unwrap();
            let mut backward = params;
            backward[column] -= step;
            problem.set_params(&backward);
            let behind = problem.residuals().unwrap();
            jacobian.set_column(column, &((ahead - behind) / (2.0 * step)));
        }
        problem.set_params(&params);
        jacobian
    }

    fn scene() -> (SquareProblem, CameraFromObject) {
        let intrinsics = CameraIntrinsics::from_arrays([800.0, 800.0], [320.0, 240.0]);
        let truth = CameraFromObject::from_parts(
            Vector3::new(-0.02, 0.01, 0.5),
            Rotation3::from_euler_angles(0.3, -0.2, 0.1),
        );
        let size = 0.075184;
        let corners = crate::square_object_points(size)
            .map(|p| intrinsics.project(&truth.transform(&p)).unwrap());
        (SquareProblem::new(corners, intrinsics, size), truth)
    }

    #[test]
    fn jacobian_matches_numeric() {
        let (problem, truth) = scene();
        let perturbed = CameraFromObject::from_parts(
            truth.translation() + Vector3::new(0.003, -0.002, 0.01),
            Rotation3::from_euler_angles(0.01, 0.02, -0.01) * truth.0.rotation,
        );
        let mut reprojection = CornerReprojection::new(&problem, &perturbed);
        let numeric = central_difference(&mut reprojection, 1e-6);
        let analytic = reprojection.jacobian().unwrap();
        assert_relative_eq!(numeric, analytic, epsilon = 1e-3 * analytic.norm());
    }

    #[test]
    fn recovers_perturbed_pose() {
        let (problem, truth) = scene();
        let perturbed = CameraFromObject::from_parts(
            truth.translation() + Vector3::new(0.005, 0.004, -0.02),
            Rotation3::from_euler_angles(0.03, -0.02, 0.02) * truth.0.rotation,
        );
        let refined = refine_pose(&problem, perturbed, 100);
        assert!(problem.reprojection_rmse(&refined).unwrap() < 1e-6);
        assert_relative_eq!(refined.translation(), truth.translation(), epsilon = 1e-6);
        assert_relative_eq!(*refined.rotation(), *truth.rotation(), epsilon = 1e-6);
    }

    #[test]
    fn exact_pose_is_kept() {
        let (problem, truth) = scene();
        let refined = refine_pose(&problem, truth, 100);
        assert_relative_eq!(refined.translation(), truth.translation(), epsilon = 1e-9);
    }
}
