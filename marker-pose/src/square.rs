use crate::{refine_pose, SolveStrategy, SolverSettings, SquareProblem, StrategyError};
use marker_core::nalgebra::{Matrix3, Rotation3, SMatrix, SVector, Vector3};
use marker_core::CameraFromObject;

/// Solves the pose of a planar square directly from the homography between the marker plane and
/// the normalized image plane.
///
/// The four corners determine the homography exactly. Its first two columns are the scaled marker
/// axes and the third is the scaled translation. The rotation is projected back onto `SO(3)` with
/// an SVD before an optional Levenberg-Marquardt polish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectSquare {
    pub max_reprojection_error: f64,
    pub refine: bool,
    pub refine_patience: usize,
}

impl DirectSquare {
    pub fn new() -> Self {
        Self::from(&SolverSettings::default())
    }

    pub fn homography(problem: &SquareProblem) -> Option<Matrix3<f64>> {
        let unit = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (ix, ([u, v], image)) in unit.iter().zip(problem.normalized()).enumerate() {
            let (x, y) = (image.x, image.y);
            let row = 2 * ix;
            a.row_mut(row)
                .copy_from_slice(&[*u, *v, 1.0, 0.0, 0.0, 0.0, -u * x, -v * x]);
            a.row_mut(row + 1)
                .copy_from_slice(&[0.0, 0.0, 0.0, *u, *v, 1.0, -u * y, -v * y]);
            b[row] = x;
            b[row + 1] = y;
        }
        let h = a.lu().solve(&b)?;
        let homography = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        homography.iter().all(|n| n.is_finite()).then(|| homography)
    }

    /// Splits a unit-square homography into a camera-from-object pose for a marker of side `size`.
    pub fn decompose(homography: &Matrix3<f64>, size: f64) -> Result<CameraFromObject, StrategyError> {
        let h1 = homography.column(0).into_owned();
        let h2 = homography.column(1).into_owned();
        let h3 = homography.column(2).into_owned();

        let norm = (h1.norm() * h2.norm()).sqrt();
        if !(norm > f64::EPSILON) {
            return Err(StrategyError::SingularHomography);
        }
        let mut r1 = h1 / norm;
        let mut r2 = h2 / norm;
        let mut t = h3 * (size / norm);
        if t.z < 0.0 {
            r1 = -r1;
            r2 = -r2;
            t = -t;
        }

        let rotation = orthonormalize(&Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]))
            .ok_or(StrategyError::NoRotation)?;
        Ok(CameraFromObject::from_parts(t, rotation))
    }
}

impl Default for DirectSquare {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&SolverSettings> for DirectSquare {
    fn from(settings: &SolverSettings) -> Self {
        Self {
            max_reprojection_error: settings.max_reprojection_error,
            refine: settings.refine,
            refine_patience: settings.refine_patience,
        }
    }
}

impl SolveStrategy for DirectSquare {
    fn name(&self) -> &'static str {
        "direct-square"
    }

    fn solve(&self, problem: &SquareProblem) -> Result<CameraFromObject, StrategyError> {
        let homography = Self::homography(problem).ok_or(StrategyError::SingularHomography)?;
        let mut pose = Self::decompose(&homography, problem.marker_size)?;
        if self.refine {
            pose = refine_pose(problem, pose, self.refine_patience);
        }
        validate(problem, pose, self.max_reprojection_error)
    }
}

/// The nearest rotation to `m` in the Frobenius norm.
pub(crate) fn orthonormalize(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        rotation = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0)) * v_t;
    }
    rotation
        .iter()
        .all(|n| n.is_finite())
        .then(|| Rotation3::from_matrix_unchecked(rotation))
}

/// Final checks every strategy applies before handing a pose back.
pub(crate) fn validate(
    problem: &SquareProblem,
    pose: CameraFromObject,
    max_reprojection_error: f64,
) -> Result<CameraFromObject, StrategyError> {
    if !pose.is_finite() {
        return Err(StrategyError::NonFinite);
    }
    if pose.translation().z <= 0.0 || !problem.in_front(&pose) {
        return Err(StrategyError::BehindCamera);
    }
    let rmse = problem
        .reprojection_rmse(&pose)
        .ok_or(StrategyError::BehindCamera)?;
    if !(rmse <= max_reprojection_error) {
        return Err(StrategyError::Reprojection {
            rmse,
            max: max_reprojection_error,
        });
    }
    Ok(pose)
}
