use crate::square::validate;
use crate::{refine_pose, SolveStrategy, SolverSettings, SquareProblem, StrategyError};
use arrsac::Arrsac;
use log::trace;
use marker_core::sample_consensus::Consensus;
use marker_core::CameraFromObject;
use marker_p3p::LambdaTwist;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// Robust fallback that treats the corners as generic point correspondences.
///
/// Minimal three-corner samples are solved with [`LambdaTwist`] and ARRSAC picks the candidate
/// the remaining corner agrees with. When every corner is an inlier the result is polished with
/// Levenberg-Marquardt over all four. The random generator is reseeded on every solve so the
/// result only depends on the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusSolver {
    pub threshold: f64,
    pub seed: u64,
    pub max_reprojection_error: f64,
    pub refine: bool,
    pub refine_patience: usize,
    pub p3p: LambdaTwist,
}

impl ConsensusSolver {
    pub fn new() -> Self {
        Self::from(&SolverSettings::default())
    }
}

impl Default for ConsensusSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&SolverSettings> for ConsensusSolver {
    fn from(settings: &SolverSettings) -> Self {
        Self {
            threshold: settings.consensus_threshold,
            seed: settings.consensus_seed,
            max_reprojection_error: settings.max_reprojection_error,
            refine: settings.refine,
            refine_patience: settings.refine_patience,
            p3p: LambdaTwist::new(),
        }
    }
}

impl SolveStrategy for ConsensusSolver {
    fn name(&self) -> &'static str {
        "consensus-p3p"
    }

    fn solve(&self, problem: &SquareProblem) -> Result<CameraFromObject, StrategyError> {
        let matches = problem.matches();
        let mut arrsac = Arrsac::new(
            problem.cosine_threshold(self.threshold),
            Pcg64::seed_from_u64(self.seed),
        );
        let (pose, inliers) = arrsac
            .model_inliers(&self.p3p, matches.iter().copied())
            .ok_or(StrategyError::NoConsensus)?;
        let inliers = inliers.into_iter().count();
        trace!("consensus found {} inlier corners", inliers);

        let pose = if self.refine && inliers == matches.len() {
            refine_pose(problem, pose, self.refine_patience)
        } else {
            pose
        };
        validate(problem, pose, self.max_reprojection_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marker_core::nalgebra::{Rotation3, Vector2, Vector3};
    use marker_core::ImagePoint;
    use marker_pinhole::CameraIntrinsics;

    const SIZE: f64 = 0.075184;

    fn observe(truth: &CameraFromObject) -> SquareProblem {
        let intrinsics = CameraIntrinsics::from_arrays([1000.0, 1000.0], [640.0, 480.0]);
        let corners = crate::square_object_points(SIZE)
            .map(|p| intrinsics.project(&truth.transform(&p)).unwrap());
        SquareProblem::new(corners, intrinsics, SIZE)
    }

    #[test]
    fn recovers_oblique_marker() {
        let truth = CameraFromObject::from_parts(
            Vector3::new(-0.05, 0.02, 0.4),
            Rotation3::from_euler_angles(-0.6, 0.25, 0.4),
        );
        let pose = ConsensusSolver::new().solve(&observe(&truth)).unwrap();
        assert_relative_eq!(pose.translation(), truth.translation(), epsilon = 1e-6);
        assert_relative_eq!(*pose.rotation(), *truth.rotation(), epsilon = 1e-6);
    }

    #[test]
    fn same_seed_same_result() {
        let truth = CameraFromObject::from_parts(
            Vector3::new(0.02, 0.02, 0.9),
            Rotation3::from_euler_angles(0.2, 0.1, -0.3),
        );
        let mut problem = observe(&truth);
        problem.corners[2] = ImagePoint(problem.corners[2].0 + Vector2::new(1.5, -0.5));
        let solver = ConsensusSolver::new();
        assert_eq!(solver.solve(&problem), solver.solve(&problem));
    }

    #[test]
    fn noisy_corner_fails_strict_tolerance() {
        let truth = CameraFromObject::from_parts(
            Vector3::new(0.02, -0.01, 0.6),
            Rotation3::from_euler_angles(0.1, -0.2, 0.05),
        );
        let mut problem = observe(&truth);
        problem.corners[1] = ImagePoint(problem.corners[1].0 + Vector2::new(3.0, 2.0));
        let solver = ConsensusSolver {
            max_reprojection_error: 1e-3,
            ..ConsensusSolver::new()
        };
        assert!(solver.solve(&problem).is_err());
    }
}
