use crate::{ConsensusSolver, DirectSquare, PoseError, SolverSettings, SquareProblem, StrategyError};
use log::debug;
use marker_core::CameraFromObject;
use std::time::{Duration, Instant};

/// One way of turning a [`SquareProblem`] into a pose.
pub trait SolveStrategy: Send + Sync {
    /// Short name used in logs and [`Solution::strategy`].
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &SquareProblem) -> Result<CameraFromObject, StrategyError>;
}

/// A pose produced by a [`SolverChain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub camera_from_object: CameraFromObject,
    pub strategy: &'static str,
    pub reprojection_rmse: f64,
    pub elapsed: Duration,
}

/// Strategies tried in order until one succeeds.
pub struct SolverChain {
    strategies: Vec<Box<dyn SolveStrategy>>,
}

impl SolverChain {
    pub fn new(strategies: Vec<Box<dyn SolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// The square solver first, then the consensus fallback.
    pub fn from_settings(settings: &SolverSettings) -> Self {
        Self::new(vec![
            Box::new(DirectSquare::from(settings)),
            Box::new(ConsensusSolver::from(settings)),
        ])
    }

    pub fn strategies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.iter().map(|s| s.name())
    }

    pub fn solve(&self, problem: &SquareProblem) -> Result<Solution, PoseError> {
        let start = Instant::now();
        for strategy in &self.strategies {
            match strategy.solve(problem) {
                Ok(camera_from_object) => {
                    let elapsed = start.elapsed();
                    let reprojection_rmse = problem
                        .reprojection_rmse(&camera_from_object)
                        .unwrap_or(f64::INFINITY);
                    debug!(
                        "solved marker pose with {} in {:.3} ms (rmse {:.3} px)",
                        strategy.name(),
                        elapsed.as_secs_f64() * 1000.0,
                        reprojection_rmse
                    );
                    return Ok(Solution {
                        camera_from_object,
                        strategy: strategy.name(),
                        reprojection_rmse,
                        elapsed,
                    });
                }
                Err(e) => debug!("{} rejected the corners: {}", strategy.name(), e),
            }
        }
        debug!(
            "all strategies failed after {:.3} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Err(PoseError::SolveFailed)
    }
}

impl Default for SolverChain {
    fn default() -> Self {
        Self::from_settings(&SolverSettings::default())
    }
}

impl std::fmt::Debug for SolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.strategies()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_core::nalgebra::{Rotation3, Vector3};
    use marker_core::ImagePoint;
    use marker_pinhole::CameraIntrinsics;

    struct Refuses;

    impl SolveStrategy for Refuses {
        fn name(&self) -> &'static str {
            "refuses"
        }

        fn solve(&self, _: &SquareProblem) -> Result<CameraFromObject, StrategyError> {
            Err(StrategyError::NoConsensus)
        }
    }

    struct Fixed(CameraFromObject);

    impl SolveStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn solve(&self, _: &SquareProblem) -> Result<CameraFromObject, StrategyError> {
            Ok(self.0)
        }
    }

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
    fn falls_through_to_next_strategy() {
        let pose = CameraFromObject::from_parts(Vector3::new(0.0, 0.0, 1.0), Rotation3::identity());
        let chain = SolverChain::new(vec![Box::new(Refuses), Box::new(Fixed(pose))]);
        let solution = chain.solve(&problem()).unwrap();
        assert_eq!(solution.strategy, "fixed");
        assert_eq!(solution.camera_from_object, pose);
    }

    #[test]
    fn exhausted_chain_fails() {
        let chain = SolverChain::new(vec![Box::new(Refuses), Box::new(Refuses)]);
        assert_eq!(chain.solve(&problem()), Err(PoseError::SolveFailed));
        assert_eq!(
            SolverChain::new(vec![]).solve(&problem()),
            Err(PoseError::SolveFailed)
        );
    }

    #[test]
    fn default_order() {
        let names: Vec<_> = SolverChain::default().strategies().collect();
        assert_eq!(names, ["direct-square", "consensus-p3p"]);
    }

    #[test]
    fn direct_square_handles_clean_input() {
        let solution = SolverChain::default().solve(&problem()).unwrap();
        assert_eq!(solution.strategy, "direct-square");
        assert!(solution.reprojection_rmse < 1e-6);
    }
}
