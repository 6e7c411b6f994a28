use thiserror::Error;

/// Why a marker pose could not be estimated.
///
/// The `Display` text of each variant is what ends up in [`PoseEstimate::reason`](crate::PoseEstimate::reason).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseError {
    #[error("insufficient points: got {actual}, need at least 3")]
    InsufficientPoints { actual: usize },
    #[error("degenerate quad: corners are not finite")]
    DegenerateQuad,
    #[error("invalid camera intrinsics")]
    InvalidIntrinsics,
    #[error("invalid marker size {0}")]
    InvalidMarkerSize(f64),
    #[error("solve failed")]
    SolveFailed,
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// Why a single solver strategy rejected a problem.
///
/// These never escape the [`SolverChain`](crate::SolverChain); they are logged and the next
/// strategy is tried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("homography is singular")]
    SingularHomography,
    #[error("rotation could not be orthonormalized")]
    NoRotation,
    #[error("marker is behind the camera")]
    BehindCamera,
    #[error("reprojection error {rmse:.3} px exceeds {max:.3} px")]
    Reprojection { rmse: f64, max: f64 },
    #[error("no consensus among corners")]
    NoConsensus,
    #[error("solution is not finite")]
    NonFinite,
}
