#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings for estimating a single marker pose.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolverSettings {
    /// The physical edge length of the printed marker in meters
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_marker_size"))]
    pub marker_size: f64,
    /// The largest RMS corner reprojection error (in pixels) a solution may have to be accepted
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_max_reprojection_error")
    )]
    pub max_reprojection_error: f64,
    /// Whether to polish solutions with Levenberg-Marquardt over all four corners
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_refine"))]
    pub refine: bool,
    /// The patience handed to Levenberg-Marquardt when refining
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_refine_patience"))]
    pub refine_patience: usize,
    /// The inlier threshold (in pixels) of the robust consensus solver
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_consensus_threshold")
    )]
    pub consensus_threshold: f64,
    /// The seed of the random number generator driving the consensus solver
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_consensus_seed"))]
    pub consensus_seed: u64,
}

impl SolverSettings {
    #[must_use]
    pub fn marker_size(self, marker_size: f64) -> Self {
        Self {
            marker_size,
            ..self
        }
    }

    #[must_use]
    pub fn max_reprojection_error(self, max_reprojection_error: f64) -> Self {
        Self {
            max_reprojection_error,
            ..self
        }
    }

    #[must_use]
    pub fn refine(self, refine: bool) -> Self {
        Self { refine, ..self }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            marker_size: default_marker_size(),
            max_reprojection_error: default_max_reprojection_error(),
            refine: default_refine(),
            refine_patience: default_refine_patience(),
            consensus_threshold: default_consensus_threshold(),
            consensus_seed: default_consensus_seed(),
        }
    }
}

fn default_marker_size() -> f64 {
    0.075184
}

fn default_max_reprojection_error() -> f64 {
    16.0
}

fn default_refine() -> bool {
    true
}

fn default_refine_patience() -> usize {
    100
}

fn default_consensus_threshold() -> f64 {
    4.0
}

fn default_consensus_seed() -> u64 {
    0
}
