//! # Marker Pose
//!
//! Estimates the six degree of freedom pose of a square marker (a QR code) from the pixel
//! positions of its corners in a single camera frame.
//!
//! The pipeline for one frame is:
//!
//! 1. [`prepare_corners`] completes three decoder corners into four and orders them
//!    top-left, top-right, bottom-right, bottom-left.
//! 2. A [`SolverChain`] tries [`DirectSquare`] and falls back to the robust [`ConsensusSolver`].
//! 3. [`cv_to_ar`] moves the solution from the computer-vision camera convention into the AR
//!    engine's.
//! 4. [`upright_pose`] derives a variant of the marker pose standing on world up.
//!
//! [`PoseEstimator`] runs all of these.

mod chain;
mod consensus;
mod convert;
mod error;
mod estimate;
mod problem;
mod quad;
mod refine;
mod settings;
mod square;
mod upright;

pub use chain::*;
pub use consensus::*;
pub use convert::*;
pub use error::*;
pub use estimate::*;
pub use problem::*;
pub use quad::*;
pub use refine::refine_pose;
pub use settings::*;
pub use square::DirectSquare;
pub use upright::*;
