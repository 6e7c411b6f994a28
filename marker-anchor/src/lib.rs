//! # Marker Anchor
//!
//! Turns a noisy stream of per-frame marker poses into a single stable world anchor.
//!
//! Each camera frame goes through the [`FramePipeline`]:
//!
//! 1. The [`DecodeGate`] drops the frame unless no decode is running and the minimum interval has
//!    passed since the last one.
//! 2. A [`MarkerDecoder`] finds the marker corners and payload.
//! 3. [`marker_pose::PoseEstimator`] turns the corners into a world pose, which is shifted by the
//!    lateral correction using [`offset_pose_using_axes`].
//! 4. The [`Stabilizer`] buffers the pose and emits a [`StablePose`] once a full window agrees,
//!    or after a timeout.
//! 5. If the [`ScanSession`] has not moved on in the meantime, the [`AnchorSink`] places content.

mod buffer;
mod frame;
mod gate;
mod offset;
mod pipeline;
mod session;
mod settings;
mod stabilizer;

pub use buffer::*;
pub use frame::*;
pub use gate::*;
pub use offset::*;
pub use pipeline::*;
pub use session::*;
pub use settings::*;
pub use stabilizer::*;
