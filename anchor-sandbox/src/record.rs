use marker_anchor::{Anchor, Detection, Frame, Stability};
use marker_core::{ImageBounds, Pose};
use marker_pinhole::CameraIntrinsics;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One line of a recording: what the AR session and the decoder reported for a camera frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Milliseconds since the start of the recording.
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub focal_length: [f64; 2],
    pub principal_point: [f64; 2],
    pub camera_translation: [f64; 3],
    /// `(x, y, z, w)`
    pub camera_rotation: [f64; 4],
    /// `None` when the decoder found nothing in this frame.
    #[serde(default)]
    pub detection: Option<Detection>,
}

impl RecordedFrame {
    pub fn into_frame(self, start: Instant) -> Frame<Option<Detection>> {
        Frame {
            image: self.detection,
            bounds: ImageBounds::new(self.width, self.height),
            intrinsics: CameraIntrinsics::from_arrays(self.focal_length, self.principal_point),
            camera_pose: Pose::from_xyzw(self.camera_translation, self.camera_rotation),
            timestamp: start + Duration::from_millis(self.timestamp_ms),
        }
    }
}

/// What the sandbox prints for each placed anchor.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorRecord<'a> {
    pub payload: &'a str,
    pub translation: [f64; 3],
    /// `(x, y, z, w)`
    pub rotation: [f64; 4],
    pub converged: bool,
    pub samples: usize,
    pub session: u64,
}

impl<'a> From<&'a Anchor> for AnchorRecord<'a> {
    fn from(anchor: &'a Anchor) -> Self {
        let t = anchor.pose.translation;
        Self {
            payload: &anchor.payload,
            translation: [t.x, t.y, t.z],
            rotation: anchor.pose.quaternion_xyzw(),
            converged: anchor.stability == Stability::Converged,
            samples: anchor.samples,
            session: anchor.generation.0,
        }
    }
}
