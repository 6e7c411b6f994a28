use marker_core::{ImageBounds, ImagePoint, Pose};
use marker_pinhole::CameraIntrinsics;
use marker_pose::complete_parallelogram;
use std::time::Instant;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// How the image handed to the decoder was rotated relative to the camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum DecodeRotation {
    #[default]
    None,
    /// Rotated 90 degrees counter-clockwise, so width and height are swapped.
    Ccw90,
}

impl DecodeRotation {
    /// The extent of the image the decoder saw, given the camera image extent.
    pub fn decoded_bounds(self, image: ImageBounds) -> ImageBounds {
        match self {
            DecodeRotation::None => image,
            DecodeRotation::Ccw90 => ImageBounds::new(image.height, image.width),
        }
    }

    /// Maps a point found in the decoded image back into camera image pixels.
    ///
    /// For [`DecodeRotation::Ccw90`]: `x = y_r` and `y = (height - 1) - x_r`, where `height` is
    /// that of the camera image.
    pub fn to_image(self, point: ImagePoint, image: ImageBounds) -> ImagePoint {
        match self {
            DecodeRotation::None => point,
            DecodeRotation::Ccw90 => {
                ImagePoint::new(point.y, f64::from(image.height) - 1.0 - point.x)
            }
        }
    }
}

/// What the marker decoder found in one frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Detection {
    /// The decoded text. It is passed through untouched to the [`AnchorSink`](crate::AnchorSink).
    pub payload: String,
    /// Three or four corner points, in the decoded image's pixel coordinates.
    pub points: Vec<ImagePoint>,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub rotation: DecodeRotation,
}

impl Detection {
    pub fn new(payload: impl Into<String>, points: Vec<ImagePoint>) -> Self {
        Self {
            payload: payload.into(),
            points,
            rotation: DecodeRotation::None,
        }
    }

    #[must_use]
    pub fn rotation(self, rotation: DecodeRotation) -> Self {
        Self { rotation, ..self }
    }

    /// The corner points in camera image pixels.
    ///
    /// A missing fourth corner is inferred in the decoded image, clamped to its bounds, before
    /// the rotation is undone. Fewer than three points are returned unchanged so that the pose
    /// estimator can report them.
    pub fn image_points(&self, image: ImageBounds) -> Vec<ImagePoint> {
        let mut points = self.points.clone();
        if let [a, b, c] = *points.as_slice() {
            let decoded = self.rotation.decoded_bounds(image);
            points.push(complete_parallelogram([a, b, c], Some(decoded)));
        }
        points
            .into_iter()
            .map(|point| self.rotation.to_image(point, image))
            .collect()
    }
}

/// Decodes markers out of camera images.
///
/// Decoding itself is outside this crate; implementations wrap whatever barcode reader the
/// application uses.
pub trait MarkerDecoder: Send + Sync + 'static {
    type Image: Send + 'static;

    fn decode(&self, image: &Self::Image) -> Option<Detection>;
}

/// Everything captured from the AR session for one camera frame.
#[derive(Debug, Clone)]
pub struct Frame<I> {
    pub image: I,
    pub bounds: ImageBounds,
    pub intrinsics: CameraIntrinsics,
    /// The camera's world pose in the AR engine convention.
    pub camera_pose: Pose,
    pub timestamp: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_points_map_back() {
        let image = ImageBounds::new(640, 480);
        let mapped = DecodeRotation::Ccw90.to_image(ImagePoint::new(10.0, 20.0), image);
        assert_eq!(mapped, ImagePoint::new(20.0, 469.0));
        assert_eq!(
            DecodeRotation::Ccw90.decoded_bounds(image),
            ImageBounds::new(480, 640)
        );
        assert_eq!(
            DecodeRotation::None.to_image(ImagePoint::new(10.0, 20.0), image),
            ImagePoint::new(10.0, 20.0)
        );
    }

    #[test]
    fn completion_happens_in_decoded_image() {
        let image = ImageBounds::new(640, 480);
        let detection = Detection::new(
            "trex",
            vec![
                ImagePoint::new(400.0, 100.0),
                ImagePoint::new(400.0, 10.0),
                ImagePoint::new(470.0, 10.0),
            ],
        )
        .rotation(DecodeRotation::Ccw90);
        let points = detection.image_points(image);
        assert_eq!(points.len(), 4);
        // The inferred corner lands above the decoded image and is clamped to its top edge.
        assert_eq!(points[3], DecodeRotation::Ccw90.to_image(ImagePoint::new(470.0, 0.0), image));
    }

    #[test]
    fn short_detections_pass_through() {
        let detection = Detection::new("x", vec![ImagePoint::new(1.0, 2.0)]);
        assert_eq!(detection.image_points(ImageBounds::new(10, 10)).len(), 1);
    }
}
