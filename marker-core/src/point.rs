use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::Point2;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A point on an image frame in pixel coordinates, as emitted by the marker decoder.
///
/// The point is neither undistorted nor normalized. `+X` is right and `+Y` is down, with the
/// origin at the top-left of the image.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImagePoint(pub Point2<f64>);

impl ImagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point2::new(x, y))
    }

    /// `x + y`, minimal at the top-left corner of an upright quad.
    pub fn sum(&self) -> f64 {
        self.0.x + self.0.y
    }

    /// `x - y`, maximal at the top-right corner of an upright quad.
    pub fn diff(&self) -> f64 {
        self.0.x - self.0.y
    }

    pub fn is_finite(&self) -> bool {
        self.0.x.is_finite() && self.0.y.is_finite()
    }
}

impl From<[f64; 2]> for ImagePoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// The extent of the image a set of [`ImagePoint`]s was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamps a point into `[0, width] x [0, height]`.
    pub fn clamp(&self, point: ImagePoint) -> ImagePoint {
        ImagePoint::new(
            point.x.clamp(0.0, f64::from(self.width)),
            point.y.clamp(0.0, f64::from(self.height)),
        )
    }
}
