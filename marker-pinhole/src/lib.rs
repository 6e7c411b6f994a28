//! This crate provides the pinhole camera model used to estimate the pose of a QR marker.
//! It converts pixel coordinates into normalized image coordinates and bearings (3d direction
//! vectors pointing towards where the light came from), and projects camera-space points back
//! into pixels.
//!
//! Lens distortion is not modelled. The AR session supplies intrinsics for an already rectified
//! image, so the distortion coefficients are fixed at zero.

use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use marker_core::nalgebra::{Matrix3, Point2, Point3, UnitVector3, Vector2, Vector3};
use marker_core::ImagePoint;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates. This keypoint has been normalized
/// based on the camera intrinsic matrix, so it lies on the virtual image plane
/// at depth `1.0` in front of the optical center.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedKeyPoint(pub Point2<f64>);

impl NormalizedKeyPoint {
    /// Get the virtual image point as a [`Point3`].
    pub fn virtual_image_point(self) -> Point3<f64> {
        self.coords.push(1.0).into()
    }

    /// The normalized direction from the optical center through this point.
    pub fn bearing(self) -> UnitVector3<f64> {
        UnitVector3::new_normalize(self.coords.push(1.0))
    }

    /// Projects a camera-space point (computer-vision convention) onto the virtual image plane.
    ///
    /// Returns `None` for points on or behind the optical center.
    pub fn from_camera_point(point: &Point3<f64>) -> Option<Self> {
        if point.z > 0.0 {
            Some(Self(Point2::new(point.x / point.z, point.y / point.z)))
        } else {
            None
        }
    }
}

/// This contains intrinsic camera parameters as per
/// [this Wikipedia page](https://en.wikipedia.org/wiki/Camera_resectioning#Intrinsic_parameters).
///
/// The AR session hands these over once per frame as two 2-vectors. Equality is by value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
}

impl CameraIntrinsics {
    pub fn new(focals: Vector2<f64>, principal_point: Point2<f64>) -> Self {
        Self {
            focals,
            principal_point,
        }
    }

    /// Builds intrinsics from the `[fx, fy]` and `[cx, cy]` arrays the AR session exposes.
    pub fn from_arrays([fx, fy]: [f64; 2], [cx, cy]: [f64; 2]) -> Self {
        Self::new(Vector2::new(fx, fy), Point2::new(cx, cy))
    }

    /// Creates camera intrinsics that would create an identity intrinsic matrix.
    pub fn identity() -> Self {
        Self::new(Vector2::new(1.0, 1.0), Point2::origin())
    }

    pub fn focal(self, focal: f64) -> Self {
        Self {
            focals: Vector2::new(focal, focal),
            ..self
        }
    }

    pub fn principal_point(self, principal_point: Point2<f64>) -> Self {
        Self {
            principal_point,
            ..self
        }
    }

    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focals.x,  0.0,            self.principal_point.x,
            0.0,            self.focals.y,  self.principal_point.y,
            0.0,            0.0,            1.0,
        )
    }

    /// Whether both focal lengths are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.focals.iter().all(|f| f.is_finite() && *f > 0.0)
            && self.principal_point.iter().all(|c| c.is_finite())
    }

    /// Takes in a point from an image in pixel coordinates and
    /// converts it to a [`NormalizedKeyPoint`].
    ///
    /// ```
    /// use marker_core::ImagePoint;
    /// use marker_pinhole::CameraIntrinsics;
    /// let intrinsics = CameraIntrinsics::from_arrays([800.0, 900.0], [500.0, 600.0]);
    /// let kp = ImagePoint::new(471.0, 322.0);
    /// let nkp = intrinsics.calibrate(kp);
    /// let distance = (kp.to_homogeneous() - intrinsics.matrix() * nkp.to_homogeneous()).norm();
    /// assert!(distance < 1e-9);
    /// ```
    pub fn calibrate(&self, point: ImagePoint) -> NormalizedKeyPoint {
        let centered = point.0 - self.principal_point;
        NormalizedKeyPoint(Point2::new(
            centered.x / self.focals.x,
            centered.y / self.focals.y,
        ))
    }

    /// Converts a [`NormalizedKeyPoint`] back into pixel coordinates.
    pub fn uncalibrate(&self, projection: NormalizedKeyPoint) -> ImagePoint {
        let scaled = Vector2::new(
            projection.x * self.focals.x,
            projection.y * self.focals.y,
        );
        ImagePoint(self.principal_point + scaled)
    }

    /// The bearing pointing out of the optical center through the given pixel.
    pub fn bearing(&self, point: ImagePoint) -> UnitVector3<f64> {
        self.calibrate(point).bearing()
    }

    /// Projects a camera-space point (computer-vision convention) into pixel coordinates.
    pub fn project(&self, point: &Point3<f64>) -> Option<ImagePoint> {
        NormalizedKeyPoint::from_camera_point(point).map(|nkp| self.uncalibrate(nkp))
    }

    /// Projects the point at `depth` along the ray through a pixel.
    pub fn unproject(&self, point: ImagePoint, depth: f64) -> Point3<f64> {
        let nkp = self.calibrate(point);
        Point3::from(Vector3::new(nkp.x, nkp.y, 1.0) * depth)
    }
}
