use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A rigid transform: a translation and an orientation.
///
/// A `Pose` is either camera-space (relative to the current camera) or world-space (absolute,
/// after composing with the camera pose). The type does not distinguish the two; the stage that
/// produces a pose documents which one it is.
///
/// Poses are values. Every operation returns a new pose, none mutates in place.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Builds a pose from a translation and quaternion coordinates in `(x, y, z, w)` order.
    ///
    /// The quaternion is normalized.
    pub fn from_xyzw(translation: [f64; 3], [x, y, z, w]: [f64; 4]) -> Self {
        Self::new(
            Vector3::from(translation),
            UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z)),
        )
    }

    /// The quaternion coordinates in `(x, y, z, w)` order.
    pub fn quaternion_xyzw(&self) -> [f64; 4] {
        let q = self.rotation.quaternion();
        [q.i, q.j, q.k, q.w]
    }

    /// Applies `other` in the local frame of `self`, i.e. returns `self * other`.
    ///
    /// If `self` is the camera pose in the world and `other` is a pose relative to the camera,
    /// the result is `other` expressed in the world.
    #[must_use]
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose::new(
            self.rotation * other.translation + self.translation,
            self.rotation * other.rotation,
        )
    }

    /// Maps a point from the local frame of this pose into the parent frame.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }

    /// Rotates a direction from the local frame into the parent frame, ignoring translation.
    pub fn rotate_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    #[must_use]
    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.inverse();
        Pose::new(-(rotation * self.translation), rotation)
    }

    /// Keeps the orientation and replaces the translation.
    #[must_use]
    pub fn with_translation(&self, translation: Vector3<f64>) -> Pose {
        Pose::new(translation, self.rotation)
    }

    /// Keeps the translation and replaces the orientation.
    #[must_use]
    pub fn with_rotation(&self, rotation: UnitQuaternion<f64>) -> Pose {
        Pose::new(self.translation, rotation)
    }

    /// Moves the pose by `delta` expressed along its own axes.
    #[must_use]
    pub fn translate_local(&self, delta: &Vector3<f64>) -> Pose {
        self.with_translation(self.translation + self.rotate_vector(delta))
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.iter().all(|n| n.is_finite())
            && self.rotation.coords.iter().all(|n| n.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(isometry: Isometry3<f64>) -> Self {
        Self::new(isometry.translation.vector, isometry.rotation)
    }
}

impl From<Pose> for Isometry3<f64> {
    fn from(pose: Pose) -> Self {
        pose.isometry()
    }
}
