//! # Marker Core
//!
//! Common value types for anchoring content at a detected square marker (a QR code). Every crate in
//! this workspace that deals with image points or poses depends on this crate, so it is kept small.
//!
//! All types here are immutable values. Operations such as [`Pose::compose`] or
//! [`Pose::translate_local`] return a new value rather than mutating in place.
//!
//! ## Conventions
//!
//! Two camera conventions meet in this workspace:
//!
//! * The computer-vision convention, used by the pose solvers: `+X` right, `+Y` down, `+Z` forwards
//!   out of the optical center.
//! * The AR engine convention, used for every pose handed to the rest of the application: `+X`
//!   right, `+Y` up, `+Z` backwards (the camera looks down `-Z`).
//!
//! Quaternions are stored as nalgebra [`UnitQuaternion`](nalgebra::UnitQuaternion)s, whose
//! coordinates are ordered `(x, y, z, w)`.
//!
//! ```
//! use marker_core::{nalgebra::{Point3, UnitQuaternion, Vector3}, Pose};
//!
//! let camera = Pose::new(Vector3::new(0.0, 1.5, 0.0), UnitQuaternion::identity());
//! let marker_in_camera = Pose::new(Vector3::new(0.0, 0.0, -0.6), UnitQuaternion::identity());
//! let marker = camera.compose(&marker_in_camera);
//! assert_eq!(marker.transform_point(&Point3::origin()), Point3::new(0.0, 1.5, -0.6));
//! ```

mod average;
mod correspondence;
mod point;
mod pose;
mod rotation;

pub use average::*;
pub use correspondence::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use rotation::*;
pub use sample_consensus;
