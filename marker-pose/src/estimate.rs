use crate::{cv_to_ar, prepare_corners, upright_pose, PoseError, SolverChain, SolverSettings, SquareProblem};
use log::{debug, warn};
use marker_core::nalgebra::Point3;
use marker_core::{CameraFromObject, ImageBounds, ImagePoint, Pose};
use marker_pinhole::CameraIntrinsics;

/// Everything known about one successful marker pose estimate.
///
/// All poses except [`MarkerPose::camera_from_object`] are in the AR engine convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPose {
    /// The raw solver output, in the computer-vision convention.
    pub camera_from_object: CameraFromObject,
    /// The converted solver output, relative to the AR camera.
    pub in_camera: Pose,
    /// [`MarkerPose::in_camera`] composed with the camera pose.
    pub world: Pose,
    /// The marker center in world coordinates, with the marker's world rotation.
    pub marker_center: Pose,
    /// [`MarkerPose::marker_center`] rotated so the marker's `+Z` points at world up.
    pub upright: Option<Pose>,
    pub strategy: &'static str,
    pub reprojection_rmse: f64,
}

/// The outcome of a single estimate, as handed to the rest of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEstimate(Result<MarkerPose, PoseError>);

impl PoseEstimate {
    pub fn is_success(&self) -> bool {
        self.0.is_ok()
    }

    pub fn marker_center_pose(&self) -> Option<&Pose> {
        self.0.as_ref().ok().map(|pose| &pose.marker_center)
    }

    pub fn upright_pose(&self) -> Option<&Pose> {
        self.0.as_ref().ok().and_then(|pose| pose.upright.as_ref())
    }

    /// Why the estimate failed, if it did.
    pub fn reason(&self) -> Option<String> {
        self.0.as_ref().err().map(ToString::to_string)
    }

    pub fn marker_pose(&self) -> Option<&MarkerPose> {
        self.0.as_ref().ok()
    }

    pub fn into_result(self) -> Result<MarkerPose, PoseError> {
        self.0
    }
}

impl From<Result<MarkerPose, PoseError>> for PoseEstimate {
    fn from(result: Result<MarkerPose, PoseError>) -> Self {
        Self(result)
    }
}

/// Estimates the world pose of a square marker from its detected corners.
///
/// ```
/// use marker_core::{ImagePoint, Pose};
/// use marker_pinhole::CameraIntrinsics;
/// use marker_pose::{PoseEstimator, SolverSettings};
///
/// let estimator = PoseEstimator::new(SolverSettings::default());
/// let corners = [
///     ImagePoint::new(100.0, 100.0),
///     ImagePoint::new(200.0, 100.0),
///     ImagePoint::new(200.0, 200.0),
///     ImagePoint::new(100.0, 200.0),
/// ];
/// let intrinsics = CameraIntrinsics::from_arrays([800.0, 800.0], [150.0, 150.0]);
/// let estimate = estimator.estimate(&corners, None, &intrinsics, &Pose::identity());
/// assert!(estimate.is_success());
/// assert!(estimate.upright_pose().is_some());
/// ```
#[derive(Debug)]
pub struct PoseEstimator {
    settings: SolverSettings,
    chain: SolverChain,
}

impl PoseEstimator {
    pub fn new(settings: SolverSettings) -> Self {
        Self::with_chain(settings, SolverChain::from_settings(&settings))
    }

    pub fn with_chain(settings: SolverSettings, chain: SolverChain) -> Self {
        Self { settings, chain }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Like [`PoseEstimator::estimate_pose`], but never fails: failures are captured in the
    /// returned [`PoseEstimate`].
    pub fn estimate(
        &self,
        points: &[ImagePoint],
        bounds: Option<ImageBounds>,
        intrinsics: &CameraIntrinsics,
        camera_pose: &Pose,
    ) -> PoseEstimate {
        let result = self.estimate_pose(points, bounds, intrinsics, camera_pose);
        if let Err(e) = &result {
            debug!("marker pose estimate failed: {}", e);
        }
        result.into()
    }

    /// Orders the corners, solves the marker pose, converts it into the AR convention and places
    /// it in the world using `camera_pose`.
    ///
    /// Three corners are completed into a parallelogram, clamped to `bounds` when given.
    pub fn estimate_pose(
        &self,
        points: &[ImagePoint],
        bounds: Option<ImageBounds>,
        intrinsics: &CameraIntrinsics,
        camera_pose: &Pose,
    ) -> Result<MarkerPose, PoseError> {
        let size = self.settings.marker_size;
        if !(size.is_finite() && size > 0.0) {
            return Err(PoseError::InvalidMarkerSize(size));
        }
        if !intrinsics.is_valid() {
            return Err(PoseError::InvalidIntrinsics);
        }
        if !camera_pose.is_finite() {
            return Err(PoseError::Numerical("camera pose is not finite".into()));
        }

        let corners = prepare_corners(points, bounds)?;
        let problem = SquareProblem::new(corners, *intrinsics, size);
        let solution = self.chain.solve(&problem)?;

        let in_camera = cv_to_ar(&solution.camera_from_object);
        let world = camera_pose.compose(&in_camera);
        let center = world.transform_point(&Point3::new(size / 2.0, size / 2.0, 0.0));
        let marker_center = world.with_translation(center.coords);
        if !marker_center.is_finite() {
            return Err(PoseError::Numerical("marker pose is not finite".into()));
        }

        let upright = upright_pose(&marker_center);
        if upright.is_none() {
            warn!("marker forward axis is degenerate, no upright pose");
        }

        Ok(MarkerPose {
            camera_from_object: solution.camera_from_object,
            in_camera,
            world,
            marker_center,
            upright,
            strategy: solution.strategy,
            reprojection_rmse: solution.reprojection_rmse,
        })
    }
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}
