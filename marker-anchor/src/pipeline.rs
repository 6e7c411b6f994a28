use crate::{
    offset_pose_using_axes, DecodeGate, Frame, Generation, MarkerDecoder, PipelineSettings, ScanSession,
    SettingsError, Stability, Stabilizer,
};
use log::{debug, info, trace, warn};
use marker_core::nalgebra::Vector3;
use marker_core::Pose;
use marker_pose::{MarkerPose, PoseError, PoseEstimator};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("failed to build the decode worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// A stable marker pose ready to have content attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// The decoded marker text, used to look up what to place.
    pub payload: String,
    /// World pose in the AR engine convention.
    pub pose: Pose,
    pub stability: Stability,
    pub samples: usize,
    pub generation: Generation,
}

/// Receives the one anchor each scan session produces.
pub trait AnchorSink: Send + Sync + 'static {
    /// Places content at the anchor. Returns `false` if placement failed, in which case the
    /// session starts collecting poses again.
    fn place(&self, anchor: &Anchor) -> bool;
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The session already has an anchor.
    AlreadyAnchored,
    /// The decoder found no marker.
    NoDetection,
    /// A marker was found but its pose could not be estimated.
    Failed(PoseError),
    /// The pose was buffered and nothing is stable yet.
    Collecting { samples: usize },
    /// The sink placed this anchor.
    Anchored(Anchor),
    /// The sink declined this anchor.
    Rejected(Anchor),
    /// A rescan happened while the frame was in flight; its result was discarded.
    Stale(Generation),
}

/// Runs decode, pose estimation and stabilization for camera frames on a worker pool.
///
/// Frames are submitted from the AR session's frame callback with
/// [`FramePipeline::submit_frame`], which never blocks. The [`DecodeGate`] lets one frame at a
/// time through and drops the rest.
pub struct FramePipeline<D, S> {
    settings: PipelineSettings,
    estimator: PoseEstimator,
    stabilizer: Mutex<Stabilizer>,
    session: ScanSession,
    gate: Arc<DecodeGate>,
    decoder: D,
    sink: S,
    pool: ThreadPool,
}

impl<D, S> FramePipeline<D, S>
where
    D: MarkerDecoder,
    S: AnchorSink,
{
    pub fn new(settings: PipelineSettings, decoder: D, sink: S) -> Result<Arc<Self>, PipelineError> {
        settings.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .thread_name(|ix| format!("marker-decode-{}", ix))
            .build()?;
        Ok(Arc::new(Self {
            settings,
            estimator: PoseEstimator::new(settings.solver),
            stabilizer: Mutex::new(Stabilizer::new(settings.stabilizer)),
            session: ScanSession::new(),
            gate: Arc::new(DecodeGate::new(settings.min_decode_interval())),
            decoder,
            sink,
            pool,
        }))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_anchored(&self) -> bool {
        self.stabilizer().is_anchored()
    }

    /// Starts a new scan session. Results of frames still in flight are discarded.
    pub fn rescan(&self) -> Generation {
        let generation = self.session.rescan();
        self.stabilizer().reset();
        info!("scanning reset, now in {}", generation);
        generation
    }

    /// Hands a frame to the worker pool.
    ///
    /// Returns `false` if the frame was dropped because the session is anchored, a decode is in
    /// flight or the previous decode finished too recently.
    pub fn submit_frame(self: &Arc<Self>, frame: Frame<D::Image>) -> bool {
        if self.is_anchored() {
            trace!("already anchored, skipping frame");
            return false;
        }
        let permit = match self.gate.try_acquire(frame.timestamp) {
            Some(permit) => permit,
            None => return false,
        };
        let generation = self.session.begin();
        let pipeline = Arc::clone(self);
        self.pool.spawn(move || {
            let started = Instant::now();
            let outcome = pipeline.process_frame(&frame, generation);
            trace!("frame finished: {:?}", outcome);
            permit.finish(frame.timestamp + started.elapsed());
        });
        true
    }

    /// Runs one frame to completion on the calling thread.
    ///
    /// `generation` is the session the frame was captured in. The result is committed only if it
    /// is still current.
    pub fn process_frame(&self, frame: &Frame<D::Image>, generation: Generation) -> PipelineOutcome {
        if !self.session.is_current(generation) {
            return PipelineOutcome::Stale(generation);
        }
        if self.is_anchored() {
            return PipelineOutcome::AlreadyAnchored;
        }

        let detection = match self.decoder.decode(&frame.image) {
            Some(detection) => detection,
            None => return PipelineOutcome::NoDetection,
        };
        debug!(
            "detected marker {:?} with {} points",
            detection.payload,
            detection.points.len()
        );

        let points = detection.image_points(frame.bounds);
        let marker = match self.estimator.estimate_pose(
            &points,
            Some(frame.bounds),
            &frame.intrinsics,
            &frame.camera_pose,
        ) {
            Ok(marker) => marker,
            Err(e) => {
                warn!("pose estimation failed: {}", e);
                return PipelineOutcome::Failed(e);
            }
        };
        let corrected = self.corrected_pose(&marker);

        let stable = {
            let mut stabilizer = self.stabilizer();
            if !self.session.is_current(generation) {
                debug!("discarding pose for outdated {}", generation);
                return PipelineOutcome::Stale(generation);
            }
            match stabilizer.push(corrected, frame.timestamp) {
                Some(stable) => stable,
                None => {
                    return PipelineOutcome::Collecting {
                        samples: stabilizer.buffered(),
                    }
                }
            }
        };

        let anchor = Anchor {
            payload: detection.payload,
            pose: stable.pose,
            stability: stable.stability,
            samples: stable.samples,
            generation,
        };
        if !self.session.is_current(generation) {
            debug!("discarding anchor for outdated {}", generation);
            return PipelineOutcome::Stale(generation);
        }
        if self.sink.place(&anchor) {
            info!("anchored {:?} at {:?}", anchor.payload, anchor.pose.translation);
            PipelineOutcome::Anchored(anchor)
        } else {
            warn!("failed to place {:?}, collecting again", anchor.payload);
            let mut stabilizer = self.stabilizer();
            if self.session.is_current(generation) {
                stabilizer.reset();
            }
            PipelineOutcome::Rejected(anchor)
        }
    }

    /// Shifts the estimated pose along the marker's own `+X` axis by the lateral correction.
    ///
    /// The upright pose is shifted when it exists and is preferred, the marker pose otherwise.
    pub fn corrected_pose(&self, marker: &MarkerPose) -> Pose {
        let base = match marker.upright {
            Some(upright) if self.settings.prefer_upright => upright,
            _ => marker.marker_center,
        };
        offset_pose_using_axes(
            &marker.marker_center,
            &base,
            &Vector3::new(self.settings.lateral_correction, 0.0, 0.0),
        )
    }

    fn stabilizer(&self) -> MutexGuard<'_, Stabilizer> {
        self.stabilizer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
