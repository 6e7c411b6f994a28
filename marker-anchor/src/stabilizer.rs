use crate::{PoseBuffer, StabilizerSettings};
use log::{debug, info};
use marker_core::Pose;
use std::time::Instant;

/// Why a [`StablePose`] was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// A full window of poses agreed within tolerance.
    Converged,
    /// The timeout elapsed first and the buffer average was used as a best effort.
    TimedOut,
}

/// The single pose a stabilization session produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StablePose {
    pub pose: Pose,
    pub stability: Stability,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    Collecting,
    Anchored,
}

/// Buffers consecutive world poses until they agree, then emits their average once.
///
/// After emitting, the stabilizer stays [`StabilizerState::Anchored`] and ignores further poses
/// until [`Stabilizer::reset`].
#[derive(Debug, Clone)]
pub struct Stabilizer {
    settings: StabilizerSettings,
    buffer: PoseBuffer,
    started_at: Option<Instant>,
    state: StabilizerState,
}

impl Stabilizer {
    pub fn new(settings: StabilizerSettings) -> Self {
        Self {
            settings,
            buffer: PoseBuffer::new(settings.window),
            started_at: None,
            state: StabilizerState::Collecting,
        }
    }

    pub fn settings(&self) -> &StabilizerSettings {
        &self.settings
    }

    pub fn state(&self) -> StabilizerState {
        self.state
    }

    pub fn is_anchored(&self) -> bool {
        self.state == StabilizerState::Anchored
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Adds the pose observed at `now`.
    ///
    /// Returns the stable pose when a full window is within tolerance of its average, or when more
    /// than the timeout has passed since the first pose of the session.
    pub fn push(&mut self, pose: Pose, now: Instant) -> Option<StablePose> {
        if self.is_anchored() {
            return None;
        }
        self.buffer.push(pose);
        let started_at = *self.started_at.get_or_insert(now);
        let average = self.buffer.average()?;

        let converged = self.buffer.is_full()
            && self.buffer.all_within(
                &average,
                self.settings.position_threshold,
                self.settings.rotation_threshold(),
            );
        let stability = if converged {
            Stability::Converged
        } else if now.saturating_duration_since(started_at) > self.settings.timeout() {
            Stability::TimedOut
        } else {
            debug!(
                "waiting for stable pose: {}/{} samples",
                self.buffer.len(),
                self.settings.window
            );
            return None;
        };

        let stable = StablePose {
            pose: average,
            stability,
            samples: self.buffer.len(),
        };
        info!(
            "pose stabilized ({:?}) from {} samples",
            stability, stable.samples
        );
        self.buffer.clear();
        self.started_at = None;
        self.state = StabilizerState::Anchored;
        Some(stable)
    }

    /// Drops every buffered pose and starts collecting again.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started_at = None;
        self.state = StabilizerState::Collecting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marker_core::nalgebra::{UnitQuaternion, Vector3};
    use std::time::Duration;

    fn pose(x: f64) -> Pose {
        Pose::new(
            Vector3::new(x, 1.0, -0.5),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        )
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn identical_poses_are_stable_at_once() {
        let mut stabilizer = Stabilizer::new(StabilizerSettings::default());
        let start = Instant::now();
        for i in 0..7 {
            assert_eq!(stabilizer.push(pose(0.2), start + ms(10 * i)), None);
        }
        let stable = stabilizer.push(pose(0.2), start + ms(70)).unwrap();
        assert_eq!(stable.stability, Stability::Converged);
        assert_eq!(stable.samples, 8);
        assert_relative_eq!(stable.pose.translation, pose(0.2).translation, epsilon = 1e-12);
        assert_relative_eq!(
            stable.pose.rotation.angle_to(&pose(0.2).rotation),
            0.0,
            epsilon = 1e-9
        );
        assert!(stabilizer.is_anchored());
        assert_eq!(stabilizer.buffered(), 0);
    }

    #[test]
    fn diverging_poses_wait_for_timeout() {
        let mut stabilizer = Stabilizer::new(StabilizerSettings::default());
        let start = Instant::now();
        for i in 0..20u32 {
            let now = start + ms(u64::from(i) * 100);
            let emitted = stabilizer.push(pose(f64::from(i) * 0.01), now);
            if now - start <= ms(1500) {
                assert_eq!(emitted, None, "emitted early at sample {}", i);
            } else {
                let stable = emitted.unwrap();
                assert_eq!(stable.stability, Stability::TimedOut);
                // The window holds the last eight samples.
                let expected = (i - 7..=i).map(|j| f64::from(j) * 0.01).sum::<f64>() / 8.0;
                assert_relative_eq!(stable.pose.translation.x, expected, epsilon = 1e-12);
                return;
            }
        }
        panic!("timeout never fired");
    }

    #[test]
    fn anchored_ignores_poses_until_reset() {
        let settings = StabilizerSettings::default().window(1);
        let mut stabilizer = Stabilizer::new(settings);
        let now = Instant::now();
        assert!(stabilizer.push(pose(0.0), now).is_some());
        assert_eq!(stabilizer.push(pose(0.0), now), None);
        stabilizer.reset();
        assert_eq!(stabilizer.state(), StabilizerState::Collecting);
        assert!(stabilizer.push(pose(0.0), now).is_some());
    }

    #[test]
    fn timeout_counts_from_first_pose() {
        let mut stabilizer = Stabilizer::new(StabilizerSettings::default());
        let start = Instant::now();
        assert_eq!(stabilizer.push(pose(0.0), start), None);
        let stable = stabilizer.push(pose(1.0), start + ms(1501)).unwrap();
        assert_eq!(stable.stability, Stability::TimedOut);
        assert_eq!(stable.samples, 2);
        assert_relative_eq!(stable.pose.translation.x, 0.5, epsilon = 1e-12);
    }
}
