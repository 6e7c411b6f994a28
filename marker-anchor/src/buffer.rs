use marker_core::{average_poses, position_distance, quaternion_angle, Pose};
use std::collections::VecDeque;

/// A bounded FIFO of the most recent world poses.
///
/// Pushing into a full buffer evicts the oldest pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseBuffer {
    poses: VecDeque<Pose>,
    window: usize,
}

impl PoseBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            poses: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn push(&mut self, pose: Pose) {
        self.poses.push_back(pose);
        while self.poses.len() > self.window {
            self.poses.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_full(&self) -> bool {
        self.poses.len() >= self.window
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pose> + '_ {
        self.poses.iter()
    }

    /// See [`average_poses`].
    pub fn average(&self) -> Option<Pose> {
        average_poses(&self.poses)
    }

    /// Whether every buffered pose is within `position_threshold` meters and `rotation_threshold`
    /// radians of `reference`.
    pub fn all_within(&self, reference: &Pose, position_threshold: f64, rotation_threshold: f64) -> bool {
        self.poses.iter().all(|pose| {
            position_distance(pose, reference) <= position_threshold
                && quaternion_angle(&pose.rotation, &reference.rotation) <= rotation_threshold
        })
    }
}
