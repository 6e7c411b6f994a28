use marker_pose::SolverSettings;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("stabilization window must hold at least one pose")]
    EmptyWindow,
    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },
    #[error("marker size must be finite and positive, got {0}")]
    MarkerSize(f64),
}

/// The settings for turning a stream of marker poses into one stable pose.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StabilizerSettings {
    /// The number of consecutive poses that must agree
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_window"))]
    pub window: usize,
    /// The largest distance in meters a buffered pose may be from the average
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_position_threshold")
    )]
    pub position_threshold: f64,
    /// The largest angle in degrees a buffered pose may be from the average
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_rotation_threshold_degrees")
    )]
    pub rotation_threshold_degrees: f64,
    /// Milliseconds after the first pose of a session at which the average is used anyway
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_timeout_millis"))]
    pub timeout_millis: u64,
}

impl StabilizerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn rotation_threshold(&self) -> f64 {
        self.rotation_threshold_degrees.to_radians()
    }

    #[must_use]
    pub fn window(self, window: usize) -> Self {
        Self { window, ..self }
    }

    #[must_use]
    pub fn timeout_millis(self, timeout_millis: u64) -> Self {
        Self {
            timeout_millis,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.window == 0 {
            return Err(SettingsError::EmptyWindow);
        }
        non_negative("position_threshold", self.position_threshold)?;
        non_negative("rotation_threshold_degrees", self.rotation_threshold_degrees)
    }
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            position_threshold: default_position_threshold(),
            rotation_threshold_degrees: default_rotation_threshold_degrees(),
            timeout_millis: default_timeout_millis(),
        }
    }
}

/// The settings for the whole frame pipeline.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PipelineSettings {
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub solver: SolverSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub stabilizer: StabilizerSettings,
    /// Meters to shift each pose along the marker's local `+X` axis before stabilization
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_lateral_correction")
    )]
    pub lateral_correction: f64,
    /// The minimum milliseconds between the end of one decode and the start of the next
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_min_decode_interval_millis")
    )]
    pub min_decode_interval_millis: u64,
    /// Whether to stabilize the upright pose instead of the marker pose when it is available
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_prefer_upright"))]
    pub prefer_upright: bool,
    /// Worker threads for decoding, `0` lets rayon decide
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub worker_threads: usize,
}

impl PipelineSettings {
    pub fn min_decode_interval(&self) -> Duration {
        Duration::from_millis(self.min_decode_interval_millis)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let size = self.solver.marker_size;
        if !(size.is_finite() && size > 0.0) {
            return Err(SettingsError::MarkerSize(size));
        }
        non_negative("max_reprojection_error", self.solver.max_reprojection_error)?;
        if !self.lateral_correction.is_finite() {
            return Err(SettingsError::NotFinite {
                name: "lateral_correction",
                value: self.lateral_correction,
            });
        }
        self.stabilizer.validate()
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            solver: SolverSettings::default(),
            stabilizer: StabilizerSettings::default(),
            lateral_correction: default_lateral_correction(),
            min_decode_interval_millis: default_min_decode_interval_millis(),
            prefer_upright: default_prefer_upright(),
            worker_threads: 0,
        }
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SettingsError::Negative { name, value })
    }
}

fn default_window() -> usize {
    8
}

fn default_position_threshold() -> f64 {
    0.008
}

fn default_rotation_threshold_degrees() -> f64 {
    2.0
}

fn default_timeout_millis() -> u64 {
    1500
}

fn default_lateral_correction() -> f64 {
    0.04
}

fn default_min_decode_interval_millis() -> u64 {
    150
}

fn default_prefer_upright() -> bool {
    true
}
