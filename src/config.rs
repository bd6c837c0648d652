//! Analysis configuration
//!
//! Caller-supplied knobs for the full pipeline: sequence shape, confidence
//! gating, segment bounds, and the optional model artifact. Defaults match a
//! 30 fps stream with a right-handed player.

use crate::error::AnalysisError;
use crate::features;
use crate::types::Handedness;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of frames per preprocessed sequence (~3 s at 30 fps)
pub const DEFAULT_SEQUENCE_LENGTH: usize = 90;

/// Default keypoint confidence threshold
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.2;

/// Finite-difference saliency settings.
///
/// Sampled frames instead of every frame is a deliberate precision/cost
/// trade; both knobs stay configurable so tests are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyConfig {
    /// Perturbation step for finite differences
    pub epsilon: f32,
    /// Fractions through the sequence at which features are perturbed
    pub sample_points: Vec<f32>,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            sample_points: vec![0.25, 0.5, 0.75],
        }
    }
}

/// Configuration for the swing analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rows in the preprocessed sequence tensor
    pub sequence_length: usize,
    /// Columns in the preprocessed sequence tensor
    pub num_features: usize,
    /// Keypoints below this confidence are treated as missing
    pub confidence_threshold: f32,
    /// Source frame rate, determines Δt for motion features
    pub fps: f32,
    /// Minimum frames for a valid segment
    pub min_segment_frames: usize,
    /// Absolute cap on segment accumulation
    pub max_segment_frames: usize,
    /// Minimum Backswing frames for completion
    pub min_backswing_frames: usize,
    /// Minimum Swing frames for completion
    pub min_swing_frames: usize,
    /// Minimum FollowThrough frames for completion
    pub min_follow_through_frames: usize,
    /// Frames to suppress new segment starts after an emission
    pub segment_gap_frames: usize,
    /// Consecutive low-confidence frames tolerated mid-buffer before the
    /// recovery path runs
    pub max_confidence_dropouts: usize,
    /// Dominant wrist speed (units/s) at or above which a frame classifies
    /// as Swing
    pub swing_velocity_threshold: f32,
    /// Dominant arm for phase classification and contact detection
    pub handedness: Handedness,
    /// Source image width in pixels
    pub image_width: f32,
    /// Source image height in pixels
    pub image_height: f32,
    /// Path to a pre-trained ONNX quality model; None selects heuristic mode
    pub model_path: Option<PathBuf>,
    /// Finite-difference saliency settings
    pub saliency: SaliencyConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            num_features: features::num_features(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            fps: 30.0,
            min_segment_frames: 15,
            max_segment_frames: 120,
            min_backswing_frames: 10,
            min_swing_frames: 5,
            min_follow_through_frames: 5,
            segment_gap_frames: 30,
            max_confidence_dropouts: 5,
            swing_velocity_threshold: 300.0,
            handedness: Handedness::Right,
            image_width: 1280.0,
            image_height: 720.0,
            model_path: None,
            saliency: SaliencyConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration, rejecting programmer-error-class misuse
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sequence_length == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sequence_length must be positive".to_string(),
            ));
        }
        if self.num_features == 0 {
            return Err(AnalysisError::InvalidConfig(
                "num_features must be positive".to_string(),
            ));
        }
        if self.fps <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "fps must be positive".to_string(),
            ));
        }
        if self.min_segment_frames == 0 || self.max_segment_frames < self.min_segment_frames {
            return Err(AnalysisError::InvalidConfig(format!(
                "segment frame bounds invalid: min {} max {}",
                self.min_segment_frames, self.max_segment_frames
            )));
        }
        if self.image_width <= 0.0 || self.image_height <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "image dimensions must be positive".to_string(),
            ));
        }
        if self.saliency.epsilon <= 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "saliency epsilon must be positive".to_string(),
            ));
        }
        if self.saliency.sample_points.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "saliency sample_points must not be empty".to_string(),
            ));
        }
        if self
            .saliency
            .sample_points
            .iter()
            .any(|p| !p.is_finite() || *p < 0.0 || *p > 1.0)
        {
            return Err(AnalysisError::InvalidConfig(
                "saliency sample_points must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Seconds per frame
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_sequence_length_rejected() {
        let config = AnalysisConfig {
            sequence_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_inverted_segment_bounds_rejected() {
        let config = AnalysisConfig {
            min_segment_frames: 50,
            max_segment_frames: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_sample_points_rejected() {
        let config = AnalysisConfig {
            saliency: SaliencyConfig {
                epsilon: 0.01,
                sample_points: vec![],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_sample_points_rejected() {
        let config = AnalysisConfig {
            saliency: SaliencyConfig {
                epsilon: 0.01,
                sample_points: vec![0.5, 1.5],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_dt() {
        let config = AnalysisConfig::default();
        assert!((config.frame_dt() - 1.0 / 30.0).abs() < 1e-6);
    }
}
