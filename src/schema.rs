//! Input wire schema
//!
//! This module defines the payload produced by the upstream pose-estimation
//! collaborator: ordered per-frame keypoints (17 joints × {x, y, confidence})
//! plus video frame rate and resolution. The adapter converts wire frames
//! into the internal keypoint array, clamping confidences into [0, 1].

use crate::error::AnalysisError;
use crate::types::{Keypoint, JOINT_COUNT};
use serde::{Deserialize, Serialize};

/// Schema version accepted by this engine
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Video metadata accompanying a pose stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    /// Frames per second
    pub fps: f32,
    /// Frame width in pixels
    pub width: f32,
    /// Frame height in pixels
    pub height: f32,
}

/// One keypoint as produced by the pose model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// One frame of pose output, keypoints in COCO-17 index order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Frame index within the source video
    pub frame_index: u64,
    /// Exactly 17 keypoints, COCO order
    pub keypoints: Vec<RawKeypoint>,
}

/// A complete pose stream for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStream {
    /// Video metadata
    pub video: VideoMeta,
    /// Ordered frames
    pub frames: Vec<PoseFrame>,
}

impl PoseStream {
    /// Parse a pose stream from JSON
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(json).map_err(AnalysisError::JsonError)
    }
}

/// Convert a wire frame into the internal keypoint array.
///
/// Rejects frames with the wrong keypoint count; out-of-range confidences
/// are clamped rather than rejected.
pub fn adapt_frame(frame: &PoseFrame) -> Result<[Keypoint; JOINT_COUNT], AnalysisError> {
    if frame.keypoints.len() != JOINT_COUNT {
        return Err(AnalysisError::MissingField(format!(
            "frame {} has {} keypoints, expected {}",
            frame.frame_index,
            frame.keypoints.len(),
            JOINT_COUNT
        )));
    }

    let mut keypoints = [Keypoint::default(); JOINT_COUNT];
    for (i, raw) in frame.keypoints.iter().enumerate() {
        let x = if raw.x.is_finite() { raw.x } else { 0.0 };
        let y = if raw.y.is_finite() { raw.y } else { 0.0 };
        let confidence = if raw.confidence.is_finite() {
            raw.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        keypoints[i] = Keypoint::new(x, y, confidence);
    }
    Ok(keypoints)
}
