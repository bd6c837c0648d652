//! Core types for the swing analysis pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: keypoints, per-frame samples, swing phases, completed segments,
//! and quality results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// Number of tracked body joints (COCO-17 layout)
pub const JOINT_COUNT: usize = 17;

/// Tracked anatomical landmark, COCO-17 index order.
///
/// The index mapping is a wire convention shared with the upstream
/// pose-estimation model. Any reordering here silently corrupts the feature
/// name table, so the mapping is pinned by a round-trip test in `features`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl Joint {
    /// All joints in index order
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Nose,
        Joint::LeftEye,
        Joint::RightEye,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    /// Look up a joint by its COCO index
    pub fn from_index(index: usize) -> Option<Joint> {
        Joint::ALL.get(index).copied()
    }

    /// Joint index in the keypoint array
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Human-readable joint name
    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::Nose => "Nose",
            Joint::LeftEye => "Left Eye",
            Joint::RightEye => "Right Eye",
            Joint::LeftEar => "Left Ear",
            Joint::RightEar => "Right Ear",
            Joint::LeftShoulder => "Left Shoulder",
            Joint::RightShoulder => "Right Shoulder",
            Joint::LeftElbow => "Left Elbow",
            Joint::RightElbow => "Right Elbow",
            Joint::LeftWrist => "Left Wrist",
            Joint::RightWrist => "Right Wrist",
            Joint::LeftHip => "Left Hip",
            Joint::RightHip => "Right Hip",
            Joint::LeftKnee => "Left Knee",
            Joint::RightKnee => "Right Knee",
            Joint::LeftAnkle => "Left Ankle",
            Joint::RightAnkle => "Right Ankle",
        }
    }
}

/// Dominant-arm selection for phase classification and contact detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Dominant wrist joint
    pub fn wrist(&self) -> Joint {
        match self {
            Handedness::Left => Joint::LeftWrist,
            Handedness::Right => Joint::RightWrist,
        }
    }

    /// Dominant elbow joint
    pub fn elbow(&self) -> Joint {
        match self {
            Handedness::Left => Joint::LeftElbow,
            Handedness::Right => Joint::RightElbow,
        }
    }

    /// Dominant shoulder joint
    pub fn shoulder(&self) -> Joint {
        match self {
            Handedness::Left => Joint::LeftShoulder,
            Handedness::Right => Joint::RightShoulder,
        }
    }
}

/// 2D vector for positions, velocities, and accelerations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean magnitude
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// A detected keypoint: 2D position plus detection confidence in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Position as a vector
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Phase of a tennis swing.
///
/// Within an open segment transitions are strictly forward; a segment may
/// only open on Preparation or Backswing, and a return to Preparation after
/// FollowThrough signals completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingPhase {
    Preparation,
    Backswing,
    Swing,
    FollowThrough,
}

impl SwingPhase {
    /// Position in the forward phase order
    fn rank(&self) -> u8 {
        match self {
            SwingPhase::Preparation => 0,
            SwingPhase::Backswing => 1,
            SwingPhase::Swing => 2,
            SwingPhase::FollowThrough => 3,
        }
    }

    /// Transition-legality table: a frame may repeat the current phase or
    /// step forward, never backward.
    pub fn can_transition_to(&self, next: SwingPhase) -> bool {
        next.rank() >= self.rank()
    }

    /// Whether a new segment may open on a frame in this phase
    pub fn can_open_segment(&self) -> bool {
        matches!(self, SwingPhase::Preparation | SwingPhase::Backswing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwingPhase::Preparation => "preparation",
            SwingPhase::Backswing => "backswing",
            SwingPhase::Swing => "swing",
            SwingPhase::FollowThrough => "follow_through",
        }
    }
}

/// Joint angles (degrees) derived from adjacent joint triples.
///
/// An angle is 0.0 when any joint in its triple falls below the confidence
/// threshold or the geometry is degenerate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub left_elbow: f32,
    pub right_elbow: f32,
    pub left_shoulder: f32,
    pub right_shoulder: f32,
    pub left_hip: f32,
    pub right_hip: f32,
    pub left_knee: f32,
    pub right_knee: f32,
}

/// One frame of pose data with derived motion state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSample {
    /// Frame index within the source stream
    pub frame_index: u64,
    /// Raw keypoints in COCO order
    pub keypoints: [Keypoint; JOINT_COUNT],
    /// Per-joint velocity (units/s), zero without frame history
    pub velocities: [Vec2; JOINT_COUNT],
    /// Per-joint acceleration (units/s²), zero without 2-frame history
    pub accelerations: [Vec2; JOINT_COUNT],
    /// Derived joint angles
    pub angles: JointAngles,
    /// Fixed-layout feature vector (always finite)
    pub features: Vec<f32>,
    /// Assigned swing phase, None until segmented
    pub phase: Option<SwingPhase>,
}

impl FrameSample {
    /// Keypoint for a joint
    pub fn keypoint(&self, joint: Joint) -> &Keypoint {
        &self.keypoints[joint.index()]
    }

    /// Velocity for a joint
    pub fn velocity(&self, joint: Joint) -> Vec2 {
        self.velocities[joint.index()]
    }
}

/// Per-phase frame counts for a segment buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub preparation: usize,
    pub backswing: usize,
    pub swing: usize,
    pub follow_through: usize,
}

impl PhaseCounts {
    /// Count frames per phase over a slice of samples
    pub fn from_samples(samples: &[FrameSample]) -> Self {
        let mut counts = PhaseCounts::default();
        for sample in samples {
            match sample.phase {
                Some(SwingPhase::Preparation) => counts.preparation += 1,
                Some(SwingPhase::Backswing) => counts.backswing += 1,
                Some(SwingPhase::Swing) => counts.swing += 1,
                Some(SwingPhase::FollowThrough) => counts.follow_through += 1,
                None => {}
            }
        }
        counts
    }

    /// Total counted frames
    pub fn total(&self) -> usize {
        self.preparation + self.backswing + self.swing + self.follow_through
    }
}

/// Raw per-strategy contact candidates, exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCandidates {
    pub peak_velocity: Option<usize>,
    pub peak_acceleration: Option<usize>,
    pub weighted: Option<usize>,
    pub fixed_ratio: Option<usize>,
}

/// Consensus contact estimate for a completed segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactEstimate {
    /// Chosen contact frame, as an offset into the segment
    pub frame_index: usize,
    /// Agreement confidence label (0.9 / 0.7 / 0.4)
    pub confidence: f64,
    /// All raw candidates that fed the consensus
    pub candidates: ContactCandidates,
}

/// A validated, contiguous run of frames representing one stroke.
///
/// Segments are immutable after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingSegment {
    /// Segment identifier
    pub id: Uuid,
    /// Stream index of the first frame
    pub start_frame: u64,
    /// Stream index of the last frame
    pub end_frame: u64,
    /// Phase-labeled frames in stream order
    pub frames: Vec<FrameSample>,
    /// Per-phase frame counts
    pub phase_counts: PhaseCounts,
    /// Estimated contact instant
    pub contact: Option<ContactEstimate>,
}

impl SwingSegment {
    /// Number of frames in the segment
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Technique quality result for one swing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    /// Technique score in [0, 100]
    pub score: f64,
    /// Feature name → normalized importance in [0, 1]
    pub feature_importance: HashMap<String, f64>,
    /// True when the score came from the loaded model, false for the
    /// heuristic fallback. Downstream consumers must honor this flag.
    pub from_model: bool,
}

impl QualityResult {
    /// Importance entries in a deterministic total order: descending by
    /// importance, ties broken by name.
    fn ranked(&self) -> Vec<(String, f64)> {
        let mut entries: Vec<(String, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        entries
    }

    /// The `n` most important features, descending
    pub fn top_features(&self, n: usize) -> Vec<(String, f64)> {
        let mut entries = self.ranked();
        entries.truncate(n);
        entries
    }

    /// The `n` least important features, ascending
    pub fn weak_features(&self, n: usize) -> Vec<(String, f64)> {
        let mut entries = self.ranked();
        entries.reverse();
        entries.truncate(n);
        entries
    }
}

/// Complete analysis output for one swing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingAnalysis {
    /// Analysis identifier for provenance tracking
    pub analysis_id: Uuid,
    /// When the analysis was computed (UTC)
    pub computed_at: DateTime<Utc>,
    /// The segmented swing with phase labels and contact index
    pub segment: SwingSegment,
    /// Technique quality score and per-feature importance
    pub quality: QualityResult,
}
