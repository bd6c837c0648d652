//! Swing segmentation state machine
//!
//! Consumes ordered frames and emits completed swing segments. The segmenter
//! is an explicit two-state machine with exclusive ownership of its frame
//! buffer:
//!
//! - **Seeking**: waiting for a confident Preparation/Backswing frame to open
//!   a segment (suppressed for a gap after each emission).
//! - **Accumulating**: frames join the buffer only when confident and when
//!   their instantaneous phase is a legal forward step; completion runs the
//!   contact detector and freezes the segment.
//!
//! Low-confidence frames and segments that never complete are expected
//! degenerate input and are dropped without error.

use crate::config::AnalysisConfig;
use crate::contact::ContactFrameDetector;
use crate::types::{FrameSample, Joint, PhaseCounts, SwingPhase, SwingSegment};
use tracing::{debug, info};
use uuid::Uuid;

/// Joints that must be confidently detected for a frame to enter a buffer
const REQUIRED_JOINTS: [Joint; 6] = [
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftElbow,
    Joint::RightElbow,
    Joint::LeftWrist,
    Joint::RightWrist,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmenterState {
    Seeking,
    Accumulating,
}

/// Whether a buffer's phase counts satisfy the completion minimums
pub fn phase_minimums_met(counts: &PhaseCounts, config: &AnalysisConfig) -> bool {
    counts.backswing >= config.min_backswing_frames
        && counts.swing >= config.min_swing_frames
        && counts.follow_through >= config.min_follow_through_frames
        && counts.total() >= config.min_segment_frames
}

/// Online segmenter producing ordered, non-overlapping swing segments
#[derive(Debug)]
pub struct SwingSegmenter {
    config: AnalysisConfig,
    contact_detector: ContactFrameDetector,
    state: SegmenterState,
    buffer: Vec<FrameSample>,
    dropouts: usize,
    cooldown: usize,
}

impl SwingSegmenter {
    pub fn new(config: AnalysisConfig) -> Self {
        let contact_detector = ContactFrameDetector::new(&config);
        Self {
            config,
            contact_detector,
            state: SegmenterState::Seeking,
            buffer: Vec::new(),
            dropouts: 0,
            cooldown: 0,
        }
    }

    /// Frames currently buffered in the open segment
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    /// Feed the next frame; returns a segment when one completes.
    pub fn push(&mut self, mut sample: FrameSample) -> Option<SwingSegment> {
        // The inter-segment gap is consumed frame by frame while seeking,
        // confident or not.
        let suppressed = self.state == SegmenterState::Seeking && self.cooldown > 0;
        if suppressed {
            self.cooldown -= 1;
        }

        if !self.has_required_confidence(&sample) {
            return self.handle_dropout(sample.frame_index);
        }
        self.dropouts = 0;

        let phase = self.classify_phase(&sample);
        sample.phase = Some(phase);

        match self.state {
            SegmenterState::Seeking => {
                if !suppressed && phase.can_open_segment() {
                    debug!(frame = sample.frame_index, phase = phase.as_str(), "opening segment");
                    self.state = SegmenterState::Accumulating;
                    self.buffer.push(sample);
                }
                None
            }
            SegmenterState::Accumulating => self.accumulate(sample, phase),
        }
    }

    /// Record a frame that produced no usable keypoints.
    ///
    /// Runs the same recovery path as a confidence dropout: tolerated up to
    /// the dropout limit mid-buffer, then the buffer is salvaged or dropped.
    pub fn push_unusable(&mut self, frame_index: u64) -> Option<SwingSegment> {
        if self.state == SegmenterState::Seeking && self.cooldown > 0 {
            self.cooldown -= 1;
        }
        self.handle_dropout(frame_index)
    }

    /// Drain the buffer at end of stream.
    ///
    /// A buffer that already satisfies the phase minimums completes; anything
    /// else is an expected tail fragment and is dropped silently.
    pub fn finish(&mut self) -> Option<SwingSegment> {
        if self.state == SegmenterState::Accumulating && self.minimums_met() {
            return self.complete();
        }
        if !self.buffer.is_empty() {
            debug!(frames = self.buffer.len(), "dropping incomplete tail buffer");
        }
        self.reset();
        None
    }

    fn accumulate(&mut self, sample: FrameSample, phase: SwingPhase) -> Option<SwingSegment> {
        let last_phase = match self.buffer.last().and_then(|s| s.phase) {
            Some(phase) => phase,
            None => {
                // Buffer can't be empty while accumulating; recover anyway.
                self.reset();
                return None;
            }
        };

        // A return to Preparation after the minimums are met freezes the
        // buffer; the signaling frame is not consumed.
        if phase == SwingPhase::Preparation && self.minimums_met() {
            return self.complete();
        }

        if !last_phase.can_transition_to(phase) {
            debug!(
                frame = sample.frame_index,
                from = last_phase.as_str(),
                to = phase.as_str(),
                "rejecting backward phase transition"
            );
            return None;
        }

        self.buffer.push(sample);

        if self.buffer.len() >= self.config.max_segment_frames {
            if self.minimums_met() {
                return self.complete();
            }
            debug!(
                frames = self.buffer.len(),
                "discarding runaway buffer without phase structure"
            );
            self.reset();
        }
        None
    }

    fn handle_dropout(&mut self, frame_index: u64) -> Option<SwingSegment> {
        if self.state != SegmenterState::Accumulating {
            return None;
        }
        self.dropouts += 1;
        if self.dropouts < self.config.max_confidence_dropouts {
            return None;
        }

        // Confidence lost mid-buffer: salvage a long enough buffer,
        // otherwise discard silently.
        if self.buffer.len() >= self.config.min_segment_frames {
            debug!(frame = frame_index, "confidence lost, force-completing buffer");
            return self.complete();
        }
        debug!(frame = frame_index, "confidence lost, discarding short buffer");
        self.reset();
        None
    }

    fn minimums_met(&self) -> bool {
        phase_minimums_met(&PhaseCounts::from_samples(&self.buffer), &self.config)
    }

    fn complete(&mut self) -> Option<SwingSegment> {
        let frames = std::mem::take(&mut self.buffer);
        self.state = SegmenterState::Seeking;
        self.dropouts = 0;
        self.cooldown = self.config.segment_gap_frames;

        let (start_frame, end_frame) = match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => (first.frame_index, last.frame_index),
            _ => return None,
        };

        let phase_counts = PhaseCounts::from_samples(&frames);
        let mut segment = SwingSegment {
            id: Uuid::new_v4(),
            start_frame,
            end_frame,
            frames,
            phase_counts,
            contact: None,
        };
        segment.contact = Some(self.contact_detector.detect(&segment));

        info!(
            segment = %segment.id,
            start = start_frame,
            end = end_frame,
            frames = segment.len(),
            contact = segment.contact.map(|c| c.frame_index),
            "segment completed"
        );
        Some(segment)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = SegmenterState::Seeking;
        self.dropouts = 0;
    }

    fn has_required_confidence(&self, sample: &FrameSample) -> bool {
        REQUIRED_JOINTS
            .iter()
            .all(|j| sample.keypoint(*j).confidence >= self.config.confidence_threshold)
    }

    /// Instantaneous phase from the dominant wrist relative to the shoulder
    /// midline, with a velocity gate for the Swing phase.
    fn classify_phase(&self, sample: &FrameSample) -> SwingPhase {
        let wrist_joint = self.config.handedness.wrist();
        let wrist = sample.keypoint(wrist_joint);
        let speed = sample.velocity(wrist_joint).magnitude();

        if speed >= self.config.swing_velocity_threshold {
            return SwingPhase::Swing;
        }

        let left = sample.keypoint(Joint::LeftShoulder);
        let right = sample.keypoint(Joint::RightShoulder);
        let mid_x = (left.x + right.x) / 2.0;
        let dominant_shoulder = sample.keypoint(self.config.handedness.shoulder());

        // Signed offset of the wrist along the dominant side of the midline
        let dominant_dir = (dominant_shoulder.x - mid_x).signum();
        let wrist_offset = (wrist.x - mid_x) * dominant_dir;
        let shoulder_offset = (dominant_shoulder.x - mid_x).abs();

        if wrist_offset > shoulder_offset {
            SwingPhase::Backswing
        } else if wrist_offset < 0.0 {
            SwingPhase::FollowThrough
        } else {
            SwingPhase::Preparation
        }
    }
}
