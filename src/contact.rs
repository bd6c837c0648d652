//! Contact frame detection
//!
//! Locates the racket-ball contact instant within a completed segment by
//! running independent candidate estimators and taking a consensus. Each
//! estimator is a strategy behind a common trait so new heuristics can join
//! the vote without touching the consensus logic. All raw candidates are
//! exposed on the result for diagnostics.

use crate::config::AnalysisConfig;
use crate::types::{ContactCandidates, ContactEstimate, Joint, SwingSegment};
use tracing::debug;

/// Fraction through the segment assumed for the fixed-ratio fallback
const FIXED_CONTACT_RATIO: f32 = 0.6;

/// Minimum usable frames for the velocity-based estimators to be trusted
const MIN_USABLE_FRAMES: usize = 5;

/// A candidate contact-frame estimator over a completed segment.
///
/// Returns an offset into the segment, or None when the segment carries too
/// little signal for this method.
pub trait ContactEstimator: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn estimate(&self, segment: &SwingSegment) -> Option<usize>;
}

/// Frame after the dominant wrist's maximum frame-to-frame displacement
#[derive(Debug)]
struct PeakWristVelocity {
    wrist: Joint,
}

impl ContactEstimator for PeakWristVelocity {
    fn name(&self) -> &'static str {
        "peak_velocity"
    }

    fn estimate(&self, segment: &SwingSegment) -> Option<usize> {
        let frames = &segment.frames;
        if frames.len() < 2 {
            return None;
        }
        let mut best = None;
        let mut best_disp = f32::NEG_INFINITY;
        for i in 0..frames.len() - 1 {
            let a = frames[i].keypoint(self.wrist);
            let b = frames[i + 1].keypoint(self.wrist);
            let disp = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            if disp > best_disp {
                best_disp = disp;
                best = Some(i + 1);
            }
        }
        best
    }
}

/// Frame of maximum |Δvelocity| for the dominant wrist
#[derive(Debug)]
struct PeakAccelerationDelta {
    wrist: Joint,
}

impl ContactEstimator for PeakAccelerationDelta {
    fn name(&self) -> &'static str {
        "peak_acceleration"
    }

    fn estimate(&self, segment: &SwingSegment) -> Option<usize> {
        let frames = &segment.frames;
        if frames.len() < 2 {
            return None;
        }
        let mut best = None;
        let mut best_delta = f32::NEG_INFINITY;
        for i in 0..frames.len() - 1 {
            let a = frames[i].velocity(self.wrist);
            let b = frames[i + 1].velocity(self.wrist);
            let delta = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            if delta > best_delta {
                best_delta = delta;
                best = Some(i + 1);
            }
        }
        best
    }
}

/// Weighted per-frame score over velocity, arm extension, wrist height,
/// and forward motion; the argmax wins.
#[derive(Debug)]
struct WeightedComposite {
    wrist: Joint,
    elbow: Joint,
    shoulder: Joint,
    /// +1 when forward motion decreases x, -1 when it increases x
    forward_sign: f32,
    image_height: f32,
}

impl ContactEstimator for WeightedComposite {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn estimate(&self, segment: &SwingSegment) -> Option<usize> {
        let frames = &segment.frames;
        if frames.len() < 2 {
            return None;
        }

        // Displacements between consecutive wrist positions, for the
        // velocity and forward-motion components.
        let mut displacements = Vec::with_capacity(frames.len() - 1);
        let mut forward_steps = Vec::with_capacity(frames.len() - 1);
        let mut max_disp = 0.0f32;
        for i in 0..frames.len() - 1 {
            let a = frames[i].keypoint(self.wrist);
            let b = frames[i + 1].keypoint(self.wrist);
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let disp = (dx * dx + dy * dy).sqrt();
            displacements.push(disp);
            forward_steps.push((self.forward_sign * -dx).max(0.0));
            max_disp = max_disp.max(disp);
        }
        if max_disp <= 0.0 {
            max_disp = 1.0;
        }

        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for i in 1..frames.len() {
            let frame = &frames[i];
            let wrist = frame.keypoint(self.wrist);
            let elbow = frame.keypoint(self.elbow);
            let shoulder = frame.keypoint(self.shoulder);

            let velocity = displacements[i - 1] / max_disp;

            let forearm = ((wrist.x - elbow.x).powi(2) + (wrist.y - elbow.y).powi(2)).sqrt();
            let upper_arm =
                ((elbow.x - shoulder.x).powi(2) + (elbow.y - shoulder.y).powi(2)).sqrt();
            let extension = if upper_arm > 1e-4 {
                (forearm / upper_arm).clamp(0.0, 2.0) / 2.0
            } else {
                0.0
            };

            let height =
                (1.0 - (wrist.y - shoulder.y).abs() / self.image_height).clamp(0.0, 1.0);

            let forward = forward_steps[i - 1] / max_disp;

            let score = 0.4 * velocity + 0.3 * extension + 0.2 * height + 0.1 * forward;
            if score > best_score {
                best_score = score;
                best = Some(i);
            }
        }
        best
    }
}

/// Contact assumed at a fixed fraction through the segment
#[derive(Debug)]
struct FixedRatio;

impl ContactEstimator for FixedRatio {
    fn name(&self) -> &'static str {
        "fixed_ratio"
    }

    fn estimate(&self, segment: &SwingSegment) -> Option<usize> {
        let n = segment.len();
        if n == 0 {
            return None;
        }
        Some(((n as f32 * FIXED_CONTACT_RATIO) as usize).min(n - 1))
    }
}

/// Consensus detector over the candidate estimators
#[derive(Debug)]
pub struct ContactFrameDetector {
    /// Voting strategies; the last entry is the primary whose result is
    /// chosen when enough frames are usable.
    voters: Vec<Box<dyn ContactEstimator>>,
    fallback: FixedRatio,
    wrist: Joint,
    confidence_threshold: f32,
}

impl ContactFrameDetector {
    pub fn new(config: &AnalysisConfig) -> Self {
        let wrist = config.handedness.wrist();
        let forward_sign = match config.handedness {
            crate::types::Handedness::Right => 1.0,
            crate::types::Handedness::Left => -1.0,
        };
        let voters: Vec<Box<dyn ContactEstimator>> = vec![
            Box::new(PeakWristVelocity { wrist }),
            Box::new(PeakAccelerationDelta { wrist }),
            Box::new(WeightedComposite {
                wrist,
                elbow: config.handedness.elbow(),
                shoulder: config.handedness.shoulder(),
                forward_sign,
                image_height: config.image_height,
            }),
        ];
        Self {
            voters,
            fallback: FixedRatio,
            wrist,
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Detect the contact frame for a completed segment.
    pub fn detect(&self, segment: &SwingSegment) -> ContactEstimate {
        let n = segment.len();

        // Degenerate segments short-circuit to the midpoint
        if n < 3 {
            return ContactEstimate {
                frame_index: n / 2,
                confidence: 0.4,
                candidates: ContactCandidates::default(),
            };
        }

        let mut candidates = ContactCandidates::default();
        let mut votes = Vec::with_capacity(self.voters.len());
        for voter in &self.voters {
            let estimate = voter.estimate(segment);
            match voter.name() {
                "peak_velocity" => candidates.peak_velocity = estimate,
                "peak_acceleration" => candidates.peak_acceleration = estimate,
                "weighted" => candidates.weighted = estimate,
                _ => {}
            }
            votes.push(estimate);
        }
        candidates.fixed_ratio = self.fallback.estimate(segment);

        let usable = segment
            .frames
            .iter()
            .filter(|f| f.keypoint(self.wrist).confidence >= self.confidence_threshold)
            .count();

        // Too little usable signal: the velocity methods are noise, fall
        // back to the fixed ratio with low confidence.
        if usable < MIN_USABLE_FRAMES {
            let frame_index = candidates.fixed_ratio.unwrap_or(n / 2);
            debug!(usable, frame_index, "contact via fixed-ratio fallback");
            return ContactEstimate {
                frame_index,
                confidence: 0.4,
                candidates,
            };
        }

        let primary = votes.last().copied().flatten().unwrap_or(n / 2);
        let confidence = confidence_from_spread(&votes);
        ContactEstimate {
            frame_index: primary,
            confidence,
            candidates,
        }
    }
}

/// Agreement label from the standard deviation of the candidate frames
fn confidence_from_spread(votes: &[Option<usize>]) -> f64 {
    let present: Vec<f64> = votes.iter().flatten().map(|v| *v as f64).collect();
    if present.len() < 2 {
        return 0.4;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let variance =
        present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / present.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev < 3.0 {
        0.9
    } else if std_dev < 5.0 {
        0.7
    } else {
        0.4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameSample, JointAngles, Keypoint, PhaseCounts, Vec2, JOINT_COUNT};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn make_segment(frames: Vec<FrameSample>) -> SwingSegment {
        let phase_counts = PhaseCounts::from_samples(&frames);
        let start = frames.first().map(|f| f.frame_index).unwrap_or(0);
        let end = frames.last().map(|f| f.frame_index).unwrap_or(0);
        SwingSegment {
            id: Uuid::new_v4(),
            start_frame: start,
            end_frame: end,
            frames,
            phase_counts,
            contact: None,
        }
    }

    fn sample_at(frame_index: u64, wrist: Keypoint, wrist_velocity: Vec2) -> FrameSample {
        let mut keypoints = [Keypoint::new(640.0, 360.0, 0.9); JOINT_COUNT];
        keypoints[Joint::RightShoulder.index()] = Keypoint::new(700.0, 200.0, 0.9);
        keypoints[Joint::RightElbow.index()] = Keypoint::new(730.0, 260.0, 0.9);
        keypoints[Joint::RightWrist.index()] = wrist;
        let mut velocities = [Vec2::default(); JOINT_COUNT];
        velocities[Joint::RightWrist.index()] = wrist_velocity;
        FrameSample {
            frame_index,
            keypoints,
            velocities,
            accelerations: [Vec2::default(); JOINT_COUNT],
            angles: JointAngles::default(),
            features: Vec::new(),
            phase: None,
        }
    }

    /// 20 frames with a sharp wrist displacement spike into frame 14
    fn peaked_segment() -> SwingSegment {
        let mut frames = Vec::new();
        let mut x = 760.0f32;
        for i in 0..20u64 {
            // Small drift everywhere, a violent jump between frames 13 and 14
            let step = if i == 14 { 120.0 } else { 4.0 };
            if i > 0 {
                x -= step;
            }
            let velocity = Vec2::new(-step * 30.0, 0.0);
            frames.push(sample_at(i, Keypoint::new(x, 300.0, 0.9), velocity));
        }
        make_segment(frames)
    }

    #[test]
    fn test_sharp_peak_yields_high_confidence_consensus() {
        let detector = ContactFrameDetector::new(&AnalysisConfig::default());
        let estimate = detector.detect(&peaked_segment());

        assert!(
            (13..=15).contains(&estimate.frame_index),
            "contact {} not near 14",
            estimate.frame_index
        );
        assert_eq!(estimate.confidence, 0.9);
        assert_eq!(estimate.candidates.peak_velocity, Some(14));
    }

    #[test]
    fn test_candidates_exposed_for_diagnostics() {
        let detector = ContactFrameDetector::new(&AnalysisConfig::default());
        let estimate = detector.detect(&peaked_segment());
        assert!(estimate.candidates.peak_velocity.is_some());
        assert!(estimate.candidates.peak_acceleration.is_some());
        assert!(estimate.candidates.weighted.is_some());
        assert_eq!(estimate.candidates.fixed_ratio, Some(12));
    }

    #[test]
    fn test_degenerate_segment_uses_midpoint() {
        let detector = ContactFrameDetector::new(&AnalysisConfig::default());
        let frames = vec![
            sample_at(0, Keypoint::new(700.0, 300.0, 0.9), Vec2::default()),
            sample_at(1, Keypoint::new(690.0, 300.0, 0.9), Vec2::default()),
        ];
        let estimate = detector.detect(&make_segment(frames));
        assert_eq!(estimate.frame_index, 1);
        assert_eq!(estimate.confidence, 0.4);
        assert_eq!(estimate.candidates, ContactCandidates::default());
    }

    #[test]
    fn test_low_confidence_wrist_falls_back_to_fixed_ratio() {
        let detector = ContactFrameDetector::new(&AnalysisConfig::default());
        let mut frames = Vec::new();
        for i in 0..10u64 {
            let mut sample = sample_at(
                i,
                Keypoint::new(700.0 - i as f32 * 10.0, 300.0, 0.05),
                Vec2::new(-300.0, 0.0),
            );
            // A few confident frames, but fewer than the consensus needs
            if i < 3 {
                sample.keypoints[Joint::RightWrist.index()].confidence = 0.9;
            }
            frames.push(sample);
        }
        let estimate = detector.detect(&make_segment(frames));
        assert_eq!(estimate.frame_index, 6); // 60% of 10
        assert_eq!(estimate.confidence, 0.4);
    }

    #[test]
    fn test_scattered_candidates_lower_confidence() {
        let detector = ContactFrameDetector::new(&AnalysisConfig::default());
        let mut frames = Vec::new();
        // Displacement peak early, velocity-delta peak late, so the
        // methods disagree by much more than the 0.9 band allows.
        for i in 0..30u64 {
            let x = if i == 3 { 500.0 } else { 760.0 - i as f32 };
            let velocity = if i == 27 {
                Vec2::new(-4000.0, 0.0)
            } else {
                Vec2::new(-30.0, 0.0)
            };
            frames.push(sample_at(i, Keypoint::new(x, 300.0, 0.9), velocity));
        }
        let estimate = detector.detect(&make_segment(frames));
        assert!(estimate.confidence < 0.9);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_from_spread(&[Some(14), Some(14), Some(15)]), 0.9);
        assert_eq!(confidence_from_spread(&[Some(10), Some(14), Some(18)]), 0.7);
        assert_eq!(confidence_from_spread(&[Some(2), Some(14), Some(28)]), 0.4);
        assert_eq!(confidence_from_spread(&[Some(5), None, None]), 0.4);
    }
}
