//! Pipeline orchestration
//!
//! This module provides the public API for swing analysis. It wires the
//! stages together: pose adaptation → feature computation → segmentation →
//! (per segment) contact detection → preprocessing → quality inference.
//!
//! Processing is synchronous and per-swing; each completed segment flows
//! through preprocessing and inference sequentially with no shared mutable
//! state across segments.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::FeatureComputer;
use crate::inference::QualityInferenceEngine;
use crate::preprocess::SequencePreprocessor;
use crate::schema::{self, PoseFrame, PoseStream};
use crate::segmenter::SwingSegmenter;
use crate::types::{FrameSample, Keypoint, SwingAnalysis, SwingSegment, JOINT_COUNT};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Analyze a complete pose stream in one call.
///
/// Frame rate and resolution from the stream metadata override the
/// corresponding config fields, since the stream is authoritative for its
/// own video.
pub fn analyze_pose_stream(
    stream: &PoseStream,
    mut config: AnalysisConfig,
) -> Result<Vec<SwingAnalysis>, AnalysisError> {
    config.fps = stream.video.fps;
    config.image_width = stream.video.width;
    config.image_height = stream.video.height;

    let mut analyzer = SwingAnalyzer::new(config)?;
    let mut analyses = Vec::new();
    for frame in &stream.frames {
        analyses.extend(analyzer.process_frame(frame));
    }
    analyses.extend(analyzer.finish());
    Ok(analyses)
}

/// Stateful streaming analyzer.
///
/// Feed frames in order with [`process_frame`](Self::process_frame); each
/// call returns any swings completed by that frame. Call
/// [`finish`](Self::finish) at end of stream to drain the tail.
#[derive(Debug)]
pub struct SwingAnalyzer {
    computer: FeatureComputer,
    segmenter: SwingSegmenter,
    preprocessor: SequencePreprocessor,
    engine: QualityInferenceEngine,
    prev: Option<[Keypoint; JOINT_COUNT]>,
    prev2: Option<[Keypoint; JOINT_COUNT]>,
}

impl SwingAnalyzer {
    /// Create an analyzer, validating the configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let computer = FeatureComputer::new(config.confidence_threshold, config.frame_dt());
        let preprocessor = SequencePreprocessor::new(config.sequence_length, config.num_features);
        let engine = QualityInferenceEngine::new(&config);
        let segmenter = SwingSegmenter::new(config);
        Ok(Self {
            computer,
            segmenter,
            preprocessor,
            engine,
            prev: None,
            prev2: None,
        })
    }

    /// Whether the quality engine is model-backed
    pub fn is_model_loaded(&self) -> bool {
        self.engine.is_model_loaded()
    }

    /// Process one pose frame; returns analyses for any swings it completed.
    ///
    /// A frame that cannot be adapted (wrong keypoint count) is skipped and
    /// counts as a dropout; it never aborts the stream.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> Vec<SwingAnalysis> {
        let keypoints = match schema::adapt_frame(frame) {
            Ok(keypoints) => keypoints,
            Err(e) => {
                warn!(frame = frame.frame_index, error = %e, "skipping unusable frame");
                // Motion history is broken by the gap; restart it so the
                // next frame does not get a velocity across the hole.
                self.prev = None;
                self.prev2 = None;
                return self
                    .segmenter
                    .push_unusable(frame.frame_index)
                    .map(|segment| self.analyze_segment(segment))
                    .into_iter()
                    .collect();
            }
        };
        let derived = self
            .computer
            .compute(self.prev2.as_ref(), self.prev.as_ref(), &keypoints);

        let sample = FrameSample {
            frame_index: frame.frame_index,
            keypoints,
            velocities: derived.velocities,
            accelerations: derived.accelerations,
            angles: derived.angles,
            features: derived.vector,
            phase: None,
        };

        self.prev2 = self.prev.take();
        self.prev = Some(keypoints);

        let mut analyses = Vec::new();
        if let Some(segment) = self.segmenter.push(sample) {
            analyses.push(self.analyze_segment(segment));
        }
        analyses
    }

    /// Drain the segmenter at end of stream.
    pub fn finish(&mut self) -> Vec<SwingAnalysis> {
        self.prev = None;
        self.prev2 = None;
        self.segmenter
            .finish()
            .map(|segment| self.analyze_segment(segment))
            .into_iter()
            .collect()
    }

    /// Release the quality model session. Idempotent; the analyzer keeps
    /// working in heuristic mode afterwards.
    pub fn close(&mut self) {
        self.engine.close();
    }

    fn analyze_segment(&mut self, segment: SwingSegment) -> SwingAnalysis {
        let sequence = self.preprocessor.preprocess_segment(&segment);
        let quality = self.engine.run_inference(&sequence);

        info!(
            segment = %segment.id,
            frames = segment.len(),
            score = quality.score,
            from_model = quality.from_model,
            "swing analyzed"
        );

        SwingAnalysis {
            analysis_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            segment,
            quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawKeypoint, VideoMeta};
    use crate::types::Joint;
    use pretty_assertions::assert_eq;

    fn pose_frame(frame_index: u64, wrist_x: f32) -> PoseFrame {
        let mut keypoints = vec![
            RawKeypoint {
                x: 640.0,
                y: 400.0,
                confidence: 0.9
            };
            JOINT_COUNT
        ];
        keypoints[Joint::LeftShoulder.index()] = RawKeypoint { x: 600.0, y: 200.0, confidence: 0.9 };
        keypoints[Joint::RightShoulder.index()] = RawKeypoint { x: 700.0, y: 200.0, confidence: 0.9 };
        keypoints[Joint::LeftElbow.index()] = RawKeypoint { x: 580.0, y: 260.0, confidence: 0.9 };
        keypoints[Joint::RightElbow.index()] = RawKeypoint { x: 720.0, y: 260.0, confidence: 0.9 };
        keypoints[Joint::LeftWrist.index()] = RawKeypoint { x: 560.0, y: 320.0, confidence: 0.9 };
        keypoints[Joint::RightWrist.index()] = RawKeypoint { x: wrist_x, y: 320.0, confidence: 0.9 };
        PoseFrame {
            frame_index,
            keypoints,
        }
    }

    /// Right-wrist x positions tracing one full right-handed swing:
    /// slow backswing drift, fast forward swing, slow follow-through,
    /// then a drift back across the midline into preparation.
    fn swing_wrist_positions() -> Vec<f32> {
        let mut xs = Vec::new();
        for i in 0..12 {
            xs.push(780.0 + i as f32);
        }
        let mut x = 791.0;
        for _ in 0..8 {
            x -= 40.0;
            xs.push(x);
        }
        for _ in 0..7 {
            x += 2.0;
            xs.push(x);
        }
        while x <= 652.0 {
            x += 9.0;
            xs.push(x);
        }
        xs
    }

    fn swing_stream() -> PoseStream {
        PoseStream {
            video: VideoMeta {
                fps: 30.0,
                width: 1280.0,
                height: 720.0,
            },
            frames: swing_wrist_positions()
                .iter()
                .enumerate()
                .map(|(i, x)| pose_frame(i as u64, *x))
                .collect(),
        }
    }

    #[test]
    fn test_full_stream_produces_one_analysis() {
        let analyses = analyze_pose_stream(&swing_stream(), AnalysisConfig::default()).unwrap();
        assert_eq!(analyses.len(), 1);

        let analysis = &analyses[0];
        assert!(analysis.segment.len() >= 15);
        assert!(analysis.segment.phase_counts.backswing >= 10);
        assert!(analysis.segment.phase_counts.swing >= 5);
        assert!(analysis.segment.phase_counts.follow_through >= 5);
        assert!(analysis.segment.contact.is_some());
        assert!(analysis.quality.score >= 0.0 && analysis.quality.score <= 100.0);
        assert!(!analysis.quality.from_model);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let stream = swing_stream();
        let mut analyzer = SwingAnalyzer::new(AnalysisConfig {
            fps: 30.0,
            ..Default::default()
        })
        .unwrap();

        let mut streamed = Vec::new();
        for frame in &stream.frames {
            streamed.extend(analyzer.process_frame(frame));
        }
        streamed.extend(analyzer.finish());

        let one_shot = analyze_pose_stream(&stream, AnalysisConfig::default()).unwrap();
        assert_eq!(streamed.len(), one_shot.len());
        assert_eq!(
            streamed[0].segment.start_frame,
            one_shot[0].segment.start_frame
        );
        assert_eq!(streamed[0].quality.score, one_shot[0].quality.score);
    }

    #[test]
    fn test_empty_stream_yields_no_analyses() {
        let stream = PoseStream {
            video: VideoMeta {
                fps: 30.0,
                width: 1280.0,
                height: 720.0,
            },
            frames: vec![],
        };
        let analyses = analyze_pose_stream(&stream, AnalysisConfig::default()).unwrap();
        assert!(analyses.is_empty());
    }

    #[test]
    fn test_malformed_frame_does_not_abort_stream() {
        let mut analyzer = SwingAnalyzer::new(AnalysisConfig::default()).unwrap();
        let bad = PoseFrame {
            frame_index: 0,
            keypoints: vec![
                RawKeypoint {
                    x: 0.0,
                    y: 0.0,
                    confidence: 0.5
                };
                4
            ],
        };
        assert!(analyzer.process_frame(&bad).is_empty());

        // The rest of the stream still produces its swing
        let mut analyses = Vec::new();
        for (i, x) in swing_wrist_positions().iter().enumerate() {
            analyses.extend(analyzer.process_frame(&pose_frame(i as u64 + 1, *x)));
        }
        analyses.extend(analyzer.finish());
        assert_eq!(analyses.len(), 1);
    }

    #[test]
    fn test_malformed_frames_mid_stream_keep_earlier_swings() {
        let mut frames: Vec<PoseFrame> = swing_wrist_positions()
            .iter()
            .enumerate()
            .map(|(i, x)| pose_frame(i as u64, *x))
            .collect();
        let next = frames.len() as u64;
        frames.push(PoseFrame {
            frame_index: next,
            keypoints: vec![
                RawKeypoint {
                    x: 0.0,
                    y: 0.0,
                    confidence: 0.5
                };
                3
            ],
        });

        let stream = PoseStream {
            video: VideoMeta {
                fps: 30.0,
                width: 1280.0,
                height: 720.0,
            },
            frames,
        };
        let analyses = analyze_pose_stream(&stream, AnalysisConfig::default()).unwrap();
        assert_eq!(analyses.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = AnalysisConfig {
            sequence_length: 0,
            ..Default::default()
        };
        assert!(SwingAnalyzer::new(config).is_err());
    }

    #[test]
    fn test_close_twice_does_not_panic() {
        let mut analyzer = SwingAnalyzer::new(AnalysisConfig::default()).unwrap();
        analyzer.close();
        analyzer.close();
    }

    #[test]
    fn test_low_confidence_stream_yields_nothing() {
        let mut analyzer = SwingAnalyzer::new(AnalysisConfig::default()).unwrap();
        for i in 0..60u64 {
            let mut frame = pose_frame(i, 780.0);
            for kp in &mut frame.keypoints {
                kp.confidence = 0.05;
            }
            assert!(analyzer.process_frame(&frame).is_empty());
        }
        assert!(analyzer.finish().is_empty());
    }
}
