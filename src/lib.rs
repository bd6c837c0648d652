//! swingscore: on-device tennis swing quality analysis.
//!
//! Turns a 2D pose keypoint stream (COCO-17 layout) into scored swing
//! analyses. The pipeline is deterministic and synchronous:
//!
//! 1. **Schema** – parse and sanitize the incoming pose stream.
//! 2. **Features** – per-frame velocities, accelerations, and joint angles
//!    folded into a fixed-layout feature vector.
//! 3. **Segmentation** – a forward-only phase state machine that cuts the
//!    stream into validated swing segments.
//! 4. **Contact** – multi-strategy consensus estimate of the ball-contact
//!    frame within each segment.
//! 5. **Preprocessing** – fixed-shape `[sequence_length × num_features]`
//!    tensor per segment.
//! 6. **Inference** – ONNX model scoring with finite-difference feature
//!    saliency, or a deterministic heuristic when no model is available.
//!
//! The result of every swing carries a provenance flag (`from_model`) so
//! consumers can distinguish model output from the heuristic fallback.
//!
//! ```no_run
//! use swingscore::{analyze_pose_stream, AnalysisConfig, PoseStream};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let json = std::fs::read_to_string("poses.json")?;
//! let stream = PoseStream::from_json(&json)?;
//! let analyses = analyze_pose_stream(&stream, AnalysisConfig::default())?;
//! for analysis in &analyses {
//!     println!("swing {}: {:.1}", analysis.segment.id, analysis.quality.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contact;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;
pub mod preprocess;
pub mod schema;
pub mod segmenter;
pub mod types;

pub use config::{AnalysisConfig, SaliencyConfig};
pub use error::AnalysisError;
pub use inference::QualityInferenceEngine;
pub use pipeline::{analyze_pose_stream, SwingAnalyzer};
pub use preprocess::{PreprocessedSequence, SequencePreprocessor};
pub use schema::{PoseFrame, PoseStream, VideoMeta};
pub use types::{
    ContactEstimate, FrameSample, Handedness, Joint, Keypoint, PhaseCounts, QualityResult,
    SwingAnalysis, SwingPhase, SwingSegment,
};

/// Engine version, from the crate version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped into exported analyses
pub const ENGINE_NAME: &str = "swingscore";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_nonempty() {
        assert!(!ENGINE_VERSION.is_empty());
        assert_eq!(ENGINE_NAME, "swingscore");
    }
}
