//! Quality inference
//!
//! Scores a preprocessed swing tensor and attributes per-feature importance.
//! Two modes share one result shape:
//!
//! - **Model-backed**: an ONNX forward pass yields the base score;
//!   importance comes from finite-difference saliency at a few sampled
//!   frames. Any runtime failure is caught per call and falls back.
//! - **Heuristic**: importance is normalized temporal variance per feature;
//!   the score is a base plus capped bonuses from named motion features.
//!
//! The engine owns its model session exclusively; `close` is idempotent.

use crate::config::{AnalysisConfig, SaliencyConfig};
use crate::error::AnalysisError;
use crate::features;
use crate::preprocess::PreprocessedSequence;
use crate::types::{Handedness, QualityResult};
use ndarray::{Array2, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Model input tensor name (fixed by the training exporter)
const INPUT_NAME: &str = "features";
/// Model output tensor name
const OUTPUT_NAME: &str = "quality_score";

/// Base score for the heuristic fallback
const HEURISTIC_BASE_SCORE: f64 = 50.0;

/// Scores swing tensors, model-backed when an artifact is loaded
pub struct QualityInferenceEngine {
    session: Option<Session>,
    saliency: SaliencyConfig,
    handedness: Handedness,
}

impl std::fmt::Debug for QualityInferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityInferenceEngine")
            .field("model_loaded", &self.session.is_some())
            .field("saliency", &self.saliency)
            .field("handedness", &self.handedness)
            .finish()
    }
}

impl QualityInferenceEngine {
    /// Create an engine from the configuration.
    ///
    /// A missing or corrupt model artifact is logged and the engine
    /// continues in heuristic mode; it is not an error.
    pub fn new(config: &AnalysisConfig) -> Self {
        let session = match &config.model_path {
            Some(path) => match load_session(path) {
                Ok(session) => {
                    info!(path = %path.display(), "quality model loaded");
                    Some(session)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "model unavailable, running in heuristic mode");
                    None
                }
            },
            None => None,
        };
        Self {
            session,
            saliency: config.saliency.clone(),
            handedness: config.handedness,
        }
    }

    /// Whether a model artifact backs this engine
    pub fn is_model_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Score a preprocessed sequence.
    ///
    /// Never fails: a model-mode inference error is logged and the call is
    /// served by the heuristic instead, flagged via `from_model`.
    pub fn run_inference(&mut self, sequence: &PreprocessedSequence) -> QualityResult {
        if self.session.is_some() {
            match self.model_result(sequence) {
                Ok(result) => return result,
                Err(e) => {
                    warn!(error = %e, "model inference failed, using heuristic fallback");
                }
            }
        }
        self.heuristic_result(sequence)
    }

    /// Release the model session. Idempotent; later calls score
    /// heuristically.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("model session released");
        }
    }

    fn model_result(
        &mut self,
        sequence: &PreprocessedSequence,
    ) -> Result<QualityResult, AnalysisError> {
        let base = self.forward(sequence.data())?;
        let feature_importance = self.saliency_importance(sequence.data(), base)?;
        Ok(QualityResult {
            score: base,
            feature_importance,
            from_model: true,
        })
    }

    /// One forward pass: [L × F] → [1 × L × F] → rescaled score.
    fn forward(&mut self, data: &Array2<f32>) -> Result<f64, AnalysisError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| AnalysisError::Inference("no model session".to_string()))?;

        let input = data.clone().insert_axis(Axis(0));
        let tensor = Tensor::from_array(input)
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![INPUT_NAME => tensor])
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;
        let value = require_output(outputs.get(OUTPUT_NAME), OUTPUT_NAME)?;
        let view: ndarray::ArrayViewD<f32> = value
            .try_extract_array()
            .map_err(|e| AnalysisError::Inference(e.to_string()))?;
        let raw = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| AnalysisError::Inference("empty model output".to_string()))?;

        if !raw.is_finite() {
            return Err(AnalysisError::Inference(
                "non-finite model output".to_string(),
            ));
        }
        Ok(rescale_score(raw as f64))
    }

    /// Finite-difference saliency at the configured sample frames.
    fn saliency_importance(
        &mut self,
        data: &Array2<f32>,
        base_score: f64,
    ) -> Result<HashMap<String, f64>, AnalysisError> {
        let rows = sample_rows(data.nrows(), &self.saliency.sample_points);
        let epsilon = self.saliency.epsilon;
        let num_features = data.ncols();

        let mut raw = vec![0.0f64; num_features];
        for feature in 0..num_features {
            let mut total = 0.0;
            for &row in &rows {
                let mut perturbed = data.clone();
                perturbed[[row, feature]] += epsilon;
                let score = self.forward(&perturbed)?;
                total += (score - base_score).abs() / f64::from(epsilon);
            }
            raw[feature] = total / rows.len() as f64;
        }

        Ok(named_importance(&min_max_normalize(&raw)))
    }

    /// Deterministic fallback: variance-based importance with a capped
    /// bonus score. The exact weights are a replaceable convention, not a
    /// calibrated model.
    fn heuristic_result(&self, sequence: &PreprocessedSequence) -> QualityResult {
        let data = sequence.data();
        let variances: Vec<f64> = (0..data.ncols())
            .map(|f| column_variance(data, f))
            .collect();

        let feature_importance = named_importance(&min_max_normalize(&variances));

        let side = match self.handedness {
            Handedness::Left => "Left",
            Handedness::Right => "Right",
        };
        let variance_of = |name: String| -> f64 {
            features::feature_index(&name)
                .and_then(|i| variances.get(i))
                .copied()
                .unwrap_or(0.0)
        };

        let wrist_bonus = (variance_of(format!("{side} Wrist Velocity")).sqrt() * 0.05).min(20.0);
        let shoulder_bonus = (variance_of(format!("{side} Shoulder Angle")).sqrt() * 0.5).min(15.0);
        let hip_bonus = (variance_of(format!("{side} Hip Angle")).sqrt() * 0.5).min(15.0);

        let score = (HEURISTIC_BASE_SCORE + wrist_bonus + shoulder_bonus + hip_bonus)
            .clamp(0.0, 100.0);

        QualityResult {
            score,
            feature_importance,
            from_model: false,
        }
    }
}

impl Drop for QualityInferenceEngine {
    fn drop(&mut self) {
        self.close();
    }
}

fn load_session(path: &Path) -> Result<Session, AnalysisError> {
    Session::builder()
        .map_err(|e| AnalysisError::ModelLoad(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| AnalysisError::ModelLoad(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| AnalysisError::ModelLoad(e.to_string()))
}

/// Resolve a named model output; absence is an inference error, never a
/// panic, so the caller's heuristic fallback can serve the swing.
fn require_output<T>(value: Option<T>, name: &str) -> Result<T, AnalysisError> {
    value.ok_or_else(|| AnalysisError::Inference(format!("model output '{name}' not found")))
}

/// Rescale a raw model rating (NTRP 1.0–7.0 scale) to [0, 100]
fn rescale_score(raw: f64) -> f64 {
    ((raw - 1.0) / 6.0 * 100.0).clamp(0.0, 100.0)
}

/// Distinct row indices at the given fractions through the sequence
fn sample_rows(len: usize, fractions: &[f32]) -> Vec<usize> {
    if len == 0 {
        return vec![0];
    }
    let mut rows: Vec<usize> = fractions
        .iter()
        .map(|p| (((len - 1) as f32) * p.clamp(0.0, 1.0)).round() as usize)
        .collect();
    rows.sort_unstable();
    rows.dedup();
    rows
}

/// Min-max normalize into [0, 1]; a flat input maps to all zeros
fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || (max - min) < 1e-12 {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|v| {
            if v.is_finite() {
                ((v - min) / (max - min)).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Map normalized importances onto the feature name table
fn named_importance(values: &[f64]) -> HashMap<String, f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let name = features::feature_name(i).unwrap_or_else(|| format!("Feature {i}"));
            (name, *v)
        })
        .collect()
}

/// Population variance of one tensor column
fn column_variance(data: &Array2<f32>, column: usize) -> f64 {
    let n = data.nrows();
    if n == 0 {
        return 0.0;
    }
    let mut mean = 0.0f64;
    for t in 0..n {
        mean += f64::from(data[[t, column]]);
    }
    mean /= n as f64;
    let mut variance = 0.0f64;
    for t in 0..n {
        let d = f64::from(data[[t, column]]) - mean;
        variance += d * d;
    }
    variance / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::SequencePreprocessor;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const LEN: usize = 90;

    fn engine() -> QualityInferenceEngine {
        QualityInferenceEngine::new(&AnalysisConfig::default())
    }

    fn preprocess(rows: &[Vec<f32>]) -> PreprocessedSequence {
        let borrowed: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        SequencePreprocessor::new(LEN, features::num_features()).preprocess(&borrowed)
    }

    /// Deterministic pseudo-noise rows (no RNG dependency needed in tests)
    fn noise_rows(count: usize) -> Vec<Vec<f32>> {
        let mut state: u32 = 0x2545_f491;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 400.0 - 200.0
        };
        (0..count)
            .map(|_| (0..features::num_features()).map(|_| next()).collect())
            .collect()
    }

    #[test]
    fn test_no_model_means_heuristic_mode() {
        let mut engine = engine();
        assert!(!engine.is_model_loaded());
        let result = engine.run_inference(&preprocess(&noise_rows(40)));
        assert!(!result.from_model);
    }

    #[test]
    fn test_missing_model_file_falls_back_quietly() {
        let config = AnalysisConfig {
            model_path: Some(PathBuf::from("/nonexistent/quality.onnx")),
            ..Default::default()
        };
        let engine = QualityInferenceEngine::new(&config);
        assert!(!engine.is_model_loaded());
    }

    #[test]
    fn test_score_in_range_for_zero_input() {
        let mut engine = engine();
        let result = engine.run_inference(&preprocess(&[]));
        assert!(result.score >= 0.0 && result.score <= 100.0);
        assert!(result.score.is_finite());
        assert!(!result.from_model);
    }

    #[test]
    fn test_score_in_range_for_noise_input() {
        let mut engine = engine();
        let result = engine.run_inference(&preprocess(&noise_rows(LEN)));
        assert!(result.score >= 0.0 && result.score <= 100.0);
        assert!(result.feature_importance.values().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_heuristic_importance_names_reference_joints() {
        let mut engine = engine();
        let result = engine.run_inference(&preprocess(&noise_rows(40)));
        let keys: Vec<&str> = result
            .feature_importance
            .keys()
            .map(String::as_str)
            .collect();
        assert!(keys.iter().any(|k| k.contains("Wrist")));
        assert!(keys.iter().any(|k| k.contains("Shoulder")));
        assert!(keys.iter().any(|k| k.contains("Elbow")));
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let mut engine = engine();
        let sequence = preprocess(&noise_rows(LEN));
        let a = engine.run_inference(&sequence);
        let b = engine.run_inference(&sequence);
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_input_yields_empty_variance_importance() {
        let mut engine = engine();
        let result = engine.run_inference(&preprocess(&[]));
        assert_eq!(result.feature_importance.len(), features::num_features());
        assert!(result.feature_importance.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut engine = engine();
        engine.close();
        engine.close();
        // Closed engine still serves heuristic results
        let result = engine.run_inference(&preprocess(&noise_rows(10)));
        assert!(!result.from_model);
    }

    #[test]
    fn test_missing_named_output_is_an_inference_error() {
        assert_eq!(require_output(Some(7), OUTPUT_NAME).unwrap(), 7);
        let err = require_output::<u32>(None, OUTPUT_NAME).unwrap_err();
        assert!(matches!(err, AnalysisError::Inference(_)));
        assert!(err.to_string().contains(OUTPUT_NAME));
    }

    #[test]
    fn test_rescale_score() {
        assert_eq!(rescale_score(1.0), 0.0);
        assert_eq!(rescale_score(4.0), 50.0);
        assert_eq!(rescale_score(7.0), 100.0);
        assert_eq!(rescale_score(-3.0), 0.0);
        assert_eq!(rescale_score(42.0), 100.0);
    }

    #[test]
    fn test_sample_rows_dedup_and_bounds() {
        assert_eq!(sample_rows(90, &[0.25, 0.5, 0.75]), vec![22, 45, 67]);
        assert_eq!(sample_rows(2, &[0.25, 0.5, 0.75]), vec![0, 1]);
        assert_eq!(sample_rows(1, &[0.25, 0.5, 0.75]), vec![0]);
    }

    #[test]
    fn test_min_max_normalize() {
        assert_eq!(min_max_normalize(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(min_max_normalize(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(min_max_normalize(&[1.0, f64::NAN, 2.0]), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_column_variance() {
        let mut data = Array2::<f32>::zeros((4, 2));
        data[[0, 1]] = 2.0;
        data[[1, 1]] = 4.0;
        data[[2, 1]] = 6.0;
        data[[3, 1]] = 8.0;
        assert_eq!(column_variance(&data, 0), 0.0);
        assert!((column_variance(&data, 1) - 5.0).abs() < 1e-9);
    }
}
