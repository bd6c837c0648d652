//! Error types for the swing analysis engine

use thiserror::Error;

/// Errors that can occur during analysis.
///
/// These cover programmer-error-class misuse and boundary failures only.
/// Expected degenerate input data (low-confidence frames, segments that never
/// complete, NaN feature values) is masked or sanitized in place and never
/// surfaces as an error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to parse pose payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load model artifact: {0}")]
    ModelLoad(String),

    #[error("Model inference failed: {0}")]
    Inference(String),
}
