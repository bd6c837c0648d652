//! Sequence preprocessing
//!
//! Transforms a segment's per-frame feature vectors into a fixed-shape
//! tensor suitable for model input: frames beyond the sequence length are
//! truncated (earliest retained), shortfall is zero-padded, and every scalar
//! is sanitized and clamped. Pure and deterministic; malformed numerics are
//! masked, never raised.

use crate::types::SwingSegment;
use ndarray::Array2;

/// Symmetric clamp bound applied to every scalar
pub const VALUE_CLAMP: f32 = 1000.0;

/// Fixed-shape [sequence_length × num_features] tensor for one swing
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedSequence {
    data: Array2<f32>,
}

impl PreprocessedSequence {
    /// Tensor shape as (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[0], shape[1])
    }

    /// Borrow the underlying tensor
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Consume into the underlying tensor
    pub fn into_data(self) -> Array2<f32> {
        self.data
    }
}

/// Builds fixed-shape sequences from variable-length segments
#[derive(Debug, Clone)]
pub struct SequencePreprocessor {
    sequence_length: usize,
    num_features: usize,
}

impl SequencePreprocessor {
    pub fn new(sequence_length: usize, num_features: usize) -> Self {
        Self {
            sequence_length,
            num_features,
        }
    }

    /// Preprocess a completed segment's feature vectors.
    pub fn preprocess_segment(&self, segment: &SwingSegment) -> PreprocessedSequence {
        let rows: Vec<&[f32]> = segment.frames.iter().map(|f| f.features.as_slice()).collect();
        self.preprocess(&rows)
    }

    /// Preprocess raw feature rows into the fixed shape.
    pub fn preprocess(&self, rows: &[&[f32]]) -> PreprocessedSequence {
        let mut data = Array2::zeros((self.sequence_length, self.num_features));
        for (t, row) in rows.iter().take(self.sequence_length).enumerate() {
            for (f, value) in row.iter().take(self.num_features).enumerate() {
                data[[t, f]] = sanitize(*value);
            }
        }
        PreprocessedSequence { data }
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-VALUE_CLAMP, VALUE_CLAMP)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LEN: usize = 90;
    const FEATURES: usize = 32;

    fn rows_of(count: usize, fill: f32) -> Vec<Vec<f32>> {
        (0..count).map(|_| vec![fill; FEATURES]).collect()
    }

    fn preprocess(rows: &[Vec<f32>]) -> PreprocessedSequence {
        let borrowed: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        SequencePreprocessor::new(LEN, FEATURES).preprocess(&borrowed)
    }

    #[test]
    fn test_shape_is_fixed_for_all_input_lengths() {
        for count in [1, LEN - 1, LEN, LEN + 50] {
            let rows = rows_of(count, 1.5);
            let sequence = preprocess(&rows);
            assert_eq!(sequence.shape(), (LEN, FEATURES), "input length {count}");
        }
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let rows = rows_of(10, 2.0);
        let sequence = preprocess(&rows);
        assert_eq!(sequence.data()[[9, 0]], 2.0);
        assert_eq!(sequence.data()[[10, 0]], 0.0);
        assert_eq!(sequence.data()[[LEN - 1, FEATURES - 1]], 0.0);
    }

    #[test]
    fn test_long_input_keeps_earliest_frames() {
        let mut rows = rows_of(LEN + 50, 0.0);
        for (i, row) in rows.iter_mut().enumerate() {
            row[0] = i as f32;
        }
        let sequence = preprocess(&rows);
        assert_eq!(sequence.data()[[0, 0]], 0.0);
        assert_eq!(sequence.data()[[LEN - 1, 0]], (LEN - 1) as f32);
    }

    #[test]
    fn test_nan_and_infinity_sanitized() {
        let mut rows = rows_of(3, 1.0);
        rows[0][0] = f32::NAN;
        rows[1][1] = f32::INFINITY;
        rows[2][2] = f32::NEG_INFINITY;
        let sequence = preprocess(&rows);
        assert_eq!(sequence.data()[[0, 0]], 0.0);
        assert_eq!(sequence.data()[[1, 1]], 0.0);
        assert_eq!(sequence.data()[[2, 2]], 0.0);
        assert!(sequence.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_values_clamped_to_symmetric_range() {
        let mut rows = rows_of(2, 0.0);
        rows[0][0] = 1e9;
        rows[1][0] = -1e9;
        let sequence = preprocess(&rows);
        assert_eq!(sequence.data()[[0, 0]], VALUE_CLAMP);
        assert_eq!(sequence.data()[[1, 0]], -VALUE_CLAMP);
    }

    #[test]
    fn test_ragged_rows_handled() {
        let short: Vec<f32> = vec![5.0; 4];
        let long: Vec<f32> = vec![7.0; FEATURES + 10];
        let rows: Vec<&[f32]> = vec![short.as_slice(), long.as_slice()];
        let sequence = SequencePreprocessor::new(LEN, FEATURES).preprocess(&rows);
        assert_eq!(sequence.data()[[0, 3]], 5.0);
        assert_eq!(sequence.data()[[0, 4]], 0.0);
        assert_eq!(sequence.data()[[1, FEATURES - 1]], 7.0);
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let sequence = SequencePreprocessor::new(LEN, FEATURES).preprocess(&[]);
        assert_eq!(sequence.shape(), (LEN, FEATURES));
        assert!(sequence.data().iter().all(|v| *v == 0.0));
    }
}
