use ndarray::ArrayViewMut1;

use super::Embedding;
use crate::core::errors::PipelineError;

/// Scale `vector` in place to unit L2 norm. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let mut view = ArrayViewMut1::from(vector);
    let norm = view
        .iter()
        .map(|value| f64::from(*value).powi(2))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    view.mapv_inplace(|value| (f64::from(value) / norm) as f32);
}

/// Normalize every vector, keeping count, order and dimension.
pub fn normalize_all(mut vectors: Vec<Embedding>) -> Vec<Embedding> {
    for vector in &mut vectors {
        l2_normalize(vector);
    }
    vectors
}

/// Check that every vector has the same length, returning that length.
///
/// `expected` pins the dimension up front; otherwise the first vector sets it.
pub fn check_dimensions(
    vectors: &[Embedding],
    expected: Option<usize>,
) -> Result<Option<usize>, PipelineError> {
    let mut dimension = expected;
    for (position, vector) in vectors.iter().enumerate() {
        match dimension {
            None => dimension = Some(vector.len()),
            Some(expected) if expected != vector.len() => {
                return Err(PipelineError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                    position,
                })
            }
            Some(_) => {}
        }
    }
    Ok(dimension)
}
