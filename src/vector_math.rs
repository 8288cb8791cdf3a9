use std::cmp::Ordering;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;

/// Distance used by the vector store when ranking neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Inner product; larger is closer. Equals cosine on unit vectors.
    #[serde(rename = "IP")]
    InnerProduct,
    /// Euclidean distance; smaller is closer.
    #[serde(rename = "L2")]
    L2,
}

impl DistanceMetric {
    pub fn distance(self, query: &[f32], candidate: &[f32]) -> Result<f32, PipelineError> {
        check_pair(query, candidate)?;
        let query = ArrayView1::from(query);
        let candidate = ArrayView1::from(candidate);
        Ok(match self {
            DistanceMetric::InnerProduct => query.dot(&candidate),
            DistanceMetric::L2 => {
                let diff = &query - &candidate;
                diff.dot(&diff).sqrt()
            }
        })
    }

    /// Orders two distances so that the closer one sorts first.
    pub fn compare(self, left: f32, right: f32) -> Ordering {
        match self {
            DistanceMetric::InnerProduct => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
            DistanceMetric::L2 => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        }
    }
}

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, PipelineError> {
    check_pair(query, candidate)?;
    let query = ArrayView1::from(query);
    let candidate = ArrayView1::from(candidate);

    let dot = query.dot(&candidate);
    let denom = query.dot(&query).sqrt() * candidate.dot(&candidate).sqrt();
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

/// Ranks candidates closest-first under `metric`, returning `(index, distance)`.
pub fn rank_by_metric(
    metric: DistanceMetric,
    query: &[f32],
    candidates: &[Vec<f32>],
) -> Result<Vec<(usize, f32)>, PipelineError> {
    let mut scores = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.iter().enumerate() {
        scores.push((idx, metric.distance(query, candidate)?));
    }

    scores.sort_by(|left, right| metric.compare(left.1, right.1).then(left.0.cmp(&right.0)));
    Ok(scores)
}

fn check_pair(query: &[f32], candidate: &[f32]) -> Result<(), PipelineError> {
    if query.is_empty() || candidate.is_empty() {
        return Err(PipelineError::invalid("Vectors must not be empty"));
    }
    if query.len() != candidate.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: query.len(),
            actual: candidate.len(),
            position: 0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        let score = cosine_similarity(&vec, &vec).expect("cosine should work");
        assert!(approx_eq(score, 1.0));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let score = cosine_similarity(&[0.0, 0.0], &[0.0, 1.0]).expect("cosine should work");
        assert!(approx_eq(score, 0.0));
    }

    #[test]
    fn l2_distance_matches_pythagoras() {
        let d = DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!(approx_eq(d, 5.0));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = DistanceMetric::InnerProduct
            .distance(&[1.0, 0.0], &[1.0])
            .unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    }

    #[test]
    fn ranking_orders_closest_first_for_each_metric() {
        let query = vec![1.0, 0.0];
        let candidates = vec![vec![0.8, 0.2], vec![0.1, 0.9], vec![1.0, 0.0]];

        let by_ip = rank_by_metric(DistanceMetric::InnerProduct, &query, &candidates).unwrap();
        assert_eq!(by_ip[0].0, 2);
        assert_eq!(by_ip[2].0, 1);

        let by_l2 = rank_by_metric(DistanceMetric::L2, &query, &candidates).unwrap();
        assert_eq!(by_l2[0].0, 2);
        assert!(approx_eq(by_l2[0].1, 0.0));
        assert_eq!(by_l2[2].0, 1);
    }
}
