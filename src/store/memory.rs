use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SearchHit, VectorStore};
use crate::core::errors::PipelineError;
use crate::embedding::{check_dimensions, Embedding};
use crate::vector_math::{rank_by_metric, DistanceMetric};

/// Flat (brute-force) vector index held in memory.
pub struct InMemoryVectorStore {
    dimension: usize,
    metric: DistanceMetric,
    inner: RwLock<Entries>,
}

#[derive(Default)]
struct Entries {
    next_id: i64,
    ids: Vec<i64>,
    vectors: Vec<Embedding>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            inner: RwLock::new(Entries {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, vectors: Vec<Embedding>) -> Result<Vec<i64>, PipelineError> {
        check_dimensions(&vectors, Some(self.dimension))?;

        let mut entries = self.inner.write().await;
        let first = entries.next_id;
        let ids: Vec<i64> = (first..first + vectors.len() as i64).collect();
        entries.next_id += vectors.len() as i64;
        entries.ids.extend_from_slice(&ids);
        entries.vectors.extend(vectors);

        tracing::debug!(inserted = ids.len(), total = entries.ids.len(), "vectors stored");
        Ok(ids)
    }

    async fn delete(&self, ids: &[i64]) -> Result<usize, PipelineError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed: HashSet<i64> = ids.iter().copied().collect();

        let mut entries = self.inner.write().await;
        let Entries {
            ids: stored_ids,
            vectors,
            ..
        } = &mut *entries;
        let before = stored_ids.len();
        let mut position = 0;
        vectors.retain(|_| {
            let keep = !doomed.contains(&stored_ids[position]);
            position += 1;
            keep
        });
        stored_ids.retain(|id| !doomed.contains(id));
        let removed = before - stored_ids.len();

        tracing::debug!(removed, total = stored_ids.len(), "vectors deleted");
        Ok(removed)
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, PipelineError> {
        if query.len() != self.dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
                position: 0,
            });
        }

        let entries = self.inner.read().await;
        let ranked = rank_by_metric(self.metric, query, &entries.vectors)?;
        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(index, distance)| SearchHit {
                id: entries.ids[index],
                distance,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.inner.read().await.ids.len())
    }
}
