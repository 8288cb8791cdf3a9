use std::sync::Arc;

use serde::Serialize;

use super::dataset::{Dataset, TextField};
use crate::core::errors::PipelineError;
use crate::embedding::{l2_normalize, EmbeddingPipeline, EmbeddingReport};
use crate::store::{QaRow, QaStore, SearchHit, VectorStore};

pub const NO_ANSWER: &str = "Sorry, No answer found.";

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    /// Vector ids, aligned with the dataset records. Empty when skipped.
    pub ids: Vec<i64>,
    pub rows: usize,
    /// `None` when both stores already held the dataset and nothing was embedded.
    pub report: Option<EmbeddingReport>,
}

impl IngestSummary {
    pub fn skipped(&self) -> bool {
        self.report.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Questions of the nearest neighbours, closest first.
    pub similar_questions: Vec<String>,
    pub hits: Vec<SearchHit>,
}

impl Answer {
    pub fn found(&self) -> bool {
        !self.hits.is_empty() && self.answer != NO_ANSWER
    }
}

/// Ingestion (embed, store vectors, persist rows) and question answering.
#[derive(Clone)]
pub struct QaService {
    pipeline: EmbeddingPipeline,
    vectors: Arc<dyn VectorStore>,
    rows: Arc<dyn QaStore>,
    field: TextField,
    top_k: usize,
}

impl QaService {
    pub fn new(
        pipeline: EmbeddingPipeline,
        vectors: Arc<dyn VectorStore>,
        rows: Arc<dyn QaStore>,
    ) -> Self {
        Self {
            pipeline,
            vectors,
            rows,
            field: TextField::Question,
            top_k: 5,
        }
    }

    pub fn with_field(mut self, field: TextField) -> Self {
        self.field = field;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn pipeline(&self) -> &EmbeddingPipeline {
        &self.pipeline
    }

    /// Embed the dataset, store the vectors, then persist `(id, question, answer)` rows.
    ///
    /// Skipped when both stores already hold at least as many entries as the
    /// dataset. Rows left behind by an earlier vector index (the vector store is
    /// empty but rows exist) are cleared first so ids cannot collide. A failure
    /// after the vector insert removes the inserted vectors again, so the two
    /// stores stay co-indexed.
    pub async fn ingest(&self, dataset: &Dataset) -> Result<IngestSummary, PipelineError> {
        let stored_vectors = self.vectors.count().await?;
        let stored_rows = self.rows.count().await?;
        if stored_vectors >= dataset.len() && stored_rows >= dataset.len() {
            tracing::info!(
                vectors = stored_vectors,
                rows = stored_rows,
                "Dataset already stored, skipping embedding"
            );
            return Ok(IngestSummary {
                ids: Vec::new(),
                rows: 0,
                report: None,
            });
        }
        if stored_vectors == 0 && stored_rows > 0 {
            let cleared = self.rows.clear().await?;
            tracing::warn!(rows = cleared, "Cleared rows without matching vectors");
        }

        let texts = dataset.texts(self.field);
        let output = self.pipeline.embed_all(&texts).await?;

        let ids = self.vectors.insert(output.vectors).await?;
        let stored = match self.store_rows(&ids, dataset).await {
            Ok(stored) => stored,
            Err(err) => {
                self.rollback_vectors(&ids).await;
                return Err(err);
            }
        };
        tracing::info!(
            vectors = ids.len(),
            rows = stored,
            "Embeddings generated and stored"
        );

        Ok(IngestSummary {
            ids,
            rows: stored,
            report: Some(output.report),
        })
    }

    async fn store_rows(&self, ids: &[i64], dataset: &Dataset) -> Result<usize, PipelineError> {
        if ids.len() != dataset.len() {
            return Err(PipelineError::Store(format!(
                "vector store returned {} ids for {} embeddings",
                ids.len(),
                dataset.len()
            )));
        }
        self.rows.insert_rows(&format_rows(ids, dataset)).await
    }

    async fn rollback_vectors(&self, ids: &[i64]) {
        match self.vectors.delete(ids).await {
            Ok(removed) => tracing::warn!(removed, "Row store failed, vectors removed"),
            Err(err) => tracing::error!("Failed to remove vectors after row store failure: {}", err),
        }
    }

    /// Answer `question` from the closest stored question.
    pub async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::invalid("question is empty"));
        }

        let query = self.query_embedding(question).await?;
        let hits = self.vectors.search(&query, self.top_k).await?;
        let ids: Vec<String> = hits.iter().map(|hit| hit.id.to_string()).collect();
        let similar_questions = self.rows.lookup_questions(&ids).await?;
        tracing::debug!(?similar_questions, "similar questions");

        let answer = match similar_questions.first() {
            Some(best) => self
                .rows
                .answers_for_question(best)
                .await?
                .into_iter()
                .next()
                .unwrap_or_else(|| NO_ANSWER.to_string()),
            None => NO_ANSWER.to_string(),
        };

        Ok(Answer {
            answer,
            similar_questions,
            hits,
        })
    }

    async fn query_embedding(&self, question: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self
            .pipeline
            .encoder()
            .encode_batch(&[question.to_string()])
            .await?;
        let mut query = vectors.remove(0);
        if self.pipeline.normalizes() {
            l2_normalize(&mut query);
        }
        Ok(query)
    }
}

fn format_rows(ids: &[i64], dataset: &Dataset) -> Vec<QaRow> {
    ids.iter()
        .zip(dataset.records())
        .map(|(id, record)| QaRow {
            id: id.to_string(),
            question: record.question.clone(),
            answer: record.answer.clone(),
        })
        .collect()
}
