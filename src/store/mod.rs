//! Storage collaborators for the question-answering pipeline.
//!
//! - `VectorStore`: holds embeddings and answers nearest-neighbour queries
//! - `QaStore`: relational rows joining vector ids to question/answer text
//!
//! The embedding pipeline only produces the arguments for these; ingestion
//! and querying in `qa` drive them.

mod memory;
mod sqlite;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteQaStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::PipelineError;
use crate::embedding::Embedding;

/// One ranked match from a vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    /// Metric-specific distance; see `DistanceMetric` for the ordering.
    pub distance: f32,
}

/// A persisted `(id, question, answer)` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRow {
    /// Vector id, stored as text.
    pub id: String,
    pub question: String,
    pub answer: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert vectors, returning their assigned ids in input order.
    async fn insert(&self, vectors: Vec<Embedding>) -> Result<Vec<i64>, PipelineError>;

    /// Remove vectors by id, returning how many were present. Ids are never reused.
    async fn delete(&self, ids: &[i64]) -> Result<usize, PipelineError>;

    /// Closest `top_k` vectors to `query`, closest first.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, PipelineError>;

    /// Number of stored vectors.
    async fn count(&self) -> Result<usize, PipelineError>;
}

#[async_trait]
pub trait QaStore: Send + Sync {
    /// Persist rows atomically.
    async fn insert_rows(&self, rows: &[QaRow]) -> Result<usize, PipelineError>;

    /// Questions for `ids`, in the order of `ids`. Unknown ids are skipped.
    async fn lookup_questions(&self, ids: &[String]) -> Result<Vec<String>, PipelineError>;

    /// Drop every row, returning how many were removed.
    async fn clear(&self) -> Result<usize, PipelineError>;

    /// Answers stored for an exact question.
    async fn answers_for_question(&self, question: &str) -> Result<Vec<String>, PipelineError>;

    async fn count(&self) -> Result<usize, PipelineError>;
}
