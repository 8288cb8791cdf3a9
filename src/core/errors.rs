use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("encode failed for batch {batch_index} (offset {offset}, len {len}): {message}")]
    Encode {
        batch_index: usize,
        offset: usize,
        len: usize,
        message: String,
    },
    #[error("dimension mismatch at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },
    #[error("store error: {0}")]
    Store(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Internal(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Store(err.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PipelineError::InvalidInput(message.into())
    }

    /// Whether re-running the whole `embed_all` call may succeed.
    ///
    /// Only encoder failures qualify; nothing inside the crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Encode { .. })
    }

    /// Batch offset carried by an encode failure.
    pub fn batch_offset(&self) -> Option<usize> {
        match self {
            PipelineError::Encode { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Store(err.to_string())
    }
}
