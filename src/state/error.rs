use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize encoder: {0}")]
    Encoder(#[source] anyhow::Error),

    #[error("Failed to initialize question/answer store: {0}")]
    Store(#[source] anyhow::Error),
}
