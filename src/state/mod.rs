use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, PipelineSettings};
use crate::embedding::{EmbeddingPipeline, HashingEncoder, TextEncoder};
use crate::qa::QaService;
use crate::store::{InMemoryVectorStore, SqliteQaStore};

pub mod error;

use error::InitializationError;

/// Wired application: configuration, stores and the QA service built on them.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: PipelineSettings,
    pub vectors: Arc<InMemoryVectorStore>,
    pub rows: Arc<SqliteQaStore>,
    pub qa: QaService,
}

impl AppState {
    /// Load settings, open the row store and build the pipeline around the
    /// hashing encoder.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let encoder: Arc<dyn TextEncoder> = Arc::new(
            HashingEncoder::new(settings.embedding.dimension)
                .map_err(|e| InitializationError::Encoder(e.into()))?,
        );
        Self::with_encoder(paths, config, settings, encoder).await
    }

    /// Same wiring as [`AppState::initialize`] with a caller-supplied encoder.
    pub async fn with_encoder(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: PipelineSettings,
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Arc<Self>, InitializationError> {
        let db_path = settings
            .store
            .db_path
            .clone()
            .unwrap_or_else(|| paths.db_path.clone());
        let rows = Arc::new(
            SqliteQaStore::with_path(db_path)
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );
        let vectors = Arc::new(InMemoryVectorStore::new(
            settings.embedding.dimension,
            settings.store.metric,
        ));

        let pipeline = EmbeddingPipeline::from_settings(encoder, &settings.embedding);
        let qa = QaService::new(pipeline, vectors.clone(), rows.clone())
            .with_field(settings.embedding.field)
            .with_top_k(settings.store.top_k);

        tracing::info!(
            dimension = settings.embedding.dimension,
            max_concurrency = settings.embedding.max_concurrency,
            metric = ?settings.store.metric,
            db = %rows.db_path().display(),
            "Pipeline initialized"
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            vectors,
            rows,
            qa,
        }))
    }
}
