use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::qa::TextField;
use crate::vector_math::DistanceMetric;

/// Typed view over the merged `config.yml` + environment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub dataset: DatasetSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Vector length produced by the encoder.
    pub dimension: usize,
    /// Upper bound on concurrently running batch encodes.
    pub max_concurrency: usize,
    /// Fixed batch size; `None` selects the divisor sizer.
    pub batch_size: Option<usize>,
    /// Optional deadline applied to each batch encode call.
    pub batch_timeout_ms: Option<u64>,
    pub normalize: bool,
    /// Which dataset column gets embedded during ingestion.
    pub field: TextField,
}

impl EmbeddingSettings {
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimension: 768,
            max_concurrency: default_concurrency(),
            batch_size: None,
            batch_timeout_ms: None,
            normalize: true,
            field: TextField::Question,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub metric: DistanceMetric,
    pub top_k: usize,
    pub db_path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::InnerProduct,
            top_k: 5,
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    pub path: Option<PathBuf>,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
