//! End-to-end embedding run: size, split, encode concurrently, normalize.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::Instrument;

use super::encoder::{ConcurrentEncoder, TextEncoder};
use super::normalize::{check_dimensions, normalize_all};
use super::sizer::{plan_batches, BatchPlan};
use super::splitter::spans;
use super::Embedding;
use crate::core::config::EmbeddingSettings;
use crate::core::errors::PipelineError;

/// Lifecycle of a single `embed_all` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Idle,
    Sizing,
    Splitting,
    Encoding,
    Normalizing,
    Complete,
    Failed,
}

impl PipelineStage {
    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle | Complete | Failed, Sizing)
                | (Sizing, Splitting)
                | (Splitting, Encoding)
                | (Encoding, Normalizing)
                | (Normalizing, Complete)
                | (Sizing | Splitting | Encoding | Normalizing, Failed)
        )
    }
}

/// How batch sizes are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStrategy {
    /// Divisor search over the dataset length.
    #[default]
    Divisor,
    Fixed(usize),
}

impl BatchStrategy {
    fn plan(self, dataset_size: usize) -> Result<BatchPlan, PipelineError> {
        match self {
            BatchStrategy::Divisor => plan_batches(dataset_size),
            BatchStrategy::Fixed(size) => BatchPlan::fixed(dataset_size, size),
        }
    }
}

/// Throughput summary for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingReport {
    pub run_id: String,
    pub encoder: String,
    pub plan: BatchPlan,
    pub batch_count: usize,
    pub vectors: usize,
    pub dimension: usize,
    pub elapsed: Duration,
}

impl EmbeddingReport {
    pub fn vectors_per_ms(&self) -> f64 {
        let millis = self.elapsed.as_secs_f64() * 1_000.0;
        if millis <= 0.0 {
            return self.vectors as f64;
        }
        self.vectors as f64 / millis
    }
}

impl fmt::Display for EmbeddingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vectors (dim {}) in {} batches of {} via {} in {:.3} ms ({:.3} vectors/ms)",
            self.vectors,
            self.dimension,
            self.batch_count,
            self.plan.batch_size,
            self.encoder,
            self.elapsed.as_secs_f64() * 1_000.0,
            self.vectors_per_ms()
        )
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// One vector per input text, same order.
    pub vectors: Vec<Embedding>,
    pub report: EmbeddingReport,
}

/// Composes sizing, splitting, concurrent encoding and normalization.
///
/// No retries happen here: a failed run reports the failing batch and the
/// caller decides whether to call `embed_all` again with the same input.
///
/// Clones share one stage channel, so runs on a pipeline and its clones are
/// serialized: a second `embed_all` waits until the first has reached
/// `Complete` or `Failed`.
#[derive(Clone)]
pub struct EmbeddingPipeline {
    encoder: ConcurrentEncoder,
    strategy: BatchStrategy,
    normalize: bool,
    dimension: Option<usize>,
    stage: Arc<watch::Sender<PipelineStage>>,
    run_lock: Arc<Mutex<()>>,
}

impl EmbeddingPipeline {
    pub fn new(encoder: Arc<dyn TextEncoder>, max_concurrency: usize) -> Self {
        let (stage, _) = watch::channel(PipelineStage::Idle);
        Self {
            encoder: ConcurrentEncoder::new(encoder, max_concurrency),
            strategy: BatchStrategy::Divisor,
            normalize: true,
            dimension: None,
            stage: Arc::new(stage),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_settings(encoder: Arc<dyn TextEncoder>, settings: &EmbeddingSettings) -> Self {
        let strategy = settings
            .batch_size
            .map_or(BatchStrategy::Divisor, BatchStrategy::Fixed);
        let mut pipeline = Self::new(encoder, settings.max_concurrency)
            .with_strategy(strategy)
            .with_normalize(settings.normalize)
            .with_dimension(Some(settings.dimension));
        pipeline.encoder = pipeline.encoder.with_batch_timeout(settings.batch_timeout());
        pipeline
    }

    pub fn with_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Require every produced vector to have this length.
    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.encoder = self.encoder.with_batch_timeout(timeout);
        self
    }

    pub fn encoder(&self) -> &ConcurrentEncoder {
        &self.encoder
    }

    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.borrow()
    }

    /// Watch stage transitions of subsequent runs.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStage> {
        self.stage.subscribe()
    }

    /// Embed every text, returning vectors aligned index-for-index with `texts`.
    pub async fn embed_all(&self, texts: &[String]) -> Result<EmbeddingOutput, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("embed_all", run_id = %run_id, texts = texts.len());

        async {
            let _run = self.run_lock.lock().await;
            match self.run(texts, run_id).await {
                Ok(output) => {
                    self.advance(PipelineStage::Complete);
                    tracing::info!("Embeddings generated: {}", output.report);
                    Ok(output)
                }
                Err(err) => {
                    self.advance(PipelineStage::Failed);
                    tracing::error!("Embedding run failed: {}", err);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, texts: &[String], run_id: String) -> Result<EmbeddingOutput, PipelineError> {
        let started = Instant::now();

        self.advance(PipelineStage::Sizing);
        let plan = self.strategy.plan(texts.len())?;
        tracing::debug!(
            dataset_size = plan.dataset_size,
            batch_size = plan.batch_size,
            least_divisor = plan.least_divisor,
            exponent = plan.exponent,
            divisor = plan.divisor,
            remainder = plan.remainder,
            "batch plan"
        );

        self.advance(PipelineStage::Splitting);
        let batch_spans = spans(texts.len(), plan.batch_size)?;

        self.advance(PipelineStage::Encoding);
        let shared: Arc<[String]> = Arc::from(texts);
        let vectors = self.encoder.encode_spans(shared, &batch_spans).await?;
        if vectors.len() != texts.len() {
            return Err(PipelineError::internal(format!(
                "encoded {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let dimension = check_dimensions(&vectors, self.dimension)?.unwrap_or(0);

        self.advance(PipelineStage::Normalizing);
        let vectors = if self.normalize {
            normalize_all(vectors)
        } else {
            vectors
        };

        let report = EmbeddingReport {
            run_id,
            encoder: self.encoder.encoder().name().to_string(),
            plan,
            batch_count: batch_spans.len(),
            vectors: vectors.len(),
            dimension,
            elapsed: started.elapsed(),
        };
        Ok(EmbeddingOutput { vectors, report })
    }

    fn advance(&self, next: PipelineStage) {
        self.stage.send_modify(|stage| {
            if stage.can_advance_to(next) {
                tracing::debug!(from = ?stage, to = ?next, "pipeline stage");
                *stage = next;
            } else {
                tracing::warn!(from = ?stage, to = ?next, "ignored stage transition");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_transitions_follow_the_run_order() {
        use PipelineStage::*;
        assert!(Idle.can_advance_to(Sizing));
        assert!(Encoding.can_advance_to(Failed));
        assert!(Complete.can_advance_to(Sizing));
        assert!(!Idle.can_advance_to(Encoding));
        assert!(!Complete.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Complete));
    }

    #[test]
    fn strategy_selects_plan() {
        assert_eq!(BatchStrategy::Divisor.plan(10).unwrap().batch_size, 5);
        assert_eq!(BatchStrategy::Fixed(3).plan(10).unwrap().batch_count(), 4);
        assert!(BatchStrategy::Divisor.plan(0).is_err());
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        let report = EmbeddingReport {
            run_id: "r".to_string(),
            encoder: "e".to_string(),
            plan: plan_batches(4).unwrap(),
            batch_count: 1,
            vectors: 4,
            dimension: 2,
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.vectors_per_ms(), 4.0);
        assert!(report.to_string().contains("4 vectors"));
    }
}
