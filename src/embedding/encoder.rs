//! Embedding-function contract and concurrent batch fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use super::splitter::BatchSpan;
use super::Embedding;
use crate::core::errors::PipelineError;

/// An embedding model: text in, one fixed-length vector per text out.
///
/// A single instance is shared by every in-flight batch, so implementations
/// must tolerate concurrent `encode` calls. Wrap non-reentrant models in a
/// mutex or hand out one instance per worker.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Identifier for logging.
    fn name(&self) -> &str;

    /// Encode `batch`, returning vectors in input order.
    ///
    /// An empty result for a non-empty batch means the batch could not be encoded.
    async fn encode(&self, batch: &[String]) -> Result<Vec<Embedding>, PipelineError>;
}

/// Adapts a synchronous closure into a [`TextEncoder`].
pub struct FnEncoder<F> {
    name: String,
    func: F,
}

impl<F> FnEncoder<F>
where
    F: Fn(&[String]) -> Result<Vec<Embedding>, PipelineError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> TextEncoder for FnEncoder<F>
where
    F: Fn(&[String]) -> Result<Vec<Embedding>, PipelineError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn encode(&self, batch: &[String]) -> Result<Vec<Embedding>, PipelineError> {
        (self.func)(batch)
    }
}

/// Runs one encode task per batch, at most `max_concurrency` at a time, and
/// merges the results back into input order.
///
/// On the first failing batch the remaining tasks are aborted and the error
/// is returned; no partial result escapes.
#[derive(Clone)]
pub struct ConcurrentEncoder {
    encoder: Arc<dyn TextEncoder>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    batch_timeout: Option<Duration>,
}

impl ConcurrentEncoder {
    pub fn new(encoder: Arc<dyn TextEncoder>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            encoder,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            batch_timeout: None,
        }
    }

    /// Bound every batch call by `timeout`; an expired call fails its batch.
    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn encoder(&self) -> &Arc<dyn TextEncoder> {
        &self.encoder
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Encode `texts` as a single batch under the same permit pool and deadline
    /// as [`encode_spans`](Self::encode_spans).
    pub async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, PipelineError> {
        if texts.is_empty() {
            return Err(PipelineError::invalid("nothing to encode"));
        }
        let span = BatchSpan {
            index: 0,
            offset: 0,
            len: texts.len(),
        };
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| batch_error(span, format!("worker pool closed: {err}")))?;
        encode_one(self.encoder.as_ref(), texts, span, self.batch_timeout).await
    }

    /// Encode `texts` split along `spans`, returning one vector per text.
    pub async fn encode_spans(
        &self,
        texts: Arc<[String]>,
        spans: &[BatchSpan],
    ) -> Result<Vec<Embedding>, PipelineError> {
        validate_spans(texts.len(), spans)?;

        let mut tasks = JoinSet::new();
        let mut task_spans: HashMap<task::Id, BatchSpan> = HashMap::with_capacity(spans.len());
        for span in spans.iter().copied() {
            let encoder = Arc::clone(&self.encoder);
            let permits = Arc::clone(&self.permits);
            let texts = Arc::clone(&texts);
            let timeout = self.batch_timeout;

            let handle = tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => encode_one(encoder.as_ref(), &texts[span.range()], span, timeout).await,
                    Err(err) => Err(batch_error(span, format!("worker pool closed: {err}"))),
                };
                (span.index, result)
            });
            task_spans.insert(handle.id(), span);
        }

        let mut parts: Vec<(usize, Vec<Embedding>)> = Vec::with_capacity(spans.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    let failure = match task_spans.get(&err.id()) {
                        Some(span) if err.is_panic() => batch_error(*span, "encoder panicked".to_string()),
                        Some(span) => batch_error(*span, format!("batch task cancelled: {err}")),
                        None => PipelineError::internal(err),
                    };
                    tracing::warn!("batch task failed, aborting remaining: {}", failure);
                    tasks.abort_all();
                    return Err(failure);
                }
            };
            match result {
                Ok(vectors) => {
                    tracing::debug!(
                        batch = index,
                        vectors = vectors.len(),
                        "batch encoded"
                    );
                    parts.push((index, vectors));
                }
                Err(err) => {
                    tracing::warn!(batch = index, "batch failed, aborting remaining: {}", err);
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        // Completion order is arbitrary; the batch index restores input order.
        parts.sort_unstable_by_key(|(index, _)| *index);
        Ok(parts.into_iter().flat_map(|(_, vectors)| vectors).collect())
    }
}

async fn encode_one(
    encoder: &dyn TextEncoder,
    batch: &[String],
    span: BatchSpan,
    timeout: Option<Duration>,
) -> Result<Vec<Embedding>, PipelineError> {
    let call = encoder.encode(batch);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(batch_error(
                    span,
                    format!("timed out after {} ms", limit.as_millis()),
                ))
            }
        },
        None => call.await,
    };

    // Batch position always comes from the span, never from the encoder.
    let vectors = outcome.map_err(|err| match err {
        PipelineError::Encode { message, .. } => batch_error(span, message),
        other => batch_error(span, other.to_string()),
    })?;

    if vectors.is_empty() {
        return Err(batch_error(span, "encoder returned no embeddings".to_string()));
    }
    if vectors.len() != span.len {
        return Err(batch_error(
            span,
            format!(
                "encoder returned {} embeddings for {} inputs",
                vectors.len(),
                span.len
            ),
        ));
    }
    Ok(vectors)
}

fn batch_error(span: BatchSpan, message: String) -> PipelineError {
    PipelineError::Encode {
        batch_index: span.index,
        offset: span.offset,
        len: span.len,
        message,
    }
}

/// Spans must tile `0..len` exactly, in index order, with no empty batch.
fn validate_spans(len: usize, spans: &[BatchSpan]) -> Result<(), PipelineError> {
    let mut expected_offset = 0;
    for (position, span) in spans.iter().enumerate() {
        if span.index != position || span.offset != expected_offset || span.len == 0 {
            return Err(PipelineError::invalid(format!(
                "malformed batch boundary at batch {position}: {span:?}"
            )));
        }
        expected_offset += span.len;
    }
    if expected_offset != len {
        return Err(PipelineError::invalid(format!(
            "batches cover {expected_offset} of {len} items"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::splitter::spans;

    fn texts(n: usize) -> Arc<[String]> {
        (0..n).map(|i| format!("text-{i}")).collect::<Vec<_>>().into()
    }

    fn index_encoder() -> Arc<dyn TextEncoder> {
        Arc::new(FnEncoder::new("index", |batch: &[String]| {
            Ok(batch
                .iter()
                .map(|text| {
                    let n: f32 = text.trim_start_matches("text-").parse().unwrap_or(-1.0);
                    vec![n, 1.0]
                })
                .collect())
        }))
    }

    #[tokio::test]
    async fn merges_batches_in_input_order() {
        let encoder = ConcurrentEncoder::new(index_encoder(), 3);
        let input = texts(10);
        let spans = spans(input.len(), 3).unwrap();

        let vectors = encoder.encode_spans(input, &spans).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn rejects_spans_that_do_not_tile_the_input() {
        let encoder = ConcurrentEncoder::new(index_encoder(), 2);
        let gap = [
            BatchSpan { index: 0, offset: 0, len: 2 },
            BatchSpan { index: 1, offset: 3, len: 2 },
        ];
        let err = encoder.encode_spans(texts(5), &gap).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        let short = [BatchSpan { index: 0, offset: 0, len: 4 }];
        assert!(encoder.encode_spans(texts(5), &short).await.is_err());
    }

    #[tokio::test]
    async fn empty_result_fails_the_batch() {
        let encoder = ConcurrentEncoder::new(
            Arc::new(FnEncoder::new("null", |_batch: &[String]| Ok(Vec::new()))),
            2,
        );
        let err = encoder
            .encode_spans(texts(4), &spans(4, 2).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encode { len: 2, .. }));
    }

    #[tokio::test]
    async fn short_result_fails_the_batch() {
        let encoder = ConcurrentEncoder::new(
            Arc::new(FnEncoder::new("short", |_batch: &[String]| Ok(vec![vec![1.0]]))),
            2,
        );
        let err = encoder
            .encode_spans(texts(3), &spans(3, 3).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 3 inputs"));
    }

    struct SlowEncoder;

    #[async_trait]
    impl TextEncoder for SlowEncoder {
        fn name(&self) -> &str {
            "slow"
        }

        async fn encode(&self, batch: &[String]) -> Result<Vec<Embedding>, PipelineError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(batch.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn batch_timeout_is_reported_as_encode_error() {
        let encoder = ConcurrentEncoder::new(Arc::new(SlowEncoder), 2)
            .with_batch_timeout(Some(Duration::from_millis(10)));
        let err = encoder
            .encode_spans(texts(2), &spans(2, 1).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn panicking_encoder_fails_its_own_batch() {
        let encoder = ConcurrentEncoder::new(
            Arc::new(FnEncoder::new("panicky", |batch: &[String]| {
                if batch.iter().any(|text| text == "text-4") {
                    panic!("tokenizer exploded");
                }
                Ok(batch.iter().map(|_| vec![1.0]).collect())
            })),
            2,
        );
        let err = encoder
            .encode_spans(texts(6), &spans(6, 2).unwrap())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        match err {
            PipelineError::Encode {
                batch_index,
                offset,
                len,
                message,
            } => {
                assert_eq!((batch_index, offset, len), (2, 4, 2));
                assert!(message.contains("panicked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn single_batch_encode_checks_count_and_deadline() {
        let encoder = ConcurrentEncoder::new(index_encoder(), 1);
        let vectors = encoder.encode_batch(&["text-7".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![7.0, 1.0]]);
        assert!(encoder.encode_batch(&[]).await.is_err());

        let slow = ConcurrentEncoder::new(Arc::new(SlowEncoder), 1)
            .with_batch_timeout(Some(Duration::from_millis(10)));
        let err = slow.encode_batch(&["q".to_string()]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Encode { len: 1, .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
