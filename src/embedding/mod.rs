//! Adaptive batch embedding generation.
//!
//! - `sizer`: derives the batch size from the dataset length
//! - `splitter`: cuts the input into ordered, tagged batches
//! - `encoder`: the `TextEncoder` contract and concurrent batch fan-out/fan-in
//! - `normalize`: L2 normalization and dimension checks
//! - `pipeline`: `EmbeddingPipeline::embed_all`, composing the above
//! - `hashing`: a deterministic feature-hashing encoder

pub mod encoder;
pub mod hashing;
pub mod normalize;
pub mod pipeline;
pub mod sizer;
pub mod splitter;


/// Fixed-length vector produced by an encoder for one text.
pub type Embedding = Vec<f32>;

pub use encoder::{ConcurrentEncoder, FnEncoder, TextEncoder};
pub use hashing::HashingEncoder;
pub use normalize::{check_dimensions, l2_normalize, normalize_all};
pub use pipeline::{BatchStrategy, EmbeddingOutput, EmbeddingPipeline, EmbeddingReport, PipelineStage};
pub use sizer::{plan_batches, BatchPlan};
pub use splitter::{split, Batch, BatchSpan, Batches};
