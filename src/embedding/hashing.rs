//! Feature-hashing text encoder.
//!
//! Cleans the text, splits it into words and hashes each word into one of
//! `dimension` buckets with an alternating sign. Deterministic and stateless,
//! so it is safe to share across concurrent batch tasks.

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::encoder::TextEncoder;
use super::Embedding;
use crate::core::errors::PipelineError;

const PUNCTUATION: &str = r#"!()-[]{};:'"\,<>./?@#$%^&*_~"#;
const STOP_WORDS: [&str; 6] = ["the", "a", "and", "is", "be", "will"];

pub struct HashingEncoder {
    dimension: usize,
    url_pattern: Regex,
    tag_pattern: Regex,
    possessive_pattern: Regex,
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Result<Self, PipelineError> {
        if dimension == 0 {
            return Err(PipelineError::invalid("embedding dimension must be positive"));
        }
        Ok(Self {
            dimension,
            url_pattern: Regex::new(r"https?://\S+|www\.\S+").map_err(PipelineError::internal)?,
            tag_pattern: Regex::new(r"<.*?>").map_err(PipelineError::internal)?,
            possessive_pattern: Regex::new(r"'s\b").map_err(PipelineError::internal)?,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Strip URLs, markup, possessives, punctuation and stop words; lowercase;
    /// collapse whitespace.
    pub fn clean_text(&self, text: &str) -> String {
        let without_urls = self.url_pattern.replace_all(text, "");
        let without_tags = self.tag_pattern.replace_all(&without_urls, "");
        let without_possessives = self.possessive_pattern.replace_all(&without_tags, "");
        let lowered: String = without_possessives
            .chars()
            .filter(|c| !PUNCTUATION.contains(*c))
            .collect::<String>()
            .to_lowercase();

        lowered
            .split_whitespace()
            .filter(|word| !STOP_WORDS.contains(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];
        for token in self.clean_text(text).split(' ').filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

#[async_trait]
impl TextEncoder for HashingEncoder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn encode(&self, batch: &[String]) -> Result<Vec<Embedding>, PipelineError> {
        Ok(batch.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_noise() {
        let encoder = HashingEncoder::new(16).unwrap();
        let cleaned = encoder.clean_text(
            "The <b>Moon</b> is Earth's only satellite! See https://example.com/moon and www.nasa.gov",
        );
        assert_eq!(cleaned, "moon earth only satellite see");
    }

    #[test]
    fn embeddings_are_deterministic_and_sized() {
        let encoder = HashingEncoder::new(32).unwrap();
        let first = encoder.embed_text("How do I reset my password?");
        let second = encoder.embed_text("how do i reset my password");
        assert_eq!(first.len(), 32);
        assert_eq!(first, second);
        assert!(first.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn text_with_only_stop_words_is_zero() {
        let encoder = HashingEncoder::new(8).unwrap();
        assert!(encoder.embed_text("the a and").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(HashingEncoder::new(0).is_err());
    }

    #[tokio::test]
    async fn encodes_one_vector_per_text() {
        let encoder = HashingEncoder::new(8).unwrap();
        let batch = vec!["alpha".to_string(), "beta".to_string(), String::new()];
        let vectors = encoder.encode(&batch).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], encoder.embed_text("alpha"));
    }
}
