//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that the pipeline uses to turn a
//! question into a query vector, plus [`cosine_similarity`] for the
//! in-memory index.
//!
//! Concrete providers (OpenAI-compatible HTTP) live in the `sqlrag` app crate.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Trait for embedding providers.
///
/// A single call embeds a single text. Implementations must not retry
/// internally; the pipeline treats any failure as final for the run.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed one text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
