//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the [`Similarity`] functions used to score search hits, and
//! helpers for vector serialization.
//!
//! Concrete providers (Ollama, OpenAI, fastembed) live in the `pdf-agent`
//! app crate.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Maps text to fixed-dimension vectors.
///
/// Failures (model unavailable, network errors) are returned, never papered
/// over with a default vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Returns the configured dimensionality, or `0` when unknown.
    fn dims(&self) -> usize;

    /// Embed a batch of texts. Output order matches input order, one vector
    /// per input.
    async fn embed_batch(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> AnyResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Embed `texts` and verify the provider kept its contract: one non-empty
/// vector per input, all of the same dimensionality.
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = provider
        .embed_batch(texts)
        .await
        .map_err(|e| Error::embedding(format!("{:#}", e)))?;
    check_batch_shape(texts.len(), &vectors)?;
    Ok(vectors)
}

/// Validate the shape of an embedding batch.
pub fn check_batch_shape(expected_len: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected_len {
        return Err(Error::Embedding(format!(
            "provider returned {} vectors for {} inputs",
            vectors.len(),
            expected_len
        )));
    }
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    if first.is_empty() {
        return Err(Error::Embedding("provider returned an empty vector".into()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
        return Err(Error::Embedding(format!(
            "provider returned mixed dimensionality ({} and {})",
            first.len(),
            bad.len()
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::Embedding(
            "provider returned non-finite values".into(),
        ));
    }
    Ok(())
}

/// Relevance function used to score a stored vector against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// `1 - ‖a - b‖ / √2`, the usual relevance mapping for unit-normalized
    /// embeddings compared by euclidean distance.
    L2,
}

impl Similarity {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::L2 => l2_relevance(a, b),
        }
    }
}

impl std::str::FromStr for Similarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Similarity::Cosine),
            "l2" => Ok(Similarity::L2),
            other => Err(Error::Configuration(format!(
                "Unknown similarity '{}'. Must be cosine or l2.",
                other
            ))),
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or
/// zero-magnitude vectors.
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

    (dot / denom).clamp(-1.0, 1.0)
}

/// Euclidean-distance relevance: `1 - d / √2`.
///
/// For unit vectors `d ∈ [0, 2]`, so the score lands in `[1 - √2, 1]`.
/// Returns `0.0` for empty or mismatched vectors.
pub fn l2_relevance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dist: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt();
    1.0 - dist / std::f32::consts::SQRT_2
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use pdf_agent_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
