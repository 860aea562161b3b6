//! Sentence embedding service.
//!
//! The [`Embedder`] trait is the seam between ranking and whatever produces
//! vectors. [`BertEmbedder`] runs a sentence-transformers BERT checkpoint with
//! candle; [`HashEmbedder`] is a dependency-free stand-in for tests and
//! offline runs.

mod bert;
mod hashing;

pub use bert::{BertEmbedder, DEFAULT_MODEL_ID};
pub use hashing::HashEmbedder;

use crate::error::EmbeddingError;

/// Produces unit-normalized, fixed-dimension vectors for text.
///
/// Implementations are constructed once per process and shared read-only, so
/// they must be safe to call from several threads at once. Output must be
/// deterministic for identical input.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn embedding_dim(&self) -> usize;

    /// Embeds a passage corpus in one call, one vector per input, same order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a query, normalized the same way as passages.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        match out.len() {
            1 => Ok(out.remove(0)),
            actual => Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

/// Cosine similarity clamped into `[-1, 1]`.
///
/// Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let sim = dot / (na.sqrt() * nb.sqrt());
    if sim.is_nan() {
        0.0
    } else {
        sim.clamp(-1.0, 1.0)
    }
}

/// Scales a vector to unit length in place; zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
