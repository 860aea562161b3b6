use ordered_float::OrderedFloat;
use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::EmbeddingError;
use crate::logging::RANKING;
use crate::sections::Section;

pub const DEFAULT_TOP_K: usize = 5;

/// Scores every section against `query` and keeps the `top_k` best.
///
/// Returns `(section index, score)` pairs sorted by score descending; equal
/// scores keep the lower index first. The corpus is embedded in a single
/// batched call. An empty section list returns immediately without touching
/// the embedder.
pub fn rank_sections(
    sections: &[Section],
    query: &str,
    top_k: usize,
    embedder: &dyn Embedder,
) -> Result<Vec<(usize, f32)>, EmbeddingError> {
    if sections.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let corpus: Vec<String> = sections.iter().map(Section::as_text).collect();
    let corpus_emb = embedder.embed_batch(&corpus)?;
    if corpus_emb.len() != corpus.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: corpus.len(),
            actual: corpus_emb.len(),
        });
    }
    let query_emb = embedder.embed_query(query)?;

    let dim = embedder.embedding_dim();
    if let Some(bad) = std::iter::once(&query_emb)
        .chain(corpus_emb.iter())
        .find(|v| v.len() != dim)
    {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dim,
            actual: bad.len(),
        });
    }

    let scores: Vec<f32> = corpus_emb
        .iter()
        .map(|emb| cosine_similarity(&query_emb, emb))
        .collect();

    let ranked = select_top_k(&scores, top_k);
    debug!(
        target: RANKING,
        sections = sections.len(),
        kept = ranked.len(),
        best = ranked.first().map(|(_, s)| *s),
        "ranked sections"
    );
    Ok(ranked)
}

/// Stable top-k over precomputed scores: descending score, ascending index.
pub fn select_top_k(scores: &[f32], top_k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| {
        OrderedFloat(b.1)
            .cmp(&OrderedFloat(a.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    indexed.truncate(top_k);
    indexed
}
