use std::cmp::Ordering;

use crate::application::ports::EmbeddingError;

/// A candidate vector ranked against a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch<M> {
    pub index: usize,
    pub similarity: f32,
    pub metadata: Option<M>,
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (norm_a * norm_b))
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Unit-length copy of `v`; the zero vector is returned unchanged.
pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let norm = magnitude(v);
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Every candidate ordered by descending similarity. Equal scores keep
/// their input order.
pub fn sort_by_similarity<M: Clone>(
    query: &[f32],
    vectors: &[Vec<f32>],
    metadata: Option<&[M]>,
) -> Result<Vec<SimilarityMatch<M>>, EmbeddingError> {
    let mut matches = vectors
        .iter()
        .enumerate()
        .map(|(index, vector)| {
            Ok(SimilarityMatch {
                index,
                similarity: cosine_similarity(query, vector)?,
                metadata: metadata.and_then(|m| m.get(index).cloned()),
            })
        })
        .collect::<Result<Vec<_>, EmbeddingError>>()?;

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });

    Ok(matches)
}

pub fn find_most_similar<M: Clone>(
    query: &[f32],
    vectors: &[Vec<f32>],
    metadata: Option<&[M]>,
    top_k: usize,
    min_similarity: f32,
) -> Result<Vec<SimilarityMatch<M>>, EmbeddingError> {
    Ok(sort_by_similarity(query, vectors, metadata)?
        .into_iter()
        .filter(|m| m.similarity >= min_similarity)
        .take(top_k)
        .collect())
}
