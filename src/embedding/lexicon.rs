//! The Token Lexicon: a vocabulary of identifier tokens
//! drawn from table/column names, each carrying a document frequency and a
//! mean embedding vector, supporting nearest-token expansion for the
//! Retrieval Engine's query-token broadening step.

use std::collections::HashMap;

use crate::embedding::index::SemanticIndex;

pub struct TokenLexicon {
    /// Tokens surfaced by the lexicon, ordered by descending document
    /// frequency then alphabetically — `lexicon_top_n` already applied.
    tokens: Vec<String>,
    document_frequency: HashMap<String, usize>,
    token_vectors: HashMap<String, Vec<f32>>,
    index: SemanticIndex,
    min_df: usize,
}

impl TokenLexicon {
    /// Build the lexicon from `documents`: each is a set of identifier
    /// tokens (already tokenized, e.g. via `utils::tokenize`) paired with
    /// that document's embedding vector (a table's or column's description
    /// vector). `min_df` gates which tokens are surfaced; `top_n` caps the
    /// surfaced vocabulary size.
    pub fn build(
        documents: &[(Vec<String>, Vec<f32>)],
        min_df: usize,
        top_n: usize,
    ) -> Self {
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut vector_sums: HashMap<String, (Vec<f32>, usize)> = HashMap::new();

        for (doc_tokens, vector) in documents {
            let mut seen_in_doc: Vec<&String> = doc_tokens.iter().collect();
            seen_in_doc.sort();
            seen_in_doc.dedup();

            for token in seen_in_doc {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
                let entry = vector_sums
                    .entry(token.clone())
                    .or_insert_with(|| (vec![0.0; vector.len()], 0));
                for (i, v) in vector.iter().enumerate() {
                    if i < entry.0.len() {
                        entry.0[i] += v;
                    }
                }
                entry.1 += 1;
            }
        }

        let token_vectors: HashMap<String, Vec<f32>> = vector_sums
            .into_iter()
            .map(|(token, (sum, count))| {
                let mean = sum.iter().map(|x| x / count as f32).collect();
                (token, mean)
            })
            .collect();

        let mut surfaced: Vec<String> = document_frequency
            .iter()
            .filter(|(_, &df)| df >= min_df)
            .map(|(token, _)| token.clone())
            .collect();
        surfaced.sort_by(|a, b| {
            let freq_a = document_frequency[a];
            let freq_b = document_frequency[b];
            freq_b.cmp(&freq_a).then_with(|| a.cmp(b))
        });
        surfaced.truncate(top_n);

        let index_items: Vec<(String, Vec<f32>)> = surfaced
            .iter()
            .filter_map(|token| {
                token_vectors
                    .get(token)
                    .map(|v| (format!("tok::{token}"), v.clone()))
            })
            .collect();

        Self {
            tokens: surfaced,
            document_frequency,
            token_vectors,
            index: SemanticIndex::build(index_items),
            min_df,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn document_frequency(&self, token: &str) -> usize {
        self.document_frequency.get(token).copied().unwrap_or(0)
    }

    pub fn vector(&self, token: &str) -> Option<&[f32]> {
        self.token_vectors.get(token).map(|v| v.as_slice())
    }

    /// Expand `token` to its `k` nearest surfaced tokens by embedding
    /// similarity, excluding the token itself. Returns an empty vec if the
    /// token isn't surfaced (below `min_df`) or has no vector.
    pub fn expand(&self, token: &str, k: usize) -> Vec<(String, f32)> {
        if self.document_frequency(token) < self.min_df {
            return Vec::new();
        }
        let Some(vector) = self.vector(token) else {
            return Vec::new();
        };

        self.index
            .search_exact(vector, k + 1)
            .into_iter()
            .filter_map(|(label, score)| {
                let tok = label.strip_prefix("tok::")?;
                (tok != token).then(|| (tok.to_string(), score))
            })
            .take(k)
            .collect()
    }

    /// Expand a query embedding vector directly: return up to
    /// `top_n` surfaced tokens whose cosine similarity to `query` is at
    /// least `min_similarity`, excluding anything in `exclude` and anything
    /// below `min_df`. Used by the Retrieval Engine's query-broadening step,
    /// where the caller has a query vector rather than a single seed token.
    pub fn expand_query(
        &self,
        query: &[f32],
        top_n: usize,
        min_similarity: f32,
        exclude: &[String],
    ) -> Vec<(String, f32)> {
        if top_n == 0 || self.index.is_empty() {
            return Vec::new();
        }

        self.index
            .search_exact(query, self.tokens.len().max(top_n))
            .into_iter()
            .filter_map(|(label, score)| {
                let tok = label.strip_prefix("tok::")?.to_string();
                if score < min_similarity {
                    return None;
                }
                if exclude.iter().any(|e| e == &tok) {
                    return None;
                }
                if self.document_frequency(&tok) < self.min_df {
                    return None;
                }
                Some((tok, score))
            })
            .take(top_n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<(Vec<String>, Vec<f32>)> {
        vec![
            (vec!["customer".into(), "order".into()], vec![1.0, 0.0]),
            (vec!["customer".into(), "account".into()], vec![0.9, 0.1]),
            (vec!["order".into(), "item".into()], vec![0.0, 1.0]),
        ]
    }

    #[test]
    fn document_frequency_counts_distinct_docs() {
        let lexicon = TokenLexicon::build(&docs(), 1, 16);
        assert_eq!(lexicon.document_frequency("customer"), 2);
        assert_eq!(lexicon.document_frequency("order"), 2);
        assert_eq!(lexicon.document_frequency("account"), 1);
    }

    #[test]
    fn min_df_gates_surfaced_tokens() {
        let lexicon = TokenLexicon::build(&docs(), 2, 16);
        assert!(lexicon.tokens().contains(&"customer".to_string()));
        assert!(!lexicon.tokens().contains(&"account".to_string()));
    }

    #[test]
    fn tokens_are_ordered_by_descending_frequency_then_alpha() {
        let lexicon = TokenLexicon::build(&docs(), 1, 16);
        let tokens = lexicon.tokens();
        let customer_pos = tokens.iter().position(|t| t == "customer").unwrap();
        let account_pos = tokens.iter().position(|t| t == "account").unwrap();
        assert!(customer_pos < account_pos);
    }

    #[test]
    fn expand_excludes_self_and_respects_min_df() {
        let lexicon = TokenLexicon::build(&docs(), 2, 16);
        assert!(lexicon.expand("account", 3).is_empty());
        let expanded = lexicon.expand("customer", 3);
        assert!(expanded.iter().all(|(t, _)| t != "customer"));
    }

    #[test]
    fn expand_query_excludes_caller_list_and_low_similarity() {
        let lexicon = TokenLexicon::build(&docs(), 1, 16);
        let query = vec![1.0, 0.0];
        let expanded = lexicon.expand_query(&query, 5, 0.0, &["customer".to_string()]);
        assert!(expanded.iter().all(|(t, _)| t != "customer"));

        let strict = lexicon.expand_query(&query, 5, 0.999, &[]);
        assert!(strict.iter().all(|(_, score)| *score >= 0.999));
    }

    #[test]
    fn expand_query_respects_top_n_cap() {
        let lexicon = TokenLexicon::build(&docs(), 1, 16);
        let query = vec![0.5, 0.5];
        let expanded = lexicon.expand_query(&query, 1, -1.0, &[]);
        assert!(expanded.len() <= 1);
    }
}
