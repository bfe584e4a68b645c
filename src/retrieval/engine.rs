//! The Retrieval Engine: four strategies behind one interface,
//! producing a ranked candidate-table list for a free-form query.

use std::collections::HashMap;

use crate::config::Config;
use crate::models::Archetype;
use crate::schema::card::SchemaCard;
use crate::schema::service::SchemaService;
use crate::utils::math::min_max_normalize;
use crate::utils::tokenize::tokenize_identifier;

const DEFAULT_ALPHA: f32 = 0.7;
const MORPH_WEIGHT: f32 = 0.3;
const SEMANTIC_NEIGHBOR_CAP: f32 = 0.7;
const PER_TOKEN_WIN_BOOST: f32 = 0.05;
const PER_TABLE_WIN_CAP: f32 = 0.25;
const AGGREGATE_TOKENS: &[&str] = &[
    "top", "rank", "sum", "total", "count", "avg", "average", "median", "percent", "percentage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    Lexical,
    EmbeddingTable,
    EmbeddingColumn,
    Combined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTable {
    pub table: String,
    pub score: f32,
}

pub struct RetrievalEngine<'a> {
    card: &'a SchemaCard,
    service: &'a SchemaService,
    #[allow(dead_code)]
    config: &'a Config,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(card: &'a SchemaCard, service: &'a SchemaService, config: &'a Config) -> Self {
        Self {
            card,
            service,
            config,
        }
    }

    /// Rank candidate tables for `query`. `query_vector` is the caller's
    /// pre-computed embedding of `query` text (the engine has no Embedder of
    /// its own); strategies that need it degrade gracefully to an empty
    /// result when it's absent. `exclude_archives` applies the final archive
    /// filter.
    pub fn retrieve(
        &self,
        query: &str,
        k: usize,
        strategy: RetrievalStrategy,
        query_vector: Option<&[f32]>,
        exclude_archives: bool,
    ) -> Vec<ScoredTable> {
        self.retrieve_with_alpha(query, k, strategy, query_vector, exclude_archives, DEFAULT_ALPHA)
    }

    /// Same as [`retrieve`](Self::retrieve), but lets the caller override
    /// COMBINED's blend weight `alpha`. Exposed
    /// for the `find_tables` debug tool; every other strategy
    /// ignores `alpha`.
    pub fn retrieve_with_alpha(
        &self,
        query: &str,
        k: usize,
        strategy: RetrievalStrategy,
        query_vector: Option<&[f32]>,
        exclude_archives: bool,
        alpha: f32,
    ) -> Vec<ScoredTable> {
        let ranked = match strategy {
            RetrievalStrategy::Lexical => self.lexical(query),
            RetrievalStrategy::EmbeddingTable => self.embedding_table(query_vector),
            RetrievalStrategy::EmbeddingColumn => self.embedding_column(query_vector),
            RetrievalStrategy::Combined => self.combined(query, query_vector, alpha.clamp(0.0, 1.0)),
        };
        self.apply_archive_filter(ranked, k, exclude_archives)
    }

    /// LEXICAL: dot(query_weights, table_weights) / ‖table_weights‖,
    /// plus small per-token "who scores highest" boosts.
    fn lexical(&self, query: &str) -> Vec<ScoredTable> {
        let query_weights = self.build_query_weights(query);
        self.score_lexical(&query_weights)
    }

    fn build_query_weights(&self, query: &str) -> HashMap<String, f32> {
        let base_tokens = tokenize_identifier(query);
        let mut weights: HashMap<String, f32> = HashMap::new();
        for token in &base_tokens {
            *weights.entry(token.clone()).or_insert(0.0) += 1.0;
            for morph in morphological_variants(token) {
                *weights.entry(morph).or_insert(0.0) += MORPH_WEIGHT;
            }
        }

        if let Some(lexicon) = &self.service.lexicon {
            for token in &base_tokens {
                for (neighbor, similarity) in lexicon.expand(token, 5) {
                    let boost = similarity.max(0.0).min(1.0) * SEMANTIC_NEIGHBOR_CAP;
                    *weights.entry(neighbor).or_insert(0.0) += boost;
                }
            }
        }

        weights
    }

    fn score_lexical(&self, query_weights: &HashMap<String, f32>) -> Vec<ScoredTable> {
        if query_weights.is_empty() {
            return Vec::new();
        }

        let all_weights = self.service.all_lexical_weights();
        let mut base_scores: HashMap<String, f32> = HashMap::new();
        for (table_key, table_weights) in all_weights {
            let norm: f32 = table_weights
                .values()
                .map(|w| (*w as f32) * (*w as f32))
                .sum::<f32>()
                .sqrt();
            if norm <= f32::EPSILON {
                continue;
            }
            let dot: f32 = query_weights
                .iter()
                .filter_map(|(token, qw)| table_weights.get(token).map(|tw| qw * (*tw as f32)))
                .sum();
            if dot > 0.0 {
                base_scores.insert(table_key.clone(), dot / norm);
            }
        }

        // Per-token "which table wins" boost, capped per table.
        let mut boosts: HashMap<String, f32> = HashMap::new();
        for token in query_weights.keys() {
            let winner = all_weights
                .iter()
                .filter_map(|(table, weights)| weights.get(token).map(|w| (table, *w)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            if let Some((table, _)) = winner {
                let entry = boosts.entry(table.clone()).or_insert(0.0);
                *entry = (*entry + PER_TOKEN_WIN_BOOST).min(PER_TABLE_WIN_CAP);
            }
        }

        let mut scored: Vec<ScoredTable> = base_scores
            .into_iter()
            .map(|(table, score)| {
                let boost = boosts.get(&table).copied().unwrap_or(0.0);
                ScoredTable {
                    table,
                    score: score + boost,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// EMBEDDING-TABLE: encode the query, search the table index.
    fn embedding_table(&self, query_vector: Option<&[f32]>) -> Vec<ScoredTable> {
        let Some(vector) = query_vector else {
            return Vec::new();
        };
        self.service
            .table_index
            .search(vector, self.card.tables.len().max(1))
            .into_iter()
            .map(|(table, score)| ScoredTable { table, score })
            .collect()
    }

    /// EMBEDDING-COLUMN: search the column index, aggregate
    /// positive scores by owning table.
    fn embedding_column(&self, query_vector: Option<&[f32]>) -> Vec<ScoredTable> {
        let Some(vector) = query_vector else {
            return Vec::new();
        };
        let hits = self
            .service
            .column_index
            .search(vector, self.service.column_index.len().max(1));

        let mut by_table: HashMap<String, f32> = HashMap::new();
        for (label, score) in hits {
            if score <= 0.0 {
                continue;
            }
            let Some(rest) = label.strip_prefix("col::") else {
                continue;
            };
            let Some((table, _column)) = rest.rsplit_once('.') else {
                continue;
            };
            *by_table.entry(table.to_string()).or_insert(0.0) += score;
        }

        let mut scored: Vec<ScoredTable> = by_table
            .into_iter()
            .map(|(table, score)| ScoredTable { table, score })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// COMBINED: min-max normalized blend of LEXICAL and
    /// EMBEDDING-TABLE, plus additive aggregate/FACT/overlap biases.
    fn combined(&self, query: &str, query_vector: Option<&[f32]>, alpha: f32) -> Vec<ScoredTable> {
        let query_weights = self.build_query_weights(query);
        let lexical_scores = self.score_lexical(&query_weights);
        let embedding_scores = self.embedding_table(query_vector);

        if embedding_scores.is_empty() {
            // No embeddings available: COMBINED falls back to LEXICAL ranking
            //.
            return lexical_scores;
        }

        let all_tables: Vec<String> = self.card.tables.keys().cloned().collect();
        let lexical_by_table: HashMap<&str, f32> = lexical_scores
            .iter()
            .map(|s| (s.table.as_str(), s.score))
            .collect();
        let embedding_by_table: HashMap<&str, f32> = embedding_scores
            .iter()
            .map(|s| (s.table.as_str(), s.score))
            .collect();

        let raw_lexical: Vec<f32> = all_tables
            .iter()
            .map(|t| lexical_by_table.get(t.as_str()).copied().unwrap_or(0.0))
            .collect();
        let raw_embedding: Vec<f32> = all_tables
            .iter()
            .map(|t| embedding_by_table.get(t.as_str()).copied().unwrap_or(0.0))
            .collect();

        let norm_lexical = min_max_normalize(&raw_lexical);
        let norm_embedding = min_max_normalize(&raw_embedding);

        let aggregate_query = query_weights
            .keys()
            .any(|t| AGGREGATE_TOKENS.contains(&t.as_str()));

        let all_weights = self.service.all_lexical_weights();

        let mut scored = Vec::with_capacity(all_tables.len());
        for (i, table_key) in all_tables.iter().enumerate() {
            let base = alpha * norm_embedding[i] + (1.0 - alpha) * norm_lexical[i];

            let mut bias = 0.0f32;
            if let Some(profile) = self.card.table(table_key) {
                if aggregate_query {
                    if profile.n_metrics >= 1 {
                        bias += 0.08;
                    }
                    if profile.n_dates >= 1 {
                        bias += 0.04;
                    }
                    if profile.archetype == Archetype::Fact {
                        bias += 0.06;
                    }
                }
            }

            if let Some(table_weights) = all_weights.get(table_key) {
                let norm: f32 = table_weights
                    .values()
                    .map(|w| (*w as f32) * (*w as f32))
                    .sum::<f32>()
                    .sqrt();
                if norm > f32::EPSILON {
                    let overlap = query_weights
                        .keys()
                        .filter(|t| table_weights.contains_key(t.as_str()))
                        .count() as f32;
                    bias += 0.12 * overlap / norm;
                }
            }

            scored.push(ScoredTable {
                table: table_key.clone(),
                score: base + bias,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// Archive filtering is applied last, regardless of strategy: drop
    /// archives outright when `exclude_archives`, otherwise prefer
    /// non-archives and only append archives to fill `k`.
    fn apply_archive_filter(
        &self,
        ranked: Vec<ScoredTable>,
        k: usize,
        exclude_archives: bool,
    ) -> Vec<ScoredTable> {
        if exclude_archives {
            return ranked
                .into_iter()
                .filter(|s| !self.is_archive(&s.table))
                .take(k)
                .collect();
        }

        let (non_archive, archive): (Vec<_>, Vec<_>) =
            ranked.into_iter().partition(|s| !self.is_archive(&s.table));
        let mut out = non_archive;
        if out.len() < k {
            out.extend(archive.into_iter().take(k - out.len()));
        } else {
            out.truncate(k);
        }
        out
    }

    fn is_archive(&self, table_key: &str) -> bool {
        self.card
            .table(table_key)
            .map(|t| t.is_archive)
            .unwrap_or(false)
    }
}

/// Naive singular/plural morphology: strip a trailing `s`/`es`, or append one, so e.g.
/// `"orders"` also matches a `"order"` token and vice versa.
fn morphological_variants(token: &str) -> Vec<String> {
    let mut variants = Vec::new();
    if let Some(stripped) = token.strip_suffix("ies") {
        variants.push(format!("{stripped}y"));
    } else if let Some(stripped) = token.strip_suffix("es") {
        variants.push(stripped.to_string());
    } else if let Some(stripped) = token.strip_suffix('s') {
        if stripped.len() >= 2 {
            variants.push(stripped.to_string());
        }
    } else {
        variants.push(format!("{token}s"));
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnProfile, ColumnRole, TableProfile};
    use std::collections::BTreeMap;

    fn table(key: &str, archetype: Archetype, is_archive: bool) -> TableProfile {
        TableProfile {
            key: key.to_string(),
            schema: "public".into(),
            name: key.split('.').last().unwrap().to_string(),
            columns: vec![ColumnProfile {
                name: "id".into(),
                sql_type: "integer".into(),
                nullable: false,
                is_primary_key: true,
                is_foreign_key: false,
                fk_reference: None,
                null_rate: None,
                approx_distinct_ratio: None,
                sample_patterns: Vec::new(),
                semantic_tags: Vec::new(),
                role: ColumnRole::Key,
                distinct_values: None,
                value_range: None,
            }],
            pk_columns: vec!["id".into()],
            fks: Vec::new(),
            approx_rowcount: None,
            n_rows_sampled: 0,
            archetype,
            summary: String::new(),
            subject_area: "area_0".into(),
            centrality: 0.0,
            n_metrics: 0,
            n_dates: 0,
            is_archive,
            is_audit_like: false,
        }
    }

    fn card_with(tables: Vec<TableProfile>) -> SchemaCard {
        let mut map = BTreeMap::new();
        for t in tables {
            map.insert(t.key.clone(), t);
        }
        SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "fp".into(),
            schemas: vec!["public".into()],
            tables: map,
            edges: Vec::new(),
            subject_areas: BTreeMap::new(),
            built_at: chrono::Utc::now(),
            reflection_hash: "x".into(),
        }
    }

    fn config() -> Config {
        let mut cfg = Config::from_env_or_default();
        cfg.database_url = "sqlite::memory:".into();
        cfg
    }

    #[tokio::test]
    async fn lexical_returns_empty_for_no_token_overlap() {
        let card = card_with(vec![table("public.orders", Archetype::Fact, false)]);
        let card = std::sync::Arc::new(card);
        let noop: std::sync::Arc<dyn crate::embedding::Embedder> =
            std::sync::Arc::new(crate::embedding::NoopEmbedder::new(8));
        let cfg = config();
        let service = SchemaService::build(card.clone(), noop.clone(), &cfg).await;
        let engine = RetrievalEngine::new(&card, &service, &cfg);

        let results = engine.retrieve("zzzzz_no_match_here", 5, RetrievalStrategy::Lexical, None, false);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn archive_tables_are_excluded_when_requested() {
        let card = card_with(vec![
            table("public.orders", Archetype::Fact, false),
            table("public.orders_archive", Archetype::Fact, true),
        ]);
        let card = std::sync::Arc::new(card);
        let noop: std::sync::Arc<dyn crate::embedding::Embedder> =
            std::sync::Arc::new(crate::embedding::NoopEmbedder::new(8));
        let cfg = config();
        let service = SchemaService::build(card.clone(), noop.clone(), &cfg).await;
        let engine = RetrievalEngine::new(&card, &service, &cfg);

        let results = engine.retrieve("orders", 5, RetrievalStrategy::Lexical, None, true);
        assert!(results.iter().all(|s| s.table != "public.orders_archive"));
    }

    #[tokio::test]
    async fn lexical_matches_table_name_tokens() {
        let card = card_with(vec![
            table("public.orders", Archetype::Fact, false),
            table("public.customers", Archetype::Dimension, false),
        ]);
        let card = std::sync::Arc::new(card);
        let noop: std::sync::Arc<dyn crate::embedding::Embedder> =
            std::sync::Arc::new(crate::embedding::NoopEmbedder::new(8));
        let cfg = config();
        let service = SchemaService::build(card.clone(), noop.clone(), &cfg).await;
        let engine = RetrievalEngine::new(&card, &service, &cfg);

        let results = engine.retrieve("orders", 5, RetrievalStrategy::Lexical, None, false);
        assert!(!results.is_empty());
        assert_eq!(results[0].table, "public.orders");
    }

    #[test]
    fn morphological_variants_cover_plural_and_singular() {
        assert!(morphological_variants("orders").contains(&"order".to_string()));
        assert!(morphological_variants("order").contains(&"orders".to_string()));
        assert!(morphological_variants("categories").contains(&"category".to_string()));
    }
}
