//! `SchemaService`: a read-mostly accessor over a built
//! `SchemaCard` plus its derived caches — embeddings, semantic indices, the
//! token lexicon, and per-table lexical weight vectors.
//! Built once per generation and swapped atomically by the Init Manager;
//! readers never lock.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::config::Config;
use crate::embedding::{Embedder, SemanticIndex, TokenLexicon};
use crate::models::ColumnRole;
use crate::schema::card::SchemaCard;
use crate::utils::tokenize::tokenize_identifier;

/// `token -> weight` for one table's lexical profile.
pub type LexicalWeights = HashMap<String, f64>;

pub struct SchemaService {
    pub card: Arc<SchemaCard>,
    pub table_index: SemanticIndex,
    pub column_index: SemanticIndex,
    pub lexicon: Option<TokenLexicon>,
    lexical_weights: HashMap<String, LexicalWeights>,
    embeddings_available: bool,
    embedder: Arc<dyn Embedder>,
}

impl SchemaService {
    /// Assemble every derived cache from `card`. Embedding
    /// failures degrade to lexical-only retrieval rather than failing the
    /// build. `embedder` is retained
    /// (not just consulted during the build) so query-time callers can embed
    /// free-form request text with the same model that indexed the card.
    #[instrument(skip(card, embedder, config))]
    pub async fn build(card: Arc<SchemaCard>, embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        let lexical_weights = build_lexical_weights(&card);

        if !embedder.is_available() {
            warn!("embedder unavailable; schema service will retrieve lexically only");
            return Self {
                card,
                table_index: SemanticIndex::build(Vec::new()),
                column_index: SemanticIndex::build(Vec::new()),
                lexicon: None,
                lexical_weights,
                embeddings_available: false,
                embedder,
            };
        }

        let table_docs = build_table_descriptions(&card);
        let table_labels: Vec<String> = table_docs.iter().map(|(k, _)| k.clone()).collect();
        let table_texts: Vec<String> = table_docs.iter().map(|(_, v)| v.clone()).collect();

        let table_vectors = match embedder.embed_batch(&table_texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!("table embedding batch failed: {e}; falling back to lexical retrieval");
                return Self {
                    card,
                    table_index: SemanticIndex::build(Vec::new()),
                    column_index: SemanticIndex::build(Vec::new()),
                    lexicon: None,
                    lexical_weights,
                    embeddings_available: false,
                    embedder,
                };
            }
        };

        let table_index = SemanticIndex::build(
            table_labels
                .iter()
                .cloned()
                .zip(table_vectors.iter().cloned())
                .collect(),
        );

        let column_docs = build_column_descriptions(&card, config.max_cols_for_embeddings);
        let column_index = if column_docs.is_empty() {
            SemanticIndex::build(Vec::new())
        } else {
            let labels: Vec<String> = column_docs.iter().map(|(k, _)| k.clone()).collect();
            let texts: Vec<String> = column_docs.iter().map(|(_, v)| v.clone()).collect();
            match embedder.embed_batch(&texts).await {
                Ok(vectors) => SemanticIndex::build(labels.into_iter().zip(vectors).collect()),
                Err(e) => {
                    warn!("column embedding batch failed: {e}; column index left empty");
                    SemanticIndex::build(Vec::new())
                }
            }
        };

        let lexicon_docs: Vec<(Vec<String>, Vec<f32>)> = table_labels
            .iter()
            .zip(table_vectors.iter())
            .map(|(label, vector)| (tokenize_identifier(label), vector.clone()))
            .collect();
        let lexicon = TokenLexicon::build(&lexicon_docs, config.lexicon_min_df, config.lexicon_top_n);

        Self {
            card,
            table_index,
            column_index,
            lexicon: Some(lexicon),
            lexical_weights,
            embeddings_available: true,
            embedder,
        }
    }

    pub fn embeddings_available(&self) -> bool {
        self.embeddings_available
    }

    /// Embed free-form request text with the same embedder that indexed the
    /// card, for query-time use by the Retrieval Engine / Plan Builder.
    /// Returns `None` when embeddings are unavailable rather than erroring.
    pub async fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        if !self.embeddings_available {
            return None;
        }
        match self.embedder.embed_text(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!("query embedding failed: {e}; falling back to lexical retrieval");
                None
            }
        }
    }

    pub fn lexical_weights(&self, table_key: &str) -> Option<&LexicalWeights> {
        self.lexical_weights.get(table_key)
    }

    pub fn all_lexical_weights(&self) -> &HashMap<String, LexicalWeights> {
        &self.lexical_weights
    }
}

/// `"<qualified_name>: <summary>. Columns: col1(role)[->ref], col2(role), …"`
/// with up to 12 columns.
fn build_table_descriptions(card: &SchemaCard) -> Vec<(String, String)> {
    const MAX_COLUMNS: usize = 12;
    card.tables
        .values()
        .map(|table| {
            let columns: Vec<String> = table
                .columns
                .iter()
                .take(MAX_COLUMNS)
                .map(|c| match &c.fk_reference {
                    Some(fk) => format!("{}({})[->{}]", c.name, c.role, fk.referenced_table),
                    None => format!("{}({})", c.name, c.role),
                })
                .collect();
            let text = format!(
                "{}: {}. Columns: {}",
                table.key,
                table.summary,
                columns.join(", ")
            );
            (table.key.clone(), text)
        })
        .collect()
}

/// `"<qualified_column>: role=<role>; type=<sql_type>; tags=<tags>; table=<table_summary>"`
/// capped at `max_cols_for_embeddings` per table.
fn build_column_descriptions(card: &SchemaCard, max_cols_for_embeddings: usize) -> Vec<(String, String)> {
    if max_cols_for_embeddings == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for table in card.tables.values() {
        for column in table.columns.iter().take(max_cols_for_embeddings) {
            let label = format!("col::{}.{}", table.key, column.name);
            let tags = if column.semantic_tags.is_empty() {
                "none".to_string()
            } else {
                column.semantic_tags.join(",")
            };
            let text = format!(
                "{}.{}: role={}; type={}; tags={}; table={}",
                table.key, column.name, column.role, column.sql_type, tags, table.summary
            );
            out.push((label, text));
        }
    }
    out
}

const TABLE_NAME_WEIGHT: f64 = 2.0;
const SCHEMA_NAME_WEIGHT: f64 = 0.5;
const COLUMN_NAME_WEIGHT: f64 = 1.0;
const COLUMN_ROLE_WEIGHT: f64 = 0.5;
const ARCHIVE_MULTIPLIER: f64 = 0.2;

/// Build the per-table lexical weight vector: table-name tokens
/// at weight 2.0, schema tokens at 0.5, column-name tokens at 1.0,
/// column-role tokens at 0.5; archive tables get every weight scaled 0.2x.
fn build_lexical_weights(card: &SchemaCard) -> HashMap<String, LexicalWeights> {
    card.tables
        .values()
        .map(|table| {
            let mut weights: LexicalWeights = HashMap::new();
            let mut add = |token: String, weight: f64| {
                *weights.entry(token).or_insert(0.0) += weight;
            };

            for token in tokenize_identifier(&table.name) {
                add(token, TABLE_NAME_WEIGHT);
            }
            for token in tokenize_identifier(&table.schema) {
                add(token, SCHEMA_NAME_WEIGHT);
            }
            for column in &table.columns {
                for token in tokenize_identifier(&column.name) {
                    add(token, COLUMN_NAME_WEIGHT);
                }
                add(role_token(column.role).to_string(), COLUMN_ROLE_WEIGHT);
            }

            if table.is_archive {
                for weight in weights.values_mut() {
                    *weight *= ARCHIVE_MULTIPLIER;
                }
            }

            (table.key.clone(), weights)
        })
        .collect()
}

fn role_token(role: ColumnRole) -> &'static str {
    match role {
        ColumnRole::Key => "key",
        ColumnRole::Date => "date",
        ColumnRole::Metric => "metric",
        ColumnRole::Category => "category",
        ColumnRole::Text => "text",
        ColumnRole::Id => "id",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Archetype, TableProfile};
    use std::collections::BTreeMap;

    fn empty_card() -> SchemaCard {
        SchemaCard {
            dialect: "postgres".to_string(),
            url_fingerprint: "abc".to_string(),
            schemas: vec!["public".to_string()],
            tables: BTreeMap::new(),
            edges: Vec::new(),
            subject_areas: BTreeMap::new(),
            built_at: chrono::Utc::now(),
            reflection_hash: "x".to_string(),
        }
    }

    #[test]
    fn archive_tables_get_scaled_weights() {
        let mut card = empty_card();
        card.tables.insert(
            "public.customers_archive".to_string(),
            TableProfile {
                key: "public.customers_archive".into(),
                schema: "public".into(),
                name: "customers_archive".into(),
                columns: Vec::new(),
                pk_columns: Vec::new(),
                fks: Vec::new(),
                approx_rowcount: None,
                n_rows_sampled: 0,
                archetype: Archetype::Reference,
                summary: String::new(),
                subject_area: "area_0".into(),
                centrality: 0.0,
                n_metrics: 0,
                n_dates: 0,
                is_archive: true,
                is_audit_like: false,
            },
        );
        let weights = build_lexical_weights(&card);
        let table_weights = &weights["public.customers_archive"];
        assert!(table_weights["customers"] < TABLE_NAME_WEIGHT);
    }
}
