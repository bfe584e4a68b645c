//! Builders for `get_database_overview` and `get_subject_areas`.
//!
//! Neither tool gets its own  component — both are thin views over
//! an already-built `SchemaCard`, so they live next to the card rather than
//! as a dedicated pipeline stage.

use std::collections::BTreeMap;

use crate::models::overview::{DatabaseSummary, ImportantTable, SubjectAreaDetail};
use crate::models::{Archetype, SubjectArea};
use crate::schema::card::SchemaCard;

/// How many tables `most_important_tables` reports when non-archive,
/// non-audit-like candidates can fill the slot.
const IMPORTANT_TABLE_SLOTS: usize = 10;

/// Build `DatabaseSummary`.
pub fn build_database_summary(
    card: &SchemaCard,
    include_subject_areas: bool,
    area_limit: usize,
) -> DatabaseSummary {
    let area_limit = area_limit.max(1);
    let ranked_areas = ranked_subject_areas(card);

    let subject_areas: BTreeMap<String, String> = ranked_areas
        .iter()
        .take(area_limit)
        .map(|area| (area.name.clone(), short_purpose(area)))
        .collect();

    let subject_area_detail = include_subject_areas.then(|| {
        ranked_areas
            .iter()
            .take(area_limit)
            .map(|area| {
                (
                    area.id.clone(),
                    SubjectAreaDetail {
                        name: area.name.clone(),
                        tables: area.tables.clone(),
                        summary: area.summary.clone(),
                    },
                )
            })
            .collect()
    });

    DatabaseSummary {
        dialect: card.dialect.clone(),
        total_tables: card.tables.len(),
        schemas: card.schemas.clone(),
        subject_areas,
        subject_area_detail,
        most_important_tables: most_important_tables(card),
        common_patterns: common_patterns(card),
    }
}

/// `get_subject_areas(limit)`: sorted by table count descending.
pub fn list_subject_areas(card: &SchemaCard, limit: usize) -> Vec<SubjectArea> {
    ranked_subject_areas(card).into_iter().take(limit.max(1)).collect()
}

fn ranked_subject_areas(card: &SchemaCard) -> Vec<SubjectArea> {
    let mut areas: Vec<SubjectArea> = card.subject_areas.values().cloned().collect();
    areas.sort_by(|a, b| {
        b.tables
            .len()
            .cmp(&a.tables.len())
            .then_with(|| a.id.cmp(&b.id))
    });
    areas
}

fn short_purpose(area: &SubjectArea) -> String {
    if area.summary.is_empty() {
        format!("{} tables", area.tables.len())
    } else {
        area.summary.clone()
    }
}

/// Centrality-ranked tables, suppressing archive/audit-like tables until
/// the slot count would otherwise come up short.
fn most_important_tables(card: &SchemaCard) -> Vec<ImportantTable> {
    let mut ranked: Vec<&crate::models::TableProfile> = card.tables.values().collect();
    ranked.sort_by(|a, b| {
        b.centrality
            .partial_cmp(&a.centrality)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });

    let (clean, noisy): (Vec<_>, Vec<_>) = ranked
        .into_iter()
        .partition(|t| !t.is_archive && !t.is_audit_like);

    let mut selected: Vec<&crate::models::TableProfile> = clean;
    if selected.len() < IMPORTANT_TABLE_SLOTS {
        let remaining = IMPORTANT_TABLE_SLOTS - selected.len();
        selected.extend(noisy.into_iter().take(remaining));
    } else {
        selected.truncate(IMPORTANT_TABLE_SLOTS);
    }

    selected
        .into_iter()
        .map(|t| ImportantTable {
            table: t.key.clone(),
            archetype: t.archetype.to_string(),
            centrality: t.centrality,
            summary: t.summary.clone(),
        })
        .collect()
}

/// Heuristic pattern labels: "Star schema", "Normalized",
/// "Time-series", "Analytics". A database can exhibit more than one.
fn common_patterns(card: &SchemaCard) -> Vec<String> {
    let total = card.tables.len().max(1);
    let mut patterns = Vec::new();

    let has_star = card.tables.values().any(|t| {
        t.archetype == Archetype::Fact
            && card
                .neighbors(&t.key)
                .iter()
                .filter(|n| {
                    card.table(n)
                        .map(|n| n.archetype == Archetype::Dimension)
                        .unwrap_or(false)
                })
                .count()
                >= 2
    });
    if has_star {
        patterns.push("Star schema".to_string());
    }

    let bridge_count = card
        .tables
        .values()
        .filter(|t| t.archetype == Archetype::Bridge)
        .count();
    let fk_density = card.edges.len() as f64 / total as f64;
    if bridge_count > 0 || fk_density >= 1.0 {
        patterns.push("Normalized".to_string());
    }

    let date_ratio = card.tables.values().filter(|t| t.n_dates >= 1).count() as f64 / total as f64;
    if date_ratio >= 0.3 {
        patterns.push("Time-series".to_string());
    }

    let fact_ratio = card
        .tables
        .values()
        .filter(|t| t.archetype == Archetype::Fact)
        .count() as f64
        / total as f64;
    let rich_metrics = card.tables.values().any(|t| t.n_metrics >= 3);
    if fact_ratio >= 0.15 || rich_metrics {
        patterns.push("Analytics".to_string());
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Archetype, ColumnProfile, ColumnRole, ForeignKeyEdge, SchemaEdge, TableProfile};
    use std::collections::BTreeMap;

    fn table(key: &str, archetype: Archetype, centrality: f64, n_metrics: usize, n_dates: usize) -> TableProfile {
        TableProfile {
            key: key.to_string(),
            schema: "public".into(),
            name: key.split('.').next_back().unwrap().to_string(),
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
            summary: format!("{archetype} table {key}"),
            subject_area: "area_0".into(),
            centrality,
            n_metrics,
            n_dates,
            is_archive: false,
            is_audit_like: false,
        }
    }

    fn sample_card() -> SchemaCard {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales.orders".to_string(),
            table("sales.orders", Archetype::Fact, 0.9, 2, 1),
        );
        tables.insert(
            "sales.customers".to_string(),
            table("sales.customers", Archetype::Dimension, 0.5, 0, 0),
        );
        tables.insert(
            "sales.products".to_string(),
            table("sales.products", Archetype::Dimension, 0.4, 0, 0),
        );

        let edges = vec![
            SchemaEdge {
                src: "sales.orders".into(),
                dst: "sales.customers".into(),
                descriptor: "sales.orders.customer_id->sales.customers.id".into(),
            },
            SchemaEdge {
                src: "sales.orders".into(),
                dst: "sales.products".into(),
                descriptor: "sales.orders.product_id->sales.products.id".into(),
            },
        ];

        let mut subject_areas = BTreeMap::new();
        subject_areas.insert(
            "area_0".to_string(),
            SubjectArea {
                id: "area_0".into(),
                name: "area_0".into(),
                tables: vec![
                    "sales.orders".into(),
                    "sales.customers".into(),
                    "sales.products".into(),
                ],
                summary: "3 tables".into(),
            },
        );

        SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "abc".into(),
            schemas: vec!["sales".into()],
            tables,
            edges,
            subject_areas,
            built_at: chrono::Utc::now(),
            reflection_hash: "x".into(),
        }
    }

    #[test]
    fn detects_star_schema() {
        let card = sample_card();
        let patterns = common_patterns(&card);
        assert!(patterns.contains(&"Star schema".to_string()));
    }

    #[test]
    fn most_important_tables_ranked_by_centrality() {
        let card = sample_card();
        let important = most_important_tables(&card);
        assert_eq!(important[0].table, "sales.orders");
    }

    #[test]
    fn empty_database_has_no_patterns_and_zero_tables() {
        let card = SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "abc".into(),
            schemas: Vec::new(),
            tables: BTreeMap::new(),
            edges: Vec::new(),
            subject_areas: BTreeMap::new(),
            built_at: chrono::Utc::now(),
            reflection_hash: "x".into(),
        };
        let summary = build_database_summary(&card, true, 8);
        assert_eq!(summary.total_tables, 0);
        assert!(summary.common_patterns.is_empty());
    }

    #[test]
    fn subject_areas_sorted_by_table_count_desc() {
        let card = sample_card();
        let areas = list_subject_areas(&card, 12);
        assert_eq!(areas[0].id, "area_0");
    }
}
