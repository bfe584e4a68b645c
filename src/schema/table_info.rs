//! Builder for `get_table_info`: a single table's full profile,
//! rendered with join conditions and example queries compiled through the
//! dialect facade the same way the Plan Builder does.

use crate::dialect::facade::{DialectFacade, DialectName};
use crate::models::table_info::{TableInfo, TableInfoColumn, TableRelationship, TypicalQuery};
use crate::models::{Archetype, ColumnProfile, ColumnRole};
use crate::schema::card::SchemaCard;

/// Build `TableInfo` for `table_key`. Returns `None` if the key is absent
/// from the card — callers surface that as a `get_table_info` not-found
/// error. `column_role_filter` restricts rendered columns to a
/// role subset (empty/`None` means no filter); `max_sample_values` caps
/// `sample_values` per column; `relationship_limit` caps the relationship
/// list (`None` means unlimited).
pub async fn build_table_info(
    card: &SchemaCard,
    table_key: &str,
    dialect: &DialectFacade,
    target_dialect: DialectName,
    include_samples: bool,
    column_role_filter: Option<&[ColumnRole]>,
    max_sample_values: usize,
    relationship_limit: Option<usize>,
) -> Option<TableInfo> {
    let table = card.table(table_key)?;

    let columns = table
        .columns
        .iter()
        .filter(|c| column_role_filter.map(|roles| roles.contains(&c.role)).unwrap_or(true))
        .map(|c| TableInfoColumn {
            name: c.name.clone(),
            sql_type: c.sql_type.clone(),
            nullable: c.nullable,
            is_primary_key: c.is_primary_key,
            is_foreign_key: c.is_foreign_key,
            role: c.role.to_string(),
            sample_values: if include_samples && max_sample_values > 0 {
                c.distinct_values
                    .as_ref()
                    .map(|v| v.iter().take(max_sample_values).cloned().collect())
            } else {
                None
            },
            constraints: column_constraints(c),
        })
        .collect();

    let mut relationships = Vec::new();
    for edge in &card.edges {
        if edge.src == table_key {
            let Some(fk) = table.fks.iter().find(|fk| fk.referenced_table == edge.dst) else {
                continue;
            };
            let on = compiled_join_condition(
                dialect,
                target_dialect,
                &edge.src,
                &edge.dst,
                &fk.local_column,
                &fk.referenced_column,
            )
            .await;
            relationships.push(TableRelationship {
                related_table: edge.dst.clone(),
                sql_on_clause: on,
                cardinality: "many-to-one".to_string(),
            });
        } else if edge.dst == table_key {
            let Some(src_table) = card.table(&edge.src) else { continue };
            let Some(fk) = src_table.fks.iter().find(|fk| fk.referenced_table == table_key) else {
                continue;
            };
            let on = compiled_join_condition(
                dialect,
                target_dialect,
                &edge.src,
                &edge.dst,
                &fk.local_column,
                &fk.referenced_column,
            )
            .await;
            relationships.push(TableRelationship {
                related_table: edge.src.clone(),
                sql_on_clause: on,
                cardinality: "one-to-many".to_string(),
            });
        }
    }

    if let Some(limit) = relationship_limit {
        relationships.truncate(limit);
    }

    let typical_queries = typical_queries(table_key, table, dialect, target_dialect).await;
    let fk_columns = table
        .columns
        .iter()
        .filter(|c| c.is_foreign_key)
        .map(|c| c.name.clone())
        .collect();

    Some(TableInfo {
        table: table.key.clone(),
        archetype: table.archetype.to_string(),
        business_description: table.summary.clone(),
        columns,
        relationships,
        typical_queries,
        indexing_notes: indexing_notes(table),
        pk_columns: table.pk_columns.clone(),
        fk_columns,
        approx_rowcount: table.approx_rowcount,
        is_archive: table.is_archive,
        is_audit_like: table.is_audit_like,
    })
}

fn column_constraints(c: &ColumnProfile) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(values) = &c.distinct_values {
        let sample: Vec<&str> = values.iter().take(5).map(String::as_str).collect();
        let ellipsis = if values.len() > 5 { ", ..." } else { "" };
        out.push(format!("one of: {}{ellipsis}", sample.join(", ")));
    }
    if let Some((min, max)) = c.value_range {
        out.push(format!("range: {min} to {max}"));
    }
    if c.role == ColumnRole::Date {
        out.push("supports >=, <=, BETWEEN date filters".to_string());
    }
    if !c.nullable {
        out.push("NOT NULL".to_string());
    }
    out
}

/// Same round-trip-through-the-facade pattern as the Plan Builder's join
/// rendering: normalizes the `ON` clause for the active target dialect,
/// falling back to the raw clause if the facade can't parse it.
async fn compiled_join_condition(
    dialect: &DialectFacade,
    target_dialect: DialectName,
    left: &str,
    right: &str,
    local_col: &str,
    ref_col: &str,
) -> String {
    let raw = format!("{left}.{local_col} = {right}.{ref_col}");
    let sql = format!("SELECT 1 FROM {left} JOIN {right} ON {raw}");
    match dialect.transpile(&sql, target_dialect, target_dialect, false).await {
        Ok(outcome) => extract_on_clause(&outcome.sql).unwrap_or(raw),
        Err(_) => raw,
    }
}

fn extract_on_clause(sql: &str) -> Option<String> {
    let upper = sql.to_uppercase();
    let idx = upper.rfind(" ON ")?;
    Some(sql[idx + 4..].trim_end_matches(';').trim().to_string())
}

/// Three example queries, each normalized through the dialect facade: an
/// aggregate over the first metric column, a date-filtered scan over the
/// first date column, and a primary-key lookup.
async fn typical_queries(
    table_key: &str,
    table: &crate::models::TableProfile,
    dialect: &DialectFacade,
    target_dialect: DialectName,
) -> Vec<TypicalQuery> {
    let mut out = Vec::new();

    if let Some(metric) = table.metric_columns().next() {
        let raw = format!("SELECT SUM({}) FROM {table_key}", metric.name);
        out.push(TypicalQuery {
            description: format!("Total {} across all rows", metric.name),
            sql: normalize(dialect, target_dialect, &raw).await,
        });
    }

    if let Some(date) = table.date_columns().next() {
        let raw = format!("SELECT * FROM {table_key} WHERE {} >= '2024-01-01'", date.name);
        out.push(TypicalQuery {
            description: format!("Rows since a given {}", date.name),
            sql: normalize(dialect, target_dialect, &raw).await,
        });
    }

    if let Some(pk) = table.pk_columns.first() {
        let raw = format!("SELECT * FROM {table_key} WHERE {pk} = ?");
        out.push(TypicalQuery {
            description: "Look up a single row by its primary key".to_string(),
            sql: normalize(dialect, target_dialect, &raw).await,
        });
    }

    out
}

async fn normalize(dialect: &DialectFacade, target_dialect: DialectName, raw: &str) -> String {
    match dialect.transpile(raw, target_dialect, target_dialect, false).await {
        Ok(outcome) => outcome.sql,
        Err(_) => raw.to_string(),
    }
}

fn indexing_notes(table: &crate::models::TableProfile) -> Vec<String> {
    let mut notes = Vec::new();
    if !table.pk_columns.is_empty() {
        notes.push(format!("primary key: {}", table.pk_columns.join(", ")));
    }
    let fk_cols: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.is_foreign_key)
        .map(|c| c.name.as_str())
        .collect();
    if !fk_cols.is_empty() {
        notes.push(format!("foreign keys likely indexed: {}", fk_cols.join(", ")));
    }
    if table.n_dates > 0 {
        notes.push("date columns are good candidates for range-scan indexes".to_string());
    }
    if table.archetype == Archetype::Fact && table.approx_rowcount.unwrap_or(0) > 1_000_000 {
        notes.push("large fact table; filter on indexed columns before joining".to_string());
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnRole, ForeignKeyEdge, SchemaEdge, SubjectArea, TableProfile};
    use std::collections::BTreeMap;

    fn column(name: &str, role: ColumnRole, is_pk: bool, is_fk: bool) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            sql_type: "varchar".to_string(),
            nullable: !is_pk,
            is_primary_key: is_pk,
            is_foreign_key: is_fk,
            fk_reference: None,
            null_rate: None,
            approx_distinct_ratio: None,
            sample_patterns: Vec::new(),
            semantic_tags: Vec::new(),
            role,
            distinct_values: None,
            value_range: None,
        }
    }

    fn sample_card() -> SchemaCard {
        let mut tables = BTreeMap::new();
        tables.insert(
            "sales.orders".to_string(),
            TableProfile {
                key: "sales.orders".into(),
                schema: "sales".into(),
                name: "orders".into(),
                columns: vec![
                    column("order_id", ColumnRole::Key, true, false),
                    column("customer_id", ColumnRole::Key, false, true),
                    column("order_date", ColumnRole::Date, false, false),
                    column("amount", ColumnRole::Metric, false, false),
                ],
                pk_columns: vec!["order_id".into()],
                fks: vec![ForeignKeyEdge {
                    local_column: "customer_id".into(),
                    referenced_table: "sales.customers".into(),
                    referenced_column: "customer_id".into(),
                }],
                approx_rowcount: Some(500),
                n_rows_sampled: 10,
                archetype: Archetype::Fact,
                summary: "Sales orders placed by customers.".into(),
                subject_area: "area_0".into(),
                centrality: 0.5,
                n_metrics: 1,
                n_dates: 1,
                is_archive: false,
                is_audit_like: false,
            },
        );
        tables.insert(
            "sales.customers".to_string(),
            TableProfile {
                key: "sales.customers".into(),
                schema: "sales".into(),
                name: "customers".into(),
                columns: vec![column("customer_id", ColumnRole::Key, true, false)],
                pk_columns: vec!["customer_id".into()],
                fks: Vec::new(),
                approx_rowcount: None,
                n_rows_sampled: 5,
                archetype: Archetype::Dimension,
                summary: "Customers who place orders.".into(),
                subject_area: "area_0".into(),
                centrality: 0.5,
                n_metrics: 0,
                n_dates: 0,
                is_archive: false,
                is_audit_like: false,
            },
        );

        let edges = vec![SchemaEdge {
            src: "sales.orders".into(),
            dst: "sales.customers".into(),
            descriptor: "sales.orders.customer_id->sales.customers.customer_id".into(),
        }];

        let mut subject_areas = BTreeMap::new();
        subject_areas.insert(
            "area_0".to_string(),
            SubjectArea {
                id: "area_0".into(),
                name: "Sales".into(),
                tables: vec!["sales.orders".into(), "sales.customers".into()],
                summary: "Sales domain.".into(),
            },
        );

        SchemaCard {
            dialect: "postgres".into(),
            url_fingerprint: "fp".into(),
            schemas: vec!["sales".into()],
            tables,
            edges,
            subject_areas,
            built_at: chrono::Utc::now(),
            reflection_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn builds_relationships_and_typical_queries() {
        let card = sample_card();
        let dialect = DialectFacade::new();
        let info = build_table_info(&card, "sales.orders", &dialect, DialectName::Postgres, true, None, 5, None)
            .await
            .unwrap();

        assert_eq!(info.table, "sales.orders");
        assert_eq!(info.relationships.len(), 1);
        assert_eq!(info.relationships[0].related_table, "sales.customers");
        assert_eq!(info.relationships[0].cardinality, "many-to-one");
        assert_eq!(info.typical_queries.len(), 3);
        assert!(info.indexing_notes.iter().any(|n| n.contains("primary key")));
    }

    #[tokio::test]
    async fn unknown_table_returns_none() {
        let card = sample_card();
        let dialect = DialectFacade::new();
        let info = build_table_info(&card, "sales.missing", &dialect, DialectName::Postgres, true, None, 5, None).await;
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn reverse_edge_yields_one_to_many() {
        let card = sample_card();
        let dialect = DialectFacade::new();
        let info = build_table_info(&card, "sales.customers", &dialect, DialectName::Postgres, false, None, 5, None)
            .await
            .unwrap();
        assert_eq!(info.relationships.len(), 1);
        assert_eq!(info.relationships[0].cardinality, "one-to-many");
    }

    #[tokio::test]
    async fn column_role_filter_restricts_columns() {
        let card = sample_card();
        let dialect = DialectFacade::new();
        let info = build_table_info(
            &card,
            "sales.orders",
            &dialect,
            DialectName::Postgres,
            true,
            Some(&[ColumnRole::Metric]),
            5,
            None,
        )
        .await
        .unwrap();
        assert_eq!(info.columns.len(), 1);
        assert_eq!(info.columns[0].name, "amount");
    }

    #[tokio::test]
    async fn relationship_limit_truncates() {
        let card = sample_card();
        let dialect = DialectFacade::new();
        let info = build_table_info(&card, "sales.orders", &dialect, DialectName::Postgres, true, None, 5, Some(0))
            .await
            .unwrap();
        assert!(info.relationships.is_empty());
    }
}
