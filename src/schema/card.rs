//! `SchemaCard`: the immutable, point-in-time snapshot of an
//! analyzed database. `build_schema_card` runs the Reflector → Sampler →
//! Profiler → Graph Builder → Classifier pipeline
//! and assembles the result.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::instrument;

use crate::config::Config;
use crate::db::connection::SchemaDb;
use crate::error::SchemaMindError;
use crate::graph::{classify_table, ClassificationInput, SchemaGraph};
use crate::models::{
    Archetype, ColumnRole, FkReference, ForeignKeyEdge, SchemaEdge, SubjectArea, TableProfile,
};
use crate::profile::{profile_column, ColumnEvidence};
use crate::reflect::reflector::{ReflectOptions, ReflectedTable, Reflector};
use crate::reflect::sampler::Sampler;

/// Snapshot of the analyzed database.
#[derive(Debug, Clone)]
pub struct SchemaCard {
    pub dialect: String,
    pub url_fingerprint: String,
    pub schemas: Vec<String>,
    pub tables: BTreeMap<String, TableProfile>,
    pub edges: Vec<SchemaEdge>,
    pub subject_areas: BTreeMap<String, SubjectArea>,
    pub built_at: DateTime<Utc>,
    pub reflection_hash: String,
}

impl SchemaCard {
    pub fn table(&self, key: &str) -> Option<&TableProfile> {
        self.tables.get(key)
    }

    /// Undirected neighbors of `key`: tables connected by an edge in either
    /// direction.
    pub fn neighbors(&self, key: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.src == key {
                    Some(e.dst.clone())
                } else if e.dst == key {
                    Some(e.src.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Run the full reflection-through-classification pipeline and assemble a
/// `SchemaCard`.
#[instrument(skip(db, config))]
pub async fn build_schema_card(db: &SchemaDb, config: &Config) -> Result<SchemaCard, SchemaMindError> {
    let reflect_opts = ReflectOptions {
        fast_startup: config.fast_startup,
        max_tables_at_startup: config.max_tables_at_startup,
        reflect_timeout_sec: config.reflect_timeout_sec,
        include_schemas: None,
        exclude_schemas: Vec::new(),
    };

    let reflected = Reflector::reflect(db, &reflect_opts).await?;
    let reflection_hash = compute_reflection_hash(db.dialect.name(), &reflected);

    let sample_futures = reflected.values().map(|table| {
        Sampler::sample(db, table, config.per_table_rows, config.sample_timeout_sec)
    });
    let samples = join_all(sample_futures).await;
    let samples_by_key: HashMap<String, _> = samples
        .into_iter()
        .map(|s| (s.qualified_key.clone(), s))
        .collect();

    let table_keys: Vec<String> = reflected.keys().cloned().collect();
    let edges = build_edges(&reflected, &table_keys);

    let graph = SchemaGraph::build(&table_keys, &edges)?;
    let analysis = graph.analyze();
    let undirected_degree = graph.undirected_degree();
    let centrality_threshold = top_quintile_threshold(&analysis.centrality);

    let incoming_fk_count: HashMap<&str, usize> =
        table_keys.iter().map(|k| (k.as_str(), 0usize)).collect();
    let mut incoming_fk_count = incoming_fk_count;
    for edge in &edges {
        *incoming_fk_count.entry(edge.dst.as_str()).or_insert(0) += 1;
    }

    let mut tables = BTreeMap::new();
    for (key, reflected_table) in &reflected {
        let empty_sample = crate::reflect::sampler::SampledTable {
            qualified_key: key.clone(),
            columns: Vec::new(),
            rows: Vec::new(),
        };
        let sampled = samples_by_key.get(key).unwrap_or(&empty_sample);

        let columns = profile_table_columns(reflected_table, sampled, config);

        let n_metrics = columns.iter().filter(|c| c.role == ColumnRole::Metric).count();
        let n_dates = columns.iter().filter(|c| c.role == ColumnRole::Date).count();
        let n_category = columns.iter().filter(|c| c.role == ColumnRole::Category).count();
        let n_text = columns.iter().filter(|c| c.role == ColumnRole::Text).count();

        let centrality = analysis.centrality.get(key).copied().unwrap_or(0.0);

        let classification = classify_table(&ClassificationInput {
            table_name: &reflected_table.name,
            pk_columns: &reflected_table.pk_columns,
            fk_column_count: reflected_table.foreign_keys.len(),
            incoming_fk_count: incoming_fk_count.get(key.as_str()).copied().unwrap_or(0),
            n_metrics,
            n_dates,
            n_category,
            n_text,
            total_columns: columns.len(),
            approx_rowcount: None,
            undirected_degree: undirected_degree.get(key).copied().unwrap_or(0),
            centrality_top_quintile: centrality >= centrality_threshold && centrality > 0.0,
        });
        let community_id = analysis.communities.get(key).copied().unwrap_or(0);
        let subject_area_id = format!("area_{community_id}");

        let fks: Vec<ForeignKeyEdge> = reflected_table
            .foreign_keys
            .iter()
            .map(|(local, ref_table, ref_col)| ForeignKeyEdge {
                local_column: local.clone(),
                referenced_table: ref_table.clone(),
                referenced_column: ref_col.clone(),
            })
            .filter(|fk| reflected.contains_key(&fk.referenced_table))
            .collect();

        let summary = build_table_summary(
            &reflected_table.name,
            classification.archetype,
            &columns,
            &fks,
        );

        tables.insert(
            key.clone(),
            TableProfile {
                key: key.clone(),
                schema: reflected_table.schema.clone(),
                name: reflected_table.name.clone(),
                columns,
                pk_columns: reflected_table.pk_columns.clone(),
                fks,
                approx_rowcount: None,
                n_rows_sampled: sampled.rows.len(),
                archetype: classification.archetype,
                summary,
                subject_area: subject_area_id,
                centrality,
                n_metrics,
                n_dates,
                is_archive: classification.is_archive,
                is_audit_like: classification.is_audit_like,
            },
        );
    }

    let subject_areas = build_subject_areas(&tables);
    let schemas: Vec<String> = reflected
        .values()
        .map(|t| t.schema.clone())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(SchemaCard {
        dialect: db.dialect.name().to_string(),
        url_fingerprint: db.url_fingerprint.clone(),
        schemas,
        tables,
        edges,
        subject_areas,
        built_at: Utc::now(),
        reflection_hash,
    })
}

/// The centrality value at the top-quintile boundary: a table qualifies for
/// the Classifier's audit-like centrality clause when its
/// centrality is at or above this value.
fn top_quintile_threshold(centrality: &HashMap<String, f64>) -> f64 {
    if centrality.is_empty() {
        return f64::INFINITY;
    }
    let mut values: Vec<f64> = centrality.values().copied().collect();
    values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let cutoff = ((values.len() as f64) * 0.2).ceil().max(1.0) as usize;
    values[cutoff.saturating_sub(1).min(values.len() - 1)]
}

fn build_edges(reflected: &BTreeMap<String, ReflectedTable>, table_keys: &[String]) -> Vec<SchemaEdge> {
    let mut edges = Vec::new();
    for (key, table) in reflected {
        for (local_col, ref_table, ref_col) in &table.foreign_keys {
            if !table_keys.contains(ref_table) {
                continue;
            }
            edges.push(SchemaEdge {
                src: key.clone(),
                dst: ref_table.clone(),
                descriptor: format!("{key}.{local_col}->{ref_table}.{ref_col}"),
            });
        }
    }
    edges
}

fn profile_table_columns(
    table: &ReflectedTable,
    sampled: &crate::reflect::sampler::SampledTable,
    config: &Config,
) -> Vec<crate::models::ColumnProfile> {
    table
        .columns
        .iter()
        .take(config.max_sampled_columns.max(table.pk_columns.len() + 1))
        .map(|col| {
            let is_primary_key = table.pk_columns.contains(&col.name);
            let fk_match = table
                .foreign_keys
                .iter()
                .find(|(local, _, _)| local == &col.name);
            let is_foreign_key = fk_match.is_some();
            let fk_reference = fk_match.map(|(_, ref_table, ref_col)| FkReference {
                referenced_table: ref_table.clone(),
                referenced_column: ref_col.clone(),
            });
            let values = sampled.column_values(&col.name);

            profile_column(ColumnEvidence {
                name: &col.name,
                sql_type: &col.sql_type,
                nullable: col.nullable,
                is_primary_key,
                is_foreign_key,
                fk_reference,
                sample_values: &values,
                value_constraint_threshold: config.value_constraint_threshold,
            })
        })
        .collect()
}

/// Summary text concatenating archetype, key columns, date columns, metric
/// columns, dimension columns, and top FK references.
fn build_table_summary(
    table_name: &str,
    archetype: Archetype,
    columns: &[crate::models::ColumnProfile],
    fks: &[ForeignKeyEdge],
) -> String {
    let key_cols: Vec<&str> = columns
        .iter()
        .filter(|c| c.role == ColumnRole::Key)
        .map(|c| c.name.as_str())
        .collect();
    let date_cols: Vec<&str> = columns
        .iter()
        .filter(|c| c.role == ColumnRole::Date)
        .map(|c| c.name.as_str())
        .collect();
    let metric_cols: Vec<&str> = columns
        .iter()
        .filter(|c| c.role == ColumnRole::Metric)
        .map(|c| c.name.as_str())
        .collect();
    let dimension_cols: Vec<&str> = columns
        .iter()
        .filter(|c| c.role == ColumnRole::Category)
        .map(|c| c.name.as_str())
        .collect();

    let mut parts = vec![format!("{archetype} table '{table_name}'")];
    if !key_cols.is_empty() {
        parts.push(format!("keyed by {}", key_cols.join(", ")));
    }
    if !date_cols.is_empty() {
        parts.push(format!("dated via {}", date_cols.join(", ")));
    }
    if !metric_cols.is_empty() {
        parts.push(format!("measuring {}", metric_cols.join(", ")));
    }
    if !dimension_cols.is_empty() {
        parts.push(format!("dimensioned by {}", dimension_cols.join(", ")));
    }
    if !fks.is_empty() {
        let refs: Vec<String> = fks.iter().take(3).map(|fk| fk.referenced_table.clone()).collect();
        parts.push(format!("referencing {}", refs.join(", ")));
    }
    parts.join("; ")
}

fn build_subject_areas(tables: &BTreeMap<String, TableProfile>) -> BTreeMap<String, SubjectArea> {
    let mut by_area: BTreeMap<String, Vec<&TableProfile>> = BTreeMap::new();
    for table in tables.values() {
        by_area.entry(table.subject_area.clone()).or_default().push(table);
    }

    by_area
        .into_iter()
        .map(|(id, mut members)| {
            members.sort_by(|a, b| b.centrality.partial_cmp(&a.centrality).unwrap_or(std::cmp::Ordering::Equal));
            let name = area_name(&members);
            let table_keys: Vec<String> = members.iter().map(|t| t.key.clone()).collect();
            let summary = format!("Tables: {}", table_keys.join(", "));
            (
                id.clone(),
                SubjectArea {
                    id,
                    name,
                    tables: table_keys,
                    summary,
                },
            )
        })
        .collect()
}

fn area_name(members: &[&TableProfile]) -> String {
    let names: Vec<String> = members
        .iter()
        .take(2)
        .map(|t| capitalize(&t.name))
        .collect();
    if names.is_empty() {
        "Uncategorized".to_string()
    } else {
        names.join(" & ")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.replace('_', " ").chars().collect::<Vec<_>>();
    if let Some(first) = chars.first_mut() {
        *first = first.to_ascii_uppercase();
    }
    chars.into_iter().collect()
}

/// Deterministic fingerprint of the reflection payload:
/// dialect plus every table's columns/types/PK/FK, hashed in sorted order
/// so the hash depends only on schema shape, not reflection order.
fn compute_reflection_hash(dialect: &str, reflected: &BTreeMap<String, ReflectedTable>) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    dialect.hash(&mut hasher);
    for (key, table) in reflected {
        key.hash(&mut hasher);
        for col in &table.columns {
            col.name.hash(&mut hasher);
            col.sql_type.hash(&mut hasher);
            col.nullable.hash(&mut hasher);
        }
        for pk in &table.pk_columns {
            pk.hash(&mut hasher);
        }
        for (local, ref_table, ref_col) in &table.foreign_keys {
            local.hash(&mut hasher);
            ref_table.hash(&mut hasher);
            ref_col.hash(&mut hasher);
        }
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::reflector::ReflectedColumn;

    fn table(name: &str, cols: &[(&str, &str)]) -> ReflectedTable {
        ReflectedTable {
            schema: "public".to_string(),
            name: name.to_string(),
            columns: cols
                .iter()
                .map(|(n, t)| ReflectedColumn {
                    name: n.to_string(),
                    sql_type: t.to_string(),
                    nullable: true,
                })
                .collect(),
            pk_columns: vec!["id".to_string()],
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn reflection_hash_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("public.t1".to_string(), table("t1", &[("id", "integer")]));
        a.insert("public.t2".to_string(), table("t2", &[("id", "integer")]));

        let mut b = BTreeMap::new();
        b.insert("public.t2".to_string(), table("t2", &[("id", "integer")]));
        b.insert("public.t1".to_string(), table("t1", &[("id", "integer")]));

        assert_eq!(compute_reflection_hash("postgres", &a), compute_reflection_hash("postgres", &b));
    }

    #[test]
    fn reflection_hash_changes_with_schema_shape() {
        let mut a = BTreeMap::new();
        a.insert("public.t1".to_string(), table("t1", &[("id", "integer")]));
        let mut b = BTreeMap::new();
        b.insert("public.t1".to_string(), table("t1", &[("id", "integer"), ("name", "text")]));

        assert_ne!(compute_reflection_hash("postgres", &a), compute_reflection_hash("postgres", &b));
    }

    #[test]
    fn area_name_uses_top_tables_by_centrality() {
        let t1 = TableProfile {
            key: "public.orders".into(),
            schema: "public".into(),
            name: "orders".into(),
            columns: Vec::new(),
            pk_columns: Vec::new(),
            fks: Vec::new(),
            approx_rowcount: None,
            n_rows_sampled: 0,
            archetype: Archetype::Fact,
            summary: String::new(),
            subject_area: "area_0".into(),
            centrality: 0.9,
            n_metrics: 0,
            n_dates: 0,
            is_archive: false,
            is_audit_like: false,
        };
        let name = area_name(&[&t1]);
        assert_eq!(name, "Orders");
    }
}
