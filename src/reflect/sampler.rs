//! The Sampler: pulls a bounded row sample per table over a
//! single streaming connection. Sampling never raises — failures degrade to
//! an empty sample so downstream Profiler/Entity Recognizer stages simply
//! see less evidence, never a hard error.

use std::time::Duration;

use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};
use tracing::{instrument, warn};

use crate::db::connection::SchemaDb;
use crate::reflect::reflector::ReflectedTable;

/// LOB-ish SQL type name fragments excluded from sampling. Plain `text`/`json` columns are
/// sampled normally — the Profiler needs their values for TEXT role
/// inference and pattern detection.
const LOB_TYPE_MARKERS: &[&str] = &["blob", "clob", "bytea", "varbinary", "image"];

/// A bounded sample of rows for one table, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct SampledTable {
    pub qualified_key: String,
    pub columns: Vec<String>,
    /// Row-major sampled values, stringified for downstream type-agnostic
    /// pattern/entity analysis. A `None` cell means SQL NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

impl SampledTable {
    pub fn column_values(&self, column: &str) -> Vec<Option<String>> {
        let Some(idx) = self.columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        self.rows.iter().map(|row| row[idx].clone()).collect()
    }
}

pub struct Sampler;

impl Sampler {
    /// Reservoir cap applied regardless of `per_table_rows`: no single table
    /// sample ever grows past this even if a caller misconfigures a very
    /// large `per_table_rows`.
    pub const HARD_ROW_CEILING: usize = 5_000;

    /// Sample up to `per_table_rows` rows (capped by `HARD_ROW_CEILING`) from
    /// `table` over `db`, excluding LOB-typed columns, within
    /// `sample_timeout_sec`. Never returns `Err`; failures yield an empty
    /// sample with the columns still listed.
    #[instrument(skip(db, table), fields(table = %table.qualified_key()))]
    pub async fn sample(
        db: &SchemaDb,
        table: &ReflectedTable,
        per_table_rows: usize,
        sample_timeout_sec: u64,
    ) -> SampledTable {
        let key = table.qualified_key();
        let sampled_columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| !is_lob_type(&c.sql_type))
            .map(|c| c.name.clone())
            .collect();

        if sampled_columns.is_empty() {
            return SampledTable {
                qualified_key: key,
                columns: Vec::new(),
                rows: Vec::new(),
            };
        }

        let limit = per_table_rows.min(Self::HARD_ROW_CEILING);
        let quoted_cols = sampled_columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let quoted_table = format!("\"{}\".\"{}\"", table.schema, table.name);
        let sql = format!("SELECT {quoted_cols} FROM {quoted_table} LIMIT {limit}");

        let fut = sqlx::query(&sql).fetch_all(&db.pool);
        let result = tokio::time::timeout(Duration::from_secs(sample_timeout_sec), fut).await;

        let rows = match result {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                warn!("sampling '{key}' failed: {e}");
                Vec::new()
            }
            Err(_) => {
                warn!("sampling '{key}' timed out after {sample_timeout_sec}s");
                Vec::new()
            }
        };

        let rows = rows.iter().map(stringify_row).collect();

        SampledTable {
            qualified_key: key,
            columns: sampled_columns,
            rows,
        }
    }
}

fn is_lob_type(sql_type: &str) -> bool {
    let lower = sql_type.to_lowercase();
    LOB_TYPE_MARKERS.iter().any(|m| lower.contains(m))
}

fn stringify_row(row: &AnyRow) -> Vec<Option<String>> {
    (0..row.columns().len())
        .map(|i| stringify_cell(row, i))
        .collect()
}

/// Best-effort stringification across the handful of scalar types the Any
/// driver maps. Any column whose underlying type cannot be decoded as one of
/// these is treated as NULL for sampling purposes rather than erroring.
fn stringify_cell(row: &AnyRow, idx: usize) -> Option<String> {
    let type_name = row.column(idx).type_info().name().to_uppercase();

    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(|b| b.to_string());
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return v.map(|d| d.to_string());
    }

    tracing::trace!("unrecognized column type {type_name} at index {idx}; treating as null");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_lob_type_matches_known_markers() {
        assert!(is_lob_type("bytea"));
        assert!(is_lob_type("LONGBLOB"));
        assert!(is_lob_type("VARBINARY(255)"));
        assert!(!is_lob_type("TEXT"), "plain text columns are sampled, not excluded");
        assert!(!is_lob_type("integer"));
        assert!(!is_lob_type("varchar(255)"));
    }

    #[test]
    fn column_values_returns_empty_for_unknown_column() {
        let sampled = SampledTable {
            qualified_key: "public.t".to_string(),
            columns: vec!["a".to_string()],
            rows: vec![vec![Some("1".to_string())]],
        };
        assert!(sampled.column_values("missing").is_empty());
        assert_eq!(sampled.column_values("a"), vec![Some("1".to_string())]);
    }
}
