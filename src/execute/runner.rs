//! `execute_query`'s execution path: guard against mutating
//! statements, normalize to the active dialect, run with bounded rows, and
//! truncate both rows and oversized cells. Database errors never propagate
//! as `Err` from [`ExecutionRunner::execute`] — they come back as a
//! `status=error` [`ExecuteQueryResult`] with assist notes.

use std::time::Instant;

use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};
use tracing::instrument;

use crate::config::Config;
use crate::db::connection::SchemaDb;
use crate::dialect::facade::{DialectFacade, DialectName};
use crate::models::execute::{ExecuteQueryResult, ExecuteStatus, ExecutionMetadata};

/// Leading keywords that mark a statement as mutating.
/// Matched against the first token of each `;`-separated statement after
/// lowercasing, so `"INSERT INTO"` and `"insert  into"` are both caught.
const BANNED_LEADING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "merge", "alter", "create", "drop", "truncate", "grant", "revoke",
];

pub struct ExecutionRunner<'a> {
    db: &'a SchemaDb,
    dialect: &'a DialectFacade,
    config: &'a Config,
}

impl<'a> ExecutionRunner<'a> {
    pub fn new(db: &'a SchemaDb, dialect: &'a DialectFacade, config: &'a Config) -> Self {
        Self { db, dialect, config }
    }

    /// Run `sql` end to end: guard, normalize, validate, execute with bounds,
    /// truncate. Always returns `Ok` — execution failures are reported as a
    /// `status=error` result, never as a `Result::Err`.
    #[instrument(skip(self, sql))]
    pub async fn execute(&self, sql: &str) -> ExecuteQueryResult {
        let target = DialectName::from(self.db.dialect);

        if let Some(violation) = guard_select_only(sql) {
            return ExecuteQueryResult {
                sql: sql.to_string(),
                execution: ExecutionMetadata {
                    dialect: target.as_str().to_string(),
                    elapsed_ms: 0,
                    row_limit: self.config.row_limit,
                    rows_returned: 0,
                    truncated: false,
                },
                results: Vec::new(),
                validation_notes: vec![format!(
                    "Only SELECT queries are permitted; rejected statement starting with '{violation}'"
                )],
                recommended_next_steps: vec![
                    "Rewrite the request as a SELECT; use execute_query only to read data".to_string(),
                ],
                assist_notes: None,
                status: ExecuteStatus::Error,
            };
        }

        let stripped = sql.trim().trim_end_matches(';').to_string();

        let mut validation_notes = Vec::new();
        let normalized = match self.dialect.auto_transpile(&stripped, target, false).await {
            Ok(outcome) => {
                validation_notes.extend(outcome.notes.clone());
                outcome.sql
            }
            Err(e) => {
                validation_notes.push(format!("dialect normalization skipped: {e}"));
                stripped.clone()
            }
        };

        let validation = self.dialect.validate(&normalized, target).await;
        if !validation.valid {
            validation_notes.push(format!(
                "dialect validator flagged this query (advisory, execution still attempted): {}",
                validation.error.unwrap_or_default()
            ));
        }

        let start = Instant::now();
        let limit = self.config.row_limit;
        let bounded_sql = format!("SELECT * FROM ({normalized}) AS schemamind_bounded LIMIT {}", limit + 1);

        match sqlx::query(&bounded_sql).fetch_all(&self.db.pool).await {
            Ok(rows) => {
                let truncated = rows.len() > limit;
                let take = rows.len().min(limit);
                let results: Vec<Value> = rows
                    .iter()
                    .take(take)
                    .map(|row| row_to_json(row, self.config.max_cell_chars))
                    .collect();

                let mut recommended_next_steps = Vec::new();
                if truncated {
                    recommended_next_steps.push(
                        "Results truncated; add WHERE filters or a smaller projection to see the rest"
                            .to_string(),
                    );
                }

                ExecuteQueryResult {
                    sql: normalized,
                    execution: ExecutionMetadata {
                        dialect: target.as_str().to_string(),
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        row_limit: limit,
                        rows_returned: take,
                        truncated,
                    },
                    results,
                    validation_notes,
                    recommended_next_steps,
                    assist_notes: None,
                    status: ExecuteStatus::Ok,
                }
            }
            Err(e) => {
                let assists = self.dialect.error_assist(&normalized, target, &e.to_string());
                let assist_notes: Vec<String> = assists
                    .iter()
                    .flat_map(|a| {
                        vec![
                            format!("Cause: {}", a.likely_cause),
                            format!("Fix: {}", a.fix_suggestion),
                        ]
                    })
                    .collect();

                ExecuteQueryResult {
                    sql: normalized,
                    execution: ExecutionMetadata {
                        dialect: target.as_str().to_string(),
                        elapsed_ms: start.elapsed().as_millis() as u64,
                        row_limit: limit,
                        rows_returned: 0,
                        truncated: false,
                    },
                    results: Vec::new(),
                    validation_notes,
                    recommended_next_steps: vec![
                        "Inspect assist_notes for likely causes and fixes".to_string(),
                    ],
                    assist_notes: Some(assist_notes),
                    status: ExecuteStatus::Error,
                }
            }
        }
    }
}

/// Returns the offending leading keyword if any `;`-separated statement in
/// `sql` starts with a banned mutating keyword.
fn guard_select_only(sql: &str) -> Option<String> {
    let lower = sql.to_lowercase();
    for statement in lower.split(';') {
        let trimmed = statement.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        for banned in BANNED_LEADING_KEYWORDS {
            let prefix = format!("{banned} ");
            if trimmed.starts_with(&prefix) {
                return Some((*banned).to_string());
            }
        }
    }
    None
}

/// Render one row as a JSON object, column name -> cell value, with
/// non-numeric/non-boolean/non-null string cells truncated past
/// `max_cell_chars`.
fn row_to_json(row: &AnyRow, max_cell_chars: usize) -> Value {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = cell_to_json(row, idx, max_cell_chars);
        map.insert(column.name().to_string(), value);
    }
    Value::Object(map)
}

fn cell_to_json(row: &AnyRow, idx: usize, max_cell_chars: usize) -> Value {
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::from(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(truncate_cell(&v, max_cell_chars));
    }
    if let Ok(Some(v)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return Value::String(truncate_cell(&v.to_string(), max_cell_chars));
    }

    let type_name = row.column(idx).type_info().name();
    tracing::trace!("unrecognized column type {type_name} at index {idx}; reporting null");
    Value::Null
}

/// Truncate a string cell to `max_cell_chars - 1` characters plus a single
/// ellipsis, when it exceeds `max_cell_chars`.
fn truncate_cell(value: &str, max_cell_chars: usize) -> String {
    if value.chars().count() <= max_cell_chars {
        return value.to_string();
    }
    let keep = max_cell_chars.saturating_sub(1);
    let truncated: String = value.chars().take(keep).collect();
    format!("{truncated}\u{2026}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_catches_leading_mutating_keywords() {
        assert_eq!(guard_select_only("DROP TABLE t"), Some("drop".to_string()));
        assert_eq!(
            guard_select_only("  insert into t values (1)"),
            Some("insert".to_string())
        );
        assert_eq!(guard_select_only("SELECT * FROM t; DELETE FROM t"), Some("delete".to_string()));
        assert_eq!(guard_select_only("SELECT * FROM t WHERE name = 'update me'"), None);
    }

    #[test]
    fn guard_allows_plain_select() {
        assert_eq!(guard_select_only("SELECT id, name FROM customers"), None);
    }

    #[test]
    fn truncate_cell_adds_single_ellipsis() {
        let truncated = truncate_cell("abcdefghij", 5);
        assert_eq!(truncated, "abcd\u{2026}");
        assert_eq!(truncated.chars().count(), 5);
    }

    #[test]
    fn truncate_cell_leaves_short_strings_alone() {
        assert_eq!(truncate_cell("hi", 10), "hi");
    }
}
