//! The Classifier: assigns each table an `Archetype` via five
//! priority rules, then flags audit-like and archive tables.

use crate::models::Archetype;
use crate::utils::tokenize::tokenize_identifier;

const GENERIC_DIMENSION_TOKENS: &[&str] = &[
    "user", "users", "transaction", "transactions", "status", "log", "logs",
];
const ARCHIVE_TOKENS: &[&str] = &[
    "archive", "archived", "hist", "history", "backup", "bak", "old", "tmp", "temp", "snapshot",
    "snap",
];

/// Evidence the Classifier needs about one table. Built from the
/// already-profiled `TableProfile` plus graph-derived facts (incoming FK
/// count, undirected degree) that the table itself doesn't know about.
pub struct ClassificationInput<'a> {
    pub table_name: &'a str,
    pub pk_columns: &'a [String],
    /// Local columns that are foreign keys (outgoing FKs).
    pub fk_column_count: usize,
    pub incoming_fk_count: usize,
    pub n_metrics: usize,
    pub n_dates: usize,
    pub n_category: usize,
    pub n_text: usize,
    pub total_columns: usize,
    pub approx_rowcount: Option<i64>,
    /// Degree on the undirected FK-graph projection.
    pub undirected_degree: usize,
    /// Top-quintile centrality among this build's tables (audit-like flag).
    pub centrality_top_quintile: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub archetype: Archetype,
    pub is_audit_like: bool,
    pub is_archive: bool,
}

pub fn classify_table(input: &ClassificationInput<'_>) -> ClassificationResult {
    let archetype = classify_archetype(input);
    let is_audit_like = name_has_any_token(input.table_name, GENERIC_DIMENSION_TOKENS)
        || (input.centrality_top_quintile && input.n_metrics == 0 && input.n_dates == 0);
    let is_archive = name_has_any_token(input.table_name, ARCHIVE_TOKENS);

    ClassificationResult {
        archetype,
        is_audit_like,
        is_archive,
    }
}

/// Priority rules per  (first match wins).
fn classify_archetype(input: &ClassificationInput<'_>) -> Archetype {
    // (1) BRIDGE: compound PK, all PK columns are FKs, <=1 non-key column,
    // undirected degree >= 2.
    if input.pk_columns.len() >= 2
        && input.fk_column_count >= input.pk_columns.len()
        && input.total_columns.saturating_sub(input.pk_columns.len()) <= 1
        && input.undirected_degree >= 2
    {
        return Archetype::Bridge;
    }

    // (2) FACT: n_metrics >= 2, n_dates >= 1, undirected degree >= 2.
    if input.n_metrics >= 2 && input.n_dates >= 1 && input.undirected_degree >= 2 {
        return Archetype::Fact;
    }

    // (3) DIMENSION: in-degree >= 2, n_metrics <= 1, |PK| = 1.
    if input.incoming_fk_count >= 2 && input.n_metrics <= 1 && input.pk_columns.len() == 1 {
        return Archetype::Dimension;
    }

    // (4) REFERENCE: column count <= 4, n_metrics = 0, undirected degree >= 1.
    if input.total_columns <= 4 && input.n_metrics == 0 && input.undirected_degree >= 1 {
        return Archetype::Reference;
    }

    // (5) default.
    Archetype::Operational
}

fn name_has_any_token(name: &str, tokens: &[&str]) -> bool {
    let table_tokens = tokenize_identifier(name);
    table_tokens.iter().any(|t| tokens.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> ClassificationInput<'static> {
        ClassificationInput {
            table_name: "orders",
            pk_columns: &[],
            fk_column_count: 0,
            incoming_fk_count: 0,
            n_metrics: 0,
            n_dates: 0,
            n_category: 0,
            n_text: 0,
            total_columns: 0,
            approx_rowcount: None,
            undirected_degree: 0,
            centrality_top_quintile: false,
        }
    }

    #[test]
    fn composite_fk_only_pk_is_bridge() {
        let pk = vec!["order_id".to_string(), "product_id".to_string()];
        let input = ClassificationInput {
            pk_columns: &pk,
            fk_column_count: 2,
            total_columns: 3,
            undirected_degree: 2,
            ..base_input()
        };
        assert_eq!(classify_archetype(&input), Archetype::Bridge);
    }

    #[test]
    fn single_column_pk_fk_is_not_bridge() {
        let pk = vec!["customer_id".to_string()];
        let input = ClassificationInput {
            pk_columns: &pk,
            fk_column_count: 1,
            total_columns: 2,
            undirected_degree: 2,
            ..base_input()
        };
        assert_ne!(classify_archetype(&input), Archetype::Bridge);
    }

    #[test]
    fn bridge_requires_undirected_degree_of_at_least_two() {
        let pk = vec!["order_id".to_string(), "product_id".to_string()];
        let input = ClassificationInput {
            pk_columns: &pk,
            fk_column_count: 2,
            total_columns: 3,
            undirected_degree: 1,
            ..base_input()
        };
        assert_ne!(classify_archetype(&input), Archetype::Bridge);
    }

    #[test]
    fn metrics_and_dates_and_degree_is_fact() {
        let input = ClassificationInput {
            n_metrics: 3,
            n_dates: 1,
            undirected_degree: 2,
            total_columns: 8,
            ..base_input()
        };
        assert_eq!(classify_archetype(&input), Archetype::Fact);
    }

    #[test]
    fn heavily_referenced_single_pk_table_is_dimension() {
        let input = ClassificationInput {
            incoming_fk_count: 5,
            n_metrics: 0,
            pk_columns: &["customer_id".to_string()],
            n_category: 3,
            total_columns: 4,
            ..base_input()
        };
        assert_eq!(classify_archetype(&input), Archetype::Dimension);
    }

    #[test]
    fn small_column_count_with_degree_is_reference() {
        let input = ClassificationInput {
            n_category: 2,
            total_columns: 3,
            undirected_degree: 1,
            ..base_input()
        };
        assert_eq!(classify_archetype(&input), Archetype::Reference);
    }

    #[test]
    fn reference_requires_undirected_degree_of_at_least_one() {
        let input = ClassificationInput {
            n_category: 2,
            total_columns: 3,
            undirected_degree: 0,
            ..base_input()
        };
        assert_eq!(classify_archetype(&input), Archetype::Operational);
    }

    #[test]
    fn generic_dimension_token_in_name_is_audit_like() {
        let input = ClassificationInput {
            table_name: "user_status_log",
            ..base_input()
        };
        let result = classify_table(&input);
        assert!(result.is_audit_like);
    }

    #[test]
    fn top_quintile_centrality_with_no_metrics_or_dates_is_audit_like() {
        let input = ClassificationInput {
            table_name: "widgets",
            centrality_top_quintile: true,
            ..base_input()
        };
        let result = classify_table(&input);
        assert!(result.is_audit_like);
    }

    #[test]
    fn archive_table_name_is_flagged() {
        let input = ClassificationInput {
            table_name: "customers_archive",
            ..base_input()
        };
        let result = classify_table(&input);
        assert!(result.is_archive);
    }

    #[test]
    fn single_pk_fk_column_table_has_key_role_and_is_not_bridge() {
        //  boundary case: a table with a single column that is both
        // PK and FK is never BRIDGE (|PK|=1), regardless of degree.
        let pk = vec!["id".to_string()];
        let input = ClassificationInput {
            pk_columns: &pk,
            fk_column_count: 1,
            total_columns: 1,
            undirected_degree: 5,
            ..base_input()
        };
        assert_ne!(classify_archetype(&input), Archetype::Bridge);
    }
}
