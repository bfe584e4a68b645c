//! The Profiler: turns a reflected column plus its sampled
//! values into a `ColumnProfile` — role inference, pattern tags, value
//! constraints, and semantic tags from the Entity Recognizer.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ColumnProfile, ColumnRole, FkReference};
use crate::profile::entity::recognize_entities;
use crate::utils::tokenize::{has_date_token, tokenize_identifier};

/// Everything the Profiler needs about one column to produce a `ColumnProfile`.
pub struct ColumnEvidence<'a> {
    pub name: &'a str,
    pub sql_type: &'a str,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub fk_reference: Option<FkReference>,
    /// Sampled values for this column (`None` = SQL NULL).
    pub sample_values: &'a [Option<String>],
    pub value_constraint_threshold: usize,
}

const TEMPORAL_TYPE_MARKERS: &[&str] = &["date", "time", "timestamp"];
const NUMERIC_TYPE_MARKERS: &[&str] = &[
    "int", "serial", "numeric", "decimal", "float", "double", "real", "money",
];
const TEXT_TYPE_MARKERS: &[&str] = &["char", "text", "clob", "string"];
/// Minimum distinct-value count for a numeric column to be classed METRIC
/// rather than CATEGORY.
const METRIC_DISTINCT_THRESHOLD: usize = 10;

pub fn profile_column(evidence: ColumnEvidence<'_>) -> ColumnProfile {
    let non_null: Vec<&str> = evidence
        .sample_values
        .iter()
        .filter_map(|v| v.as_deref())
        .collect();

    let total = evidence.sample_values.len();
    let null_count = total - non_null.len();
    let null_rate = if total > 0 {
        Some(null_count as f64 / total as f64)
    } else {
        None
    };

    let mut distinct: Vec<&str> = non_null.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let distinct_count = distinct.len();

    let approx_distinct_ratio = if !non_null.is_empty() {
        Some(distinct_count as f64 / non_null.len() as f64)
    } else {
        None
    };

    let role = infer_role(&evidence, distinct_count);

    let sample_patterns = detect_patterns(&non_null);

    let semantic_tags = recognize_entities(evidence.name)
        .into_iter()
        .map(|m| m.tag())
        .collect();

    let distinct_values = if distinct_count > 0 && distinct_count <= evidence.value_constraint_threshold {
        let mut values: Vec<String> = distinct.iter().map(|s| s.to_string()).collect();
        values.sort();
        Some(values)
    } else {
        None
    };

    // Only low-cardinality numeric metrics carry a value_range (spec §3,
    // §4.3); a numeric PK or a high-cardinality metric does not.
    let value_range = if role == ColumnRole::Metric
        && distinct_count > 0
        && distinct_count <= evidence.value_constraint_threshold
    {
        let parsed: Vec<f64> = non_null.iter().filter_map(|v| v.parse::<f64>().ok()).collect();
        if parsed.is_empty() {
            None
        } else {
            let min = parsed.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = parsed.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some((min, max))
        }
    } else {
        None
    };

    ColumnProfile {
        name: evidence.name.to_string(),
        sql_type: evidence.sql_type.to_lowercase(),
        nullable: evidence.nullable,
        is_primary_key: evidence.is_primary_key,
        is_foreign_key: evidence.is_foreign_key,
        fk_reference: evidence.fk_reference,
        null_rate,
        approx_distinct_ratio,
        sample_patterns,
        semantic_tags,
        role,
        distinct_values,
        value_range,
    }
}

fn infer_role(evidence: &ColumnEvidence<'_>, distinct_count: usize) -> ColumnRole {
    // (1) temporal type, or date-named token on a non-numeric type (a
    // numeric column like `order_year INTEGER` is not a date).
    if is_temporal_type(evidence.sql_type)
        || (has_date_token(evidence.name) && !is_numeric_type(evidence.sql_type))
    {
        return ColumnRole::Date;
    }

    // (2) PK/FK/ID-suffix.
    if evidence.is_primary_key || evidence.is_foreign_key || has_id_suffix(evidence.name) {
        return ColumnRole::Key;
    }

    // (3) numeric: METRIC if enough distinct values to look continuous, else CATEGORY.
    if is_numeric_type(evidence.sql_type) {
        return if distinct_count > METRIC_DISTINCT_THRESHOLD {
            ColumnRole::Metric
        } else {
            ColumnRole::Category
        };
    }

    // (4) text.
    if is_text_type(evidence.sql_type) {
        return ColumnRole::Text;
    }

    // (5) default.
    ColumnRole::Category
}

fn has_id_suffix(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower == "id" {
        return true;
    }
    let tokens = tokenize_identifier(name);
    tokens.last().map(|t| t == "id").unwrap_or(false)
}

fn is_temporal_type(sql_type: &str) -> bool {
    let lower = sql_type.to_lowercase();
    TEMPORAL_TYPE_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_numeric_type(sql_type: &str) -> bool {
    let lower = sql_type.to_lowercase();
    NUMERIC_TYPE_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_text_type(sql_type: &str) -> bool {
    let lower = sql_type.to_lowercase();
    TEXT_TYPE_MARKERS.iter().any(|m| lower.contains(m))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9()\-. ]{6,}[0-9]$").expect("valid regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://\S+$").expect("valid regex"))
}

fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?\s?%$").expect("valid regex"))
}

/// Detect value-shape pattern tags: `email-like`, `phone-like`,
/// `url-like`, `percent-like`. A tag is reported if at least half of the
/// non-empty sample matches.
fn detect_patterns(non_null: &[&str]) -> Vec<String> {
    let sample: Vec<&str> = non_null.iter().copied().filter(|v| !v.trim().is_empty()).collect();
    if sample.is_empty() {
        return Vec::new();
    }

    let checks: [(&str, &dyn Fn(&str) -> bool); 4] = [
        ("email-like", &|v: &str| email_regex().is_match(v.trim())),
        ("phone-like", &|v: &str| phone_regex().is_match(v.trim())),
        ("url-like", &|v: &str| url_regex().is_match(v.trim())),
        ("percent-like", &|v: &str| percent_regex().is_match(v.trim())),
    ];

    let mut tags = Vec::new();
    for (tag, check) in checks {
        let matches = sample.iter().filter(|v| check(v)).count();
        if matches * 2 >= sample.len() {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence<'a>(
        name: &'a str,
        sql_type: &'a str,
        values: &'a [Option<String>],
    ) -> ColumnEvidence<'a> {
        ColumnEvidence {
            name,
            sql_type,
            nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            fk_reference: None,
            sample_values: values,
            value_constraint_threshold: 20,
        }
    }

    #[test]
    fn pk_column_is_always_key_role() {
        let values = vec![Some("1".to_string()), Some("2".to_string())];
        let mut ev = evidence("id", "integer", &values);
        ev.is_primary_key = true;
        let profile = profile_column(ev);
        assert_eq!(profile.role, ColumnRole::Key);
        assert!(profile.invariants_hold());
    }

    #[test]
    fn temporal_type_wins_over_key_heuristics() {
        let values = vec![Some("2024-01-01".to_string())];
        let profile = profile_column(evidence("created_at", "timestamp", &values));
        assert_eq!(profile.role, ColumnRole::Date);
    }

    #[test]
    fn numeric_with_many_distinct_values_is_metric() {
        let values: Vec<Option<String>> = (0..50).map(|n| Some(n.to_string())).collect();
        let profile = profile_column(evidence("amount", "numeric", &values));
        assert_eq!(profile.role, ColumnRole::Metric);
        // High-cardinality metric: above value_constraint_threshold, so no range.
        assert_eq!(profile.value_range, None);
    }

    #[test]
    fn numeric_column_with_date_named_token_is_not_date() {
        // "order_year" contains the date token "year" but is numeric, so it
        // must not be classified DATE (spec §4.3 rule 1's non-numeric guard).
        let values: Vec<Option<String>> = (2015..2025).map(|n| Some(n.to_string())).collect();
        let profile = profile_column(evidence("order_year", "integer", &values));
        assert_ne!(profile.role, ColumnRole::Date);
    }

    #[test]
    fn date_named_text_column_is_still_date() {
        let values = vec![Some("2024-01-01".to_string())];
        let profile = profile_column(evidence("signup_day", "varchar(20)", &values));
        assert_eq!(profile.role, ColumnRole::Date);
    }

    #[test]
    fn low_cardinality_metric_gets_value_range() {
        let values: Vec<Option<String>> = vec!["11", "12", "13", "14", "15", "16", "17", "18", "19", "20", "21"]
            .into_iter()
            .map(|v| Some(v.to_string()))
            .collect();
        let profile = profile_column(evidence("rating", "integer", &values));
        assert_eq!(profile.role, ColumnRole::Metric);
        assert_eq!(profile.value_range, Some((11.0, 21.0)));
    }

    #[test]
    fn numeric_primary_key_has_no_value_range() {
        let values: Vec<Option<String>> = vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string())];
        let mut ev = evidence("id", "integer", &values);
        ev.is_primary_key = true;
        let profile = profile_column(ev);
        assert_eq!(profile.role, ColumnRole::Key);
        assert_eq!(profile.value_range, None);
    }

    #[test]
    fn numeric_with_few_distinct_values_is_category() {
        let values: Vec<Option<String>> = vec![
            Some("1".to_string()),
            Some("2".to_string()),
            Some("1".to_string()),
            Some("3".to_string()),
        ];
        let profile = profile_column(evidence("status_code", "integer", &values));
        assert_eq!(profile.role, ColumnRole::Category);
    }

    #[test]
    fn text_column_defaults_to_text_role() {
        let values = vec![Some("hello world".to_string())];
        let profile = profile_column(evidence("description", "varchar(255)", &values));
        assert_eq!(profile.role, ColumnRole::Text);
    }

    #[test]
    fn detects_email_pattern() {
        let values = vec![
            Some("a@example.com".to_string()),
            Some("b@example.com".to_string()),
        ];
        let profile = profile_column(evidence("contact", "varchar(255)", &values));
        assert!(profile.sample_patterns.contains(&"email-like".to_string()));
    }

    #[test]
    fn small_distinct_set_is_recorded_as_value_constraint() {
        let values = vec![
            Some("active".to_string()),
            Some("inactive".to_string()),
            Some("active".to_string()),
        ];
        let profile = profile_column(evidence("status", "varchar(20)", &values));
        assert_eq!(
            profile.distinct_values,
            Some(vec!["active".to_string(), "inactive".to_string()])
        );
    }
}
