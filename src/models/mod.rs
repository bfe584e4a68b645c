//! Typed containers for all inputs/outputs of the tool interfaces.
//!
//! These are the wire-contract types: `QueryPlan`, `TableInfo`, `DatabaseSummary`,
//! and `ExecuteQueryResult` must round-trip as JSON, so every field here derives
//! `Serialize`/`Deserialize`/`JsonSchema` and avoids types that don't round-trip
//! cleanly (no `HashMap` where key order matters — `BTreeMap`/`Vec` instead).

pub mod execute;
pub mod overview;
pub mod plan;
pub mod table_info;

pub use execute::ExecuteQueryResult;
pub use overview::DatabaseSummary;
pub use plan::QueryPlan;
pub use table_info::TableInfo;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Column role. Exactly one per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Key,
    Date,
    Metric,
    Category,
    Text,
    Id,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ColumnRole::Key => "key",
            ColumnRole::Date => "date",
            ColumnRole::Metric => "metric",
            ColumnRole::Category => "category",
            ColumnRole::Text => "text",
            ColumnRole::Id => "id",
        };
        f.write_str(s)
    }
}

/// Table archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Archetype {
    Fact,
    Dimension,
    Bridge,
    Reference,
    Operational,
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Archetype::Fact => "FACT",
            Archetype::Dimension => "DIMENSION",
            Archetype::Bridge => "BRIDGE",
            Archetype::Reference => "REFERENCE",
            Archetype::Operational => "OPERATIONAL",
        };
        f.write_str(s)
    }
}

/// A foreign-key reference to a qualified table + column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FkReference {
    pub referenced_table: String,
    pub referenced_column: String,
}

/// A single column's profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnProfile {
    pub name: String,
    /// Normalized, lowercase SQL type string.
    pub sql_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fk_reference: Option<FkReference>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub null_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approx_distinct_ratio: Option<f64>,
    /// Ordered, deduplicated pattern tags: email-like, phone-like, url-like, percent-like.
    #[serde(default)]
    pub sample_patterns: Vec<String>,
    /// Ordered, deduplicated semantic tags, including entity-type tags like
    /// `COUNTRY:US`, `CURRENCY:EUR`, `TIMEZONE:America/New_York`.
    #[serde(default)]
    pub semantic_tags: Vec<String>,
    pub role: ColumnRole,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distinct_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value_range: Option<(f64, f64)>,
}

impl ColumnProfile {
    /// Invariant: `is_primary_key ⇒ role == KEY`; `fk_reference` present iff `is_foreign_key`.
    pub fn invariants_hold(&self) -> bool {
        let pk_ok = !self.is_primary_key || self.role == ColumnRole::Key;
        let fk_ok = self.is_foreign_key == self.fk_reference.is_some();
        pk_ok && fk_ok
    }
}

/// A single table's profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableProfile {
    /// `"<schema>.<table>"`.
    pub key: String,
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnProfile>,
    pub pk_columns: Vec<String>,
    pub fks: Vec<ForeignKeyEdge>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approx_rowcount: Option<i64>,
    pub n_rows_sampled: usize,
    pub archetype: Archetype,
    pub summary: String,
    pub subject_area: String,
    pub centrality: f64,
    pub n_metrics: usize,
    pub n_dates: usize,
    pub is_archive: bool,
    pub is_audit_like: bool,
}

impl TableProfile {
    pub fn metric_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Metric)
    }

    pub fn date_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Date)
    }

    pub fn category_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Category)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// `(local_col, referenced_qualified_table, referenced_col)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyEdge {
    pub local_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKeyEdge {
    /// `"<src_schema>.<src_table>.<col>-><dst_schema>.<dst_table>.<col>"` per GLOSSARY.
    pub fn descriptor(&self, src_table: &str) -> String {
        format!(
            "{}.{}->{}.{}",
            src_table, self.local_column, self.referenced_table, self.referenced_column
        )
    }
}

/// `(src_qualified, dst_qualified, fk_descriptor)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaEdge {
    pub src: String,
    pub dst: String,
    pub descriptor: String,
}

/// A subject area: a connected community of tables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubjectArea {
    pub id: String,
    pub name: String,
    pub tables: Vec<String>,
    pub summary: String,
}
