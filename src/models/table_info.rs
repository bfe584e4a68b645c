//! `TableInfo`, the output of `get_table_info`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableInfoColumn {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_values: Option<Vec<String>>,
    /// Constraints derived from `distinct_values`/`value_range`/date-filter hints.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableRelationship {
    pub related_table: String,
    pub sql_on_clause: String,
    /// e.g. "many-to-one", "one-to-many".
    pub cardinality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypicalQuery {
    pub description: String,
    pub sql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub table: String,
    pub archetype: String,
    pub business_description: String,
    pub columns: Vec<TableInfoColumn>,
    pub relationships: Vec<TableRelationship>,
    pub typical_queries: Vec<TypicalQuery>,
    pub indexing_notes: Vec<String>,
    pub pk_columns: Vec<String>,
    pub fk_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub approx_rowcount: Option<i64>,
    pub is_archive: bool,
    pub is_audit_like: bool,
}
