//! `DatabaseSummary`, the output of `get_database_overview`.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubjectAreaDetail {
    pub name: String,
    pub tables: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportantTable {
    pub table: String,
    pub archetype: String,
    pub centrality: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseSummary {
    pub dialect: String,
    pub total_tables: usize,
    pub schemas: Vec<String>,
    /// area name -> short purpose.
    pub subject_areas: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subject_area_detail: Option<BTreeMap<String, SubjectAreaDetail>>,
    pub most_important_tables: Vec<ImportantTable>,
    pub common_patterns: Vec<String>,
}
