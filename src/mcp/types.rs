//! Tool input types for the 6 core tools plus the optional debug tools.
//! Output types live in `crate::models`; these are just the request-side
//! shapes the `rmcp` macros deserialize arguments into.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ColumnRole;
use crate::planning::PlanBudget;

fn default_true() -> bool {
    true
}
fn default_area_limit() -> usize {
    8
}
fn default_subject_area_limit() -> usize {
    12
}
fn default_max_sample_values() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PlanQueryInput {
    pub request: String,
    #[serde(default)]
    pub constraints: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub full_detail: bool,
    #[serde(default)]
    pub budget: Option<PlanBudget>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct DatabaseOverviewInput {
    #[serde(default)]
    pub include_subject_areas: bool,
    #[serde(default = "default_area_limit")]
    pub area_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TableInfoInput {
    pub table_key: String,
    #[serde(default = "default_true")]
    pub include_samples: bool,
    #[serde(default)]
    pub column_role_filter: Option<Vec<ColumnRole>>,
    #[serde(default = "default_max_sample_values")]
    pub max_sample_values: usize,
    #[serde(default)]
    pub relationship_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SubjectAreasInput {
    #[serde(default = "default_subject_area_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ExecuteQueryInput {
    pub sql: String,
}

/// Retrieval approach exposed to the `find_tables` debug tool,
/// mirroring `retrieval::engine::RetrievalStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindTablesApproach {
    Combo,
    Lexical,
    EmbTable,
    EmbColumn,
}

fn default_find_limit() -> usize {
    10
}
fn default_alpha() -> f32 {
    0.7
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FindTablesInput {
    pub query: String,
    #[serde(default = "default_find_limit")]
    pub limit: usize,
    #[serde(default = "default_combo")]
    pub approach: FindTablesApproach,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
}

fn default_combo() -> FindTablesApproach {
    FindTablesApproach::Combo
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FindColumnsInput {
    pub keyword: String,
    #[serde(default = "default_find_limit")]
    pub limit: usize,
    #[serde(default)]
    pub by_table: Option<String>,
}
