//! `QueryPlan`, the output of the Plan Builder.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Ok,
    NeedsInput,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ExecuteQuery,
    RequestClarification,
    InspectTable,
    RefinePlan,
}

/// A table selected into the plan, with its columns and common-filter hints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelevantTable {
    pub table: String,
    pub purpose: String,
    pub columns: Vec<PlanColumn>,
    pub common_filter_hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanColumn {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_values: Option<Vec<String>>,
}

/// One step of the join plan: an on-pair, the relationship's cardinality, and its purpose.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JoinStep {
    pub left_table: String,
    pub right_table: String,
    pub on: String,
    /// e.g. "many-to-one", "one-to-many", "one-to-one".
    pub cardinality: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JoinExample {
    pub left_table: String,
    pub right_table: String,
    pub sql_on_clause: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FilterCandidate {
    pub table: String,
    pub column: String,
    pub operator_examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectedColumn {
    pub table: String,
    pub column: String,
    pub reason: String,
}

/// The full structured query plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryPlan {
    pub request: String,
    pub relevant_tables: Vec<RelevantTable>,
    pub join_examples: Vec<JoinExample>,
    pub suggested_approach: String,
    /// table -> ordered column names.
    pub key_columns: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub main_table: Option<String>,
    pub join_plan: Vec<JoinStep>,
    pub group_by_candidates: Vec<String>,
    pub filter_candidates: Vec<FilterCandidate>,
    pub selected_columns: Vec<SelectedColumn>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub draft_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clarifications: Option<Vec<String>>,
    pub assumptions: Vec<String>,
    pub confidence: f64,
    pub status: PlanStatus,
    pub next_action: NextAction,
}
