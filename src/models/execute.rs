//! `ExecuteQueryResult`, the output of `execute_query`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionMetadata {
    pub dialect: String,
    pub elapsed_ms: u64,
    pub row_limit: usize,
    pub rows_returned: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteQueryResult {
    pub sql: String,
    pub execution: ExecutionMetadata,
    /// Rows as JSON objects, column name -> cell value (cells already truncated).
    pub results: Vec<Value>,
    pub validation_notes: Vec<String>,
    pub recommended_next_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub assist_notes: Option<Vec<String>>,
    pub status: ExecuteStatus,
}
