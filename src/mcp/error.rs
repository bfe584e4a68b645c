//! Structured MCP tool error, mapped from `SchemaMindError`: an
//! `error_code` plus a `suggestion` so a calling agent can self-correct.

use rmcp::model::{Content, IntoContents};
use serde::Serialize;

use crate::SchemaMindError;

#[derive(Debug, Serialize)]
pub struct ToolError {
    pub error_code: String,
    pub message: String,
    pub suggestion: String,
}

impl IntoContents for ToolError {
    fn into_contents(self) -> Vec<Content> {
        let json = serde_json::to_string(&self).unwrap_or_else(|_| self.message.clone());
        vec![Content::text(json)]
    }
}

impl From<SchemaMindError> for ToolError {
    fn from(err: SchemaMindError) -> Self {
        let (error_code, suggestion) = match &err {
            SchemaMindError::NotReady(_) => (
                "NOT_READY",
                "The schema service is still starting; call get_init_status() and retry once phase is READY.",
            ),
            SchemaMindError::NotFound(_) => (
                "NOT_FOUND",
                "Check the table_key format (\"<schema>.<table>\"); call get_database_overview() or get_subject_areas() to list known tables.",
            ),
            SchemaMindError::Validation(_) => (
                "VALIDATION_ERROR",
                "Only a single read-only SELECT statement is accepted; rewrite the query and retry.",
            ),
            SchemaMindError::Dialect(_) => (
                "DIALECT_ERROR",
                "The SQL could not be parsed or transpiled for the active dialect; check syntax against get_table_info()'s typical_queries.",
            ),
            SchemaMindError::Database(_) => (
                "EXECUTION_ERROR",
                "The database rejected the query; check the assist_notes for the likely cause.",
            ),
            SchemaMindError::Config(_) => (
                "CONFIG_ERROR",
                "Check the service's database_url and configuration.",
            ),
            SchemaMindError::SchemaReflection(_) => (
                "REFLECTION_ERROR",
                "Schema reflection failed; check database connectivity and catalog privileges.",
            ),
            SchemaMindError::EmbeddingUnavailable(_) => (
                "EMBEDDING_UNAVAILABLE",
                "Semantic retrieval is unavailable; lexical-only retrieval still applies.",
            ),
            SchemaMindError::Serialization(_) | SchemaMindError::Io(_) | SchemaMindError::TomlParse(_) => {
                ("INTERNAL_ERROR", "Retry; if this persists, check service logs.")
            }
            SchemaMindError::Other(_) => ("INTERNAL_ERROR", "Retry; if this persists, check service logs."),
        };

        ToolError {
            error_code: error_code.to_string(),
            message: err.to_string(),
            suggestion: suggestion.to_string(),
        }
    }
}
