//! Crate-wide error type.
//!
//! Every public operation returns `Result<T, SchemaMindError>`, and the MCP
//! surface maps each variant to a structured tool error (see `mcp::error`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaMindError {
    /// Configuration could not be resolved (missing/invalid database URL,
    /// malformed `config.toml`, conflicting CLI flags).
    #[error("configuration error: {0}")]
    Config(String),

    /// A tool was called before the schema card reached `READY` (or, for
    /// tools that tolerate `PARTIAL`, before `BUILDING` produced anything).
    #[error("not ready: {0}")]
    NotReady(String),

    /// A named table, column, or subject area does not exist in the
    /// current `SchemaCard`.
    #[error("not found: {0}")]
    NotFound(String),

    /// Reflection against the live database failed (connection drop,
    /// insufficient privileges, catalog query error).
    #[error("schema reflection failed: {0}")]
    SchemaReflection(String),

    /// A `sqlx` database error surfaced directly (connection, query
    /// execution, or driver error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Caller input failed validation (non-SELECT statement, banned
    /// keyword, malformed identifier).
    #[error("validation error: {0}")]
    Validation(String),

    /// SQL parsing or dialect transpilation failed.
    #[error("dialect error: {0}")]
    Dialect(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem or other I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config parsing failed.
    #[error("config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The embedding model is unavailable (not downloaded, backend
    /// initialization failed) — degrades lexical-only retrieval rather
    /// than failing the whole service.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Catch-all for lower-level library errors not worth a dedicated
    /// variant (candle, hf-hub, graphrs, hnsw_rs).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlparser::parser::ParserError> for SchemaMindError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        SchemaMindError::Dialect(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchemaMindError>;
