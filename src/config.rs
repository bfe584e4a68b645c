//! Typed configuration, assembled at startup with a single validation
//! point: explicit > env (`SCHEMAMIND_*`) > `config.toml` > compile-time
//! default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SchemaMindError;

fn default_embedding_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}
fn default_row_limit() -> usize {
    200
}
fn default_max_cell_chars() -> usize {
    200
}
fn default_max_payload_bytes() -> usize {
    200_000
}
fn default_per_table_rows() -> usize {
    100
}
fn default_sample_timeout_sec() -> u64 {
    5
}
fn default_reflect_timeout_sec() -> u64 {
    5
}
fn default_max_cols_for_embeddings() -> usize {
    20
}
fn default_max_sampled_columns() -> usize {
    20
}
fn default_value_constraint_threshold() -> usize {
    20
}
fn default_min_area_size() -> usize {
    3
}
fn default_lexicon_top_n() -> usize {
    16
}
fn default_lexicon_min_df() -> usize {
    2
}
fn default_morph_min_len() -> usize {
    3
}
fn default_max_tables_at_startup() -> usize {
    500
}

/// Every configuration knob recognized by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active database connection string. Required; validated at load time.
    pub database_url: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default = "default_per_table_rows")]
    pub per_table_rows: usize,
    #[serde(default = "default_sample_timeout_sec")]
    pub sample_timeout_sec: u64,
    #[serde(default = "default_reflect_timeout_sec")]
    pub reflect_timeout_sec: u64,

    #[serde(default = "default_max_cols_for_embeddings")]
    pub max_cols_for_embeddings: usize,
    #[serde(default = "default_max_sampled_columns")]
    pub max_sampled_columns: usize,

    #[serde(default)]
    pub fast_startup: bool,
    #[serde(default = "default_max_tables_at_startup")]
    pub max_tables_at_startup: usize,

    #[serde(default = "default_value_constraint_threshold")]
    pub value_constraint_threshold: usize,

    #[serde(default = "default_min_area_size")]
    pub min_area_size: usize,
    #[serde(default)]
    pub merge_archive_areas: bool,

    #[serde(default)]
    pub strict_archive_exclude: bool,
    #[serde(default = "default_lexicon_top_n")]
    pub lexicon_top_n: usize,
    #[serde(default = "default_lexicon_min_df")]
    pub lexicon_min_df: usize,
    #[serde(default = "default_morph_min_len")]
    pub morph_min_len: usize,

    #[serde(default)]
    pub debug_tools_enabled: bool,

    /// Bind address for the `GET /health` endpoint.
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

fn default_health_addr() -> String {
    "127.0.0.1:8089".to_string()
}

impl Config {
    /// Load configuration with priority: explicit `database_url` override >
    /// `SCHEMAMIND_DATABASE_URL` / other `SCHEMAMIND_*` env vars > a
    /// `config.toml` next to `data_path` > compile-time defaults.
    pub fn load(
        data_path: &Path,
        explicit_database_url: Option<String>,
    ) -> Result<Self, SchemaMindError> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::from_file(data_path).unwrap_or_else(|| Self::from_env_or_default());

        if let Some(url) = explicit_database_url {
            cfg.database_url = url;
        } else if let Ok(url) = std::env::var("SCHEMAMIND_DATABASE_URL") {
            if cfg.database_url.is_empty() {
                cfg.database_url = url;
            }
        }

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(data_path: &Path) -> Option<Self> {
        let path = data_path.join("config.toml");
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    Some(cfg)
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Ignoring.", path.display(), e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}. Ignoring.", path.display(), e);
                None
            }
        }
    }

    pub(crate) fn from_env_or_default() -> Self {
        Self {
            database_url: std::env::var("SCHEMAMIND_DATABASE_URL").unwrap_or_default(),
            embedding_model: default_embedding_model(),
            row_limit: default_row_limit(),
            max_cell_chars: default_max_cell_chars(),
            max_payload_bytes: default_max_payload_bytes(),
            per_table_rows: default_per_table_rows(),
            sample_timeout_sec: default_sample_timeout_sec(),
            reflect_timeout_sec: default_reflect_timeout_sec(),
            max_cols_for_embeddings: default_max_cols_for_embeddings(),
            max_sampled_columns: default_max_sampled_columns(),
            fast_startup: false,
            max_tables_at_startup: default_max_tables_at_startup(),
            value_constraint_threshold: default_value_constraint_threshold(),
            min_area_size: default_min_area_size(),
            merge_archive_areas: false,
            strict_archive_exclude: false,
            lexicon_top_n: default_lexicon_top_n(),
            lexicon_min_df: default_lexicon_min_df(),
            morph_min_len: default_morph_min_len(),
            debug_tools_enabled: false,
            health_addr: default_health_addr(),
        }
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! env_usize {
            ($var:literal, $field:expr) => {
                if let Ok(v) = std::env::var($var) {
                    if let Ok(parsed) = v.parse() {
                        $field = parsed;
                    }
                }
            };
        }
        macro_rules! env_bool {
            ($var:literal, $field:expr) => {
                if let Ok(v) = std::env::var($var) {
                    $field = matches!(v.as_str(), "1" | "true" | "yes");
                }
            };
        }

        if let Ok(v) = std::env::var("SCHEMAMIND_EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        env_usize!("SCHEMAMIND_ROW_LIMIT", self.row_limit);
        env_usize!("SCHEMAMIND_MAX_CELL_CHARS", self.max_cell_chars);
        env_usize!("SCHEMAMIND_PER_TABLE_ROWS", self.per_table_rows);
        env_bool!("SCHEMAMIND_FAST_STARTUP", self.fast_startup);
        env_usize!(
            "SCHEMAMIND_MAX_TABLES_AT_STARTUP",
            self.max_tables_at_startup
        );
        env_bool!(
            "SCHEMAMIND_STRICT_ARCHIVE_EXCLUDE",
            self.strict_archive_exclude
        );
        env_bool!("SCHEMAMIND_DEBUG_TOOLS_ENABLED", self.debug_tools_enabled);
        if let Ok(v) = std::env::var("SCHEMAMIND_HEALTH_ADDR") {
            self.health_addr = v;
        }
    }

    fn validate(&self) -> Result<(), SchemaMindError> {
        if self.database_url.trim().is_empty() {
            return Err(SchemaMindError::Config(
                "database_url is required (set --database-url, SCHEMAMIND_DATABASE_URL, or config.toml)".into(),
            ));
        }
        if self.row_limit < 1 {
            return Err(SchemaMindError::Config("row_limit must be >= 1".into()));
        }
        if self.max_cell_chars < 10 {
            return Err(SchemaMindError::Config(
                "max_cell_chars must be >= 10".into(),
            ));
        }
        if self.max_payload_bytes < 50_000 {
            return Err(SchemaMindError::Config(
                "max_payload_bytes must be >= 50000".into(),
            ));
        }
        Ok(())
    }

    /// Default data path: explicit > `SCHEMAMIND_DATA_PATH` env > `./.schemamind`
    /// (if present) > `~/.schemamind`.
    pub fn resolve_data_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var("SCHEMAMIND_DATA_PATH").ok().map(PathBuf::from))
            .or_else(|| {
                let local = Path::new(".schemamind");
                (local.exists() && local.is_dir()).then(|| local.to_path_buf())
            })
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".schemamind"))
                    .unwrap_or_else(|| PathBuf::from(".schemamind"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_database_url() {
        let mut cfg = Config::from_env_or_default();
        cfg.database_url = "".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_too_small_row_limit() {
        let mut cfg = Config::from_env_or_default();
        cfg.database_url = "sqlite::memory:".to_string();
        cfg.row_limit = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults_with_url() {
        let mut cfg = Config::from_env_or_default();
        cfg.database_url = "sqlite::memory:".to_string();
        assert!(cfg.validate().is_ok());
    }
}
