//! Thin wrappers over `sqlparser`: parse/validate/transpile/optimize/
//! metadata/error-assist. Parse results are cached by `(sql, dialect)` in a
//! `moka` cache.
//!
//! This facade is a thin wrapper, not a query optimizer or a full
//! cross-dialect transpiler: `transpile` and `auto_transpile` reprint the
//! parsed AST for the target dialect and additionally rewrite one concrete
//! cross-dialect idiom (`TOP n` <-> `LIMIT n`); they do not attempt general
//! dialect-specific rewriting beyond that.

use std::sync::Arc;

use moka::future::Cache;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::{
    Dialect as SqlparserDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};
use sqlparser::parser::Parser;

use crate::error::SchemaMindError;

/// Dialect names the facade understands, a superset of `db::connection::Dialect`
/// (which is scoped to dialects this service can *connect* to): the facade
/// additionally normalizes SQL Server SQL even though the crate has no
/// first-party MS SQL driver (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectName {
    Postgres,
    MySql,
    Sqlite,
    MsSql,
    Generic,
}

impl DialectName {
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" => DialectName::Postgres,
            "mysql" => DialectName::MySql,
            "sqlite" => DialectName::Sqlite,
            "mssql" | "sqlserver" | "sql_server" | "tsql" => DialectName::MsSql,
            _ => DialectName::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialectName::Postgres => "postgres",
            DialectName::MySql => "mysql",
            DialectName::Sqlite => "sqlite",
            DialectName::MsSql => "mssql",
            DialectName::Generic => "generic",
        }
    }

    fn sqlparser_dialect(&self) -> Box<dyn SqlparserDialect> {
        match self {
            DialectName::Postgres => Box::new(PostgreSqlDialect {}),
            DialectName::MySql => Box::new(MySqlDialect {}),
            DialectName::Sqlite => Box::new(SQLiteDialect {}),
            DialectName::MsSql => Box::new(MsSqlDialect {}),
            DialectName::Generic => Box::new(GenericDialect {}),
        }
    }

    /// `true` if this dialect expresses row capping as `LIMIT n` rather than
    /// `SELECT TOP n ...`.
    fn uses_limit_style(&self) -> bool {
        !matches!(self, DialectName::MsSql)
    }
}

impl From<crate::db::connection::Dialect> for DialectName {
    fn from(d: crate::db::connection::Dialect) -> Self {
        match d {
            crate::db::connection::Dialect::Postgres => DialectName::Postgres,
            crate::db::connection::Dialect::MySql => DialectName::MySql,
            crate::db::connection::Dialect::Sqlite => DialectName::Sqlite,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub pretty_sql: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranspileOutcome {
    pub sql: String,
    pub source_dialect: String,
    pub target_dialect: String,
    /// Notes describing rewrites the facade applied beyond a straight
    /// reprint (e.g. "rewrote TOP n to LIMIT n").
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub top_expression_type: String,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub functions: Vec<String>,
    pub has_joins: bool,
    pub has_subqueries: bool,
    pub has_aggregations: bool,
}

#[derive(Debug, Clone)]
pub struct ErrorAssist {
    pub likely_cause: String,
    pub fix_suggestion: String,
}

const AGGREGATE_FUNCTION_NAMES: &[&str] = &[
    "count", "sum", "avg", "min", "max", "group_concat", "string_agg", "array_agg", "stddev",
    "variance",
];

fn known_db_error_patterns() -> &'static [(&'static str, &'static str, &'static str)] {
    &[
        (
            "no such table",
            "the referenced table does not exist in this database",
            "check the table name and schema prefix; call get_database_overview to list known tables",
        ),
        (
            "does not exist",
            "a referenced table or column is not present",
            "verify the identifier against get_table_info for the target table",
        ),
        (
            "syntax error",
            "the SQL does not parse in the target dialect",
            "run validate() against the target dialect and fix the reported position",
        ),
        (
            "permission denied",
            "the configured database credentials lack privileges for this operation",
            "use a read-only role with SELECT privileges on the target schema",
        ),
        (
            "ambiguous column",
            "a column name exists in more than one joined table",
            "qualify the column with its table alias",
        ),
        (
            "division by zero",
            "a numeric expression divided by a zero denominator",
            "guard the denominator with NULLIF or a WHERE clause",
        ),
    ]
}

/// The Dialect Tools Facade. Cheap to clone (the cache is an `Arc` inside).
#[derive(Clone)]
pub struct DialectFacade {
    parse_cache: Cache<(String, &'static str), Arc<Vec<Statement>>>,
}

impl Default for DialectFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectFacade {
    pub fn new() -> Self {
        Self {
            parse_cache: Cache::builder().max_capacity(2_048).build(),
        }
    }

    /// Parse `sql` under `dialect`, consulting the `(sql, dialect)` cache first.
    pub async fn parse(
        &self,
        sql: &str,
        dialect: DialectName,
    ) -> Result<Arc<Vec<Statement>>, SchemaMindError> {
        let key = (sql.to_string(), dialect.as_str());
        if let Some(cached) = self.parse_cache.get(&key).await {
            return Ok(cached);
        }

        let parsed = Parser::parse_sql(&*dialect.sqlparser_dialect(), sql)
            .map_err(|e| SchemaMindError::Dialect(e.to_string()))?;
        let parsed = Arc::new(parsed);
        self.parse_cache.insert(key, Arc::clone(&parsed)).await;
        Ok(parsed)
    }

    /// Validate `sql` under `dialect`: `valid=true` with the pretty-printed
    /// reprint on success, `valid=false` with the parser error otherwise.
    pub async fn validate(&self, sql: &str, dialect: DialectName) -> ValidationOutcome {
        match self.parse(sql, dialect).await {
            Ok(statements) => ValidationOutcome {
                valid: true,
                pretty_sql: Some(pretty_print(&statements)),
                error: None,
            },
            Err(e) => ValidationOutcome {
                valid: false,
                pretty_sql: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Transpile `sql` from `source` to `target`, reprinting the parsed AST
    /// and rewriting the TOP/LIMIT row-cap idiom when the two dialects
    /// disagree on it.
    pub async fn transpile(
        &self,
        sql: &str,
        source: DialectName,
        target: DialectName,
        pretty: bool,
    ) -> Result<TranspileOutcome, SchemaMindError> {
        let statements = self.parse(sql, source).await?;
        let mut rendered = if pretty {
            pretty_print(&statements)
        } else {
            statements
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        };

        let mut notes = Vec::new();
        if let Some(rewritten) = rewrite_top_limit(&rendered, source, target) {
            notes.push(rewritten.1);
            rendered = rewritten.0;
        }

        Ok(TranspileOutcome {
            sql: rendered,
            source_dialect: source.as_str().to_string(),
            target_dialect: target.as_str().to_string(),
            notes,
        })
    }

    /// Detect the source dialect by trying each known dialect's parser in
    /// turn, then transpile to `target`. Falls back to `Generic` if no
    /// dialect-specific parse succeeds but the generic one does.
    pub async fn auto_transpile(
        &self,
        sql: &str,
        target: DialectName,
        pretty: bool,
    ) -> Result<TranspileOutcome, SchemaMindError> {
        let source = self.detect_dialect(sql).await?;
        self.transpile(sql, source, target, pretty).await
    }

    async fn detect_dialect(&self, sql: &str) -> Result<DialectName, SchemaMindError> {
        const CANDIDATES: [DialectName; 4] = [
            DialectName::Postgres,
            DialectName::MySql,
            DialectName::Sqlite,
            DialectName::MsSql,
        ];
        for candidate in CANDIDATES {
            if self.parse(sql, candidate).await.is_ok() {
                return Ok(candidate);
            }
        }
        self.parse(sql, DialectName::Generic).await?;
        Ok(DialectName::Generic)
    }

    /// A no-op-on-semantics pass that reprints `sql` and, when `schema_map`
    /// provides `table -> column -> type`, appends informational type
    /// annotations for projected columns it can resolve unambiguously. Not
    /// a cost-based optimizer (the stated non-goals exclude query optimization).
    pub async fn optimize(
        &self,
        sql: &str,
        dialect: DialectName,
        schema_map: Option<&std::collections::HashMap<String, std::collections::HashMap<String, String>>>,
    ) -> Result<String, SchemaMindError> {
        let statements = self.parse(sql, dialect).await?;
        let mut out = pretty_print(&statements);
        if let Some(schema_map) = schema_map {
            let meta = metadata_from_text(&out, &statements);
            let mut annotations = Vec::new();
            for table in &meta.tables {
                let Some(columns) = schema_map.get(table) else {
                    continue;
                };
                for column in &meta.columns {
                    if let Some(ty) = columns.get(column) {
                        annotations.push(format!("{table}.{column}: {ty}"));
                    }
                }
            }
            if !annotations.is_empty() {
                out.push_str("\n-- column types: ");
                out.push_str(&annotations.join(", "));
            }
        }
        Ok(out)
    }

    /// Best-effort metadata extraction: uses the parsed AST for
    /// the top-level statement kind and falls back to pattern matching over
    /// the pretty-printed SQL for tables/columns/functions/joins/
    /// subqueries/aggregations, since those shapes vary across the many
    /// `sqlparser` statement/expression variants more than is worth
    /// destructuring by hand in a thin facade.
    pub async fn metadata(&self, sql: &str, dialect: DialectName) -> Result<Metadata, SchemaMindError> {
        let statements = self.parse(sql, dialect).await?;
        let rendered = pretty_print(&statements);
        Ok(metadata_from_text(&rendered, &statements))
    }

    /// Error-assist heuristics: known substrings in `db_error`
    /// map to a likely cause and fix suggestion; a dialect mismatch on the
    /// TOP/LIMIT idiom is flagged separately when detectable from `sql`.
    pub fn error_assist(&self, sql: &str, target: DialectName, db_error: &str) -> Vec<ErrorAssist> {
        let lower = db_error.to_lowercase();
        let mut assists: Vec<ErrorAssist> = known_db_error_patterns()
            .iter()
            .filter(|(pattern, _, _)| lower.contains(pattern))
            .map(|(_, cause, fix)| ErrorAssist {
                likely_cause: cause.to_string(),
                fix_suggestion: fix.to_string(),
            })
            .collect();

        let has_top = top_regex().is_match(sql);
        let has_trailing_limit = limit_regex().is_match(sql);
        if has_top && target.uses_limit_style() {
            assists.push(ErrorAssist {
                likely_cause: "query uses T-SQL's SELECT TOP n against a LIMIT-style dialect".to_string(),
                fix_suggestion: "Replace T-SQL TOP with LIMIT".to_string(),
            });
        } else if has_trailing_limit && !target.uses_limit_style() {
            assists.push(ErrorAssist {
                likely_cause: "query uses a trailing LIMIT n against a TOP-style dialect".to_string(),
                fix_suggestion: "Replace LIMIT with SELECT TOP n".to_string(),
            });
        }

        if assists.is_empty() {
            assists.push(ErrorAssist {
                likely_cause: "no known error pattern matched".to_string(),
                fix_suggestion: "inspect the raw engine error for detail".to_string(),
            });
        }
        assists
    }
}

fn pretty_print(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(";\n")
}

fn top_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bSELECT\s+TOP\s*\(?\s*\d+\s*\)?").expect("valid regex"))
}

fn limit_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLIMIT\s+\d+\b").expect("valid regex"))
}

/// Rewrite `TOP n` to `LIMIT n` when crossing from a TOP-style dialect to a
/// LIMIT-style one. Returns `None` when no rewrite applies.
fn rewrite_top_limit(sql: &str, source: DialectName, target: DialectName) -> Option<(String, String)> {
    if !source.uses_limit_style() && target.uses_limit_style() {
        if let Some(m) = top_regex().find(sql) {
            let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
            let without_top = top_regex().replace(sql, "SELECT").to_string();
            let rewritten = format!("{} LIMIT {}", without_top.trim_end(), digits);
            return Some((rewritten, "rewrote SELECT TOP n to a trailing LIMIT n".to_string()));
        }
    }
    if source.uses_limit_style() && !target.uses_limit_style() {
        if let Some(m) = limit_regex().find(sql) {
            let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
            let without_limit = limit_regex().replace(sql, "").to_string();
            let rewritten = select_regex().replace(without_limit.trim_end(), |caps: &regex::Captures| {
                format!("{}TOP {}", &caps[0], digits)
            });
            return Some((rewritten.to_string(), "rewrote trailing LIMIT n to SELECT TOP n".to_string()));
        }
    }
    None
}

fn select_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bSELECT\s+").expect("valid regex"))
}

fn metadata_from_text(rendered: &str, statements: &[Statement]) -> Metadata {
    let top_expression_type = statements
        .first()
        .map(statement_kind)
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let tables = table_regex()
        .captures_iter(rendered)
        .map(|c| c[1].to_string())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = projection_columns(rendered);

    let functions = function_regex()
        .captures_iter(rendered)
        .map(|c| c[1].to_lowercase())
        .filter(|name| !SQL_KEYWORDS_NOT_FUNCTIONS.contains(&name.as_str()))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let has_joins = join_regex().is_match(rendered);
    let has_subqueries = rendered.to_uppercase().matches("(SELECT").count() > 0
        || rendered.to_uppercase().matches("( SELECT").count() > 0;
    let has_aggregations = rendered.to_uppercase().contains("GROUP BY")
        || functions.iter().any(|f| AGGREGATE_FUNCTION_NAMES.contains(&f.as_str()));

    Metadata {
        top_expression_type,
        tables,
        columns,
        functions,
        has_joins,
        has_subqueries,
        has_aggregations,
    }
}

const SQL_KEYWORDS_NOT_FUNCTIONS: &[&str] = &["where", "having", "on", "and", "or", "values"];

fn statement_kind(statement: &Statement) -> String {
    let debug = format!("{statement:?}");
    debug
        .split(['(', '{', ' '])
        .next()
        .unwrap_or("UNKNOWN")
        .to_string()
}

fn table_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+"?([A-Za-z_][\w.]*)"?"#).expect("valid regex")
    })
}

fn function_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid regex"))
}

fn join_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bJOIN\b").expect("valid regex"))
}

fn projection_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SELECT\s+(.*?)\s+FROM").expect("valid regex"))
}

fn projection_columns(rendered: &str) -> Vec<String> {
    let Some(caps) = projection_regex().captures(rendered) else {
        return Vec::new();
    };
    caps[1]
        .split(',')
        .map(|part| {
            let part = part.trim();
            let bare = part.split(" AS ").next().unwrap_or(part).trim();
            bare.rsplit('.').next().unwrap_or(bare).trim_matches('"').to_string()
        })
        .filter(|c| c != "*" && !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validates_well_formed_sql() {
        let facade = DialectFacade::new();
        let outcome = facade.validate("SELECT id FROM users", DialectName::Postgres).await;
        assert!(outcome.valid);
        assert!(outcome.pretty_sql.is_some());
    }

    #[tokio::test]
    async fn rejects_malformed_sql() {
        let facade = DialectFacade::new();
        let outcome = facade.validate("SELEC id FROM", DialectName::Postgres).await;
        assert!(!outcome.valid);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn parse_cache_hits_on_repeat_calls() {
        let facade = DialectFacade::new();
        let sql = "SELECT id FROM users";
        let first = facade.parse(sql, DialectName::Postgres).await.unwrap();
        let second = facade.parse(sql, DialectName::Postgres).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn transpiles_top_to_limit() {
        let facade = DialectFacade::new();
        let outcome = facade
            .transpile("SELECT TOP 10 id FROM users", DialectName::MsSql, DialectName::Postgres, false)
            .await
            .unwrap();
        assert!(outcome.sql.to_uppercase().contains("LIMIT 10"));
        assert!(!outcome.notes.is_empty());
    }

    #[tokio::test]
    async fn metadata_detects_joins_and_aggregations() {
        let facade = DialectFacade::new();
        let meta = facade
            .metadata(
                "SELECT customers.id, COUNT(orders.id) FROM customers JOIN orders ON orders.customer_id = customers.id GROUP BY customers.id",
                DialectName::Postgres,
            )
            .await
            .unwrap();
        assert!(meta.has_joins);
        assert!(meta.has_aggregations);
        assert!(meta.tables.iter().any(|t| t == "customers"));
    }

    #[test]
    fn error_assist_matches_known_pattern() {
        let facade = DialectFacade::new();
        let assists = facade.error_assist("SELECT * FROM ghost", DialectName::Postgres, "ERROR: relation \"ghost\" does not exist");
        assert!(assists.iter().any(|a| a.fix_suggestion.contains("get_table_info")));
    }

    #[test]
    fn error_assist_flags_top_limit_mismatch() {
        let facade = DialectFacade::new();
        let assists = facade.error_assist("SELECT TOP 10 * FROM users", DialectName::Postgres, "syntax error near TOP");
        assert!(assists.iter().any(|a| a.fix_suggestion == "Replace T-SQL TOP with LIMIT"));
    }

    #[test]
    fn dialect_name_parses_known_aliases() {
        assert_eq!(DialectName::parse("postgresql"), DialectName::Postgres);
        assert_eq!(DialectName::parse("tsql"), DialectName::MsSql);
        assert_eq!(DialectName::parse("unknown"), DialectName::Generic);
    }
}
