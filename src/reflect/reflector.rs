//! The Reflector: enumerates schemas, tables, columns, primary
//! keys, and foreign keys from the live database via catalog queries.

use std::collections::BTreeMap;

use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{instrument, warn};

use crate::db::connection::{Dialect, SchemaDb};
use crate::error::SchemaMindError;

#[derive(Debug, Clone)]
pub struct ReflectedColumn {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct ReflectedTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ReflectedColumn>,
    pub pk_columns: Vec<String>,
    /// (local_column, referenced_qualified_table, referenced_column)
    pub foreign_keys: Vec<(String, String, String)>,
}

impl ReflectedTable {
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReflectedSchema {
    pub tables: Vec<ReflectedTable>,
}

/// Options controlling the depth and cost of a reflection pass.
#[derive(Debug, Clone)]
pub struct ReflectOptions {
    pub fast_startup: bool,
    pub max_tables_at_startup: usize,
    pub reflect_timeout_sec: u64,
    pub include_schemas: Option<Vec<String>>,
    pub exclude_schemas: Vec<String>,
}

impl Default for ReflectOptions {
    fn default() -> Self {
        Self {
            fast_startup: false,
            max_tables_at_startup: 500,
            reflect_timeout_sec: 5,
            include_schemas: None,
            exclude_schemas: Vec::new(),
        }
    }
}

pub struct Reflector;

impl Reflector {
    /// Enumerate schemas and, for each, tables/columns/PKs/FKs.
    ///
    /// Schema-level failures skip that schema and log; table-level failures
    /// skip that table and log; failure to list schemas at all is fatal
    ///.
    #[instrument(skip(db), fields(dialect = ?db.dialect, fast_startup = opts.fast_startup))]
    pub async fn reflect(
        db: &SchemaDb,
        opts: &ReflectOptions,
    ) -> Result<BTreeMap<String, ReflectedTable>, SchemaMindError> {
        apply_statement_timeout(db, opts.reflect_timeout_sec).await;

        let schema_names = list_schemas(db, opts).await.map_err(|e| {
            SchemaMindError::SchemaReflection(format!("failed to list schemas: {e}"))
        })?;

        let mut tables = BTreeMap::new();

        'schemas: for schema in schema_names {
            let table_names = match list_tables(db, &schema).await {
                Ok(names) => names,
                Err(e) => {
                    warn!("skipping schema '{schema}': {e}");
                    continue;
                }
            };

            for table_name in table_names {
                if tables.len() >= opts.max_tables_at_startup && opts.fast_startup {
                    break 'schemas;
                }

                match reflect_table(db, &schema, &table_name, opts.fast_startup).await {
                    Ok(table) => {
                        tables.insert(table.qualified_key(), table);
                    }
                    Err(e) => {
                        warn!("skipping table '{schema}.{table_name}': {e}");
                    }
                }
            }
        }

        Ok(tables)
    }
}

async fn apply_statement_timeout(db: &SchemaDb, timeout_sec: u64) {
    let stmt = match db.dialect {
        Dialect::Postgres => Some(format!("SET statement_timeout = {}", timeout_sec * 1000)),
        Dialect::MySql => Some(format!("SET SESSION MAX_EXECUTION_TIME = {}", timeout_sec * 1000)),
        // SQL Server would use SET LOCK_TIMEOUT; sqlite has no session timeout concept.
        Dialect::Sqlite => None,
    };
    if let Some(stmt) = stmt {
        let _ = sqlx::query(&stmt).execute(&db.pool).await;
    }
}

async fn list_schemas(db: &SchemaDb, opts: &ReflectOptions) -> Result<Vec<String>, sqlx::Error> {
    let mut names: Vec<String> = match db.dialect {
        Dialect::Postgres => {
            sqlx::query("SELECT schema_name FROM information_schema.schemata")
                .fetch_all(&db.pool)
                .await?
                .into_iter()
                .map(|r: AnyRow| r.get::<String, _>(0))
                .collect()
        }
        Dialect::MySql => {
            sqlx::query("SELECT schema_name FROM information_schema.schemata")
                .fetch_all(&db.pool)
                .await?
                .into_iter()
                .map(|r: AnyRow| r.get::<String, _>(0))
                .collect()
        }
        Dialect::Sqlite => vec!["main".to_string()],
    };

    let excluded: Vec<&str> = db
        .dialect
        .default_excluded_schemas()
        .iter()
        .copied()
        .chain(opts.exclude_schemas.iter().map(String::as_str))
        .collect();
    names.retain(|n| !excluded.contains(&n.as_str()));

    if let Some(include) = &opts.include_schemas {
        let include: Vec<&str> = include.iter().map(String::as_str).collect();
        names.retain(|n| include.contains(&n.as_str()));
    }

    names.sort();
    Ok(names)
}

async fn list_tables(db: &SchemaDb, schema: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows = match db.dialect {
        Dialect::Postgres | Dialect::MySql => {
            sqlx::query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'",
            )
            .bind(schema)
            .fetch_all(&db.pool)
            .await?
        }
        Dialect::Sqlite => {
            sqlx::query(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%'",
            )
            .fetch_all(&db.pool)
            .await?
        }
    };

    let mut names: Vec<String> = rows.into_iter().map(|r| r.get::<String, _>(0)).collect();
    names.sort();
    Ok(names)
}

async fn reflect_table(
    db: &SchemaDb,
    schema: &str,
    table: &str,
    fast_startup: bool,
) -> Result<ReflectedTable, sqlx::Error> {
    let columns = list_columns(db, schema, table).await?;
    let pk_columns = list_primary_key(db, schema, table).await?;
    let foreign_keys = if fast_startup {
        Vec::new()
    } else {
        list_foreign_keys(db, schema, table).await?
    };

    Ok(ReflectedTable {
        schema: schema.to_string(),
        name: table.to_string(),
        columns,
        pk_columns,
        foreign_keys,
    })
}

async fn list_columns(
    db: &SchemaDb,
    schema: &str,
    table: &str,
) -> Result<Vec<ReflectedColumn>, sqlx::Error> {
    match db.dialect {
        Dialect::Postgres | Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
            )
            .bind(schema)
            .bind(table)
            .fetch_all(&db.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|r| ReflectedColumn {
                    name: r.get::<String, _>(0),
                    sql_type: r.get::<String, _>(1).to_lowercase(),
                    nullable: r.get::<String, _>(2).eq_ignore_ascii_case("yes"),
                })
                .collect())
        }
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA table_info('{table}')"))
                .fetch_all(&db.pool)
                .await?;
            Ok(rows
                .into_iter()
                .map(|r| ReflectedColumn {
                    name: r.get::<String, _>(1),
                    sql_type: r.get::<String, _>(2).to_lowercase(),
                    nullable: r.get::<i64, _>(3) == 0,
                })
                .collect())
        }
    }
}

async fn list_primary_key(
    db: &SchemaDb,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, sqlx::Error> {
    match db.dialect {
        Dialect::Postgres => {
            let rows = sqlx::query(
                "SELECT kcu.column_name FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1 AND tc.table_name = $2 \
                 ORDER BY kcu.ordinal_position",
            )
            .bind(schema)
            .bind(table)
            .fetch_all(&db.pool)
            .await?;
            Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
        }
        Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name FROM information_schema.key_column_usage \
                 WHERE constraint_name = 'PRIMARY' AND table_schema = ? AND table_name = ? \
                 ORDER BY ordinal_position",
            )
            .bind(schema)
            .bind(table)
            .fetch_all(&db.pool)
            .await?;
            Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
        }
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA table_info('{table}')"))
                .fetch_all(&db.pool)
                .await?;
            Ok(rows
                .into_iter()
                .filter(|r| r.get::<i64, _>(5) > 0)
                .map(|r| r.get::<String, _>(1))
                .collect())
        }
    }
}

async fn list_foreign_keys(
    db: &SchemaDb,
    schema: &str,
    table: &str,
) -> Result<Vec<(String, String, String)>, sqlx::Error> {
    match db.dialect {
        Dialect::Postgres => {
            let rows = sqlx::query(
                "SELECT kcu.column_name, ccu.table_schema, ccu.table_name, ccu.column_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                   ON tc.constraint_name = ccu.constraint_name \
                 WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 AND tc.table_name = $2",
            )
            .bind(schema)
            .bind(table)
            .fetch_all(&db.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|r| {
                    let local_col: String = r.get(0);
                    let ref_schema: String = r.get(1);
                    let ref_table: String = r.get(2);
                    let ref_col: String = r.get(3);
                    (local_col, format!("{ref_schema}.{ref_table}"), ref_col)
                })
                .collect())
        }
        Dialect::MySql => {
            let rows = sqlx::query(
                "SELECT column_name, referenced_table_schema, referenced_table_name, referenced_column_name \
                 FROM information_schema.key_column_usage \
                 WHERE table_schema = ? AND table_name = ? AND referenced_table_name IS NOT NULL",
            )
            .bind(schema)
            .bind(table)
            .fetch_all(&db.pool)
            .await?;
            Ok(rows
                .into_iter()
                .map(|r| {
                    let local_col: String = r.get(0);
                    let ref_schema: String = r.get(1);
                    let ref_table: String = r.get(2);
                    let ref_col: String = r.get(3);
                    (local_col, format!("{ref_schema}.{ref_table}"), ref_col)
                })
                .collect())
        }
        Dialect::Sqlite => {
            let rows = sqlx::query(&format!("PRAGMA foreign_key_list('{table}')"))
                .fetch_all(&db.pool)
                .await?;
            Ok(rows
                .into_iter()
                .map(|r| {
                    let ref_table: String = r.get(2);
                    let from_col: String = r.get(3);
                    let to_col: String = r.get(4);
                    (from_col, format!("main.{ref_table}"), to_col)
                })
                .collect())
        }
    }
}
