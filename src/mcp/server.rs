//! The MCP server surface: 6 core tools plus two optional debug
//! tools gated by `config.debug_tools_enabled`. Every tool reads through
//! `InitManager`, which refuses reads outside `READY` with a `NotReady`
//! error — `get_init_status` is the one exception, since it
//! exists to be polled while the service is still starting.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};

use tracing::instrument;

use crate::dialect::facade::DialectName;
use crate::execute::runner::ExecutionRunner;
use crate::init::AppContext;
use crate::mcp::error::ToolError;
use crate::mcp::types::{
    DatabaseOverviewInput, ExecuteQueryInput, FindColumnsInput, FindTablesApproach, FindTablesInput,
    PlanQueryInput, SubjectAreasInput, TableInfoInput,
};
use crate::models::execute::ExecuteQueryResult;
use crate::models::overview::DatabaseSummary;
use crate::models::plan::QueryPlan;
use crate::models::table_info::TableInfo;
use crate::models::SubjectArea;
use crate::planning::PlanBuilder;
use crate::retrieval::engine::{RetrievalEngine, RetrievalStrategy};
use crate::schema::manager::InitStatus;
use crate::schema::{build_database_summary, build_table_info, list_subject_areas};
use crate::SchemaMindError;

/// Database-intelligence MCP server: schema reflection, retrieval-augmented
/// query planning, and safe SELECT execution.
#[derive(Clone)]
pub struct SchemaMindServer {
    ctx: AppContext,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SchemaMindServer {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    /// Resolve the SQL dialect the Plan Builder / Table Info / Execution
    /// Runner should target, from the live connection's detected dialect.
    fn target_dialect(&self) -> Result<DialectName, ToolError> {
        let db = self.ctx.init_manager.get_db().map_err(ToolError::from)?;
        Ok(DialectName::from(db.dialect))
    }

    #[tool(
        description = "Turn a free-form natural-language request into a structured query plan: relevant tables, join plan, group-by/filter candidates, and selected columns. Does not execute anything."
    )]
    #[instrument(name = "mcp.plan_query_for_intent", skip_all)]
    pub async fn plan_query_for_intent(
        &self,
        Parameters(input): Parameters<PlanQueryInput>,
    ) -> Result<Json<QueryPlan>, ToolError> {
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        let target = self.target_dialect()?;

        let builder = PlanBuilder::new(&service.card, &service, &self.ctx.dialect, &self.ctx.config, target);
        let plan = builder
            .build(
                &input.request,
                input.constraints.as_ref(),
                input.full_detail,
                input.budget.as_ref(),
            )
            .await;
        Ok(Json(plan))
    }

    #[tool(
        description = "Database-wide overview: dialect, total tables, schemas, subject areas, centrality-ranked important tables, and detected structural patterns (star schema, normalized, time-series, analytics)."
    )]
    #[instrument(name = "mcp.get_database_overview", skip_all)]
    pub async fn get_database_overview(
        &self,
        Parameters(input): Parameters<DatabaseOverviewInput>,
    ) -> Result<Json<DatabaseSummary>, ToolError> {
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        Ok(Json(build_database_summary(
            &service.card,
            input.include_subject_areas,
            input.area_limit,
        )))
    }

    #[tool(
        description = "Full profile of one table: business description, columns with sample values, dialect-compiled relationships, three typical compiled queries, indexing notes, and PK/FK lists."
    )]
    #[instrument(name = "mcp.get_table_info", skip_all)]
    pub async fn get_table_info(
        &self,
        Parameters(input): Parameters<TableInfoInput>,
    ) -> Result<Json<TableInfo>, ToolError> {
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        let target = self.target_dialect()?;

        build_table_info(
            &service.card,
            &input.table_key,
            &self.ctx.dialect,
            target,
            input.include_samples,
            input.column_role_filter.as_deref(),
            input.max_sample_values,
            input.relationship_limit,
        )
        .await
        .map(Json)
        .ok_or_else(|| {
            ToolError::from(SchemaMindError::NotFound(format!(
                "no table '{}' in the current schema",
                input.table_key
            )))
        })
    }

    #[tool(
        description = "Current Init Manager lifecycle phase (STARTING/RUNNING/READY/FAILED/STOPPED) plus timing and error detail. Safe to call before the service is READY."
    )]
    #[instrument(name = "mcp.get_init_status", skip_all)]
    pub async fn get_init_status(&self) -> Result<Json<InitStatus>, ToolError> {
        Ok(Json(self.ctx.init_manager.status()))
    }

    #[tool(
        description = "List subject areas (connected table communities), sorted by table count descending."
    )]
    #[instrument(name = "mcp.get_subject_areas", skip_all)]
    pub async fn get_subject_areas(
        &self,
        Parameters(input): Parameters<SubjectAreasInput>,
    ) -> Result<Json<Vec<SubjectArea>>, ToolError> {
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        Ok(Json(list_subject_areas(&service.card, input.limit)))
    }

    #[tool(
        description = "Execute a single read-only SELECT statement against the connected database. Rows and cells are truncated to configured limits; non-SELECT statements are rejected."
    )]
    #[instrument(name = "mcp.execute_query", skip_all)]
    pub async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<Json<ExecuteQueryResult>, ToolError> {
        let db = self.ctx.init_manager.get_db().map_err(ToolError::from)?;
        let runner = ExecutionRunner::new(&db, &self.ctx.dialect, &self.ctx.config);
        Ok(Json(runner.execute(&input.sql).await))
    }

    #[tool(
        description = "Debug tool: rank candidate tables for a query by one retrieval approach (combo, lexical, emb_table, emb_column), bypassing the full query plan. Only available when debug_tools_enabled is set."
    )]
    #[instrument(name = "mcp.find_tables", skip_all)]
    pub async fn find_tables(
        &self,
        Parameters(input): Parameters<FindTablesInput>,
    ) -> Result<Json<Vec<(String, f32)>>, ToolError> {
        if !self.ctx.config.debug_tools_enabled {
            return Err(ToolError::from(SchemaMindError::Validation(
                "find_tables is disabled; set debug_tools_enabled to use it".into(),
            )));
        }
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        let query_vector = service.embed_query(&input.query).await;

        let strategy = match input.approach {
            FindTablesApproach::Combo => RetrievalStrategy::Combined,
            FindTablesApproach::Lexical => RetrievalStrategy::Lexical,
            FindTablesApproach::EmbTable => RetrievalStrategy::EmbeddingTable,
            FindTablesApproach::EmbColumn => RetrievalStrategy::EmbeddingColumn,
        };

        let engine = RetrievalEngine::new(&service.card, &service, &self.ctx.config);
        let scored = engine.retrieve_with_alpha(
            &input.query,
            input.limit,
            strategy,
            query_vector.as_deref(),
            self.ctx.config.strict_archive_exclude,
            input.alpha,
        );

        Ok(Json(scored.into_iter().map(|s| (s.table, s.score)).collect()))
    }

    #[tool(
        description = "Debug tool: find columns by keyword substring match across table names and column names, optionally scoped to one table. Only available when debug_tools_enabled is set."
    )]
    #[instrument(name = "mcp.find_columns", skip_all)]
    pub async fn find_columns(
        &self,
        Parameters(input): Parameters<FindColumnsInput>,
    ) -> Result<Json<Vec<String>>, ToolError> {
        if !self.ctx.config.debug_tools_enabled {
            return Err(ToolError::from(SchemaMindError::Validation(
                "find_columns is disabled; set debug_tools_enabled to use it".into(),
            )));
        }
        let service = self.ctx.init_manager.get_schema_service().map_err(ToolError::from)?;
        let keyword = input.keyword.to_lowercase();

        let mut hits: Vec<String> = service
            .card
            .tables
            .values()
            .filter(|t| input.by_table.as_deref().map(|want| want == t.key).unwrap_or(true))
            .flat_map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.name.to_lowercase().contains(&keyword))
                    .map(move |c| format!("{}.{}", t.key, c.name))
            })
            .collect();
        hits.truncate(input.limit);

        Ok(Json(hits))
    }
}

#[tool_handler]
impl ServerHandler for SchemaMindServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "schemamind".to_string(),
                title: Some("schemamind database intelligence".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Database intelligence for LLM agents: call get_init_status() first if unsure \
                 the schema service is ready. Use plan_query_for_intent() to turn a free-form \
                 request into a structured plan before writing SQL, get_database_overview() or \
                 get_subject_areas() to orient in an unfamiliar schema, get_table_info() to \
                 inspect one table in depth, and execute_query() to run the resulting SELECT. \
                 execute_query() only accepts a single read-only SELECT statement."
                    .to_string(),
            ),
        }
    }
}

/// Run the MCP server on stdio transport.
pub async fn run_mcp_server(ctx: AppContext) -> anyhow::Result<()> {
    use rmcp::ServiceExt;

    ctx.spawn_health_server();

    let server = SchemaMindServer::new(ctx.clone());
    tracing::info!("Starting schemamind MCP server v{}", env!("CARGO_PKG_VERSION"));

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    tracing::info!("MCP server listening on stdio");

    let init_manager = Arc::clone(&ctx.init_manager);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        init_manager.shutdown().await;
    });

    service.waiting().await?;
    tracing::info!("MCP server shutting down");

    Ok(())
}
